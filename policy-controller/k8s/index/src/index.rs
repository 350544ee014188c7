//! Holds the indexed objects and produces graph snapshots. The
//! resource-specific modules convert Kubernetes objects into the indexed
//! forms defined here.

use crate::{gateway, http_route, policy};
use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use gateway_policy_controller_core::{Level, Locator, Meta, Node, PolicyKind, Snapshot};
use gateway_policy_controller_k8s_api as k8s;
use parking_lot::RwLock;
use std::{collections::hash_map::Entry, hash::Hash, sync::Arc};
use tokio::sync::Notify;

pub type SharedIndex = Arc<RwLock<Index>>;

/// Holds all indexing state. Owned and updated by the watch tasks; read by
/// the policy pass.
#[derive(Debug)]
pub struct Index {
    /// Gateway classes by name.
    classes: HashMap<String, gateway::GatewayClass>,
    gateways: HashMap<ResourceId, gateway::Gateway>,
    routes: HashMap<ResourceId, http_route::HttpRoute>,
    policies: HashMap<(PolicyKind, ResourceId), policy::IndexedPolicy>,

    /// Woken on every change to the index. A single permit is stored when
    /// the pass is busy, so bursts of changes coalesce.
    changed: Arc<Notify>,
}

#[derive(Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct ResourceId {
    pub namespace: String,
    pub name: String,
}

// === impl ResourceId ===

impl ResourceId {
    pub fn new(namespace: impl ToString, name: impl ToString) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

// === impl Index ===

impl Index {
    pub fn shared(changed: Arc<Notify>) -> SharedIndex {
        Arc::new(RwLock::new(Self {
            classes: HashMap::default(),
            gateways: HashMap::default(),
            routes: HashMap::default(),
            policies: HashMap::default(),
            changed,
        }))
    }

    pub fn apply_gateway_class(&mut self, resource: k8s::gateway::GatewayClass) {
        let class = gateway::GatewayClass::from_resource(&resource);
        let name = k8s::ResourceExt::name_unchecked(&resource);
        tracing::debug!(%name, controller = %class.controller_name, "Indexing GatewayClass");
        let changed = upsert(&mut self.classes, name, class);
        self.notify_if(changed);
    }

    pub fn delete_gateway_class(&mut self, name: String) {
        tracing::debug!(%name, "Removing GatewayClass");
        let changed = self.classes.remove(&name).is_some();
        self.notify_if(changed);
    }

    /// Replaces all gateway classes, e.g. when a watch restarts.
    pub fn reset_gateway_classes(&mut self, resources: Vec<k8s::gateway::GatewayClass>) {
        let classes = resources
            .iter()
            .map(|resource| {
                let name = k8s::ResourceExt::name_unchecked(resource);
                (name, gateway::GatewayClass::from_resource(resource))
            })
            .collect::<HashMap<_, _>>();
        tracing::debug!(classes = classes.len(), "Resetting GatewayClasses");
        let changed = classes != self.classes;
        self.classes = classes;
        self.notify_if(changed);
    }

    pub(crate) fn apply_gateway(&mut self, id: ResourceId, gateway: gateway::Gateway) {
        tracing::debug!(%id, class = %gateway.class_name, listeners = gateway.listeners.len(), "Indexing Gateway");
        let changed = upsert(&mut self.gateways, id, gateway);
        self.notify_if(changed);
    }

    pub(crate) fn delete_gateway(&mut self, id: ResourceId) {
        tracing::debug!(%id, "Removing Gateway");
        let changed = self.gateways.remove(&id).is_some();
        self.notify_if(changed);
    }

    pub(crate) fn apply_route(&mut self, id: ResourceId, route: http_route::HttpRoute) {
        tracing::debug!(%id, parents = route.parents.len(), rules = route.rules, "Indexing HTTPRoute");
        let changed = upsert(&mut self.routes, id, route);
        self.notify_if(changed);
    }

    pub(crate) fn delete_route(&mut self, id: ResourceId) {
        tracing::debug!(%id, "Removing HTTPRoute");
        let changed = self.routes.remove(&id).is_some();
        self.notify_if(changed);
    }

    pub(crate) fn apply_policy(&mut self, id: ResourceId, policy: policy::IndexedPolicy) {
        let kind = policy.policy.kind;
        tracing::debug!(%id, %kind, target = ?policy.target, "Indexing policy");
        let changed = upsert(&mut self.policies, (kind, id), policy);
        self.notify_if(changed);
    }

    pub(crate) fn delete_policy(&mut self, kind: PolicyKind, id: ResourceId) {
        tracing::debug!(%id, %kind, "Removing policy");
        let changed = self.policies.remove(&(kind, id)).is_some();
        self.notify_if(changed);
    }

    pub(crate) fn num_gateways(&self, namespace: &str) -> usize {
        self.gateways
            .keys()
            .filter(|id| id.namespace == namespace)
            .count()
    }

    pub(crate) fn num_routes(&self, namespace: &str) -> usize {
        self.routes
            .keys()
            .filter(|id| id.namespace == namespace)
            .count()
    }

    pub(crate) fn num_policies(&self, kind: PolicyKind, namespace: &str) -> usize {
        self.policies
            .keys()
            .filter(|(k, id)| *k == kind && id.namespace == namespace)
            .count()
    }

    /// Produces the nodes and edges of the current topology.
    ///
    /// The snapshot is always consistent: a gateway whose class is unknown
    /// has no parent, a route bound to an unknown gateway or listener is not
    /// linked to it, and a policy whose target is unknown is not attached.
    pub fn snapshot(&self) -> Snapshot {
        let mut snapshot = Snapshot::default();
        let mut known = HashSet::<Locator>::default();

        for (name, class) in &self.classes {
            let locator = gateway::class_locator(name);
            known.insert(locator.clone());
            snapshot.nodes.push(Node::GatewayClass {
                meta: class.meta.clone(),
                controller_name: class.controller_name.clone(),
            });
        }

        for (id, gw) in &self.gateways {
            let locator = gateway::gateway_locator(id);
            known.insert(locator.clone());
            snapshot.nodes.push(Node::Gateway(gw.meta.clone()));

            if self.classes.contains_key(&gw.class_name) {
                snapshot
                    .hierarchy_edges
                    .push((gateway::class_locator(&gw.class_name), locator.clone()));
            } else {
                tracing::trace!(gateway = %id, class = %gw.class_name, "Gateway class not found");
            }

            for name in &gw.listeners {
                let listener = gateway::listener_locator(&locator, name);
                known.insert(listener.clone());
                snapshot.nodes.push(Node::at_level(
                    Level::Listener,
                    section_meta(&gw.meta, listener.clone()),
                ));
                snapshot.hierarchy_edges.push((locator.clone(), listener));
            }
        }

        for (id, route) in &self.routes {
            let locator = http_route::route_locator(id);
            known.insert(locator.clone());
            snapshot.nodes.push(Node::Route(route.meta.clone()));

            for parent in &route.parents {
                let Some(gw) = self.gateways.get(&parent.gateway) else {
                    tracing::trace!(route = %id, gateway = %parent.gateway, "Parent gateway not found");
                    continue;
                };
                let gateway = gateway::gateway_locator(&parent.gateway);
                for name in gw
                    .listeners
                    .iter()
                    .filter(|l| parent.section_name.as_ref().map_or(true, |s| s == *l))
                {
                    snapshot.hierarchy_edges.push((
                        gateway::listener_locator(&gateway, name),
                        locator.clone(),
                    ));
                }
            }

            for idx in 0..route.rules {
                let rule = http_route::rule_locator(&locator, idx);
                known.insert(rule.clone());
                snapshot.nodes.push(Node::at_level(
                    Level::RouteRule,
                    section_meta(&route.meta, rule.clone()),
                ));
                snapshot.hierarchy_edges.push((locator.clone(), rule));
            }
        }

        for indexed in self.policies.values() {
            let policy = &indexed.policy;
            match &indexed.target {
                Some(target) if known.contains(target) => {
                    snapshot
                        .attachment_edges
                        .push((policy.locator().clone(), target.clone()));
                }
                target => {
                    tracing::trace!(policy = %policy.locator(), ?target, "Policy target not found");
                }
            }
            snapshot.nodes.push(Node::Policy(policy.clone()));
        }

        snapshot
    }

    fn notify_if(&self, changed: bool) {
        if changed {
            self.changed.notify_one();
        }
    }
}

/// Returns true if the map was changed.
fn upsert<K: Eq + Hash, V: PartialEq>(map: &mut HashMap<K, V>, key: K, value: V) -> bool {
    match map.entry(key) {
        Entry::Vacant(entry) => {
            entry.insert(value);
        }
        Entry::Occupied(mut entry) => {
            if *entry.get() == value {
                return false;
            }
            entry.insert(value);
        }
    }
    true
}

/// Sections share their parent object's metadata.
fn section_meta(parent: &Meta, locator: Locator) -> Meta {
    Meta {
        locator,
        ..parent.clone()
    }
}

pub(crate) fn meta(locator: Locator, object: &k8s::ObjectMeta) -> Meta {
    Meta {
        locator,
        generation: object.generation,
        resource_version: object.resource_version.clone(),
        creation_timestamp: object.creation_timestamp.as_ref().map(|t| t.0),
        deleting: object.deletion_timestamp.is_some(),
    }
}
