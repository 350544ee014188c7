use crate::{index::meta, Index, ResourceId};
use anyhow::{bail, Result};
use gateway_policy_controller_core::{Level, Locator, Meta};
use gateway_policy_controller_k8s_api::{self as k8s, ResourceExt, GATEWAY_API_GROUP};

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct HttpRoute {
    pub meta: Meta,
    pub parents: Vec<ParentRef>,

    /// The number of rules. Rules are addressed by index.
    pub rules: usize,
}

/// A reference to a gateway, or to one of its listeners when `section_name`
/// is set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ParentRef {
    pub gateway: ResourceId,
    pub section_name: Option<String>,
}

// === impl HttpRoute ===

impl HttpRoute {
    pub(crate) fn from_resource(route: &k8s::gateway::HttpRoute) -> Result<(ResourceId, Self)> {
        let Some(namespace) = route.namespace() else {
            bail!("HTTPRoute must have a namespace");
        };
        let id = ResourceId::new(&namespace, route.name_unchecked());

        let parents = route
            .spec
            .inner
            .parent_refs
            .iter()
            .flatten()
            .filter_map(|parent| ParentRef::from_reference(parent, &namespace))
            .collect();

        let rules = route.spec.rules.as_ref().map_or(0, Vec::len);

        let route = Self {
            meta: meta(route_locator(&id), &route.metadata),
            parents,
            rules,
        };
        Ok((id, route))
    }
}

impl kubert::index::IndexNamespacedResource<k8s::gateway::HttpRoute> for Index {
    fn apply(&mut self, resource: k8s::gateway::HttpRoute) {
        match HttpRoute::from_resource(&resource) {
            Ok((id, route)) => self.apply_route(id, route),
            Err(error) => {
                tracing::info!(name = %resource.name_any(), %error, "Ignoring HTTPRoute");
            }
        }
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.delete_route(ResourceId::new(namespace, name))
    }
}

// === impl ParentRef ===

impl ParentRef {
    /// Only Gateway parents are indexed. The group and kind default to the
    /// Gateway API's, and the namespace to the route's.
    fn from_reference(parent: &k8s::gateway::ParentReference, route_ns: &str) -> Option<Self> {
        let group = parent.group.as_deref().unwrap_or(GATEWAY_API_GROUP);
        let kind = parent.kind.as_deref().unwrap_or("Gateway");
        if group != GATEWAY_API_GROUP || kind != "Gateway" {
            tracing::trace!(%group, %kind, name = %parent.name, "Skipping non-Gateway parent");
            return None;
        }

        let namespace = parent.namespace.as_deref().unwrap_or(route_ns);
        Some(Self {
            gateway: ResourceId::new(namespace, &parent.name),
            section_name: parent.section_name.clone(),
        })
    }
}

pub(crate) fn route_locator(id: &ResourceId) -> Locator {
    Locator::new(Level::Route.kind(), Some(id.namespace.as_str()), &id.name)
}

pub(crate) fn rule_locator(route: &Locator, idx: usize) -> Locator {
    Locator::section(Level::RouteRule.kind(), route, format!("rule-{idx}"))
}
