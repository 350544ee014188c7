use crate::{Index, PolicyResource, SharedIndex};
use gateway_policy_controller_k8s_api::{gateway, policy, Resource, ResourceExt};
use kubert::index::{IndexNamespacedResource, NamespacedRemoved};
use parking_lot::RwLock;
use prometheus_client::{
    encoding::{EncodeLabelSet, EncodeLabelValue},
    metrics::{counter::Counter, family::Family, gauge::Gauge},
    registry::Registry,
};
use std::{collections::BTreeSet, sync::Arc};

/// Wraps the shared index to count watch events and track how many objects
/// of each kind are indexed per namespace.
pub struct IndexMetrics {
    index: SharedIndex,
    objects: Family<ObjectLabels, Gauge>,
    events: Family<EventLabels, Counter>,
}

/// Resources whose indexed objects can be counted.
pub trait Counted {
    fn count(index: &Index, namespace: &str) -> usize;
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct ObjectLabels {
    kind: String,
    namespace: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct EventLabels {
    kind: String,
    event: Event,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
enum Event {
    Apply,
    Delete,
    Reset,
}

// === impl IndexMetrics ===

impl IndexMetrics {
    pub fn register(index: SharedIndex, prom: &mut Registry) -> Self {
        let objects = Family::default();
        prom.register(
            "objects",
            "Gauge of the number of indexed objects",
            objects.clone(),
        );

        let events = Family::default();
        prom.register(
            "events",
            "Count of watch events applied to the index",
            events.clone(),
        );

        Self {
            index,
            objects,
            events,
        }
    }

    pub fn shared(self) -> Arc<RwLock<Self>> {
        Arc::new(RwLock::new(self))
    }

    fn observe<R: Resource<DynamicType = ()>>(&self, event: Event) {
        self.events
            .get_or_create(&EventLabels {
                kind: R::kind(&()).to_string(),
                event,
            })
            .inc();
    }

    fn set_count<R>(&self, namespace: String)
    where
        R: Counted + Resource<DynamicType = ()>,
    {
        let count = R::count(&self.index.read(), &namespace);
        self.objects
            .get_or_create(&ObjectLabels {
                kind: R::kind(&()).to_string(),
                namespace,
            })
            .set(count as i64);
    }
}

impl<R> IndexNamespacedResource<R> for IndexMetrics
where
    R: Counted + Resource<DynamicType = ()>,
    Index: IndexNamespacedResource<R>,
{
    fn apply(&mut self, resource: R) {
        let namespace = resource.namespace().unwrap_or_default();
        self.observe::<R>(Event::Apply);
        IndexNamespacedResource::<R>::apply(&mut *self.index.write(), resource);
        self.set_count::<R>(namespace);
    }

    fn delete(&mut self, namespace: String, name: String) {
        self.observe::<R>(Event::Delete);
        IndexNamespacedResource::<R>::delete(&mut *self.index.write(), namespace.clone(), name);
        self.set_count::<R>(namespace);
    }

    fn reset(&mut self, resources: Vec<R>, removed: NamespacedRemoved) {
        self.observe::<R>(Event::Reset);
        let namespaces = resources
            .iter()
            .filter_map(|r| r.namespace())
            .chain(removed.keys().cloned())
            .collect::<BTreeSet<_>>();
        IndexNamespacedResource::<R>::reset(&mut *self.index.write(), resources, removed);
        for namespace in namespaces {
            self.set_count::<R>(namespace);
        }
    }
}

// === impl Counted ===

impl Counted for gateway::Gateway {
    fn count(index: &Index, namespace: &str) -> usize {
        index.num_gateways(namespace)
    }
}

impl Counted for gateway::HttpRoute {
    fn count(index: &Index, namespace: &str) -> usize {
        index.num_routes(namespace)
    }
}

impl Counted for policy::AuthPolicy {
    fn count(index: &Index, namespace: &str) -> usize {
        index.num_policies(<Self as PolicyResource>::KIND, namespace)
    }
}

impl Counted for policy::RateLimitPolicy {
    fn count(index: &Index, namespace: &str) -> usize {
        index.num_policies(<Self as PolicyResource>::KIND, namespace)
    }
}

impl Counted for policy::TlsPolicy {
    fn count(index: &Index, namespace: &str) -> usize {
        index.num_policies(<Self as PolicyResource>::KIND, namespace)
    }
}

impl Counted for policy::DnsPolicy {
    fn count(index: &Index, namespace: &str) -> usize {
        index.num_policies(<Self as PolicyResource>::KIND, namespace)
    }
}
