use crate::{index, k8s};
use futures::prelude::*;
use kube::runtime::watcher;
use parking_lot::RwLock;
use prometheus_client::registry::Registry;
use std::sync::Arc;
use tracing::{info_span, Instrument};

/// Feeds the cluster index from resource watches.
pub struct Watches {
    index: index::SharedIndex,
    metered: Arc<RwLock<index::IndexMetrics>>,
}

// === impl Watches ===

impl Watches {
    /// Registers index metrics. This must happen before the runtime is built,
    /// since the registry is handed to the runtime's admin server.
    pub fn register(index: &index::SharedIndex, prom: &mut Registry) -> Self {
        Self {
            index: index.clone(),
            metered: index::IndexMetrics::register(index.clone(), prom).shared(),
        }
    }

    pub fn spawn<S: 'static>(self, runtime: &mut kubert::Runtime<S>) {
        let classes = runtime.watch_all::<k8s::gateway::GatewayClass>(watcher::Config::default());
        tokio::spawn(
            index_gateway_classes(self.index.clone(), classes)
                .instrument(info_span!("gatewayclasses.gateway.networking.k8s.io")),
        );

        let gateways = runtime.watch_all::<k8s::gateway::Gateway>(watcher::Config::default());
        tokio::spawn(
            kubert::index::namespaced(self.metered.clone(), gateways)
                .instrument(info_span!("gateways.gateway.networking.k8s.io")),
        );

        let routes = runtime.watch_all::<k8s::gateway::HttpRoute>(watcher::Config::default());
        tokio::spawn(
            kubert::index::namespaced(self.metered.clone(), routes)
                .instrument(info_span!("httproutes.gateway.networking.k8s.io")),
        );

        let auth = runtime.watch_all::<k8s::policy::AuthPolicy>(watcher::Config::default());
        tokio::spawn(
            kubert::index::namespaced(self.metered.clone(), auth)
                .instrument(info_span!("authpolicies.kuadrant.io")),
        );

        let rate_limit =
            runtime.watch_all::<k8s::policy::RateLimitPolicy>(watcher::Config::default());
        tokio::spawn(
            kubert::index::namespaced(self.metered.clone(), rate_limit)
                .instrument(info_span!("ratelimitpolicies.kuadrant.io")),
        );

        let tls = runtime.watch_all::<k8s::policy::TlsPolicy>(watcher::Config::default());
        tokio::spawn(
            kubert::index::namespaced(self.metered.clone(), tls)
                .instrument(info_span!("tlspolicies.kuadrant.io")),
        );

        let dns = runtime.watch_all::<k8s::policy::DnsPolicy>(watcher::Config::default());
        tokio::spawn(
            kubert::index::namespaced(self.metered, dns)
                .instrument(info_span!("dnspolicies.kuadrant.io")),
        );
    }
}

/// Gateway classes are cluster-scoped, so they are applied to the index
/// directly rather than through the namespaced indexing helpers.
pub(crate) async fn index_gateway_classes(
    index: index::SharedIndex,
    events: impl Stream<Item = watcher::Event<k8s::gateway::GatewayClass>>,
) {
    tokio::pin!(events);
    while let Some(event) = events.next().await {
        match event {
            watcher::Event::Applied(class) => index.write().apply_gateway_class(class),
            watcher::Event::Deleted(class) => {
                let name = k8s::ResourceExt::name_unchecked(&class);
                index.write().delete_gateway_class(name)
            }
            watcher::Event::Restarted(classes) => index.write().reset_gateway_classes(classes),
        }
    }
    tracing::debug!("GatewayClass watch ended");
}
