use ahash::AHashMap as HashMap;
#[cfg(not(test))]
use chrono::offset::Utc;
use gateway_policy_controller_core::{PolicyKind, PolicyStatus};
use gateway_policy_controller_k8s_api as k8s;
use parking_lot::RwLock;
use prometheus_client::{metrics::counter::Counter, registry::Registry};
use std::sync::Arc;
use tokio::{
    sync::mpsc::{error::TrySendError, Receiver, Sender},
    time::{self, Duration},
};

const POLICY_API_VERSION: &str = "kuadrant.io/v1";
pub const STATUS_CONTROLLER_NAME: &str = "policy-status-controller";

pub type SharedIndex = Arc<RwLock<Index>>;

/// Applies status patches to the cluster.
pub struct Controller {
    client: k8s::Client,
    updates: Receiver<Update>,
    patch_timeout: Duration,
    metrics: ControllerMetrics,
}

#[derive(Clone, Debug)]
pub struct ControllerMetrics {
    patch_succeeded: Counter,
    patch_failed: Counter,
    patch_timeout: Counter,
}

/// Tracks the status last written for each policy so that a patch is only
/// sent when a policy's conditions change.
pub struct Index {
    updates: Sender<Update>,
    statuses: HashMap<PolicyId, k8s::policy::PolicyStatus>,
    metrics: IndexMetrics,
}

#[derive(Clone, Debug)]
pub struct IndexMetrics {
    patches_enqueued: Counter,
    patch_channel_full: Counter,
}

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct PolicyId {
    pub kind: PolicyKind,
    pub namespace: String,
    pub name: String,
}

#[derive(Debug, PartialEq)]
pub struct Update {
    pub id: PolicyId,
    pub patch: k8s::Patch<serde_json::Value>,
}

// === impl ControllerMetrics ===

impl ControllerMetrics {
    pub fn register(prom: &mut Registry) -> Self {
        let patch_succeeded = Counter::default();
        prom.register(
            "patch_succeeded",
            "Counter patches successfully applied to policy statuses",
            patch_succeeded.clone(),
        );

        let patch_failed = Counter::default();
        prom.register(
            "patch_failed",
            "Counter patches that fail to apply to policy statuses",
            patch_failed.clone(),
        );

        let patch_timeout = Counter::default();
        prom.register(
            "patch_timeout",
            "Counter patches that time out when applying to policy statuses",
            patch_timeout.clone(),
        );

        Self {
            patch_succeeded,
            patch_failed,
            patch_timeout,
        }
    }
}

// === impl Controller ===

impl Controller {
    pub fn new(
        client: k8s::Client,
        updates: Receiver<Update>,
        patch_timeout: Duration,
        metrics: ControllerMetrics,
    ) -> Self {
        Self {
            client,
            updates,
            patch_timeout,
            metrics,
        }
    }

    /// Processes updates until every sender has been dropped.
    pub async fn process_updates(mut self) {
        let patch_params = k8s::PatchParams::apply(STATUS_CONTROLLER_NAME);

        while let Some(Update { id, patch }) = self.updates.recv().await {
            let patch_status = async {
                match id.kind {
                    PolicyKind::Auth => {
                        patch_status::<k8s::policy::AuthPolicy>(&self.client, &id, &patch_params, &patch)
                            .await
                    }
                    PolicyKind::RateLimit => {
                        patch_status::<k8s::policy::RateLimitPolicy>(&self.client, &id, &patch_params, &patch)
                            .await
                    }
                    PolicyKind::Tls => {
                        patch_status::<k8s::policy::TlsPolicy>(&self.client, &id, &patch_params, &patch)
                            .await
                    }
                    PolicyKind::Dns => {
                        patch_status::<k8s::policy::DnsPolicy>(&self.client, &id, &patch_params, &patch)
                            .await
                    }
                }
            };

            match time::timeout(self.patch_timeout, patch_status).await {
                Ok(Ok(())) => {
                    self.metrics.patch_succeeded.inc();
                }
                Ok(Err(error)) => {
                    self.metrics.patch_failed.inc();
                    tracing::error!(namespace = %id.namespace, name = %id.name, kind = %id.kind, %error, "Patch failed");
                }
                Err(_) => {
                    self.metrics.patch_timeout.inc();
                    tracing::error!(namespace = %id.namespace, name = %id.name, kind = %id.kind, "Patch timed out");
                }
            }
        }
    }
}

async fn patch_status<P>(
    client: &k8s::Client,
    id: &PolicyId,
    params: &k8s::PatchParams,
    patch: &k8s::Patch<serde_json::Value>,
) -> Result<(), k8s::Error>
where
    P: k8s::Resource<Scope = k8s::NamespaceResourceScope, DynamicType = ()>,
    P: Clone + serde::de::DeserializeOwned + std::fmt::Debug,
{
    let api = k8s::Api::<P>::namespaced(client.clone(), &id.namespace);
    api.patch_status(&id.name, params, patch).await?;
    Ok(())
}

// === impl IndexMetrics ===

impl IndexMetrics {
    pub fn register(prom: &mut Registry) -> Self {
        let patches_enqueued = Counter::default();
        prom.register(
            "patches_enqueued",
            "Counter of patches enqueued for policy statuses",
            patches_enqueued.clone(),
        );

        let patch_channel_full = Counter::default();
        prom.register(
            "patch_channel_full",
            "Counter of patches dropped because the patch channel was full",
            patch_channel_full.clone(),
        );

        Self {
            patches_enqueued,
            patch_channel_full,
        }
    }
}

// === impl PolicyId ===

impl PolicyId {
    pub fn from_status(status: &PolicyStatus) -> Self {
        Self {
            kind: status.kind,
            namespace: status.namespace.clone(),
            name: status.name.clone(),
        }
    }
}

// === impl Index ===

impl Index {
    pub fn shared(updates: Sender<Update>, metrics: IndexMetrics) -> SharedIndex {
        Arc::new(RwLock::new(Self {
            updates,
            statuses: HashMap::default(),
            metrics,
        }))
    }

    /// Records the statuses computed by a pass and enqueues a patch for each
    /// policy whose conditions or observed generation changed.
    ///
    /// Policies that are absent from `statuses` are forgotten; if they
    /// reappear, their status is written again.
    pub fn apply_statuses(&mut self, statuses: impl IntoIterator<Item = PolicyStatus>) {
        #[cfg(not(test))]
        let timestamp = Utc::now();
        #[cfg(test)]
        let timestamp = chrono::DateTime::<chrono::Utc>::MIN_UTC;

        let mut seen = HashMap::<PolicyId, k8s::policy::PolicyStatus>::default();
        for status in statuses {
            let id = PolicyId::from_status(&status);
            let previous = self.statuses.remove(&id);
            let desired = make_status(&status, previous.as_ref(), timestamp);
            // A status that could not be enqueued is not recorded, so it is
            // retried on the next pass.
            if previous.as_ref() == Some(&desired) || self.send(&id, desired.clone()) {
                seen.insert(id, desired);
            }
        }
        self.statuses = seen;
    }

    fn send(&self, id: &PolicyId, status: k8s::policy::PolicyStatus) -> bool {
        let update = Update {
            id: id.clone(),
            patch: make_patch(id, status),
        };
        match self.updates.try_send(update) {
            Ok(()) => {
                self.metrics.patches_enqueued.inc();
                true
            }
            Err(TrySendError::Full(_)) => {
                self.metrics.patch_channel_full.inc();
                tracing::error!(namespace = %id.namespace, name = %id.name, kind = %id.kind, "Failed to enqueue patch: channel full");
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::error!(namespace = %id.namespace, name = %id.name, kind = %id.kind, "Failed to enqueue patch: controller stopped");
                false
            }
        }
    }
}

/// Builds the Kubernetes status for a policy. A condition that did not
/// change status keeps its previous transition time.
pub(crate) fn make_status(
    status: &PolicyStatus,
    previous: Option<&k8s::policy::PolicyStatus>,
    timestamp: chrono::DateTime<chrono::Utc>,
) -> k8s::policy::PolicyStatus {
    let conditions = std::iter::once(&status.accepted)
        .chain(status.enforced.as_ref())
        .map(|condition| {
            let type_ = condition.type_.as_str();
            let last_transition_time = previous
                .and_then(|p| p.conditions.iter().find(|c| c.type_ == type_))
                .filter(|c| c.status == condition.status.as_str())
                .map(|c| c.last_transition_time.clone())
                .unwrap_or(k8s::Time(timestamp));
            k8s::Condition {
                type_: type_.to_string(),
                status: condition.status.as_str().to_string(),
                reason: condition.reason.as_str().to_string(),
                message: condition.message.clone(),
                observed_generation: status.generation,
                last_transition_time,
            }
        })
        .collect();

    k8s::policy::PolicyStatus {
        conditions,
        observed_generation: status.generation,
    }
}

pub(crate) fn make_patch(
    id: &PolicyId,
    status: k8s::policy::PolicyStatus,
) -> k8s::Patch<serde_json::Value> {
    let value = serde_json::json!({
        "apiVersion": POLICY_API_VERSION,
        "kind": id.kind.kind(),
        "name": id.name,
        "status": status,
    });
    k8s::Patch::Merge(value)
}
