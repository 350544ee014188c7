use crate::{index, run_pass, status, Config, PassMetrics, Reconcile};
use std::{future::Future, sync::Arc};
use tokio::sync::Notify;

/// Runs a policy pass whenever the cluster index changes.
///
/// At most one pass runs at a time. Changes that arrive while a pass is
/// running leave a single stored permit on `changed`, so any number of them
/// trigger exactly one follow-up pass.
pub struct PolicyController {
    index: index::SharedIndex,
    status: status::SharedIndex,
    changed: Arc<Notify>,
    config: Config,
    reconciler: Arc<dyn Reconcile>,
    metrics: PassMetrics,
}

// === impl PolicyController ===

impl PolicyController {
    /// `changed` must be the notifier the cluster index was created with.
    pub fn new(
        index: index::SharedIndex,
        status: status::SharedIndex,
        changed: Arc<Notify>,
        config: Config,
        reconciler: Arc<dyn Reconcile>,
        metrics: PassMetrics,
    ) -> Self {
        Self {
            index,
            status,
            changed,
            config,
            reconciler,
            metrics,
        }
    }

    pub async fn run(self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                biased;
                () = &mut shutdown => {
                    tracing::debug!("Policy controller shutting down");
                    return;
                }
                () = self.changed.notified() => {}
            }
            self.pass().await;
        }
    }

    pub(crate) async fn pass(&self) {
        let snapshot = self.index.read().snapshot();
        match run_pass(snapshot, &self.config, &*self.reconciler).await {
            Ok(outcome) => {
                self.metrics.pass_succeeded(&outcome.context);
                tracing::debug!(
                    configs = outcome.configs.len(),
                    statuses = outcome.statuses.len(),
                    "Policy pass complete"
                );
                self.status.write().apply_statuses(outcome.statuses);
            }
            Err(error) => {
                self.metrics.pass_failed();
                tracing::error!(%error, "Policy pass failed");
            }
        }
    }
}
