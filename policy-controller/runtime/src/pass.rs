use crate::{
    core::{
        CompiledConfig, EffectivePolicies, Graph, PolicyKind, PolicyStatus, Snapshot,
        StatusComputer,
    },
    Config, Reconcile,
};
use anyhow::Result;
use std::sync::Arc;
use tokio::task;

/// The effective policies resolved in a single pass, one field per kind.
///
/// A field is `None` when its kind is disabled or its resolver did not
/// complete.
#[derive(Clone, Debug, Default)]
pub struct PassContext {
    pub auth: Option<Arc<EffectivePolicies>>,
    pub rate_limit: Option<Arc<EffectivePolicies>>,
    pub tls: Option<Arc<EffectivePolicies>>,
    pub dns: Option<Arc<EffectivePolicies>>,
}

/// Everything a pass produced.
#[derive(Debug)]
pub struct PassOutcome {
    pub context: PassContext,

    /// Ordered by policy kind.
    pub configs: Vec<CompiledConfig>,

    /// Ordered by policy kind, then locator.
    pub statuses: Vec<PolicyStatus>,
}

// === impl PassContext ===

impl PassContext {
    pub fn effective(&self, kind: PolicyKind) -> Option<&Arc<EffectivePolicies>> {
        match kind {
            PolicyKind::Auth => self.auth.as_ref(),
            PolicyKind::RateLimit => self.rate_limit.as_ref(),
            PolicyKind::Tls => self.tls.as_ref(),
            PolicyKind::Dns => self.dns.as_ref(),
        }
    }

    fn slot(&mut self, kind: PolicyKind) -> &mut Option<Arc<EffectivePolicies>> {
        match kind {
            PolicyKind::Auth => &mut self.auth,
            PolicyKind::RateLimit => &mut self.rate_limit,
            PolicyKind::Tls => &mut self.tls,
            PolicyKind::Dns => &mut self.dns,
        }
    }
}

/// Runs a single pass over `snapshot`.
///
/// The graph is built once and shared read-only with one resolver task per
/// enabled kind. Compilation, reconciliation and status computation start
/// only once every resolver has finished. A resolver that fails leaves its
/// kind's context empty; its policies then report an unknown Enforced
/// condition while other kinds proceed normally. Likewise, a reconciler
/// failure leaves readiness unknown: statuses are still produced, with an
/// unknown Enforced condition wherever downstream state would decide it.
pub async fn run_pass(
    snapshot: Snapshot,
    config: &Config,
    reconciler: &dyn Reconcile,
) -> Result<PassOutcome> {
    let graph = Arc::new(Graph::from_snapshot(snapshot)?);

    let kinds = PolicyKind::ALL
        .into_iter()
        .filter(|kind| config.is_enabled(*kind))
        .collect::<Vec<_>>();

    let resolvers = kinds.iter().map(|&kind| {
        let graph = graph.clone();
        let acceptance = config.acceptance.clone();
        async move {
            let resolved = task::spawn_blocking(move || {
                EffectivePolicies::compute(&graph, kind, &*acceptance)
            })
            .await;
            (kind, resolved)
        }
    });

    let mut context = PassContext::default();
    for (kind, resolved) in futures::future::join_all(resolvers).await {
        match resolved {
            Ok(index) => *context.slot(kind) = Some(Arc::new(index)),
            Err(error) => {
                tracing::error!(%kind, %error, "Failed to resolve effective policies")
            }
        }
    }

    let configs = kinds
        .iter()
        .filter_map(|kind| context.effective(*kind))
        .map(|index| CompiledConfig::compile(index, &graph, &config.providers))
        .collect::<Vec<_>>();

    let readiness = match reconciler.reconcile(&configs).await {
        Ok(readiness) => Some(readiness),
        Err(error) => {
            tracing::error!(%error, "Failed to reconcile compiled configs");
            None
        }
    };

    let computer = match &readiness {
        Some(readiness) => StatusComputer::new(
            &graph,
            &*config.acceptance,
            &**readiness,
            &config.providers,
        ),
        None => StatusComputer::without_readiness(&graph, &*config.acceptance, &config.providers),
    };
    let statuses = kinds
        .iter()
        .flat_map(|&kind| computer.statuses(kind, context.effective(kind).map(|i| &**i)))
        .collect();

    Ok(PassOutcome {
        context,
        configs,
        statuses,
    })
}
