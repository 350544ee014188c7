use crate::core::{AcceptancePredicate, LastKnownStatus, PolicyKind, Providers};
use std::sync::Arc;

/// Configures policy passes.
#[derive(Clone)]
pub struct Config {
    /// Policy kinds resolved on each pass. Policies of other kinds are
    /// indexed but never reported on.
    pub kinds: Vec<PolicyKind>,

    /// Maps gateway class controller names to providers.
    pub providers: Providers,

    /// Decides which policies may contribute rules.
    pub acceptance: Arc<dyn AcceptancePredicate>,
}

// === impl Config ===

/// Resolves every kind with the default providers.
///
/// Acceptance falls back to each policy's last-known Accepted condition, as
/// published by an earlier validation pass. This controller never writes a
/// True Accepted condition on its own, so without such a pass a fresh policy
/// stays unaccepted and contributes nothing. Deployments without that pass
/// must set `acceptance` explicitly.
impl Default for Config {
    fn default() -> Self {
        Self {
            kinds: PolicyKind::ALL.to_vec(),
            providers: Providers::default(),
            acceptance: Arc::new(LastKnownStatus),
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("kinds", &self.kinds)
            .field("providers", &self.providers)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn is_enabled(&self, kind: PolicyKind) -> bool {
        self.kinds.contains(&kind)
    }
}
