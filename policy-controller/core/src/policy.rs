use crate::{Locator, Meta};
use std::collections::BTreeMap;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub enum PolicyKind {
    Auth,
    RateLimit,
    Tls,
    Dns,
}

/// A policy attached to a routing object.
///
/// Rule values are opaque: they are merged by key and copied verbatim.
#[derive(Clone, Debug, PartialEq)]
pub struct Policy {
    pub meta: Meta,
    pub kind: PolicyKind,
    pub namespace: String,
    pub name: String,
    pub rules: BTreeMap<String, serde_json::Value>,

    /// The Accepted condition last written to the policy's status, if any.
    pub last_known: Option<Validity>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Validity {
    Valid,
    Invalid(String),
}

#[derive(Debug, thiserror::Error)]
pub enum AcceptanceError {
    #[error("policy {0} has no recorded Accepted condition")]
    NoStatus(Locator),

    #[error("failed to validate policy {policy}: {message}")]
    Validation { policy: Locator, message: String },
}

/// Decides whether a policy is in scope for merging.
///
/// Validation is done by a prior pass outside of this crate; this is only the
/// hand-off point.
pub trait AcceptancePredicate: Send + Sync {
    fn is_accepted(&self, policy: &Policy) -> Result<Validity, AcceptanceError>;
}

/// Falls back to the policy's own last-known Accepted condition.
#[derive(Copy, Clone, Debug, Default)]
pub struct LastKnownStatus;

// === impl PolicyKind ===

impl PolicyKind {
    pub const ALL: [PolicyKind; 4] = [
        PolicyKind::Auth,
        PolicyKind::RateLimit,
        PolicyKind::Tls,
        PolicyKind::Dns,
    ];

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Auth => "AuthPolicy",
            Self::RateLimit => "RateLimitPolicy",
            Self::Tls => "TLSPolicy",
            Self::Dns => "DNSPolicy",
        }
    }
}

impl std::fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.kind().fmt(f)
    }
}

// === impl Policy ===

impl Policy {
    pub fn new(kind: PolicyKind, namespace: impl ToString, name: impl ToString) -> Self {
        let namespace = namespace.to_string();
        let name = name.to_string();
        Self {
            meta: Meta::new(Locator::new(kind.kind(), Some(&namespace), &name)),
            kind,
            namespace,
            name,
            rules: BTreeMap::new(),
            last_known: None,
        }
    }

    pub fn locator(&self) -> &Locator {
        &self.meta.locator
    }

    pub fn with_rule(mut self, key: impl ToString, value: serde_json::Value) -> Self {
        self.rules.insert(key.to_string(), value);
        self
    }

    /// Whether the policy may contribute rules: it is not being deleted and
    /// the predicate accepts it. Predicate errors exclude the policy.
    pub(crate) fn in_scope(&self, acceptance: &dyn AcceptancePredicate) -> bool {
        if self.meta.deleting {
            return false;
        }
        match acceptance.is_accepted(self) {
            Ok(Validity::Valid) => true,
            Ok(Validity::Invalid(_)) => false,
            Err(error) => {
                tracing::debug!(policy = %self.locator(), %error, "Excluding policy with unknown acceptance");
                false
            }
        }
    }
}

// === impl LastKnownStatus ===

impl AcceptancePredicate for LastKnownStatus {
    fn is_accepted(&self, policy: &Policy) -> Result<Validity, AcceptanceError> {
        policy
            .last_known
            .clone()
            .ok_or_else(|| AcceptanceError::NoStatus(policy.locator().clone()))
    }
}

impl<F> AcceptancePredicate for F
where
    F: Fn(&Policy) -> Result<Validity, AcceptanceError> + Send + Sync,
{
    fn is_accepted(&self, policy: &Policy) -> Result<Validity, AcceptanceError> {
        (self)(policy)
    }
}
