use crate::{
    graph::Graph, AcceptancePredicate, Component, EffectivePolicies, Level, Locator, Policy,
    PolicyKind, Providers, Validity,
};
use ahash::AHashSet as HashSet;
use std::collections::BTreeSet;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ConditionType {
    Accepted,
    Enforced,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Reason {
    Accepted,
    Invalid,
    Enforced,
    NoMatchingRoutes,
    NotApplied,
    Overridden,
    OutOfSync,
    Unknown,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Condition {
    pub type_: ConditionType,
    pub status: ConditionStatus,
    pub reason: Reason,
    pub message: String,
}

/// A component on a gateway that does not yet reflect the latest effective
/// policy.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Lagging {
    pub component: Component,
    pub gateway: Locator,
}

/// The outcome of evaluating an accepted policy against the effective
/// policy index and downstream state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Enforcement {
    /// In effect on every affected gateway. Some rules may have been
    /// shadowed by the listed policies.
    Enforced {
        partially_overridden_by: BTreeSet<Locator>,
    },

    /// No path reaches the policy's target.
    NoMatchingRoutes,

    /// The policy's target is on at least one path, but the policy
    /// contributes nothing: either another policy of the same kind was
    /// chosen for the target, or the policy defines no rules.
    NotApplied { superseded_by: Option<Locator> },

    /// Every rule the policy defines is shadowed on every path.
    Overridden { by: BTreeSet<Locator> },

    /// Sorted by component, then gateway.
    OutOfSync { lagging: Vec<Lagging> },
}

/// The conditions to publish for one policy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PolicyStatus {
    pub kind: PolicyKind,
    pub namespace: String,
    pub name: String,
    pub generation: Option<i64>,
    pub accepted: Condition,

    /// Only evaluated for accepted policies.
    pub enforced: Option<Condition>,
}

#[derive(Debug, thiserror::Error)]
pub enum MissingRequiredStateError {
    #[error("effective {0} policies were not computed in this pass")]
    EffectivePolicies(PolicyKind),

    #[error("gateway {0} has no known gateway class")]
    GatewayClass(Locator),

    #[error("downstream readiness is unavailable in this pass")]
    Readiness,
}

/// Downstream state reported by the reconcilers that materialize artifacts.
pub trait ComponentReadiness: Send + Sync {
    /// Whether the component's artifacts for `gateway` were changed in the
    /// current pass, and so cannot be assumed to be in effect yet.
    fn was_modified(&self, component: Component, gateway: &Locator) -> bool;

    fn is_ready(&self, component: Component, gateway: &Locator) -> bool;
}

/// A frozen set of readiness signals.
#[derive(Clone, Debug, Default)]
pub struct ReadinessSnapshot {
    modified: HashSet<(Component, Locator)>,
    ready: HashSet<(Component, Locator)>,
}

/// Computes policy conditions for a single pass.
pub struct StatusComputer<'a> {
    graph: &'a Graph,
    acceptance: &'a dyn AcceptancePredicate,
    readiness: Option<&'a dyn ComponentReadiness>,
    providers: &'a Providers,

    /// Every node on at least one path.
    routed: HashSet<&'a Locator>,
}

// === impl ConditionType ===

impl ConditionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "Accepted",
            Self::Enforced => "Enforced",
        }
    }
}

// === impl ConditionStatus ===

impl ConditionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::True => "True",
            Self::False => "False",
            Self::Unknown => "Unknown",
        }
    }
}

// === impl Reason ===

impl Reason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "Accepted",
            Self::Invalid => "Invalid",
            Self::Enforced => "Enforced",
            Self::NoMatchingRoutes => "NoMatchingRoutes",
            Self::NotApplied => "NotApplied",
            Self::Overridden => "Overridden",
            Self::OutOfSync => "OutOfSync",
            Self::Unknown => "Unknown",
        }
    }
}

// === impl Condition ===

impl Condition {
    fn new(
        type_: ConditionType,
        status: ConditionStatus,
        reason: Reason,
        message: impl Into<String>,
    ) -> Self {
        Self {
            type_,
            status,
            reason,
            message: message.into(),
        }
    }

    fn unknown(type_: ConditionType, message: impl Into<String>) -> Self {
        Self::new(type_, ConditionStatus::Unknown, Reason::Unknown, message)
    }
}

// === impl Enforcement ===

impl Enforcement {
    pub fn into_condition(self) -> Condition {
        let ty = ConditionType::Enforced;
        match self {
            Self::Enforced {
                partially_overridden_by,
            } if partially_overridden_by.is_empty() => Condition::new(
                ty,
                ConditionStatus::True,
                Reason::Enforced,
                "policy has been successfully enforced",
            ),
            Self::Enforced {
                partially_overridden_by,
            } => Condition::new(
                ty,
                ConditionStatus::True,
                Reason::Enforced,
                format!(
                    "policy has been partially enforced; some rules are overridden by {}",
                    join(&partially_overridden_by)
                ),
            ),
            Self::NoMatchingRoutes => Condition::new(
                ty,
                ConditionStatus::False,
                Reason::NoMatchingRoutes,
                "no matching routes",
            ),
            Self::NotApplied {
                superseded_by: Some(chosen),
            } => Condition::new(
                ty,
                ConditionStatus::False,
                Reason::NotApplied,
                format!("not applied; {chosen} is applied to the same target instead"),
            ),
            Self::NotApplied {
                superseded_by: None,
            } => Condition::new(
                ty,
                ConditionStatus::False,
                Reason::NotApplied,
                "not applied; policy defines no rules",
            ),
            Self::Overridden { by } => Condition::new(
                ty,
                ConditionStatus::False,
                Reason::Overridden,
                format!("overridden by {}", join(&by)),
            ),
            Self::OutOfSync { lagging } => Condition::new(
                ty,
                ConditionStatus::False,
                Reason::OutOfSync,
                format!(
                    "out of sync: {}",
                    lagging
                        .iter()
                        .map(|l| format!("{} on {}", l.component, l.gateway))
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            ),
        }
    }
}

fn join(locators: &BTreeSet<Locator>) -> String {
    locators
        .iter()
        .map(Locator::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

// === impl ReadinessSnapshot ===

impl ReadinessSnapshot {
    pub fn modified(mut self, component: Component, gateway: Locator) -> Self {
        self.modified.insert((component, gateway));
        self
    }

    pub fn ready(mut self, component: Component, gateway: Locator) -> Self {
        self.ready.insert((component, gateway));
        self
    }

    pub fn set_modified(&mut self, component: Component, gateway: Locator) {
        self.modified.insert((component, gateway));
    }

    pub fn set_ready(&mut self, component: Component, gateway: Locator) {
        self.ready.insert((component, gateway));
    }
}

impl ComponentReadiness for ReadinessSnapshot {
    fn was_modified(&self, component: Component, gateway: &Locator) -> bool {
        self.modified.contains(&(component, gateway.clone()))
    }

    fn is_ready(&self, component: Component, gateway: &Locator) -> bool {
        self.ready.contains(&(component, gateway.clone()))
    }
}

// === impl StatusComputer ===

impl<'a> StatusComputer<'a> {
    pub fn new(
        graph: &'a Graph,
        acceptance: &'a dyn AcceptancePredicate,
        readiness: &'a dyn ComponentReadiness,
        providers: &'a Providers,
    ) -> Self {
        Self::build(graph, acceptance, Some(readiness), providers)
    }

    /// A computer for passes whose reconcilers failed. Policies that would
    /// otherwise be checked against downstream state report an unknown
    /// Enforced condition.
    pub fn without_readiness(
        graph: &'a Graph,
        acceptance: &'a dyn AcceptancePredicate,
        providers: &'a Providers,
    ) -> Self {
        Self::build(graph, acceptance, None, providers)
    }

    fn build(
        graph: &'a Graph,
        acceptance: &'a dyn AcceptancePredicate,
        readiness: Option<&'a dyn ComponentReadiness>,
        providers: &'a Providers,
    ) -> Self {
        let routed = graph
            .all_paths()
            .iter()
            .flat_map(|path| path.locators())
            .filter_map(|locator| graph.node(locator).map(|node| node.locator()))
            .collect();
        Self {
            graph,
            acceptance,
            readiness,
            providers,
            routed,
        }
    }

    /// Statuses for every policy of `kind`, sorted by locator.
    ///
    /// `index` is `None` when the kind's resolver did not complete; accepted
    /// policies then report an unknown Enforced condition.
    pub fn statuses(
        &self,
        kind: PolicyKind,
        index: Option<&EffectivePolicies>,
    ) -> Vec<PolicyStatus> {
        self.graph
            .policies(kind)
            .into_iter()
            .map(|policy| self.policy_status(policy, index))
            .collect()
    }

    pub fn policy_status(
        &self,
        policy: &Policy,
        index: Option<&EffectivePolicies>,
    ) -> PolicyStatus {
        let accepted = self.accepted(policy);
        let enforced = (accepted.status == ConditionStatus::True).then(|| {
            match self.enforcement(policy, index) {
                Ok(enforcement) => enforcement.into_condition(),
                Err(error) => {
                    tracing::warn!(policy = %policy.locator(), %error, "Cannot determine enforcement");
                    Condition::unknown(ConditionType::Enforced, error.to_string())
                }
            }
        });
        PolicyStatus {
            kind: policy.kind,
            namespace: policy.namespace.clone(),
            name: policy.name.clone(),
            generation: policy.meta.generation,
            accepted,
            enforced,
        }
    }

    fn accepted(&self, policy: &Policy) -> Condition {
        let ty = ConditionType::Accepted;
        if policy.meta.deleting {
            return Condition::new(
                ty,
                ConditionStatus::False,
                Reason::Invalid,
                "policy is being deleted",
            );
        }
        match self.acceptance.is_accepted(policy) {
            Ok(Validity::Valid) => Condition::new(
                ty,
                ConditionStatus::True,
                Reason::Accepted,
                "policy has been accepted",
            ),
            Ok(Validity::Invalid(message)) => {
                Condition::new(ty, ConditionStatus::False, Reason::Invalid, message)
            }
            Err(error) => Condition::unknown(ty, error.to_string()),
        }
    }

    /// Evaluates an accepted policy against the index and downstream state.
    pub fn enforcement(
        &self,
        policy: &Policy,
        index: Option<&EffectivePolicies>,
    ) -> Result<Enforcement, MissingRequiredStateError> {
        let index = index
            .filter(|idx| idx.kind() == policy.kind)
            .ok_or(MissingRequiredStateError::EffectivePolicies(policy.kind))?;
        let locator = policy.locator();

        let mut affected = Vec::new();
        let mut won_any = false;
        let mut overriders = BTreeSet::new();
        for effective in index.iter() {
            let won = effective.is_sourced_from(locator);
            let lost = effective.overridden_rules_of(locator);
            if !won && lost.is_none() {
                continue;
            }
            won_any |= won;
            overriders.extend(lost.into_iter().flat_map(|l| l.values().cloned()));
            affected.push(effective);
        }

        if affected.is_empty() {
            let routed = self
                .graph
                .target_of(locator)
                .is_some_and(|target| self.routed.contains(target.locator()));
            if !routed {
                return Ok(Enforcement::NoMatchingRoutes);
            }
            let superseded_by = index
                .duplicates()
                .iter()
                .find(|dup| dup.ignored.contains(locator))
                .map(|dup| dup.chosen.clone());
            return Ok(Enforcement::NotApplied { superseded_by });
        }
        if !won_any {
            return Ok(Enforcement::Overridden { by: overriders });
        }

        let readiness = self
            .readiness
            .ok_or(MissingRequiredStateError::Readiness)?;
        let mut lagging = BTreeSet::new();
        let mut seen = HashSet::new();
        for effective in affected {
            let path = &effective.path;
            let Some(gateway) = path.at(Level::Gateway) else {
                continue;
            };
            if !seen.insert(gateway) {
                continue;
            }
            let provider = self.providers.for_path(self.graph, path)?;
            for component in Component::for_policy(policy.kind, provider) {
                if readiness.was_modified(*component, gateway)
                    || !readiness.is_ready(*component, gateway)
                {
                    lagging.insert(Lagging {
                        component: *component,
                        gateway: gateway.clone(),
                    });
                }
            }
        }

        if !lagging.is_empty() {
            return Ok(Enforcement::OutOfSync {
                lagging: lagging.into_iter().collect(),
            });
        }
        Ok(Enforcement::Enforced {
            partially_overridden_by: overriders,
        })
    }
}
