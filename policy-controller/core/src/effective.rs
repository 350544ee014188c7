use crate::{
    graph::Graph, AcceptancePredicate, Locator, Path, PathId, Policy, PolicyKind,
};
use std::collections::{btree_map::Entry, BTreeMap, BTreeSet};

/// A rule that survived the merge, with the policy it came from.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct MergedRule {
    pub spec: serde_json::Value,
    pub source: Locator,
}

/// The merged policy of one kind for one path.
#[derive(Clone, Debug, PartialEq)]
pub struct EffectivePolicy {
    pub kind: PolicyKind,
    pub path: Path,
    pub rules: BTreeMap<String, MergedRule>,

    /// Rules shadowed by a more specific policy:
    /// shadowed policy -> rule key -> winning policy.
    pub overridden: BTreeMap<Locator, BTreeMap<String, Locator>>,
}

/// Several accepted policies of one kind on the same target. Only the chosen
/// one contributes rules.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DuplicateAttachment {
    pub target: Locator,
    pub chosen: Locator,
    pub ignored: Vec<Locator>,
}

/// Effective policies of one kind, keyed by path.
#[derive(Clone, Debug, PartialEq)]
pub struct EffectivePolicies {
    kind: PolicyKind,
    by_path: BTreeMap<PathId, EffectivePolicy>,
    duplicates: Vec<DuplicateAttachment>,
}

/// Merges the policies of `kind` attached along `path`.
///
/// The innermost node's policy wins every rule key it defines; outer policies
/// only fill in keys not yet set. Shadowed rules are recorded against the
/// policy that shadowed them. Returns `None` when no rule is contributed.
pub fn effective_policy_for_path(
    graph: &Graph,
    path: &Path,
    kind: PolicyKind,
    acceptance: &dyn AcceptancePredicate,
) -> Option<EffectivePolicy> {
    let chosen = path
        .locators()
        .filter_map(|target| select(graph, target, kind, acceptance).map(|(p, _)| p))
        .collect::<Vec<_>>();

    let mut rules = BTreeMap::<String, MergedRule>::new();
    let mut overridden = BTreeMap::<Locator, BTreeMap<String, Locator>>::new();
    for policy in chosen.into_iter().rev() {
        for (key, spec) in &policy.rules {
            match rules.entry(key.clone()) {
                Entry::Vacant(entry) => {
                    entry.insert(MergedRule {
                        spec: spec.clone(),
                        source: policy.locator().clone(),
                    });
                }
                Entry::Occupied(entry) => {
                    overridden
                        .entry(policy.locator().clone())
                        .or_default()
                        .insert(key.clone(), entry.get().source.clone());
                }
            }
        }
    }

    if rules.is_empty() {
        return None;
    }
    Some(EffectivePolicy {
        kind,
        path: path.clone(),
        rules,
        overridden,
    })
}

/// Picks the policy of `kind` that governs `target`, along with any
/// accepted policies it displaced. The oldest policy wins; ties go to the
/// smallest locator. Policies without a creation timestamp sort last.
fn select<'g>(
    graph: &'g Graph,
    target: &Locator,
    kind: PolicyKind,
    acceptance: &dyn AcceptancePredicate,
) -> Option<(&'g Policy, Vec<&'g Policy>)> {
    let mut candidates = graph
        .policies_attached_to(target, kind)
        .filter(|p| p.in_scope(acceptance))
        .collect::<Vec<_>>();
    candidates.sort_by(|a, b| {
        let key = |p: &'g Policy| {
            (
                p.meta.creation_timestamp.is_none(),
                p.meta.creation_timestamp,
                p.locator(),
            )
        };
        key(*a).cmp(&key(*b))
    });
    let mut candidates = candidates.into_iter();
    let chosen = candidates.next()?;
    Some((chosen, candidates.collect()))
}

// === impl EffectivePolicy ===

impl EffectivePolicy {
    pub fn id(&self) -> &PathId {
        self.path.id()
    }

    /// Policies that won at least one rule.
    pub fn sources(&self) -> BTreeSet<&Locator> {
        self.rules.values().map(|r| &r.source).collect()
    }

    pub fn is_sourced_from(&self, policy: &Locator) -> bool {
        self.rules.values().any(|r| r.source == *policy)
    }

    /// Rule keys of `policy` that lost to a more specific policy.
    pub fn overridden_rules_of(&self, policy: &Locator) -> Option<&BTreeMap<String, Locator>> {
        self.overridden.get(policy)
    }
}

// === impl EffectivePolicies ===

impl EffectivePolicies {
    /// Computes the effective policy of every path in the graph.
    pub fn compute(graph: &Graph, kind: PolicyKind, acceptance: &dyn AcceptancePredicate) -> Self {
        let duplicates = Self::duplicates_in(graph, kind, acceptance);
        for dup in &duplicates {
            tracing::warn!(
                %kind,
                target = %dup.target,
                chosen = %dup.chosen,
                ignored = ?dup.ignored,
                "Multiple policies target the same object; only the oldest is applied"
            );
        }

        let by_path = graph
            .all_paths()
            .into_iter()
            .filter_map(|path| effective_policy_for_path(graph, &path, kind, acceptance))
            .map(|ep| (ep.id().clone(), ep))
            .collect::<BTreeMap<_, _>>();
        tracing::debug!(%kind, paths = by_path.len(), "Computed effective policies");

        Self {
            kind,
            by_path,
            duplicates,
        }
    }

    pub fn kind(&self) -> PolicyKind {
        self.kind
    }

    pub fn get(&self, id: &PathId) -> Option<&EffectivePolicy> {
        self.by_path.get(id)
    }

    /// Effective policies ordered by path ID.
    pub fn iter(&self) -> impl Iterator<Item = &EffectivePolicy> + '_ {
        self.by_path.values()
    }

    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }

    pub fn duplicates(&self) -> &[DuplicateAttachment] {
        &self.duplicates
    }

    fn duplicates_in(
        graph: &Graph,
        kind: PolicyKind,
        acceptance: &dyn AcceptancePredicate,
    ) -> Vec<DuplicateAttachment> {
        let targets = graph
            .policies(kind)
            .into_iter()
            .filter_map(|p| graph.target_of(p.locator()))
            .map(|n| n.locator())
            .collect::<BTreeSet<_>>();
        targets
            .into_iter()
            .filter_map(|target| {
                let (chosen, ignored) = select(graph, target, kind, acceptance)?;
                if ignored.is_empty() {
                    return None;
                }
                Some(DuplicateAttachment {
                    target: target.clone(),
                    chosen: chosen.locator().clone(),
                    ignored: ignored.into_iter().map(|p| p.locator().clone()).collect(),
                })
            })
            .collect()
    }
}
