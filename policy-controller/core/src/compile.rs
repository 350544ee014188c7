//! Groups effective policies into downstream artifacts.
//!
//! The output is canonical: artifacts are keyed and ordered by
//! [`ArtifactKey`], and entries within an artifact are ordered by path ID, so
//! compiling an unchanged index always produces identical bytes. Encoding into
//! each downstream system's own format happens elsewhere.

use crate::{
    graph::Graph, ArtifactScope, Component, EffectivePolicies, EffectivePolicy, Level, Locator,
    MergedRule, PathId, PolicyKind, Providers,
};
use std::collections::{btree_map::Entry as MapEntry, BTreeMap};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct ArtifactKey {
    pub kind: PolicyKind,
    pub component: Component,
    pub name: String,
}

/// The rules that apply to a single path.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct Entry {
    pub path_id: PathId,
    pub route_rule: Option<Locator>,
    pub rules: BTreeMap<String, MergedRule>,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct Artifact {
    pub key: ArtifactKey,
    pub gateway: Locator,
    pub entries: Vec<Entry>,

    /// Set by the backing store on materialized artifacts. Never compared.
    #[serde(skip)]
    pub resource_version: Option<String>,
}

/// All artifacts for one policy kind.
#[derive(Clone, Debug, PartialEq)]
pub struct CompiledConfig {
    kind: PolicyKind,
    artifacts: BTreeMap<ArtifactKey, Artifact>,
}

/// What a downstream reconciler must do to converge on a [`CompiledConfig`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Changes {
    pub create: Vec<Artifact>,
    pub update: Vec<Artifact>,
    pub delete: Vec<ArtifactKey>,
}

// === impl Artifact ===

impl Artifact {
    fn new(key: ArtifactKey, gateway: Locator) -> Self {
        Self {
            key,
            gateway,
            entries: Vec::new(),
            resource_version: None,
        }
    }

    /// Compares only the fields this crate owns.
    pub fn spec_eq(&self, other: &Artifact) -> bool {
        self.key == other.key && self.gateway == other.gateway && self.entries == other.entries
    }
}

// === impl CompiledConfig ===

impl CompiledConfig {
    /// Compiles an effective-policy index.
    ///
    /// Paths whose gateway class cannot be resolved are skipped; the status
    /// computation reports them.
    pub fn compile(index: &EffectivePolicies, graph: &Graph, providers: &Providers) -> Self {
        let kind = index.kind();
        let mut artifacts = BTreeMap::new();

        for effective in index.iter() {
            let path = &effective.path;
            let Some(gateway) = path.at(Level::Gateway) else {
                continue;
            };
            let provider = match providers.for_path(graph, path) {
                Ok(provider) => provider,
                Err(error) => {
                    tracing::debug!(path = %path, %error, "Skipping path");
                    continue;
                }
            };

            for component in Component::for_policy(kind, provider) {
                let Some(name) = artifact_name(*component, effective) else {
                    continue;
                };
                let key = ArtifactKey {
                    kind,
                    component: *component,
                    name,
                };
                artifacts
                    .entry(key.clone())
                    .or_insert_with(|| Artifact::new(key, gateway.clone()))
                    .entries
                    .push(Entry {
                        path_id: effective.id().clone(),
                        route_rule: path.at(Level::RouteRule).cloned(),
                        rules: effective.rules.clone(),
                    });
            }
        }

        // The index iterates in path ID order, but keep the invariant local.
        for artifact in artifacts.values_mut() {
            artifact
                .entries
                .sort_by(|a: &Entry, b: &Entry| a.path_id.cmp(&b.path_id));
        }

        Self { kind, artifacts }
    }

    pub fn kind(&self) -> PolicyKind {
        self.kind
    }

    pub fn get(&self, key: &ArtifactKey) -> Option<&Artifact> {
        self.artifacts.get(key)
    }

    pub fn artifacts(&self) -> impl Iterator<Item = &Artifact> + '_ {
        self.artifacts.values()
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// Artifacts for one gateway, in key order.
    pub fn for_gateway<'c>(&'c self, gateway: &'c Locator) -> impl Iterator<Item = &'c Artifact> + 'c {
        self.artifacts.values().filter(move |a| a.gateway == *gateway)
    }

    pub fn to_canonical_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(&self.artifacts.values().collect::<Vec<_>>())
    }

    /// Diffs against materialized artifacts by spec fields only. Existing
    /// artifacts of other policy kinds are left alone.
    pub fn diff(&self, existing: impl IntoIterator<Item = Artifact>) -> Changes {
        let mut existing = existing
            .into_iter()
            .filter(|a| a.key.kind == self.kind)
            .map(|a| (a.key.clone(), a))
            .collect::<BTreeMap<_, _>>();

        let mut changes = Changes::default();
        for (key, desired) in &self.artifacts {
            match existing.entry(key.clone()) {
                MapEntry::Vacant(_) => changes.create.push(desired.clone()),
                MapEntry::Occupied(entry) => {
                    let current = entry.remove();
                    if !desired.spec_eq(&current) {
                        changes.update.push(Artifact {
                            resource_version: current.resource_version,
                            ..desired.clone()
                        });
                    }
                }
            }
        }
        changes.delete = existing.into_keys().collect();
        changes
    }
}

fn artifact_name(component: Component, effective: &EffectivePolicy) -> Option<String> {
    let path = &effective.path;
    let scope = match component.scope() {
        ArtifactScope::PerPath => return Some(effective.id().to_string()),
        ArtifactScope::PerListener => path.at(Level::Listener)?,
        ArtifactScope::PerGateway => path.at(Level::Gateway)?,
    };
    let hash = PathId::for_locators([scope]);
    // Path IDs are 64 hex characters; names keep the first 16.
    let short = hash.as_str().get(..16).unwrap_or(hash.as_str());
    Some(format!("{}-{short}", component.kind().to_ascii_lowercase()))
}
