use crate::core::{
    compile::{Artifact, ArtifactKey},
    CompiledConfig, Component, ComponentReadiness, Locator, ReadinessSnapshot,
};
use ahash::AHashSet as HashSet;
use anyhow::Result;
use parking_lot::Mutex;
use std::{collections::BTreeMap, sync::Arc};

/// Materializes compiled configs in downstream systems and reports how far
/// each component has converged.
#[async_trait::async_trait]
pub trait Reconcile: Send + Sync {
    /// Converges downstream state on `configs`. Artifacts of kinds with no
    /// config in `configs` are left alone.
    async fn reconcile(&self, configs: &[CompiledConfig]) -> Result<Arc<dyn ComponentReadiness>>;
}

/// Keeps materialized artifacts in memory.
///
/// Components whose artifacts on a gateway change in a pass are reported as
/// modified in that pass; all other compiled components are ready.
#[derive(Debug, Default)]
pub struct InMemoryReconciler {
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    artifacts: BTreeMap<ArtifactKey, Artifact>,
    version: u64,
}

// === impl InMemoryReconciler ===

impl InMemoryReconciler {
    /// Materialized artifacts, ordered by key.
    pub fn artifacts(&self) -> Vec<Artifact> {
        self.state.lock().artifacts.values().cloned().collect()
    }
}

#[async_trait::async_trait]
impl Reconcile for InMemoryReconciler {
    async fn reconcile(&self, configs: &[CompiledConfig]) -> Result<Arc<dyn ComponentReadiness>> {
        let mut state = self.state.lock();
        let mut modified = HashSet::<(Component, Locator)>::default();

        for config in configs {
            let changes = config.diff(state.artifacts.values().cloned());
            tracing::debug!(
                kind = %config.kind(),
                create = changes.create.len(),
                update = changes.update.len(),
                delete = changes.delete.len(),
                "Reconciling artifacts"
            );

            for key in changes.delete {
                if let Some(artifact) = state.artifacts.remove(&key) {
                    modified.insert((key.component, artifact.gateway));
                }
            }
            for mut artifact in changes.create.into_iter().chain(changes.update) {
                state.version += 1;
                artifact.resource_version = Some(state.version.to_string());
                modified.insert((artifact.key.component, artifact.gateway.clone()));
                state.artifacts.insert(artifact.key.clone(), artifact);
            }
        }

        let mut readiness = ReadinessSnapshot::default();
        for config in configs {
            for artifact in config.artifacts() {
                let component = artifact.key.component;
                if modified.contains(&(component, artifact.gateway.clone())) {
                    readiness.set_modified(component, artifact.gateway.clone());
                } else {
                    readiness.set_ready(component, artifact.gateway.clone());
                }
            }
        }
        Ok(Arc::new(readiness))
    }
}
