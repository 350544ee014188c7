use crate::{Level, Locator};
use sha2::{Digest, Sha256};
use std::fmt;

/// A content-addressed path identifier.
///
/// Downstream artifact names are derived from it, so it must be identical
/// for identical paths across passes and process restarts.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
#[serde(transparent)]
pub struct PathId(String);

/// One node of a path.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Step {
    pub level: Level,
    pub locator: Locator,
}

/// An ordered walk through the hierarchy, outermost node first.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Path {
    id: PathId,
    steps: Vec<Step>,
}

// === impl PathId ===

impl PathId {
    /// Hashes the locators in order. Each locator is NUL-terminated, which
    /// cannot occur in an object name, so distinct sequences never collide
    /// by concatenation.
    pub fn for_locators<'l>(locators: impl IntoIterator<Item = &'l Locator>) -> Self {
        let mut hasher = Sha256::new();
        for locator in locators {
            hasher.update(locator.as_str().as_bytes());
            hasher.update([0u8]);
        }
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PathId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// === impl Path ===

impl Path {
    pub fn new(steps: Vec<Step>) -> Self {
        let id = PathId::for_locators(steps.iter().map(|s| &s.locator));
        Self { id, steps }
    }

    pub fn id(&self) -> &PathId {
        &self.id
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn locators(&self) -> impl Iterator<Item = &Locator> + '_ {
        self.steps.iter().map(|s| &s.locator)
    }

    /// The locator of the node at `level`, if the path passes through it.
    pub fn at(&self, level: Level) -> Option<&Locator> {
        self.steps
            .iter()
            .find(|s| s.level == level)
            .map(|s| &s.locator)
    }

    pub fn contains(&self, locator: &Locator) -> bool {
        self.locators().any(|l| l == locator)
    }

    /// The innermost node.
    pub fn leaf(&self) -> Option<&Locator> {
        self.steps.last().map(|s| &s.locator)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                f.write_str(" -> ")?;
            }
            step.locator.fmt(f)?;
        }
        Ok(())
    }
}
