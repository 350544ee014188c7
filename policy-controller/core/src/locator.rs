use std::fmt;

/// The stable identity of a graph node.
///
/// A locator is derived only from an object's kind, namespace and name (plus a
/// section name for objects nested inside another resource), so the same
/// object yields the same locator in every pass and across restarts.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
#[serde(transparent)]
pub struct Locator(String);

// === impl Locator ===

impl Locator {
    /// Locates a top-level object. Cluster-scoped objects have no namespace.
    pub fn new(kind: &str, namespace: Option<&str>, name: &str) -> Self {
        let kind = kind.to_ascii_lowercase();
        match namespace {
            Some(ns) => Self(format!("{kind}:{ns}/{name}")),
            None => Self(format!("{kind}:{name}")),
        }
    }

    /// Locates a named section of `parent`, e.g. a gateway's listener.
    pub fn section(kind: &str, parent: &Locator, section: impl fmt::Display) -> Self {
        let parent_id = parent
            .0
            .split_once(':')
            .map(|(_, id)| id)
            .unwrap_or(&parent.0);
        Self(format!(
            "{}:{parent_id}#{section}",
            kind.to_ascii_lowercase()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The lowercased kind prefix.
    pub fn kind(&self) -> &str {
        self.0.split_once(':').map(|(kind, _)| kind).unwrap_or("")
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for Locator {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespaced_and_cluster_scoped() {
        assert_eq!(
            Locator::new("Gateway", Some("ns"), "gw").as_str(),
            "gateway:ns/gw"
        );
        assert_eq!(
            Locator::new("GatewayClass", None, "istio").as_str(),
            "gatewayclass:istio"
        );
    }

    #[test]
    fn sections_keep_parent_identity() {
        let gw = Locator::new("Gateway", Some("ns"), "gw");
        let listener = Locator::section("Listener", &gw, "http");
        assert_eq!(listener.as_str(), "listener:ns/gw#http");
        assert_eq!(listener.kind(), "listener");
    }
}
