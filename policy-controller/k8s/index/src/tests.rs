mod routes;

use crate::{Index, SharedIndex};
use futures::FutureExt;
use gateway_policy_controller_core::{Graph, Level, Locator, PolicyKind};
use gateway_policy_controller_k8s_api::{gateway, policy};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Notify;

struct TestIndex {
    index: SharedIndex,
    changed: Arc<Notify>,
}

// === impl TestIndex ===

impl TestIndex {
    fn new() -> Self {
        let changed = Arc::new(Notify::new());
        let index = Index::shared(changed.clone());
        Self { index, changed }
    }

    /// Consumes the stored change notification, if there is one.
    fn changed(&self) -> bool {
        self.changed.notified().now_or_never().is_some()
    }

    fn graph(&self) -> Graph {
        Graph::from_snapshot(self.index.read().snapshot()).expect("snapshot must be consistent")
    }
}

fn mk_gateway_class(name: &str, controller_name: &str) -> gateway::GatewayClass {
    serde_json::from_value(json!({
        "apiVersion": "gateway.networking.k8s.io/v1beta1",
        "kind": "GatewayClass",
        "metadata": { "name": name },
        "spec": { "controllerName": controller_name },
    }))
    .expect("valid GatewayClass")
}

fn mk_gateway(ns: &str, name: &str, class: &str, listeners: &[&str]) -> gateway::Gateway {
    let listeners = listeners
        .iter()
        .map(|l| json!({ "name": l, "port": 80, "protocol": "HTTP" }))
        .collect::<Vec<_>>();
    serde_json::from_value(json!({
        "apiVersion": "gateway.networking.k8s.io/v1beta1",
        "kind": "Gateway",
        "metadata": { "namespace": ns, "name": name, "generation": 1 },
        "spec": { "gatewayClassName": class, "listeners": listeners },
    }))
    .expect("valid Gateway")
}

/// `parents` are `(gateway, sectionName)` references.
fn mk_route(
    ns: &str,
    name: &str,
    parents: &[(&str, Option<&str>)],
    rules: usize,
) -> gateway::HttpRoute {
    let parents = parents
        .iter()
        .map(|(gw, section)| match section {
            Some(section) => json!({ "name": gw, "sectionName": section }),
            None => json!({ "name": gw }),
        })
        .collect::<Vec<_>>();
    let rules = (0..rules).map(|_| json!({})).collect::<Vec<_>>();
    serde_json::from_value(json!({
        "apiVersion": "gateway.networking.k8s.io/v1beta1",
        "kind": "HTTPRoute",
        "metadata": { "namespace": ns, "name": name },
        "spec": { "parentRefs": parents, "rules": rules },
    }))
    .expect("valid HTTPRoute")
}

fn mk_auth_policy(
    ns: &str,
    name: &str,
    target: serde_json::Value,
    status: Option<serde_json::Value>,
) -> policy::AuthPolicy {
    let mut manifest = json!({
        "apiVersion": "kuadrant.io/v1",
        "kind": "AuthPolicy",
        "metadata": { "namespace": ns, "name": name, "generation": 2 },
        "spec": {
            "targetRef": target,
            "rules": { "authn": { "apiKey": { "selector": "app=frontend" } } },
        },
    });
    if let Some(status) = status {
        manifest["status"] = status;
    }
    serde_json::from_value(manifest).expect("valid AuthPolicy")
}

fn target(kind: &str, name: &str, section: Option<&str>) -> serde_json::Value {
    let mut target = json!({
        "group": "gateway.networking.k8s.io",
        "kind": kind,
        "name": name,
    });
    if let Some(section) = section {
        target["sectionName"] = json!(section);
    }
    target
}

fn gateway_locator(name: &str) -> Locator {
    Locator::new(Level::Gateway.kind(), Some("ns"), name)
}

fn listener_locator(gw: &str, name: &str) -> Locator {
    Locator::section(Level::Listener.kind(), &gateway_locator(gw), name)
}

fn route_locator(name: &str) -> Locator {
    Locator::new(Level::Route.kind(), Some("ns"), name)
}

fn auth_locator(name: &str) -> Locator {
    Locator::new(PolicyKind::Auth.kind(), Some("ns"), name)
}
