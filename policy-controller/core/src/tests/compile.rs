use super::*;
use crate::{
    compile::{Artifact, ArtifactKey},
    Component, CompiledConfig, EffectivePolicies, Providers,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn compiled(graph: &Graph, kind: PolicyKind) -> CompiledConfig {
    let index = EffectivePolicies::compute(graph, kind, &accept_all);
    CompiledConfig::compile(&index, graph, &Providers::default())
}

#[test]
fn groups_by_gateway_and_component() {
    let graph = two_listeners()
        .policy(auth("p1").with_rule("x", json!(1)), gateway("gw"))
        .build();
    let config = compiled(&graph, PolicyKind::Auth);

    let count = |component| {
        config
            .artifacts()
            .filter(|a| a.key.component == component)
            .count()
    };
    // Auth configs are per path; proxy filters are per gateway.
    assert_eq!(count(Component::AuthConfig), 2);
    assert_eq!(count(Component::IstioEnvoyFilter), 1);
    assert_eq!(count(Component::IstioWasmPlugin), 1);
    assert_eq!(config.len(), 4);

    let wasm = config
        .artifacts()
        .find(|a| a.key.component == Component::IstioWasmPlugin)
        .expect("wasm plugin must be compiled");
    assert_eq!(wasm.gateway, gateway("gw"));
    assert_eq!(wasm.entries.len(), 2);
    assert!(wasm.entries[0].path_id < wasm.entries[1].path_id);
    assert_eq!(wasm.entries[0].route_rule, Some(rule("r", 0)));

    for auth_config in config
        .artifacts()
        .filter(|a| a.key.component == Component::AuthConfig)
    {
        assert_eq!(auth_config.entries.len(), 1);
        assert_eq!(auth_config.key.name, auth_config.entries[0].path_id.as_str());
    }
    assert_eq!(config.for_gateway(&gateway("gw")).count(), 4);
    assert_eq!(config.for_gateway(&gateway("other")).count(), 0);
}

#[test]
fn per_listener_artifacts() {
    let tls = Policy::new(PolicyKind::Tls, "ns", "tls").with_rule("issuer", json!("letsencrypt"));
    let graph = two_listeners().policy(tls, gateway("gw")).build();
    let config = compiled(&graph, PolicyKind::Tls);

    assert_eq!(config.len(), 2);
    assert!(config
        .artifacts()
        .all(|a| a.key.component == Component::Certificate && a.entries.len() == 1));
    assert!(config
        .artifacts()
        .all(|a| a.key.name.starts_with("certificate-")));
}

#[test]
fn shared_artifacts_are_named_by_scope() {
    let graph = two_listeners()
        .policy(auth("p1").with_rule("x", json!(1)), gateway("gw"))
        .build();
    let config = compiled(&graph, PolicyKind::Auth);

    let wasm = config
        .artifacts()
        .find(|a| a.key.component == Component::IstioWasmPlugin)
        .expect("wasm plugin must be compiled");
    let hash = crate::PathId::for_locators([&gateway("gw")]);
    assert_eq!(hash.as_str().len(), 64);
    assert_eq!(
        wasm.key.name,
        format!("wasmplugin-{}", &hash.as_str()[..16])
    );
}

#[test]
fn compilation_is_idempotent() {
    let build = || {
        two_listeners()
            .policy(
                Policy::new(PolicyKind::RateLimit, "ns", "gw-limits")
                    .with_rule("global", json!({"limit": 100, "window": "1m"})),
                gateway("gw"),
            )
            .policy(
                Policy::new(PolicyKind::RateLimit, "ns", "route-limits")
                    .with_rule("per-user", json!({"limit": 5, "window": "10s"})),
                route("r"),
            )
            .build()
    };
    let first = compiled(&build(), PolicyKind::RateLimit);
    let second = compiled(&build(), PolicyKind::RateLimit);

    assert_eq!(first, second);
    assert_eq!(
        first.to_canonical_json().expect("must serialize"),
        second.to_canonical_json().expect("must serialize")
    );
    assert!(second
        .diff(first.artifacts().cloned())
        .eq(&Default::default()));
}

#[test]
fn paths_without_gateway_class_are_skipped() {
    let mut topology = Topology::default()
        .gateway("missing", "gw", &["l1"])
        .route("r", &[("gw", "l1")], 1)
        .policy(auth("p1").with_rule("x", json!(1)), gateway("gw"));
    topology
        .snapshot
        .hierarchy_edges
        .retain(|(parent, _)| *parent != class("missing"));
    let graph = Graph::from_snapshot(topology.snapshot).expect("topology must be consistent");

    assert!(compiled(&graph, PolicyKind::Auth).is_empty());
}

#[test]
fn diff_by_spec_fields() {
    let graph = two_listeners()
        .policy(auth("p1").with_rule("x", json!(1)), gateway("gw"))
        .build();
    let desired = compiled(&graph, PolicyKind::Auth);

    // Nothing materialized yet.
    let changes = desired.diff(Vec::new());
    assert_eq!(changes.create.len(), 4);
    assert!(changes.update.is_empty());
    assert!(changes.delete.is_empty());

    // Server-managed metadata does not cause churn.
    let materialized = desired
        .artifacts()
        .cloned()
        .map(|a| Artifact {
            resource_version: Some("42".to_string()),
            ..a
        })
        .collect::<Vec<_>>();
    let changes = desired.diff(materialized.clone());
    assert!(changes.create.is_empty());
    assert!(changes.update.is_empty());
    assert!(changes.delete.is_empty());

    // A changed rule is an update that keeps the stored resource version.
    let mut stale = materialized.clone();
    let wasm = stale
        .iter_mut()
        .find(|a| a.key.component == Component::IstioWasmPlugin)
        .expect("wasm plugin must be compiled");
    wasm.entries[0]
        .rules
        .get_mut("x")
        .expect("rule x must be compiled")
        .spec = json!(0);
    let stale_artifact = ArtifactKey {
        kind: PolicyKind::Auth,
        component: Component::AuthConfig,
        name: "gone".to_string(),
    };
    let mut gone = materialized[0].clone();
    gone.key = stale_artifact.clone();
    stale.push(gone);
    let mut other_kind = materialized[0].clone();
    other_kind.key.kind = PolicyKind::RateLimit;
    stale.push(other_kind);

    let changes = desired.diff(stale);
    assert!(changes.create.is_empty());
    assert_eq!(changes.update.len(), 1);
    assert_eq!(changes.update[0].key.component, Component::IstioWasmPlugin);
    assert_eq!(changes.update[0].resource_version.as_deref(), Some("42"));
    assert_eq!(changes.update[0].entries[0].rules["x"].spec, json!(1));
    assert_eq!(changes.delete, vec![stale_artifact]);
}
