use super::*;
use crate::{effective_policy_for_path, EffectivePolicies, MergedRule};
use maplit::btreemap;
use pretty_assertions::assert_eq;
use serde_json::json;

#[test]
fn gateway_policy_applies_to_every_listener() {
    let p1 = auth("p1").with_rule("x", json!(1));
    let graph = two_listeners().policy(p1.clone(), gateway("gw")).build();

    let index = EffectivePolicies::compute(&graph, PolicyKind::Auth, &accept_all);
    assert_eq!(index.len(), 2);
    for effective in index.iter() {
        assert_eq!(
            effective.rules,
            btreemap! {
                "x".to_string() => MergedRule { spec: json!(1), source: p1.locator().clone() },
            }
        );
        assert!(effective.overridden.is_empty());
    }
}

#[test]
fn route_policy_overrides_gateway_policy() {
    let p1 = auth("p1").with_rule("x", json!(1));
    let p2 = auth("p2").with_rule("x", json!(2));
    let graph = two_listeners()
        .policy(p1.clone(), gateway("gw"))
        .policy(p2.clone(), route("r"))
        .build();

    let index = EffectivePolicies::compute(&graph, PolicyKind::Auth, &accept_all);
    assert_eq!(index.len(), 2);
    for effective in index.iter() {
        assert_eq!(effective.rules["x"].spec, json!(2));
        assert_eq!(effective.rules["x"].source, *p2.locator());
        assert_eq!(
            effective.overridden,
            btreemap! {
                p1.locator().clone() => btreemap! { "x".to_string() => p2.locator().clone() },
            }
        );
    }
}

#[test]
fn innermost_wins_per_rule() {
    let a = auth("a").with_rule("r1", json!("gw")).with_rule("r2", json!("gw"));
    let b = auth("b").with_rule("r1", json!("rule"));
    let graph = two_listeners()
        .policy(a.clone(), gateway("gw"))
        .policy(b.clone(), rule("r", 0))
        .build();
    let path = &graph.all_paths()[0];

    let effective = effective_policy_for_path(&graph, path, PolicyKind::Auth, &accept_all)
        .expect("rules are contributed");
    assert_eq!(
        effective.rules,
        btreemap! {
            "r1".to_string() => MergedRule { spec: json!("rule"), source: b.locator().clone() },
            "r2".to_string() => MergedRule { spec: json!("gw"), source: a.locator().clone() },
        }
    );
    assert_eq!(
        effective.overridden_rules_of(a.locator()),
        Some(&btreemap! { "r1".to_string() => b.locator().clone() })
    );
    assert_eq!(effective.overridden_rules_of(b.locator()), None);
}

#[test]
fn every_level_participates() {
    let graph = two_listeners()
        .policy(auth("c").with_rule("class", json!(0)), class("istio"))
        .policy(auth("g").with_rule("gateway", json!(1)), gateway("gw"))
        .policy(auth("l").with_rule("listener", json!(2)), listener("gw", "l1"))
        .policy(auth("r").with_rule("route", json!(3)), route("r"))
        .policy(auth("rr").with_rule("rule", json!(4)), rule("r", 0))
        .build();

    let index = EffectivePolicies::compute(&graph, PolicyKind::Auth, &accept_all);
    let by_listener = index
        .iter()
        .map(|ep| {
            (
                ep.path.at(Level::Listener).cloned(),
                ep.rules.keys().cloned().collect::<Vec<_>>(),
            )
        })
        .collect::<std::collections::BTreeMap<_, _>>();
    assert_eq!(
        by_listener[&Some(listener("gw", "l1"))],
        vec!["class", "gateway", "listener", "route", "rule"]
    );
    assert_eq!(
        by_listener[&Some(listener("gw", "l2"))],
        vec!["class", "gateway", "route", "rule"]
    );
}

#[test]
fn other_kinds_are_ignored() {
    let graph = two_listeners()
        .policy(
            Policy::new(PolicyKind::RateLimit, "ns", "rl").with_rule("x", json!(1)),
            gateway("gw"),
        )
        .build();

    assert!(EffectivePolicies::compute(&graph, PolicyKind::Auth, &accept_all).is_empty());
    assert_eq!(
        EffectivePolicies::compute(&graph, PolicyKind::RateLimit, &accept_all).len(),
        2
    );
}

#[test]
fn no_rules_no_effective_policy() {
    let graph = two_listeners().policy(auth("empty"), gateway("gw")).build();
    let path = &graph.all_paths()[0];

    assert_eq!(
        effective_policy_for_path(&graph, path, PolicyKind::Auth, &accept_all),
        None
    );
}

#[test]
fn unaccepted_and_deleting_policies_are_excluded() {
    let mut deleting = auth("deleting").with_rule("x", json!("deleting"));
    deleting.meta.deleting = true;
    let invalid = auth("invalid").with_rule("x", json!("invalid"));
    let valid = auth("valid").with_rule("x", json!("valid"));

    let graph = two_listeners()
        .policy(deleting, rule("r", 0))
        .policy(invalid, route("r"))
        .policy(valid.clone(), gateway("gw"))
        .build();

    let reject_invalid = |p: &Policy| -> Result<Validity, AcceptanceError> {
        if p.name == "invalid" {
            Ok(Validity::Invalid("bad".to_string()))
        } else {
            Ok(Validity::Valid)
        }
    };
    let index = EffectivePolicies::compute(&graph, PolicyKind::Auth, &reject_invalid);
    for effective in index.iter() {
        assert_eq!(effective.rules["x"].source, *valid.locator());
        assert!(effective.overridden.is_empty());
    }
}

#[test]
fn acceptance_errors_exclude_the_policy() {
    let graph = two_listeners()
        .policy(auth("p1").with_rule("x", json!(1)), gateway("gw"))
        .build();

    // No status has been recorded, so the fallback predicate cannot decide.
    let index = EffectivePolicies::compute(&graph, PolicyKind::Auth, &crate::LastKnownStatus);
    assert!(index.is_empty());
}

#[test]
fn oldest_duplicate_wins() {
    let mut older = auth("older").with_rule("x", json!("older"));
    older.meta.creation_timestamp = Some(created_at(100));
    let mut newer = auth("a-newer").with_rule("x", json!("newer"));
    newer.meta.creation_timestamp = Some(created_at(200));

    let graph = two_listeners()
        .policy(newer.clone(), gateway("gw"))
        .policy(older.clone(), gateway("gw"))
        .build();

    let index = EffectivePolicies::compute(&graph, PolicyKind::Auth, &accept_all);
    for effective in index.iter() {
        assert_eq!(effective.rules["x"].source, *older.locator());
        assert!(
            effective.overridden.is_empty(),
            "ignored duplicates are not overridden"
        );
    }

    let dups = index.duplicates();
    assert_eq!(dups.len(), 1);
    assert_eq!(dups[0].target, gateway("gw"));
    assert_eq!(dups[0].chosen, *older.locator());
    assert_eq!(dups[0].ignored, vec![newer.locator().clone()]);
}

#[test]
fn duplicate_tie_breaks_by_locator() {
    let graph = two_listeners()
        .policy(auth("b").with_rule("x", json!("b")), gateway("gw"))
        .policy(auth("a").with_rule("x", json!("a")), gateway("gw"))
        .build();

    let index = EffectivePolicies::compute(&graph, PolicyKind::Auth, &accept_all);
    for effective in index.iter() {
        assert_eq!(effective.rules["x"].spec, json!("a"));
    }
}

#[test]
fn merge_is_deterministic() {
    let build = || {
        two_listeners()
            .policy(auth("a").with_rule("x", json!(1)).with_rule("y", json!(1)), gateway("gw"))
            .policy(auth("b").with_rule("y", json!(2)), listener("gw", "l2"))
            .policy(auth("c").with_rule("z", json!(3)), rule("r", 0))
            .build()
    };
    let first = EffectivePolicies::compute(&build(), PolicyKind::Auth, &accept_all);
    let second = EffectivePolicies::compute(&build(), PolicyKind::Auth, &accept_all);
    assert_eq!(first, second);

    let graph = build();
    let path = &graph.all_paths()[1];
    assert_eq!(
        effective_policy_for_path(&graph, path, PolicyKind::Auth, &accept_all),
        effective_policy_for_path(&graph, path, PolicyKind::Auth, &accept_all),
    );
}
