use super::*;
use gateway_policy_controller_core::ISTIO_CONTROLLER_NAME;
use kubert::index::IndexNamespacedResource;
use pretty_assertions::assert_eq;

#[test]
fn routes_bind_to_every_listener_by_default() {
    let test = TestIndex::new();
    test.index
        .write()
        .apply_gateway_class(mk_gateway_class("istio", ISTIO_CONTROLLER_NAME));
    test.index
        .write()
        .apply(mk_gateway("ns", "gw", "istio", &["l2", "l1"]));
    test.index
        .write()
        .apply(mk_route("ns", "r", &[("gw", None)], 2));

    let graph = test.graph();
    let paths = graph.all_paths();
    assert_eq!(paths.len(), 4, "two listeners by two rules");
    assert_eq!(
        paths[0].locators().map(Locator::to_string).collect::<Vec<_>>(),
        vec![
            "gatewayclass:istio",
            "gateway:ns/gw",
            "listener:ns/gw#l1",
            "httproute:ns/r",
            "httprouterule:ns/r#rule-0",
        ]
    );

    let listener = graph
        .node(&listener_locator("gw", "l1"))
        .expect("listener must be indexed");
    assert_eq!(listener.meta().generation, Some(1));
}

#[test]
fn section_names_select_listeners() {
    let test = TestIndex::new();
    test.index
        .write()
        .apply_gateway_class(mk_gateway_class("istio", ISTIO_CONTROLLER_NAME));
    test.index
        .write()
        .apply(mk_gateway("ns", "gw", "istio", &["l1", "l2"]));
    test.index
        .write()
        .apply(mk_route("ns", "r", &[("gw", Some("l2")), ("gw", Some("l3"))], 1));

    let graph = test.graph();
    let parents = graph
        .parents(&route_locator("r"))
        .map(|n| n.locator().clone())
        .collect::<Vec<_>>();
    assert_eq!(parents, vec![listener_locator("gw", "l2")]);
}

#[test]
fn unknown_parents_are_skipped() {
    let test = TestIndex::new();
    test.index
        .write()
        .apply(mk_route("ns", "r", &[("missing", None)], 1));

    let snapshot = test.index.read().snapshot();
    assert_eq!(snapshot.nodes.len(), 2, "route and its rule");
    assert_eq!(snapshot.hierarchy_edges.len(), 1, "route to rule only");
    assert!(test.graph().all_paths().is_empty());
}

#[test]
fn gateways_without_a_known_class_have_no_paths() {
    let test = TestIndex::new();
    test.index
        .write()
        .apply(mk_gateway("ns", "gw", "missing", &["l1"]));
    test.index
        .write()
        .apply(mk_route("ns", "r", &[("gw", None)], 1));

    let graph = test.graph();
    assert!(graph.node(&gateway_locator("gw")).is_some());
    assert!(graph.all_paths().is_empty());

    test.index
        .write()
        .apply_gateway_class(mk_gateway_class("missing", "example.com/gateway"));
    assert_eq!(test.graph().all_paths().len(), 1);
}

#[test]
fn changes_notify() {
    let test = TestIndex::new();
    assert!(!test.changed());

    let gw = mk_gateway("ns", "gw", "istio", &["l1"]);
    test.index.write().apply(gw.clone());
    assert!(test.changed());

    // Reapplying an unchanged object is not a change.
    test.index.write().apply(gw);
    assert!(!test.changed());

    // Multiple changes are coalesced into a single notification.
    test.index
        .write()
        .apply(mk_gateway("ns", "gw", "istio", &["l1", "l2"]));
    test.index
        .write()
        .apply(mk_route("ns", "r", &[("gw", None)], 1));
    assert!(test.changed());
    assert!(!test.changed());

    IndexNamespacedResource::<gateway::HttpRoute>::delete(
        &mut *test.index.write(),
        "ns".to_string(),
        "r".to_string(),
    );
    assert!(test.changed());

    // Deleting an unknown object is not a change.
    IndexNamespacedResource::<gateway::HttpRoute>::delete(
        &mut *test.index.write(),
        "ns".to_string(),
        "r".to_string(),
    );
    assert!(!test.changed());

    test.index.write().delete_gateway_class("istio".to_string());
    assert!(!test.changed());
}

#[test]
fn resetting_gateway_classes() {
    let test = TestIndex::new();
    test.index
        .write()
        .apply_gateway_class(mk_gateway_class("istio", ISTIO_CONTROLLER_NAME));
    test.index
        .write()
        .apply(mk_gateway("ns", "gw", "other", &["l1"]));
    test.index
        .write()
        .apply(mk_route("ns", "r", &[("gw", None)], 1));
    assert!(test.changed());
    assert!(test.graph().all_paths().is_empty());

    test.index
        .write()
        .reset_gateway_classes(vec![mk_gateway_class("other", "example.com/gateway")]);
    assert!(test.changed());
    let graph = test.graph();
    assert!(graph
        .node(&Locator::new(Level::GatewayClass.kind(), None, "istio"))
        .is_none());
    assert_eq!(graph.all_paths().len(), 1);

    test.index
        .write()
        .reset_gateway_classes(vec![mk_gateway_class("other", "example.com/gateway")]);
    assert!(!test.changed());
}
