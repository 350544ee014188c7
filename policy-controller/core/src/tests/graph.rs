use super::*;
use crate::InconsistentGraphError;

#[test]
fn queries() {
    let graph = two_listeners()
        .policy(auth("p1"), gateway("gw"))
        .build();

    let roots = graph
        .roots()
        .into_iter()
        .map(|n| n.locator().clone())
        .collect::<Vec<_>>();
    assert_eq!(roots, vec![class("istio")]);

    let children = graph
        .children(&gateway("gw"))
        .map(|n| n.locator().clone())
        .collect::<Vec<_>>();
    assert_eq!(children, vec![listener("gw", "l1"), listener("gw", "l2")]);

    let parents = graph
        .parents(&route("r"))
        .map(|n| n.locator().clone())
        .collect::<Vec<_>>();
    assert_eq!(parents, vec![listener("gw", "l1"), listener("gw", "l2")]);

    let attached = graph
        .policies_attached_to(&gateway("gw"), PolicyKind::Auth)
        .map(|p| p.locator().clone())
        .collect::<Vec<_>>();
    assert_eq!(attached, vec![auth("p1").locator().clone()]);
    assert_eq!(
        graph
            .policies_attached_to(&gateway("gw"), PolicyKind::RateLimit)
            .count(),
        0
    );

    assert_eq!(
        graph.target_of(auth("p1").locator()).map(Node::locator),
        Some(&gateway("gw"))
    );
}

#[test]
fn rejects_attachment_to_missing_target() {
    let mut topology = two_listeners();
    topology.snapshot.nodes.push(Node::Policy(auth("p1")));
    topology
        .snapshot
        .attachment_edges
        .push((auth("p1").locator().clone(), gateway("missing")));

    let error = Graph::from_snapshot(topology.snapshot).expect_err("target is missing");
    assert_eq!(
        error,
        InconsistentGraphError::MissingNode {
            from: auth("p1").locator().clone(),
            to: gateway("missing"),
            missing: gateway("missing"),
        }
    );
}

#[test]
fn rejects_hierarchy_edge_to_missing_node() {
    let mut topology = two_listeners();
    topology
        .snapshot
        .hierarchy_edges
        .push((listener("gw", "l1"), route("ghost")));

    let error = Graph::from_snapshot(topology.snapshot).expect_err("route is missing");
    assert!(matches!(
        error,
        InconsistentGraphError::MissingNode { missing, .. } if missing == route("ghost")
    ));
}

#[test]
fn rejects_cycles() {
    let mut topology = two_listeners();
    topology
        .snapshot
        .hierarchy_edges
        .push((rule("r", 0), gateway("gw")));

    let error = Graph::from_snapshot(topology.snapshot).expect_err("hierarchy has a cycle");
    assert!(matches!(error, InconsistentGraphError::Cycle(_)));
}

#[test]
fn rejects_self_loops() {
    let mut topology = two_listeners();
    topology
        .snapshot
        .hierarchy_edges
        .push((route("r"), route("r")));

    let error = Graph::from_snapshot(topology.snapshot).expect_err("hierarchy has a cycle");
    assert_eq!(error, InconsistentGraphError::Cycle(route("r")));
}

#[test]
fn rejects_policies_in_hierarchy() {
    let mut topology = two_listeners().policy(auth("p1"), gateway("gw"));
    topology
        .snapshot
        .hierarchy_edges
        .push((gateway("gw"), auth("p1").locator().clone()));

    let error = Graph::from_snapshot(topology.snapshot).expect_err("policies are not routing nodes");
    assert_eq!(
        error,
        InconsistentGraphError::PolicyInHierarchy(auth("p1").locator().clone())
    );
}

#[test]
fn rejects_policies_with_multiple_targets() {
    let mut topology = two_listeners().policy(auth("p1"), gateway("gw"));
    topology
        .snapshot
        .attachment_edges
        .push((auth("p1").locator().clone(), route("r")));

    let error = Graph::from_snapshot(topology.snapshot).expect_err("policy has two targets");
    assert!(matches!(
        error,
        InconsistentGraphError::MultipleTargets { .. }
    ));
}

#[test]
fn rejects_attachments_from_non_policies() {
    let mut topology = two_listeners();
    topology
        .snapshot
        .attachment_edges
        .push((route("r"), gateway("gw")));

    let error = Graph::from_snapshot(topology.snapshot).expect_err("routes cannot attach");
    assert_eq!(error, InconsistentGraphError::NotAPolicy(route("r")));
}

#[test]
fn rejects_duplicate_nodes() {
    let mut topology = two_listeners();
    topology
        .snapshot
        .nodes
        .push(Node::Route(Meta::new(route("r"))));

    let error = Graph::from_snapshot(topology.snapshot).expect_err("route is defined twice");
    assert_eq!(error, InconsistentGraphError::DuplicateNode(route("r")));
}

#[test]
fn repeated_hierarchy_edges_are_collapsed() {
    let mut topology = two_listeners();
    topology
        .snapshot
        .hierarchy_edges
        .push((route("r"), rule("r", 0)));
    let graph = Graph::from_snapshot(topology.snapshot).expect("duplicate edges are harmless");

    assert_eq!(graph.children(&route("r")).count(), 1);
    assert_eq!(graph.all_paths().len(), 2);
}
