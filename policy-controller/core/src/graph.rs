use crate::{
    path::{Path, Step},
    Level, Locator, Node, Policy, PolicyKind,
};
use ahash::AHashMap as HashMap;
use std::collections::hash_map::Entry;

/// The raw topology as read from the cluster cache.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Snapshot {
    pub nodes: Vec<Node>,

    /// Parent -> child.
    pub hierarchy_edges: Vec<(Locator, Locator)>,

    /// Policy -> target.
    pub attachment_edges: Vec<(Locator, Locator)>,
}

/// An immutable, validated view of the routing hierarchy and its policies.
#[derive(Debug, Default)]
pub struct Graph {
    nodes: HashMap<Locator, Node>,
    children: HashMap<Locator, Vec<Locator>>,
    parents: HashMap<Locator, Vec<Locator>>,
    targets: HashMap<Locator, Locator>,
    attached: HashMap<Locator, Vec<Locator>>,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum InconsistentGraphError {
    #[error("node {0} is defined more than once")]
    DuplicateNode(Locator),

    #[error("edge {from} -> {to} references unknown node {missing}")]
    MissingNode {
        from: Locator,
        to: Locator,
        missing: Locator,
    },

    #[error("policy {0} cannot be part of the routing hierarchy")]
    PolicyInHierarchy(Locator),

    #[error("attachment source {0} is not a policy")]
    NotAPolicy(Locator),

    #[error("policy {policy} cannot target another policy {target}")]
    PolicyTarget { policy: Locator, target: Locator },

    #[error("policy {policy} targets both {first} and {second}")]
    MultipleTargets {
        policy: Locator,
        first: Locator,
        second: Locator,
    },

    #[error("routing hierarchy contains a cycle through {0}")]
    Cycle(Locator),
}

// === impl Graph ===

impl Graph {
    /// Validates and indexes the given topology.
    ///
    /// The cache feeding this is eventually consistent, so every edge is
    /// checked against the node set and the hierarchy is checked for cycles.
    pub fn build(
        nodes: impl IntoIterator<Item = Node>,
        hierarchy_edges: impl IntoIterator<Item = (Locator, Locator)>,
        attachment_edges: impl IntoIterator<Item = (Locator, Locator)>,
    ) -> Result<Self, InconsistentGraphError> {
        let mut graph = Graph::default();

        for node in nodes {
            match graph.nodes.entry(node.locator().clone()) {
                Entry::Occupied(entry) => {
                    return Err(InconsistentGraphError::DuplicateNode(entry.key().clone()))
                }
                Entry::Vacant(entry) => {
                    entry.insert(node);
                }
            }
        }

        for (parent, child) in hierarchy_edges {
            for end in [&parent, &child] {
                match graph.nodes.get(end) {
                    None => {
                        return Err(InconsistentGraphError::MissingNode {
                            from: parent.clone(),
                            to: child.clone(),
                            missing: end.clone(),
                        })
                    }
                    Some(Node::Policy(_)) => {
                        return Err(InconsistentGraphError::PolicyInHierarchy(end.clone()))
                    }
                    Some(_) => {}
                }
            }
            let children = graph.children.entry(parent.clone()).or_default();
            if !children.contains(&child) {
                children.push(child.clone());
                graph.parents.entry(child).or_default().push(parent);
            }
        }

        for (policy, target) in attachment_edges {
            match graph.nodes.get(&policy) {
                Some(Node::Policy(_)) => {}
                Some(_) => return Err(InconsistentGraphError::NotAPolicy(policy)),
                None => {
                    return Err(InconsistentGraphError::MissingNode {
                        missing: policy.clone(),
                        from: policy,
                        to: target,
                    })
                }
            }
            match graph.nodes.get(&target) {
                Some(Node::Policy(_)) => {
                    return Err(InconsistentGraphError::PolicyTarget { policy, target })
                }
                Some(_) => {}
                None => {
                    return Err(InconsistentGraphError::MissingNode {
                        from: policy,
                        missing: target.clone(),
                        to: target,
                    })
                }
            }
            match graph.targets.entry(policy.clone()) {
                Entry::Occupied(entry) => {
                    if *entry.get() != target {
                        return Err(InconsistentGraphError::MultipleTargets {
                            policy,
                            first: entry.get().clone(),
                            second: target,
                        });
                    }
                }
                Entry::Vacant(entry) => {
                    entry.insert(target.clone());
                    graph.attached.entry(target).or_default().push(policy);
                }
            }
        }

        // Adjacency lists are kept sorted so every traversal is deterministic.
        for list in graph
            .children
            .values_mut()
            .chain(graph.parents.values_mut())
            .chain(graph.attached.values_mut())
        {
            list.sort();
        }

        graph.check_acyclic()?;
        Ok(graph)
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Result<Self, InconsistentGraphError> {
        let Snapshot {
            nodes,
            hierarchy_edges,
            attachment_edges,
        } = snapshot;
        Self::build(nodes, hierarchy_edges, attachment_edges)
    }

    pub fn node(&self, locator: &Locator) -> Option<&Node> {
        self.nodes.get(locator)
    }

    pub fn policy(&self, locator: &Locator) -> Option<&Policy> {
        self.nodes.get(locator).and_then(Node::as_policy)
    }

    pub fn children(&self, locator: &Locator) -> impl Iterator<Item = &Node> + '_ {
        self.related(self.children.get(locator))
    }

    pub fn parents(&self, locator: &Locator) -> impl Iterator<Item = &Node> + '_ {
        self.related(self.parents.get(locator))
    }

    /// Policies of `kind` attached to the node, sorted by locator.
    pub fn policies_attached_to(
        &self,
        locator: &Locator,
        kind: PolicyKind,
    ) -> impl Iterator<Item = &Policy> + '_ {
        self.related(self.attached.get(locator))
            .filter_map(Node::as_policy)
            .filter(move |p| p.kind == kind)
    }

    /// The node a policy is attached to, if any.
    pub fn target_of(&self, policy: &Locator) -> Option<&Node> {
        self.targets.get(policy).and_then(|t| self.nodes.get(t))
    }

    /// All policies of `kind`, sorted by locator.
    pub fn policies(&self, kind: PolicyKind) -> Vec<&Policy> {
        let mut policies = self
            .nodes
            .values()
            .filter_map(Node::as_policy)
            .filter(|p| p.kind == kind)
            .collect::<Vec<_>>();
        policies.sort_by(|a, b| a.locator().cmp(b.locator()));
        policies
    }

    /// Routing nodes without parents, sorted by locator.
    pub fn roots(&self) -> Vec<&Node> {
        let mut roots = self
            .nodes
            .values()
            .filter(|n| n.level().is_some() && !self.parents.contains_key(n.locator()))
            .collect::<Vec<_>>();
        roots.sort_by(|a, b| a.locator().cmp(b.locator()));
        roots
    }

    /// Enumerates every walk from `root` to a node matching `is_leaf`.
    ///
    /// Nodes with several children are fully expanded, so the result grows
    /// with the product of the branching factors. Paths are sorted by their
    /// locator sequence.
    pub fn paths<F>(&self, root: &Locator, is_leaf: F) -> Vec<Path>
    where
        F: Fn(&Node) -> bool,
    {
        let mut paths = Vec::new();
        if let Some(node) = self.nodes.get(root) {
            let mut trail = Vec::new();
            self.walk(node, &is_leaf, &mut trail, &mut paths);
        }
        paths.sort_by(|a, b| a.locators().cmp(b.locators()));
        paths
    }

    /// Every path from an outermost-level root down to an innermost-level
    /// node. Routing objects orphaned from a gateway class are not on any
    /// path.
    pub fn all_paths(&self) -> Vec<Path> {
        let leaf = Level::innermost();
        let mut paths = self
            .roots()
            .into_iter()
            .filter(|root| root.level() == Some(Level::outermost()))
            .flat_map(|root| self.paths(root.locator(), |n| n.level() == Some(leaf)))
            .collect::<Vec<_>>();
        paths.sort_by(|a, b| a.locators().cmp(b.locators()));
        paths
    }

    fn walk<'g, F>(
        &'g self,
        node: &'g Node,
        is_leaf: &F,
        trail: &mut Vec<&'g Node>,
        paths: &mut Vec<Path>,
    ) where
        F: Fn(&Node) -> bool,
    {
        trail.push(node);
        if is_leaf(node) {
            let steps = trail
                .iter()
                .filter_map(|n| {
                    Some(Step {
                        level: n.level()?,
                        locator: n.locator().clone(),
                    })
                })
                .collect();
            paths.push(Path::new(steps));
        } else {
            for child in self.children(node.locator()) {
                self.walk(child, is_leaf, trail, paths);
            }
        }
        trail.pop();
    }

    fn related<'g>(
        &'g self,
        locators: Option<&'g Vec<Locator>>,
    ) -> impl Iterator<Item = &'g Node> + 'g {
        locators
            .into_iter()
            .flatten()
            .filter_map(|l| self.nodes.get(l))
    }

    fn check_acyclic(&self) -> Result<(), InconsistentGraphError> {
        #[derive(Copy, Clone, PartialEq, Eq)]
        enum Mark {
            Visiting,
            Done,
        }

        let mut marks: HashMap<&Locator, Mark> = HashMap::new();
        let mut starts = self.children.keys().collect::<Vec<_>>();
        starts.sort();

        for start in starts {
            if marks.contains_key(start) {
                continue;
            }
            marks.insert(start, Mark::Visiting);
            let mut stack = vec![(start, 0usize)];
            while let Some((node, next)) = stack.last_mut() {
                let node: &Locator = *node;
                let children = self
                    .children
                    .get(node)
                    .map(Vec::as_slice)
                    .unwrap_or_default();
                match children.get(*next) {
                    Some(child) => {
                        *next += 1;
                        match marks.get(child) {
                            Some(Mark::Visiting) => {
                                return Err(InconsistentGraphError::Cycle(child.clone()))
                            }
                            Some(Mark::Done) => {}
                            None => {
                                marks.insert(child, Mark::Visiting);
                                stack.push((child, 0));
                            }
                        }
                    }
                    None => {
                        marks.insert(node, Mark::Done);
                        stack.pop();
                    }
                }
            }
        }
        Ok(())
    }
}
