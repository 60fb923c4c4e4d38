//! Joint connectivity between rigid nodes.
//!
//! The undirected graph has one edge per joint; the directed spanning
//! structure derived from it is rooted at the grounded node and tells which
//! side of a joint is "upstream" (e.g. chassis versus wheel).

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use armature_ir::Document;

use crate::decompose::{articulated_joints, Decomposition};
use crate::partition::RigidNodeId;

/// Undirected joint graph plus its directed spanning structure.
#[derive(Debug, Clone)]
pub struct JointGraph {
    root: RigidNodeId,
    adjacency: BTreeMap<RigidNodeId, BTreeSet<RigidNodeId>>,
    edge_count: usize,
    children: BTreeMap<RigidNodeId, Vec<RigidNodeId>>,
    parents: HashMap<RigidNodeId, RigidNodeId>,
}

impl JointGraph {
    /// Build the graph for a decomposed document.
    pub fn build(doc: &Document, decomposition: &Decomposition) -> Self {
        let partition = &decomposition.partition;
        let edges = articulated_joints(doc).into_iter().filter_map(|joint| {
            let parent = partition.node_of(&joint.parent_part)?;
            let child = partition.node_of(&joint.child_part)?;
            Some((parent, child))
        });
        Self::from_edges(decomposition.root, edges)
    }

    /// Build from explicit endpoint pairs. Self-loops are dropped.
    pub fn from_edges(
        root: RigidNodeId,
        edges: impl IntoIterator<Item = (RigidNodeId, RigidNodeId)>,
    ) -> Self {
        let mut graph = Self {
            root,
            adjacency: BTreeMap::new(),
            edge_count: 0,
            children: BTreeMap::new(),
            parents: HashMap::new(),
        };
        graph.adjacency.entry(root).or_default();

        for (a, b) in edges {
            if a == b {
                continue;
            }
            graph.adjacency.entry(a).or_default().insert(b);
            graph.adjacency.entry(b).or_default().insert(a);
            graph.edge_count += 1;
        }

        let mut discovered = HashSet::from([root]);
        graph.discover(root, &mut discovered);
        tracing::debug!(
            nodes = graph.adjacency.len(),
            edges = graph.edge_count,
            reachable = discovered.len(),
            "built joint graph"
        );
        graph
    }

    fn discover(&mut self, node: RigidNodeId, discovered: &mut HashSet<RigidNodeId>) {
        let neighbors: Vec<RigidNodeId> = self
            .adjacency
            .get(&node)
            .map(|n| n.iter().copied().collect())
            .unwrap_or_default();

        for neighbor in neighbors {
            if discovered.insert(neighbor) {
                self.children.entry(node).or_default().push(neighbor);
                self.parents.insert(neighbor, node);
                self.discover(neighbor, discovered);
            }
        }
    }

    /// The grounded root node.
    pub fn root(&self) -> RigidNodeId {
        self.root
    }

    /// Nodes in the undirected graph.
    pub fn nodes(&self) -> impl Iterator<Item = RigidNodeId> + '_ {
        self.adjacency.keys().copied()
    }

    /// Number of accepted joint edges (self-loops excluded).
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Undirected neighbors of `node`.
    pub fn neighbors(&self, node: RigidNodeId) -> impl Iterator<Item = RigidNodeId> + '_ {
        self.adjacency.get(&node).into_iter().flatten().copied()
    }

    /// Directed children of `node`.
    pub fn children(&self, node: RigidNodeId) -> &[RigidNodeId] {
        self.children.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Directed parent of `node`; `None` for the root and unreachable nodes.
    pub fn parent_of(&self, node: RigidNodeId) -> Option<RigidNodeId> {
        self.parents.get(&node).copied()
    }

    /// Whether the spanning structure has the edge `from → to`.
    pub fn has_directed_edge(&self, from: RigidNodeId, to: RigidNodeId) -> bool {
        self.parent_of(to) == Some(from)
    }

    /// All directed edges, parents first.
    pub fn directed_edges(&self) -> Vec<(RigidNodeId, RigidNodeId)> {
        let mut edges = Vec::new();
        let mut stack = vec![self.root];
        while let Some(node) = stack.pop() {
            for &child in self.children(node) {
                edges.push((node, child));
                stack.push(child);
            }
        }
        edges
    }

    /// Root plus every node reached by the spanning walk.
    pub fn reachable(&self) -> BTreeSet<RigidNodeId> {
        let mut nodes: BTreeSet<RigidNodeId> = self.parents.keys().copied().collect();
        nodes.insert(self.root);
        nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::NodeIdAllocator;

    fn ids(n: usize) -> Vec<RigidNodeId> {
        let mut alloc = NodeIdAllocator::new();
        (0..n).map(|_| alloc.allocate()).collect()
    }

    #[test]
    fn cycle_is_broken() {
        let n = ids(4);
        // Square with a diagonal: every node has two routes from the root.
        let graph = JointGraph::from_edges(
            n[0],
            [(n[0], n[1]), (n[1], n[2]), (n[2], n[3]), (n[3], n[0]), (n[0], n[2])],
        );
        assert_eq!(graph.edge_count(), 5);

        let edges = graph.directed_edges();
        assert_eq!(edges.len(), 3);
        let mut targets: Vec<RigidNodeId> = edges.iter().map(|&(_, to)| to).collect();
        targets.sort();
        targets.dedup();
        assert_eq!(targets, vec![n[1], n[2], n[3]]);
        assert_eq!(graph.parent_of(n[0]), None);
    }

    #[test]
    fn self_loops_and_unreachable_nodes() {
        let n = ids(4);
        let graph = JointGraph::from_edges(n[0], [(n[0], n[0]), (n[0], n[1]), (n[2], n[3])]);
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.nodes().count(), 4);
        assert_eq!(graph.reachable(), BTreeSet::from([n[0], n[1]]));
        assert!(graph.has_directed_edge(n[0], n[1]));
        assert!(!graph.has_directed_edge(n[1], n[0]));
        assert_eq!(graph.parent_of(n[3]), None);
        assert!(graph.children(n[2]).is_empty());
    }

    #[test]
    fn lone_root() {
        let n = ids(1);
        let graph = JointGraph::from_edges(n[0], std::iter::empty());
        assert_eq!(graph.nodes().collect::<Vec<_>>(), vec![n[0]]);
        assert!(graph.directed_edges().is_empty());
    }
}
