//! Post-order indexing of the design hierarchy.
//!
//! Every node of the design tree gets a [`TreeValue`] assigned in post-order:
//! all children are numbered left-to-right before their parent. Each subtree
//! therefore occupies a contiguous block of values ending at its root, and a
//! node's children are implicitly sorted by increasing value. Ancestor queries
//! become binary searches over child lists, with no parent pointers stored.
//!
//! The arena is laid out so that slot `v` holds the node with value `v`.

use std::collections::HashMap;

use armature_ir::HierarchyNode;

/// Post-order key of a node in the design tree.
pub type TreeValue = usize;

/// Id of the synthetic node that parents the document's top-level nodes.
pub const SYNTHETIC_ROOT_ID: &str = "__armature_root__";

#[derive(Debug, Clone)]
struct TreeEntry {
    id: String,
    /// Smallest value in this node's subtree.
    low: TreeValue,
    children: Vec<TreeValue>,
}

/// Indexed design hierarchy.
#[derive(Debug, Clone)]
pub struct DesignTree {
    entries: Vec<TreeEntry>,
    values: HashMap<String, TreeValue>,
}

impl DesignTree {
    /// Index a hierarchy under a synthetic root. Null children are skipped.
    pub fn index(roots: &[Option<HierarchyNode>]) -> Self {
        let mut tree = Self {
            entries: Vec::new(),
            values: HashMap::new(),
        };
        tree.visit(SYNTHETIC_ROOT_ID, roots);
        tracing::debug!(nodes = tree.entries.len(), "indexed design hierarchy");
        tree
    }

    fn visit(&mut self, id: &str, children: &[Option<HierarchyNode>]) -> TreeValue {
        let low = self.entries.len();
        let child_values: Vec<TreeValue> = children
            .iter()
            .flatten()
            .map(|child| self.visit(&child.value, &child.children))
            .collect();

        let value = self.entries.len();
        self.entries.push(TreeEntry {
            id: id.to_string(),
            low,
            children: child_values,
        });
        // First occurrence wins for duplicated ids.
        self.values.entry(id.to_string()).or_insert(value);
        value
    }

    /// Value of the synthetic root (always the largest).
    pub fn root(&self) -> TreeValue {
        self.entries.len() - 1
    }

    /// Number of indexed nodes, synthetic root included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the document contributed no nodes.
    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 1
    }

    /// Tree value of a node id.
    pub fn tree_value(&self, id: &str) -> Option<TreeValue> {
        self.values.get(id).copied()
    }

    /// Id of the node holding `value`.
    pub fn id(&self, value: TreeValue) -> &str {
        &self.entries[value].id
    }

    /// Children of `value`, in document order.
    pub fn children(&self, value: TreeValue) -> &[TreeValue] {
        &self.entries[value].children
    }

    /// Whether `descendant` lies in the subtree rooted at `ancestor` (inclusive).
    pub fn contains(&self, ancestor: TreeValue, descendant: TreeValue) -> bool {
        (self.entries[ancestor].low..=ancestor).contains(&descendant)
    }

    /// Every value in the subtree rooted at `value`, itself included.
    pub fn subtree(&self, value: TreeValue) -> std::ops::RangeInclusive<TreeValue> {
        self.entries[value].low..=value
    }

    /// The child of `node` on the path toward `target`.
    ///
    /// Returns `None` when `target` is `node` itself or outside its subtree.
    /// Since every child's block ends at the child's own value, the wanted
    /// child is the one equal to `target` or, failing that, the first one
    /// whose value exceeds it.
    pub fn child_toward(&self, node: TreeValue, target: TreeValue) -> Option<TreeValue> {
        if target == node || !self.contains(node, target) {
            return None;
        }
        let children = &self.entries[node].children;
        let idx = children.partition_point(|&c| c < target);
        children.get(idx).copied()
    }

    /// Direct-child subtree roots where the root paths of `a` and `b` diverge.
    ///
    /// Returns `None` when the paths never split: `a == b`, or one is an
    /// ancestor of the other.
    pub fn find_ancestral_break(
        &self,
        a: TreeValue,
        b: TreeValue,
    ) -> Option<(TreeValue, TreeValue)> {
        let mut node = self.root();
        loop {
            match (self.child_toward(node, a), self.child_toward(node, b)) {
                (Some(next_a), Some(next_b)) if next_a == next_b => node = next_a,
                (Some(next_a), Some(next_b)) => return Some((next_a, next_b)),
                _ => return None,
            }
        }
    }

    /// Pre-order walk below the synthetic root, threading `state` from each
    /// node to its children. `visit` returns the state its children receive.
    pub fn walk_top_down<S: Copy>(&self, state: S, mut visit: impl FnMut(TreeValue, S) -> S) {
        let mut stack: Vec<(TreeValue, S)> = self
            .children(self.root())
            .iter()
            .rev()
            .map(|&c| (c, state))
            .collect();

        while let Some((node, inherited)) = stack.pop() {
            let passed = visit(node, inherited);
            stack.extend(self.children(node).iter().rev().map(|&c| (c, passed)));
        }
    }
}
