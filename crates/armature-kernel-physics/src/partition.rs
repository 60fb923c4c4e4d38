//! Mutable assignment of design-tree members to rigid nodes.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a rigid node. Never reused within one compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RigidNodeId(u32);

impl RigidNodeId {
    /// Raw numeric id.
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for RigidNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rn{}", self.0)
    }
}

/// Monotonic id source scoped to one compilation run.
#[derive(Debug, Default)]
pub struct NodeIdAllocator {
    next: u32,
}

impl NodeIdAllocator {
    /// Create an allocator starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out the next id.
    pub fn allocate(&mut self) -> RigidNodeId {
        let id = RigidNodeId(self.next);
        self.next += 1;
        id
    }
}

/// A partition class: members simulated as one rigid body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RigidNode {
    /// Node identity.
    pub id: RigidNodeId,
    /// Label derived from the joint or group that created the node.
    pub name: String,
    /// Design-tree ids (part instances or sub-assemblies) in this node.
    pub members: BTreeSet<String>,
    /// Simulated as a moving body.
    pub is_dynamic: bool,
    /// Isolated loose object.
    pub is_game_piece: bool,
    /// Sum of member part masses (kg).
    pub mass: f64,
}

/// Total, disjoint assignment of members to rigid nodes.
#[derive(Debug, Default)]
pub struct PartitionMap {
    allocator: NodeIdAllocator,
    nodes: BTreeMap<RigidNodeId, RigidNode>,
    membership: HashMap<String, RigidNodeId>,
}

impl PartitionMap {
    /// Create an empty partition. New nodes start dynamic; only the root
    /// of a field assembly is made static later.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an empty node.
    pub fn new_node(&mut self, name: impl Into<String>) -> RigidNodeId {
        let id = self.allocator.allocate();
        self.nodes.insert(
            id,
            RigidNode {
                id,
                name: name.into(),
                members: BTreeSet::new(),
                is_dynamic: true,
                is_game_piece: false,
                mass: 0.0,
            },
        );
        id
    }

    /// Move `member` into `target`, leaving its previous node.
    ///
    /// Returns `false` when `target` does not exist or already holds it.
    pub fn move_member(&mut self, member: &str, target: RigidNodeId) -> bool {
        if !self.nodes.contains_key(&target) {
            return false;
        }
        if let Some(current) = self.membership.get(member).copied() {
            if current == target {
                return false;
            }
            if let Some(node) = self.nodes.get_mut(&current) {
                node.members.remove(member);
            }
        }
        if let Some(node) = self.nodes.get_mut(&target) {
            node.members.insert(member.to_string());
        }
        self.membership.insert(member.to_string(), target);
        true
    }

    /// Union two nodes into a freshly allocated one.
    ///
    /// The inputs are left empty rather than reused. Merging a node with
    /// itself returns it unchanged.
    pub fn merge(&mut self, a: RigidNodeId, b: RigidNodeId) -> RigidNodeId {
        if a == b {
            return a;
        }
        let (name, is_dynamic, is_game_piece, members) = {
            let (Some(left), Some(right)) = (self.nodes.get(&a), self.nodes.get(&b)) else {
                return a;
            };
            let members: Vec<String> = left.members.union(&right.members).cloned().collect();
            (
                left.name.clone(),
                left.is_dynamic || right.is_dynamic,
                left.is_game_piece || right.is_game_piece,
                members,
            )
        };

        let merged = self.new_node(name);
        if let Some(node) = self.nodes.get_mut(&merged) {
            node.is_dynamic = is_dynamic;
            node.is_game_piece = is_game_piece;
        }
        for member in &members {
            self.move_member(member, merged);
        }
        merged
    }

    /// Node currently holding `member`.
    pub fn node_of(&self, member: &str) -> Option<RigidNodeId> {
        self.membership.get(member).copied()
    }

    /// Whether `member` has been assigned.
    pub fn is_assigned(&self, member: &str) -> bool {
        self.membership.contains_key(member)
    }

    /// Look up a node.
    pub fn node(&self, id: RigidNodeId) -> Option<&RigidNode> {
        self.nodes.get(&id)
    }

    /// Look up a node mutably.
    pub fn node_mut(&mut self, id: RigidNodeId) -> Option<&mut RigidNode> {
        self.nodes.get_mut(&id)
    }

    /// Nodes in allocation order.
    pub fn nodes(&self) -> impl Iterator<Item = &RigidNode> {
        self.nodes.values()
    }

    /// Nodes in allocation order, mutably.
    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut RigidNode> {
        self.nodes.values_mut()
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether there are no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Drop every node without members. Returns the removed ids.
    pub fn prune_empty(&mut self) -> Vec<RigidNodeId> {
        let empty: Vec<RigidNodeId> = self
            .nodes
            .values()
            .filter(|n| n.members.is_empty())
            .map(|n| n.id)
            .collect();
        for id in &empty {
            self.nodes.remove(id);
        }
        empty
    }
}
