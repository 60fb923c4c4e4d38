//! Decomposition of an assembly into rigid nodes.
//!
//! The passes run in a fixed order over one document:
//!
//! 1. Seed two nodes per joint at the joint's ancestral break.
//! 2. Isolate game pieces (field assemblies only).
//! 3. Anchor the grounded part in the ground node.
//! 4. Round up unassigned tree nodes into their nearest assigned ancestor.
//! 5. Merge the nodes of every rigid group.
//! 6. Prune empty nodes.
//! 7. Resolve the root node.
//! 8. Aggregate node masses.

use armature_ir::{Document, JointInstance, GROUNDED_JOINT_ID};

use crate::diagnostics::{Diagnostics, Severity};
use crate::error::{CompileError, Result};
use crate::hierarchy::DesignTree;
use crate::partition::{PartitionMap, RigidNodeId};

/// Final partition of one assembly.
#[derive(Debug)]
pub struct Decomposition {
    /// Indexed design hierarchy.
    pub tree: DesignTree,
    /// Member assignment.
    pub partition: PartitionMap,
    /// Node holding the grounded part.
    pub root: RigidNodeId,
    /// Part referenced by the grounded joint.
    pub grounded_part: String,
}

/// Part anchored by the sentinel grounded joint.
fn grounded_part(joint: &JointInstance) -> Option<&str> {
    joint
        .parts
        .first()
        .map(String::as_str)
        .or_else(|| Some(joint.parent_part.as_str()).filter(|p| !p.is_empty()))
        .or_else(|| Some(joint.child_part.as_str()).filter(|p| !p.is_empty()))
}

/// Non-grounded joint instances in id order.
pub(crate) fn articulated_joints(doc: &Document) -> Vec<&JointInstance> {
    let mut joints: Vec<&JointInstance> = doc
        .joint_instances
        .iter()
        .filter(|(id, _)| id.as_str() != GROUNDED_JOINT_ID)
        .map(|(_, joint)| joint)
        .collect();
    joints.sort_by(|a, b| a.id.cmp(&b.id));
    joints
}

/// Label of a joint instance: its own name, else its definition's name,
/// else its id. Instances sharing a definition stay distinguishable.
pub(crate) fn joint_label(doc: &Document, joint: &JointInstance) -> String {
    joint
        .name
        .clone()
        .or_else(|| {
            doc.joint_definitions
                .get(&joint.joint_reference)
                .and_then(|def| def.name.clone())
        })
        .unwrap_or_else(|| joint.id.clone())
}

/// Run every decomposition pass.
pub fn decompose(doc: &Document, diagnostics: &mut Diagnostics) -> Result<Decomposition> {
    let definitions = doc
        .part_definitions
        .as_ref()
        .ok_or(CompileError::NoPartDefinitions)?;
    let grounded = doc.grounded_joint().ok_or(CompileError::NoGroundedJoint)?;
    let grounded_part = grounded_part(grounded)
        .ok_or(CompileError::NoGroundedJoint)?
        .to_string();

    let tree = DesignTree::index(&doc.design_hierarchy);
    let mut partition = PartitionMap::new();

    // 1: joint-seeded groups
    for joint in articulated_joints(doc) {
        let Some((parent_side, child_side)) = ancestral_break(&tree, joint, diagnostics) else {
            continue;
        };
        let label = joint_label(doc, joint);
        let parent_node = partition.new_node(label.clone());
        partition.move_member(&parent_side, parent_node);
        for part in &joint.parts {
            partition.move_member(part, parent_node);
        }
        let child_node = partition.new_node(format!("{label}_child"));
        partition.move_member(&child_side, child_node);
    }

    // 2: game pieces
    if !doc.dynamic {
        let mut pieces: Vec<&str> = doc
            .part_instances
            .values()
            .filter(|instance| {
                definitions
                    .get(&instance.part_definition_id)
                    .is_some_and(|def| def.dynamic)
            })
            .map(|instance| instance.id.as_str())
            .collect();
        pieces.sort_unstable();

        for piece in pieces {
            let Some(value) = tree.tree_value(piece) else {
                diagnostics.push(
                    Severity::LikelyIssues,
                    format!("Game piece '{piece}' was not found in the design tree"),
                );
                continue;
            };
            let node = partition.new_node(format!("gamepiece_{piece}"));
            if let Some(rigid) = partition.node_mut(node) {
                rigid.is_game_piece = true;
                rigid.is_dynamic = true;
            }
            for member in tree.subtree(value) {
                partition.move_member(tree.id(member), node);
            }
        }
    }

    // 3: grounded anchor
    let ground = partition.new_node("grounded");
    partition.move_member(&grounded_part, ground);

    // 4: roundup
    tree.walk_top_down(None, |value, inherited: Option<RigidNodeId>| {
        let id = tree.id(value);
        match partition.node_of(id) {
            Some(node) => Some(node),
            None => {
                let target = inherited.unwrap_or(ground);
                partition.move_member(id, target);
                Some(target)
            }
        }
    });

    let mut orphans: Vec<&str> = doc
        .part_instances
        .keys()
        .map(String::as_str)
        .filter(|id| !partition.is_assigned(id))
        .collect();
    orphans.sort_unstable();
    for orphan in orphans {
        diagnostics.push(
            Severity::LikelyIssues,
            format!("Part '{orphan}' has no tree value; attaching it to the ground node"),
        );
        partition.move_member(orphan, ground);
    }

    // 5: bandages
    for group in &doc.rigid_groups {
        let mut merged: Option<RigidNodeId> = None;
        for occurrence in &group.occurrences {
            let Some(node) = partition.node_of(occurrence) else {
                diagnostics.push(
                    Severity::ProbablyOkay,
                    format!(
                        "Rigid group '{}' references unknown part '{occurrence}'",
                        group.name
                    ),
                );
                continue;
            };
            merged = Some(match merged {
                Some(current) => partition.merge(current, node),
                None => node,
            });
        }
    }

    // 6: pruning
    let pruned = partition.prune_empty();
    tracing::debug!(pruned = pruned.len(), "pruned empty rigid nodes");

    // 7: root
    let root = partition
        .node_of(&grounded_part)
        .ok_or(CompileError::NoGroundedJoint)?;
    if !doc.dynamic {
        if let Some(node) = partition.node_mut(root) {
            node.is_dynamic = false;
        }
    }

    // 8: mass
    for node in partition.nodes_mut() {
        node.mass = node
            .members
            .iter()
            .filter_map(|member| doc.definition_of(member))
            .map(|def| def.effective_mass())
            .sum();
    }

    tracing::info!(
        nodes = partition.len(),
        root = %root,
        "decomposed assembly '{}'",
        doc.name
    );

    Ok(Decomposition {
        tree,
        partition,
        root,
        grounded_part,
    })
}

/// Tree ids of the two subtree roots separating a joint's parent and child.
///
/// Falls back to the parts themselves when their paths never diverge.
fn ancestral_break(
    tree: &DesignTree,
    joint: &JointInstance,
    diagnostics: &mut Diagnostics,
) -> Option<(String, String)> {
    let mut lookup = |part: &str| {
        let value = tree.tree_value(part);
        if value.is_none() {
            diagnostics.push(
                Severity::Unimportable,
                format!("Joint '{}': part '{part}' has no tree value", joint.id),
            );
        }
        value
    };
    let parent = lookup(&joint.parent_part);
    let child = lookup(&joint.child_part);
    let (parent, child) = (parent?, child?);

    match tree.find_ancestral_break(parent, child) {
        Some((left, right)) => Some((tree.id(left).to_string(), tree.id(right).to_string())),
        None => {
            diagnostics.push(
                Severity::LikelyIssues,
                format!(
                    "Joint '{}': ancestral break targets are identical ('{}', '{}')",
                    joint.id, joint.parent_part, joint.child_part
                ),
            );
            Some((joint.parent_part.clone(), joint.child_part.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::DocBuilder;
    use armature_ir::{HierarchyNode, JointMotion, Vec3};

    fn groups(decomposition: &Decomposition) -> Vec<Vec<String>> {
        let mut groups: Vec<Vec<String>> = decomposition
            .partition
            .nodes()
            .map(|n| n.members.iter().cloned().collect())
            .collect();
        groups.sort();
        groups
    }

    #[test]
    fn fatal_without_grounded_joint() {
        let doc = DocBuilder::new(true).part("a", 1.0).build();
        let mut diags = Diagnostics::new();
        assert!(matches!(
            decompose(&doc, &mut diags),
            Err(CompileError::NoGroundedJoint)
        ));
    }

    #[test]
    fn fatal_without_part_definitions() {
        let mut doc = DocBuilder::new(true).part("a", 1.0).ground("a").build();
        doc.part_definitions = None;
        let mut diags = Diagnostics::new();
        assert!(matches!(
            decompose(&doc, &mut diags),
            Err(CompileError::NoPartDefinitions)
        ));
    }

    #[test]
    fn subassembly_members_follow_break_node() {
        // root ─┬─ base
        //       └─ arm_asm ─┬─ arm
        //                   └─ bolt
        let doc = DocBuilder::new(true)
            .part("base", 2.0)
            .part("arm", 1.0)
            .part("bolt", 0.1)
            .hierarchy(vec![
                HierarchyNode::leaf("base"),
                HierarchyNode::with_children(
                    "arm_asm",
                    vec![HierarchyNode::leaf("arm"), HierarchyNode::leaf("bolt")],
                ),
            ])
            .hinge("shoulder", "base", "arm")
            .ground("base")
            .build();

        let mut diags = Diagnostics::new();
        let result = decompose(&doc, &mut diags).unwrap();
        assert!(diags.is_empty());
        assert_eq!(
            groups(&result),
            vec![
                vec!["arm".to_string(), "arm_asm".to_string(), "bolt".to_string()],
                vec!["base".to_string()],
            ]
        );

        let arm_node = result.partition.node_of("bolt").unwrap();
        let mass = result.partition.node(arm_node).unwrap().mass;
        assert!((mass - 1.1).abs() < 1e-9);
        assert_eq!(result.partition.node_of("base"), Some(result.root));
    }

    #[test]
    fn intermediate_parts_join_parent_side() {
        let mut doc = DocBuilder::new(true)
            .part("base", 1.0)
            .part("spacer", 0.2)
            .part("arm", 1.0)
            .hinge("pivot", "base", "arm")
            .ground("arm")
            .build();
        doc.joint_instances
            .get_mut("pivot")
            .unwrap()
            .parts
            .push("spacer".to_string());

        let mut diags = Diagnostics::new();
        let result = decompose(&doc, &mut diags).unwrap();
        assert_eq!(
            result.partition.node_of("spacer"),
            result.partition.node_of("base")
        );
        assert_ne!(
            result.partition.node_of("base"),
            result.partition.node_of("arm")
        );
    }

    #[test]
    fn missing_tree_value_is_unimportable() {
        let doc = DocBuilder::new(true)
            .part("a", 1.0)
            .ground("a")
            .hinge("j", "a", "ghost")
            .build();
        let mut diags = Diagnostics::new();
        let result = decompose(&doc, &mut diags).unwrap();
        assert_eq!(diags.max_severity(), Some(Severity::Unimportable));
        assert_eq!(result.partition.len(), 1);
    }

    #[test]
    fn identical_break_targets_are_reported() {
        let doc = DocBuilder::new(true)
            .part("a", 1.0)
            .part("b", 1.0)
            .hinge("self", "a", "a")
            .ground("b")
            .build();
        let mut diags = Diagnostics::new();
        decompose(&doc, &mut diags).unwrap();
        assert_eq!(diags.count(Severity::LikelyIssues), 1);
    }

    #[test]
    fn game_pieces_are_isolated_on_fields() {
        let doc = DocBuilder::new(false)
            .part("floor", 50.0)
            .part("wall", 20.0)
            .game_piece("ball", 0.3)
            .ground("floor")
            .build();

        let mut diags = Diagnostics::new();
        let result = decompose(&doc, &mut diags).unwrap();
        assert_eq!(result.partition.len(), 2);

        let ball = result.partition.node_of("ball").unwrap();
        let ball = result.partition.node(ball).unwrap();
        assert!(ball.is_game_piece);
        assert!(ball.is_dynamic);

        let root = result.partition.node(result.root).unwrap();
        assert!(!root.is_dynamic);
        assert!(root.members.contains("wall"));
    }

    #[test]
    fn jointed_field_nodes_are_dynamic() {
        let doc = DocBuilder::new(false)
            .part("floor", 50.0)
            .part("gate", 5.0)
            .hinge("gate_hinge", "floor", "gate")
            .ground("floor")
            .build();

        let mut diags = Diagnostics::new();
        let result = decompose(&doc, &mut diags).unwrap();
        assert_eq!(result.partition.len(), 2);

        let gate = result.partition.node_of("gate").unwrap();
        let gate = result.partition.node(gate).unwrap();
        assert!(gate.is_dynamic);
        assert!(!gate.is_game_piece);
        assert!(!result.partition.node(result.root).unwrap().is_dynamic);
    }

    #[test]
    fn joint_labels_prefer_instance_names() {
        let mut doc = DocBuilder::new(true)
            .part("base", 1.0)
            .part("wheel", 1.0)
            .definition("axle", "axle", JointMotion::Other, Vec3::zero(), false)
            .instance("left_j", "axle", "base", "wheel")
            .build();
        let joint = doc.joint_instances["left_j"].clone();
        assert_eq!(joint_label(&doc, &joint), "left_j");

        let mut unnamed = joint.clone();
        unnamed.name = None;
        assert_eq!(joint_label(&doc, &unnamed), "axle");

        doc.joint_definitions.clear();
        assert_eq!(joint_label(&doc, &unnamed), "left_j");
    }

    #[test]
    fn game_piece_outside_tree_is_reported() {
        let mut doc = DocBuilder::new(false)
            .part("floor", 50.0)
            .game_piece("ball", 0.3)
            .ground("floor")
            .build();
        doc.design_hierarchy.truncate(1);

        let mut diags = Diagnostics::new();
        let result = decompose(&doc, &mut diags).unwrap();
        assert!(diags
            .iter()
            .any(|d| d.message.contains("Game piece 'ball'")));
        // Best effort: the orphan still lands in the ground node.
        assert_eq!(result.partition.node_of("ball"), Some(result.root));
    }
}
