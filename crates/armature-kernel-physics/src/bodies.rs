//! Rigid body generation for decomposed nodes.
//!
//! Every node with usable geometry becomes one rapier body carrying a single
//! collider. Bodies sit at the identity pose; part placement is baked into the
//! collision shape.

use std::collections::HashMap;

use armature_ir::{Document, PartDefinition};
use nalgebra::Point3;
use rapier3d::dynamics::{RigidBodyBuilder, RigidBodyHandle, RigidBodySet, RigidBodyType};
use rapier3d::geometry::{ColliderBuilder, ColliderHandle, ColliderSet};

use crate::colliders::{convex_compound, merged_trimesh, sanitize, PartGeometry};
use crate::decompose::Decomposition;
use crate::diagnostics::{Diagnostics, Severity};
use crate::partition::{RigidNode, RigidNodeId};
use crate::settings::CompileSettings;

/// Smallest mass (kg) given to a dynamic collider.
pub const MIN_BODY_MASS: f32 = 0.001;

/// A node registered in the physics world.
#[derive(Debug, Clone)]
pub struct CompiledBody {
    /// Source node.
    pub node: RigidNodeId,
    /// Body handle.
    pub handle: RigidBodyHandle,
    /// The body's only collider.
    pub collider: ColliderHandle,
    /// Simulated mass (kg); zero for static bodies.
    pub mass: f32,
    /// Combined friction coefficient.
    pub friction: f32,
    /// Dynamic or fixed.
    pub is_dynamic: bool,
    /// Isolated loose object.
    pub is_game_piece: bool,
    /// Number of part shapes in the collider.
    pub sub_shapes: usize,
}

/// Output of body compilation.
#[derive(Debug, Default)]
pub struct CompiledBodies {
    /// One entry per node that received a body, in node order.
    pub bodies: Vec<CompiledBody>,
    /// Part instance id to body handle.
    pub part_bodies: HashMap<String, RigidBodyHandle>,
}

impl CompiledBodies {
    /// Body compiled for `node`, if any.
    pub fn for_node(&self, node: RigidNodeId) -> Option<&CompiledBody> {
        self.bodies.iter().find(|b| b.node == node)
    }
}

/// Sanitized geometry of a node's member parts, paired with their definitions.
///
/// Members without a definition or mesh are skipped silently; invalid meshes
/// are reported through `diagnostics` when it is given.
pub(crate) fn node_geometry<'a>(
    doc: &'a Document,
    node: &RigidNode,
    mut diagnostics: Option<&mut Diagnostics>,
) -> Vec<(&'a PartDefinition, PartGeometry)> {
    let mut parts = Vec::new();
    for member in &node.members {
        let Some(instance) = doc.part_instances.get(member) else {
            continue;
        };
        let Some(def) = doc.definition_of(member) else {
            continue;
        };
        let Some(mesh) = def.mesh.as_ref() else {
            tracing::debug!(part = %member, "part has no mesh");
            continue;
        };
        match sanitize(mesh, &instance.global_transform) {
            Ok(geometry) => parts.push((def, geometry)),
            Err(e) => {
                if let Some(diags) = diagnostics.as_deref_mut() {
                    diags.push(
                        Severity::JustAWarning,
                        format!("Part '{member}' skipped: {e}"),
                    );
                }
            }
        }
    }
    parts
}

/// World-space vertices of every valid part in `node`.
pub(crate) fn node_world_points(doc: &Document, node: &RigidNode) -> Vec<Point3<f32>> {
    node_geometry(doc, node, None)
        .iter()
        .flat_map(|(_, geometry)| geometry.world_points())
        .collect()
}

/// Kinetic and static friction of one part.
fn part_friction(doc: &Document, def: &PartDefinition, settings: &CompileSettings) -> (f32, f32) {
    let defaults = (
        settings.default_dynamic_friction,
        settings.default_static_friction,
    );
    let significant = |v: f64| (v as f32) >= settings.friction_threshold;

    if let Some(value) = def.friction_override {
        return if significant(value) {
            (value as f32, value as f32)
        } else {
            defaults
        };
    }

    match def.material.as_ref().and_then(|key| doc.materials.get(key)) {
        Some(material) => (
            if significant(material.dynamic_friction) {
                material.dynamic_friction as f32
            } else {
                defaults.0
            },
            if significant(material.static_friction) {
                material.static_friction as f32
            } else {
                defaults.1
            },
        ),
        None => defaults,
    }
}

/// Area-weighted friction of a node, collapsed to one coefficient.
///
/// The coefficient is the midpoint of the weighted kinetic and static
/// averages.
fn node_friction(
    doc: &Document,
    parts: &[(&PartDefinition, PartGeometry)],
    settings: &CompileSettings,
) -> f32 {
    let mut total_area = 0.0;
    let mut dynamic = 0.0;
    let mut stat = 0.0;
    for (def, geometry) in parts {
        let (d, s) = part_friction(doc, def, settings);
        total_area += geometry.area;
        dynamic += d * geometry.area;
        stat += s * geometry.area;
    }

    let (dynamic, stat) = if total_area > 0.0 {
        (dynamic / total_area, stat / total_area)
    } else {
        (
            settings.default_dynamic_friction,
            settings.default_static_friction,
        )
    };
    (dynamic + stat) / 2.0
}

/// Uniform factor bringing regular dynamic nodes under the assembly mass cap.
fn assembly_mass_scale(
    doc: &Document,
    decomposition: &Decomposition,
    settings: &CompileSettings,
) -> f64 {
    if !doc.dynamic {
        return 1.0;
    }
    let total: f64 = decomposition
        .partition
        .nodes()
        .filter(|n| n.is_dynamic && !n.is_game_piece)
        .map(|n| n.mass)
        .sum();
    let cap = settings.max_assembly_mass as f64;
    if total > cap {
        cap / total
    } else {
        1.0
    }
}

/// Simulated mass of a node.
fn node_mass(node: &RigidNode, scale: f64, settings: &CompileSettings) -> f32 {
    if !node.is_dynamic {
        0.0
    } else if node.is_game_piece {
        (node.mass as f32).min(settings.max_game_piece_mass)
    } else {
        (node.mass * scale) as f32
    }
}

/// Register a body for every node with at least one valid part shape.
pub fn compile_bodies(
    doc: &Document,
    decomposition: &Decomposition,
    settings: &CompileSettings,
    bodies: &mut RigidBodySet,
    colliders: &mut ColliderSet,
    diagnostics: &mut Diagnostics,
) -> CompiledBodies {
    let scale = assembly_mass_scale(doc, decomposition, settings);
    let mut compiled = CompiledBodies::default();

    for node in decomposition.partition.nodes() {
        let parts = node_geometry(doc, node, Some(&mut *diagnostics));

        let shape = if node.is_dynamic {
            let mut hulls = Vec::with_capacity(parts.len());
            for (def, geometry) in &parts {
                match geometry.convex_hull() {
                    Ok(hull) => hulls.push((geometry.placement, hull)),
                    Err(e) => diagnostics.push(
                        Severity::JustAWarning,
                        format!("Part definition '{}' skipped in '{}': {e}", def.id, node.name),
                    ),
                }
            }
            if hulls.is_empty() {
                None
            } else {
                Some((hulls.len(), convex_compound(hulls)))
            }
        } else if parts.is_empty() {
            None
        } else {
            let geometries: Vec<&PartGeometry> = parts.iter().map(|(_, g)| g).collect();
            match merged_trimesh(&geometries) {
                Ok(shape) => Some((geometries.len(), shape)),
                Err(e) => {
                    diagnostics.push(
                        Severity::JustAWarning,
                        format!("Static mesh for '{}' rejected: {e}", node.name),
                    );
                    None
                }
            }
        };

        let Some((sub_shapes, shape)) = shape else {
            diagnostics.push(
                Severity::ProbablyOkay,
                format!("Rigid node '{}' ({}) has no valid collision shapes", node.name, node.id),
            );
            continue;
        };

        let mass = node_mass(node, scale, settings);
        let friction = node_friction(doc, &parts, settings);

        let body_type = if node.is_dynamic {
            RigidBodyType::Dynamic
        } else {
            RigidBodyType::Fixed
        };
        let handle = bodies.insert(RigidBodyBuilder::new(body_type).build());

        let mut collider = ColliderBuilder::new(shape).friction(friction);
        if node.is_dynamic {
            collider = collider.mass(mass.max(MIN_BODY_MASS));
        }
        let collider = colliders.insert_with_parent(collider.build(), handle, bodies);

        for member in &node.members {
            if doc.part_instances.contains_key(member) {
                compiled.part_bodies.insert(member.clone(), handle);
            }
        }

        tracing::debug!(
            node = %node.id,
            sub_shapes,
            mass,
            friction,
            dynamic = node.is_dynamic,
            "compiled body '{}'",
            node.name
        );

        compiled.bodies.push(CompiledBody {
            node: node.id,
            handle,
            collider,
            mass,
            friction,
            is_dynamic: node.is_dynamic,
            is_game_piece: node.is_game_piece,
            sub_shapes,
        });
    }

    tracing::info!(bodies = compiled.bodies.len(), "compiled bodies");
    compiled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decompose::decompose;
    use crate::testing::DocBuilder;
    use approx::assert_relative_eq;
    use armature_ir::{HierarchyNode, MeshData, PhysicalMaterial};

    fn compile(doc: &Document) -> (CompiledBodies, Decomposition, Diagnostics, ColliderSet) {
        let mut diags = Diagnostics::new();
        let decomposition = decompose(doc, &mut diags).unwrap();
        let mut bodies = RigidBodySet::new();
        let mut colliders = ColliderSet::new();
        let compiled = compile_bodies(
            doc,
            &decomposition,
            &CompileSettings::default(),
            &mut bodies,
            &mut colliders,
            &mut diags,
        );
        (compiled, decomposition, diags, colliders)
    }

    #[test]
    fn dynamic_nodes_get_compounds() {
        let doc = DocBuilder::new(true)
            .part("base", 1.0)
            .part("arm", 1.0)
            .part("bolt", 0.5)
            .hierarchy(vec![
                HierarchyNode::leaf("base"),
                HierarchyNode::with_children(
                    "arm_asm",
                    vec![HierarchyNode::leaf("arm"), HierarchyNode::leaf("bolt")],
                ),
            ])
            .hinge("j", "base", "arm")
            .ground("base")
            .build();
        let (compiled, decomposition, diags, colliders) = compile(&doc);
        assert!(diags.is_empty());
        assert_eq!(compiled.bodies.len(), 2);

        let arm = decomposition.partition.node_of("arm").unwrap();
        let body = compiled.for_node(arm).unwrap();
        assert_eq!(body.sub_shapes, 2);
        assert!(body.is_dynamic);
        assert_relative_eq!(body.mass, 1.5);
        assert_relative_eq!(body.friction, 0.6, epsilon = 1e-6);

        let shape = colliders[body.collider].shape();
        assert_eq!(shape.as_compound().unwrap().shapes().len(), 2);
        assert_eq!(compiled.part_bodies["bolt"], body.handle);
    }

    #[test]
    fn heavy_assemblies_scale_uniformly() {
        let doc = DocBuilder::new(true)
            .part("base", 60.0)
            .part("arm", 20.0)
            .hinge("j", "base", "arm")
            .ground("base")
            .build();
        let (compiled, decomposition, _, _) = compile(&doc);
        let base = compiled.for_node(decomposition.root).unwrap();
        let arm = compiled
            .for_node(decomposition.partition.node_of("arm").unwrap())
            .unwrap();
        assert_relative_eq!(base.mass + arm.mass, 52.0, epsilon = 1e-4);
        assert_relative_eq!(base.mass / arm.mass, 3.0, epsilon = 1e-5);
    }

    #[test]
    fn field_ground_is_static() {
        let doc = DocBuilder::new(false)
            .part("floor", 100.0)
            .game_piece("ball", 4.0)
            .ground("floor")
            .build();
        let (compiled, decomposition, _, colliders) = compile(&doc);

        let floor = compiled.for_node(decomposition.root).unwrap();
        assert!(!floor.is_dynamic);
        assert_eq!(floor.mass, 0.0);
        assert!(colliders[floor.collider].shape().as_trimesh().is_some());

        let ball = compiled
            .for_node(decomposition.partition.node_of("ball").unwrap())
            .unwrap();
        assert!(ball.is_game_piece);
        assert_relative_eq!(ball.mass, 2.5);
    }

    #[test]
    fn friction_is_area_weighted() {
        let mut doc = DocBuilder::new(true)
            .part("a", 1.0)
            .part("b", 1.0)
            .group(&["a", "b"])
            .ground("a")
            .build();
        doc.materials.insert(
            "rubber".into(),
            PhysicalMaterial {
                name: "rubber".into(),
                dynamic_friction: 1.0,
                static_friction: 1.2,
                density: None,
            },
        );
        let defs = doc.part_definitions.as_mut().unwrap();
        defs.get_mut("def_a").unwrap().material = Some("rubber".into());
        // Insignificant override falls back to the defaults.
        defs.get_mut("def_b").unwrap().friction_override = Some(0.001);

        let (compiled, _, _, _) = compile(&doc);
        // Equal areas: dynamic (1.0 + 0.5) / 2, static (1.2 + 0.7) / 2.
        assert_relative_eq!(compiled.bodies[0].friction, (0.75 + 0.95) / 2.0, epsilon = 1e-6);
    }

    #[test]
    fn significant_override_replaces_both_values() {
        let mut doc = DocBuilder::new(true).part("a", 1.0).ground("a").build();
        doc.part_definitions
            .as_mut()
            .unwrap()
            .get_mut("def_a")
            .unwrap()
            .friction_override = Some(0.9);
        let (compiled, _, _, _) = compile(&doc);
        assert_relative_eq!(compiled.bodies[0].friction, 0.9, epsilon = 1e-6);
    }

    #[test]
    fn invalid_parts_are_skipped() {
        let mut doc = DocBuilder::new(true)
            .part("base", 1.0)
            .part("arm", 1.0)
            .part("broken", 1.0)
            .hierarchy(vec![
                HierarchyNode::leaf("base"),
                HierarchyNode::with_children(
                    "arm_asm",
                    vec![HierarchyNode::leaf("arm"), HierarchyNode::leaf("broken")],
                ),
            ])
            .hinge("j", "base", "arm")
            .ground("base")
            .build();
        doc.part_definitions
            .as_mut()
            .unwrap()
            .get_mut("def_broken")
            .unwrap()
            .mesh = Some(MeshData {
            vertices: vec![0.0; 6],
            indices: vec![0, 1, 0],
        });

        let (compiled, decomposition, diags, _) = compile(&doc);
        assert_eq!(diags.count(Severity::JustAWarning), 1);
        let arm = decomposition.partition.node_of("arm").unwrap();
        assert_eq!(compiled.for_node(arm).unwrap().sub_shapes, 1);
        // The skipped part still follows its node's body.
        assert_eq!(
            compiled.part_bodies["broken"],
            compiled.for_node(arm).unwrap().handle
        );
    }

    #[test]
    fn node_without_shapes_gets_no_body() {
        let mut doc = DocBuilder::new(true)
            .part("base", 1.0)
            .part("ghost", 1.0)
            .hinge("j", "base", "ghost")
            .ground("base")
            .build();
        doc.part_definitions
            .as_mut()
            .unwrap()
            .get_mut("def_ghost")
            .unwrap()
            .mesh = None;

        let (compiled, decomposition, diags, _) = compile(&doc);
        assert_eq!(diags.max_severity(), Some(Severity::ProbablyOkay));
        assert_eq!(compiled.bodies.len(), 1);
        assert!(compiled
            .for_node(decomposition.partition.node_of("ghost").unwrap())
            .is_none());
        assert!(!compiled.part_bodies.contains_key("ghost"));
    }
}
