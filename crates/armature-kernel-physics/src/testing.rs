//! Document builders shared by unit and integration tests.

#![allow(dead_code)]

use std::collections::HashMap;

use armature_ir::{
    Document, HierarchyNode, JointDefinition, JointInstance, JointMotion, MeshData,
    PartDefinition, PartInstance, RigidGroup, Transform3D, Vec3, GROUNDED_JOINT_ID,
};

/// Axis-aligned cube mesh centered at the origin.
pub fn cube_mesh(half: f32) -> MeshData {
    let s = half;
    MeshData {
        vertices: vec![
            -s, -s, s, s, -s, s, s, s, s, -s, s, s, // front
            -s, -s, -s, -s, s, -s, s, s, -s, s, -s, -s, // back
        ],
        indices: vec![
            0, 1, 2, 0, 2, 3, // front
            4, 5, 6, 4, 6, 7, // back
            3, 2, 6, 3, 6, 5, // top
            0, 7, 1, 0, 4, 7, // bottom
            1, 7, 6, 1, 6, 2, // right
            0, 3, 5, 0, 5, 4, // left
        ],
    }
}

pub struct DocBuilder {
    doc: Document,
}

impl DocBuilder {
    pub fn new(dynamic: bool) -> Self {
        let mut doc = Document::new();
        doc.dynamic = dynamic;
        doc.part_definitions = Some(HashMap::new());
        Self { doc }
    }

    pub fn robot(name: &str) -> Self {
        let mut builder = Self::new(true);
        builder.doc.name = name.to_string();
        builder
    }

    pub fn field(name: &str) -> Self {
        let mut builder = Self::new(false);
        builder.doc.name = name.to_string();
        builder
    }

    pub fn version(mut self, version: u32) -> Self {
        self.doc.version = version;
        self
    }

    fn add_part(mut self, id: &str, mass: f64, at: Vec3, game_piece: bool) -> Self {
        let def_id = format!("def_{id}");
        self.doc.part_definitions.get_or_insert_with(HashMap::new).insert(
            def_id.clone(),
            PartDefinition {
                id: def_id.clone(),
                name: Some(id.to_string()),
                mesh: Some(cube_mesh(0.05)),
                mass,
                mass_override: None,
                material: None,
                friction_override: None,
                dynamic: game_piece,
            },
        );
        self.doc.part_instances.insert(
            id.to_string(),
            PartInstance {
                id: id.to_string(),
                part_definition_id: def_id,
                name: None,
                global_transform: Transform3D::from_translation(at),
            },
        );
        self.doc.design_hierarchy.push(Some(HierarchyNode::leaf(id)));
        self
    }

    /// Adds a 10 cm cube part as a top-level hierarchy leaf.
    pub fn part(self, id: &str, mass: f64) -> Self {
        self.add_part(id, mass, Vec3::zero(), false)
    }

    pub fn part_at(self, id: &str, mass: f64, at: Vec3) -> Self {
        self.add_part(id, mass, at, false)
    }

    pub fn game_piece(self, id: &str, mass: f64) -> Self {
        self.add_part(id, mass, Vec3::zero(), true)
    }

    pub fn game_piece_at(self, id: &str, mass: f64, at: Vec3) -> Self {
        self.add_part(id, mass, at, true)
    }

    /// Replaces the generated flat hierarchy.
    pub fn hierarchy(mut self, roots: Vec<HierarchyNode>) -> Self {
        self.doc.design_hierarchy = roots.into_iter().map(Some).collect();
        self
    }

    pub fn ground(mut self, part: &str) -> Self {
        self.doc.joint_instances.insert(
            GROUNDED_JOINT_ID.to_string(),
            JointInstance {
                id: GROUNDED_JOINT_ID.to_string(),
                name: None,
                joint_reference: GROUNDED_JOINT_ID.to_string(),
                parent_part: String::new(),
                child_part: String::new(),
                parts: vec![part.to_string()],
                offset: None,
            },
        );
        self
    }

    /// Joint definition without an instance; see [`DocBuilder::instance`].
    pub fn definition(
        mut self,
        id: &str,
        name: &str,
        motion: JointMotion,
        origin: Vec3,
        wheel: bool,
    ) -> Self {
        self.doc.joint_definitions.insert(
            id.to_string(),
            JointDefinition {
                id: id.to_string(),
                name: Some(name.to_string()),
                motion,
                origin,
                wheel,
                default_motor: None,
            },
        );
        self
    }

    /// Instance named `id` of an existing joint definition.
    pub fn instance(mut self, id: &str, definition: &str, parent: &str, child: &str) -> Self {
        self.doc.joint_instances.insert(
            id.to_string(),
            JointInstance {
                id: id.to_string(),
                name: Some(id.to_string()),
                joint_reference: definition.to_string(),
                parent_part: parent.to_string(),
                child_part: child.to_string(),
                parts: Vec::new(),
                offset: None,
            },
        );
        self
    }

    /// Joint whose definition and instance share `id` as id and name.
    pub fn joint_at(
        self,
        id: &str,
        parent: &str,
        child: &str,
        motion: JointMotion,
        origin: Vec3,
    ) -> Self {
        self.definition(id, id, motion, origin, false)
            .instance(id, id, parent, child)
    }

    pub fn joint(self, id: &str, parent: &str, child: &str, motion: JointMotion) -> Self {
        self.joint_at(id, parent, child, motion, Vec3::zero())
    }

    pub fn hinge(self, id: &str, parent: &str, child: &str) -> Self {
        self.joint(id, parent, child, revolute_z())
    }

    pub fn hinge_at(self, id: &str, parent: &str, child: &str, origin: Vec3) -> Self {
        self.joint_at(id, parent, child, revolute_z(), origin)
    }

    /// Revolute Z joint flagged as a wheel.
    pub fn wheel(self, id: &str, parent: &str, child: &str, origin: Vec3) -> Self {
        self.definition(id, id, revolute_z(), origin, true)
            .instance(id, id, parent, child)
    }

    pub fn group(mut self, members: &[&str]) -> Self {
        self.doc.rigid_groups.push(RigidGroup {
            name: members.join("+"),
            occurrences: members.iter().map(|m| m.to_string()).collect(),
        });
        self
    }

    pub fn build(self) -> Document {
        self.doc
    }
}

pub fn revolute_z() -> JointMotion {
    JointMotion::Revolute {
        axis: Vec3::new(0.0, 0.0, 1.0),
        limits: None,
    }
}
