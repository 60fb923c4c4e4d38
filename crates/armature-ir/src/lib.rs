//! Assembly document model for the armature mechanism compiler.
//!
//! This crate defines the serialized form of a robot or field assembly: the
//! part catalog, the design hierarchy that mirrors the CAD tree, the joint
//! catalog, and the rigid groups that must stay welded together.
//!
//! The document is purely declarative. Turning it into rigid bodies and
//! constraints is handled by `armature-kernel-physics`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Key of the sentinel joint instance whose part anchors the assembly.
pub const GROUNDED_JOINT_ID: &str = "grounded";

/// 3D vector with f64 components (meters).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    /// X component.
    pub x: f64,
    /// Y component.
    pub y: f64,
    /// Z component.
    pub z: f64,
}

impl Vec3 {
    /// Create a new Vec3.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// The zero vector.
    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }
}

impl Default for Vec3 {
    fn default() -> Self {
        Self::zero()
    }
}

/// Rotation quaternion `w + xi + yj + zk`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quat {
    /// Scalar part.
    pub w: f64,
    /// I component.
    pub x: f64,
    /// J component.
    pub y: f64,
    /// K component.
    pub z: f64,
}

impl Default for Quat {
    fn default() -> Self {
        Self {
            w: 1.0,
            x: 0.0,
            y: 0.0,
            z: 0.0,
        }
    }
}

fn unit_scale() -> Vec3 {
    Vec3::new(1.0, 1.0, 1.0)
}

/// Global placement of a part instance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform3D {
    /// Translation in meters.
    #[serde(default)]
    pub translation: Vec3,
    /// Orientation.
    #[serde(default)]
    pub rotation: Quat,
    /// Per-axis scale, applied before rotation.
    #[serde(default = "unit_scale")]
    pub scale: Vec3,
}

impl Transform3D {
    /// The identity transform.
    pub fn identity() -> Self {
        Self {
            translation: Vec3::zero(),
            rotation: Quat::default(),
            scale: unit_scale(),
        }
    }

    /// A pure translation.
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::identity()
        }
    }
}

impl Default for Transform3D {
    fn default() -> Self {
        Self::identity()
    }
}

/// Triangle mesh in the part definition's local frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshData {
    /// Flat vertex positions `[x0, y0, z0, x1, ...]`.
    pub vertices: Vec<f32>,
    /// Flat triangle indices `[i0, i1, i2, ...]`.
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Number of vertices.
    pub fn num_vertices(&self) -> usize {
        self.vertices.len() / 3
    }

    /// Number of triangles.
    pub fn num_triangles(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Surface material used for friction aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicalMaterial {
    /// Material name.
    pub name: String,
    /// Kinetic friction coefficient.
    pub dynamic_friction: f64,
    /// Static friction coefficient.
    pub static_friction: f64,
    /// Density in kg/m^3.
    #[serde(default)]
    pub density: Option<f64>,
}

/// Shared geometry/mass template referenced by part instances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartDefinition {
    /// Unique identifier.
    pub id: String,
    /// Human-readable name.
    #[serde(default)]
    pub name: Option<String>,
    /// Collision geometry, if any.
    #[serde(default)]
    pub mesh: Option<MeshData>,
    /// Authored mass in kg.
    #[serde(default)]
    pub mass: f64,
    /// User-supplied mass replacing the authored one.
    #[serde(default)]
    pub mass_override: Option<f64>,
    /// Key into [`Document::materials`].
    #[serde(default)]
    pub material: Option<String>,
    /// Friction coefficient replacing the material's values.
    #[serde(default)]
    pub friction_override: Option<f64>,
    /// Loose object (game piece) flag.
    #[serde(default)]
    pub dynamic: bool,
}

impl PartDefinition {
    /// Mass used for simulation: the override when present, else authored.
    pub fn effective_mass(&self) -> f64 {
        self.mass_override.unwrap_or(self.mass)
    }
}

/// A placed occurrence of a [`PartDefinition`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartInstance {
    /// Unique identifier.
    pub id: String,
    /// Referenced definition.
    pub part_definition_id: String,
    /// Human-readable name.
    #[serde(default)]
    pub name: Option<String>,
    /// Pre-computed world placement.
    #[serde(default)]
    pub global_transform: Transform3D,
}

/// Motion type of a joint definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum JointMotion {
    /// Rotation about one axis.
    Revolute {
        /// Rotation axis.
        axis: Vec3,
        /// Angular limits in radians.
        #[serde(default)]
        limits: Option<(f64, f64)>,
    },
    /// Translation along one axis.
    Slider {
        /// Translation axis.
        axis: Vec3,
        /// Travel limits in meters.
        #[serde(default)]
        limits: Option<(f64, f64)>,
    },
    /// Three rotational degrees of freedom.
    Ball {
        /// Roll axis; pitch and yaw are derived perpendicular to it.
        #[serde(default = "default_ball_axis")]
        axis: Vec3,
        /// Pitch limits in radians (`None` = free).
        #[serde(default)]
        pitch: Option<(f64, f64)>,
        /// Yaw limits in radians (`None` = free).
        #[serde(default)]
        yaw: Option<(f64, f64)>,
        /// Roll limits in radians (`None` = free).
        #[serde(default)]
        roll: Option<(f64, f64)>,
    },
    /// Any motion the compiler does not simulate.
    Other,
}

fn default_ball_axis() -> Vec3 {
    Vec3::new(0.0, 0.0, 1.0)
}

/// Articulation template referenced by joint instances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointDefinition {
    /// Unique identifier.
    pub id: String,
    /// Human-readable name.
    #[serde(default)]
    pub name: Option<String>,
    /// Motion type and axis data.
    pub motion: JointMotion,
    /// Joint origin in world space.
    #[serde(default)]
    pub origin: Vec3,
    /// Drive this revolute joint as a wheel.
    #[serde(default)]
    pub wheel: bool,
    /// Authored motor torque (N·m) or force (N) bound.
    #[serde(default)]
    pub default_motor: Option<f64>,
}

/// An articulation edge between two part instances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointInstance {
    /// Unique identifier.
    pub id: String,
    /// Human-readable name; motor overrides are looked up by it.
    #[serde(default)]
    pub name: Option<String>,
    /// Referenced [`JointDefinition`].
    pub joint_reference: String,
    /// Part instance on the parent side.
    #[serde(default)]
    pub parent_part: String,
    /// Part instance on the child side.
    #[serde(default)]
    pub child_part: String,
    /// Intermediate parts that travel with the parent side.
    #[serde(default)]
    pub parts: Vec<String>,
    /// Offset added to the definition's origin.
    #[serde(default)]
    pub offset: Option<Vec3>,
}

impl JointInstance {
    /// Name used for override lookups, falling back to the id.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// Node of the design hierarchy. Leaves are part instances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchyNode {
    /// Part instance id or sub-assembly id.
    pub value: String,
    /// Child nodes in document order; null entries are ignored.
    #[serde(default)]
    pub children: Vec<Option<HierarchyNode>>,
}

impl HierarchyNode {
    /// Create a leaf node.
    pub fn leaf(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            children: Vec::new(),
        }
    }

    /// Create an interior node.
    pub fn with_children(value: impl Into<String>, children: Vec<HierarchyNode>) -> Self {
        Self {
            value: value.into(),
            children: children.into_iter().map(Some).collect(),
        }
    }
}

/// Parts that must resolve to one rigid body ("bandage").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RigidGroup {
    /// Group name.
    #[serde(default)]
    pub name: String,
    /// Member part instance ids.
    pub occurrences: Vec<String>,
}

/// An armature assembly document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Format version; drives the legacy axis-sign rule.
    pub version: u32,
    /// Assembly name.
    #[serde(default)]
    pub name: String,
    /// Robot (`true`) or field (`false`) assembly.
    #[serde(default)]
    pub dynamic: bool,
    /// Part definitions keyed by id.
    #[serde(default)]
    pub part_definitions: Option<HashMap<String, PartDefinition>>,
    /// Part instances keyed by id.
    #[serde(default)]
    pub part_instances: HashMap<String, PartInstance>,
    /// Physical materials keyed by name.
    #[serde(default)]
    pub materials: HashMap<String, PhysicalMaterial>,
    /// Joint definitions keyed by id.
    #[serde(default)]
    pub joint_definitions: HashMap<String, JointDefinition>,
    /// Joint instances keyed by id, including [`GROUNDED_JOINT_ID`].
    #[serde(default)]
    pub joint_instances: HashMap<String, JointInstance>,
    /// Top-level nodes of the design hierarchy.
    #[serde(default)]
    pub design_hierarchy: Vec<Option<HierarchyNode>>,
    /// Rigid groups.
    #[serde(default)]
    pub rigid_groups: Vec<RigidGroup>,
}

impl Default for Document {
    fn default() -> Self {
        Self {
            version: 1,
            name: String::new(),
            dynamic: true,
            part_definitions: Some(HashMap::new()),
            part_instances: HashMap::new(),
            materials: HashMap::new(),
            joint_definitions: HashMap::new(),
            joint_instances: HashMap::new(),
            design_hierarchy: Vec::new(),
            rigid_groups: Vec::new(),
        }
    }
}

impl Document {
    /// Create a new empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// The sentinel grounded joint instance, if present.
    pub fn grounded_joint(&self) -> Option<&JointInstance> {
        self.joint_instances.get(GROUNDED_JOINT_ID)
    }

    /// Resolve the definition behind a part instance id.
    pub fn definition_of(&self, instance_id: &str) -> Option<&PartDefinition> {
        let instance = self.part_instances.get(instance_id)?;
        self.part_definitions
            .as_ref()?
            .get(&instance.part_definition_id)
    }
}
