#![warn(missing_docs)]

//! Assembly-to-mechanism compiler for armature documents using Rapier3d.
//!
//! An assembly document describes a tree of parts, the joints between them
//! and groups of parts that must stay rigid. This crate reduces it to the
//! smallest set of rigid bodies and joints that simulate it, and registers
//! them in a shared [`PhysicsWorld`].
//!
//! # Pipeline
//!
//! 1. [`DesignTree`] indexes the part hierarchy in post-order.
//! 2. [`decompose`] partitions parts into rigid nodes ([`PartitionMap`]).
//! 3. [`JointGraph`] connects the nodes and orients them from the root.
//! 4. [`compile_bodies`] builds one body per node.
//! 5. [`compile_constraints`] builds hinges, sliders, wheels and ball chains.
//! 6. The result is wrapped in a [`Mechanism`].
//!
//! # Example
//!
//! ```ignore
//! use armature_kernel_physics::{CompileSettings, PhysicsWorld};
//!
//! let doc = armature_ir::Document::from_json(&json_str)?;
//! let settings = CompileSettings::default();
//!
//! let mut world = PhysicsWorld::new();
//! let spawned = world.spawn(&doc, &settings)?;
//! if !spawned.diagnostics.is_importable(settings.unimportable) {
//!     world.despawn(spawned.mechanism);
//!     return Ok(());
//! }
//!
//! world.set_joint_velocity(&spawned.mechanism, "shoulder", 1.0);
//! world.step(1.0 / 60.0);
//! ```

mod bodies;
mod colliders;
mod constraints;
mod decompose;
mod diagnostics;
mod error;
mod graph;
mod hierarchy;
mod mechanism;
mod partition;
mod settings;
#[cfg(test)]
mod testing;
mod world;

pub use bodies::{compile_bodies, CompiledBodies, CompiledBody, MIN_BODY_MASS};
pub use colliders::{sanitize, PartGeometry, MIN_MESH_VERTICES};
pub use constraints::{
    compile_constraints, BallAxis, CompiledConstraint, CompiledConstraints, ConstraintKind,
    WheelDriver,
};
pub use decompose::{decompose, Decomposition};
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use error::{CompileError, Result, ShapeError};
pub use graph::JointGraph;
pub use hierarchy::{DesignTree, TreeValue, SYNTHETIC_ROOT_ID};
pub use mechanism::Mechanism;
pub use partition::{NodeIdAllocator, PartitionMap, RigidNode, RigidNodeId};
pub use settings::{CompileSettings, WheelSettings};
pub use world::{PhysicsWorld, Spawned};
