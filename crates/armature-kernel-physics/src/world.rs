//! Shared physics world that mechanisms are spawned into.

use std::collections::HashSet;

use armature_ir::Document;
use nalgebra::{Isometry3, Vector3};
use rapier3d::dynamics::{
    CCDSolver, ImpulseJointSet, IntegrationParameters, IslandManager, JointAxis,
    MultibodyJointSet, RigidBodyHandle, RigidBodySet,
};
use rapier3d::geometry::{BroadPhaseMultiSap, Collider, ColliderHandle, ColliderSet, NarrowPhase};
use rapier3d::pipeline::{PhysicsPipeline, QueryFilter, QueryPipeline};

use crate::bodies::compile_bodies;
use crate::constraints::{compile_constraints, ConstraintKind};
use crate::decompose::decompose;
use crate::diagnostics::Diagnostics;
use crate::error::Result;
use crate::graph::JointGraph;
use crate::mechanism::Mechanism;
use crate::partition::RigidNode;
use crate::settings::CompileSettings;

/// Damping factor used when driving a joint motor by velocity.
const MOTOR_VELOCITY_FACTOR: f32 = 100.0;

/// Result of spawning one assembly.
#[derive(Debug)]
pub struct Spawned {
    /// Registered bodies and joints.
    pub mechanism: Mechanism,
    /// Non-fatal problems found while compiling.
    pub diagnostics: Diagnostics,
    /// Final rigid nodes.
    pub nodes: Vec<RigidNode>,
    /// Joint connectivity between the nodes.
    pub graph: JointGraph,
}

/// Physics simulation world.
pub struct PhysicsWorld {
    pipeline: PhysicsPipeline,
    gravity: Vector3<f32>,
    integration_params: IntegrationParameters,
    islands: IslandManager,
    broad_phase: BroadPhaseMultiSap,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsWorld {
    /// Create an empty world with gravity along -Y.
    pub fn new() -> Self {
        Self {
            pipeline: PhysicsPipeline::new(),
            gravity: Vector3::new(0.0, -9.81, 0.0),
            integration_params: IntegrationParameters::default(),
            islands: IslandManager::new(),
            broad_phase: BroadPhaseMultiSap::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
        }
    }

    /// Compile `doc` and register its bodies and joints.
    ///
    /// Fatal problems abort before anything is registered. Callers should
    /// check `diagnostics` against `settings.unimportable` and despawn the
    /// mechanism when it is not importable.
    pub fn spawn(&mut self, doc: &Document, settings: &CompileSettings) -> Result<Spawned> {
        settings.validate()?;
        let mut diagnostics = Diagnostics::new();

        let decomposition = decompose(doc, &mut diagnostics)?;
        let graph = JointGraph::build(doc, &decomposition);
        let bodies = compile_bodies(
            doc,
            &decomposition,
            settings,
            &mut self.bodies,
            &mut self.colliders,
            &mut diagnostics,
        );
        let constraints = compile_constraints(
            doc,
            &decomposition,
            &graph,
            &bodies,
            settings,
            &mut self.bodies,
            &mut self.impulse_joints,
            &mut diagnostics,
        );

        let mechanism = Mechanism::new(decomposition.root, bodies, constraints);
        let nodes = decomposition.partition.nodes().cloned().collect();

        tracing::info!(
            document = %doc.name,
            bodies = mechanism.bodies().len(),
            constraints = mechanism.constraints().len(),
            diagnostics = diagnostics.len(),
            importable = diagnostics.is_importable(settings.unimportable),
            "spawned mechanism"
        );

        Ok(Spawned {
            mechanism,
            diagnostics,
            nodes,
            graph,
        })
    }

    /// Remove a mechanism: joints first, then ghost bodies, then node bodies.
    pub fn despawn(&mut self, mechanism: Mechanism) {
        for constraint in mechanism.constraints() {
            self.impulse_joints.remove(constraint.handle, true);
        }
        let bodies = mechanism
            .ghost_bodies()
            .iter()
            .copied()
            .chain(mechanism.bodies().iter().map(|b| b.handle));
        for handle in bodies {
            self.bodies.remove(
                handle,
                &mut self.islands,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                true,
            );
        }
        tracing::debug!(root = %mechanism.root(), "despawned mechanism");
    }

    /// Step the physics simulation by dt seconds.
    pub fn step(&mut self, dt: f32) {
        self.integration_params.dt = dt;

        self.pipeline.step(
            &self.gravity,
            &self.integration_params,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &(),
            &(),
        );
    }

    /// Update the vehicle controllers of `mechanisms`, then step.
    pub fn step_mechanisms<'m>(
        &mut self,
        dt: f32,
        mechanisms: impl IntoIterator<Item = &'m mut Mechanism>,
    ) {
        for mechanism in mechanisms {
            self.update_vehicles(mechanism, dt);
        }
        self.step(dt);
    }

    /// Apply suspension and engine forces of a mechanism's wheels.
    ///
    /// Wheel rays ignore the mechanism's own colliders.
    pub fn update_vehicles(&mut self, mechanism: &mut Mechanism, dt: f32) {
        let own: HashSet<RigidBodyHandle> =
            mechanism.bodies().iter().map(|b| b.handle).collect();
        let predicate = |_: ColliderHandle, collider: &Collider| {
            collider.parent().map_or(true, |parent| !own.contains(&parent))
        };
        for controller in mechanism.vehicles_mut() {
            controller.update_vehicle(
                dt,
                &mut self.bodies,
                &self.colliders,
                &self.query_pipeline,
                QueryFilter::default().predicate(&predicate),
            );
        }
    }

    /// Set the target velocity of every hinge or slider named `joint_name`.
    ///
    /// Velocity is in rad/s for hinges and m/s for sliders. Returns `false`
    /// when no such joint exists.
    pub fn set_joint_velocity(
        &mut self,
        mechanism: &Mechanism,
        joint_name: &str,
        velocity: f32,
    ) -> bool {
        let mut found = false;
        for constraint in mechanism.constraints_for_joint(joint_name) {
            let axis = match constraint.kind {
                ConstraintKind::Hinge => JointAxis::AngX,
                ConstraintKind::Slider => JointAxis::LinX,
                _ => continue,
            };
            if let Some(joint) = self.impulse_joints.get_mut(constraint.handle, true) {
                joint
                    .data
                    .set_motor_velocity(axis, velocity, MOTOR_VELOCITY_FACTOR);
                found = true;
            }
        }
        found
    }

    /// World pose of a body.
    pub fn body_pose(&self, handle: RigidBodyHandle) -> Option<Isometry3<f32>> {
        self.bodies.get(handle).map(|b| *b.position())
    }

    /// Set gravity vector.
    pub fn set_gravity(&mut self, x: f32, y: f32, z: f32) {
        self.gravity = Vector3::new(x, y, z);
    }

    /// Registered bodies, including ghosts.
    pub fn bodies(&self) -> &RigidBodySet {
        &self.bodies
    }

    /// Registered colliders.
    pub fn colliders(&self) -> &ColliderSet {
        &self.colliders
    }

    /// Registered impulse joints.
    pub fn impulse_joints(&self) -> &ImpulseJointSet {
        &self.impulse_joints
    }
}
