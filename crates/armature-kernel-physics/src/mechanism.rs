//! Compiled output handed to simulation and rendering collaborators.

use std::collections::HashMap;
use std::fmt;

use rapier3d::control::DynamicRayCastVehicleController;
use rapier3d::dynamics::RigidBodyHandle;

use crate::bodies::{CompiledBodies, CompiledBody};
use crate::constraints::{CompiledConstraint, CompiledConstraints, WheelDriver};
use crate::partition::RigidNodeId;
use crate::world::PhysicsWorld;

/// Bodies, joints and wheels registered for one spawned assembly.
///
/// The part-to-body map is the integration boundary: collaborators place
/// parts and read body state through it, never through rigid nodes.
pub struct Mechanism {
    root: RigidNodeId,
    bodies: Vec<CompiledBody>,
    part_bodies: HashMap<String, RigidBodyHandle>,
    constraints: Vec<CompiledConstraint>,
    wheels: Vec<WheelDriver>,
    vehicles: HashMap<RigidBodyHandle, DynamicRayCastVehicleController>,
    ghosts: Vec<RigidBodyHandle>,
}

impl Mechanism {
    pub(crate) fn new(
        root: RigidNodeId,
        bodies: CompiledBodies,
        constraints: CompiledConstraints,
    ) -> Self {
        Self {
            root,
            bodies: bodies.bodies,
            part_bodies: bodies.part_bodies,
            constraints: constraints.constraints,
            wheels: constraints.wheels,
            vehicles: constraints.vehicles,
            ghosts: constraints.ghosts,
        }
    }

    /// Node holding the grounded part.
    pub fn root(&self) -> RigidNodeId {
        self.root
    }

    /// Body of the root node, if it had geometry.
    pub fn root_body(&self) -> Option<RigidBodyHandle> {
        self.bodies
            .iter()
            .find(|b| b.node == self.root)
            .map(|b| b.handle)
    }

    /// Body simulating a part instance.
    pub fn body_for_part(&self, part_id: &str) -> Option<RigidBodyHandle> {
        self.part_bodies.get(part_id).copied()
    }

    /// Part instance ids mapped to bodies.
    pub fn parts(&self) -> impl Iterator<Item = (&str, RigidBodyHandle)> {
        self.part_bodies.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Compiled node bodies in node order.
    pub fn bodies(&self) -> &[CompiledBody] {
        &self.bodies
    }

    /// Registered joints in creation order.
    pub fn constraints(&self) -> &[CompiledConstraint] {
        &self.constraints
    }

    /// Joints created for the joint named `name`.
    pub fn constraints_for_joint<'m>(
        &'m self,
        name: &'m str,
    ) -> impl Iterator<Item = &'m CompiledConstraint> {
        self.constraints.iter().filter(move |c| c.joint_name == name)
    }

    /// Raycast wheels.
    pub fn wheels(&self) -> &[WheelDriver] {
        &self.wheels
    }

    /// Vehicle controller attached to `chassis`.
    pub fn vehicle(&self, chassis: RigidBodyHandle) -> Option<&DynamicRayCastVehicleController> {
        self.vehicles.get(&chassis)
    }

    pub(crate) fn vehicles_mut(
        &mut self,
    ) -> impl Iterator<Item = &mut DynamicRayCastVehicleController> {
        self.vehicles.values_mut()
    }

    /// Collider-less bodies created for ball joints.
    pub fn ghost_bodies(&self) -> &[RigidBodyHandle] {
        &self.ghosts
    }

    /// Set the engine force of every wheel driven by the joint named `name`.
    ///
    /// The force is clamped to the wheel's motor bound when it has one.
    /// Returns `false` when no wheel matches.
    pub fn set_wheel_engine_force(&mut self, name: &str, force: f32) -> bool {
        let mut found = false;
        for driver in self.wheels.iter().filter(|w| w.joint_name == name) {
            let force = match driver.motor {
                Some(bound) => force.clamp(-bound, bound),
                None => force,
            };
            if let Some(wheel) = self
                .vehicles
                .get_mut(&driver.chassis)
                .and_then(|v| v.wheels_mut().get_mut(driver.wheel_index))
            {
                wheel.engine_force = force;
                found = true;
            }
        }
        found
    }

    /// Remove everything this mechanism registered from `world`.
    pub fn despawn(self, world: &mut PhysicsWorld) {
        world.despawn(self);
    }
}

impl fmt::Debug for Mechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mechanism")
            .field("root", &self.root)
            .field("bodies", &self.bodies)
            .field("parts", &self.part_bodies.len())
            .field("constraints", &self.constraints)
            .field("wheels", &self.wheels)
            .field("vehicles", &self.vehicles.len())
            .field("ghosts", &self.ghosts)
            .finish()
    }
}
