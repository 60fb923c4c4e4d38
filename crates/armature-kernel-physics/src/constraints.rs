//! Joint synthesis between compiled bodies.

use std::collections::HashMap;
use std::f32::consts::{PI, TAU};

use armature_ir::{Document, JointDefinition, JointInstance, JointMotion, Vec3};
use nalgebra::{Point3, UnitVector3, Vector3};
use rapier3d::control::{DynamicRayCastVehicleController, WheelTuning};
use rapier3d::dynamics::{
    GenericJoint, GenericJointBuilder, ImpulseJointHandle, ImpulseJointSet, JointAxesMask,
    JointAxis, MotorModel, RigidBodyBuilder, RigidBodyHandle, RigidBodySet,
};
use rapier3d::prelude::MassProperties;
use serde::Serialize;

use crate::bodies::{node_world_points, CompiledBodies};
use crate::colliders::max_distance_from_axis;
use crate::decompose::{articulated_joints, joint_label, Decomposition};
use crate::diagnostics::{Diagnostics, Severity};
use crate::graph::JointGraph;
use crate::settings::CompileSettings;

/// Motor force used when neither an override nor an authored bound exists.
pub const DEFAULT_MAX_FORCE: f32 = 1000.0;

/// Fallback wheel radius (m) when the wheel node has no geometry.
pub const FALLBACK_WHEEL_RADIUS: f32 = 0.05;

/// Radius of the sphere used for ghost body inertia (m).
const GHOST_RADIUS: f32 = 0.01;

/// Rotational degree of freedom of a ball joint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BallAxis {
    /// Rotation about the first perpendicular axis.
    Pitch,
    /// Rotation about the second perpendicular axis.
    Yaw,
    /// Rotation about the authored axis.
    Roll,
}

/// What a registered impulse joint stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConstraintKind {
    /// Revolute joint.
    Hinge,
    /// Prismatic joint.
    Slider,
    /// Fixed joint holding a raycast wheel's node to its chassis.
    WheelMount,
    /// One link of a decomposed ball joint.
    BallHinge(BallAxis),
    /// Ball joint with every axis locked.
    Locked,
}

/// A registered impulse joint.
#[derive(Debug, Clone)]
pub struct CompiledConstraint {
    /// Source joint instance id.
    pub joint_id: String,
    /// Name used for motor lookups.
    pub joint_name: String,
    /// Constraint type.
    pub kind: ConstraintKind,
    /// Impulse joint handle.
    pub handle: ImpulseJointHandle,
    /// First endpoint.
    pub body1: RigidBodyHandle,
    /// Second endpoint.
    pub body2: RigidBodyHandle,
    /// World-space anchor.
    pub anchor: Point3<f32>,
    /// Motor torque or force bound, when the joint is powered.
    pub max_motor_force: Option<f32>,
}

/// A wheel simulated by a raycast vehicle controller.
#[derive(Debug, Clone)]
pub struct WheelDriver {
    /// Source joint instance id.
    pub joint_id: String,
    /// Name used for motor lookups.
    pub joint_name: String,
    /// Body carrying the vehicle controller.
    pub chassis: RigidBodyHandle,
    /// Body of the wheel node.
    pub wheel: RigidBodyHandle,
    /// Wheel center in world space.
    pub anchor: Point3<f32>,
    /// Axle direction in world space.
    pub axle: UnitVector3<f32>,
    /// Wheel radius (m).
    pub radius: f32,
    /// Index of the wheel inside its chassis controller.
    pub wheel_index: usize,
    /// Engine force bound.
    pub motor: Option<f32>,
}

/// Output of constraint compilation.
#[derive(Default)]
pub struct CompiledConstraints {
    /// Registered joints in creation order.
    pub constraints: Vec<CompiledConstraint>,
    /// Raycast wheels.
    pub wheels: Vec<WheelDriver>,
    /// One vehicle controller per chassis body.
    pub vehicles: HashMap<RigidBodyHandle, DynamicRayCastVehicleController>,
    /// Collider-less bodies chaining ball-joint hinges.
    pub ghosts: Vec<RigidBodyHandle>,
}

fn vector(v: &Vec3) -> Vector3<f32> {
    Vector3::new(v.x as f32, v.y as f32, v.z as f32)
}

/// Unit axis of a joint. Older documents stored hinge axes with X negated.
pub fn joint_axis(axis: &Vec3, flip_x: bool) -> Option<UnitVector3<f32>> {
    let mut v = vector(axis);
    if flip_x {
        v.x = -v.x;
    }
    UnitVector3::try_new(v, 1e-6)
}

/// Hinge limits ordered low to high and kept short of ±π.
///
/// Ranges spanning a full turn or more are dropped.
pub fn hinge_limits(limits: Option<(f64, f64)>, margin: f32) -> Option<[f32; 2]> {
    let (a, b) = limits?;
    let (lo, hi) = if a <= b { (a as f32, b as f32) } else { (b as f32, a as f32) };
    if hi - lo >= TAU {
        return None;
    }
    let bound = PI - margin;
    Some([lo.clamp(-bound, bound), hi.clamp(-bound, bound)])
}

/// Slider limits re-centered on their midpoint.
///
/// Returns the midpoint offset and the symmetric limits around it.
pub fn centered_slider_limits(limits: Option<(f64, f64)>) -> (f32, Option<[f32; 2]>) {
    match limits {
        Some((a, b)) => {
            let (lo, hi) = if a <= b { (a as f32, b as f32) } else { (b as f32, a as f32) };
            let mid = (lo + hi) / 2.0;
            let half = (hi - lo) / 2.0;
            (mid, Some([-half, half]))
        }
        None => (0.0, None),
    }
}

/// Pitch, yaw and roll axes for a ball joint whose roll axis is `roll`.
pub fn ball_basis(roll: UnitVector3<f32>) -> [(BallAxis, UnitVector3<f32>); 3] {
    let reference = if roll.dot(&Vector3::x()).abs() > 0.99 {
        Vector3::y()
    } else {
        Vector3::x()
    };
    let pitch = UnitVector3::new_normalize(roll.cross(&reference));
    let yaw = UnitVector3::new_normalize(roll.cross(&pitch));
    [
        (BallAxis::Pitch, pitch),
        (BallAxis::Yaw, yaw),
        (BallAxis::Roll, roll),
    ]
}

/// Whether a ball-joint axis is free to move.
fn axis_is_free(limits: Option<(f64, f64)>, epsilon: f32) -> bool {
    match limits {
        Some((lo, hi)) => ((hi - lo).abs() as f32) >= epsilon,
        None => true,
    }
}

/// Local anchors and axes of a joint, derived from the endpoint poses.
struct JointFrame {
    anchor1: Point3<f32>,
    anchor2: Point3<f32>,
    axis1: UnitVector3<f32>,
    axis2: UnitVector3<f32>,
}

impl JointFrame {
    fn new(
        bodies: &RigidBodySet,
        body1: RigidBodyHandle,
        body2: RigidBodyHandle,
        anchor1: Point3<f32>,
        anchor2: Point3<f32>,
        axis: UnitVector3<f32>,
    ) -> Option<Self> {
        let pose1 = bodies.get(body1)?.position();
        let pose2 = bodies.get(body2)?.position();
        Some(Self {
            anchor1: pose1.inverse_transform_point(&anchor1),
            anchor2: pose2.inverse_transform_point(&anchor2),
            axis1: pose1.inverse_transform_unit_vector(&axis),
            axis2: pose2.inverse_transform_unit_vector(&axis),
        })
    }
}

fn fixed_joint(frame: &JointFrame) -> GenericJoint {
    GenericJointBuilder::new(JointAxesMask::LOCKED_FIXED_AXES)
        .local_anchor1(frame.anchor1)
        .local_anchor2(frame.anchor2)
        .build()
}

fn revolute_joint(
    frame: &JointFrame,
    limits: Option<[f32; 2]>,
    max_torque: Option<f32>,
) -> GenericJoint {
    let mut builder = GenericJointBuilder::new(JointAxesMask::LOCKED_REVOLUTE_AXES)
        .local_anchor1(frame.anchor1)
        .local_anchor2(frame.anchor2)
        .local_axis1(frame.axis1)
        .local_axis2(frame.axis2);

    if let Some(limits) = limits {
        builder = builder.limits(JointAxis::AngX, limits);
    }
    if let Some(torque) = max_torque {
        builder = builder
            .motor_model(JointAxis::AngX, MotorModel::AccelerationBased)
            .motor_max_force(JointAxis::AngX, torque);
    }
    builder.build()
}

fn prismatic_joint(frame: &JointFrame, limits: Option<[f32; 2]>, max_force: f32) -> GenericJoint {
    let mut builder = GenericJointBuilder::new(JointAxesMask::LOCKED_PRISMATIC_AXES)
        .local_anchor1(frame.anchor1)
        .local_anchor2(frame.anchor2)
        .local_axis1(frame.axis1)
        .local_axis2(frame.axis2);

    if let Some(limits) = limits {
        builder = builder.limits(JointAxis::LinX, limits);
    }
    builder
        .motor_model(JointAxis::LinX, MotorModel::AccelerationBased)
        .motor_max_force(JointAxis::LinX, max_force)
        .build()
}

/// Resolved endpoints of one joint instance.
struct Endpoints<'a> {
    joint: &'a JointInstance,
    def: &'a JointDefinition,
    name: String,
    parent: RigidBodyHandle,
    child: RigidBodyHandle,
    anchor: Point3<f32>,
}

/// Working state while compiling one document.
struct ConstraintBuilder<'a> {
    doc: &'a Document,
    decomposition: &'a Decomposition,
    graph: &'a JointGraph,
    compiled: &'a CompiledBodies,
    settings: &'a CompileSettings,
    bodies: &'a mut RigidBodySet,
    impulse_joints: &'a mut ImpulseJointSet,
    diagnostics: &'a mut Diagnostics,
    out: CompiledConstraints,
}

impl<'a> ConstraintBuilder<'a> {
    fn resolve(&mut self, joint: &'a JointInstance) -> Option<Endpoints<'a>> {
        let doc = self.doc;
        let Some(def) = doc.joint_definitions.get(&joint.joint_reference) else {
            self.diagnostics.push(
                Severity::LikelyIssues,
                format!(
                    "Joint '{}' references unknown definition '{}'",
                    joint.id, joint.joint_reference
                ),
            );
            return None;
        };

        let decomposition = self.decomposition;
        let partition = &decomposition.partition;
        let (Some(parent_node), Some(child_node)) = (
            partition.node_of(&joint.parent_part),
            partition.node_of(&joint.child_part),
        ) else {
            self.diagnostics.push(
                Severity::LikelyIssues,
                format!("Joint '{}' has an endpoint outside every rigid node", joint.id),
            );
            return None;
        };
        if parent_node == child_node {
            self.diagnostics.push(
                Severity::LikelyIssues,
                format!(
                    "Joint '{}' connects rigid node {parent_node} to itself",
                    joint.id
                ),
            );
            return None;
        }

        let (Some(parent), Some(child)) = (
            self.compiled.for_node(parent_node),
            self.compiled.for_node(child_node),
        ) else {
            self.diagnostics.push(
                Severity::LikelyIssues,
                format!("Joint '{}' has an endpoint without a body", joint.id),
            );
            return None;
        };

        let offset = joint.offset.map(|o| vector(&o)).unwrap_or_else(Vector3::zeros);
        let anchor = Point3::from(vector(&def.origin) + offset);

        Some(Endpoints {
            joint,
            def,
            name: joint_label(doc, joint),
            parent: parent.handle,
            child: child.handle,
            anchor,
        })
    }

    fn axis_or_report(
        &mut self,
        ends: &Endpoints,
        axis: &Vec3,
        flip_x: bool,
    ) -> Option<UnitVector3<f32>> {
        let axis = joint_axis(axis, flip_x);
        if axis.is_none() {
            self.diagnostics.push(
                Severity::LikelyIssues,
                format!("Joint '{}' has a zero-length axis", ends.joint.id),
            );
        }
        axis
    }

    fn insert(
        &mut self,
        ends: &Endpoints,
        kind: ConstraintKind,
        body1: RigidBodyHandle,
        body2: RigidBodyHandle,
        joint: GenericJoint,
        max_motor_force: Option<f32>,
    ) {
        let handle = self.impulse_joints.insert(body1, body2, joint, true);
        self.out.constraints.push(CompiledConstraint {
            joint_id: ends.joint.id.clone(),
            joint_name: ends.name.clone(),
            kind,
            handle,
            body1,
            body2,
            anchor: ends.anchor,
            max_motor_force,
        });
    }

    fn compile(&mut self, joint: &'a JointInstance) {
        let Some(ends) = self.resolve(joint) else {
            return;
        };
        let legacy = self.doc.version < self.settings.legacy_axis_version;

        match &ends.def.motion {
            JointMotion::Revolute { axis, limits } => {
                let Some(axis) = self.axis_or_report(&ends, axis, legacy) else {
                    return;
                };
                if ends.def.wheel {
                    self.wheel(&ends, axis);
                } else {
                    self.hinge(&ends, axis, *limits);
                }
            }
            JointMotion::Slider { axis, limits } => {
                let Some(axis) = self.axis_or_report(&ends, axis, false) else {
                    return;
                };
                self.slider(&ends, axis, *limits);
            }
            JointMotion::Ball {
                axis,
                pitch,
                yaw,
                roll,
            } => {
                let Some(axis) = self.axis_or_report(&ends, axis, false) else {
                    return;
                };
                self.ball(&ends, axis, [*pitch, *yaw, *roll]);
            }
            JointMotion::Other => {
                self.diagnostics.push(
                    Severity::JustAWarning,
                    format!("Joint '{}' has an unsupported motion type", ends.joint.id),
                );
            }
        }
    }

    fn hinge(&mut self, ends: &Endpoints, axis: UnitVector3<f32>, limits: Option<(f64, f64)>) {
        let Some(frame) =
            JointFrame::new(self.bodies, ends.parent, ends.child, ends.anchor, ends.anchor, axis)
        else {
            return;
        };
        let limits = hinge_limits(limits, self.settings.hinge_limit_margin);
        let torque = self
            .settings
            .motor_bound(&ends.name, ends.def.default_motor)
            .unwrap_or(DEFAULT_MAX_FORCE);
        let joint = revolute_joint(&frame, limits, Some(torque));
        self.insert(ends, ConstraintKind::Hinge, ends.parent, ends.child, joint, Some(torque));
    }

    fn slider(&mut self, ends: &Endpoints, axis: UnitVector3<f32>, limits: Option<(f64, f64)>) {
        let (mid, limits) = centered_slider_limits(limits);
        let neutral = ends.anchor + axis.into_inner() * mid;
        let Some(frame) =
            JointFrame::new(self.bodies, ends.parent, ends.child, neutral, ends.anchor, axis)
        else {
            return;
        };
        let force = self
            .settings
            .motor_bound(&ends.name, ends.def.default_motor)
            .unwrap_or(DEFAULT_MAX_FORCE);
        let joint = prismatic_joint(&frame, limits, force);
        self.insert(ends, ConstraintKind::Slider, ends.parent, ends.child, joint, Some(force));
    }

    fn wheel(&mut self, ends: &Endpoints, axle: UnitVector3<f32>) {
        let decomposition = self.decomposition;
        let partition = &decomposition.partition;
        let (Some(parent_node), Some(child_node)) = (
            partition.node_of(&ends.joint.parent_part),
            partition.node_of(&ends.joint.child_part),
        ) else {
            return;
        };
        let (chassis, wheel, wheel_node) = if self.graph.has_directed_edge(child_node, parent_node)
        {
            (ends.child, ends.parent, parent_node)
        } else {
            (ends.parent, ends.child, child_node)
        };

        let radius = partition
            .node(wheel_node)
            .map(|node| node_world_points(self.doc, node))
            .and_then(|points| max_distance_from_axis(points, &ends.anchor, &axle))
            .filter(|r| *r > 1e-4)
            .unwrap_or_else(|| {
                self.diagnostics.push(
                    Severity::JustAWarning,
                    format!(
                        "Wheel '{}' has no geometry; using a {FALLBACK_WHEEL_RADIUS} m radius",
                        ends.joint.id
                    ),
                );
                FALLBACK_WHEEL_RADIUS
            });

        let Some(frame) = JointFrame::new(self.bodies, chassis, wheel, ends.anchor, ends.anchor, axle)
        else {
            return;
        };
        self.insert(ends, ConstraintKind::WheelMount, chassis, wheel, fixed_joint(&frame), None);

        let Some(chassis_pose) = self.bodies.get(chassis).map(|b| *b.position()) else {
            return;
        };
        let wheel_settings = &self.settings.wheel;
        let tuning = WheelTuning {
            suspension_stiffness: wheel_settings.suspension_stiffness,
            suspension_compression: wheel_settings.suspension_compression,
            suspension_damping: wheel_settings.suspension_damping,
            friction_slip: wheel_settings.friction_slip,
            ..WheelTuning::default()
        };
        let controller = self
            .out
            .vehicles
            .entry(chassis)
            .or_insert_with(|| DynamicRayCastVehicleController::new(chassis));
        controller.add_wheel(
            chassis_pose.inverse_transform_point(&ends.anchor),
            chassis_pose.inverse_transform_vector(&-Vector3::y()),
            chassis_pose.inverse_transform_vector(&axle.into_inner()),
            wheel_settings.suspension_rest_length,
            radius,
            &tuning,
        );
        let wheel_index = controller.wheels().len() - 1;

        self.out.wheels.push(WheelDriver {
            joint_id: ends.joint.id.clone(),
            joint_name: ends.name.clone(),
            chassis,
            wheel,
            anchor: ends.anchor,
            axle,
            radius,
            wheel_index,
            motor: self.settings.motor_bound(&ends.name, ends.def.default_motor),
        });
    }

    fn ball(&mut self, ends: &Endpoints, roll: UnitVector3<f32>, limits: [Option<(f64, f64)>; 3]) {
        let epsilon = self.settings.locked_axis_epsilon;
        let free: Vec<(BallAxis, UnitVector3<f32>, Option<(f64, f64)>)> = ball_basis(roll)
            .into_iter()
            .zip(limits)
            .filter(|(_, limits)| axis_is_free(*limits, epsilon))
            .map(|((kind, axis), limits)| (kind, axis, limits))
            .collect();

        if free.is_empty() {
            let Some(frame) =
                JointFrame::new(self.bodies, ends.parent, ends.child, ends.anchor, ends.anchor, roll)
            else {
                return;
            };
            self.insert(ends, ConstraintKind::Locked, ends.parent, ends.child, fixed_joint(&frame), None);
            return;
        }

        let ghost_mass = self.settings.ghost_body_mass;
        let ghost_inertia = 0.4 * ghost_mass * GHOST_RADIUS * GHOST_RADIUS;
        let last = free.len() - 1;
        let mut previous = ends.parent;
        for (i, (kind, axis, limits)) in free.into_iter().enumerate() {
            let next = if i == last {
                ends.child
            } else {
                let ghost = self.bodies.insert(
                    RigidBodyBuilder::dynamic()
                        .translation(ends.anchor.coords)
                        .additional_mass_properties(MassProperties::new(
                            Point3::origin(),
                            ghost_mass,
                            Vector3::repeat(ghost_inertia),
                        ))
                        .build(),
                );
                self.out.ghosts.push(ghost);
                ghost
            };

            let Some(frame) =
                JointFrame::new(self.bodies, previous, next, ends.anchor, ends.anchor, axis)
            else {
                return;
            };
            let limits = hinge_limits(limits, self.settings.hinge_limit_margin);
            let joint = revolute_joint(&frame, limits, None);
            self.insert(ends, ConstraintKind::BallHinge(kind), previous, next, joint, None);
            previous = next;
        }
    }
}

/// Register the joints of every articulated joint instance.
#[allow(clippy::too_many_arguments)]
pub fn compile_constraints(
    doc: &Document,
    decomposition: &Decomposition,
    graph: &JointGraph,
    compiled: &CompiledBodies,
    settings: &CompileSettings,
    bodies: &mut RigidBodySet,
    impulse_joints: &mut ImpulseJointSet,
    diagnostics: &mut Diagnostics,
) -> CompiledConstraints {
    let mut builder = ConstraintBuilder {
        doc,
        decomposition,
        graph,
        compiled,
        settings,
        bodies,
        impulse_joints,
        diagnostics,
        out: CompiledConstraints::default(),
    };
    for joint in articulated_joints(doc) {
        builder.compile(joint);
    }

    let out = builder.out;
    tracing::info!(
        constraints = out.constraints.len(),
        wheels = out.wheels.len(),
        vehicles = out.vehicles.len(),
        ghosts = out.ghosts.len(),
        "compiled constraints"
    );
    out
}
