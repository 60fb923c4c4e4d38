//! Fixtures for integration tests, built on the crate's document builder.

#![allow(dead_code)]

#[path = "../../src/testing.rs"]
mod testing;

use armature_ir::{JointMotion, Vec3};

pub use testing::{revolute_z, DocBuilder};

pub fn ball(
    pitch: Option<(f64, f64)>,
    yaw: Option<(f64, f64)>,
    roll: Option<(f64, f64)>,
) -> JointMotion {
    JointMotion::Ball {
        axis: Vec3::new(0.0, 1.0, 0.0),
        pitch,
        yaw,
        roll,
    }
}

/// Three parts: `a` grounded, `b` and `c` hinged to it.
pub fn three_part_arm() -> DocBuilder {
    DocBuilder::robot("arm")
        .part_at("a", 2.0, Vec3::zero())
        .part_at("b", 1.0, Vec3::new(0.3, 0.0, 0.0))
        .part_at("c", 1.5, Vec3::new(-0.3, 0.0, 0.0))
        .hinge_at("ab", "a", "b", Vec3::new(0.15, 0.0, 0.0))
        .hinge_at("ac", "a", "c", Vec3::new(-0.15, 0.0, 0.0))
        .ground("a")
}
