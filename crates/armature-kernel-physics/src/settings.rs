//! Compile settings.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::diagnostics::Severity;
use crate::error::{CompileError, Result};

/// Raycast wheel parameters applied to every wheel joint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WheelSettings {
    /// Suspension length at rest (m).
    pub suspension_rest_length: f32,
    /// Suspension spring stiffness.
    pub suspension_stiffness: f32,
    /// Damping while the suspension compresses.
    pub suspension_compression: f32,
    /// Damping while the suspension relaxes.
    pub suspension_damping: f32,
    /// Longitudinal friction slip.
    pub friction_slip: f32,
}

impl Default for WheelSettings {
    fn default() -> Self {
        Self {
            suspension_rest_length: 0.02,
            suspension_stiffness: 5.88,
            suspension_compression: 0.83,
            suspension_damping: 0.88,
            friction_slip: 10.5,
        }
    }
}

/// Tunables for one compilation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileSettings {
    /// Total mass (kg) a dynamic assembly is scaled down to.
    pub max_assembly_mass: f32,
    /// Per-object mass cap (kg) for game pieces.
    pub max_game_piece_mass: f32,
    /// Friction values below this are treated as unset.
    pub friction_threshold: f32,
    /// Fallback kinetic friction.
    pub default_dynamic_friction: f32,
    /// Fallback static friction.
    pub default_static_friction: f32,
    /// Documents older than this version get their hinge X axis negated.
    pub legacy_axis_version: u32,
    /// Hinge limits are clamped to `±(π - margin)` radians.
    pub hinge_limit_margin: f32,
    /// Ball-joint axes whose limit range is narrower than this are locked.
    pub locked_axis_epsilon: f32,
    /// Mass (kg) of the collider-less bodies chaining ball-joint hinges.
    pub ghost_body_mass: f32,
    /// Wheel suspension tuning.
    pub wheel: WheelSettings,
    /// Motor torque/force bounds keyed by joint name.
    pub motor_overrides: HashMap<String, f32>,
    /// Results at or above this severity must be discarded.
    pub unimportable: Severity,
}

impl Default for CompileSettings {
    fn default() -> Self {
        Self {
            max_assembly_mass: 52.0,
            max_game_piece_mass: 2.5,
            friction_threshold: 0.01,
            default_dynamic_friction: 0.5,
            default_static_friction: 0.7,
            legacy_axis_version: 5,
            hinge_limit_margin: 0.01,
            locked_axis_epsilon: 1e-3,
            ghost_body_mass: 1e-3,
            wheel: WheelSettings::default(),
            motor_overrides: HashMap::new(),
            unimportable: Severity::Unimportable,
        }
    }
}

impl CompileSettings {
    /// Parse settings from TOML. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let settings: Self = toml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let settings = Self::from_toml_str(&text)?;
        tracing::info!("Loaded compile settings from {:?}", path.as_ref());
        Ok(settings)
    }

    /// Validate settings.
    pub fn validate(&self) -> Result<()> {
        if self.max_assembly_mass <= 0.0 {
            return Err(CompileError::Settings(
                "max_assembly_mass must be positive".into(),
            ));
        }
        if self.max_game_piece_mass <= 0.0 {
            return Err(CompileError::Settings(
                "max_game_piece_mass must be positive".into(),
            ));
        }
        if self.ghost_body_mass <= 0.0 {
            return Err(CompileError::Settings(
                "ghost_body_mass must be positive".into(),
            ));
        }
        if self.friction_threshold < 0.0 || self.locked_axis_epsilon < 0.0 {
            return Err(CompileError::Settings(
                "thresholds must not be negative".into(),
            ));
        }
        if !(0.0..std::f32::consts::PI).contains(&self.hinge_limit_margin) {
            return Err(CompileError::Settings(
                "hinge_limit_margin must be in [0, pi)".into(),
            ));
        }
        Ok(())
    }

    /// Motor bound for a joint: the override by name, else the authored value.
    pub fn motor_bound(&self, joint_name: &str, authored: Option<f64>) -> Option<f32> {
        self.motor_overrides
            .get(joint_name)
            .copied()
            .or(authored.map(|v| v as f32))
    }
}
