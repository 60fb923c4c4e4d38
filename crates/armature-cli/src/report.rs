//! Import report printed by `armature compile`.

use serde::Serialize;

use armature_ir::Document;
use armature_kernel_physics::{
    CompileSettings, ConstraintKind, Diagnostic, RigidNodeId, Severity, Spawned,
};

#[derive(Debug, Serialize)]
pub struct NodeReport {
    pub id: RigidNodeId,
    pub name: String,
    pub members: Vec<String>,
    pub dynamic: bool,
    pub game_piece: bool,
    /// Summed part mass before scaling.
    pub part_mass: f64,
    /// Mass given to the body; `None` when the node has no body.
    pub body_mass: Option<f32>,
    pub friction: Option<f32>,
}

#[derive(Debug, Serialize)]
pub struct ConstraintReport {
    pub joint: String,
    pub kind: ConstraintKind,
    pub anchor: [f32; 3],
}

#[derive(Debug, Serialize)]
pub struct WheelReport {
    pub joint: String,
    pub radius: f32,
}

#[derive(Debug, Serialize)]
pub struct Report {
    pub document: String,
    pub version: u32,
    pub importable: bool,
    pub max_severity: Option<Severity>,
    pub root: RigidNodeId,
    pub nodes: Vec<NodeReport>,
    pub constraints: Vec<ConstraintReport>,
    pub wheels: Vec<WheelReport>,
    pub ghost_bodies: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl Report {
    pub fn new(doc: &Document, settings: &CompileSettings, spawned: &Spawned) -> Self {
        let mechanism = &spawned.mechanism;
        let nodes = spawned
            .nodes
            .iter()
            .map(|node| {
                let body = mechanism.bodies().iter().find(|b| b.node == node.id);
                NodeReport {
                    id: node.id,
                    name: node.name.clone(),
                    members: node.members.iter().cloned().collect(),
                    dynamic: node.is_dynamic,
                    game_piece: node.is_game_piece,
                    part_mass: node.mass,
                    body_mass: body.map(|b| b.mass),
                    friction: body.map(|b| b.friction),
                }
            })
            .collect();

        let constraints = mechanism
            .constraints()
            .iter()
            .map(|c| ConstraintReport {
                joint: c.joint_name.clone(),
                kind: c.kind,
                anchor: [c.anchor.x, c.anchor.y, c.anchor.z],
            })
            .collect();

        let wheels = mechanism
            .wheels()
            .iter()
            .map(|w| WheelReport {
                joint: w.joint_name.clone(),
                radius: w.radius,
            })
            .collect();

        Self {
            document: doc.name.clone(),
            version: doc.version,
            importable: spawned.diagnostics.is_importable(settings.unimportable),
            max_severity: spawned.diagnostics.max_severity(),
            root: mechanism.root(),
            nodes,
            constraints,
            wheels,
            ghost_bodies: mechanism.ghost_bodies().len(),
            diagnostics: spawned.diagnostics.iter().cloned().collect(),
        }
    }

    pub fn print(&self) {
        println!("Compiled '{}' (version {})", self.document, self.version);

        println!("\nRigid nodes ({}):", self.nodes.len());
        for node in &self.nodes {
            let marker = if node.id == self.root { " [root]" } else { "" };
            let kind = match (node.dynamic, node.game_piece) {
                (_, true) => "game piece",
                (true, false) => "dynamic",
                (false, false) => "static",
            };
            let body = match node.body_mass {
                Some(mass) => format!("{mass:.3} kg"),
                None => "no body".to_string(),
            };
            println!(
                "  {} {}{}: {}, {}, parts: {}",
                node.id,
                node.name,
                marker,
                kind,
                body,
                node.members.join(", ")
            );
        }

        println!("\nConstraints ({}):", self.constraints.len());
        for c in &self.constraints {
            println!(
                "  {}: {:?} at ({:.3}, {:.3}, {:.3})",
                c.joint, c.kind, c.anchor[0], c.anchor[1], c.anchor[2]
            );
        }
        if !self.wheels.is_empty() {
            println!("\nWheels ({}):", self.wheels.len());
            for w in &self.wheels {
                println!("  {}: radius {:.3} m", w.joint, w.radius);
            }
        }
        if self.ghost_bodies > 0 {
            println!("\nGhost bodies: {}", self.ghost_bodies);
        }

        if !self.diagnostics.is_empty() {
            println!("\nDiagnostics ({}):", self.diagnostics.len());
            for d in &self.diagnostics {
                println!("  [{}] {}", d.severity, d.message);
            }
        }

        if self.importable {
            println!("\nImportable");
        } else {
            println!(
                "\nNot importable (max severity: {})",
                self.max_severity
                    .map_or_else(|| "none".to_string(), |s| s.to_string())
            );
        }
    }
}
