//! armature CLI - assembly document inspection and compilation
//!
//! Compiles assembly documents into rigid bodies and joints and prints the
//! import report.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use armature_ir::Document;
use armature_kernel_physics::{CompileSettings, PhysicsWorld};

mod report;

use report::Report;

/// Exit code for documents whose diagnostics reach the unimportable threshold.
const EXIT_UNIMPORTABLE: i32 = 2;

#[derive(Parser)]
#[command(name = "armature")]
#[command(about = "Compile CAD assemblies into physics mechanisms", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display information about an assembly document
    Info {
        /// Path to the document (.json)
        file: PathBuf,
    },
    /// Compile a document and print the import report
    Compile {
        /// Path to the document (.json)
        file: PathBuf,
        /// Compile settings (.toml); defaults are used when omitted
        #[arg(short, long)]
        settings: Option<PathBuf>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "armature=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Info { file } => {
            show_info(&file)?;
        }
        Commands::Compile {
            file,
            settings,
            json,
        } => {
            if !compile(&file, settings.as_deref(), json)? {
                std::process::exit(EXIT_UNIMPORTABLE);
            }
        }
    }

    Ok(())
}

fn load_document(file: &Path) -> Result<Document> {
    let json = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let doc = Document::from_json(&json)
        .with_context(|| format!("Failed to parse {}", file.display()))?;
    Ok(doc)
}

fn show_info(file: &Path) -> Result<()> {
    let doc = load_document(file)?;

    println!("armature document: {}", file.display());
    println!("  Name: {}", doc.name);
    println!("  Version: {}", doc.version);
    println!(
        "  Kind: {}",
        if doc.dynamic { "robot" } else { "field" }
    );
    println!(
        "  Part definitions: {}",
        doc.part_definitions
            .as_ref()
            .map_or_else(|| "missing".to_string(), |d| d.len().to_string())
    );
    println!("  Part instances: {}", doc.part_instances.len());
    println!("  Materials: {}", doc.materials.len());
    println!("  Joint definitions: {}", doc.joint_definitions.len());
    println!("  Joint instances: {}", doc.joint_instances.len());
    println!("  Rigid groups: {}", doc.rigid_groups.len());
    println!(
        "  Grounded: {}",
        if doc.grounded_joint().is_some() { "yes" } else { "no" }
    );

    Ok(())
}

/// Compile and print the report. Returns whether the result is importable.
fn compile(file: &Path, settings: Option<&Path>, json: bool) -> Result<bool> {
    let doc = load_document(file)?;
    let settings = match settings {
        Some(path) => CompileSettings::load(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => CompileSettings::default(),
    };

    let mut world = PhysicsWorld::new();
    let spawned = world.spawn(&doc, &settings)?;
    let report = Report::new(&doc, &settings, &spawned);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        report.print();
    }

    Ok(report.importable)
}
