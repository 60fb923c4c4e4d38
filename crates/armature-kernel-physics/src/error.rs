//! Error types for mechanism compilation.

use thiserror::Error;

/// Fatal errors that abort compilation.
///
/// Recoverable problems are reported as [`crate::Diagnostic`]s instead.
#[derive(Error, Debug)]
pub enum CompileError {
    /// The sentinel grounded joint instance is absent.
    #[error("Document has no grounded joint instance")]
    NoGroundedJoint,

    /// The part definition catalog is absent.
    #[error("Document has no part definition catalog")]
    NoPartDefinitions,

    /// Compile settings are out of range.
    #[error("Invalid compile settings: {0}")]
    Settings(String),

    /// Reading a document or settings file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A settings file could not be parsed.
    #[error("Failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Result type for compile operations.
pub type Result<T> = std::result::Result<T, CompileError>;

/// Reasons a part's mesh cannot become a collision sub-shape.
///
/// These never abort compilation; they are reported as diagnostics.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ShapeError {
    /// Too few vertices or no triangles.
    #[error("mesh has {vertices} vertices and {triangles} triangles")]
    TooSmall {
        /// Vertex count.
        vertices: usize,
        /// Triangle count.
        triangles: usize,
    },

    /// A triangle references a vertex that does not exist.
    #[error("index {index} out of range for {vertices} vertices")]
    IndexOutOfRange {
        /// Offending index.
        index: u32,
        /// Vertex count.
        vertices: usize,
    },

    /// Every triangle was degenerate.
    #[error("no non-degenerate triangles")]
    Degenerate,

    /// The physics backend rejected the shape.
    #[error("failed to build {kind}: {reason}")]
    Backend {
        /// Shape kind being built.
        kind: &'static str,
        /// Backend message.
        reason: String,
    },
}
