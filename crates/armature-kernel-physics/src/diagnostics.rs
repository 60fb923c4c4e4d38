//! Non-fatal import diagnostics.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a diagnostic, ordered from least to most serious.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// Informational; the mechanism is unaffected.
    JustAWarning,
    /// Something was skipped but the mechanism should still behave.
    ProbablyOkay,
    /// The mechanism will probably misbehave.
    LikelyIssues,
    /// The result should not be used.
    Unimportable,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::JustAWarning => "warning",
            Severity::ProbablyOkay => "probably-okay",
            Severity::LikelyIssues => "likely-issues",
            Severity::Unimportable => "unimportable",
        };
        f.write_str(label)
    }
}

/// A single `(severity, message)` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// How serious the problem is.
    pub severity: Severity,
    /// Human-readable description.
    pub message: String,
}

/// Diagnostics accumulated over one compilation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic and log it.
    pub fn push(&mut self, severity: Severity, message: impl Into<String>) {
        let message = message.into();
        if severity >= Severity::LikelyIssues {
            tracing::warn!(%severity, "{}", message);
        } else {
            tracing::debug!(%severity, "{}", message);
        }
        self.entries.push(Diagnostic { severity, message });
    }

    /// Highest severity recorded, if any.
    pub fn max_severity(&self) -> Option<Severity> {
        self.entries.iter().map(|d| d.severity).max()
    }

    /// Whether every recorded severity is strictly below `threshold`.
    pub fn is_importable(&self, threshold: Severity) -> bool {
        self.max_severity().map_or(true, |s| s < threshold)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over entries in the order they were raised.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    /// Count entries with exactly this severity.
    pub fn count(&self, severity: Severity) -> usize {
        self.entries.iter().filter(|d| d.severity == severity).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_order() {
        assert!(Severity::JustAWarning < Severity::ProbablyOkay);
        assert!(Severity::ProbablyOkay < Severity::LikelyIssues);
        assert!(Severity::LikelyIssues < Severity::Unimportable);
    }

    #[test]
    fn importable_threshold() {
        let mut diags = Diagnostics::new();
        assert!(diags.is_importable(Severity::Unimportable));
        assert_eq!(diags.max_severity(), None);

        diags.push(Severity::ProbablyOkay, "skipped part");
        diags.push(Severity::LikelyIssues, "identical break");
        assert_eq!(diags.max_severity(), Some(Severity::LikelyIssues));
        assert!(diags.is_importable(Severity::Unimportable));
        assert!(!diags.is_importable(Severity::LikelyIssues));

        diags.push(Severity::Unimportable, "missing tree value");
        assert!(!diags.is_importable(Severity::Unimportable));
        assert_eq!(diags.len(), 3);
        assert_eq!(diags.count(Severity::ProbablyOkay), 1);
    }
}
