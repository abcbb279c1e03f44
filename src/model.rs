//! Plain data shared by every layer: per-file coverage counts, escalation
//! levels and the violations produced by threshold checks.

use serde::{Deserialize, Serialize};

/// Compute a coverage percentage, or `None` when nothing was testable.
#[must_use]
pub fn percentage(tested: u128, testable: u128) -> Option<f64> {
    if testable == 0 {
        None
    } else {
        Some(tested as f64 * 100.0 / testable as f64)
    }
}

/// Tested/testable line counts for one source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageRecord {
    /// Repository-relative path.
    pub path: String,
    pub lines_tested: u64,
    pub lines_testable: u64,
}

impl CoverageRecord {
    pub fn new(path: impl Into<String>, lines_tested: u64, lines_testable: u64) -> Self {
        Self {
            path: path.into(),
            lines_tested,
            lines_testable,
        }
    }

    /// `None` for files without a single testable line.
    #[must_use]
    pub fn percentage(&self) -> Option<f64> {
        percentage(self.lines_tested.into(), self.lines_testable.into())
    }

    /// Final path component, used when matching ignore patterns.
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// How hard a threshold violation hits the build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Escalation {
    /// Fails the run.
    Block,
    /// Advisory only.
    Warn,
}

impl Escalation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Escalation::Block => "block",
            Escalation::Warn => "warn",
        }
    }
}

impl std::fmt::Display for Escalation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed threshold check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub escalation: Escalation,
    pub message: String,
}

impl Violation {
    pub fn new(escalation: Escalation, message: impl Into<String>) -> Self {
        Self {
            escalation,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_blocking(&self) -> bool {
        self.escalation == Escalation::Block
    }
}
