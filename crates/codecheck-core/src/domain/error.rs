//! Engine-level error taxonomy.
//!
//! Only fatal conditions live here. Per-record normalization problems and
//! per-pair judgment failures are recovered locally and never reach the
//! caller as errors.

use serde::{Deserialize, Serialize};

/// One structural defect found by the result validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaIssue {
    /// Dotted path of the offending field, e.g. `checked_components[2].violation_reason`.
    pub path: String,
    /// What is wrong with it.
    pub message: String,
}

impl SchemaIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for SchemaIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Errors surfaced by [`crate::Engine::evaluate`] and the report helpers.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("requirement mapping failed: {0}")]
    RequirementMappingFailed(String),

    #[error("text-generation backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("schema violation: {}", format_issues(.0))]
    SchemaViolation(Vec<SchemaIssue>),

    #[error("report {0} already exists")]
    ReportExists(String),

    #[error("digest mismatch: expected {expected}, got {actual}")]
    DigestMismatch { expected: String, actual: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Name of the pipeline stage that failed, for user-facing messages.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::RequirementMappingFailed(_) => "mapping",
            Self::BackendUnavailable(_) => "judgment infrastructure",
            Self::SchemaViolation(_) => "schema validation",
            Self::ReportExists(_)
            | Self::DigestMismatch { .. }
            | Self::Serialization(_)
            | Self::Io(_) => "report",
        }
    }
}

fn format_issues(issues: &[SchemaIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
