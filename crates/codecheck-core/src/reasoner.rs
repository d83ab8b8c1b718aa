//! The text-generation backend seam.
//!
//! The engine never talks to a model directly. Every reasoning step is a
//! [`GenerationRequest`] handed to a [`Reasoner`], which must answer with a
//! JSON value shaped like [`Task::target_shape`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

/// What a generation request is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Task {
    /// Regulation text → requirement list.
    MapRequirements,
    /// One (component, requirement) pair without a checkable condition.
    JudgeComponent,
    /// One relational requirement over a group of components.
    JudgeRelationship,
}

impl Task {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MapRequirements => "map_requirements",
            Self::JudgeComponent => "judge_component",
            Self::JudgeRelationship => "judge_relationship",
        }
    }

    /// Skeleton of the JSON the backend must fill in.
    pub fn target_shape(self) -> Value {
        match self {
            Self::MapRequirements => json!({
                "requirements": [{
                    "id": "R1",
                    "description": "string",
                    "applicability": ["IfcDoor"],
                    "is_relational": false,
                    "condition": {
                        "attribute": "width",
                        "comparator": "at_least | at_most | greater_than | less_than | equal | not_equal",
                        "threshold": "800mm"
                    },
                    "attributes": ["width"],
                    "relation_type": "geometry | topology | semantic | null"
                }]
            }),
            Self::JudgeComponent => json!({
                "compliance_status": "compliant | non_compliant | uncertain",
                "data_used": {"attribute": "observed value copied from evidence"},
                "violation_reason": "string | null",
                "suggested_fix": "string | null"
            }),
            Self::JudgeRelationship => json!({
                "compliance_status": "compliant | non_compliant | uncertain",
                "analysis_evidence": {"measured": "value", "required": "value"},
                "violation_reason": "string | null",
                "suggested_fix": "string | null"
            }),
        }
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One call to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub task: Task,
    pub system: String,
    pub prompt: String,
    /// Structured payload (requirement, evidence) the prompt refers to.
    pub context: Value,
}

impl GenerationRequest {
    pub fn new(task: Task, system: impl Into<String>, prompt: impl Into<String>, context: Value) -> Self {
        Self {
            task,
            system: system.into(),
            prompt: prompt.into(),
            context,
        }
    }

    pub fn target_shape(&self) -> Value {
        self.task.target_shape()
    }
}

/// Reasoner-side failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// The backend cannot be reached or refuses every call. Fatal for an
    /// evaluation.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("generation failed: {0}")]
    Failed(String),

    #[error("generation timed out after {0} ms")]
    Timeout(u64),

    /// The backend answered but not with the requested shape.
    #[error("malformed output: {0}")]
    Malformed(String),

    #[error("{0} is not supported by this backend")]
    Unsupported(Task),
}

impl GenerationError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// A text-generation backend.
#[async_trait]
pub trait Reasoner: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    async fn generate(&self, request: GenerationRequest) -> Result<Value, GenerationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_unavailable_is_fatal() {
        assert!(GenerationError::Unavailable("down".into()).is_fatal());
        assert!(!GenerationError::Failed("500".into()).is_fatal());
        assert!(!GenerationError::Timeout(10).is_fatal());
        assert!(!GenerationError::Unsupported(Task::JudgeComponent).is_fatal());
    }

    #[test]
    fn test_target_shapes_name_status_field() {
        for task in [Task::JudgeComponent, Task::JudgeRelationship] {
            assert!(task.target_shape().get("compliance_status").is_some());
        }
        assert!(Task::MapRequirements.target_shape()["requirements"].is_array());
    }

    #[test]
    fn test_unsupported_message_names_task() {
        let err = GenerationError::Unsupported(Task::JudgeRelationship);
        assert_eq!(err.to_string(), "judge_relationship is not supported by this backend");
    }
}
