//! Domain models for the compliance engine.
//!
//! - `Requirement`: one checkable rule derived from regulation text
//! - `CheckedComponent` / `RelationshipCheck`: findings
//! - `ComplianceEvaluationResult`: the assembled report

pub mod error;
pub mod finding;
pub mod requirement;

pub use error::{EngineError, Result, SchemaIssue};
pub use finding::{
    CheckedComponent, ComplianceEvaluationResult, ComplianceStatus, OverallStatus,
    RelationType, RelationshipCheck,
};
pub use requirement::{literal, Comparator, Condition, Requirement};
