//! Codecheck Core Library
//!
//! Evaluates building-model evidence against regulation text: normalizes
//! a tool execution trace, maps the regulation into discrete requirements,
//! judges every applicable (component, requirement) pair and every
//! relational requirement, then aggregates and validates the result.

pub mod aggregate;
pub mod config;
pub mod domain;
pub mod engine;
pub mod evidence;
pub mod executor;
pub mod fakes;
pub mod heuristic;
pub mod judgment;
pub mod mapper;
pub mod metrics;
pub mod obs;
pub mod prompts;
pub mod reasoner;
pub mod report;
pub mod telemetry;
pub mod validate;
pub mod vocabulary;

pub use aggregate::{overall_status, StatusTally};

pub use config::EngineConfig;

pub use domain::{
    CheckedComponent, Comparator, ComplianceEvaluationResult, ComplianceStatus, Condition,
    EngineError, OverallStatus, RelationType, RelationshipCheck, Requirement, Result, SchemaIssue,
};

pub use engine::{Engine, Evaluation};

pub use evidence::{EvidenceBag, EvidenceMap, EvidenceNormalizer};

pub use heuristic::HeuristicReasoner;

pub use reasoner::{GenerationError, GenerationRequest, Reasoner, Task};

pub use report::{read_report_artifact, render_markdown, write_report_artifact, ComplianceReport};

pub use telemetry::init_tracing;

pub use validate::{validate, ValidatedResult};
