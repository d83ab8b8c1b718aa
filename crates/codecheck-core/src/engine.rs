//! The compliance evaluation engine.
//!
//! ```text
//! trace ─► normalize ─► map requirements ─► judge (parallel) ─► aggregate ─► validate
//! ```
//!
//! Each stage only reads what the previous stage produced. The engine keeps
//! no state between calls.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::domain::{ComplianceEvaluationResult, Requirement, Result};
use crate::evidence::{EvidenceMap, EvidenceNormalizer};
use crate::executor;
use crate::judgment::{self, Finding, JudgmentContext};
use crate::mapper;
use crate::metrics::METRICS;
use crate::obs;
use crate::reasoner::Reasoner;
use crate::validate::{validate, ValidatedResult};

/// A validated result together with the inputs it was derived from.
#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    pub evaluation_id: String,
    pub requirements: Vec<Requirement>,
    pub evidence: EvidenceMap,
    pub result: ValidatedResult,
    pub duration_ms: u64,
}

pub struct Engine {
    reasoner: Arc<dyn Reasoner>,
    config: EngineConfig,
}

impl Engine {
    pub fn new(reasoner: Arc<dyn Reasoner>) -> Self {
        Self {
            reasoner,
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn reasoner_name(&self) -> &str {
        self.reasoner.name()
    }

    /// Evaluate `regulation_text` against the evidence in `execution_trace`.
    pub async fn evaluate(&self, regulation_text: &str, execution_trace: &[Value]) -> Result<ValidatedResult> {
        Ok(self
            .evaluate_detailed(regulation_text, execution_trace)
            .await?
            .result)
    }

    /// Like [`Engine::evaluate`], also returning the evidence map and the
    /// requirement set.
    pub async fn evaluate_detailed(&self, regulation_text: &str, execution_trace: &[Value]) -> Result<Evaluation> {
        let evaluation_id = Uuid::new_v4().to_string();
        let span = obs::evaluation_span(&evaluation_id);
        let started = Instant::now();
        METRICS.inc_evaluations();

        let outcome = async {
            obs::emit_evaluation_started(&evaluation_id, regulation_text.chars().count(), execution_trace.len());
            let outcome = self.run(regulation_text, execution_trace).await;
            let duration_ms = started.elapsed().as_millis() as u64;
            match &outcome {
                Ok((_, _, result)) => obs::emit_evaluation_finished(
                    &evaluation_id,
                    result.overall_status.as_str(),
                    result.checked_components.len(),
                    result.relationship_checks.len(),
                    duration_ms,
                ),
                Err(e) => obs::emit_evaluation_failed(&evaluation_id, e.stage(), e),
            }
            outcome
        }
        .instrument(span)
        .await;

        let (requirements, evidence, result) = outcome?;
        Ok(Evaluation {
            evaluation_id,
            requirements,
            evidence,
            result,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Normalize a trace on its own.
    pub fn normalize(&self, execution_trace: &[Value]) -> EvidenceMap {
        let evidence = EvidenceNormalizer::new(self.config.max_trace_depth).normalize(execution_trace);
        obs::emit_evidence_normalized(
            evidence.len(),
            evidence.general().len(),
            evidence.joint_observations().len(),
            evidence.skipped().len(),
        );
        evidence
    }

    /// Map regulation text on its own.
    pub async fn map_requirements(&self, regulation_text: &str) -> Result<Vec<Requirement>> {
        mapper::map_requirements(self.reasoner.as_ref(), regulation_text).await
    }

    async fn run(
        &self,
        regulation_text: &str,
        execution_trace: &[Value],
    ) -> Result<(Vec<Requirement>, EvidenceMap, ValidatedResult)> {
        let evidence = Arc::new(self.normalize(execution_trace));
        let requirements = Arc::new(self.map_requirements(regulation_text).await?);

        let jobs = judgment::plan(&evidence, &requirements);
        let ctx = Arc::new(JudgmentContext {
            evidence: Arc::clone(&evidence),
            requirements: Arc::clone(&requirements),
            reasoner: Arc::clone(&self.reasoner),
        });
        let findings = executor::run_jobs(ctx, jobs, &self.config).await?;

        let mut components = Vec::new();
        let mut relationships = Vec::new();
        for finding in findings {
            match finding {
                Finding::Component(c) => components.push(c),
                Finding::Relationship(r) => relationships.push(r),
            }
        }
        let result = ComplianceEvaluationResult::from_findings(components, relationships);
        let validated = validate(result, &evidence)?;

        let requirements = Arc::try_unwrap(requirements).unwrap_or_else(|shared| (*shared).clone());
        let evidence = Arc::try_unwrap(evidence).unwrap_or_else(|shared| (*shared).clone());
        Ok((requirements, evidence, validated))
    }
}
