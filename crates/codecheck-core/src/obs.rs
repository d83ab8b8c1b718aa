//! Structured observability hooks for evaluation lifecycle events.
//!
//! - `evaluation_span`: span tagging everything inside one `evaluate` call
//! - `SpanGuard`: RAII guard for synchronous sections
//! - `emit_*`: one function per lifecycle event
//!
//! Events are emitted at `info!` level, failures at `warn!`. Filter with
//! `RUST_LOG`; the CLI switches to JSON lines with `--json`.

use tracing::{info, warn};

/// Span tagging everything inside one `evaluate` call with its id.
///
/// Attach it to the evaluation future with `tracing::Instrument` so it
/// survives `.await` points:
///
/// ```ignore
/// run(...).instrument(evaluation_span("3f2a...")).await
/// ```
pub fn evaluation_span(evaluation_id: &str) -> tracing::Span {
    tracing::info_span!("codecheck.evaluation", evaluation_id = %evaluation_id)
}

/// RAII guard entering a span for synchronous work (report writing).
pub struct SpanGuard {
    _span: tracing::span::EnteredSpan,
}

impl SpanGuard {
    pub fn enter(span: tracing::Span) -> Self {
        Self {
            _span: span.entered(),
        }
    }
}

pub fn emit_evaluation_started(evaluation_id: &str, regulation_chars: usize, trace_records: usize) {
    info!(
        event = "evaluation.started",
        evaluation_id = %evaluation_id,
        regulation_chars = regulation_chars,
        trace_records = trace_records,
    );
}

/// Emit event: trace normalized into per-component evidence.
pub fn emit_evidence_normalized(components: usize, general_attributes: usize, joint: usize, skipped: usize) {
    info!(
        event = "evidence.normalized",
        components = components,
        general_attributes = general_attributes,
        joint_observations = joint,
        skipped_records = skipped,
    );
}

/// Emit event: a trace record was ignored (warning level).
pub fn emit_record_skipped(record_index: usize, reason: &str) {
    warn!(event = "evidence.record_skipped", record_index = record_index, reason = %reason);
}

pub fn emit_requirements_mapped(total: usize, relational: usize) {
    info!(event = "requirements.mapped", total = total, relational = relational);
}

/// Emit event: a single pair judgment was downgraded to uncertain.
pub fn emit_judgment_failed(subject: &str, rule: &str, reason: &dyn std::fmt::Display) {
    warn!(event = "judgment.failed", subject = %subject, rule = %rule, reason = %reason);
}

/// Emit event: evaluation produced a validated result.
pub fn emit_evaluation_finished(
    evaluation_id: &str,
    overall_status: &str,
    component_findings: usize,
    relationship_findings: usize,
    duration_ms: u64,
) {
    info!(
        event = "evaluation.finished",
        evaluation_id = %evaluation_id,
        overall_status = %overall_status,
        component_findings = component_findings,
        relationship_findings = relationship_findings,
        duration_ms = duration_ms,
    );
}

/// Emit event: evaluation aborted at a named stage (warning level).
pub fn emit_evaluation_failed(evaluation_id: &str, stage: &str, error: &dyn std::fmt::Display) {
    warn!(
        event = "evaluation.failed",
        evaluation_id = %evaluation_id,
        stage = %stage,
        error = %error,
    );
}

pub fn emit_report_written(report_id: &str, path: &str) {
    info!(event = "report.written", report_id = %report_id, path = %path);
}
