//! Observability tests for the evaluation lifecycle.
//!
//! Structured events are captured with `tracing-test` and matched on their
//! `event` field.

use std::sync::Arc;

use codecheck_core::fakes::UnavailableReasoner;
use codecheck_core::obs::{
    emit_evaluation_failed, emit_judgment_failed, emit_record_skipped, evaluation_span, SpanGuard,
};
use codecheck_core::{Engine, HeuristicReasoner};
use serde_json::json;
use tracing_test::traced_test;

#[traced_test]
#[test]
fn test_emit_record_skipped_logs_index_and_reason() {
    emit_record_skipped(3, "record is not a mapping");
    assert!(logs_contain("evidence.record_skipped"));
    assert!(logs_contain("record is not a mapping"));
}

#[traced_test]
#[test]
fn test_emit_judgment_failed_logs_subject() {
    emit_judgment_failed("D7", "[R1] Minimum door width 800mm", &"backend returned garbage");
    assert!(logs_contain("judgment.failed"));
    assert!(logs_contain("D7"));
}

#[traced_test]
#[test]
fn test_emit_evaluation_failed_logs_stage() {
    emit_evaluation_failed("eval-err-001", "mapping", &"no JSON in answer");
    assert!(logs_contain("evaluation.failed"));
    assert!(logs_contain("mapping"));
}

#[traced_test]
#[test]
fn test_span_guard_enter_creates_span() {
    let guard = SpanGuard::enter(evaluation_span("eval-span-001"));
    drop(guard);
}

#[traced_test]
#[tokio::test]
async fn test_evaluate_emits_lifecycle_events() {
    let engine = Engine::new(Arc::new(HeuristicReasoner::new()));
    let trace = vec![
        json!({"element_id": "D1", "type": "IfcDoor", "width": "900mm"}),
        json!(17),
    ];
    engine
        .evaluate("Minimum door width 800mm", &trace)
        .await
        .unwrap();

    assert!(logs_contain("evaluation.started"));
    assert!(logs_contain("evidence.normalized"));
    assert!(logs_contain("evidence.record_skipped"));
    assert!(logs_contain("requirements.mapped"));
    assert!(logs_contain("evaluation.finished"));
    assert!(logs_contain("overall_status=compliant"));
}

#[traced_test]
#[tokio::test]
async fn test_fatal_evaluation_emits_failed_event() {
    let engine = Engine::new(Arc::new(UnavailableReasoner));
    let trace = vec![json!({"element_id": "D1", "type": "IfcDoor", "width": "900mm"})];
    assert!(engine.evaluate("Minimum door width 800mm", &trace).await.is_err());

    assert!(logs_contain("evaluation.failed"));
    assert!(!logs_contain("evaluation.finished"));
}
