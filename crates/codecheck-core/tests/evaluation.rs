//! End-to-end evaluation scenarios against the offline and scripted reasoners.

use std::sync::Arc;
use std::time::Duration;

use codecheck_core::fakes::{ScriptedReasoner, UnavailableReasoner};
use codecheck_core::{
    ComplianceStatus, Engine, EngineConfig, EngineError, GenerationError, HeuristicReasoner,
    OverallStatus, Task,
};
use serde_json::{json, Value};

fn offline() -> Engine {
    Engine::new(Arc::new(HeuristicReasoner::new()))
}

fn fire_rating_rule() -> Value {
    json!({"requirements": [{
        "id": "R1",
        "description": "Doors must be fire rated",
        "applicability": ["IfcDoor"],
        "attributes": ["fire_rating"]
    }]})
}

#[tokio::test]
async fn wide_door_is_compliant() {
    let trace = vec![json!({"element_id": "D1", "type": "IfcDoor", "width": "900mm"})];
    let result = offline()
        .evaluate("Minimum door width 800mm", &trace)
        .await
        .unwrap();

    assert_eq!(result.overall_status, OverallStatus::Compliant);
    assert_eq!(result.checked_components.len(), 1);
    let door = &result.checked_components[0];
    assert_eq!(door.component_id, "D1");
    assert_eq!(door.component_type, "IfcDoor");
    assert_eq!(door.compliance_status, ComplianceStatus::Compliant);
    assert_eq!(door.data_used["width"], json!("900mm"));
    assert!(door.checked_rule.starts_with("[R1]"));
    assert!(result.relationship_checks.is_empty());
}

#[tokio::test]
async fn detail_text_supplies_width_for_listed_element() {
    let trace = vec![json!({
        "result": "pass",
        "detail": "door width 900mm measured",
        "elements_checked": ["D1"]
    })];
    let result = offline()
        .evaluate("Minimum door width 800mm", &trace)
        .await
        .unwrap();

    assert_eq!(result.checked_components.len(), 1);
    let door = &result.checked_components[0];
    assert_eq!(door.component_id, "D1");
    assert_eq!(door.component_type, "IfcDoor");
    assert_eq!(door.compliance_status, ComplianceStatus::Compliant);
    assert_eq!(door.data_used["width"], json!("900mm"));
    assert_eq!(result.overall_status, OverallStatus::Compliant);
}

#[tokio::test]
async fn property_set_ids_stay_with_their_element() {
    let trace = vec![json!({
        "GlobalId": "D1",
        "type": "IfcDoor",
        "properties": {"Pset_DoorCommon": {"id": 57, "width": "700mm"}}
    })];
    let result = offline()
        .evaluate("Minimum door width 800mm", &trace)
        .await
        .unwrap();

    assert_eq!(result.checked_components.len(), 1);
    let door = &result.checked_components[0];
    assert_eq!(door.component_id, "D1");
    assert_eq!(door.compliance_status, ComplianceStatus::NonCompliant);
    assert_eq!(door.data_used["width"], json!("700mm"));
    assert_eq!(result.overall_status, OverallStatus::NonCompliant);
}

#[tokio::test]
async fn riser_height_is_not_confused_with_handrail_height() {
    let trace = vec![json!({
        "element_id": "F1",
        "type": "IfcStairFlight",
        "detail": "riser height 175mm, handrail height 900mm"
    })];
    let result = offline()
        .evaluate("Riser height shall not exceed 180 mm.", &trace)
        .await
        .unwrap();

    let flight = &result.checked_components[0];
    assert_eq!(flight.compliance_status, ComplianceStatus::Compliant);
    assert_eq!(flight.data_used.len(), 1);
    assert_eq!(flight.data_used["riser_height"], json!("175mm"));
    assert_eq!(result.overall_status, OverallStatus::Compliant);
}

#[tokio::test]
async fn float_measurements_are_ordered() {
    let trace = vec![
        json!({"element_id": "D1", "type": "IfcDoor", "width": 914.4000000000001}),
        json!({"element_id": "D2", "type": "IfcDoor", "width": 762.0000000000001}),
    ];
    let result = offline()
        .evaluate("Minimum door width 800mm", &trace)
        .await
        .unwrap();

    let statuses: Vec<ComplianceStatus> = result
        .checked_components
        .iter()
        .map(|c| c.compliance_status)
        .collect();
    assert_eq!(
        statuses,
        vec![ComplianceStatus::Compliant, ComplianceStatus::NonCompliant]
    );
    assert_eq!(result.overall_status, OverallStatus::Partial);
}

#[tokio::test]
async fn measurement_shared_by_several_doors_is_not_attributed() {
    let trace = vec![json!({
        "result": "fail",
        "detail": "door width 750mm measured",
        "elements_checked": ["D1", "D2"]
    })];
    let result = offline()
        .evaluate("Minimum door width 800mm", &trace)
        .await
        .unwrap();

    assert_eq!(result.checked_components.len(), 2);
    for door in &result.checked_components {
        assert_eq!(door.component_type, "IfcDoor");
        assert_eq!(door.compliance_status, ComplianceStatus::Uncertain);
        assert!(door.data_used.is_empty());
    }
    assert_eq!(result.overall_status, OverallStatus::Uncertain);
}

#[tokio::test]
async fn mixed_doors_are_partial() {
    let trace = vec![
        json!({"element_id": "D1", "type": "IfcDoor", "width": "900mm"}),
        json!({"element_id": "D2", "type": "IfcDoor", "width": "750mm"}),
    ];
    let result = offline()
        .evaluate("Minimum door width 800mm", &trace)
        .await
        .unwrap();

    assert_eq!(result.overall_status, OverallStatus::Partial);
    let narrow = result
        .checked_components
        .iter()
        .find(|c| c.component_id == "D2")
        .unwrap();
    assert_eq!(narrow.compliance_status, ComplianceStatus::NonCompliant);
    assert!(narrow.violation_reason.as_deref().unwrap().contains("750mm"));
    assert!(narrow.suggested_fix.as_deref().unwrap().contains("D2"));
}

#[tokio::test]
async fn lone_stair_yields_no_relationship_check() {
    let trace = vec![json!({"element_id": "S1", "type": "IfcStair"})];
    let result = offline()
        .evaluate(
            "The clearance between stair and wall shall be at least 800 mm.",
            &trace,
        )
        .await
        .unwrap();

    assert!(result.relationship_checks.is_empty());
    assert!(result.checked_components.is_empty());
    assert_eq!(result.overall_status, OverallStatus::NotApplicable);
}

#[tokio::test]
async fn stair_and_wall_clearance_from_joint_observation() {
    let trace = vec![
        json!({"element_id": "S1", "type": "IfcStair"}),
        json!({"element_id": "W1", "type": "IfcWall"}),
        json!({"elements_checked": ["S1", "W1"], "clearance": "760mm"}),
    ];
    let result = offline()
        .evaluate(
            "The clearance between stair and wall shall be at least 800 mm.",
            &trace,
        )
        .await
        .unwrap();

    assert_eq!(result.relationship_checks.len(), 1);
    let check = &result.relationship_checks[0];
    assert_eq!(check.compliance_status, ComplianceStatus::NonCompliant);
    assert_eq!(check.involved_components, vec!["S1".to_string(), "W1".to_string()]);
    assert_eq!(result.overall_status, OverallStatus::NonCompliant);
}

#[tokio::test]
async fn prose_without_requirements_is_not_applicable() {
    let trace = vec![json!({"element_id": "D1", "type": "IfcDoor", "width": "900mm"})];
    let result = offline()
        .evaluate("This section applies to new buildings", &trace)
        .await
        .unwrap();

    assert!(result.checked_components.is_empty());
    assert!(result.relationship_checks.is_empty());
    assert_eq!(result.overall_status, OverallStatus::NotApplicable);
}

#[tokio::test]
async fn missing_measurement_is_uncertain_with_empty_data() {
    let trace = vec![json!({"element_id": "D1", "type": "IfcDoor"})];
    let result = offline()
        .evaluate("Minimum door width 800mm", &trace)
        .await
        .unwrap();

    let door = &result.checked_components[0];
    assert_eq!(door.compliance_status, ComplianceStatus::Uncertain);
    assert!(door.data_used.is_empty());
    assert!(door.note.is_some());
    assert_eq!(result.overall_status, OverallStatus::Uncertain);
}

#[tokio::test]
async fn repeated_evaluation_is_identical() {
    let trace = vec![
        json!({"element_id": "D2", "type": "IfcDoor", "width": "750mm"}),
        json!({"element_id": "D1", "type": "IfcDoor", "width": "900mm"}),
        json!({"tool_name": "stair_check", "detail": "riser height 190mm", "element_id": "F1", "type": "IfcStairFlight"}),
    ];
    let text = "Minimum door width 800mm. Riser height shall not exceed 180 mm.";
    let engine = offline();
    let first = engine.evaluate(text, &trace).await.unwrap();
    let second = engine.evaluate(text, &trace).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn unavailable_backend_fails_the_call() {
    let engine = Engine::new(Arc::new(UnavailableReasoner));
    let trace = vec![json!({"element_id": "D1", "type": "IfcDoor", "width": "900mm"})];
    let err = engine
        .evaluate("Minimum door width 800mm", &trace)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::BackendUnavailable(_)));
}

#[tokio::test]
async fn unavailable_during_judgment_fails_the_call() {
    let reasoner = ScriptedReasoner::new()
        .respond(Task::MapRequirements, fire_rating_rule())
        .fail(
            Task::JudgeComponent,
            GenerationError::Unavailable("connection refused".to_string()),
        );
    let trace = vec![json!({"element_id": "D1", "type": "IfcDoor", "fire_rating": "EI30"})];
    let err = Engine::new(Arc::new(reasoner))
        .evaluate("Doors must be fire rated", &trace)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::BackendUnavailable(_)));
    assert_eq!(err.stage(), "judgment infrastructure");
}

#[tokio::test]
async fn failed_pair_becomes_uncertain() {
    let reasoner = ScriptedReasoner::new()
        .respond(Task::MapRequirements, fire_rating_rule())
        .respond_for(
            Task::JudgeComponent,
            "D1",
            json!({"compliance_status": "compliant", "data_used": {"fire_rating": "EI30"}}),
        )
        .fail_for(
            Task::JudgeComponent,
            "D2",
            GenerationError::Failed("model refused".to_string()),
        );
    let trace = vec![
        json!({"element_id": "D1", "type": "IfcDoor", "fire_rating": "EI30"}),
        json!({"element_id": "D2", "type": "IfcDoor", "fire_rating": "none"}),
    ];
    let result = Engine::new(Arc::new(reasoner))
        .evaluate("Doors must be fire rated", &trace)
        .await
        .unwrap();

    assert_eq!(result.checked_components.len(), 2);
    let d1 = &result.checked_components[0];
    let d2 = &result.checked_components[1];
    assert_eq!(d1.compliance_status, ComplianceStatus::Compliant);
    assert_eq!(d1.data_used["fire_rating"], json!("EI30"));
    assert_eq!(d2.compliance_status, ComplianceStatus::Uncertain);
    assert!(d2.note.as_deref().unwrap().contains("judgment failed"));
    assert_eq!(result.overall_status, OverallStatus::Compliant);
}

#[tokio::test(start_paused = true)]
async fn slow_judgments_time_out_as_uncertain() {
    let reasoner = ScriptedReasoner::new()
        .respond(Task::MapRequirements, fire_rating_rule())
        .respond(
            Task::JudgeComponent,
            json!({"compliance_status": "compliant"}),
        )
        .with_delay(Duration::from_millis(500));
    let trace = vec![json!({"element_id": "D1", "type": "IfcDoor", "fire_rating": "EI30"})];
    let engine = Engine::new(Arc::new(reasoner))
        .with_config(EngineConfig::default().with_pair_timeout_ms(100));
    let result = engine
        .evaluate("Doors must be fire rated", &trace)
        .await
        .unwrap();

    let door = &result.checked_components[0];
    assert_eq!(door.compliance_status, ComplianceStatus::Uncertain);
    assert!(door.note.as_deref().unwrap().contains("timed out"));
}

#[tokio::test]
async fn detailed_evaluation_exposes_inputs() {
    let trace = vec![
        json!({"element_id": "D1", "type": "IfcDoor", "width": "900mm"}),
        json!("garbage"),
    ];
    let evaluation = offline()
        .evaluate_detailed("Minimum door width 800mm", &trace)
        .await
        .unwrap();

    assert_eq!(evaluation.requirements.len(), 1);
    assert!(evaluation.evidence.contains("D1"));
    assert_eq!(evaluation.evidence.skipped().len(), 1);
    assert!(!evaluation.evaluation_id.is_empty());
}
