//! Request builders for the three reasoning tasks.

use std::collections::BTreeMap;

use serde_json::{json, Value};

use crate::domain::Requirement;
use crate::reasoner::{GenerationRequest, Task};

const MAPPING_SYSTEM: &str = "\
You are a building code analyst. Break the regulation into discrete, checkable requirements.

Rules:
- One requirement per independently checkable obligation. Never invent obligations the text does not state.
- applicability lists IFC element classes (IfcDoor, IfcStair, IfcWall, IfcSpace ...). Leave it empty only when the rule governs every element.
- When the text gives a numeric limit, fill condition with the measured attribute, the comparator and the literal threshold including its unit. \"Minimum X is Y\" means every element must have X >= Y.
- Set is_relational for rules about two or more elements together (clearance between, adjacent to, connected to).
- If nothing checkable can be derived, return an empty requirements list.
- Answer with JSON only, matching the target shape.";

const COMPONENT_SYSTEM: &str = "\
You are a building code compliance reviewer judging one element against one requirement.

Rules:
- Report faithfully. If the evidence already contains a judgment field (meets_threshold, passes_check, result = pass/fail), use it; never overturn it.
- data_used may only contain attributes that appear in the evidence, with their values copied verbatim.
- If the evidence does not settle the question, answer uncertain.
- A non_compliant answer must give a specific violation_reason naming the observed and required values, and an actionable suggested_fix (e.g. \"Increase width to 800mm or more\").
- Answer with JSON only, matching the target shape.";

const RELATIONSHIP_SYSTEM: &str = "\
You are a building code compliance reviewer judging a relationship between several elements.

Rules:
- Use only the supplied evidence. analysis_evidence should state what was measured and what was required.
- If the evidence does not settle the question, answer uncertain.
- A non_compliant answer must give a violation_reason and an actionable suggested_fix.
- Answer with JSON only, matching the target shape.";

fn target_block(task: Task) -> String {
    serde_json::to_string_pretty(&task.target_shape()).unwrap_or_default()
}

pub fn map_requirements(regulation_text: &str) -> GenerationRequest {
    let prompt = format!(
        "REGULATION TEXT:\n{regulation_text}\n\nTARGET SHAPE:\n{}\n\nTASK: list the checkable requirements.",
        target_block(Task::MapRequirements)
    );
    GenerationRequest::new(
        Task::MapRequirements,
        MAPPING_SYSTEM,
        prompt,
        json!({ "regulation_text": regulation_text }),
    )
}

pub fn judge_component(
    requirement: &Requirement,
    component_id: &str,
    component_type: &str,
    evidence: &BTreeMap<String, Value>,
) -> GenerationRequest {
    let context = json!({
        "requirement": requirement,
        "component_id": component_id,
        "component_type": component_type,
        "evidence": evidence,
    });
    let prompt = format!(
        "REQUIREMENT:\n{}\n\nCOMPONENT: {component_id} ({component_type})\n\nEVIDENCE:\n{}\n\nTARGET SHAPE:\n{}\n\nTASK: judge this component against the requirement.",
        requirement.rule_label(),
        serde_json::to_string_pretty(evidence).unwrap_or_default(),
        target_block(Task::JudgeComponent)
    );
    GenerationRequest::new(Task::JudgeComponent, COMPONENT_SYSTEM, prompt, context)
}

pub fn judge_relationship(
    requirement: &Requirement,
    participants: &[String],
    evidence: &Value,
) -> GenerationRequest {
    let context = json!({
        "requirement": requirement,
        "involved_components": participants,
        "evidence": evidence,
    });
    let prompt = format!(
        "REQUIREMENT:\n{}\n\nCOMPONENTS: {}\n\nEVIDENCE:\n{}\n\nTARGET SHAPE:\n{}\n\nTASK: judge whether these components satisfy the requirement together.",
        requirement.rule_label(),
        participants.join(", "),
        serde_json::to_string_pretty(evidence).unwrap_or_default(),
        target_block(Task::JudgeRelationship)
    );
    GenerationRequest::new(Task::JudgeRelationship, RELATIONSHIP_SYSTEM, prompt, context)
}
