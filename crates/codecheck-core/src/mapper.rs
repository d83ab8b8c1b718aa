//! Regulation text → ordered requirement set.
//!
//! The reasoning backend proposes requirements; this module owns the
//! guarantees: non-empty descriptions, unique ids, normalized element
//! classes and no requirement that the backend did not actually return.

use std::collections::{BTreeSet, HashSet};

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::{Condition, EngineError, RelationType, Requirement, Result};
use crate::obs;
use crate::prompts;
use crate::reasoner::{GenerationError, Reasoner};
use crate::vocabulary::normalize_type;

/// Applicability words meaning "no restriction".
const ANY_TYPE: &[&str] = &["all", "any", "*", "every", "all elements"];

/// Loosely-typed requirement as proposed by a backend.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Proposed {
    id: Option<Value>,
    description: Option<String>,
    applicability: Option<Value>,
    is_relational: Option<bool>,
    condition: Option<Value>,
    attributes: Vec<Value>,
    relation_type: Option<Value>,
}

/// Derive requirements from regulation text.
///
/// Blank text yields an empty set without consulting the backend.
pub async fn map_requirements(reasoner: &dyn Reasoner, regulation_text: &str) -> Result<Vec<Requirement>> {
    let text = regulation_text.trim();
    if text.is_empty() {
        debug!("regulation text is blank; no requirements");
        obs::emit_requirements_mapped(0, 0);
        return Ok(Vec::new());
    }

    let output = reasoner
        .generate(prompts::map_requirements(text))
        .await
        .map_err(|e| match e {
            GenerationError::Unavailable(detail) => EngineError::BackendUnavailable(detail),
            other => EngineError::RequirementMappingFailed(other.to_string()),
        })?;

    let requirements = parse_requirements(&output)?;
    let relational = requirements.iter().filter(|r| r.is_relational).count();
    obs::emit_requirements_mapped(requirements.len(), relational);
    Ok(requirements)
}

/// Validate and tidy a backend answer. Accepts `{"requirements": [...]}`
/// or a bare list.
pub fn parse_requirements(output: &Value) -> Result<Vec<Requirement>> {
    let items = match output {
        Value::Array(items) => items,
        Value::Object(obj) => obj
            .get("requirements")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                EngineError::RequirementMappingFailed("output has no `requirements` list".to_string())
            })?,
        other => {
            return Err(EngineError::RequirementMappingFailed(format!(
                "expected a requirement list, got {}",
                kind_of(other)
            )))
        }
    };

    let mut used_ids: HashSet<String> = HashSet::new();
    let mut out = Vec::with_capacity(items.len());
    for (position, item) in items.iter().enumerate() {
        let proposed: Proposed = serde_json::from_value(item.clone()).map_err(|e| {
            EngineError::RequirementMappingFailed(format!("requirement #{}: {e}", position + 1))
        })?;

        let description = proposed.description.as_deref().map(str::trim).unwrap_or_default();
        if description.is_empty() {
            warn!(position, "dropping requirement with blank description");
            continue;
        }

        let base_id = proposed
            .id
            .as_ref()
            .and_then(id_text)
            .unwrap_or_else(|| format!("R{}", out.len() + 1));
        let id = unique_id(base_id, &used_ids);
        used_ids.insert(id.clone());

        let condition = proposed.condition.and_then(|raw| parse_condition(&id, raw));
        let relation_type: Option<RelationType> = proposed
            .relation_type
            .and_then(|v| serde_json::from_value(v).ok());
        let is_relational = proposed.is_relational.unwrap_or(relation_type.is_some());

        out.push(Requirement {
            id,
            description: description.to_string(),
            applicability: applicability(proposed.applicability.as_ref()),
            is_relational,
            condition,
            attributes: proposed
                .attributes
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(str::to_string)
                .collect(),
            relation_type: if is_relational { relation_type } else { None },
        });
    }
    Ok(out)
}

fn parse_condition(requirement_id: &str, raw: Value) -> Option<Condition> {
    if raw.is_null() {
        return None;
    }
    match serde_json::from_value::<Condition>(raw) {
        Ok(c) if !c.attribute.trim().is_empty() && !c.threshold.is_null() => Some(Condition {
            attribute: c.attribute.trim().to_string(),
            ..c
        }),
        Ok(_) => {
            warn!(requirement = requirement_id, "ignoring incomplete condition");
            None
        }
        Err(e) => {
            warn!(requirement = requirement_id, error = %e, "ignoring unparseable condition");
            None
        }
    }
}

fn applicability(raw: Option<&Value>) -> BTreeSet<String> {
    let names: Vec<&str> = match raw {
        Some(Value::String(s)) => s.split(',').collect(),
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    };
    let mut out = BTreeSet::new();
    for name in names.into_iter().map(str::trim).filter(|n| !n.is_empty()) {
        if ANY_TYPE.iter().any(|a| a.eq_ignore_ascii_case(name)) {
            return BTreeSet::new();
        }
        out.insert(normalize_type(name).unwrap_or_else(|| name.to_string()));
    }
    out
}

fn unique_id(base: String, used: &HashSet<String>) -> String {
    if !used.contains(&base) {
        return base;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{base}-{n}");
        if !used.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Comparator;
    use crate::fakes::{ScriptedReasoner, UnavailableReasoner};
    use crate::reasoner::Task;
    use serde_json::json;

    #[test]
    fn test_parse_normalizes_and_deduplicates() {
        let output = json!({"requirements": [
            {"id": "R1", "description": "Minimum door width 800mm", "applicability": ["door"],
             "condition": {"attribute": "width", "comparator": ">=", "threshold": "800mm"}},
            {"id": "R1", "description": "Doors must be fire rated", "applicability": "IFCDOOR"},
            {"description": "   "},
            {"description": "Stair headroom", "applicability": ["all"]}
        ]});
        let reqs = parse_requirements(&output).unwrap();
        let ids: Vec<&str> = reqs.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["R1", "R1-2", "R3"]);
        assert!(reqs[0].applicability.contains("IfcDoor"));
        assert_eq!(reqs[0].condition.as_ref().unwrap().comparator, Comparator::AtLeast);
        assert!(reqs[1].applicability.contains("IfcDoor"));
        assert!(reqs[2].applicability.is_empty());
    }

    #[test]
    fn test_parse_accepts_bare_list_and_empty() {
        assert!(parse_requirements(&json!([])).unwrap().is_empty());
        assert!(parse_requirements(&json!({"requirements": []})).unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_unusable_output() {
        assert!(matches!(
            parse_requirements(&json!("nope")),
            Err(EngineError::RequirementMappingFailed(_))
        ));
        assert!(matches!(
            parse_requirements(&json!({"items": []})),
            Err(EngineError::RequirementMappingFailed(_))
        ));
        assert!(matches!(
            parse_requirements(&json!([42])),
            Err(EngineError::RequirementMappingFailed(_))
        ));
    }

    #[test]
    fn test_relation_type_implies_relational() {
        let reqs = parse_requirements(&json!([{
            "description": "Clearance between stair and wall at least 800mm",
            "applicability": ["stair", "wall"],
            "relation_type": "geometry"
        }]))
        .unwrap();
        assert!(reqs[0].is_relational);
        assert_eq!(reqs[0].relation_type, Some(RelationType::Geometry));
    }

    #[tokio::test]
    async fn test_blank_text_skips_backend() {
        let reasoner = ScriptedReasoner::new();
        let reqs = map_requirements(&reasoner, "  \n").await.unwrap();
        assert!(reqs.is_empty());
        assert_eq!(reasoner.calls(Task::MapRequirements), 0);
    }

    #[tokio::test]
    async fn test_backend_failures_map_to_stage_errors() {
        let err = map_requirements(&UnavailableReasoner, "Minimum door width 800mm")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::BackendUnavailable(_)));

        let reasoner = ScriptedReasoner::new()
            .fail(Task::MapRequirements, GenerationError::Malformed("not json".into()));
        let err = map_requirements(&reasoner, "Minimum door width 800mm")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::RequirementMappingFailed(_)));
    }
}
