//! Relational requirements: participant grouping and measure lookup.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{json, Value};

use super::compare::{self, Verdict};
use super::{parse_answer, JudgmentContext};
use crate::domain::{literal, ComplianceStatus, Condition, RelationshipCheck, Requirement};
use crate::evidence::{lookup_in, EvidenceMap};
use crate::metrics::METRICS;
use crate::obs;
use crate::prompts;
use crate::reasoner::GenerationError;

/// Components judged together under one relational requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub requirement: usize,
    /// Shared grouping value (storey, room ...); `None` for components
    /// without one.
    pub label: Option<String>,
    /// Component ids, sorted.
    pub participants: Vec<String>,
}

/// Participant groupings for a relational requirement.
///
/// Only typed components take part. A grouping needs at least two
/// participants and, when the rule names several element classes, at least
/// one component of each.
pub fn groups(requirement_index: usize, requirement: &Requirement, evidence: &EvidenceMap) -> Vec<Group> {
    let mut by_label: BTreeMap<Option<String>, Vec<(String, String)>> = BTreeMap::new();
    for (id, bag) in evidence.components() {
        let Some(component_type) = bag.component_type.as_deref() else {
            continue;
        };
        if !requirement.applies_to(Some(component_type)) {
            continue;
        }
        let label = bag.grouping().map(|(_, value)| value);
        by_label
            .entry(label)
            .or_default()
            .push((id.clone(), component_type.to_string()));
    }

    by_label
        .into_iter()
        .filter(|(_, members)| members.len() >= 2)
        .filter(|(_, members)| {
            requirement.applicability.len() < 2
                || requirement.applicability.iter().all(|wanted| {
                    members
                        .iter()
                        .any(|(_, t)| t.eq_ignore_ascii_case(wanted))
                })
        })
        .map(|(label, members)| Group {
            requirement: requirement_index,
            label,
            participants: members.into_iter().map(|(id, _)| id).collect(),
        })
        .collect()
}

/// Where a relational measure was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    JointObservation,
    GeneralEvidence,
}

impl Source {
    fn as_str(self) -> &'static str {
        match self {
            Self::JointObservation => "joint_observation",
            Self::GeneralEvidence => "general_evidence",
        }
    }
}

struct Measure {
    key: String,
    value: Value,
    source: Source,
    involved: Vec<String>,
}

/// Most recent joint observation over participants of this group that
/// carries the attribute, else the general bucket.
fn find_measure(condition: &Condition, group: &Group, evidence: &EvidenceMap) -> Option<Measure> {
    let members: BTreeSet<&str> = group.participants.iter().map(String::as_str).collect();
    let joint = evidence
        .joint_observations()
        .iter()
        .rev()
        .filter(|j| j.component_ids.len() >= 2)
        .filter(|j| j.component_ids.iter().all(|id| members.contains(id.as_str())))
        .find_map(|j| lookup_in(&j.attributes, &condition.attribute).map(|(k, v)| (j, k, v)));
    if let Some((observation, key, value)) = joint {
        return Some(Measure {
            key: key.to_string(),
            value: value.clone(),
            source: Source::JointObservation,
            involved: group
                .participants
                .iter()
                .filter(|id| observation.component_ids.contains(*id))
                .cloned()
                .collect(),
        });
    }
    lookup_in(evidence.general(), &condition.attribute).map(|(key, value)| Measure {
        key: key.to_string(),
        value: value.clone(),
        source: Source::GeneralEvidence,
        involved: group.participants.clone(),
    })
}

pub(crate) async fn judge_group(ctx: &JudgmentContext, group: &Group) -> Result<RelationshipCheck, GenerationError> {
    let requirement = &ctx.requirements[group.requirement];
    let rule = requirement.rule_label();
    let relation_type = requirement.effective_relation_type();

    if let Some(condition) = &requirement.condition {
        if let Some(measure) = find_measure(condition, group, &ctx.evidence) {
            let mut evidence = BTreeMap::new();
            evidence.insert(measure.key.clone(), measure.value.clone());
            evidence.insert(
                "required".to_string(),
                json!(format!(
                    "{} {}",
                    condition.comparator.symbol(),
                    literal(&condition.threshold)
                )),
            );
            evidence.insert("source".to_string(), json!(measure.source.as_str()));
            if let Some(label) = &group.label {
                evidence.insert("group".to_string(), json!(label));
            }
            let subject = format!("the elements {}", measure.involved.join(", "));
            let base = RelationshipCheck::new(relation_type, rule, measure.involved, ComplianceStatus::Uncertain)
                .with_evidence(evidence);
            let check = match compare::check(condition, &measure.value) {
                Verdict::Holds => RelationshipCheck {
                    compliance_status: ComplianceStatus::Compliant,
                    ..base
                },
                Verdict::Violated { reason } => RelationshipCheck {
                    compliance_status: ComplianceStatus::NonCompliant,
                    ..base
                }
                .with_violation(reason, compare::suggested_fix(condition, &subject)),
                Verdict::Indeterminate(note) => base.with_note(note),
            };
            return Ok(check);
        }
    }

    let base = RelationshipCheck::new(
        relation_type,
        rule.clone(),
        group.participants.clone(),
        ComplianceStatus::Uncertain,
    );
    let request = prompts::judge_relationship(requirement, &group.participants, &group_evidence(group, &ctx.evidence));
    let answer = match ctx.reasoner.generate(request).await {
        Ok(answer) => answer,
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => return Ok(failed(base, group, &rule, &e)),
    };
    match parse_answer(&answer) {
        Ok(parsed) => Ok(RelationshipCheck {
            analysis_evidence: parsed.analysis_evidence,
            compliance_status: parsed.compliance_status,
            violation_reason: parsed.violation_reason,
            suggested_fix: parsed.suggested_fix,
            note: parsed.note,
            ..base
        }),
        Err(reason) => Ok(failed(base, group, &rule, &reason)),
    }
}

/// Everything known about a group, for the backend.
fn group_evidence(group: &Group, evidence: &EvidenceMap) -> Value {
    let members: BTreeSet<&str> = group.participants.iter().map(String::as_str).collect();
    let components: BTreeMap<&str, Value> = group
        .participants
        .iter()
        .filter_map(|id| {
            evidence.component(id).map(|bag| {
                (
                    id.as_str(),
                    json!({"component_type": bag.component_type, "attributes": bag.attributes}),
                )
            })
        })
        .collect();
    let joint: Vec<&crate::evidence::JointObservation> = evidence
        .joint_observations()
        .iter()
        .filter(|j| j.component_ids.iter().all(|id| members.contains(id.as_str())))
        .collect();
    json!({
        "group": group.label,
        "components": components,
        "joint_observations": joint,
        "general": evidence.general(),
    })
}

fn failed(
    base: RelationshipCheck,
    group: &Group,
    rule: &str,
    reason: &dyn std::fmt::Display,
) -> RelationshipCheck {
    obs::emit_judgment_failed(&group.participants.join("+"), rule, reason);
    METRICS.inc_judgment_failures();
    base.with_note(format!("judgment failed: {reason}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Comparator, RelationType};
    use crate::evidence::normalize::normalize_trace;
    use crate::fakes::ScriptedReasoner;
    use std::sync::Arc;

    fn clearance_rule() -> Requirement {
        Requirement::new("R1", "Clearance between stair and wall at least 800mm")
            .with_type("IfcStair")
            .with_type("IfcWall")
            .with_condition(Condition {
                attribute: "clearance".to_string(),
                comparator: Comparator::AtLeast,
                threshold: json!("800mm"),
            })
            .relational(RelationType::Geometry)
    }

    #[test]
    fn test_single_participant_yields_no_group() {
        let evidence = normalize_trace(&[json!({"element_id": "S1", "type": "IfcStair"})]);
        assert!(groups(0, &clearance_rule(), &evidence).is_empty());
    }

    #[test]
    fn test_groups_split_by_storey_and_require_every_type() {
        let evidence = normalize_trace(&[
            json!({"element_id": "S1", "type": "IfcStair", "storey": "L1"}),
            json!({"element_id": "W1", "type": "IfcWall", "storey": "L1"}),
            json!({"element_id": "S2", "type": "IfcStair", "storey": "L2"}),
            json!({"element_id": "S3", "type": "IfcStair", "storey": "L2"}),
            json!({"element_id": "D1", "type": "IfcDoor", "storey": "L1"}),
        ]);
        let found = groups(0, &clearance_rule(), &evidence);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].label.as_deref(), Some("L1"));
        assert_eq!(found[0].participants, vec!["S1".to_string(), "W1".to_string()]);
    }

    #[tokio::test]
    async fn test_joint_observation_supplies_measure() {
        let evidence = normalize_trace(&[
            json!({"element_id": "S1", "type": "IfcStair"}),
            json!({"element_id": "W1", "type": "IfcWall"}),
            json!({"elements_checked": ["S1", "W1"], "clearance": "760mm"}),
        ]);
        let ctx = JudgmentContext {
            evidence: Arc::new(evidence),
            requirements: Arc::new(vec![clearance_rule()]),
            reasoner: Arc::new(ScriptedReasoner::new()),
        };
        let group = groups(0, &ctx.requirements[0], &ctx.evidence).remove(0);
        let check = judge_group(&ctx, &group).await.unwrap();
        assert_eq!(check.compliance_status, ComplianceStatus::NonCompliant);
        assert_eq!(check.involved_components, vec!["S1".to_string(), "W1".to_string()]);
        assert_eq!(check.analysis_evidence["clearance"], json!("760mm"));
        assert_eq!(check.analysis_evidence["source"], json!("joint_observation"));
        assert!(check.suggested_fix.is_some());
    }

    #[tokio::test]
    async fn test_general_bucket_is_second_source() {
        let evidence = normalize_trace(&[
            json!({"element_id": "S1", "type": "IfcStair"}),
            json!({"element_id": "W1", "type": "IfcWall"}),
            json!({"tool_name": "stair_wall_clearance", "min_clearance": "820mm"}),
        ]);
        let ctx = JudgmentContext {
            evidence: Arc::new(evidence),
            requirements: Arc::new(vec![clearance_rule()]),
            reasoner: Arc::new(ScriptedReasoner::new()),
        };
        let group = groups(0, &ctx.requirements[0], &ctx.evidence).remove(0);
        let check = judge_group(&ctx, &group).await.unwrap();
        assert_eq!(check.compliance_status, ComplianceStatus::Compliant);
        assert_eq!(check.analysis_evidence["source"], json!("general_evidence"));
    }

    #[tokio::test]
    async fn test_no_measure_and_declining_backend_is_uncertain() {
        let evidence = normalize_trace(&[
            json!({"element_id": "S1", "type": "IfcStair"}),
            json!({"element_id": "W1", "type": "IfcWall"}),
        ]);
        let ctx = JudgmentContext {
            evidence: Arc::new(evidence),
            requirements: Arc::new(vec![clearance_rule()]),
            reasoner: Arc::new(ScriptedReasoner::new()),
        };
        let group = groups(0, &ctx.requirements[0], &ctx.evidence).remove(0);
        let check = judge_group(&ctx, &group).await.unwrap();
        assert_eq!(check.compliance_status, ComplianceStatus::Uncertain);
        assert!(check.note.unwrap().contains("not supported"));
        assert_eq!(check.involved_components.len(), 2);
    }
}
