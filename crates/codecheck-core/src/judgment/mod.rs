//! Compliance judgment: one finding per (component, requirement) pair and
//! one per relational grouping.
//!
//! [`plan`] lays out the work as independent [`Job`]s; [`judge`] runs one.
//! Jobs share nothing mutable, so the executor may run them in any order.

pub mod compare;
pub mod relational;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::domain::{CheckedComponent, ComplianceStatus, RelationshipCheck, Requirement};
use crate::evidence::{EvidenceBag, EvidenceMap};
use crate::metrics::METRICS;
use crate::obs;
use crate::prompts;
use crate::reasoner::{GenerationError, Reasoner};
use crate::vocabulary::attribute_match;

use compare::Verdict;
pub use relational::Group;

/// `component_type` reported for components whose class never appeared in
/// the trace.
pub const UNKNOWN_TYPE: &str = "unknown";

/// Read-only inputs shared by every job of one evaluation.
pub struct JudgmentContext {
    pub evidence: Arc<EvidenceMap>,
    pub requirements: Arc<Vec<Requirement>>,
    pub reasoner: Arc<dyn Reasoner>,
}

/// One unit of judgment work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    Component {
        requirement: usize,
        component_id: String,
        component_type: String,
    },
    Relationship(Group),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Finding {
    Component(CheckedComponent),
    Relationship(RelationshipCheck),
}

impl Finding {
    pub fn status(&self) -> ComplianceStatus {
        match self {
            Self::Component(c) => c.compliance_status,
            Self::Relationship(r) => r.compliance_status,
        }
    }
}

impl Job {
    /// Short label for logs.
    pub fn subject(&self) -> String {
        match self {
            Self::Component { component_id, .. } => component_id.clone(),
            Self::Relationship(group) => group.participants.join("+"),
        }
    }

    pub fn requirement_index(&self) -> usize {
        match self {
            Self::Component { requirement, .. } => *requirement,
            Self::Relationship(group) => group.requirement,
        }
    }

    /// An `uncertain` finding for this job carrying `note`.
    pub fn uncertain(&self, requirements: &[Requirement], note: impl Into<String>) -> Finding {
        let requirement = &requirements[self.requirement_index()];
        match self {
            Self::Component {
                component_id,
                component_type,
                ..
            } => Finding::Component(
                CheckedComponent::new(
                    component_id.clone(),
                    component_type.clone(),
                    requirement.rule_label(),
                    ComplianceStatus::Uncertain,
                )
                .with_note(note),
            ),
            Self::Relationship(group) => Finding::Relationship(
                RelationshipCheck::new(
                    requirement.effective_relation_type(),
                    requirement.rule_label(),
                    group.participants.clone(),
                    ComplianceStatus::Uncertain,
                )
                .with_note(note),
            ),
        }
    }
}

/// Whether a component falls under a non-relational requirement.
///
/// Typed components match on applicability. A component whose type is
/// unknown is admitted by a type-restricted rule only when its evidence
/// carries one of the rule's attributes.
pub fn is_applicable(requirement: &Requirement, bag: &EvidenceBag) -> bool {
    match bag.component_type.as_deref() {
        Some(t) => requirement.applies_to(Some(t)),
        None if requirement.applicability.is_empty() => true,
        None => requirement
            .relevant_attributes()
            .iter()
            .any(|a| bag.lookup(a).is_some()),
    }
}

/// Every job for an evaluation, in deterministic order: requirements in
/// mapper order, components by id, groupings by label.
pub fn plan(evidence: &EvidenceMap, requirements: &[Requirement]) -> Vec<Job> {
    let mut jobs = Vec::new();
    for (index, requirement) in requirements.iter().enumerate() {
        if requirement.is_relational {
            jobs.extend(
                relational::groups(index, requirement, evidence)
                    .into_iter()
                    .map(Job::Relationship),
            );
            continue;
        }
        for (component_id, bag) in evidence.components() {
            if is_applicable(requirement, bag) {
                jobs.push(Job::Component {
                    requirement: index,
                    component_id: component_id.clone(),
                    component_type: bag
                        .component_type
                        .clone()
                        .unwrap_or_else(|| UNKNOWN_TYPE.to_string()),
                });
            }
        }
    }
    jobs
}

/// Run one job. Only a fatal backend error escapes; every other failure
/// becomes an `uncertain` finding with a note.
pub async fn judge(ctx: &JudgmentContext, job: &Job) -> Result<Finding, GenerationError> {
    let finding = match job {
        Job::Component {
            requirement,
            component_id,
            component_type,
        } => {
            let requirement = &ctx.requirements[*requirement];
            Finding::Component(judge_component(ctx, requirement, component_id, component_type).await?)
        }
        Job::Relationship(group) => Finding::Relationship(relational::judge_group(ctx, group).await?),
    };
    METRICS.inc_pairs_judged();
    Ok(finding)
}

async fn judge_component(
    ctx: &JudgmentContext,
    requirement: &Requirement,
    component_id: &str,
    component_type: &str,
) -> Result<CheckedComponent, GenerationError> {
    let rule = requirement.rule_label();
    let base = CheckedComponent::new(component_id, component_type, rule.clone(), ComplianceStatus::Uncertain);
    let Some(bag) = ctx.evidence.component(component_id) else {
        return Ok(base.with_note("no evidence for this component"));
    };
    let relevant = requirement.relevant_attributes();

    if let Some(condition) = &requirement.condition {
        let data_used = bag.select(&relevant);
        let Some((_, observed)) = bag.lookup(&condition.attribute) else {
            return Ok(base
                .with_data_used(data_used)
                .with_note(format!("no {} observation", condition.attribute)));
        };
        let finding = match compare::check(condition, observed) {
            Verdict::Holds => CheckedComponent {
                compliance_status: ComplianceStatus::Compliant,
                ..base
            }
            .with_data_used(data_used),
            Verdict::Violated { reason } => CheckedComponent {
                compliance_status: ComplianceStatus::NonCompliant,
                ..base
            }
            .with_data_used(data_used)
            .with_violation(reason, compare::suggested_fix(condition, component_id)),
            Verdict::Indeterminate(note) => base.with_data_used(data_used).with_note(note),
        };
        return Ok(finding);
    }

    let evidence = if relevant.is_empty() {
        bag.attributes.clone()
    } else {
        bag.select(&relevant)
    };
    if evidence.is_empty() {
        return Ok(base.with_note("no relevant evidence"));
    }

    let request = prompts::judge_component(requirement, component_id, component_type, &evidence);
    let answer = match ctx.reasoner.generate(request).await {
        Ok(answer) => answer,
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => return Ok(failed(base, component_id, &rule, &e)),
    };
    match parse_answer(&answer) {
        Ok(parsed) => {
            let data_used = traced_data(&parsed.data_used, bag);
            Ok(CheckedComponent {
                data_used,
                compliance_status: parsed.compliance_status,
                violation_reason: parsed.violation_reason,
                suggested_fix: parsed.suggested_fix,
                note: parsed.note,
                ..base
            })
        }
        Err(reason) => Ok(failed(base, component_id, &rule, &reason)),
    }
}

fn failed(
    base: CheckedComponent,
    subject: &str,
    rule: &str,
    reason: &dyn std::fmt::Display,
) -> CheckedComponent {
    obs::emit_judgment_failed(subject, rule, reason);
    METRICS.inc_judgment_failures();
    CheckedComponent {
        compliance_status: ComplianceStatus::Uncertain,
        violation_reason: None,
        suggested_fix: None,
        ..base
    }
    .with_note(format!("judgment failed: {reason}"))
}

/// Keep only `data_used` entries that exist in the evidence, with the
/// evidence's own values.
fn traced_data(claimed: &BTreeMap<String, Value>, bag: &EvidenceBag) -> BTreeMap<String, Value> {
    let mut out = BTreeMap::new();
    for key in claimed.keys() {
        let found = bag.attributes.get_key_value(key.as_str()).or_else(|| {
            bag.attributes
                .iter()
                .find(|(k, _)| attribute_match(k, key) == Some(0))
        });
        match found {
            Some((k, v)) => {
                out.insert(k.clone(), v.clone());
            }
            None => debug!(attribute = %key, "dropping data_used entry absent from evidence"),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Backend answers
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawAnswer {
    compliance_status: ComplianceStatus,
    #[serde(default)]
    data_used: BTreeMap<String, Value>,
    #[serde(default)]
    analysis_evidence: BTreeMap<String, Value>,
    #[serde(default)]
    violation_reason: Option<String>,
    #[serde(default)]
    suggested_fix: Option<String>,
}

/// A backend answer that passed the structural checks.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Answer {
    pub compliance_status: ComplianceStatus,
    pub data_used: BTreeMap<String, Value>,
    pub analysis_evidence: BTreeMap<String, Value>,
    pub violation_reason: Option<String>,
    pub suggested_fix: Option<String>,
    pub note: Option<String>,
}

/// Structural checks on a judgment answer. A non_compliant answer must
/// carry both a reason and a fix; a reason given with any other status is
/// kept as a note.
pub(crate) fn parse_answer(answer: &Value) -> Result<Answer, String> {
    let raw: RawAnswer =
        serde_json::from_value(answer.clone()).map_err(|e| format!("malformed answer: {e}"))?;
    let reason = non_blank(raw.violation_reason);
    let fix = non_blank(raw.suggested_fix);
    match raw.compliance_status {
        ComplianceStatus::NonCompliant => match (reason, fix) {
            (Some(reason), Some(fix)) => Ok(Answer {
                compliance_status: ComplianceStatus::NonCompliant,
                data_used: raw.data_used,
                analysis_evidence: raw.analysis_evidence,
                violation_reason: Some(reason),
                suggested_fix: Some(fix),
                note: None,
            }),
            _ => Err("non_compliant answer without violation reason and suggested fix".to_string()),
        },
        status => Ok(Answer {
            compliance_status: status,
            data_used: raw.data_used,
            analysis_evidence: raw.analysis_evidence,
            violation_reason: None,
            suggested_fix: if status == ComplianceStatus::Uncertain { fix } else { None },
            note: reason,
        }),
    }
}

fn non_blank(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Comparator, Condition};
    use crate::evidence::normalize::normalize_trace;
    use crate::fakes::ScriptedReasoner;
    use crate::reasoner::Task;
    use serde_json::json;

    fn width_rule() -> Requirement {
        Requirement::new("R1", "Minimum door width 800mm")
            .with_type("IfcDoor")
            .with_condition(Condition {
                attribute: "width".to_string(),
                comparator: Comparator::AtLeast,
                threshold: json!("800mm"),
            })
    }

    fn context(trace: Vec<Value>, requirements: Vec<Requirement>, reasoner: ScriptedReasoner) -> JudgmentContext {
        JudgmentContext {
            evidence: Arc::new(normalize_trace(&trace)),
            requirements: Arc::new(requirements),
            reasoner: Arc::new(reasoner),
        }
    }

    #[test]
    fn test_plan_one_job_per_applicable_pair() {
        let evidence = normalize_trace(&[
            json!({"element_id": "D1", "type": "IfcDoor", "width": "900mm"}),
            json!({"element_id": "D2", "type": "IfcDoor", "width": "700mm"}),
            json!({"element_id": "W1", "type": "IfcWall", "height": "3000mm"}),
        ]);
        let rules = vec![width_rule(), Requirement::new("R2", "Everything is labelled")];
        let jobs = plan(&evidence, &rules);
        let subjects: Vec<(usize, String)> = jobs
            .iter()
            .map(|j| (j.requirement_index(), j.subject()))
            .collect();
        assert_eq!(
            subjects,
            vec![
                (0, "D1".to_string()),
                (0, "D2".to_string()),
                (1, "D1".to_string()),
                (1, "D2".to_string()),
                (1, "W1".to_string()),
            ]
        );
    }

    #[test]
    fn test_untyped_component_needs_matching_attribute() {
        let rule = width_rule();
        let mut bag = EvidenceBag::default();
        assert!(!is_applicable(&rule, &bag));
        bag.insert("width", json!("900mm"));
        assert!(is_applicable(&rule, &bag));
    }

    #[tokio::test]
    async fn test_condition_judged_without_backend() {
        let ctx = context(
            vec![json!({"element_id": "D2", "type": "IfcDoor", "width": "750mm", "height": "2100mm"})],
            vec![width_rule()],
            ScriptedReasoner::new(),
        );
        let job = Job::Component {
            requirement: 0,
            component_id: "D2".into(),
            component_type: "IfcDoor".into(),
        };
        let Finding::Component(finding) = judge(&ctx, &job).await.unwrap() else {
            panic!("expected component finding");
        };
        assert_eq!(finding.compliance_status, ComplianceStatus::NonCompliant);
        assert_eq!(
            finding.violation_reason.as_deref(),
            Some("observed 750mm < required 800mm for width")
        );
        assert!(finding.suggested_fix.unwrap().contains("Widen D2"));
        assert_eq!(finding.data_used.len(), 1);
        assert_eq!(finding.checked_rule, "[R1] Minimum door width 800mm");
    }

    #[tokio::test]
    async fn test_missing_attribute_is_uncertain_with_empty_data() {
        let ctx = context(
            vec![json!({"element_id": "D1", "type": "IfcDoor", "FireRating": "EI30"})],
            vec![width_rule()],
            ScriptedReasoner::new(),
        );
        let job = Job::Component {
            requirement: 0,
            component_id: "D1".into(),
            component_type: "IfcDoor".into(),
        };
        let Finding::Component(finding) = judge(&ctx, &job).await.unwrap() else {
            panic!("expected component finding");
        };
        assert_eq!(finding.compliance_status, ComplianceStatus::Uncertain);
        assert!(finding.data_used.is_empty());
        assert!(finding.violation_reason.is_none());
    }

    #[tokio::test]
    async fn test_unorderable_value_is_uncertain_but_keeps_its_evidence() {
        let ctx = context(
            vec![json!({"element_id": "D1", "type": "IfcDoor", "width": "wide"})],
            vec![width_rule()],
            ScriptedReasoner::new(),
        );
        let job = Job::Component {
            requirement: 0,
            component_id: "D1".into(),
            component_type: "IfcDoor".into(),
        };
        let Finding::Component(finding) = judge(&ctx, &job).await.unwrap() else {
            panic!("expected component finding");
        };
        assert_eq!(finding.compliance_status, ComplianceStatus::Uncertain);
        assert_eq!(finding.data_used["width"], json!("wide"));
        assert!(finding.note.unwrap().contains("cannot order wide"));
        assert!(finding.violation_reason.is_none());
    }

    #[tokio::test]
    async fn test_backend_answer_is_traced_to_evidence() {
        let reasoner = ScriptedReasoner::new().respond(
            Task::JudgeComponent,
            json!({
                "compliance_status": "compliant",
                "data_used": {"FireRating": "EI60", "invented": 1},
                "violation_reason": null
            }),
        );
        let rule = Requirement::new("R1", "Doors must be fire rated")
            .with_type("IfcDoor")
            .with_attribute("FireRating");
        let ctx = context(
            vec![json!({"element_id": "D1", "type": "IfcDoor", "FireRating": "EI30"})],
            vec![rule],
            reasoner,
        );
        let job = Job::Component {
            requirement: 0,
            component_id: "D1".into(),
            component_type: "IfcDoor".into(),
        };
        let Finding::Component(finding) = judge(&ctx, &job).await.unwrap() else {
            panic!("expected component finding");
        };
        assert_eq!(finding.compliance_status, ComplianceStatus::Compliant);
        assert_eq!(finding.data_used.len(), 1);
        assert_eq!(finding.data_used["FireRating"], json!("EI30"));
    }

    #[tokio::test]
    async fn test_incomplete_violation_becomes_uncertain() {
        let reasoner = ScriptedReasoner::new().respond(
            Task::JudgeComponent,
            json!({"compliance_status": "non_compliant", "violation_reason": "not rated"}),
        );
        let rule = Requirement::new("R1", "Doors must be fire rated").with_attribute("FireRating");
        let ctx = context(
            vec![json!({"element_id": "D1", "type": "IfcDoor", "FireRating": "none"})],
            vec![rule],
            reasoner,
        );
        let job = Job::Component {
            requirement: 0,
            component_id: "D1".into(),
            component_type: "IfcDoor".into(),
        };
        let Finding::Component(finding) = judge(&ctx, &job).await.unwrap() else {
            panic!("expected component finding");
        };
        assert_eq!(finding.compliance_status, ComplianceStatus::Uncertain);
        assert!(finding.note.unwrap().starts_with("judgment failed"));
        assert!(finding.violation_reason.is_none());
    }

    #[tokio::test]
    async fn test_fatal_backend_error_escapes() {
        let reasoner = ScriptedReasoner::new().fail(
            Task::JudgeComponent,
            GenerationError::Unavailable("connection refused".into()),
        );
        let rule = Requirement::new("R1", "Doors must be fire rated").with_attribute("FireRating");
        let ctx = context(
            vec![json!({"element_id": "D1", "FireRating": "EI30"})],
            vec![rule],
            reasoner,
        );
        let job = Job::Component {
            requirement: 0,
            component_id: "D1".into(),
            component_type: UNKNOWN_TYPE.into(),
        };
        assert!(judge(&ctx, &job).await.unwrap_err().is_fatal());
    }

    #[test]
    fn test_parse_answer_keeps_uncertain_reason_as_note() {
        let parsed = parse_answer(&json!({
            "compliance_status": "uncertain",
            "violation_reason": "no rating recorded"
        }))
        .unwrap();
        assert_eq!(parsed.note.as_deref(), Some("no rating recorded"));
        assert!(parsed.violation_reason.is_none());
        assert!(parse_answer(&json!({"status": "ok"})).is_err());
    }
}
