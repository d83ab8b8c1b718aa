//! Result schema validation.
//!
//! The last gate before a result leaves the engine. Any violation fails
//! the call; nothing is patched up here.

use std::collections::HashSet;
use std::ops::Deref;

use serde::Serialize;

use crate::aggregate::overall_status;
use crate::domain::{
    ComplianceEvaluationResult, ComplianceStatus, EngineError, Result, SchemaIssue,
};
use crate::evidence::EvidenceMap;

/// A result that passed [`validate`]. Read-only.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ValidatedResult(ComplianceEvaluationResult);

impl ValidatedResult {
    pub fn into_inner(self) -> ComplianceEvaluationResult {
        self.0
    }
}

impl Deref for ValidatedResult {
    type Target = ComplianceEvaluationResult;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<ComplianceEvaluationResult> for ValidatedResult {
    fn as_ref(&self) -> &ComplianceEvaluationResult {
        &self.0
    }
}

/// Every structural problem in `result`, in document order.
pub fn schema_issues(result: &ComplianceEvaluationResult, evidence: &EvidenceMap) -> Vec<SchemaIssue> {
    let mut issues = Vec::new();
    let mut pairs: HashSet<(&str, &str)> = HashSet::new();

    for (i, c) in result.checked_components.iter().enumerate() {
        let path = format!("checked_components[{i}]");
        if c.compliance_status == ComplianceStatus::NonCompliant {
            if blank(&c.violation_reason) {
                issues.push(SchemaIssue::new(
                    format!("{path}.violation_reason"),
                    "non_compliant finding has no violation reason",
                ));
            }
            if blank(&c.suggested_fix) {
                issues.push(SchemaIssue::new(
                    format!("{path}.suggested_fix"),
                    "non_compliant finding has no suggested fix",
                ));
            }
        } else if c.violation_reason.is_some() {
            issues.push(SchemaIssue::new(
                format!("{path}.violation_reason"),
                format!("violation reason present on a {} finding", c.compliance_status),
            ));
        }
        if !pairs.insert((c.component_id.as_str(), c.checked_rule.as_str())) {
            issues.push(SchemaIssue::new(
                path,
                format!("duplicate finding for {} under {}", c.component_id, c.checked_rule),
            ));
        }
    }

    let checked: HashSet<&str> = result
        .checked_components
        .iter()
        .map(|c| c.component_id.as_str())
        .collect();
    for (i, r) in result.relationship_checks.iter().enumerate() {
        let path = format!("relationship_checks[{i}]");
        if r.involved_components.len() < 2 {
            issues.push(SchemaIssue::new(
                format!("{path}.involved_components"),
                format!("{} component(s) involved, at least 2 required", r.involved_components.len()),
            ));
        }
        for id in &r.involved_components {
            if !evidence.contains(id) && !checked.contains(id.as_str()) {
                issues.push(SchemaIssue::new(
                    format!("{path}.involved_components"),
                    format!("unknown component {id}"),
                ));
            }
        }
        if r.compliance_status == ComplianceStatus::NonCompliant && blank(&r.violation_reason) {
            issues.push(SchemaIssue::new(
                format!("{path}.violation_reason"),
                "non_compliant relationship has no violation reason",
            ));
        }
    }

    let expected = overall_status(result.judgment_set());
    if result.overall_status != expected {
        issues.push(SchemaIssue::new(
            "overall_status",
            format!("is {} but findings aggregate to {}", result.overall_status, expected),
        ));
    }
    issues
}

/// Check `result` against `evidence`; fail with every issue found.
pub fn validate(result: ComplianceEvaluationResult, evidence: &EvidenceMap) -> Result<ValidatedResult> {
    let issues = schema_issues(&result, evidence);
    if issues.is_empty() {
        Ok(ValidatedResult(result))
    } else {
        Err(EngineError::SchemaViolation(issues))
    }
}

fn blank(text: &Option<String>) -> bool {
    text.as_deref().map_or(true, |t| t.trim().is_empty())
}
