//! Findings produced by the judgment step and the top-level result.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Classification of a single (component, rule) or relationship finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceStatus {
    Compliant,
    NonCompliant,
    Uncertain,
}

impl ComplianceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Compliant => "compliant",
            Self::NonCompliant => "non_compliant",
            Self::Uncertain => "uncertain",
        }
    }
}

impl std::fmt::Display for ComplianceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary status of a whole evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    Compliant,
    NonCompliant,
    Partial,
    Uncertain,
    NotApplicable,
}

impl OverallStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Compliant => "compliant",
            Self::NonCompliant => "non_compliant",
            Self::Partial => "partial",
            Self::Uncertain => "uncertain",
            Self::NotApplicable => "not_applicable",
        }
    }
}

impl std::fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of inter-component relationship a relational rule inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    Geometry,
    Topology,
    Semantic,
}

/// The finding for exactly one (component, rule) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckedComponent {
    pub component_id: String,
    pub component_type: String,
    pub checked_rule: String,
    /// Observed attribute values the judgment was based on. Every entry is
    /// copied from the component's evidence bag.
    #[serde(default)]
    pub data_used: BTreeMap<String, Value>,
    pub compliance_status: ComplianceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub violation_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_fix: Option<String>,
    /// Explanation attached when a judgment could not be completed
    /// (backend failure, timeout, unit mismatch).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl CheckedComponent {
    pub fn new(
        component_id: impl Into<String>,
        component_type: impl Into<String>,
        checked_rule: impl Into<String>,
        compliance_status: ComplianceStatus,
    ) -> Self {
        Self {
            component_id: component_id.into(),
            component_type: component_type.into(),
            checked_rule: checked_rule.into(),
            data_used: BTreeMap::new(),
            compliance_status,
            violation_reason: None,
            suggested_fix: None,
            note: None,
        }
    }

    pub fn with_data_used(mut self, data_used: BTreeMap<String, Value>) -> Self {
        self.data_used = data_used;
        self
    }

    pub fn with_violation(mut self, reason: impl Into<String>, fix: impl Into<String>) -> Self {
        self.violation_reason = Some(reason.into());
        self.suggested_fix = Some(fix.into());
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// A finding spanning two or more components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipCheck {
    pub relation_type: RelationType,
    pub relation_name: String,
    pub involved_components: Vec<String>,
    #[serde(default)]
    pub analysis_evidence: BTreeMap<String, Value>,
    pub compliance_status: ComplianceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub violation_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_fix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl RelationshipCheck {
    pub fn new(
        relation_type: RelationType,
        relation_name: impl Into<String>,
        involved_components: Vec<String>,
        compliance_status: ComplianceStatus,
    ) -> Self {
        Self {
            relation_type,
            relation_name: relation_name.into(),
            involved_components,
            analysis_evidence: BTreeMap::new(),
            compliance_status,
            violation_reason: None,
            suggested_fix: None,
            note: None,
        }
    }

    pub fn with_evidence(mut self, evidence: BTreeMap<String, Value>) -> Self {
        self.analysis_evidence = evidence;
        self
    }

    pub fn with_violation(mut self, reason: impl Into<String>, fix: impl Into<String>) -> Self {
        self.violation_reason = Some(reason.into());
        self.suggested_fix = Some(fix.into());
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// The top-level compliance report.
///
/// # Invariants
///
/// `overall_status` must equal [`crate::aggregate::overall_status`] applied to
/// the statuses of `checked_components` and `relationship_checks`. Build it
/// with [`ComplianceEvaluationResult::from_findings`]; the validator rejects
/// anything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceEvaluationResult {
    pub checked_components: Vec<CheckedComponent>,
    pub relationship_checks: Vec<RelationshipCheck>,
    pub overall_status: OverallStatus,
}

impl ComplianceEvaluationResult {
    /// Assemble a result, deriving `overall_status` from the findings.
    pub fn from_findings(
        checked_components: Vec<CheckedComponent>,
        relationship_checks: Vec<RelationshipCheck>,
    ) -> Self {
        let overall_status = crate::aggregate::overall_status(
            checked_components
                .iter()
                .map(|c| c.compliance_status)
                .chain(relationship_checks.iter().map(|r| r.compliance_status)),
        );
        Self {
            checked_components,
            relationship_checks,
            overall_status,
        }
    }

    /// Every status in the judgment set, components first.
    pub fn judgment_set(&self) -> Vec<ComplianceStatus> {
        self.checked_components
            .iter()
            .map(|c| c.compliance_status)
            .chain(self.relationship_checks.iter().map(|r| r.compliance_status))
            .collect()
    }
}
