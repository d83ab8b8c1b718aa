//! Human-facing compliance reports built from a validated result.
//!
//! A report adds presentation on top of the result (executive summary,
//! violations with severity, recommendations split by urgency and a
//! per-step view of the trace) and never changes any finding.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::aggregate::StatusTally;
use crate::domain::{literal, ComplianceEvaluationResult, ComplianceStatus, EngineError, OverallStatus, Result};
use crate::obs;
use crate::validate::ValidatedResult;

pub const REPORT_SCHEMA_VERSION: &str = "1.0";

/// Characters of regulation text quoted in the report.
const REGULATION_EXCERPT_CHARS: usize = 200;

const IMMEDIATE_KEYWORDS: &[&str] = &["immediate", "urgent", "critical", "must", "required", "safety"];

/// Words marking a violation as life-safety critical.
const CRITICAL_KEYWORDS: &[&str] = &[
    "fire",
    "exit",
    "egress",
    "escape",
    "evacuation",
    "safety",
    "structural",
    "guard",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    Major,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutiveSummary {
    pub status: OverallStatus,
    pub summary: String,
    pub counts: StatusTally,
    pub critical_issues: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    /// Component id, or involved components joined with `+`.
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_type: Option<String>,
    pub rule: String,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_fix: Option<String>,
    pub severity: Severity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceDetails {
    pub regulation_reference: String,
    pub total_checks: usize,
    pub passed_checks: Vec<String>,
    pub violations: Vec<Violation>,
    /// Checks that could not be decided, with the reason when known.
    pub needs_review: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recommendations {
    pub immediate_actions: Vec<String>,
    pub long_term_improvements: Vec<String>,
}

/// One trace record as shown in the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub step_number: usize,
    pub description: String,
    pub status: String,
    pub technical_details: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub schema_version: String,
    pub report_id: String,
    pub generated_at: DateTime<Utc>,
    pub executive_summary: ExecutiveSummary,
    pub compliance_details: ComplianceDetails,
    pub recommendations: Recommendations,
    pub detailed_results: Vec<StepResult>,
    pub result: ComplianceEvaluationResult,
}

impl ComplianceReport {
    pub fn build(result: &ValidatedResult, execution_trace: &[Value], regulation_text: &str) -> Self {
        Self::build_at(result, execution_trace, regulation_text, Utc::now())
    }

    /// Build with an explicit timestamp; the report id derives from it.
    pub fn build_at(
        result: &ValidatedResult,
        execution_trace: &[Value],
        regulation_text: &str,
        generated_at: DateTime<Utc>,
    ) -> Self {
        let counts = StatusTally::from_statuses(result.judgment_set());
        let violations = violations(result);
        let critical_issues = violations
            .iter()
            .filter(|v| v.severity == Severity::Critical)
            .count();

        let mut recommendations = Recommendations::default();
        for v in &violations {
            let Some(fix) = &v.suggested_fix else {
                continue;
            };
            let bucket = if v.severity == Severity::Critical || is_immediate(fix) {
                &mut recommendations.immediate_actions
            } else {
                &mut recommendations.long_term_improvements
            };
            if !bucket.contains(fix) {
                bucket.push(fix.clone());
            }
        }

        Self {
            schema_version: REPORT_SCHEMA_VERSION.to_string(),
            report_id: format!("RPT-{}", generated_at.format("%Y%m%d-%H%M%S")),
            generated_at,
            executive_summary: ExecutiveSummary {
                status: result.overall_status,
                summary: summary_line(result.overall_status, &counts),
                counts,
                critical_issues,
            },
            compliance_details: ComplianceDetails {
                regulation_reference: excerpt(regulation_text),
                total_checks: counts.total(),
                passed_checks: passed_checks(result),
                violations,
                needs_review: needs_review(result),
            },
            recommendations,
            detailed_results: detailed_results(execution_trace),
            result: result.as_ref().clone(),
        }
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn summary_line(status: OverallStatus, counts: &StatusTally) -> String {
    match status {
        OverallStatus::NotApplicable => "The regulation yields no checks for this model.".to_string(),
        _ => format!(
            "{} checks: {} compliant, {} non-compliant, {} uncertain.",
            counts.total(),
            counts.compliant,
            counts.non_compliant,
            counts.uncertain
        ),
    }
}

fn excerpt(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= REGULATION_EXCERPT_CHARS {
        return trimmed.to_string();
    }
    let head: String = trimmed.chars().take(REGULATION_EXCERPT_CHARS).collect();
    format!("{head}...")
}

fn is_immediate(recommendation: &str) -> bool {
    let lowered = recommendation.to_lowercase();
    IMMEDIATE_KEYWORDS.iter().any(|k| lowered.contains(k))
}

fn severity(rule: &str, reason: &str) -> Severity {
    let text = format!("{rule} {reason}").to_lowercase();
    if CRITICAL_KEYWORDS.iter().any(|k| text.contains(k)) {
        Severity::Critical
    } else {
        Severity::Major
    }
}

fn violations(result: &ComplianceEvaluationResult) -> Vec<Violation> {
    let components = result
        .checked_components
        .iter()
        .filter(|c| c.compliance_status == ComplianceStatus::NonCompliant)
        .map(|c| {
            let reason = c.violation_reason.clone().unwrap_or_default();
            Violation {
                subject: c.component_id.clone(),
                component_type: Some(c.component_type.clone()),
                rule: c.checked_rule.clone(),
                severity: severity(&c.checked_rule, &reason),
                reason,
                suggested_fix: c.suggested_fix.clone(),
            }
        });
    let relationships = result
        .relationship_checks
        .iter()
        .filter(|r| r.compliance_status == ComplianceStatus::NonCompliant)
        .map(|r| {
            let reason = r.violation_reason.clone().unwrap_or_default();
            Violation {
                subject: r.involved_components.join("+"),
                component_type: None,
                rule: r.relation_name.clone(),
                severity: severity(&r.relation_name, &reason),
                reason,
                suggested_fix: r.suggested_fix.clone(),
            }
        });
    components.chain(relationships).collect()
}

fn passed_checks(result: &ComplianceEvaluationResult) -> Vec<String> {
    let components = result
        .checked_components
        .iter()
        .filter(|c| c.compliance_status == ComplianceStatus::Compliant)
        .map(|c| format!("{}: {}", c.component_id, c.checked_rule));
    let relationships = result
        .relationship_checks
        .iter()
        .filter(|r| r.compliance_status == ComplianceStatus::Compliant)
        .map(|r| format!("{}: {}", r.involved_components.join("+"), r.relation_name));
    components.chain(relationships).collect()
}

fn needs_review(result: &ComplianceEvaluationResult) -> Vec<String> {
    let line = |subject: String, rule: &str, note: &Option<String>| match note {
        Some(note) => format!("{subject}: {rule} ({note})"),
        None => format!("{subject}: {rule}"),
    };
    let components = result
        .checked_components
        .iter()
        .filter(|c| c.compliance_status == ComplianceStatus::Uncertain)
        .map(|c| line(c.component_id.clone(), &c.checked_rule, &c.note));
    let relationships = result
        .relationship_checks
        .iter()
        .filter(|r| r.compliance_status == ComplianceStatus::Uncertain)
        .map(|r| line(r.involved_components.join("+"), &r.relation_name, &r.note));
    components.chain(relationships).collect()
}

fn detailed_results(trace: &[Value]) -> Vec<StepResult> {
    trace
        .iter()
        .enumerate()
        .map(|(i, record)| match record {
            Value::Object(obj) => {
                let description = ["detail", "description"]
                    .iter()
                    .find_map(|k| obj.get(*k).and_then(Value::as_str))
                    .unwrap_or("No description")
                    .to_string();
                let status = obj
                    .get("result")
                    .filter(|v| !v.is_object() && !v.is_array())
                    .map(literal)
                    .unwrap_or_else(|| "unknown".to_string());
                let technical_details = obj
                    .iter()
                    .filter(|(k, v)| {
                        !matches!(k.as_str(), "detail" | "description")
                            && !(k.as_str() == "result" && !v.is_object() && !v.is_array())
                    })
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                StepResult {
                    step_number: i + 1,
                    description,
                    status,
                    technical_details,
                }
            }
            other => StepResult {
                step_number: i + 1,
                description: "Unrecognized record".to_string(),
                status: "unknown".to_string(),
                technical_details: BTreeMap::from([("value".to_string(), other.clone())]),
            },
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Markdown summary for review comments and terminals.
pub fn render_markdown(report: &ComplianceReport) -> String {
    let summary = &report.executive_summary;
    let details = &report.compliance_details;
    let mut out = String::new();
    out.push_str(&format!("# Compliance Report {}\n\n", report.report_id));
    out.push_str(&format!(
        "- status: **{}**\n- generated: {}\n- critical issues: {}\n\n{}\n\n",
        summary.status,
        report.generated_at.to_rfc3339(),
        summary.critical_issues,
        summary.summary
    ));
    out.push_str(&format!("> {}\n\n", details.regulation_reference));

    if !details.violations.is_empty() {
        out.push_str("## Violations\n");
        for v in &details.violations {
            out.push_str(&format!("- `{}` {}: {}", v.subject, v.rule, v.reason));
            if v.severity == Severity::Critical {
                out.push_str(" **(critical)**");
            }
            out.push('\n');
            if let Some(fix) = &v.suggested_fix {
                out.push_str(&format!("  - fix: {fix}\n"));
            }
        }
        out.push('\n');
    }

    if !details.needs_review.is_empty() {
        out.push_str("## Needs Review\n");
        for line in &details.needs_review {
            out.push_str(&format!("- {line}\n"));
        }
        out.push('\n');
    }

    if !details.passed_checks.is_empty() {
        out.push_str("## Passed\n");
        for line in &details.passed_checks {
            out.push_str(&format!("- {line}\n"));
        }
        out.push('\n');
    }

    let recs = &report.recommendations;
    if !recs.immediate_actions.is_empty() || !recs.long_term_improvements.is_empty() {
        out.push_str("## Recommendations\n");
        for r in &recs.immediate_actions {
            out.push_str(&format!("- [immediate] {r}\n"));
        }
        for r in &recs.long_term_improvements {
            out.push_str(&format!("- {r}\n"));
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Artifacts
// ---------------------------------------------------------------------------

fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Persist `<dir>/<report_id>/report.json` with a SHA-256 sidecar.
///
/// Fails with [`EngineError::ReportExists`] if a report with the same id
/// was already written under `dir`; artifacts are never overwritten.
pub fn write_report_artifact(report: &ComplianceReport, dir: &Path) -> Result<PathBuf> {
    let _guard = obs::SpanGuard::enter(tracing::info_span!("codecheck.report", report_id = %report.report_id));
    let report_dir = dir.join(&report.report_id);
    std::fs::create_dir_all(dir)?;
    match std::fs::create_dir(&report_dir) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            return Err(EngineError::ReportExists(report.report_id.clone()));
        }
        Err(e) => return Err(e.into()),
    }

    let path = report_dir.join("report.json");
    let digest_path = report_dir.join("report.digest");
    let json = serde_json::to_vec_pretty(report)?;
    let digest = sha256_hex(&json);

    std::fs::write(&path, &json)?;
    std::fs::write(&digest_path, digest.as_bytes())?;
    obs::emit_report_written(&report.report_id, &path.display().to_string());

    Ok(path)
}

/// Read `<dir>/<report_id>/report.json` and verify its digest.
pub fn read_report_artifact(report_id: &str, dir: &Path) -> Result<ComplianceReport> {
    let report_dir = dir.join(report_id);
    let json = std::fs::read(report_dir.join("report.json"))?;
    let expected = std::fs::read_to_string(report_dir.join("report.digest"))?;
    let actual = sha256_hex(&json);
    if expected.trim() != actual {
        return Err(EngineError::DigestMismatch {
            expected: expected.trim().to_string(),
            actual,
        });
    }
    Ok(serde_json::from_slice(&json)?)
}
