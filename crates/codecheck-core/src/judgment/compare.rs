//! Deterministic evaluation of a [`Condition`] against one observed value.

use serde_json::Value;

use crate::domain::{literal, Comparator, Condition};
use crate::evidence::Observed;

/// Result of checking one observed value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Holds,
    Violated { reason: String },
    /// The value cannot be compared with the threshold.
    Indeterminate(String),
}

/// Check `observed` against `condition`.
///
/// Numbers compare in fixed point. Strings and flags only support equality
/// and compare exactly. Units are never converted.
pub fn check(condition: &Condition, observed: &Value) -> Verdict {
    let comparator = condition.comparator;
    let Some(seen) = Observed::from_value(observed) else {
        return Verdict::Indeterminate(format!(
            "{} has no single comparable value",
            condition.attribute
        ));
    };
    let Some(required) = Observed::from_value(&condition.threshold) else {
        return Verdict::Indeterminate(format!(
            "threshold {} is not a comparable value",
            literal(&condition.threshold)
        ));
    };

    let holds = match (&seen, &required) {
        (Observed::Quantity(a), Observed::Quantity(b)) => match a.compare(b) {
            Ok(ordering) => comparator.holds(ordering),
            Err(mismatch) => {
                return Verdict::Indeterminate(format!(
                    "unit mismatch: observed {} in {}, required {} in {}; values were not converted",
                    literal(observed),
                    mismatch.observed.symbol(),
                    literal(&condition.threshold),
                    mismatch.required.symbol()
                ))
            }
        },
        _ if comparator.is_ordering() => {
            return Verdict::Indeterminate(format!(
                "cannot order {} against {}",
                literal(observed),
                literal(&condition.threshold)
            ))
        }
        (Observed::Flag(a), Observed::Flag(b)) => equality(comparator, a == b),
        (Observed::Text(a), Observed::Text(b)) => equality(comparator, a == b),
        _ => equality(comparator, literal(observed).trim() == literal(&condition.threshold).trim()),
    };

    if holds {
        Verdict::Holds
    } else {
        Verdict::Violated {
            reason: format!(
                "observed {} {} required {} for {}",
                literal(observed),
                comparator.failed_symbol(),
                literal(&condition.threshold),
                condition.attribute
            ),
        }
    }
}

fn equality(comparator: Comparator, equal: bool) -> bool {
    match comparator {
        Comparator::NotEqual => !equal,
        _ => equal,
    }
}

/// Remediation naming the attribute, the target and the direction.
pub fn suggested_fix(condition: &Condition, subject: &str) -> String {
    let attr = condition.attribute.replace('_', " ");
    let lowered = attr.to_ascii_lowercase();
    let threshold = literal(&condition.threshold);
    let bound = match condition.comparator {
        Comparator::AtLeast => "at least",
        Comparator::GreaterThan => "more than",
        Comparator::AtMost => "at most",
        Comparator::LessThan => "less than",
        Comparator::Equal => "exactly",
        Comparator::NotEqual => "other than",
    };
    match condition.comparator {
        Comparator::AtLeast | Comparator::GreaterThan => {
            if lowered.contains("width") {
                format!("Widen {subject} so that its {attr} is {bound} {threshold}")
            } else if ["height", "headroom", "elevation"].iter().any(|w| lowered.contains(w)) {
                format!("Raise the {attr} of {subject} to {bound} {threshold}")
            } else if ["count", "number"].iter().any(|w| lowered.contains(w)) {
                format!("Add elements to {subject} until the {attr} is {bound} {threshold}")
            } else {
                format!("Increase the {attr} of {subject} to {bound} {threshold}")
            }
        }
        Comparator::AtMost | Comparator::LessThan => {
            if lowered.contains("width") {
                format!("Narrow {subject} so that its {attr} is {bound} {threshold}")
            } else if ["height", "rise"].iter().any(|w| lowered.contains(w)) {
                format!("Lower the {attr} of {subject} to {bound} {threshold}")
            } else {
                format!("Reduce the {attr} of {subject} to {bound} {threshold}")
            }
        }
        Comparator::Equal => {
            format!("Replace or reconfigure {subject} so that its {attr} is {bound} {threshold}")
        }
        Comparator::NotEqual => {
            format!("Change the {attr} of {subject} to a value {bound} {threshold}")
        }
    }
}
