//! Offline reasoner: rule-of-thumb regulation mapping, no network.
//!
//! Understands sentences of the form "<element> <attribute> <comparator
//! phrase> <number><unit>" in any order, e.g. "Minimum door width 800mm" or
//! "Clearance between stair and wall shall be at least 800 mm". Everything
//! else is either kept as an unconditioned requirement (when it reads as an
//! obligation about known elements) or ignored. Pair judgments are
//! declined, which the engine reports as `uncertain`.

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use tracing::debug;

use crate::domain::{Comparator, Condition, RelationType, Requirement};
use crate::reasoner::{GenerationError, GenerationRequest, Reasoner, Task};
use crate::vocabulary::{element_types_in, qualified_attribute, MEASURE_WORDS};

/// Comparator phrases, longest and negated forms first.
const COMPARATOR_PHRASES: &[(&str, Comparator)] = &[
    ("not less than", Comparator::AtLeast),
    ("no less than", Comparator::AtLeast),
    ("not more than", Comparator::AtMost),
    ("no more than", Comparator::AtMost),
    ("not exceed", Comparator::AtMost),
    ("not greater than", Comparator::AtMost),
    ("at least", Comparator::AtLeast),
    ("minimum", Comparator::AtLeast),
    ("min.", Comparator::AtLeast),
    (">=", Comparator::AtLeast),
    ("≥", Comparator::AtLeast),
    ("at most", Comparator::AtMost),
    ("maximum", Comparator::AtMost),
    ("max.", Comparator::AtMost),
    ("<=", Comparator::AtMost),
    ("≤", Comparator::AtMost),
    ("greater than", Comparator::GreaterThan),
    ("more than", Comparator::GreaterThan),
    ("exceed", Comparator::GreaterThan),
    ("less than", Comparator::LessThan),
    ("below", Comparator::LessThan),
];

const OBLIGATION_WORDS: &[&str] = &["must", "shall", "required", "should", "need"];

const GEOMETRIC_WORDS: &[&str] = &["clearance", "distance", "spacing", "separation", "gap"];

fn sentence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[.;!?](?:\s+|$)|\n+").expect("sentence pattern is valid"))
}

fn quantity_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(mm|cm|m²|m2|m|in|ft|°|deg|%)([a-z]?)")
            .expect("quantity pattern is valid")
    })
}

fn count_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d+)\b").expect("count pattern is valid"))
}

/// Deterministic reasoner for offline runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicReasoner;

impl HeuristicReasoner {
    pub fn new() -> Self {
        Self
    }

    /// Requirements found in `text`, numbered `R1..`.
    pub fn requirements(&self, text: &str) -> Vec<Requirement> {
        sentence_re()
            .split(text)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .filter_map(read_sentence)
            .enumerate()
            .map(|(i, mut r)| {
                r.id = format!("R{}", i + 1);
                r
            })
            .collect()
    }
}

fn read_sentence(sentence: &str) -> Option<Requirement> {
    let lowered = sentence.to_lowercase();
    let types = element_types_in(sentence);
    let comparator = COMPARATOR_PHRASES
        .iter()
        .find(|(phrase, _)| lowered.contains(phrase))
        .map(|(_, c)| *c);
    let attribute = measured_attribute(&lowered);

    let threshold = quantity_re()
        .captures_iter(sentence)
        .find(|caps| caps.get(3).map_or(true, |m| m.as_str().is_empty()))
        .and_then(|caps| Some(format!("{}{}", caps.get(1)?.as_str(), caps.get(2)?.as_str())));

    let mut requirement = Requirement::new(String::new(), sentence.to_string());
    for t in &types {
        requirement = requirement.with_type(t.clone());
    }

    let condition = match (comparator, threshold, attribute.clone()) {
        (Some(comparator), Some(threshold), Some(attribute)) => Some(Condition {
            attribute,
            comparator,
            threshold: json!(threshold),
        }),
        (Some(comparator), None, attribute) => count_re()
            .captures(sentence)
            .and_then(|caps| caps.get(1)?.as_str().parse::<i64>().ok())
            .map(|n| Condition {
                attribute: attribute.unwrap_or_else(|| "count".to_string()),
                comparator,
                threshold: json!(n),
            }),
        _ => None,
    };

    match condition {
        Some(condition) => {
            let geometric = GEOMETRIC_WORDS.iter().any(|w| condition.attribute.contains(w));
            let relational = types.len() >= 2
                && (geometric || lowered.contains("between") || lowered.contains("adjacent"));
            requirement = requirement.with_condition(condition);
            if relational {
                let relation_type = if lowered.contains("adjacent") || lowered.contains("connect") {
                    RelationType::Topology
                } else if geometric || lowered.contains("between") {
                    RelationType::Geometry
                } else {
                    RelationType::Semantic
                };
                requirement = requirement.relational(relation_type);
            }
            Some(requirement)
        }
        None if !types.is_empty() && OBLIGATION_WORDS.iter().any(|w| lowered.contains(w)) => {
            if let Some(attribute) = attribute {
                requirement = requirement.with_attribute(attribute);
            }
            Some(requirement)
        }
        None => {
            debug!(sentence, "no checkable requirement in sentence");
            None
        }
    }
}

/// The first measure word in the sentence, qualified by the word before it
/// when that names a part (`riser height` → `riser_height`).
fn measured_attribute(lowered: &str) -> Option<String> {
    let (at, word) = first_measure_word(lowered)?;
    let qualifier = lowered[..at]
        .strip_suffix(' ')
        .and_then(|before| before.rsplit(|c: char| !c.is_alphanumeric()).next())
        .filter(|q| !q.is_empty());
    Some(qualified_attribute(qualifier, word))
}

fn first_measure_word(lowered: &str) -> Option<(usize, &'static str)> {
    MEASURE_WORDS
        .iter()
        .filter_map(|w| {
            lowered
                .match_indices(w)
                .find(|(i, _)| {
                    let before = lowered[..*i].chars().last();
                    let after = lowered[*i + w.len()..].chars().next();
                    before.map_or(true, |c| !c.is_alphanumeric())
                        && after.map_or(true, |c| !c.is_alphabetic() || c == 's')
                })
                .map(|(i, _)| (i, *w))
        })
        .min_by_key(|(i, _)| *i)
}

#[async_trait]
impl Reasoner for HeuristicReasoner {
    fn name(&self) -> &str {
        "heuristic"
    }

    async fn generate(&self, request: GenerationRequest) -> Result<Value, GenerationError> {
        match request.task {
            Task::MapRequirements => {
                let text = request
                    .context
                    .get("regulation_text")
                    .and_then(Value::as_str)
                    .ok_or_else(|| GenerationError::Failed("request carries no regulation_text".to_string()))?;
                let requirements = self.requirements(text);
                Ok(json!({ "requirements": requirements }))
            }
            other => Err(GenerationError::Unsupported(other)),
        }
    }
}
