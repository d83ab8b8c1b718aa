//! Discrete checkable requirements derived from regulation text.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::finding::RelationType;

/// Relation a measured value must satisfy against a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    #[serde(alias = ">=", alias = "min", alias = "minimum", alias = "gte")]
    AtLeast,
    #[serde(alias = "<=", alias = "max", alias = "maximum", alias = "lte")]
    AtMost,
    #[serde(alias = ">", alias = "gt")]
    GreaterThan,
    #[serde(alias = "<", alias = "lt")]
    LessThan,
    #[serde(alias = "==", alias = "=", alias = "eq", alias = "equals")]
    Equal,
    #[serde(alias = "!=", alias = "ne")]
    NotEqual,
}

impl Comparator {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::AtLeast => ">=",
            Self::AtMost => "<=",
            Self::GreaterThan => ">",
            Self::LessThan => "<",
            Self::Equal => "==",
            Self::NotEqual => "!=",
        }
    }

    /// The relation that actually held when this comparator failed.
    pub fn failed_symbol(self) -> &'static str {
        match self {
            Self::AtLeast => "<",
            Self::AtMost => ">",
            Self::GreaterThan => "<=",
            Self::LessThan => ">=",
            Self::Equal => "!=",
            Self::NotEqual => "==",
        }
    }

    /// Whether `observed <op> threshold` holds given `observed.cmp(threshold)`.
    pub fn holds(self, ordering: Ordering) -> bool {
        match self {
            Self::AtLeast => ordering != Ordering::Less,
            Self::AtMost => ordering != Ordering::Greater,
            Self::GreaterThan => ordering == Ordering::Greater,
            Self::LessThan => ordering == Ordering::Less,
            Self::Equal => ordering == Ordering::Equal,
            Self::NotEqual => ordering != Ordering::Equal,
        }
    }

    /// Comparators that only make sense for ordered (numeric) values.
    pub fn is_ordering(self) -> bool {
        !matches!(self, Self::Equal | Self::NotEqual)
    }
}

/// A machine-checkable condition: `attribute <comparator> threshold`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub attribute: String,
    pub comparator: Comparator,
    /// Literal threshold, e.g. `"800mm"`, `2`, `"EI30"`, `true`.
    pub threshold: Value,
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.attribute,
            self.comparator.symbol(),
            literal(&self.threshold)
        )
    }
}

/// Render a JSON scalar without quotes.
pub fn literal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// One discrete checkable rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    pub id: String,
    pub description: String,
    /// Element classes the rule governs. Empty means every type present.
    #[serde(default)]
    pub applicability: BTreeSet<String>,
    #[serde(default)]
    pub is_relational: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
    /// Evidence attribute names the rule depends on, besides the condition's.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation_type: Option<RelationType>,
}

impl Requirement {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            applicability: BTreeSet::new(),
            is_relational: false,
            condition: None,
            attributes: Vec::new(),
            relation_type: None,
        }
    }

    pub fn with_type(mut self, component_type: impl Into<String>) -> Self {
        self.applicability.insert(component_type.into());
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attributes.push(attribute.into());
        self
    }

    pub fn relational(mut self, relation_type: RelationType) -> Self {
        self.is_relational = true;
        self.relation_type = Some(relation_type);
        self
    }

    /// Label used as `checked_rule`; unique because ids are unique.
    pub fn rule_label(&self) -> String {
        format!("[{}] {}", self.id, self.description)
    }

    /// Whether a component of the given type falls under this rule.
    ///
    /// `None` (type unknown) only matches rules without a type restriction;
    /// the judgment step separately admits untyped components that carry
    /// the rule's attribute.
    pub fn applies_to(&self, component_type: Option<&str>) -> bool {
        if self.applicability.is_empty() {
            return true;
        }
        match component_type {
            Some(t) => self.applicability.iter().any(|a| a.eq_ignore_ascii_case(t)),
            None => false,
        }
    }

    /// Condition attribute first, then the declared attributes, deduplicated.
    pub fn relevant_attributes(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let declared = self
            .condition
            .iter()
            .map(|c| &c.attribute)
            .chain(self.attributes.iter());
        for attr in declared {
            if !out.iter().any(|a| a.eq_ignore_ascii_case(attr)) {
                out.push(attr.clone());
            }
        }
        out
    }

    /// Relation type, inferred from the condition attribute when not given.
    pub fn effective_relation_type(&self) -> RelationType {
        if let Some(t) = self.relation_type {
            return t;
        }
        let attr = self
            .condition
            .as_ref()
            .map(|c| c.attribute.to_ascii_lowercase())
            .unwrap_or_default();
        if ["clearance", "distance", "spacing", "gap", "separation"]
            .iter()
            .any(|k| attr.contains(k))
        {
            RelationType::Geometry
        } else if ["adjacent", "connect", "access", "path"]
            .iter()
            .any(|k| attr.contains(k))
        {
            RelationType::Topology
        } else {
            RelationType::Semantic
        }
    }
}
