//! Normalized evidence: what the execution trace says about each component.
//!
//! - [`EvidenceBag`]: accumulated attribute values for one component
//! - [`EvidenceMap`]: every bag plus the general bucket, joint observations
//!   and the list of skipped trace records
//! - [`normalize`]: trace → [`EvidenceMap`]
//! - [`quantity`]: typed, unit-aware view over opaque values

pub mod normalize;
pub mod quantity;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::vocabulary::{attribute_match, canonical_attribute};

pub use normalize::EvidenceNormalizer;
pub use quantity::{FixedPoint, Observed, Quantity, Unit, UnitMismatch};

/// Attribute names that place a component in a spatial/logical group,
/// in order of preference.
pub const GROUPING_KEYS: &[&str] = &[
    "storey",
    "building_storey",
    "floor",
    "level",
    "room",
    "space",
    "zone",
];

/// Accumulated observations for one component. Later writes to the same
/// attribute replace earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceBag {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_type: Option<String>,
    pub attributes: BTreeMap<String, Value>,
    /// Number of trace records that contributed to this bag.
    pub record_count: usize,
}

impl EvidenceBag {
    /// Insert an attribute, replacing any earlier spelling of the same name.
    pub fn insert(&mut self, key: &str, value: Value) {
        insert_attribute(&mut self.attributes, key, value);
    }

    /// Best evidence entry for a requirement attribute: an exact name match
    /// wins over a qualified one (`door_width` for `width`).
    pub fn lookup(&self, attribute: &str) -> Option<(&str, &Value)> {
        lookup_in(&self.attributes, attribute)
    }

    /// Entries relevant to any of `attributes`, keyed by their evidence name.
    pub fn select(&self, attributes: &[String]) -> BTreeMap<String, Value> {
        attributes
            .iter()
            .filter_map(|a| self.lookup(a))
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    /// Value of the first grouping attribute present, rendered as text.
    pub fn grouping(&self) -> Option<(String, String)> {
        GROUPING_KEYS.iter().find_map(|key| {
            self.attributes
                .iter()
                .find(|(k, _)| canonical_attribute(k) == canonical_attribute(key))
                .map(|(k, v)| (k.clone(), crate::domain::literal(v)))
        })
    }
}

pub(crate) fn insert_attribute(attributes: &mut BTreeMap<String, Value>, key: &str, value: Value) {
    let canonical = canonical_attribute(key);
    attributes.retain(|existing, _| canonical_attribute(existing) != canonical);
    attributes.insert(key.to_string(), value);
}

pub(crate) fn lookup_in<'a>(
    attributes: &'a BTreeMap<String, Value>,
    attribute: &str,
) -> Option<(&'a str, &'a Value)> {
    attributes
        .iter()
        .filter_map(|(k, v)| attribute_match(k, attribute).map(|rank| (rank, k, v)))
        .min_by_key(|(rank, _, _)| *rank)
        .map(|(_, k, v)| (k.as_str(), v))
}

/// Attributes observed for a set of components at once, e.g. a measured
/// clearance between a stair and a wall.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointObservation {
    pub component_ids: BTreeSet<String>,
    pub attributes: BTreeMap<String, Value>,
    /// Index of the trace record it came from.
    pub record_index: usize,
}

/// A trace record the normalizer could not use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRecord {
    pub record_index: usize,
    pub reason: String,
}

/// Output of evidence normalization. Read-only once built.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceMap {
    components: BTreeMap<String, EvidenceBag>,
    general: BTreeMap<String, Value>,
    joint: Vec<JointObservation>,
    skipped: Vec<SkippedRecord>,
}

impl EvidenceMap {
    pub fn components(&self) -> &BTreeMap<String, EvidenceBag> {
        &self.components
    }

    pub fn component(&self, component_id: &str) -> Option<&EvidenceBag> {
        self.components.get(component_id)
    }

    pub fn contains(&self, component_id: &str) -> bool {
        self.components.contains_key(component_id)
    }

    /// Evidence from records that named no component.
    pub fn general(&self) -> &BTreeMap<String, Value> {
        &self.general
    }

    pub fn joint_observations(&self) -> &[JointObservation] {
        &self.joint
    }

    pub fn skipped(&self) -> &[SkippedRecord] {
        &self.skipped
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty() && self.general.is_empty()
    }
}
