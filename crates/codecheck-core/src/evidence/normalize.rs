//! Execution trace → [`EvidenceMap`].
//!
//! Trace records are arbitrary JSON mappings produced by measurement tools.
//! The normalizer walks each one, works out which component(s) it talks
//! about and files its scalar values into the matching evidence bags.
//! Nothing here is fatal: unusable records are skipped and logged.

use std::collections::BTreeSet;

use serde_json::{Map, Value};
use tracing::debug;

use super::{insert_attribute, EvidenceMap, JointObservation, SkippedRecord, GROUPING_KEYS};
use crate::metrics::METRICS;
use crate::obs;
use crate::vocabulary::{element_types_in, measurements_in, normalize_type};

/// Keys that always name a building element.
const ELEMENT_ID_KEYS: &[&str] = &["component_id", "element_id", "global_id", "GlobalId", "guid"];

/// Bare identifiers. Only trusted on top-level records and inside element
/// lists; property sets nested under an element carry their own `id`.
const BARE_ID_KEYS: &[&str] = &["id"];

const TYPE_KEYS: &[&str] = &[
    "component_type",
    "ifc_type",
    "ifc_class",
    "element_type",
    "type",
];

/// Lists of component ids a record applies to.
const LIST_KEYS: &[&str] = &[
    "elements_checked",
    "element_ids",
    "component_ids",
    "checked_elements",
];

/// Free text scanned for measurements and element-class words.
const TEXT_KEYS: &[&str] = &["detail", "details", "description", "issues", "message", "summary"];

/// Bookkeeping fields of the tool runner, not evidence.
const RESERVED_KEYS: &[&str] = &["tool_name", "ifc_tool_name", "step", "step_index", "tool"];

pub const DEFAULT_MAX_DEPTH: usize = 8;

/// Turns an execution trace into per-component evidence.
#[derive(Debug, Clone, Copy)]
pub struct EvidenceNormalizer {
    max_depth: usize,
}

impl Default for EvidenceNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

impl EvidenceNormalizer {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    pub fn normalize(&self, trace: &[Value]) -> EvidenceMap {
        let mut walk = Walk::default();
        for (index, record) in trace.iter().enumerate() {
            let reason = match record {
                Value::Object(obj) if obj.is_empty() => Some("empty record"),
                Value::Object(obj) => {
                    walk.begin(index);
                    self.absorb(obj, 0, &[], &mut walk);
                    if walk.finish() {
                        None
                    } else {
                        Some("no recognizable evidence")
                    }
                }
                _ => Some("record is not a mapping"),
            };
            if let Some(reason) = reason {
                obs::emit_record_skipped(index, reason);
                METRICS.inc_records_skipped();
                walk.map.skipped.push(SkippedRecord {
                    record_index: index,
                    reason: reason.to_string(),
                });
            }
        }
        walk.map
    }

    fn absorb(&self, obj: &Map<String, Value>, depth: usize, inherited: &[String], walk: &mut Walk) {
        if depth > self.max_depth {
            debug!(depth, max_depth = self.max_depth, "trace nesting too deep; ignoring subtree");
            return;
        }

        let own_id = obj
            .iter()
            .filter(|(k, _)| is_key(k, ELEMENT_ID_KEYS))
            .find_map(|(_, v)| id_text(v))
            .or_else(|| {
                if !inherited.is_empty() {
                    return None;
                }
                obj.iter()
                    .filter(|(k, _)| is_key(k, BARE_ID_KEYS))
                    .find_map(|(_, v)| id_text(v))
            });
        let listed = listed_ids(obj);
        let targets: Vec<String> = match own_id {
            Some(id) => vec![id],
            None if !listed.is_empty() => listed,
            None => inherited.to_vec(),
        };

        let mut explicit_type = None;
        if !targets.is_empty() {
            explicit_type = obj
                .iter()
                .filter(|(k, _)| is_key(k, TYPE_KEYS))
                .find_map(|(_, v)| v.as_str().and_then(normalize_type));
        }

        // Measurements found in prose go in first so structured fields of
        // the same record overwrite them.
        let mut attributes: Vec<(String, Value)> = Vec::new();
        let mut mentioned: Vec<String> = Vec::new();
        for (key, value) in obj.iter().filter(|(k, _)| is_key(k, TEXT_KEYS)) {
            for text in texts(value) {
                for m in measurements_in(text) {
                    attributes.push((m.attribute, Value::String(m.value)));
                }
                for class in element_types_in(text) {
                    if !mentioned.contains(&class) {
                        mentioned.push(class);
                    }
                }
            }
            if let Value::Array(items) = value {
                let lines: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
                if !lines.is_empty() {
                    attributes.push((key.clone(), Value::String(lines.join("; "))));
                }
            }
        }

        let mut children: Vec<&Value> = Vec::new();
        for (key, value) in obj {
            if is_key(key, RESERVED_KEYS) || is_key(key, LIST_KEYS) {
                continue;
            }
            let is_id = is_key(key, ELEMENT_ID_KEYS) || is_key(key, BARE_ID_KEYS);
            if is_id && !value.is_object() && !value.is_array() {
                continue;
            }
            if explicit_type.is_some() && is_key(key, TYPE_KEYS) {
                if let Some(s) = value.as_str() {
                    if normalize_type(s).is_some() {
                        continue;
                    }
                }
            }
            match value {
                Value::Object(_) => children.push(value),
                Value::Array(items) if items.iter().any(Value::is_object) => children.push(value),
                Value::Array(_) if is_key(key, TEXT_KEYS) => {}
                Value::Null => {}
                _ => attributes.push((key.clone(), value.clone())),
            }
        }

        walk.file(&targets, explicit_type, &mentioned, attributes);

        for child in children {
            match child {
                Value::Object(inner) => self.absorb(inner, depth + 1, &targets, walk),
                Value::Array(items) => {
                    for item in items {
                        if let Value::Object(inner) = item {
                            self.absorb(inner, depth + 1, &targets, walk);
                        }
                    }
                }
                _ => {}
            }
        }
    }
}

/// Normalize with the default depth limit.
pub fn normalize_trace(trace: &[Value]) -> EvidenceMap {
    EvidenceNormalizer::default().normalize(trace)
}

// ---------------------------------------------------------------------------
// Walk state
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Walk {
    map: EvidenceMap,
    record_index: usize,
    touched: BTreeSet<String>,
    contributed: bool,
}

impl Walk {
    fn begin(&mut self, record_index: usize) {
        self.record_index = record_index;
        self.touched.clear();
        self.contributed = false;
    }

    /// Close the current record; returns whether it contributed anything.
    fn finish(&mut self) -> bool {
        for id in &self.touched {
            if let Some(bag) = self.map.components.get_mut(id) {
                bag.record_count += 1;
            }
        }
        self.contributed
    }

    fn file(
        &mut self,
        targets: &[String],
        explicit_type: Option<String>,
        mentioned: &[String],
        attributes: Vec<(String, Value)>,
    ) {
        if targets.is_empty() {
            if !attributes.is_empty() {
                self.contributed = true;
            }
            for (key, value) in attributes {
                insert_attribute(&mut self.map.general, &key, value);
            }
            return;
        }

        self.contributed = true;
        let inferred = match mentioned {
            [only] => Some(only),
            _ => None,
        };
        // A value recorded for several components at once describes the
        // set. Only the shared grouping keys reach the individual bags.
        let shared = targets.len() >= 2;
        for id in targets {
            let bag = self.map.components.entry(id.clone()).or_default();
            match (&explicit_type, inferred) {
                (Some(t), _) => bag.component_type = Some(t.clone()),
                (None, Some(t)) if bag.component_type.is_none() => {
                    bag.component_type = Some(t.clone())
                }
                _ => {}
            }
            for (key, value) in &attributes {
                if !shared || is_key(key, GROUPING_KEYS) {
                    bag.insert(key, value.clone());
                }
            }
            self.touched.insert(id.clone());
        }

        if targets.len() >= 2 && !attributes.is_empty() {
            self.map.joint.push(JointObservation {
                component_ids: targets.iter().cloned().collect(),
                attributes: attributes.into_iter().collect(),
                record_index: self.record_index,
            });
        }
    }
}

fn is_key(key: &str, candidates: &[&str]) -> bool {
    candidates.iter().any(|c| c.eq_ignore_ascii_case(key))
}

fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn listed_ids(obj: &Map<String, Value>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for (_, value) in obj.iter().filter(|(k, _)| is_key(k, LIST_KEYS)) {
        let Some(items) = value.as_array() else {
            continue;
        };
        for id in items.iter().filter_map(id_text) {
            if !out.contains(&id) {
                out.push(id);
            }
        }
    }
    out
}

fn texts(value: &Value) -> Vec<&str> {
    match value {
        Value::String(s) => vec![s.as_str()],
        Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}
