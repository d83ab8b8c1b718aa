//! Building-element vocabulary shared by the normalizer and the offline
//! reasoner: element-class names, attribute matching and free-text
//! measurement extraction.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;

/// Plain-language words and the element class they denote.
const ELEMENT_WORDS: &[(&str, &str)] = &[
    ("door", "IfcDoor"),
    ("doors", "IfcDoor"),
    ("doorway", "IfcDoor"),
    ("doorways", "IfcDoor"),
    ("exit", "IfcDoor"),
    ("exits", "IfcDoor"),
    ("wall", "IfcWall"),
    ("walls", "IfcWall"),
    ("stair", "IfcStair"),
    ("stairs", "IfcStair"),
    ("staircase", "IfcStair"),
    ("stairway", "IfcStair"),
    ("stairways", "IfcStair"),
    ("flight", "IfcStairFlight"),
    ("flights", "IfcStairFlight"),
    ("riser", "IfcStairFlight"),
    ("risers", "IfcStairFlight"),
    ("tread", "IfcStairFlight"),
    ("treads", "IfcStairFlight"),
    ("space", "IfcSpace"),
    ("spaces", "IfcSpace"),
    ("room", "IfcSpace"),
    ("rooms", "IfcSpace"),
    ("corridor", "IfcSpace"),
    ("corridors", "IfcSpace"),
    ("window", "IfcWindow"),
    ("windows", "IfcWindow"),
    ("slab", "IfcSlab"),
    ("slabs", "IfcSlab"),
    ("floor", "IfcSlab"),
    ("ramp", "IfcRamp"),
    ("ramps", "IfcRamp"),
    ("railing", "IfcRailing"),
    ("railings", "IfcRailing"),
    ("handrail", "IfcRailing"),
    ("handrails", "IfcRailing"),
    ("guardrail", "IfcRailing"),
    ("column", "IfcColumn"),
    ("columns", "IfcColumn"),
    ("beam", "IfcBeam"),
    ("beams", "IfcBeam"),
    ("roof", "IfcRoof"),
    ("storey", "IfcBuildingStorey"),
    ("storeys", "IfcBuildingStorey"),
];

/// Attribute words recognised in free text and regulation sentences.
pub const MEASURE_WORDS: &[&str] = &[
    "width",
    "height",
    "depth",
    "length",
    "clearance",
    "distance",
    "area",
    "thickness",
    "headroom",
    "elevation",
    "slope",
    "spacing",
    "rise",
    "going",
    "count",
    "number",
];

/// Words that narrow a measure word to a specific part of an element
/// (`riser height`, `clear width`). Kept in the attribute name so that
/// `riser_height` and `handrail_height` stay distinct.
pub const ATTRIBUTE_QUALIFIERS: &[&str] = &[
    "riser",
    "tread",
    "nosing",
    "landing",
    "handrail",
    "guardrail",
    "guard",
    "railing",
    "sill",
    "head",
    "opening",
    "frame",
    "leaf",
    "clear",
    "overall",
    "nominal",
    "net",
    "gross",
    "total",
    "free",
    "effective",
];

/// Attribute name for `word`, prefixed with `qualifier` when the pair reads
/// as a qualified measure (`riser` + `height` → `riser_height`).
pub fn qualified_attribute(qualifier: Option<&str>, word: &str) -> String {
    let word = word.to_ascii_lowercase();
    if !MEASURE_WORDS.contains(&word.as_str()) {
        return word;
    }
    match qualifier.map(str::to_ascii_lowercase) {
        Some(q) if ATTRIBUTE_QUALIFIERS.contains(&q.as_str()) => format!("{q}_{word}"),
        _ => word,
    }
}

/// Normalise an element-class spelling to `IfcXxx` form.
///
/// Accepts IFC class names in any case (`IFCDOOR`, `ifcDoor`) and the plain
/// words in [`ELEMENT_WORDS`]. Returns `None` for anything else.
pub fn normalize_type(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let prefix = trimmed.get(..3).filter(|p| p.eq_ignore_ascii_case("ifc"));
    if let (Some(_), Some(rest)) = (prefix, trimmed.get(3..).filter(|r| !r.is_empty())) {
        if !rest.chars().all(|c| c.is_ascii_alphanumeric()) {
            return None;
        }
        let lowered = rest.to_ascii_lowercase();
        if let Some((_, class)) = ELEMENT_WORDS
            .iter()
            .find(|(_, class)| class[3..].eq_ignore_ascii_case(&lowered))
        {
            return Some((*class).to_string());
        }
        let mut chars = rest.chars();
        let first = chars.next()?.to_ascii_uppercase();
        let tail: String = if rest.chars().any(|c| c.is_ascii_lowercase()) {
            chars.collect()
        } else {
            chars.as_str().to_ascii_lowercase()
        };
        return Some(format!("Ifc{first}{tail}"));
    }
    let lowered = trimmed.to_ascii_lowercase();
    ELEMENT_WORDS
        .iter()
        .find(|(word, _)| *word == lowered)
        .map(|(_, class)| (*class).to_string())
}

/// Element classes mentioned in free text, in order of first mention.
pub fn element_types_in(text: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for token in text.split(|c: char| !c.is_ascii_alphanumeric()) {
        if token.is_empty() {
            continue;
        }
        if let Some(class) = normalize_type(token) {
            if seen.insert(class.clone()) {
                out.push(class);
            }
        }
    }
    out
}

/// Lower-case alphanumeric form used to compare attribute names
/// (`"Overall_Width"` → `"overallwidth"`).
pub fn canonical_attribute(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// How well an evidence key matches a requirement attribute.
///
/// `Some(0)` for an exact canonical match, `Some(1)` for a qualified key
/// ending in the attribute (`door_width` for `width`), `None` otherwise.
pub fn attribute_match(evidence_key: &str, attribute: &str) -> Option<u8> {
    let key = canonical_attribute(evidence_key);
    let attr = canonical_attribute(attribute);
    if attr.is_empty() {
        return None;
    }
    if key == attr {
        Some(0)
    } else if key.ends_with(&attr) {
        Some(1)
    } else {
        None
    }
}

fn measurement_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(?:([a-z]+) )?([a-z][a-z_]*)\s*(?:of\s+|is\s+|=\s*|:\s*)?(-?\d+(?:\.\d+)?)\s*(mm|cm|m²|m2|m|in|ft|°|deg|%)(?:\b|\s|$|[.,;)])",
        )
        .expect("measurement pattern is valid")
    })
}

const STOP_WORDS: &[&str] = &[
    "of", "is", "at", "to", "the", "a", "an", "by", "was", "were", "be", "measured", "least",
    "most", "than", "and", "or", "with", "required", "minimum", "maximum", "min", "max",
];

/// A `<attribute> <number><unit>` occurrence found in free text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Measurement {
    pub attribute: String,
    pub value: String,
}

/// Extract measurements such as `"door width 900mm measured"` →
/// `width = "900mm"` or `"riser height 175mm"` → `riser_height = "175mm"`.
/// Only values with an explicit unit are taken.
pub fn measurements_in(text: &str) -> Vec<Measurement> {
    measurement_re()
        .captures_iter(text)
        .filter_map(|caps| {
            let word = caps.get(2)?.as_str();
            if STOP_WORDS.contains(&word.to_ascii_lowercase().as_str()) {
                return None;
            }
            let attribute = qualified_attribute(caps.get(1).map(|m| m.as_str()), word);
            let number = caps.get(3)?.as_str();
            let unit = caps.get(4)?.as_str();
            Some(Measurement {
                attribute,
                value: format!("{number}{unit}"),
            })
        })
        .collect()
}
