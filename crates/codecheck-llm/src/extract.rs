//! Pull a JSON value out of free-form model output.
//!
//! Tried in order: the whole text, a fenced ```json block, then the
//! outermost `{...}` or `[...]` span, whichever opens first.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::error::LlmError;

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)```").expect("fence pattern is valid"))
}

fn span(text: &str, open: char, close: char) -> Option<(usize, &str)> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| (start, &text[start..=end]))
}

pub fn extract_json(text: &str) -> Result<Value, LlmError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(LlmError::EmptyResponse);
    }
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(value);
    }

    let fenced = fence_re()
        .captures_iter(trimmed)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim());
    let mut spans: Vec<(usize, &str)> = [span(trimmed, '{', '}'), span(trimmed, '[', ']')]
        .into_iter()
        .flatten()
        .collect();
    spans.sort_by_key(|(start, _)| *start);

    fenced
        .chain(spans.into_iter().map(|(_, s)| s))
        .find_map(|candidate| serde_json::from_str(candidate).ok())
        .ok_or_else(|| {
            let preview: String = trimmed.chars().take(80).collect();
            LlmError::Extract(preview)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_json() {
        assert_eq!(
            extract_json(r#"{"compliance_status": "compliant"}"#).unwrap(),
            json!({"compliance_status": "compliant"})
        );
    }

    #[test]
    fn test_fenced_block() {
        let text = "Here is my answer:\n```json\n{\"requirements\": []}\n```\nLet me know.";
        assert_eq!(extract_json(text).unwrap(), json!({"requirements": []}));
    }

    #[test]
    fn test_embedded_object() {
        let text = "The door passes. {\"compliance_status\": \"compliant\", \"data_used\": {\"width\": \"900mm\"}} Done.";
        assert_eq!(extract_json(text).unwrap()["data_used"]["width"], json!("900mm"));
    }

    #[test]
    fn test_bare_list() {
        let text = "Requirements: [{\"id\": \"R1\", \"description\": \"x\"}]";
        assert_eq!(extract_json(text).unwrap()[0]["id"], json!("R1"));
    }

    #[test]
    fn test_prose_is_rejected() {
        assert!(matches!(extract_json("I cannot help with that."), Err(LlmError::Extract(_))));
        assert!(matches!(extract_json("   "), Err(LlmError::EmptyResponse)));
    }
}
