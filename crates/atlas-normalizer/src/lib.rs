// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

//! JSON normalization: the first line of defense against the common failure
//! mode of LLMs — wrapping JSON in markdown, adding commentary, or
//! producing malformed JSON.
//!
//! Algorithm (first success wins; every step beyond the direct parse
//! appends to `repairs_applied`):
//! 1. Direct parse.
//! 2. Markdown code-fence extraction.
//! 3. First `{...}`/`[...]` structure found in the text.
//! 4. Syntactic repairs (trailing commas, unquoted keys, quote style).

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors the normalizer itself cannot route past — used only for the
/// type-level distinction between "no success" (returned in
/// [`NormalizeResult`]) and a genuine programming error. The public API
/// never returns this; it exists so callers elsewhere in the workspace can
/// share a `thiserror` shape if they wrap normalization behind `Result`.
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// The input could not be normalized into a JSON object after every
    /// repair strategy was attempted.
    #[error("failed to normalize JSON after repairs: {0:?}")]
    ExhaustedRepairs(Vec<String>),
}

/// Outcome of a normalization attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizeResult {
    /// Whether normalization produced a usable JSON object.
    pub success: bool,
    /// The normalized object, present iff `success`.
    pub data: Option<Map<String, Value>>,
    /// Human-readable failure reason, present iff `!success`.
    pub error: Option<String>,
    /// Which repair strategies were applied, in order, whether or not they
    /// ultimately succeeded.
    pub repairs_applied: Vec<String>,
}

impl NormalizeResult {
    fn ok(data: Map<String, Value>, repairs_applied: Vec<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            repairs_applied,
        }
    }

    fn err(error: impl Into<String>, repairs_applied: Vec<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            repairs_applied,
        }
    }
}

static MARKDOWN_JSON: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)```(?:json)?\s*(.*?)```").unwrap());
static JSON_OBJECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").unwrap());
static JSON_ARRAY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\[.*\]").unwrap());
static TRAILING_COMMA: Lazy<Regex> = Lazy::new(|| Regex::new(r",(\s*[}\]])").unwrap());
static UNQUOTED_KEY: Lazy<Regex> = Lazy::new(|| Regex::new(r"([{,]\s*)([A-Za-z_][A-Za-z0-9_]*)(\s*:)").unwrap());

/// Attempt to extract a usable JSON object from raw model output.
///
/// Pure: no I/O, no logging, deterministic. Arrays are always lifted into
/// `{"items": [...]}` so downstream consumers see a mapping.
pub fn normalize(raw_output: &str) -> NormalizeResult {
    let mut repairs = Vec::new();

    // Step 1: direct parse.
    let result = try_parse(raw_output);
    if result.success {
        return result;
    }

    let mut working = raw_output.to_string();

    // Step 2: markdown extraction.
    if let Some(extracted) = extract_from_markdown(raw_output) {
        repairs.push("extracted_from_markdown".to_string());
        let result = try_parse(&extracted);
        if result.success {
            return NormalizeResult {
                repairs_applied: repairs,
                ..result
            };
        }
        working = extracted;
    }

    // Step 3: structure scouting.
    if let Some(extracted) = find_json_structure(&working) {
        if extracted != working {
            repairs.push("extracted_json_structure".to_string());
            let result = try_parse(&extracted);
            if result.success {
                return NormalizeResult {
                    repairs_applied: repairs,
                    ..result
                };
            }
            working = extracted;
        }
    }

    // Step 4: repair pass.
    let (repaired, mut repair_list) = apply_repairs(&working);
    repairs.append(&mut repair_list);

    let result = try_parse(&repaired);
    if result.success {
        return NormalizeResult {
            repairs_applied: repairs,
            ..result
        };
    }

    NormalizeResult::err(
        format!("failed to normalize JSON after repairs: {repairs:?}"),
        repairs,
    )
}

fn try_parse(text: &str) -> NormalizeResult {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return NormalizeResult::err("empty input", Vec::new());
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => NormalizeResult::ok(map, Vec::new()),
        Ok(Value::Array(items)) => {
            let mut map = Map::new();
            map.insert("items".to_string(), Value::Array(items));
            NormalizeResult::ok(map, Vec::new())
        }
        Ok(other) => NormalizeResult::err(format!("unexpected JSON type: {}", type_name(&other)), Vec::new()),
        Err(e) => NormalizeResult::err(e.to_string(), Vec::new()),
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn extract_from_markdown(text: &str) -> Option<String> {
    for cap in MARKDOWN_JSON.captures_iter(text) {
        let candidate = cap[1].trim();
        if candidate.starts_with('{') || candidate.starts_with('[') {
            return Some(candidate.to_string());
        }
    }
    None
}

fn find_json_structure(text: &str) -> Option<String> {
    if let Some(m) = JSON_OBJECT.find(text) {
        return Some(m.as_str().to_string());
    }
    if let Some(m) = JSON_ARRAY.find(text) {
        return Some(m.as_str().to_string());
    }
    None
}

fn apply_repairs(text: &str) -> (String, Vec<String>) {
    let mut repairs = Vec::new();
    let mut result = text.to_string();

    if TRAILING_COMMA.is_match(&result) {
        result = TRAILING_COMMA.replace_all(&result, "$1").to_string();
        repairs.push("removed_trailing_commas".to_string());
    }

    if UNQUOTED_KEY.is_match(&result) {
        result = UNQUOTED_KEY.replace_all(&result, "$1\"$2\"$3").to_string();
        repairs.push("quoted_keys".to_string());
    }

    if result.contains('\'') && !result.contains('"') {
        result = result.replace('\'', "\"");
        repairs.push("single_to_double_quotes".to_string());
    }

    (result, repairs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_parse_of_object_succeeds() {
        let r = normalize(r#"{"type": "CAPTURE_TASKS", "confidence": 0.9}"#);
        assert!(r.success);
        assert!(r.repairs_applied.is_empty());
        assert_eq!(r.data.unwrap()["type"], "CAPTURE_TASKS");
    }

    #[test]
    fn direct_parse_lifts_array_into_items() {
        let r = normalize(r#"[1, 2, 3]"#);
        assert!(r.success);
        assert_eq!(r.data.unwrap()["items"], serde_json::json!([1, 2, 3]));
    }

    #[test]
    fn scalar_json_fails() {
        let r = normalize("42");
        assert!(!r.success);
    }

    #[test]
    fn empty_input_fails_cleanly() {
        let r = normalize("");
        assert!(!r.success);
        assert_eq!(r.error.as_deref(), Some("empty input"));
    }

    #[test]
    fn markdown_fence_is_extracted() {
        let r = normalize("Sure! ```json\n{\"type\": \"SEARCH_SUMMARIZE\", \"confidence\": 0.8}\n```");
        assert!(r.success);
        assert_eq!(r.repairs_applied, vec!["extracted_from_markdown"]);
    }

    #[test]
    fn markdown_fence_without_json_tag_is_extracted() {
        let r = normalize("```\n{\"type\": \"UNKNOWN\", \"confidence\": 0.1}\n```");
        assert!(r.success);
        assert_eq!(r.repairs_applied, vec!["extracted_from_markdown"]);
    }

    #[test]
    fn structure_scouting_finds_object_in_prose() {
        let r = normalize("here you go: {\"type\": \"UNKNOWN\", \"confidence\": 0.1} thanks");
        assert!(r.success);
        assert_eq!(r.repairs_applied, vec!["extracted_json_structure"]);
    }

    #[test]
    fn trailing_commas_are_removed() {
        let r = normalize(r#"{"type": "UNKNOWN", "confidence": 0.1,}"#);
        assert!(r.success);
        assert!(r.repairs_applied.contains(&"removed_trailing_commas".to_string()));
    }

    #[test]
    fn bare_keys_are_quoted() {
        let r = normalize(r#"{type: "UNKNOWN", confidence: 0.1}"#);
        assert!(r.success);
        assert!(r.repairs_applied.contains(&"quoted_keys".to_string()));
    }

    #[test]
    fn single_quotes_become_double_quotes() {
        let r = normalize("{'type': 'UNKNOWN', 'confidence': 0.1}");
        assert!(r.success);
        assert!(r.repairs_applied.contains(&"single_to_double_quotes".to_string()));
    }

    #[test]
    fn mixed_quotes_are_left_alone() {
        // Contains both single and double quotes: the single->double repair
        // must not fire, since it would corrupt an already-valid string.
        let r = normalize(r#"{"type": "it's fine", "confidence": 0.1}"#);
        assert!(r.success);
        assert!(!r.repairs_applied.contains(&"single_to_double_quotes".to_string()));
    }

    #[test]
    fn completely_unparseable_text_fails_with_repair_list() {
        let r = normalize("the model said something that is not json at all");
        assert!(!r.success);
        assert!(r.error.unwrap().contains("failed to normalize JSON"));
    }

    #[test]
    fn nested_structures_are_preserved_through_extraction() {
        let r = normalize("```json\n{\"type\": \"PLAN_DAY\", \"confidence\": 0.5, \"parameters\": {\"date\": \"2026-01-01\", \"tasks\": [1, 2]}}\n```");
        assert!(r.success);
        let data = r.data.unwrap();
        assert_eq!(data["parameters"]["tasks"], serde_json::json!([1, 2]));
    }
}
