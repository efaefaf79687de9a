// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

//! Schema, entity, and policy validation (spec §4.2).
//!
//! Enforces:
//! - required fields (`type`, `confidence`)
//! - intent type is a member of the closed [`IntentType`] set
//! - confidence is numeric and within `[0.0, 1.0]`
//! - intent-specific parameter shape (`PLAN_DAY` date format,
//!   `PROCESS_MEETING_NOTES` content presence)
//! - `raw_entities` is a list of strings
//!
//! A required-field miss short-circuits immediately; every other check
//! accumulates into `errors`/`warnings` so a caller sees every problem in
//! one pass, not just the first.

use atlas_core::{Intent, IntentType, RiskLevel};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A single validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted/indexed field path, e.g. `"confidence"` or `"raw_entities[2]"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
    /// Stable machine-readable error code.
    pub code: &'static str,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>, code: &'static str) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            code,
        }
    }
}

/// Outcome of [`Validator::validate_intent`].
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// Whether the input was accepted.
    pub valid: bool,
    /// Every error found, empty iff `valid`.
    pub errors: Vec<ValidationError>,
    /// Non-fatal observations (e.g. a meeting-notes intent with no content).
    pub warnings: Vec<String>,
    /// The parsed intent, present iff `valid`.
    pub intent: Option<Intent>,
    /// The risk level this intent maps to, meaningful iff `valid`.
    pub risk_level: RiskLevel,
}

/// Validates normalized intent JSON against the ATLAS contract.
#[derive(Debug, Default, Clone, Copy)]
pub struct Validator;

impl Validator {
    /// Construct a validator. Stateless — safe to share across requests.
    pub fn new() -> Self {
        Self
    }

    /// Risk level for an intent type, per spec §3's risk table.
    pub fn risk_for(intent_type: IntentType) -> RiskLevel {
        match intent_type {
            IntentType::CaptureTasks | IntentType::SearchSummarize | IntentType::Unknown => RiskLevel::Low,
            IntentType::PlanDay | IntentType::ProcessMeetingNotes => RiskLevel::Medium,
            IntentType::BuildWorkflow => RiskLevel::High,
        }
    }

    /// Validate a normalized JSON object against the intent contract.
    pub fn validate_intent(&self, data: &Map<String, Value>) -> ValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        for required in ["type", "confidence"] {
            if !data.contains_key(required) {
                errors.push(ValidationError::new(
                    required,
                    format!("Missing required field: {required}"),
                    "MISSING_FIELD",
                ));
            }
        }
        if !errors.is_empty() {
            return ValidationResult {
                valid: false,
                errors,
                warnings,
                intent: None,
                risk_level: RiskLevel::Low,
            };
        }

        let intent_type = validate_intent_type(data.get("type"), &mut errors);
        let confidence = validate_confidence(data.get("confidence"), &mut errors);

        let parameters = match data.get("parameters") {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        };
        if let Some(intent_type) = intent_type {
            validate_parameters(intent_type, &parameters, &mut errors, &mut warnings);
        }

        let raw_entities_value = data.get("raw_entities").cloned().unwrap_or(Value::Array(Vec::new()));
        validate_entities(&raw_entities_value, &mut errors);

        if !errors.is_empty() {
            return ValidationResult {
                valid: false,
                errors,
                warnings,
                intent: None,
                risk_level: RiskLevel::Low,
            };
        }

        let intent_type = intent_type.unwrap_or(IntentType::Unknown);
        let raw_entities: Vec<String> = match raw_entities_value {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        };

        let params_map: BTreeMap<String, Value> = parameters.into_iter().collect();
        let intent = Intent::new(intent_type, confidence.unwrap_or(0.0), params_map, raw_entities);
        let risk_level = Self::risk_for(intent.intent_type);

        ValidationResult {
            valid: true,
            errors,
            warnings,
            intent: Some(intent),
            risk_level,
        }
    }
}

fn validate_intent_type(value: Option<&Value>, errors: &mut Vec<ValidationError>) -> Option<IntentType> {
    let value = value?;
    match serde_json::from_value::<IntentType>(value.clone()) {
        Ok(t) => Some(t),
        Err(_) => {
            let allowed: Vec<String> = IntentType::ALL.iter().map(|t| t.to_string()).collect();
            errors.push(ValidationError::new(
                "type",
                format!("Invalid intent type: {value}. Allowed: {allowed:?}"),
                "INVALID_INTENT_TYPE",
            ));
            None
        }
    }
}

fn validate_confidence(value: Option<&Value>, errors: &mut Vec<ValidationError>) -> Option<f64> {
    let value = match value {
        Some(v) => v,
        None => {
            errors.push(ValidationError::new("confidence", "Confidence is required", "MISSING_FIELD"));
            return None;
        }
    };

    let conf = match value.as_f64() {
        Some(c) => c,
        None => {
            errors.push(ValidationError::new(
                "confidence",
                format!("Confidence must be a number, got: {}", type_name(value)),
                "INVALID_TYPE",
            ));
            return None;
        }
    };

    if !(0.0..=1.0).contains(&conf) {
        errors.push(ValidationError::new(
            "confidence",
            format!("Confidence must be between 0 and 1, got: {conf}"),
            "OUT_OF_RANGE",
        ));
        return None;
    }

    Some(conf)
}

fn validate_parameters(
    intent_type: IntentType,
    parameters: &Map<String, Value>,
    errors: &mut Vec<ValidationError>,
    warnings: &mut Vec<String>,
) {
    match intent_type {
        IntentType::PlanDay => {
            if let Some(date) = parameters.get("date") {
                if !is_valid_date(date) {
                    errors.push(ValidationError::new(
                        "parameters.date",
                        format!("Invalid date format: {date}"),
                        "INVALID_DATE",
                    ));
                }
            }
        }
        IntentType::ProcessMeetingNotes => {
            let has_content = parameters
                .get("content")
                .map(|v| !is_blank(v))
                .unwrap_or(false)
                || parameters.get("notes").map(|v| !is_blank(v)).unwrap_or(false);
            if !has_content {
                warnings.push("Meeting notes intent has no content/notes parameter".to_string());
            }
        }
        _ => {}
    }
}

fn is_blank(v: &Value) -> bool {
    match v {
        Value::String(s) => s.trim().is_empty(),
        Value::Null => true,
        Value::Array(a) => a.is_empty(),
        _ => false,
    }
}

fn is_valid_date(value: &Value) -> bool {
    let Some(s) = value.as_str() else { return false };
    chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
        || chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").is_ok()
        || chrono::DateTime::parse_from_rfc3339(s).is_ok()
}

fn validate_entities(value: &Value, errors: &mut Vec<ValidationError>) {
    let items = match value {
        Value::Array(items) => items,
        Value::Null => return,
        other => {
            errors.push(ValidationError::new(
                "raw_entities",
                "raw_entities must be a list",
                "INVALID_TYPE",
            ));
            let _ = other;
            return;
        }
    };

    for (i, entity) in items.iter().enumerate() {
        if !entity.is_string() {
            errors.push(ValidationError::new(
                format!("raw_entities[{i}]"),
                format!("Entity must be string, got: {}", type_name(entity)),
                "INVALID_TYPE",
            ));
        }
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
