// SPDX-License-Identifier: MIT OR Apache-2.0
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The closed set of request classifications ATLAS recognizes.
///
/// `UNKNOWN` is a first-class member, not an error: a request the model
/// cannot classify still produces a valid, low-risk intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntentType {
    /// Extract and create tasks from free-form user input.
    CaptureTasks,
    /// Generate a day plan with calendar blocks.
    PlanDay,
    /// Extract action items and follow-ups from meeting notes.
    ProcessMeetingNotes,
    /// Search notes/tasks and summarize with citations.
    SearchSummarize,
    /// Build an automation workflow.
    BuildWorkflow,
    /// Could not be classified into any of the above.
    Unknown,
}

impl IntentType {
    /// All intent types, in the order spec.md's closed set lists them.
    pub const ALL: [IntentType; 6] = [
        IntentType::CaptureTasks,
        IntentType::PlanDay,
        IntentType::ProcessMeetingNotes,
        IntentType::SearchSummarize,
        IntentType::BuildWorkflow,
        IntentType::Unknown,
    ];
}

impl std::fmt::Display for IntentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            IntentType::CaptureTasks => "CAPTURE_TASKS",
            IntentType::PlanDay => "PLAN_DAY",
            IntentType::ProcessMeetingNotes => "PROCESS_MEETING_NOTES",
            IntentType::SearchSummarize => "SEARCH_SUMMARIZE",
            IntentType::BuildWorkflow => "BUILD_WORKFLOW",
            IntentType::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// Which routing profile selects the model chain for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoutingProfile {
    /// Local models only.
    Offline,
    /// Cloud preferred, local fallback.
    Balanced,
    /// Best cloud models only.
    Accuracy,
}

impl Default for RoutingProfile {
    fn default() -> Self {
        RoutingProfile::Balanced
    }
}

/// The kind of sub-task being routed to a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobClass {
    /// Classifying user input into an [`IntentType`].
    IntentRouting,
    /// Day-planning sub-tasks.
    Planning,
    /// Entity/action-item extraction sub-tasks.
    Extraction,
    /// Summarization sub-tasks.
    Summarization,
    /// Workflow-building sub-tasks.
    WorkflowBuilding,
}

/// A tagged classification of a user's natural-language request.
///
/// Immutable once validated: construct via [`Intent::new`], never mutate a
/// validated intent in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Intent {
    /// The closed-set classification.
    #[serde(rename = "type")]
    pub intent_type: IntentType,
    /// Model confidence, in `[0.0, 1.0]`.
    pub confidence: f64,
    /// Free-form parameters keyed by name.
    #[serde(default)]
    pub parameters: BTreeMap<String, serde_json::Value>,
    /// Ordered entity strings extracted from the input.
    #[serde(default)]
    pub raw_entities: Vec<String>,
}

impl Intent {
    /// Construct a new intent. Callers should only do this from a
    /// successful `Validator::validate_intent` result — this constructor
    /// performs no validation of its own.
    pub fn new(
        intent_type: IntentType,
        confidence: f64,
        parameters: BTreeMap<String, serde_json::Value>,
        raw_entities: Vec<String>,
    ) -> Self {
        Self {
            intent_type,
            confidence,
            parameters,
            raw_entities,
        }
    }
}

/// Wraps an [`Intent`] with envelope metadata: contract version, original
/// user text, creation time, optional profile, and routing profile.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IntentEnvelope {
    /// Must equal [`crate::CONTRACT_VERSION`]; any other value is rejected
    /// by the validator.
    pub version: String,
    /// The validated intent, once classification succeeds.
    pub intent: Option<Intent>,
    /// The original user-supplied text.
    pub user_text: String,
    /// UTC creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Optional caller-supplied profile id.
    pub profile_id: Option<String>,
    /// Which routing profile produced this envelope.
    pub routing_profile: RoutingProfile,
}

impl IntentEnvelope {
    /// Build a new envelope stamped with [`crate::CONTRACT_VERSION`] and the
    /// current time.
    pub fn new(user_text: String, routing_profile: RoutingProfile, profile_id: Option<String>) -> Self {
        Self {
            version: crate::CONTRACT_VERSION.to_string(),
            intent: None,
            user_text,
            created_at: Utc::now(),
            profile_id,
            routing_profile,
        }
    }

    /// Whether `self.version` matches the currently supported contract
    /// version. Widen this (and the validator that calls it) to accept a
    /// set of versions when the envelope needs to evolve — see spec §9.
    pub fn is_supported_version(&self) -> bool {
        self.version == crate::CONTRACT_VERSION
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_type_display_matches_wire_form() {
        assert_eq!(IntentType::CaptureTasks.to_string(), "CAPTURE_TASKS");
        assert_eq!(IntentType::Unknown.to_string(), "UNKNOWN");
    }

    #[test]
    fn envelope_stamps_current_contract_version() {
        let env = IntentEnvelope::new("buy milk".into(), RoutingProfile::Offline, None);
        assert!(env.is_supported_version());
        assert_eq!(env.version, "2.1");
    }

    #[test]
    fn envelope_rejects_other_versions() {
        let mut env = IntentEnvelope::new("buy milk".into(), RoutingProfile::Offline, None);
        env.version = "2.0".to_string();
        assert!(!env.is_supported_version());
    }
}
