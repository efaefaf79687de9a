// SPDX-License-Identifier: MIT OR Apache-2.0
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The named reason a model attempt failed, driving the fallback manager's
/// retry/advance/fail decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FallbackTrigger {
    /// The normalizer could not extract valid JSON from the model's output.
    InvalidJson,
    /// The validator rejected the normalized output.
    ValidationError,
    /// The provider responded with a rate-limit signal.
    Timeout,
    /// The provider responded with a rate-limit signal.
    RateLimit,
    /// The provider was unreachable, refused the connection, or failed
    /// authentication.
    ProviderDown,
    /// The requested model lacks a capability the job class needs.
    CapabilityMismatch,
}

/// A single model-call record, emitted once per attempt within a receipt.
///
/// `attempt_number` is 1-based and counts attempts per distinct
/// `(provider, model)` pair, not across the whole receipt.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ModelAttempt {
    /// Provider name, e.g. `"ollama"`, `"openai"`.
    pub provider: String,
    /// Model identifier, e.g. `"gpt-4o-mini"`.
    pub model: String,
    /// 1-based attempt count for this `(provider, model)` pair.
    pub attempt_number: u32,
    /// Whether this attempt produced a valid, validated intent.
    pub success: bool,
    /// Why the attempt failed, if it did.
    pub fallback_trigger: Option<FallbackTrigger>,
    /// Wall-clock latency of the model call, if one was made.
    pub latency_ms: Option<u64>,
    /// When this attempt was recorded.
    pub timestamp: DateTime<Utc>,
}

impl ModelAttempt {
    /// Record a successful attempt.
    pub fn success(provider: impl Into<String>, model: impl Into<String>, attempt_number: u32, latency_ms: u64) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            attempt_number,
            success: true,
            fallback_trigger: None,
            latency_ms: Some(latency_ms),
            timestamp: Utc::now(),
        }
    }

    /// Record a failed attempt.
    pub fn failure(
        provider: impl Into<String>,
        model: impl Into<String>,
        attempt_number: u32,
        trigger: FallbackTrigger,
        latency_ms: Option<u64>,
    ) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            attempt_number,
            success: false,
            fallback_trigger: Some(trigger),
            latency_ms,
            timestamp: Utc::now(),
        }
    }

    /// The `(provider, model)` pair this attempt was made against.
    pub fn pair(&self) -> (&str, &str) {
        (&self.provider, &self.model)
    }
}
