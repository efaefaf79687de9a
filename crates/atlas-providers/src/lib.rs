// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

//! Provider adapter interface and concrete backends (spec §4.3).

mod mock;
mod ollama;
mod openai;

pub use mock::MockAdapter;
pub use ollama::OllamaAdapter;
pub use openai::OpenAiAdapter;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Current health status of a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Reachable and responding normally.
    Healthy,
    /// Reachable but returning unexpected responses.
    Degraded,
    /// Unreachable or failing authentication.
    Unhealthy,
    /// Never checked.
    Unknown,
}

impl HealthStatus {
    /// Wire form, matching the Python service's `HealthStatus` enum values.
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "HEALTHY",
            HealthStatus::Degraded => "DEGRADED",
            HealthStatus::Unhealthy => "UNHEALTHY",
            HealthStatus::Unknown => "UNKNOWN",
        }
    }
}

/// Capabilities of a specific provider/model combination.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderCapabilities {
    /// Whether the model can reliably produce valid JSON when asked.
    pub strict_json: bool,
    /// Whether the model supports function/tool calling.
    pub tool_calls: bool,
    /// Whether the model supports streaming responses.
    pub streaming: bool,
    /// Maximum output tokens.
    pub max_tokens: u32,
    /// Maximum context window, in tokens.
    pub context_window: u32,
}

impl Default for ProviderCapabilities {
    fn default() -> Self {
        Self {
            strict_json: false,
            tool_calls: false,
            streaming: true,
            max_tokens: 4096,
            context_window: 8192,
        }
    }
}

/// Current health of a provider, as reported by [`ProviderAdapter::health_check`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderHealth {
    /// Overall status.
    pub status: HealthStatus,
    /// Round-trip latency of the health probe, if one completed.
    pub latency_ms: Option<u64>,
    /// When this health reading was taken.
    pub last_check: Option<DateTime<Utc>>,
    /// Error detail, present iff unhealthy or degraded.
    pub error: Option<String>,
    /// Models the provider reported as available, if the probe surfaced them.
    pub models_available: Option<Vec<String>>,
}

impl ProviderHealth {
    /// An as-yet-unchecked health reading.
    pub fn unknown() -> Self {
        Self {
            status: HealthStatus::Unknown,
            latency_ms: None,
            last_check: None,
            error: None,
            models_available: None,
        }
    }
}

/// A single chat message in a completion request.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ChatMessage {
    /// `"system"`, `"user"`, or `"assistant"`.
    pub role: String,
    /// Message text.
    pub content: String,
}

/// A request for a model completion.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// The conversation so far.
    pub messages: Vec<ChatMessage>,
    /// Which model to address.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Whether to ask the provider for strict JSON output, when it supports it.
    pub json_mode: bool,
}

/// The provider's response to a [`CompletionRequest`].
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResponse {
    /// The generated text.
    pub content: String,
    /// The model that actually served the request.
    pub model: String,
    /// The provider name.
    pub provider: String,
    /// Token usage, keyed by `"prompt_tokens"` / `"completion_tokens"`, if reported.
    pub usage: Option<HashMap<String, u64>>,
    /// Wall-clock latency of the call.
    pub latency_ms: u64,
    /// Why the provider stopped generating, if reported.
    pub finish_reason: Option<String>,
}

/// Failure modes a [`ProviderAdapter`] can raise.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    /// The provider signaled a rate limit.
    #[error("rate limit exceeded for {provider}")]
    RateLimit {
        /// Which provider.
        provider: String,
        /// Seconds to wait before retrying, if the provider specified one.
        retry_after: Option<u64>,
    },
    /// The provider is unreachable, unauthenticated, or otherwise down.
    #[error("{provider} unavailable: {message}")]
    ProviderDown {
        /// Which provider.
        provider: String,
        /// Human-readable detail.
        message: String,
    },
}

impl ProviderError {
    /// The provider name this error originated from.
    pub fn provider(&self) -> &str {
        match self {
            ProviderError::RateLimit { provider, .. } => provider,
            ProviderError::ProviderDown { provider, .. } => provider,
        }
    }
}

/// Abstract interface every model provider backend implements.
///
/// Each provider (Ollama, OpenAI, ...) implements this trait; callers —
/// `atlas-registry` and `atlas-executor` — depend only on this interface,
/// never on a concrete adapter.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Provider name, e.g. `"ollama"`, `"openai"`.
    fn name(&self) -> &str;

    /// Send a completion request to the provider.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError>;

    /// Check provider health and availability.
    async fn health_check(&self) -> ProviderHealth;

    /// Capabilities for a specific model.
    fn get_capabilities(&self, model: &str) -> ProviderCapabilities;

    /// List models available from this provider.
    async fn list_models(&self) -> Vec<String>;

    /// Release any held connections. Adapters with nothing to close can
    /// rely on the default no-op.
    async fn close(&self) {}
}
