// SPDX-License-Identifier: MIT OR Apache-2.0
use thiserror::Error;

/// Errors that can arise from contract-level operations: (de)serializing a
/// [`crate::Receipt`], or checking its invariants.
#[derive(Debug, Error)]
pub enum ContractError {
    /// Serialization or deserialization of a contract type failed.
    #[error("serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    /// A receipt violated one of its documented invariants.
    #[error("receipt invariant violated: {0}")]
    InvariantViolation(String),
}

/// Stable error codes for the executor's catastrophic path only (spec §7).
///
/// Recoverable failures — a bad model response, a missing skill — never
/// escape as `Err` values; they become `ModelAttempt` entries or
/// `Receipt::warnings`/`errors` strings instead. These variants exist for
/// the narrower set of failures that end a request outright.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Every model in the fallback chain was exhausted without producing
    /// a valid, validated intent.
    #[error("Failed to classify intent after all attempts")]
    ClassifyExhausted,
    /// A validated intent's type has no skill registered to handle it.
    #[error("no skill registered for intent type: {0}")]
    SkillNotFound(String),
    /// A skill referenced a tool name the dispatcher has no registration for.
    #[error("tool not found: {0}")]
    DispatchToolNotFound(String),
    /// An unexpected failure escaped every other boundary.
    #[error("unexpected error: {0}")]
    Catastrophic(String),
}
