// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! The stable contract for ATLAS: the types every other crate in the
//! workspace builds on.

/// Error taxonomy for contract-level failures (serialization, invariants).
pub mod error;
/// Intent, intent envelope, and routing/job-class enums.
pub mod intent;
/// Model attempts and fallback triggers.
pub mod attempt;
/// Tool calls and their lifecycle status.
pub mod tool_call;
/// State changes and their inverse undo steps.
pub mod change;
/// Risk classification.
pub mod risk;
/// The Receipt aggregate and its invariants.
pub mod receipt;

pub use attempt::{FallbackTrigger, ModelAttempt};
pub use change::{Change, ChangeAction, EntityType, UndoStep};
pub use error::{ContractError, EngineError};
pub use intent::{Intent, IntentEnvelope, IntentType, JobClass, RoutingProfile};
pub use receipt::{Receipt, ReceiptStatus};
pub use risk::RiskLevel;
pub use tool_call::{ToolCall, ToolCallStatus};

/// Current intent-envelope contract version. Validation hard-rejects any
/// other value (see [`intent::IntentEnvelope`]).
///
/// # Examples
///
/// ```
/// assert_eq!(atlas_core::CONTRACT_VERSION, "2.1");
/// ```
pub const CONTRACT_VERSION: &str = "2.1";

/// Spec-locked fallback caps. Not configurable at runtime — see
/// `atlas-fallback` and spec §4.5/§6.
pub const MAX_ATTEMPTS_PER_MODEL: usize = 2;

/// Spec-locked fallback cap on distinct `(provider, model)` pairs per
/// request.
pub const MAX_MODELS_PER_REQUEST: usize = 3;
