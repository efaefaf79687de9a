// SPDX-License-Identifier: MIT OR Apache-2.0
use crate::{Change, ContractError, Intent, ModelAttempt, ToolCall, UndoStep};
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Overall outcome of a single `execute` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReceiptStatus {
    /// The skill ran and every mutation that required confirmation either
    /// did not need it or was explicitly skipped-through.
    Success,
    /// Some tool calls succeeded and at least one failed or is pending.
    Partial,
    /// Classification or execution failed outright.
    Failed,
    /// One or more tool calls are awaiting user confirmation.
    PendingConfirm,
}

/// The root audit record of a single `execute` call: full attempt history,
/// final intent, tool calls, changes, and the undo plan that inverts them.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Receipt {
    /// Globally unique id, assigned at open and equal to the stored key.
    pub receipt_id: Uuid,
    /// When this receipt was opened.
    pub timestamp_utc: DateTime<Utc>,
    /// Optional caller-supplied profile id.
    pub profile_id: Option<String>,
    /// Current status.
    pub status: ReceiptStatus,
    /// The original user input.
    pub user_input: String,
    /// Chronological record of every model call attempted.
    pub models_attempted: Vec<ModelAttempt>,
    /// The finalized intent, if classification succeeded.
    pub intent_final: Option<Intent>,
    /// Every tool call made while executing the skill.
    pub tool_calls: Vec<ToolCall>,
    /// Every state mutation made while executing the skill.
    pub changes: Vec<Change>,
    /// The undo plan: one step per change, in reverse-apply order.
    pub undo: Vec<UndoStep>,
    /// Non-fatal issues surfaced during execution.
    pub warnings: Vec<String>,
    /// Fatal issues; only populated on the catastrophic path.
    pub errors: Vec<String>,
    /// If this receipt documents an undo, the receipt it undoes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_receipt_id: Option<Uuid>,
}

impl Receipt {
    /// Open a new receipt for a request. Status starts `PENDING_CONFIRM` and
    /// is finalized by the executor once the attempt loop and any skill
    /// finish running.
    pub fn open(user_input: impl Into<String>, profile_id: Option<String>) -> Self {
        Self {
            receipt_id: Uuid::new_v4(),
            timestamp_utc: Utc::now(),
            profile_id,
            status: ReceiptStatus::PendingConfirm,
            user_input: user_input.into(),
            models_attempted: Vec::new(),
            intent_final: None,
            tool_calls: Vec::new(),
            changes: Vec::new(),
            undo: Vec::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
            source_receipt_id: None,
        }
    }

    /// The canonical JSON form of this receipt, used for hashing and
    /// persistence. Deterministic: `serde_json` sorts map keys.
    pub fn canonicalize(&self) -> Result<String, ContractError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Hex-encoded SHA-256 of the canonical form.
    pub fn sha256(&self) -> Result<String, ContractError> {
        let canonical = self.canonicalize()?;
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Check every invariant spec.md §3 documents. Returns the first
    /// violation found, wrapped as a human-readable message.
    pub fn check_invariants(&self) -> Result<(), ContractError> {
        use crate::{MAX_ATTEMPTS_PER_MODEL, MAX_MODELS_PER_REQUEST};

        if self.models_attempted.len() > MAX_ATTEMPTS_PER_MODEL * MAX_MODELS_PER_REQUEST {
            return Err(ContractError::InvariantViolation(format!(
                "models_attempted has {} entries, exceeds {} * {}",
                self.models_attempted.len(),
                MAX_ATTEMPTS_PER_MODEL,
                MAX_MODELS_PER_REQUEST
            )));
        }

        let distinct: BTreeSet<(&str, &str)> = self.models_attempted.iter().map(ModelAttempt::pair).collect();
        if distinct.len() > MAX_MODELS_PER_REQUEST {
            return Err(ContractError::InvariantViolation(format!(
                "{} distinct (provider, model) pairs attempted, exceeds cap {}",
                distinct.len(),
                MAX_MODELS_PER_REQUEST
            )));
        }

        if self.status == ReceiptStatus::Success && self.intent_final.is_none() {
            return Err(ContractError::InvariantViolation(
                "status is SUCCESS but intent_final is null".into(),
            ));
        }

        if self.changes.len() != self.undo.len() {
            return Err(ContractError::InvariantViolation(format!(
                "{} changes but {} undo steps — every change needs exactly one undo step",
                self.changes.len(),
                self.undo.len()
            )));
        }

        Ok(())
    }
}
