// SPDX-License-Identifier: MIT OR Apache-2.0
use async_trait::async_trait;
use atlas_core::{Change, RiskLevel, UndoStep};
use serde_json::Value;
use std::collections::BTreeMap;

/// The result of running a [`Tool`].
#[derive(Debug, Clone, Default)]
pub struct ToolResult {
    /// Whether the operation succeeded.
    pub success: bool,
    /// Operation-specific output payload.
    pub data: Value,
    /// State changes this operation made, for the receipt's audit trail.
    pub changes: Vec<Change>,
    /// How to reverse each entry in `changes`, 1:1 and in the same order
    /// (`undo_steps[i]` reverses `changes[i]`).
    pub undo_steps: Vec<UndoStep>,
    /// Error detail, present iff `!success`.
    pub error: Option<String>,
}

impl ToolResult {
    /// A successful result with no changes or undo steps (e.g. a read).
    pub fn ok(data: Value) -> Self {
        Self { success: true, data, changes: Vec::new(), undo_steps: Vec::new(), error: None }
    }

    /// A failed result.
    pub fn fail(error: impl Into<String>) -> Self {
        Self { success: false, data: Value::Null, changes: Vec::new(), undo_steps: Vec::new(), error: Some(error.into()) }
    }
}

/// A deterministic, single-purpose operation.
///
/// Tools never call a model: they take validated arguments, perform one
/// state change (or read), and report what changed plus how to undo it.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool identifier, e.g. `"TASK_CREATE"`.
    fn name(&self) -> &str;

    /// Risk level of this tool's operation.
    fn risk_level(&self) -> RiskLevel;

    /// Human-readable description.
    fn description(&self) -> &str {
        ""
    }

    /// Whether this tool must be confirmed before it runs.
    fn requires_confirmation(&self) -> bool {
        self.risk_level().requires_confirmation()
    }

    /// Run the tool. Errors here are caught by [`crate::ToolRegistry::execute`]
    /// and recorded as a failed [`atlas_core::ToolCall`] — this method should
    /// return `Err` for anything unexpected rather than panicking.
    async fn execute(&self, args: &BTreeMap<String, Value>) -> Result<ToolResult, String>;
}
