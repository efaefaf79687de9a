// SPDX-License-Identifier: MIT OR Apache-2.0
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lifecycle status of a single tool invocation recorded in a receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ToolCallStatus {
    /// The tool requires confirmation and was not run.
    PendingConfirm,
    /// The tool ran and succeeded.
    Ok,
    /// The tool ran and failed.
    Failed,
    /// The tool call was not attempted (e.g. an earlier step aborted it).
    Skipped,
}

/// A single recorded tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ToolCall {
    /// The tool's unique name, e.g. `"TASK_CREATE"`.
    pub tool_name: String,
    /// Arguments passed to the tool.
    pub args: BTreeMap<String, serde_json::Value>,
    /// Current status.
    pub status: ToolCallStatus,
    /// The tool's result payload, if it ran successfully.
    pub result: Option<serde_json::Value>,
    /// The error message, if it failed.
    pub error: Option<String>,
    /// When this call was recorded.
    pub timestamp: DateTime<Utc>,
}

impl ToolCall {
    /// Build a tool call in [`ToolCallStatus::Ok`].
    pub fn ok(tool_name: impl Into<String>, args: BTreeMap<String, serde_json::Value>, result: serde_json::Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            args,
            status: ToolCallStatus::Ok,
            result: Some(result),
            error: None,
            timestamp: Utc::now(),
        }
    }

    /// Build a tool call in [`ToolCallStatus::Failed`].
    pub fn failed(tool_name: impl Into<String>, args: BTreeMap<String, serde_json::Value>, error: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            args,
            status: ToolCallStatus::Failed,
            result: None,
            error: Some(error.into()),
            timestamp: Utc::now(),
        }
    }

    /// Build a tool call in [`ToolCallStatus::PendingConfirm`].
    pub fn pending_confirm(tool_name: impl Into<String>, args: BTreeMap<String, serde_json::Value>) -> Self {
        Self {
            tool_name: tool_name.into(),
            args,
            status: ToolCallStatus::PendingConfirm,
            result: None,
            error: None,
            timestamp: Utc::now(),
        }
    }
}
