// SPDX-License-Identifier: MIT OR Apache-2.0
use async_trait::async_trait;
use atlas_core::{Change, Intent, IntentType, RiskLevel, ToolCall, UndoStep};
use atlas_tools::ToolRegistry;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Everything a skill needs to execute one intent.
pub struct SkillContext<'a> {
    /// The validated intent being executed.
    pub intent: &'a Intent,
    /// The shared tool registry to dispatch tool calls through.
    pub tools: Arc<ToolRegistry>,
}

impl<'a> SkillContext<'a> {
    /// Build a context for running a skill against `intent`.
    pub fn new(intent: &'a Intent, tools: Arc<ToolRegistry>) -> Self {
        Self { intent, tools }
    }
}

/// The result of running a skill.
#[derive(Debug, Clone, Default)]
pub struct SkillResult {
    /// Whether the skill's overall goal was achieved.
    pub success: bool,
    /// Every tool call the skill made, in order.
    pub tool_calls: Vec<ToolCall>,
    /// State changes made by the tools the skill called.
    pub changes: Vec<Change>,
    /// Undo steps for those changes, in the order they should be replayed.
    pub undo_steps: Vec<UndoStep>,
    /// Skill-specific output payload.
    pub data: Map<String, Value>,
    /// Fatal problems that prevented the skill from completing.
    pub errors: Vec<String>,
    /// Non-fatal problems worth surfacing to the caller.
    pub warnings: Vec<String>,
}

impl SkillResult {
    /// A fresh, successful result with nothing recorded yet.
    pub fn new() -> Self {
        Self { success: true, ..Self::default() }
    }
}

/// A deterministic program executing one or more intent types.
///
/// Skills are not prompts: they receive a validated intent, call tools in a
/// defined sequence, and return a structured result with undo information.
#[async_trait]
pub trait Skill: Send + Sync {
    /// Unique skill identifier.
    fn name(&self) -> &str;

    /// Intent types this skill handles.
    fn intent_types(&self) -> &[IntentType];

    /// Risk level for this skill's operations.
    fn risk_level(&self) -> RiskLevel;

    /// Human-readable description.
    fn description(&self) -> &str {
        ""
    }

    /// Execute the skill against `context`.
    async fn execute(&self, context: SkillContext<'_>) -> SkillResult;

    /// Whether this skill handles `intent`'s type.
    fn can_handle(&self, intent: &Intent) -> bool {
        self.intent_types().contains(&intent.intent_type)
    }
}
