// SPDX-License-Identifier: MIT OR Apache-2.0
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The entity kinds ATLAS tools mutate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// A task.
    Task,
    /// A note.
    Note,
    /// A calendar block.
    CalendarBlock,
    /// An automation workflow.
    Workflow,
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EntityType::Task => "task",
            EntityType::Note => "note",
            EntityType::CalendarBlock => "calendar_block",
            EntityType::Workflow => "workflow",
        };
        f.write_str(s)
    }
}

/// What happened to an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    /// The entity was created.
    Created,
    /// The entity was updated in place.
    Updated,
    /// The entity was deleted.
    Deleted,
}

/// A single recorded state mutation, with optional before/after snapshots.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Change {
    /// The kind of entity mutated.
    pub entity_type: EntityType,
    /// The entity's id.
    pub entity_id: String,
    /// What happened to it.
    pub action: ChangeAction,
    /// State before the change, if applicable.
    pub before: Option<serde_json::Value>,
    /// State after the change, if applicable.
    pub after: Option<serde_json::Value>,
}

/// A reverse operation that, when executed, restores the pre-change state
/// of the [`Change`] it pairs with.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UndoStep {
    /// The tool to invoke to undo the change.
    pub tool_name: String,
    /// Arguments to pass to that tool.
    pub args: std::collections::BTreeMap<String, serde_json::Value>,
    /// Human-readable description, surfaced in undo previews.
    pub description: String,
}
