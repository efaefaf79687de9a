// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

//! Deterministic tool implementations and their registry (spec §4.8).

/// The `Tool` trait and its result type.
pub mod base;
/// Calendar block tools: `CALENDAR_GET_DAY`, `CALENDAR_CREATE_BLOCKS`,
/// `CALENDAR_DELETE_BLOCKS`, `CALENDAR_UPDATE_BLOCK`.
pub mod calendar;
/// Note tools: `NOTE_CREATE`, `NOTE_SEARCH`, `NOTE_GET`, `NOTE_UPDATE`, `NOTE_DELETE`.
pub mod notes;
/// Central tool registry and dispatcher.
pub mod registry;
/// Shared in-memory entity store and small argument-reading helpers.
pub mod store;
/// Task tools: `TASK_CREATE`, `TASK_LIST`, `TASK_GET`, `TASK_UPDATE`, `TASK_DELETE`.
pub mod tasks;
/// Workflow tools: `WORKFLOW_SAVE`, `WORKFLOW_ENABLE`, `WORKFLOW_LIST`, `WORKFLOW_DELETE`.
pub mod workflow;

pub use base::{Tool, ToolResult};
pub use registry::{ToolInfo, ToolRegistry};
pub use store::EntityStore;

use std::sync::Arc;

/// The four in-memory entity stores every default tool implementation
/// shares, one per entity kind named in spec §3's `Change.entity_type`.
#[derive(Clone, Default)]
pub struct EntityStores {
    /// Task storage.
    pub tasks: EntityStore,
    /// Note storage.
    pub notes: EntityStore,
    /// Calendar block storage.
    pub calendar_blocks: EntityStore,
    /// Workflow storage.
    pub workflows: EntityStore,
}

impl EntityStores {
    /// Four fresh, empty stores.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Build a [`ToolRegistry`] pre-populated with every built-in tool, backed
/// by `stores`. This is the composition root `atlas-daemon` calls at
/// startup; tests can call it directly against fresh [`EntityStores`].
pub async fn build_default_registry(stores: &EntityStores) -> ToolRegistry {
    let registry = ToolRegistry::new();

    registry.register(Arc::new(tasks::TaskCreateTool::new(stores.tasks.clone()))).await;
    registry.register(Arc::new(tasks::TaskListTool::new(stores.tasks.clone()))).await;
    registry.register(Arc::new(tasks::TaskGetTool::new(stores.tasks.clone()))).await;
    registry.register(Arc::new(tasks::TaskUpdateTool::new(stores.tasks.clone()))).await;
    registry.register(Arc::new(tasks::TaskDeleteTool::new(stores.tasks.clone()))).await;

    registry.register(Arc::new(notes::NoteCreateTool::new(stores.notes.clone()))).await;
    registry.register(Arc::new(notes::NoteSearchTool::new(stores.notes.clone()))).await;
    registry.register(Arc::new(notes::NoteGetTool::new(stores.notes.clone()))).await;
    registry.register(Arc::new(notes::NoteUpdateTool::new(stores.notes.clone()))).await;
    registry.register(Arc::new(notes::NoteDeleteTool::new(stores.notes.clone()))).await;

    registry.register(Arc::new(calendar::CalendarGetDayTool::new(stores.calendar_blocks.clone()))).await;
    registry.register(Arc::new(calendar::CalendarCreateBlocksTool::new(stores.calendar_blocks.clone()))).await;
    registry.register(Arc::new(calendar::CalendarDeleteBlocksTool::new(stores.calendar_blocks.clone()))).await;
    registry.register(Arc::new(calendar::CalendarUpdateBlockTool::new(stores.calendar_blocks.clone()))).await;

    registry.register(Arc::new(workflow::WorkflowSaveTool::new(stores.workflows.clone()))).await;
    registry.register(Arc::new(workflow::WorkflowEnableTool::new(stores.workflows.clone()))).await;
    registry.register(Arc::new(workflow::WorkflowListTool::new(stores.workflows.clone()))).await;
    registry.register(Arc::new(workflow::WorkflowDeleteTool::new(stores.workflows.clone()))).await;

    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_registry_has_every_built_in_tool() {
        let stores = EntityStores::new();
        let registry = build_default_registry(&stores).await;
        let mut names = registry.list_tools().await;
        names.sort();
        assert_eq!(
            names,
            vec![
                "CALENDAR_CREATE_BLOCKS",
                "CALENDAR_DELETE_BLOCKS",
                "CALENDAR_GET_DAY",
                "CALENDAR_UPDATE_BLOCK",
                "NOTE_CREATE",
                "NOTE_DELETE",
                "NOTE_GET",
                "NOTE_SEARCH",
                "NOTE_UPDATE",
                "TASK_CREATE",
                "TASK_DELETE",
                "TASK_GET",
                "TASK_LIST",
                "TASK_UPDATE",
                "WORKFLOW_DELETE",
                "WORKFLOW_ENABLE",
                "WORKFLOW_LIST",
                "WORKFLOW_SAVE",
            ]
        );
    }
}
