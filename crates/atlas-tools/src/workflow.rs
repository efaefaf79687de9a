// SPDX-License-Identifier: MIT OR Apache-2.0
use crate::base::{Tool, ToolResult};
use crate::store::{gen_id, now_iso, opt_str_field, EntityStore};
use async_trait::async_trait;
use atlas_core::{Change, ChangeAction, EntityType, RiskLevel, UndoStep};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// `WORKFLOW_SAVE`: persist a workflow definition, always starting disabled.
pub struct WorkflowSaveTool {
    store: EntityStore,
}

impl WorkflowSaveTool {
    /// Build the tool backed by a shared workflow store.
    pub fn new(store: EntityStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for WorkflowSaveTool {
    fn name(&self) -> &str {
        "WORKFLOW_SAVE"
    }
    fn risk_level(&self) -> RiskLevel {
        RiskLevel::Low
    }
    fn description(&self) -> &str {
        "Save a workflow definition, disabled by default"
    }

    async fn execute(&self, args: &BTreeMap<String, Value>) -> Result<ToolResult, String> {
        let name = args.get("name").and_then(Value::as_str).unwrap_or("").to_string();
        let trigger = args.get("trigger").cloned().unwrap_or_else(|| json!({"type": "manual"}));
        let actions = args.get("actions").cloned().unwrap_or_else(|| json!([]));

        let workflow_id = gen_id("wf");
        let now = now_iso();

        let workflow = json!({
            "workflow_id": workflow_id,
            "name": name,
            "trigger": trigger,
            "actions": actions,
            "enabled": false,
            "created_at": now,
            "updated_at": now,
            "run_count": 0,
            "last_run": Value::Null,
        });

        self.store.insert(workflow_id.clone(), workflow.clone()).await;

        Ok(ToolResult {
            success: true,
            data: json!({"workflow_id": workflow_id, "status": "saved", "enabled": false}),
            changes: vec![Change {
                entity_type: EntityType::Workflow,
                entity_id: workflow_id.clone(),
                action: ChangeAction::Created,
                before: None,
                after: Some(workflow),
            }],
            undo_steps: vec![UndoStep {
                tool_name: "WORKFLOW_DELETE".to_string(),
                args: BTreeMap::from([("workflow_id".to_string(), json!(workflow_id))]),
                description: format!("Delete workflow: {name}"),
            }],
            error: None,
        })
    }
}

/// `WORKFLOW_ENABLE`: flip a workflow's enabled flag. Always HIGH risk.
pub struct WorkflowEnableTool {
    store: EntityStore,
}

impl WorkflowEnableTool {
    /// Build the tool backed by a shared workflow store.
    pub fn new(store: EntityStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for WorkflowEnableTool {
    fn name(&self) -> &str {
        "WORKFLOW_ENABLE"
    }
    fn risk_level(&self) -> RiskLevel {
        RiskLevel::High
    }
    fn description(&self) -> &str {
        "Enable or disable a workflow"
    }

    async fn execute(&self, args: &BTreeMap<String, Value>) -> Result<ToolResult, String> {
        let Some(workflow_id) = opt_str_field(args, "workflow_id") else {
            return Ok(ToolResult::fail("workflow_id is required"));
        };
        let enabled = args.get("enabled").and_then(Value::as_bool).unwrap_or(true);

        let Some(before) = self.store.get(&workflow_id).await else {
            return Ok(ToolResult::fail(format!("Workflow not found: {workflow_id}")));
        };

        let now = now_iso();
        let after = self
            .store
            .update(&workflow_id, |workflow| {
                if let Value::Object(map) = workflow {
                    map.insert("enabled".to_string(), json!(enabled));
                    map.insert("updated_at".to_string(), json!(now));
                }
            })
            .await
            .expect("workflow existed a moment ago");

        Ok(ToolResult {
            success: true,
            data: json!({"workflow_id": workflow_id, "enabled": enabled, "next_run": Value::Null}),
            changes: vec![Change {
                entity_type: EntityType::Workflow,
                entity_id: workflow_id.clone(),
                action: ChangeAction::Updated,
                before: Some(before),
                after: Some(after),
            }],
            undo_steps: vec![UndoStep {
                tool_name: "WORKFLOW_ENABLE".to_string(),
                args: BTreeMap::from([("workflow_id".to_string(), json!(workflow_id)), ("enabled".to_string(), json!(!enabled))]),
                description: if enabled { "Disable workflow".to_string() } else { "Enable workflow".to_string() },
            }],
            error: None,
        })
    }
}

/// `WORKFLOW_LIST`: list every saved workflow.
pub struct WorkflowListTool {
    store: EntityStore,
}

impl WorkflowListTool {
    /// Build the tool backed by a shared workflow store.
    pub fn new(store: EntityStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for WorkflowListTool {
    fn name(&self) -> &str {
        "WORKFLOW_LIST"
    }
    fn risk_level(&self) -> RiskLevel {
        RiskLevel::Low
    }
    fn description(&self) -> &str {
        "List all saved workflows"
    }

    async fn execute(&self, _args: &BTreeMap<String, Value>) -> Result<ToolResult, String> {
        let workflows = self.store.values().await;
        let total = workflows.len();
        Ok(ToolResult::ok(json!({"workflows": workflows, "total": total})))
    }
}

/// `WORKFLOW_DELETE`: remove a workflow.
pub struct WorkflowDeleteTool {
    store: EntityStore,
}

impl WorkflowDeleteTool {
    /// Build the tool backed by a shared workflow store.
    pub fn new(store: EntityStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for WorkflowDeleteTool {
    fn name(&self) -> &str {
        "WORKFLOW_DELETE"
    }
    fn risk_level(&self) -> RiskLevel {
        RiskLevel::Medium
    }
    fn description(&self) -> &str {
        "Delete a workflow by its ID"
    }

    async fn execute(&self, args: &BTreeMap<String, Value>) -> Result<ToolResult, String> {
        let Some(workflow_id) = opt_str_field(args, "workflow_id") else {
            return Ok(ToolResult::fail("workflow_id is required"));
        };

        let Some(workflow) = self.store.remove(&workflow_id).await else {
            return Ok(ToolResult::fail(format!("Workflow not found: {workflow_id}")));
        };

        Ok(ToolResult {
            success: true,
            data: json!({"workflow_id": workflow_id, "deleted": true}),
            changes: vec![Change {
                entity_type: EntityType::Workflow,
                entity_id: workflow_id,
                action: ChangeAction::Deleted,
                before: Some(workflow),
                after: None,
            }],
            undo_steps: Vec::new(),
            error: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[tokio::test]
    async fn saved_workflow_starts_disabled() {
        let store = EntityStore::new();
        let save = WorkflowSaveTool::new(store);
        let result = save
            .execute(&args(&[("name", json!("Morning digest")), ("trigger", json!({"type": "cron"})), ("actions", json!([]))]))
            .await
            .unwrap();
        assert_eq!(result.data["enabled"], false);
    }

    #[tokio::test]
    async fn enable_then_undo_disables_again() {
        let store = EntityStore::new();
        let save = WorkflowSaveTool::new(store.clone());
        let saved = save.execute(&args(&[("name", json!("Test")), ("trigger", json!({})), ("actions", json!([]))])).await.unwrap();
        let workflow_id = saved.data["workflow_id"].as_str().unwrap().to_string();

        let enable = WorkflowEnableTool::new(store);
        let result = enable.execute(&args(&[("workflow_id", json!(workflow_id)), ("enabled", json!(true))])).await.unwrap();
        assert_eq!(result.data["enabled"], true);
        let undo = result.undo_steps[0].clone();
        assert_eq!(undo.args["enabled"], false);
    }

    #[tokio::test]
    async fn delete_missing_workflow_fails() {
        let store = EntityStore::new();
        let delete = WorkflowDeleteTool::new(store);
        let result = delete.execute(&args(&[("workflow_id", json!("wf_missing"))])).await.unwrap();
        assert!(!result.success);
    }
}
