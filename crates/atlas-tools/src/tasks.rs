// SPDX-License-Identifier: MIT OR Apache-2.0
use crate::base::{Tool, ToolResult};
use crate::store::{gen_id, now_iso, opt_str_field, str_array_field, str_field, usize_field, EntityStore};
use async_trait::async_trait;
use atlas_core::{Change, ChangeAction, EntityType, RiskLevel, UndoStep};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

const ALLOWED_UPDATE_FIELDS: &[&str] = &["title", "description", "due_date", "priority", "tags", "status"];

fn updates_map(args: &BTreeMap<String, Value>) -> Map<String, Value> {
    match args.get("updates") {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    }
}

/// `TASK_CREATE`: create a new task.
pub struct TaskCreateTool {
    store: EntityStore,
}

impl TaskCreateTool {
    /// Build the tool backed by a shared task store.
    pub fn new(store: EntityStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for TaskCreateTool {
    fn name(&self) -> &str {
        "TASK_CREATE"
    }
    fn risk_level(&self) -> RiskLevel {
        RiskLevel::Low
    }
    fn description(&self) -> &str {
        "Create a new task with title, description, due date, and priority"
    }

    async fn execute(&self, args: &BTreeMap<String, Value>) -> Result<ToolResult, String> {
        let title = str_field(args, "title", "Untitled Task");
        let description = str_field(args, "description", "");
        let due_date = opt_str_field(args, "due_date");
        let priority = str_field(args, "priority", "medium");
        let tags = str_array_field(args, "tags");

        let task_id = gen_id("task");
        let now = now_iso();

        let task = json!({
            "task_id": task_id,
            "title": title,
            "description": description,
            "due_date": due_date,
            "priority": priority,
            "tags": tags,
            "status": "pending",
            "created_at": now,
            "updated_at": now,
        });

        self.store.insert(task_id.clone(), task.clone()).await;

        Ok(ToolResult {
            success: true,
            data: json!({"task_id": task_id, "created_at": now}),
            changes: vec![Change {
                entity_type: EntityType::Task,
                entity_id: task_id.clone(),
                action: ChangeAction::Created,
                before: None,
                after: Some(task),
            }],
            undo_steps: vec![UndoStep {
                tool_name: "TASK_DELETE".to_string(),
                args: BTreeMap::from([("task_id".to_string(), json!(task_id))]),
                description: format!("Delete task: {title}"),
            }],
            error: None,
        })
    }
}

/// `TASK_LIST`: list tasks with optional status/date/tag filters.
pub struct TaskListTool {
    store: EntityStore,
}

impl TaskListTool {
    /// Build the tool backed by a shared task store.
    pub fn new(store: EntityStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for TaskListTool {
    fn name(&self) -> &str {
        "TASK_LIST"
    }
    fn risk_level(&self) -> RiskLevel {
        RiskLevel::Low
    }
    fn description(&self) -> &str {
        "List tasks with optional status, date, and tag filters"
    }

    async fn execute(&self, args: &BTreeMap<String, Value>) -> Result<ToolResult, String> {
        let status = opt_str_field(args, "status");
        let due_before = opt_str_field(args, "due_before");
        let tags = str_array_field(args, "tags");
        let limit = usize_field(args, "limit", 50);

        let mut tasks = self.store.values().await;

        if let Some(status) = &status {
            tasks.retain(|t| t["status"].as_str() == Some(status.as_str()));
        }
        if let Some(due_before) = &due_before {
            tasks.retain(|t| t["due_date"].as_str().map(|d| d <= due_before.as_str()).unwrap_or(false));
        }
        if !tags.is_empty() {
            tasks.retain(|t| {
                t["tags"]
                    .as_array()
                    .map(|arr| arr.iter().any(|v| v.as_str().map(|s| tags.iter().any(|tag| tag == s)).unwrap_or(false)))
                    .unwrap_or(false)
            });
        }

        tasks.sort_by(|a, b| b["created_at"].as_str().cmp(&a["created_at"].as_str()));
        tasks.truncate(limit);

        let total = tasks.len();
        Ok(ToolResult::ok(json!({"tasks": tasks, "total": total})))
    }
}

/// `TASK_GET`: fetch a single task by id.
pub struct TaskGetTool {
    store: EntityStore,
}

impl TaskGetTool {
    /// Build the tool backed by a shared task store.
    pub fn new(store: EntityStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for TaskGetTool {
    fn name(&self) -> &str {
        "TASK_GET"
    }
    fn risk_level(&self) -> RiskLevel {
        RiskLevel::Low
    }
    fn description(&self) -> &str {
        "Get a specific task by its ID"
    }

    async fn execute(&self, args: &BTreeMap<String, Value>) -> Result<ToolResult, String> {
        let Some(task_id) = opt_str_field(args, "task_id") else {
            return Ok(ToolResult::fail("task_id is required"));
        };

        match self.store.get(&task_id).await {
            Some(task) => Ok(ToolResult::ok(json!({"task": task}))),
            None => Ok(ToolResult::fail(format!("Task not found: {task_id}"))),
        }
    }
}

/// `TASK_UPDATE`: apply an allow-listed set of field updates to a task.
pub struct TaskUpdateTool {
    store: EntityStore,
}

impl TaskUpdateTool {
    /// Build the tool backed by a shared task store.
    pub fn new(store: EntityStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for TaskUpdateTool {
    fn name(&self) -> &str {
        "TASK_UPDATE"
    }
    fn risk_level(&self) -> RiskLevel {
        RiskLevel::Low
    }
    fn description(&self) -> &str {
        "Update a task's properties (status, title, etc.)"
    }

    async fn execute(&self, args: &BTreeMap<String, Value>) -> Result<ToolResult, String> {
        let Some(task_id) = opt_str_field(args, "task_id") else {
            return Ok(ToolResult::fail("task_id is required"));
        };
        let updates = updates_map(args);

        let Some(before) = self.store.get(&task_id).await else {
            return Ok(ToolResult::fail(format!("Task not found: {task_id}")));
        };

        let now = now_iso();
        let after = self
            .store
            .update(&task_id, |task| {
                if let Value::Object(map) = task {
                    for (key, value) in &updates {
                        if ALLOWED_UPDATE_FIELDS.contains(&key.as_str()) {
                            map.insert(key.clone(), value.clone());
                        }
                    }
                    map.insert("updated_at".to_string(), json!(now));
                }
            })
            .await
            .expect("task existed a moment ago");

        let before_subset: Map<String, Value> = updates.keys().map(|k| (k.clone(), before.get(k).cloned().unwrap_or(Value::Null))).collect();
        let after_subset: Map<String, Value> = updates.keys().map(|k| (k.clone(), after.get(k).cloned().unwrap_or(Value::Null))).collect();

        Ok(ToolResult {
            success: true,
            data: json!({"task_id": task_id, "before": before_subset, "after": after_subset}),
            changes: vec![Change {
                entity_type: EntityType::Task,
                entity_id: task_id.clone(),
                action: ChangeAction::Updated,
                before: Some(before),
                after: Some(after),
            }],
            undo_steps: vec![UndoStep {
                tool_name: "TASK_UPDATE".to_string(),
                args: BTreeMap::from([("task_id".to_string(), json!(task_id)), ("updates".to_string(), Value::Object(before_subset))]),
                description: "Restore task to previous state".to_string(),
            }],
            error: None,
        })
    }
}

/// `TASK_DELETE`: remove a task.
pub struct TaskDeleteTool {
    store: EntityStore,
}

impl TaskDeleteTool {
    /// Build the tool backed by a shared task store.
    pub fn new(store: EntityStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for TaskDeleteTool {
    fn name(&self) -> &str {
        "TASK_DELETE"
    }
    fn risk_level(&self) -> RiskLevel {
        RiskLevel::Low
    }
    fn description(&self) -> &str {
        "Delete a task by its ID"
    }

    async fn execute(&self, args: &BTreeMap<String, Value>) -> Result<ToolResult, String> {
        let Some(task_id) = opt_str_field(args, "task_id") else {
            return Ok(ToolResult::fail("task_id is required"));
        };

        let Some(task) = self.store.remove(&task_id).await else {
            return Ok(ToolResult::fail(format!("Task not found: {task_id}")));
        };

        let title = task["title"].as_str().unwrap_or_default().to_string();
        let undo_args = BTreeMap::from([
            ("title".to_string(), task["title"].clone()),
            ("description".to_string(), task.get("description").cloned().unwrap_or(json!(""))),
            ("due_date".to_string(), task.get("due_date").cloned().unwrap_or(Value::Null)),
            ("priority".to_string(), task.get("priority").cloned().unwrap_or(json!("medium"))),
            ("tags".to_string(), task.get("tags").cloned().unwrap_or(json!([]))),
        ]);

        Ok(ToolResult {
            success: true,
            data: json!({"task_id": task_id, "deleted": true}),
            changes: vec![Change {
                entity_type: EntityType::Task,
                entity_id: task_id,
                action: ChangeAction::Deleted,
                before: Some(task),
                after: None,
            }],
            undo_steps: vec![UndoStep {
                tool_name: "TASK_CREATE".to_string(),
                args: undo_args,
                description: format!("Restore deleted task: {title}"),
            }],
            error: None,
        })
    }
}
