// SPDX-License-Identifier: MIT OR Apache-2.0
use crate::base::{Tool, ToolResult};
use crate::store::{gen_id, now_iso, opt_str_field, str_array_field, str_field, usize_field, EntityStore};
use async_trait::async_trait;
use atlas_core::{Change, ChangeAction, EntityType, RiskLevel, UndoStep};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

const ALLOWED_UPDATE_FIELDS: &[&str] = &["title", "content", "tags"];

fn updates_map(args: &BTreeMap<String, Value>) -> Map<String, Value> {
    match args.get("updates") {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    }
}

/// `NOTE_CREATE`: create a new note.
pub struct NoteCreateTool {
    store: EntityStore,
}

impl NoteCreateTool {
    /// Build the tool backed by a shared note store.
    pub fn new(store: EntityStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for NoteCreateTool {
    fn name(&self) -> &str {
        "NOTE_CREATE"
    }
    fn risk_level(&self) -> RiskLevel {
        RiskLevel::Low
    }
    fn description(&self) -> &str {
        "Create a new note with title, content, and tags"
    }

    async fn execute(&self, args: &BTreeMap<String, Value>) -> Result<ToolResult, String> {
        let title = str_field(args, "title", "Untitled Note");
        let content = str_field(args, "content", "");
        let tags = str_array_field(args, "tags");

        let note_id = gen_id("note");
        let now = now_iso();

        let note = json!({
            "note_id": note_id,
            "title": title,
            "content": content,
            "tags": tags,
            "created_at": now,
            "updated_at": now,
        });

        self.store.insert(note_id.clone(), note.clone()).await;

        Ok(ToolResult {
            success: true,
            data: json!({"note_id": note_id, "created_at": now}),
            changes: vec![Change {
                entity_type: EntityType::Note,
                entity_id: note_id.clone(),
                action: ChangeAction::Created,
                before: None,
                after: Some(note),
            }],
            undo_steps: vec![UndoStep {
                tool_name: "NOTE_DELETE".to_string(),
                args: BTreeMap::from([("note_id".to_string(), json!(note_id))]),
                description: format!("Delete note: {title}"),
            }],
            error: None,
        })
    }
}

/// `NOTE_SEARCH`: relevance-ranked search over stored notes by query and/or tags.
pub struct NoteSearchTool {
    store: EntityStore,
}

impl NoteSearchTool {
    /// Build the tool backed by a shared note store.
    pub fn new(store: EntityStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for NoteSearchTool {
    fn name(&self) -> &str {
        "NOTE_SEARCH"
    }
    fn risk_level(&self) -> RiskLevel {
        RiskLevel::Low
    }
    fn description(&self) -> &str {
        "Search notes by query string or tags"
    }

    async fn execute(&self, args: &BTreeMap<String, Value>) -> Result<ToolResult, String> {
        let query = str_field(args, "query", "");
        let tags = str_array_field(args, "tags");
        let limit = usize_field(args, "limit", 20);
        let query_lower = query.to_lowercase();

        let mut results: Vec<Value> = Vec::new();
        for note in self.store.values().await {
            let mut relevance = 0.0_f64;
            let title = note["title"].as_str().unwrap_or_default().to_lowercase();
            let content = note["content"].as_str().unwrap_or_default().to_lowercase();

            if !query_lower.is_empty() && title.contains(&query_lower) {
                relevance += 0.5;
            }
            if !query_lower.is_empty() && content.contains(&query_lower) {
                relevance += 0.3;
            }
            if !tags.is_empty() {
                let note_tags: Vec<String> = note["tags"]
                    .as_array()
                    .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                    .unwrap_or_default();
                let matching = tags.iter().filter(|t| note_tags.contains(t)).count();
                if matching > 0 {
                    relevance += 0.2 * matching as f64;
                }
            }
            if query.is_empty() && tags.is_empty() {
                relevance = 0.5;
            }

            if relevance > 0.0 {
                let content_full = note["content"].as_str().unwrap_or_default();
                let snippet = if content_full.chars().count() > 200 {
                    format!("{}...", content_full.chars().take(200).collect::<String>())
                } else {
                    content_full.to_string()
                };

                results.push(json!({
                    "note_id": note["note_id"],
                    "title": note["title"],
                    "snippet": snippet,
                    "tags": note["tags"],
                    "relevance": (relevance * 100.0).round() / 100.0,
                    "created_at": note["created_at"],
                }));
            }
        }

        results.sort_by(|a, b| {
            b["relevance"].as_f64().unwrap_or(0.0).partial_cmp(&a["relevance"].as_f64().unwrap_or(0.0)).unwrap()
        });
        results.truncate(limit);

        let total = results.len();
        Ok(ToolResult::ok(json!({"notes": results, "total": total})))
    }
}

/// `NOTE_GET`: fetch a single note by id.
pub struct NoteGetTool {
    store: EntityStore,
}

impl NoteGetTool {
    /// Build the tool backed by a shared note store.
    pub fn new(store: EntityStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for NoteGetTool {
    fn name(&self) -> &str {
        "NOTE_GET"
    }
    fn risk_level(&self) -> RiskLevel {
        RiskLevel::Low
    }
    fn description(&self) -> &str {
        "Get the full content of a note by its ID"
    }

    async fn execute(&self, args: &BTreeMap<String, Value>) -> Result<ToolResult, String> {
        let Some(note_id) = opt_str_field(args, "note_id") else {
            return Ok(ToolResult::fail("note_id is required"));
        };

        match self.store.get(&note_id).await {
            Some(note) => Ok(ToolResult::ok(json!({"note": note}))),
            None => Ok(ToolResult::fail(format!("Note not found: {note_id}"))),
        }
    }
}

/// `NOTE_UPDATE`: apply an allow-listed set of field updates to a note.
pub struct NoteUpdateTool {
    store: EntityStore,
}

impl NoteUpdateTool {
    /// Build the tool backed by a shared note store.
    pub fn new(store: EntityStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for NoteUpdateTool {
    fn name(&self) -> &str {
        "NOTE_UPDATE"
    }
    fn risk_level(&self) -> RiskLevel {
        RiskLevel::Low
    }
    fn description(&self) -> &str {
        "Update a note's title, content, or tags"
    }

    async fn execute(&self, args: &BTreeMap<String, Value>) -> Result<ToolResult, String> {
        let Some(note_id) = opt_str_field(args, "note_id") else {
            return Ok(ToolResult::fail("note_id is required"));
        };
        let updates = updates_map(args);

        let Some(before) = self.store.get(&note_id).await else {
            return Ok(ToolResult::fail(format!("Note not found: {note_id}")));
        };

        let now = now_iso();
        let after = self
            .store
            .update(&note_id, |note| {
                if let Value::Object(map) = note {
                    for (key, value) in &updates {
                        if ALLOWED_UPDATE_FIELDS.contains(&key.as_str()) {
                            map.insert(key.clone(), value.clone());
                        }
                    }
                    map.insert("updated_at".to_string(), json!(now));
                }
            })
            .await
            .expect("note existed a moment ago");

        let before_subset: Map<String, Value> = updates.keys().map(|k| (k.clone(), before.get(k).cloned().unwrap_or(Value::Null))).collect();
        let after_subset: Map<String, Value> = updates.keys().map(|k| (k.clone(), after.get(k).cloned().unwrap_or(Value::Null))).collect();

        Ok(ToolResult {
            success: true,
            data: json!({"note_id": note_id, "before": before_subset, "after": after_subset}),
            changes: vec![Change {
                entity_type: EntityType::Note,
                entity_id: note_id.clone(),
                action: ChangeAction::Updated,
                before: Some(before),
                after: Some(after),
            }],
            undo_steps: vec![UndoStep {
                tool_name: "NOTE_UPDATE".to_string(),
                args: BTreeMap::from([("note_id".to_string(), json!(note_id)), ("updates".to_string(), Value::Object(before_subset))]),
                description: "Restore note to previous state".to_string(),
            }],
            error: None,
        })
    }
}

/// `NOTE_DELETE`: remove a note.
pub struct NoteDeleteTool {
    store: EntityStore,
}

impl NoteDeleteTool {
    /// Build the tool backed by a shared note store.
    pub fn new(store: EntityStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for NoteDeleteTool {
    fn name(&self) -> &str {
        "NOTE_DELETE"
    }
    fn risk_level(&self) -> RiskLevel {
        RiskLevel::Low
    }
    fn description(&self) -> &str {
        "Delete a note by its ID"
    }

    async fn execute(&self, args: &BTreeMap<String, Value>) -> Result<ToolResult, String> {
        let Some(note_id) = opt_str_field(args, "note_id") else {
            return Ok(ToolResult::fail("note_id is required"));
        };

        let Some(note) = self.store.remove(&note_id).await else {
            return Ok(ToolResult::fail(format!("Note not found: {note_id}")));
        };

        let title = note["title"].as_str().unwrap_or_default().to_string();
        let undo_args = BTreeMap::from([
            ("title".to_string(), note["title"].clone()),
            ("content".to_string(), note.get("content").cloned().unwrap_or(json!(""))),
            ("tags".to_string(), note.get("tags").cloned().unwrap_or(json!([]))),
        ]);

        Ok(ToolResult {
            success: true,
            data: json!({"note_id": note_id, "deleted": true}),
            changes: vec![Change {
                entity_type: EntityType::Note,
                entity_id: note_id,
                action: ChangeAction::Deleted,
                before: Some(note),
                after: None,
            }],
            undo_steps: vec![UndoStep {
                tool_name: "NOTE_CREATE".to_string(),
                args: undo_args,
                description: format!("Restore deleted note: {title}"),
            }],
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
    async fn create_then_get_round_trips() {
        let store = EntityStore::new();
        let create = NoteCreateTool::new(store.clone());
        let result = create.execute(&args(&[("title", json!("Standup")), ("content", json!("discussed roadmap"))])).await.unwrap();
        assert!(result.success);
        let note_id = result.data["note_id"].as_str().unwrap().to_string();

        let get = NoteGetTool::new(store);
        let fetched = get.execute(&args(&[("note_id", json!(note_id))])).await.unwrap();
        assert_eq!(fetched.data["note"]["title"], "Standup");
    }

    #[tokio::test]
    async fn search_scores_title_match_higher_than_no_match() {
        let store = EntityStore::new();
        let create = NoteCreateTool::new(store.clone());
        create.execute(&args(&[("title", json!("Roadmap review")), ("content", json!("q3 planning"))])).await.unwrap();
        create.execute(&args(&[("title", json!("Unrelated")), ("content", json!("something else"))])).await.unwrap();

        let search = NoteSearchTool::new(store);
        let result = search.execute(&args(&[("query", json!("roadmap"))])).await.unwrap();
        let notes = result.data["notes"].as_array().unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0]["title"], "Roadmap review");
    }

    #[tokio::test]
    async fn empty_query_and_tags_returns_everything() {
        let store = EntityStore::new();
        let create = NoteCreateTool::new(store.clone());
        create.execute(&args(&[("title", json!("A"))])).await.unwrap();
        create.execute(&args(&[("title", json!("B"))])).await.unwrap();

        let search = NoteSearchTool::new(store);
        let result = search.execute(&BTreeMap::new()).await.unwrap();
        assert_eq!(result.data["total"], 2);
    }

    #[tokio::test]
    async fn delete_produces_reconstruction_undo() {
        let store = EntityStore::new();
        let create = NoteCreateTool::new(store.clone());
        let created = create.execute(&args(&[("title", json!("Gone")), ("content", json!("bye"))])).await.unwrap();
        let note_id = created.data["note_id"].as_str().unwrap().to_string();

        let delete = NoteDeleteTool::new(store);
        let result = delete.execute(&args(&[("note_id", json!(note_id))])).await.unwrap();
        let undo = result.undo_steps[0].clone();
        assert_eq!(undo.tool_name, "NOTE_CREATE");
        assert_eq!(undo.args["content"], "bye");
    }
}
