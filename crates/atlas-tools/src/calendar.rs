// SPDX-License-Identifier: MIT OR Apache-2.0
use crate::base::{Tool, ToolResult};
use crate::store::{gen_id, now_iso, opt_str_field, str_field, EntityStore};
use async_trait::async_trait;
use atlas_core::{Change, ChangeAction, EntityType, RiskLevel, UndoStep};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

const WORK_START: &str = "09:00";
const WORK_END: &str = "17:00";
const ALLOWED_UPDATE_FIELDS: &[&str] = &["title", "start", "end", "type"];

fn today() -> String {
    chrono::Utc::now().format("%Y-%m-%d").to_string()
}

fn updates_map(args: &BTreeMap<String, Value>) -> Map<String, Value> {
    match args.get("updates") {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    }
}

/// `CALENDAR_GET_DAY`: list a day's blocks and the free slots between them.
pub struct CalendarGetDayTool {
    store: EntityStore,
}

impl CalendarGetDayTool {
    /// Build the tool backed by a shared calendar block store.
    pub fn new(store: EntityStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for CalendarGetDayTool {
    fn name(&self) -> &str {
        "CALENDAR_GET_DAY"
    }
    fn risk_level(&self) -> RiskLevel {
        RiskLevel::Low
    }
    fn description(&self) -> &str {
        "Get all calendar blocks and free slots for a given date"
    }

    async fn execute(&self, args: &BTreeMap<String, Value>) -> Result<ToolResult, String> {
        let date = str_field(args, "date", &today());

        let mut blocks: Vec<Value> = self
            .store
            .values()
            .await
            .into_iter()
            .filter(|b| b["date"].as_str() == Some(date.as_str()))
            .collect();
        blocks.sort_by(|a, b| a["start"].as_str().cmp(&b["start"].as_str()));

        let free_slots = free_slots(&blocks);

        Ok(ToolResult::ok(json!({
            "date": date,
            "blocks": blocks,
            "free_slots": free_slots,
        })))
    }
}

fn free_slots(blocks: &[Value]) -> Vec<Value> {
    let mut slots = Vec::new();
    if blocks.is_empty() {
        slots.push(json!({"start": WORK_START, "end": WORK_END}));
        return slots;
    }

    let start_of = |b: &Value| b["start"].as_str().unwrap_or_default().to_string();
    let end_of = |b: &Value| b["end"].as_str().unwrap_or_default().to_string();

    if start_of(&blocks[0]).as_str() > WORK_START {
        slots.push(json!({"start": WORK_START, "end": start_of(&blocks[0])}));
    }

    for pair in blocks.windows(2) {
        if end_of(&pair[0]) < start_of(&pair[1]) {
            slots.push(json!({"start": end_of(&pair[0]), "end": start_of(&pair[1])}));
        }
    }

    if end_of(blocks.last().unwrap()).as_str() < WORK_END {
        slots.push(json!({"start": end_of(blocks.last().unwrap()), "end": WORK_END}));
    }

    slots
}

/// `CALENDAR_CREATE_BLOCKS`: create one or more calendar blocks for a date.
pub struct CalendarCreateBlocksTool {
    store: EntityStore,
}

impl CalendarCreateBlocksTool {
    /// Build the tool backed by a shared calendar block store.
    pub fn new(store: EntityStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for CalendarCreateBlocksTool {
    fn name(&self) -> &str {
        "CALENDAR_CREATE_BLOCKS"
    }
    fn risk_level(&self) -> RiskLevel {
        RiskLevel::Medium
    }
    fn description(&self) -> &str {
        "Create one or more calendar blocks for a given date"
    }

    async fn execute(&self, args: &BTreeMap<String, Value>) -> Result<ToolResult, String> {
        let date = str_field(args, "date", &today());
        let Some(Value::Array(blocks_in)) = args.get("blocks") else {
            return Ok(ToolResult::fail("No blocks provided"));
        };
        if blocks_in.is_empty() {
            return Ok(ToolResult::fail("No blocks provided"));
        }

        let mut created = Vec::new();
        let mut changes = Vec::new();
        let mut undo_steps = Vec::new();

        for block_data in blocks_in {
            let block_id = gen_id("block");
            let title = block_data.get("title").and_then(Value::as_str).unwrap_or("Untitled").to_string();
            let start = block_data.get("start").and_then(Value::as_str).unwrap_or("09:00").to_string();
            let end = block_data.get("end").and_then(Value::as_str).unwrap_or("10:00").to_string();
            let block_type = block_data.get("type").and_then(Value::as_str).unwrap_or("task").to_string();

            let block = json!({
                "block_id": block_id,
                "date": date,
                "title": title,
                "start": start,
                "end": end,
                "type": block_type,
                "created_at": now_iso(),
            });

            self.store.insert(block_id.clone(), block.clone()).await;
            changes.push(Change {
                entity_type: EntityType::CalendarBlock,
                entity_id: block_id.clone(),
                action: ChangeAction::Created,
                before: None,
                after: Some(block.clone()),
            });
            undo_steps.push(UndoStep {
                tool_name: "CALENDAR_DELETE_BLOCKS".to_string(),
                args: BTreeMap::from([("block_ids".to_string(), json!([block_id.clone()]))]),
                description: format!("Delete calendar block: {title}"),
            });
            created.push(block);
        }

        Ok(ToolResult {
            success: true,
            data: json!({"created": created}),
            changes,
            undo_steps,
            error: None,
        })
    }
}

/// `CALENDAR_DELETE_BLOCKS`: delete one or more calendar blocks by id.
pub struct CalendarDeleteBlocksTool {
    store: EntityStore,
}

impl CalendarDeleteBlocksTool {
    /// Build the tool backed by a shared calendar block store.
    pub fn new(store: EntityStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for CalendarDeleteBlocksTool {
    fn name(&self) -> &str {
        "CALENDAR_DELETE_BLOCKS"
    }
    fn risk_level(&self) -> RiskLevel {
        RiskLevel::Medium
    }
    fn description(&self) -> &str {
        "Delete one or more calendar blocks by their IDs"
    }

    async fn execute(&self, args: &BTreeMap<String, Value>) -> Result<ToolResult, String> {
        let block_ids: Vec<String> = args
            .get("block_ids")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();

        if block_ids.is_empty() {
            return Ok(ToolResult::fail("No block_ids provided"));
        }

        let mut deleted_blocks = Vec::new();
        let mut not_found = Vec::new();
        let mut changes = Vec::new();
        let mut undo_steps = Vec::new();

        for block_id in &block_ids {
            match self.store.remove(block_id).await {
                Some(block) => {
                    changes.push(Change {
                        entity_type: EntityType::CalendarBlock,
                        entity_id: block_id.clone(),
                        action: ChangeAction::Deleted,
                        before: Some(block.clone()),
                        after: None,
                    });
                    let restore_block = json!({"title": block["title"], "start": block["start"], "end": block["end"], "type": block["type"]});
                    undo_steps.push(UndoStep {
                        tool_name: "CALENDAR_CREATE_BLOCKS".to_string(),
                        args: BTreeMap::from([
                            ("date".to_string(), block["date"].clone()),
                            ("blocks".to_string(), json!([restore_block])),
                        ]),
                        description: format!("Restore calendar block: {}", block["title"].as_str().unwrap_or("Untitled")),
                    });
                    deleted_blocks.push(block);
                }
                None => not_found.push(block_id.clone()),
            }
        }

        if deleted_blocks.is_empty() {
            return Ok(ToolResult::fail(format!("No blocks found: {not_found:?}")));
        }

        let deleted_ids: Vec<Value> = deleted_blocks.iter().map(|b| b["block_id"].clone()).collect();

        Ok(ToolResult {
            success: true,
            data: json!({"deleted": deleted_ids, "deleted_data": deleted_blocks, "not_found": not_found}),
            changes,
            undo_steps,
            error: None,
        })
    }
}

/// `CALENDAR_UPDATE_BLOCK`: apply an allow-listed set of field updates to a block.
pub struct CalendarUpdateBlockTool {
    store: EntityStore,
}

impl CalendarUpdateBlockTool {
    /// Build the tool backed by a shared calendar block store.
    pub fn new(store: EntityStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for CalendarUpdateBlockTool {
    fn name(&self) -> &str {
        "CALENDAR_UPDATE_BLOCK"
    }
    fn risk_level(&self) -> RiskLevel {
        RiskLevel::Medium
    }
    fn description(&self) -> &str {
        "Update a calendar block's properties"
    }

    async fn execute(&self, args: &BTreeMap<String, Value>) -> Result<ToolResult, String> {
        let Some(block_id) = opt_str_field(args, "block_id") else {
            return Ok(ToolResult::fail("block_id is required"));
        };
        let updates = updates_map(args);

        let Some(before) = self.store.get(&block_id).await else {
            return Ok(ToolResult::fail(format!("Block not found: {block_id}")));
        };

        let after = self
            .store
            .update(&block_id, |block| {
                if let Value::Object(map) = block {
                    for (key, value) in &updates {
                        if ALLOWED_UPDATE_FIELDS.contains(&key.as_str()) {
                            map.insert(key.clone(), value.clone());
                        }
                    }
                }
            })
            .await
            .expect("block existed a moment ago");

        let before_subset: Map<String, Value> = updates.keys().map(|k| (k.clone(), before.get(k).cloned().unwrap_or(Value::Null))).collect();
        let after_subset: Map<String, Value> = updates.keys().map(|k| (k.clone(), after.get(k).cloned().unwrap_or(Value::Null))).collect();

        Ok(ToolResult {
            success: true,
            data: json!({"block_id": block_id, "before": before_subset, "after": after_subset}),
            changes: vec![Change {
                entity_type: EntityType::CalendarBlock,
                entity_id: block_id.clone(),
                action: ChangeAction::Updated,
                before: Some(before),
                after: Some(after),
            }],
            undo_steps: vec![UndoStep {
                tool_name: "CALENDAR_UPDATE_BLOCK".to_string(),
                args: BTreeMap::from([("block_id".to_string(), json!(block_id)), ("updates".to_string(), Value::Object(before_subset))]),
                description: "Restore calendar block to previous state".to_string(),
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
    async fn empty_day_has_one_free_slot() {
        let store = EntityStore::new();
        let tool = CalendarGetDayTool::new(store);
        let result = tool.execute(&args(&[("date", json!("2026-07-28"))])).await.unwrap();
        let slots = result.data["free_slots"].as_array().unwrap();
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0]["start"], "09:00");
        assert_eq!(slots[0]["end"], "17:00");
    }

    #[tokio::test]
    async fn blocks_produce_gaps_before_between_and_after() {
        let store = EntityStore::new();
        let create = CalendarCreateBlocksTool::new(store.clone());
        create
            .execute(&args(&[
                ("date", json!("2026-07-28")),
                (
                    "blocks",
                    json!([
                        {"title": "Standup", "start": "10:00", "end": "10:30"},
                        {"title": "Review", "start": "13:00", "end": "14:00"},
                    ]),
                ),
            ]))
            .await
            .unwrap();

        let get = CalendarGetDayTool::new(store);
        let result = get.execute(&args(&[("date", json!("2026-07-28"))])).await.unwrap();
        let slots = result.data["free_slots"].as_array().unwrap();
        assert_eq!(slots.len(), 3);
        assert_eq!(slots[0]["end"], "10:00");
        assert_eq!(slots[1]["start"], "10:30");
        assert_eq!(slots[1]["end"], "13:00");
        assert_eq!(slots[2]["start"], "14:00");
    }

    #[tokio::test]
    async fn delete_then_undo_recreates_via_create_blocks() {
        let store = EntityStore::new();
        let create = CalendarCreateBlocksTool::new(store.clone());
        let created = create
            .execute(&args(&[("date", json!("2026-07-28")), ("blocks", json!([{"title": "Focus", "start": "09:00", "end": "11:00"}]))]))
            .await
            .unwrap();
        let block_id = created.changes[0].entity_id.clone();

        let delete = CalendarDeleteBlocksTool::new(store);
        let result = delete.execute(&args(&[("block_ids", json!([block_id]))])).await.unwrap();
        assert_eq!(result.undo_steps.len(), result.changes.len());
        let undo = result.undo_steps[0].clone();
        assert_eq!(undo.tool_name, "CALENDAR_CREATE_BLOCKS");
    }

    #[tokio::test]
    async fn create_multiple_blocks_yields_one_undo_step_per_block() {
        let store = EntityStore::new();
        let create = CalendarCreateBlocksTool::new(store.clone());
        let result = create
            .execute(&args(&[
                ("date", json!("2026-07-28")),
                (
                    "blocks",
                    json!([
                        {"title": "Standup", "start": "10:00", "end": "10:30"},
                        {"title": "Review", "start": "13:00", "end": "14:00"},
                        {"title": "Focus", "start": "15:00", "end": "16:00"},
                    ]),
                ),
            ]))
            .await
            .unwrap();

        assert_eq!(result.changes.len(), 3);
        assert_eq!(result.undo_steps.len(), 3);
        for undo in &result.undo_steps {
            assert_eq!(undo.tool_name, "CALENDAR_DELETE_BLOCKS");
            let ids = undo.args["block_ids"].as_array().unwrap();
            assert_eq!(ids.len(), 1);
        }

        let block_ids: Vec<String> = result.changes.iter().map(|c| c.entity_id.clone()).collect();
        let delete = CalendarDeleteBlocksTool::new(store);
        let deleted = delete.execute(&args(&[("block_ids", json!(block_ids))])).await.unwrap();
        assert_eq!(deleted.changes.len(), 3);
        assert_eq!(deleted.undo_steps.len(), 3);
        for undo in &deleted.undo_steps {
            assert_eq!(undo.tool_name, "CALENDAR_CREATE_BLOCKS");
            let blocks = undo.args["blocks"].as_array().unwrap();
            assert_eq!(blocks.len(), 1);
        }
    }
}
