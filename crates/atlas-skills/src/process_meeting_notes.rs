// SPDX-License-Identifier: MIT OR Apache-2.0
use crate::base::{Skill, SkillContext, SkillResult};
use async_trait::async_trait;
use atlas_core::{IntentType, RiskLevel};
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::BTreeMap;

const INTENTS: [IntentType; 1] = [IntentType::ProcessMeetingNotes];
const MAX_ACTION_ITEMS: usize = 10;
const TITLE_MAX_CHARS: usize = 100;

const ACTION_KEYWORDS: [&str; 10] =
    ["action:", "todo:", "task:", "follow up:", "- [ ]", "[] ", "action item:", "need to", "should", "will"];
const ACTION_VERBS: [&str; 8] = ["schedule", "send", "follow", "review", "update", "create", "prepare", "contact"];
const STRIP_PREFIXES: [&str; 8] = ["- [ ]", "[] ", "-", "*", "\u{2022}", "action:", "todo:", "task:"];

/// `PROCESS_MEETING_NOTES`: save meeting content as a note and extract action items into tasks.
#[derive(Default)]
pub struct ProcessMeetingNotesSkill;

#[async_trait]
impl Skill for ProcessMeetingNotesSkill {
    fn name(&self) -> &str {
        "process_meeting_notes"
    }
    fn intent_types(&self) -> &[IntentType] {
        &INTENTS
    }
    fn risk_level(&self) -> RiskLevel {
        RiskLevel::Medium
    }
    fn description(&self) -> &str {
        "Extract tasks and follow-ups from meeting notes"
    }

    async fn execute(&self, context: SkillContext<'_>) -> SkillResult {
        let mut result = SkillResult::new();
        let params = &context.intent.parameters;

        let mut content = params
            .get("content")
            .and_then(Value::as_str)
            .or_else(|| params.get("notes").and_then(Value::as_str))
            .unwrap_or("")
            .to_string();
        if content.is_empty() && !context.intent.raw_entities.is_empty() {
            content = context.intent.raw_entities.join("\n");
        }

        let meeting_date = params.get("meeting_date").and_then(Value::as_str).map(str::to_string).unwrap_or_else(|| Utc::now().format("%Y-%m-%d").to_string());
        let attendees: Vec<String> = params
            .get("attendees")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        let title = params.get("title").and_then(Value::as_str).map(str::to_string).unwrap_or_else(|| format!("Meeting Notes - {meeting_date}"));

        let mut tags = vec!["meeting".to_string()];
        tags.extend(attendees.iter().take(3).map(|a| format!("attendee:{a}")));

        let mut note_args = BTreeMap::new();
        note_args.insert("title".to_string(), json!(title));
        note_args.insert("content".to_string(), json!(content));
        note_args.insert("tags".to_string(), json!(tags));
        let (note_call, note_result) = context.tools.execute("NOTE_CREATE", note_args, true).await;
        result.tool_calls.push(note_call);

        let mut note_id: Value = Value::Null;
        if let Some(note_result) = note_result.filter(|r| r.success) {
            note_id = note_result.data.get("note_id").cloned().unwrap_or(Value::Null);
            result.changes.extend(note_result.changes);
            result.undo_steps.extend(note_result.undo_steps);
        }

        let action_items = extract_action_items(&content);

        let mut task_ids = Vec::new();
        for item in &action_items {
            let mut args = BTreeMap::new();
            args.insert("title".to_string(), json!(item.title));
            args.insert("description".to_string(), json!(format!("From meeting: {title}")));
            args.insert("priority".to_string(), json!(item.priority));
            args.insert("tags".to_string(), json!(["meeting", "action-item"]));
            let (task_call, task_result) = context.tools.execute("TASK_CREATE", args, true).await;
            result.tool_calls.push(task_call);

            if let Some(task_result) = task_result.filter(|r| r.success) {
                task_ids.push(task_result.data.get("task_id").cloned().unwrap_or(Value::Null));
                result.changes.extend(task_result.changes);
                result.undo_steps.extend(task_result.undo_steps);
            }
        }

        result.data.insert("note_id".to_string(), note_id);
        result.data.insert("meeting_date".to_string(), json!(meeting_date));
        result.data.insert("action_items_found".to_string(), json!(action_items.len()));
        result.data.insert("tasks_created".to_string(), json!(task_ids.len()));
        result.data.insert("task_ids".to_string(), json!(task_ids));
        result.data.insert("attendees".to_string(), json!(attendees));

        result
    }
}

struct ActionItem {
    title: String,
    priority: String,
}

fn extract_action_items(content: &str) -> Vec<ActionItem> {
    let mut items = Vec::new();

    for line in content.lines() {
        let line_lower = line.to_lowercase();
        let trimmed_lower = line_lower.trim();
        if trimmed_lower.is_empty() {
            continue;
        }

        let mut is_action = ACTION_KEYWORDS.iter().any(|k| trimmed_lower.contains(k));

        if !is_action && (trimmed_lower.starts_with('-') || trimmed_lower.starts_with('*') || trimmed_lower.starts_with('\u{2022}')) {
            is_action = ACTION_VERBS.iter().any(|v| trimmed_lower.contains(v));
        }

        if !is_action {
            continue;
        }

        let mut title = line.trim().to_string();
        for prefix in STRIP_PREFIXES {
            if title.to_lowercase().starts_with(prefix) {
                title = title[prefix.len()..].trim().to_string();
                break;
            }
        }

        if !title.is_empty() {
            let truncated: String = title.chars().take(TITLE_MAX_CHARS).collect();
            items.push(ActionItem { title: truncated, priority: "medium".to_string() });
        }

        if items.len() >= MAX_ACTION_ITEMS {
            break;
        }
    }

    items.truncate(MAX_ACTION_ITEMS);
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use atlas_core::Intent;
    use atlas_tools::ToolRegistry;
    use std::sync::Arc;

    async fn registry() -> Arc<ToolRegistry> {
        let stores = atlas_tools::EntityStores::new();
        Arc::new(atlas_tools::build_default_registry(&stores).await)
    }

    #[tokio::test]
    async fn creates_note_and_tasks_for_action_items() {
        let tools = registry().await;
        let mut params = BTreeMap::new();
        params.insert("content".to_string(), json!("Discussed roadmap.\n- need to send follow up email\nTODO: schedule next sync"));
        let intent = Intent::new(IntentType::ProcessMeetingNotes, 0.9, params, Vec::new());
        let result = ProcessMeetingNotesSkill.execute(SkillContext::new(&intent, tools)).await;
        assert!(result.success);
        assert!(result.data["note_id"].is_string());
        assert_eq!(result.data["action_items_found"], 2);
        assert_eq!(result.data["tasks_created"], 2);
    }

    #[test]
    fn extracts_bullet_with_action_verb() {
        let items = extract_action_items("- schedule a follow-up meeting");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "schedule a follow-up meeting");
    }

    #[test]
    fn caps_at_ten_action_items() {
        let content = (0..20).map(|i| format!("todo: item {i}")).collect::<Vec<_>>().join("\n");
        let items = extract_action_items(&content);
        assert_eq!(items.len(), MAX_ACTION_ITEMS);
    }
}
