// SPDX-License-Identifier: MIT OR Apache-2.0
use crate::base::{Skill, SkillContext, SkillResult};
use async_trait::async_trait;
use atlas_core::{IntentType, RiskLevel, ToolCallStatus};
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::BTreeMap;

const INTENTS: [IntentType; 1] = [IntentType::PlanDay];
const MAX_TASKS_PER_DAY: usize = 5;

/// `PLAN_DAY`: generate a day plan with scheduled calendar blocks.
#[derive(Default)]
pub struct PlanDaySkill;

#[async_trait]
impl Skill for PlanDaySkill {
    fn name(&self) -> &str {
        "plan_day"
    }
    fn intent_types(&self) -> &[IntentType] {
        &INTENTS
    }
    fn risk_level(&self) -> RiskLevel {
        RiskLevel::Medium
    }
    fn description(&self) -> &str {
        "Generate a day plan with scheduled time blocks"
    }

    async fn execute(&self, context: SkillContext<'_>) -> SkillResult {
        let mut result = SkillResult::new();
        let params = &context.intent.parameters;

        let target_date = params.get("date").and_then(Value::as_str).map(str::to_string).unwrap_or_else(|| Utc::now().format("%Y-%m-%d").to_string());

        let mut cal_args = BTreeMap::new();
        cal_args.insert("date".to_string(), json!(target_date));
        let (cal_call, cal_result) = context.tools.execute("CALENDAR_GET_DAY", cal_args, true).await;
        result.tool_calls.push(cal_call);

        let mut existing_blocks: Vec<Value> = Vec::new();
        let mut free_slots: Vec<Value> = Vec::new();
        if let Some(cal_result) = cal_result.filter(|r| r.success) {
            existing_blocks = cal_result.data.get("blocks").and_then(Value::as_array).cloned().unwrap_or_default();
            free_slots = cal_result.data.get("free_slots").and_then(Value::as_array).cloned().unwrap_or_default();
        }

        let mut tasks_to_schedule: Vec<Value> = Vec::new();

        if let Some(Value::Array(task_ids)) = params.get("tasks_to_schedule") {
            for task_id in task_ids {
                let mut args = BTreeMap::new();
                args.insert("task_id".to_string(), task_id.clone());
                let (task_call, task_result) = context.tools.execute("TASK_GET", args, true).await;
                result.tool_calls.push(task_call);
                if let Some(task_result) = task_result.filter(|r| r.success) {
                    if let Some(task) = task_result.data.get("task") {
                        tasks_to_schedule.push(task.clone());
                    }
                }
            }
        }

        let mut list_args = BTreeMap::new();
        list_args.insert("status".to_string(), json!("pending"));
        list_args.insert("limit".to_string(), json!(10));
        let (list_call, list_result) = context.tools.execute("TASK_LIST", list_args, true).await;
        result.tool_calls.push(list_call);

        if let Some(list_result) = list_result.filter(|r| r.success) {
            if let Some(tasks) = list_result.data.get("tasks").and_then(Value::as_array) {
                for task in tasks {
                    if !tasks_to_schedule.contains(task) {
                        tasks_to_schedule.push(task.clone());
                    }
                }
            }
        }

        for (idx, entity) in context.intent.raw_entities.iter().enumerate() {
            tasks_to_schedule.push(json!({
                "task_id": format!("adhoc_{idx}"),
                "title": entity,
                "priority": "medium",
            }));
        }

        if tasks_to_schedule.is_empty() {
            result.warnings.push("No tasks to schedule".to_string());
            result.data.insert("date".to_string(), json!(target_date));
            result.data.insert("existing_blocks".to_string(), json!(existing_blocks));
            result.data.insert("plan".to_string(), json!(Vec::<Value>::new()));
            result.data.insert("message".to_string(), json!("No tasks to schedule"));
            return result;
        }

        let planned_blocks = generate_plan(&tasks_to_schedule, &mut free_slots);

        if !planned_blocks.is_empty() {
            let mut create_args = BTreeMap::new();
            create_args.insert("date".to_string(), json!(target_date));
            create_args.insert("blocks".to_string(), json!(planned_blocks));
            let (create_call, create_result) = context.tools.execute("CALENDAR_CREATE_BLOCKS", create_args, false).await;
            let pending = create_call.status == ToolCallStatus::PendingConfirm;
            result.tool_calls.push(create_call);

            if let Some(create_result) = create_result.filter(|r| r.success) {
                result.changes.extend(create_result.changes);
                result.undo_steps.extend(create_result.undo_steps);
                let created_count = create_result.data.get("created").and_then(Value::as_array).map(Vec::len).unwrap_or(0);
                result.data.insert("blocks_created".to_string(), json!(created_count));
            } else if pending {
                result.data.insert("pending_confirmation".to_string(), json!(true));
                result.data.insert("blocks_pending".to_string(), json!(planned_blocks));
            }
        }

        result.data.insert("date".to_string(), json!(target_date));
        result.data.insert("existing_blocks".to_string(), json!(existing_blocks));
        result.data.insert("plan".to_string(), json!(planned_blocks));
        result.data.insert("tasks_scheduled".to_string(), json!(tasks_to_schedule.len()));

        result
    }
}

fn generate_plan(tasks: &[Value], free_slots: &mut Vec<Value>) -> Vec<Value> {
    let mut plan = Vec::new();
    let mut slot_index = 0;

    let priority_rank = |task: &Value| match task.get("priority").and_then(Value::as_str).unwrap_or("medium") {
        "high" => 0,
        "low" => 2,
        _ => 1,
    };

    let mut sorted_tasks: Vec<&Value> = tasks.iter().collect();
    sorted_tasks.sort_by_key(|t| priority_rank(t));

    for task in sorted_tasks.into_iter().take(MAX_TASKS_PER_DAY) {
        if slot_index >= free_slots.len() {
            break;
        }

        let slot = free_slots[slot_index].clone();
        let start = slot["start"].as_str().unwrap_or("09:00").to_string();
        let slot_end = slot["end"].as_str().unwrap_or("17:00").to_string();

        let (start_hour, start_min) = parse_hm(&start);
        let mut end_hour = start_hour + 1;
        let mut end_min = start_min;

        let (slot_end_hour, slot_end_min) = parse_hm(&slot_end);
        if end_hour > slot_end_hour {
            end_hour = slot_end_hour;
            end_min = slot_end_min;
        }

        let end = format!("{end_hour:02}:{end_min:02}");

        let block_type = if task.get("priority").and_then(Value::as_str) == Some("high") { "focus" } else { "task" };

        plan.push(json!({
            "title": task["title"],
            "start": start,
            "end": end,
            "type": block_type,
            "task_id": task.get("task_id"),
        }));

        free_slots[slot_index] = json!({"start": end, "end": slot_end});

        if end >= slot_end {
            slot_index += 1;
        }
    }

    plan
}

fn parse_hm(value: &str) -> (i32, i32) {
    let mut parts = value.split(':');
    let hour = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    let min = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    (hour, min)
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
    async fn no_tasks_produces_warning_and_empty_plan() {
        let tools = registry().await;
        let intent = Intent::new(IntentType::PlanDay, 0.9, BTreeMap::new(), Vec::new());
        let result = PlanDaySkill.execute(SkillContext::new(&intent, tools)).await;
        assert!(result.success);
        assert_eq!(result.warnings, vec!["No tasks to schedule"]);
    }

    #[tokio::test]
    async fn entity_ad_hoc_task_gets_scheduled() {
        let tools = registry().await;
        let intent = Intent::new(IntentType::PlanDay, 0.9, BTreeMap::new(), vec!["Write quarterly report".to_string()]);
        let result = PlanDaySkill.execute(SkillContext::new(&intent, tools)).await;
        assert!(result.success);
        assert_eq!(result.data["tasks_scheduled"], 1);
        // CALENDAR_CREATE_BLOCKS is MEDIUM risk: without skip_confirmation it pends.
        assert_eq!(result.data["pending_confirmation"], true);
    }

    #[test]
    fn generate_plan_caps_at_five_tasks() {
        let tasks: Vec<Value> = (0..8).map(|i| json!({"title": format!("t{i}"), "priority": "medium", "task_id": format!("t{i}")})).collect();
        let mut slots = vec![json!({"start": "09:00", "end": "17:00"})];
        let plan = generate_plan(&tasks, &mut slots);
        assert!(plan.len() <= MAX_TASKS_PER_DAY);
    }
}
