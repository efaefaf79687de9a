// SPDX-License-Identifier: MIT OR Apache-2.0
use crate::base::{Skill, SkillContext, SkillResult};
use async_trait::async_trait;
use atlas_core::IntentType;
use atlas_core::RiskLevel;
use chrono::{Datelike, Duration, Utc, Weekday};
use serde_json::{json, Value};
use std::collections::BTreeMap;

const INTENTS: [IntentType; 1] = [IntentType::CaptureTasks];

/// `CAPTURE_TASKS`: extract tasks from free-form input and create them.
#[derive(Default)]
pub struct CaptureTasksSkill;

#[async_trait]
impl Skill for CaptureTasksSkill {
    fn name(&self) -> &str {
        "capture_tasks"
    }
    fn intent_types(&self) -> &[IntentType] {
        &INTENTS
    }
    fn risk_level(&self) -> RiskLevel {
        RiskLevel::Low
    }
    fn description(&self) -> &str {
        "Extract and create tasks from user input"
    }

    async fn execute(&self, context: SkillContext<'_>) -> SkillResult {
        let mut result = SkillResult::new();

        let mut entities = context.intent.raw_entities.clone();
        if let Some(Value::Array(task_list)) = context.intent.parameters.get("tasks") {
            for task_data in task_list {
                match task_data {
                    Value::Object(map) => {
                        let title = map.get("title").and_then(Value::as_str).map(str::to_string).unwrap_or_else(|| task_data.to_string());
                        entities.push(title);
                    }
                    other => entities.push(other.to_string()),
                }
            }
        }

        if entities.is_empty() {
            result.warnings.push("No tasks found in input".to_string());
            return result;
        }

        let mut created_count = 0;
        for entity in &entities {
            let (title, due_date, priority) = parse_task(entity);

            let mut args = BTreeMap::new();
            args.insert("title".to_string(), json!(title));
            if let Some(date) = &due_date {
                args.insert("due_date".to_string(), json!(date));
            }
            args.insert("priority".to_string(), json!(priority));

            let (tool_call, tool_result) = context.tools.execute("TASK_CREATE", args, true).await;
            let error = tool_call.error.clone();
            result.tool_calls.push(tool_call);

            match tool_result {
                Some(tool_result) if tool_result.success => {
                    created_count += 1;
                    result.changes.extend(tool_result.changes);
                    result.undo_steps.extend(tool_result.undo_steps);
                }
                _ => {
                    if let Some(error) = error {
                        result.warnings.push(format!("Failed to create task '{title}': {error}"));
                    }
                }
            }
        }

        result.data.insert("tasks_created".to_string(), json!(created_count));
        result.data.insert("tasks_requested".to_string(), json!(entities.len()));

        if created_count == 0 {
            result.success = false;
            result.errors.push("Failed to create any tasks".to_string());
        }

        result
    }
}

fn parse_task(entity: &str) -> (String, Option<String>, String) {
    let mut title = entity.trim().to_string();
    let title_lower = title.to_lowercase();
    let mut due_date = None;

    if title_lower.contains("by friday") {
        due_date = Some(next_weekday(Weekday::Fri));
        title = title.replace("by Friday", "").replace("by friday", "").trim().to_string();
    } else if title_lower.contains("tomorrow") {
        due_date = Some((Utc::now() + Duration::days(1)).format("%Y-%m-%d").to_string());
        title = title.replace("tomorrow", "").trim().to_string();
    } else if title_lower.contains("today") {
        due_date = Some(Utc::now().format("%Y-%m-%d").to_string());
        title = title.replace("today", "").trim().to_string();
    }

    let mut priority = "medium".to_string();
    if title_lower.contains("urgent") || title_lower.contains("asap") {
        priority = "high".to_string();
    } else if title_lower.contains("low priority") || title_lower.contains("whenever") {
        priority = "low".to_string();
    }

    (title, due_date, priority)
}

fn next_weekday(target: Weekday) -> String {
    let today = Utc::now();
    let days_ahead = {
        let diff = target.num_days_from_monday() as i64 - today.weekday().num_days_from_monday() as i64;
        if diff <= 0 {
            diff + 7
        } else {
            diff
        }
    };
    (today + Duration::days(days_ahead)).format("%Y-%m-%d").to_string()
}
