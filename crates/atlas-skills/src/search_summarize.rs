// SPDX-License-Identifier: MIT OR Apache-2.0
use crate::base::{Skill, SkillContext, SkillResult};
use async_trait::async_trait;
use atlas_core::{IntentType, RiskLevel};
use serde_json::{json, Value};
use std::collections::BTreeMap;

const INTENTS: [IntentType; 1] = [IntentType::SearchSummarize];

/// `SEARCH_SUMMARIZE`: search notes/tasks and summarize results with citations.
#[derive(Default)]
pub struct SearchSummarizeSkill;

#[async_trait]
impl Skill for SearchSummarizeSkill {
    fn name(&self) -> &str {
        "search_summarize"
    }
    fn intent_types(&self) -> &[IntentType] {
        &INTENTS
    }
    fn risk_level(&self) -> RiskLevel {
        RiskLevel::Low
    }
    fn description(&self) -> &str {
        "Search notes and summarize results with citations"
    }

    async fn execute(&self, context: SkillContext<'_>) -> SkillResult {
        let mut result = SkillResult::new();
        let params = &context.intent.parameters;

        let mut query = params.get("query").and_then(Value::as_str).unwrap_or("").to_string();
        if query.is_empty() && !context.intent.raw_entities.is_empty() {
            query = context.intent.raw_entities.join(" ");
        }

        let tags: Vec<String> = params
            .get("tags")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        let sources: Vec<String> = params
            .get("sources")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_else(|| vec!["notes".to_string()]);

        let mut search_results: Vec<Value> = Vec::new();

        if sources.iter().any(|s| s == "notes") {
            let mut args = BTreeMap::new();
            args.insert("query".to_string(), json!(query));
            args.insert("tags".to_string(), json!(tags));
            args.insert("limit".to_string(), json!(10));
            let (tool_call, tool_result) = context.tools.execute("NOTE_SEARCH", args, true).await;
            result.tool_calls.push(tool_call);

            if let Some(tool_result) = tool_result.filter(|r| r.success) {
                if let Some(notes) = tool_result.data.get("notes").and_then(Value::as_array) {
                    for note in notes {
                        search_results.push(json!({
                            "source": "notes",
                            "id": note["note_id"],
                            "title": note["title"],
                            "snippet": note["snippet"],
                            "relevance": note["relevance"],
                        }));
                    }
                }
            }
        }

        if sources.iter().any(|s| s == "tasks") {
            let mut args = BTreeMap::new();
            args.insert("limit".to_string(), json!(20));
            let (tool_call, tool_result) = context.tools.execute("TASK_LIST", args, true).await;
            result.tool_calls.push(tool_call);

            if let Some(tool_result) = tool_result.filter(|r| r.success) {
                if let Some(tasks) = tool_result.data.get("tasks").and_then(Value::as_array) {
                    let query_lower = query.to_lowercase();
                    for task in tasks {
                        let title = task["title"].as_str().unwrap_or_default().to_lowercase();
                        let description = task.get("description").and_then(Value::as_str).unwrap_or_default().to_lowercase();

                        let mut relevance = 0.0_f64;
                        if !query_lower.is_empty() && title.contains(&query_lower) {
                            relevance = 0.7;
                        } else if !query_lower.is_empty() && description.contains(&query_lower) {
                            relevance = 0.5;
                        }

                        if relevance > 0.0 || query.is_empty() {
                            let snippet: String = task.get("description").and_then(Value::as_str).unwrap_or_default().chars().take(100).collect();
                            search_results.push(json!({
                                "source": "tasks",
                                "id": task["task_id"],
                                "title": task["title"],
                                "snippet": snippet,
                                "relevance": if relevance > 0.0 { relevance } else { 0.3 },
                                "status": task["status"],
                                "due_date": task.get("due_date"),
                            }));
                        }
                    }
                }
            }
        }

        search_results.sort_by(|a, b| b["relevance"].as_f64().unwrap_or(0.0).partial_cmp(&a["relevance"].as_f64().unwrap_or(0.0)).unwrap());

        let summary = build_summary(&query, &search_results);
        let top: Vec<Value> = search_results.iter().take(10).cloned().collect();
        let citations: Vec<Value> = search_results.iter().take(5).map(|r| json!({"source": r["source"], "id": r["id"], "title": r["title"]})).collect();

        result.data.insert("query".to_string(), json!(query));
        result.data.insert("results".to_string(), json!(top));
        result.data.insert("total_found".to_string(), json!(search_results.len()));
        result.data.insert("summary".to_string(), json!(summary));
        result.data.insert("citations".to_string(), json!(citations));

        if search_results.is_empty() {
            result.warnings.push(format!("No results found for query: {query}"));
        }

        result
    }
}

fn build_summary(query: &str, results: &[Value]) -> String {
    if results.is_empty() {
        return format!("No results found for '{query}'.");
    }

    let note_count = results.iter().filter(|r| r["source"] == "notes").count();
    let task_count = results.iter().filter(|r| r["source"] == "tasks").count();

    let mut parts = vec![format!("Found {} result(s) for '{query}'.", results.len())];
    if note_count > 0 {
        parts.push(format!("{note_count} note(s)"));
    }
    if task_count > 0 {
        parts.push(format!("{task_count} task(s)"));
    }

    let top = &results[0];
    parts.push(format!("Top result: {} (from {})", top["title"].as_str().unwrap_or_default(), top["source"].as_str().unwrap_or_default()));

    parts.join(" ")
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
    async fn empty_store_produces_no_results_warning() {
        let tools = registry().await;
        let mut params = BTreeMap::new();
        params.insert("query".to_string(), json!("roadmap"));
        let intent = Intent::new(IntentType::SearchSummarize, 0.9, params, Vec::new());
        let result = SearchSummarizeSkill.execute(SkillContext::new(&intent, tools)).await;
        assert!(result.success);
        assert_eq!(result.data["total_found"], 0);
        assert_eq!(result.warnings.len(), 1);
    }

    #[tokio::test]
    async fn finds_matching_note_and_cites_it() {
        let tools = registry().await;
        let mut create_args = BTreeMap::new();
        create_args.insert("title".to_string(), json!("Roadmap review"));
        create_args.insert("content".to_string(), json!("q3 planning notes"));
        tools.execute("NOTE_CREATE", create_args, true).await;

        let mut params = BTreeMap::new();
        params.insert("query".to_string(), json!("roadmap"));
        let intent = Intent::new(IntentType::SearchSummarize, 0.9, params, Vec::new());
        let result = SearchSummarizeSkill.execute(SkillContext::new(&intent, tools)).await;
        assert_eq!(result.data["total_found"], 1);
        assert_eq!(result.data["citations"].as_array().unwrap().len(), 1);
    }
}
