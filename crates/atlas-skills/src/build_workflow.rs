// SPDX-License-Identifier: MIT OR Apache-2.0
use crate::base::{Skill, SkillContext, SkillResult};
use async_trait::async_trait;
use atlas_core::{IntentType, RiskLevel};
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::BTreeMap;

const INTENTS: [IntentType; 1] = [IntentType::BuildWorkflow];

/// `BUILD_WORKFLOW`: create an automation workflow. Creating is allowed
/// outright; enabling one always requires confirmation (see
/// `atlas_tools::workflow::WorkflowEnableTool`).
#[derive(Default)]
pub struct BuildWorkflowSkill;

#[async_trait]
impl Skill for BuildWorkflowSkill {
    fn name(&self) -> &str {
        "build_workflow"
    }
    fn intent_types(&self) -> &[IntentType] {
        &INTENTS
    }
    fn risk_level(&self) -> RiskLevel {
        RiskLevel::High
    }
    fn description(&self) -> &str {
        "Create automation workflows"
    }

    async fn execute(&self, context: SkillContext<'_>) -> SkillResult {
        let mut result = SkillResult::new();
        let params = &context.intent.parameters;
        let entities = &context.intent.raw_entities;

        let mut name = params.get("name").and_then(Value::as_str).map(str::to_string).unwrap_or_default();
        if name.is_empty() {
            if let Some(first) = entities.first() {
                name = first.clone();
            }
        }
        if name.is_empty() {
            name = format!("Workflow {}", Utc::now().format("%Y%m%d_%H%M%S"));
        }

        let trigger = params.get("trigger").cloned().unwrap_or_else(|| json!({"type": "manual"}));
        let mut actions = params.get("actions").cloned().unwrap_or_else(|| json!([]));
        if actions.as_array().map(Vec::is_empty).unwrap_or(true) {
            actions = json!([{"type": "notify", "message": format!("Workflow '{name}' triggered")}]);
        }

        let mut save_args = BTreeMap::new();
        save_args.insert("name".to_string(), json!(name));
        save_args.insert("trigger".to_string(), trigger.clone());
        save_args.insert("actions".to_string(), actions.clone());
        let (save_call, save_result) = context.tools.execute("WORKFLOW_SAVE", save_args, true).await;
        result.tool_calls.push(save_call);

        let Some(save_result) = save_result.filter(|r| r.success) else {
            result.success = false;
            result.errors.push("Failed to save workflow".to_string());
            return result;
        };

        result.changes.extend(save_result.changes);
        result.undo_steps.extend(save_result.undo_steps);

        let workflow_id = save_result.data.get("workflow_id").cloned().unwrap_or(Value::Null);

        result.data.insert("workflow_id".to_string(), workflow_id);
        result.data.insert("name".to_string(), json!(name));
        result.data.insert("trigger".to_string(), trigger);
        result.data.insert("actions".to_string(), actions);
        result.data.insert("enabled".to_string(), json!(false));
        result.data.insert("message".to_string(), json!("Workflow created but NOT enabled. Use WORKFLOW_ENABLE to activate."));

        result
    }
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
    async fn creates_workflow_disabled_by_default() {
        let tools = registry().await;
        let mut params = BTreeMap::new();
        params.insert("name".to_string(), json!("Morning digest"));
        let intent = Intent::new(IntentType::BuildWorkflow, 0.9, params, Vec::new());
        let result = BuildWorkflowSkill.execute(SkillContext::new(&intent, tools)).await;
        assert!(result.success);
        assert_eq!(result.data["enabled"], false);
        assert_eq!(result.data["name"], "Morning digest");
    }

    #[tokio::test]
    async fn falls_back_to_notify_action_when_none_given() {
        let tools = registry().await;
        let intent = Intent::new(IntentType::BuildWorkflow, 0.9, BTreeMap::new(), vec!["Daily standup reminder".to_string()]);
        let result = BuildWorkflowSkill.execute(SkillContext::new(&intent, tools)).await;
        assert!(result.success);
        let actions = result.data["actions"].as_array().unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0]["type"], "notify");
    }
}
