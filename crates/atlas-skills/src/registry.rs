// SPDX-License-Identifier: MIT OR Apache-2.0
use crate::base::{Skill, SkillContext, SkillResult};
use atlas_core::{Intent, IntentType, RiskLevel};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Metadata about a registered skill, for the `/v1/skills` endpoint.
#[derive(Debug, Clone)]
pub struct SkillInfo {
    /// Skill name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Intent types this skill handles.
    pub intent_types: Vec<IntentType>,
    /// Risk level.
    pub risk_level: RiskLevel,
}

#[derive(Default)]
struct Inner {
    skills: BTreeMap<String, Arc<dyn Skill>>,
    intent_map: HashMap<IntentType, Arc<dyn Skill>>,
}

/// Central registry mapping intent types to the skill that handles them.
#[derive(Default)]
pub struct SkillRegistry {
    inner: RwLock<Inner>,
}

impl SkillRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a skill, mapping every intent type it declares to it.
    pub async fn register(&self, skill: Arc<dyn Skill>) {
        let mut inner = self.inner.write().await;
        for intent_type in skill.intent_types() {
            inner.intent_map.insert(*intent_type, skill.clone());
        }
        inner.skills.insert(skill.name().to_string(), skill);
    }

    /// Unregister a skill by name. Returns `true` if one was removed.
    pub async fn unregister(&self, name: &str) -> bool {
        let mut inner = self.inner.write().await;
        let Some(skill) = inner.skills.remove(name) else {
            return false;
        };
        inner.intent_map.retain(|_, mapped| !Arc::ptr_eq(mapped, &skill));
        true
    }

    /// Look up a skill by name.
    pub async fn get(&self, name: &str) -> Option<Arc<dyn Skill>> {
        self.inner.read().await.skills.get(name).cloned()
    }

    /// Look up the skill that handles an intent's type.
    pub async fn get_for_intent(&self, intent: &Intent) -> Option<Arc<dyn Skill>> {
        self.inner.read().await.intent_map.get(&intent.intent_type).cloned()
    }

    /// Names of every registered skill.
    pub async fn list_skills(&self) -> Vec<String> {
        self.inner.read().await.skills.keys().cloned().collect()
    }

    /// Metadata about every registered skill.
    pub async fn get_skill_info(&self) -> Vec<SkillInfo> {
        self.inner
            .read()
            .await
            .skills
            .values()
            .map(|skill| SkillInfo {
                name: skill.name().to_string(),
                description: skill.description().to_string(),
                intent_types: skill.intent_types().to_vec(),
                risk_level: skill.risk_level(),
            })
            .collect()
    }

    /// Run the skill registered for `context.intent`'s type.
    ///
    /// Returns a failed [`SkillResult`] carrying an explanatory error if no
    /// skill is registered for that intent type.
    pub async fn execute(&self, context: SkillContext<'_>) -> SkillResult {
        let Some(skill) = self.get_for_intent(context.intent).await else {
            let mut result = SkillResult { success: false, ..SkillResult::default() };
            result.errors.push(format!("No skill registered for intent type: {}", context.intent.intent_type));
            return result;
        };

        skill.execute(context).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use atlas_tools::ToolRegistry;
    use std::collections::BTreeMap as Map;

    struct NoopSkill {
        intents: Vec<IntentType>,
    }

    #[async_trait]
    impl Skill for NoopSkill {
        fn name(&self) -> &str {
            "noop"
        }
        fn intent_types(&self) -> &[IntentType] {
            &self.intents
        }
        fn risk_level(&self) -> RiskLevel {
            RiskLevel::Low
        }
        async fn execute(&self, _context: SkillContext<'_>) -> SkillResult {
            SkillResult::new()
        }
    }

    #[tokio::test]
    async fn unregistered_intent_type_fails_with_explanatory_error() {
        let registry = SkillRegistry::new();
        let intent = Intent::new(IntentType::CaptureTasks, 0.9, Map::new(), Vec::new());
        let tools = Arc::new(ToolRegistry::new());
        let result = registry.execute(SkillContext::new(&intent, tools)).await;
        assert!(!result.success);
        assert_eq!(result.errors.len(), 1);
    }

    #[tokio::test]
    async fn registered_skill_handles_its_intent_type() {
        let registry = SkillRegistry::new();
        registry.register(Arc::new(NoopSkill { intents: vec![IntentType::CaptureTasks] })).await;

        let intent = Intent::new(IntentType::CaptureTasks, 0.9, Map::new(), Vec::new());
        let tools = Arc::new(ToolRegistry::new());
        let result = registry.execute(SkillContext::new(&intent, tools)).await;
        assert!(result.success);
    }
}
