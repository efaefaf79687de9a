// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

//! Deterministic skill programs and their registry (spec §4.7).

/// The `Skill` trait, `SkillContext`, and `SkillResult`.
pub mod base;
/// `build_workflow`: create (but never auto-enable) an automation workflow.
pub mod build_workflow;
/// `capture_tasks`: extract and create tasks from free-form input.
pub mod capture_tasks;
/// `plan_day`: generate a day plan of scheduled calendar blocks.
pub mod plan_day;
/// `process_meeting_notes`: save meeting content and extract action items.
pub mod process_meeting_notes;
/// Central skill registry, mapping intent types to the skill that handles them.
pub mod registry;
/// `search_summarize`: search notes/tasks and summarize with citations.
pub mod search_summarize;

pub use base::{Skill, SkillContext, SkillResult};
pub use registry::{SkillInfo, SkillRegistry};

use std::sync::Arc;

/// Build a [`SkillRegistry`] pre-populated with all five shipped skills.
///
/// This is the composition root `atlas-executor` calls at startup.
pub async fn build_default_registry() -> SkillRegistry {
    let registry = SkillRegistry::new();

    registry.register(Arc::new(capture_tasks::CaptureTasksSkill)).await;
    registry.register(Arc::new(plan_day::PlanDaySkill)).await;
    registry.register(Arc::new(process_meeting_notes::ProcessMeetingNotesSkill)).await;
    registry.register(Arc::new(search_summarize::SearchSummarizeSkill)).await;
    registry.register(Arc::new(build_workflow::BuildWorkflowSkill)).await;

    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_registry_has_every_shipped_skill() {
        let registry = build_default_registry().await;
        let mut names = registry.list_skills().await;
        names.sort();
        assert_eq!(names, vec!["build_workflow", "capture_tasks", "plan_day", "process_meeting_notes", "search_summarize"]);
    }
}
