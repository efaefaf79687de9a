// SPDX-License-Identifier: MIT OR Apache-2.0
//! End-to-end attempt-loop and skill-dispatch scenarios: a happy offline
//! classification, markdown-wrapped model output, repair-then-fallback,
//! full budget exhaustion, a medium-risk skill pending on confirmation,
//! and an undo round trip. Each is wired through a real `ToolRegistry`
//! and `SkillRegistry` with only the model call mocked.

use atlas_core::{ChangeAction, EntityType, ReceiptStatus, RoutingProfile, ToolCallStatus};
use atlas_fallback::FallbackManager;
use atlas_executor::Executor;
use atlas_providers::MockAdapter;
use atlas_registry::ProviderRegistry;
use atlas_tools::{EntityStores, ToolRegistry};
use std::sync::Arc;

async fn wired_executor(adapters: Vec<Arc<dyn atlas_providers::ProviderAdapter>>) -> (Executor, Arc<ToolRegistry>, EntityStores) {
    let registry = ProviderRegistry::new();
    for adapter in adapters {
        registry.register(adapter).await;
    }
    let fallback = Arc::new(FallbackManager::default());
    let stores = EntityStores::new();
    let tools = Arc::new(atlas_tools::build_default_registry(&stores).await);
    let skills = Arc::new(atlas_skills::build_default_registry().await);
    let executor = Executor::new(Arc::new(registry), fallback).with_skills(skills, tools.clone());
    (executor, tools, stores)
}

/// Scenario 1: happy offline path. One ollama attempt succeeds, the skill
/// creates one task, one change with one matching undo step, SUCCESS.
#[tokio::test]
async fn happy_offline_path_creates_one_task() {
    let adapter: Arc<dyn atlas_providers::ProviderAdapter> = Arc::new(MockAdapter::always_succeeding(
        "ollama",
        r#"{"type":"CAPTURE_TASKS","confidence":0.95,"raw_entities":["buy milk"]}"#,
    ));
    let (executor, _tools, _stores) = wired_executor(vec![adapter]).await;

    let receipt = executor.execute("buy milk", RoutingProfile::Offline, None).await;

    assert_eq!(receipt.status, ReceiptStatus::Success);
    assert_eq!(receipt.models_attempted.len(), 1);
    assert!(receipt.models_attempted[0].success);
    assert_eq!(receipt.models_attempted[0].provider, "ollama");

    assert_eq!(receipt.tool_calls.len(), 1);
    assert_eq!(receipt.tool_calls[0].tool_name, "TASK_CREATE");
    assert_eq!(receipt.tool_calls[0].status, ToolCallStatus::Ok);

    assert_eq!(receipt.changes.len(), 1);
    assert_eq!(receipt.changes[0].entity_type, EntityType::Task);
    assert_eq!(receipt.changes[0].action, ChangeAction::Created);

    assert_eq!(receipt.undo.len(), 1);
    assert_eq!(receipt.undo[0].tool_name, "TASK_DELETE");

    receipt.check_invariants().expect("receipt must satisfy its own invariants");
}

/// Scenario 2: the model wraps its JSON in a markdown fence; the
/// normalizer extracts it and classification succeeds on the first try.
#[tokio::test]
async fn markdown_fenced_response_normalizes_and_succeeds() {
    let adapter: Arc<dyn atlas_providers::ProviderAdapter> = Arc::new(MockAdapter::always_succeeding(
        "ollama",
        "Sure! ```json\n{\"type\":\"SEARCH_SUMMARIZE\",\"confidence\":0.8}\n```",
    ));
    let (executor, _tools, _stores) = wired_executor(vec![adapter]).await;

    let receipt = executor.execute("find my notes about the roadmap", RoutingProfile::Offline, None).await;

    assert_eq!(receipt.status, ReceiptStatus::Success);
    assert_eq!(receipt.models_attempted.len(), 1);
    assert!(receipt.models_attempted[0].success);
    let intent = receipt.intent_final.expect("classification must succeed");
    assert_eq!(intent.intent_type, atlas_core::IntentType::SearchSummarize);
}

/// Scenario 3: the first model returns garbage twice (both attempts
/// budget-exhausted with INVALID_JSON), the manager falls forward to the
/// next model in the offline chain, which succeeds on its first attempt.
#[tokio::test]
async fn two_invalid_json_then_fallback_to_next_model() {
    let adapter: Arc<dyn atlas_providers::ProviderAdapter> =
        Arc::new(MockAdapter::scripted("ollama", vec![Ok("not json at all".to_string()), Ok("still not json".to_string()), Ok(r#"{"type":"UNKNOWN","confidence":0.2}"#.to_string())]));
    let (executor, _tools, _stores) = wired_executor(vec![adapter]).await;

    let receipt = executor.execute("???", RoutingProfile::Offline, None).await;

    assert_eq!(receipt.status, ReceiptStatus::Success);
    assert_eq!(receipt.models_attempted.len(), 3);

    assert_eq!(receipt.models_attempted[0].model, "llama3.2:1b");
    assert!(!receipt.models_attempted[0].success);
    assert_eq!(receipt.models_attempted[0].attempt_number, 1);

    assert_eq!(receipt.models_attempted[1].model, "llama3.2:1b");
    assert!(!receipt.models_attempted[1].success);
    assert_eq!(receipt.models_attempted[1].attempt_number, 2);

    assert_eq!(receipt.models_attempted[2].model, "llama3.2");
    assert!(receipt.models_attempted[2].success);
    assert_eq!(receipt.models_attempted[2].attempt_number, 1);
}

/// Scenario 4: every model in the offline chain (3 models x 2 attempts)
/// returns garbage. Budgets exhaust, classification fails, no intent.
#[tokio::test]
async fn exhausting_every_model_fails_with_no_intent() {
    let adapter: Arc<dyn atlas_providers::ProviderAdapter> = Arc::new(MockAdapter::always_succeeding("ollama", "still not json"));
    let (executor, _tools, _stores) = wired_executor(vec![adapter]).await;

    let receipt = executor.execute("garbage in", RoutingProfile::Offline, None).await;

    assert_eq!(receipt.status, ReceiptStatus::Failed);
    assert!(receipt.intent_final.is_none());
    assert_eq!(receipt.models_attempted.len(), 6);
    assert!(receipt.models_attempted.iter().all(|a| !a.success));
    assert!(receipt.errors.iter().any(|e| e.contains("Failed to classify intent")));

    let distinct: std::collections::BTreeSet<_> = receipt.models_attempted.iter().map(|a| (a.provider.clone(), a.model.clone())).collect();
    assert_eq!(distinct.len(), 3);
}

/// Scenario 5: PLAN_DAY succeeds through CALENDAR_GET_DAY, but
/// CALENDAR_CREATE_BLOCKS pends on confirmation. No Change is emitted for
/// the pending call, and the receipt as a whole lands PENDING_CONFIRM.
#[tokio::test]
async fn plan_day_without_skip_confirmation_pends() {
    let adapter: Arc<dyn atlas_providers::ProviderAdapter> = Arc::new(MockAdapter::always_succeeding(
        "ollama",
        r#"{"type":"PLAN_DAY","confidence":0.9,"parameters":{"date":"2026-07-28"}}"#,
    ));
    let (executor, _tools, stores) = wired_executor(vec![adapter]).await;

    // Seed one pending task so plan_day has something to schedule.
    let seed_id = uuid::Uuid::new_v4().to_string();
    stores
        .tasks
        .insert(seed_id.clone(), serde_json::json!({"id": seed_id, "title": "write report", "status": "pending", "priority": "high"}))
        .await;

    let receipt = executor.execute("plan my day", RoutingProfile::Offline, None).await;

    assert_eq!(receipt.status, ReceiptStatus::PendingConfirm);
    assert!(receipt.tool_calls.iter().any(|tc| tc.tool_name == "CALENDAR_CREATE_BLOCKS" && tc.status == ToolCallStatus::PendingConfirm));
    assert!(receipt.changes.is_empty());
    assert!(receipt.undo.is_empty());
}

/// Scenario 6: undo round trip. capture_tasks creates two tasks; replaying
/// every UndoStep in reverse restores the task store to its pre-execution
/// (empty) state.
#[tokio::test]
async fn undo_round_trip_restores_prior_state() {
    let adapter: Arc<dyn atlas_providers::ProviderAdapter> = Arc::new(MockAdapter::always_succeeding(
        "ollama",
        r#"{"type":"CAPTURE_TASKS","confidence":0.95,"raw_entities":["buy milk","call dentist"]}"#,
    ));
    let (executor, tools, stores) = wired_executor(vec![adapter]).await;

    assert!(stores.tasks.values().await.is_empty(), "store must start empty for a clean round trip");

    let receipt = executor.execute("buy milk and call dentist", RoutingProfile::Offline, None).await;
    assert_eq!(receipt.status, ReceiptStatus::Success);
    assert_eq!(receipt.changes.len(), 2);
    assert_eq!(receipt.undo.len(), 2);
    assert_eq!(stores.tasks.values().await.len(), 2);

    for step in receipt.undo.iter().rev() {
        let (_, result) = tools.execute(&step.tool_name, step.args.clone(), true).await;
        assert!(result.is_some_and(|r| r.success), "undo step {} must succeed", step.tool_name);
    }

    assert!(stores.tasks.values().await.is_empty(), "undo must restore the pre-execution (empty) state");
}
