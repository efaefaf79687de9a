// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

//! The executor: intent-classification attempt loop plus skill dispatch
//! (spec §4.6). This is the one component that is allowed to know about
//! every other crate in the workspace.

use atlas_core::{EngineError, FallbackTrigger, Intent, JobClass, ModelAttempt, Receipt, ReceiptStatus, RoutingProfile, ToolCallStatus};
use atlas_fallback::{FallbackAction, FallbackManager};
use atlas_providers::{ChatMessage, CompletionRequest, ProviderError};
use atlas_registry::ProviderRegistry;
use atlas_skills::{SkillContext, SkillRegistry};
use atlas_tools::ToolRegistry;
use atlas_validator::Validator;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, info_span, warn};

const BASE_INTENT_PROMPT: &str = "You are an intent classifier for a personal productivity assistant. \
Given the user's message, respond with a single JSON object of the shape \
{\"type\": <CAPTURE_TASKS|PLAN_DAY|PROCESS_MEETING_NOTES|SEARCH_SUMMARIZE|BUILD_WORKFLOW|UNKNOWN>, \
\"confidence\": <0.0-1.0>, \"parameters\": {}, \"raw_entities\": []}. \
Respond with the JSON object only, no markdown fences, no commentary.\n\nUser message: ";

const REPAIR_SUFFIX: &str = "\n\nYour previous response could not be parsed as valid JSON matching the \
schema above. Respond again with ONLY the JSON object.";

fn build_prompt(user_input: &str, is_repair: bool) -> String {
    let mut prompt = format!("{BASE_INTENT_PROMPT}{user_input}");
    if is_repair {
        prompt.push_str(REPAIR_SUFFIX);
    }
    prompt
}

fn attempts_for(attempts: &[ModelAttempt], provider: &str, model: &str) -> u32 {
    attempts.iter().filter(|a| a.provider == provider && a.model == model).count() as u32
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Orchestrates intent classification and skill dispatch for one request.
///
/// Holds no per-request mutable state of its own: the receipt, the
/// working `(provider, model)` pair, and the attempt list all live on the
/// stack of a single [`Executor::execute`] call, per spec §5's "no
/// per-request singletons" requirement.
pub struct Executor {
    providers: Arc<ProviderRegistry>,
    fallback: Arc<FallbackManager>,
    skills: Option<Arc<SkillRegistry>>,
    tools: Option<Arc<ToolRegistry>>,
}

impl Executor {
    /// Build an executor that only classifies intents: no skill registry is
    /// attached, so every successful classification finalizes as `SUCCESS`
    /// with a warning that skill execution is unavailable.
    pub fn new(providers: Arc<ProviderRegistry>, fallback: Arc<FallbackManager>) -> Self {
        Self { providers, fallback, skills: None, tools: None }
    }

    /// Attach the skill and tool registries, enabling post-classification
    /// skill dispatch.
    #[must_use]
    pub fn with_skills(mut self, skills: Arc<SkillRegistry>, tools: Arc<ToolRegistry>) -> Self {
        self.skills = Some(skills);
        self.tools = Some(tools);
        self
    }

    /// Execute one request end to end: open a receipt, classify the
    /// intent, dispatch to a skill, finalize status. Always returns a
    /// receipt — even an unexpected panic inside this call is caught and
    /// turned into a `FAILED` receipt, never propagated to the caller.
    pub async fn execute(&self, user_input: impl Into<String>, profile: RoutingProfile, profile_id: Option<String>) -> Receipt {
        let user_input = user_input.into();
        let mut receipt = Receipt::open(user_input.clone(), profile_id);

        let outcome = AssertUnwindSafe(self.run(&user_input, profile, &mut receipt)).catch_unwind().await;

        if let Err(panic) = outcome {
            let message = panic_message(&*panic);
            warn!(target: "atlas.executor", receipt_id = %receipt.receipt_id, error = %message, "unexpected failure");
            receipt.status = ReceiptStatus::Failed;
            receipt.errors.push(EngineError::Catastrophic(message).to_string());
        }

        receipt
    }

    async fn run(&self, user_input: &str, profile: RoutingProfile, receipt: &mut Receipt) {
        match self.classify_intent(user_input, profile, receipt).await {
            Some(intent) => {
                receipt.intent_final = Some(intent.clone());
                self.dispatch_skill(intent, receipt).await;
            }
            None => {
                receipt.status = ReceiptStatus::Failed;
                receipt.errors.push(EngineError::ClassifyExhausted.to_string());
            }
        }
    }

    /// The attempt loop: drives the fallback manager through provider
    /// calls, normalization, and validation until an intent classifies
    /// successfully or the fallback chain is exhausted.
    async fn classify_intent(&self, user_input: &str, profile: RoutingProfile, receipt: &mut Receipt) -> Option<Intent> {
        let job_class = JobClass::IntentRouting;
        let (mut provider_name, mut model) = self.fallback.get_first_model(profile, job_class);
        let mut is_repair = false;

        loop {
            let attempt_number = attempts_for(&receipt.models_attempted, &provider_name, &model) + 1;

            let Some(adapter) = self.providers.get(&provider_name).await else {
                warn!(target: "atlas.executor", provider = %provider_name, model = %model, "provider not registered");
                receipt
                    .models_attempted
                    .push(ModelAttempt::failure(&provider_name, &model, attempt_number, FallbackTrigger::ProviderDown, None));

                let decision = self.fallback.decide(FallbackTrigger::ProviderDown, &receipt.models_attempted, profile, job_class);
                if decision.action == FallbackAction::Fail {
                    receipt.errors.push(decision.reason);
                    return None;
                }
                provider_name = decision.next_provider.expect("non-Fail decision carries a next provider");
                model = decision.next_model.expect("non-Fail decision carries a next model");
                is_repair = decision.use_repair_prompt;
                continue;
            };

            let span = info_span!(
                "atlas.executor.attempt",
                receipt_id = %receipt.receipt_id,
                provider = %provider_name,
                model = %model,
                attempt_number,
            );
            let _enter = span.enter();

            let prompt = build_prompt(user_input, is_repair);
            let request = CompletionRequest {
                messages: vec![ChatMessage { role: "user".to_string(), content: prompt }],
                model: model.clone(),
                temperature: 0.3,
                max_tokens: 1024,
                json_mode: true,
            };

            let started = Instant::now();
            let response = adapter.complete(request).await;
            let latency_ms = started.elapsed().as_millis() as u64;

            let trigger = match response {
                Ok(response) => {
                    let norm = atlas_normalizer::normalize(&response.content);
                    if norm.success {
                        let validated = Validator::new().validate_intent(&norm.data.expect("normalize success carries data"));
                        if validated.valid {
                            info!(latency_ms, "intent classified");
                            receipt.models_attempted.push(ModelAttempt::success(&provider_name, &model, attempt_number, latency_ms));
                            return validated.intent;
                        }
                        warn!(errors = ?validated.errors, "validation rejected normalized output");
                        for e in &validated.errors {
                            receipt.warnings.push(format!("{} ({}): {}", e.field, e.code, e.message));
                        }
                        FallbackTrigger::ValidationError
                    } else {
                        let error = norm.error.as_deref().unwrap_or("unknown");
                        warn!(error, "normalization failed");
                        receipt.warnings.push(format!("normalization failed: {error}"));
                        FallbackTrigger::InvalidJson
                    }
                }
                Err(ProviderError::RateLimit { retry_after, .. }) => {
                    warn!(retry_after_s = retry_after, "provider rate limited");
                    receipt.warnings.push(format!("provider rate limited, retry after {retry_after}s"));
                    FallbackTrigger::RateLimit
                }
                Err(ProviderError::ProviderDown { message, .. }) => {
                    warn!(error = %message, "provider unavailable");
                    receipt.warnings.push(format!("provider unavailable: {message}"));
                    FallbackTrigger::ProviderDown
                }
            };

            receipt
                .models_attempted
                .push(ModelAttempt::failure(&provider_name, &model, attempt_number, trigger, Some(latency_ms)));

            drop(_enter);
            let decision = self.fallback.decide(trigger, &receipt.models_attempted, profile, job_class);
            if decision.action == FallbackAction::Fail {
                receipt.errors.push(decision.reason);
                return None;
            }
            provider_name = decision.next_provider.expect("non-Fail decision carries a next provider");
            model = decision.next_model.expect("non-Fail decision carries a next model");
            is_repair = decision.use_repair_prompt;
        }
    }

    /// Look up and run the skill registered for `intent`'s type, merging
    /// its output into `receipt` and finalizing status per spec §4.6.
    async fn dispatch_skill(&self, intent: Intent, receipt: &mut Receipt) {
        let (Some(skills), Some(tools)) = (self.skills.as_ref(), self.tools.as_ref()) else {
            receipt.status = ReceiptStatus::Success;
            receipt.warnings.push("Skill execution not available".to_string());
            return;
        };

        if skills.get_for_intent(&intent).await.is_none() {
            receipt.status = ReceiptStatus::Success;
            receipt.warnings.push(EngineError::SkillNotFound(intent.intent_type.to_string()).to_string());
            return;
        }

        let context = SkillContext::new(&intent, tools.clone());
        let result = skills.execute(context).await;

        receipt.tool_calls.extend(result.tool_calls);
        receipt.changes.extend(result.changes);
        receipt.undo.extend(result.undo_steps);
        receipt.warnings.extend(result.warnings);
        receipt.errors.extend(result.errors);

        let has_pending_call = receipt.tool_calls.iter().any(|tc| tc.status == ToolCallStatus::PendingConfirm);
        let has_ok_call = receipt.tool_calls.iter().any(|tc| tc.status == ToolCallStatus::Ok);

        receipt.status = if result.success {
            if receipt.changes.is_empty() && has_pending_call {
                ReceiptStatus::PendingConfirm
            } else {
                ReceiptStatus::Success
            }
        } else if has_ok_call {
            ReceiptStatus::Partial
        } else {
            ReceiptStatus::Failed
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atlas_providers::{HealthStatus, MockAdapter, ProviderCapabilities, ProviderHealth};
    use async_trait::async_trait;

    async fn registries_with(adapters: Vec<Arc<dyn atlas_providers::ProviderAdapter>>) -> Arc<ProviderRegistry> {
        let registry = ProviderRegistry::new();
        for adapter in adapters {
            registry.register(adapter).await;
        }
        Arc::new(registry)
    }

    fn executor_with_skills(providers: Arc<ProviderRegistry>) -> (Executor, Arc<SkillRegistry>, Arc<ToolRegistry>) {
        let fallback = Arc::new(FallbackManager::default());
        let tools = Arc::new(ToolRegistry::new());
        let skills = Arc::new(SkillRegistry::new());
        let executor = Executor::new(providers, fallback).with_skills(skills.clone(), tools.clone());
        (executor, skills, tools)
    }

    #[tokio::test]
    async fn unregistered_provider_fails_the_whole_classification() {
        let providers = Arc::new(ProviderRegistry::new());
        let fallback = Arc::new(FallbackManager::default());
        let executor = Executor::new(providers, fallback);
        let receipt = executor.execute("buy milk", RoutingProfile::Offline, None).await;
        assert_eq!(receipt.status, ReceiptStatus::Failed);
        assert!(receipt.errors.iter().any(|e| e.contains("Failed to classify intent")));
    }

    #[tokio::test]
    async fn classification_with_no_skills_attached_succeeds_with_warning() {
        let providers =
            registries_with(vec![Arc::new(MockAdapter::always_succeeding("ollama", r#"{"type":"UNKNOWN","confidence":0.1}"#))]).await;
        let fallback = Arc::new(FallbackManager::default());
        let executor = Executor::new(providers, fallback);
        let receipt = executor.execute("something", RoutingProfile::Offline, None).await;
        assert_eq!(receipt.status, ReceiptStatus::Success);
        assert!(receipt.intent_final.is_some());
        assert_eq!(receipt.warnings, vec!["Skill execution not available"]);
    }

    #[tokio::test]
    async fn classification_with_no_matching_skill_succeeds_with_warning() {
        let providers = registries_with(vec![Arc::new(MockAdapter::always_succeeding(
            "ollama",
            r#"{"type":"CAPTURE_TASKS","confidence":0.9,"raw_entities":["buy milk"]}"#,
        ))])
        .await;
        let (executor, _skills, _tools) = executor_with_skills(providers);
        let receipt = executor.execute("buy milk", RoutingProfile::Offline, None).await;
        assert_eq!(receipt.status, ReceiptStatus::Success);
        assert!(receipt.warnings.iter().any(|w| w.contains("CAPTURE_TASKS")));
    }

    struct AlwaysDownAdapter;

    #[async_trait]
    impl atlas_providers::ProviderAdapter for AlwaysDownAdapter {
        fn name(&self) -> &str {
            "ollama"
        }
        async fn complete(&self, _request: CompletionRequest) -> Result<atlas_providers::CompletionResponse, ProviderError> {
            Err(ProviderError::ProviderDown { provider: "ollama".to_string(), message: "connection refused".to_string() })
        }
        async fn health_check(&self) -> ProviderHealth {
            ProviderHealth { status: HealthStatus::Unhealthy, latency_ms: None, last_check: None, error: None, models_available: None }
        }
        fn get_capabilities(&self, _model: &str) -> ProviderCapabilities {
            ProviderCapabilities::default()
        }
        async fn list_models(&self) -> Vec<String> {
            Vec::new()
        }
    }

    #[tokio::test]
    async fn provider_down_on_every_model_exhausts_and_fails() {
        let providers = registries_with(vec![Arc::new(AlwaysDownAdapter)]).await;
        let fallback = Arc::new(FallbackManager::default());
        let executor = Executor::new(providers, fallback);
        let receipt = executor.execute("buy milk", RoutingProfile::Offline, None).await;
        assert_eq!(receipt.status, ReceiptStatus::Failed);
        assert!(receipt.intent_final.is_none());
        assert!(receipt.models_attempted.iter().all(|a| !a.success));
    }
}
