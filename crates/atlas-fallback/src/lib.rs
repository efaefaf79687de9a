// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

use atlas_core::{FallbackTrigger, JobClass, ModelAttempt, RoutingProfile, MAX_ATTEMPTS_PER_MODEL, MAX_MODELS_PER_REQUEST};
use std::collections::{HashMap, HashSet};

const ALL_PROFILES: [RoutingProfile; 3] = [RoutingProfile::Offline, RoutingProfile::Balanced, RoutingProfile::Accuracy];
const ALL_JOB_CLASSES: [JobClass; 5] = [
    JobClass::IntentRouting,
    JobClass::Planning,
    JobClass::Extraction,
    JobClass::Summarization,
    JobClass::WorkflowBuilding,
];

const ULTIMATE_FALLBACK: (&str, &str) = ("ollama", "llama3.2:1b");

/// What the fallback manager recommends after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackAction {
    /// Try the same (provider, model) again, this time with a repair prompt.
    RetrySameModel,
    /// Move on to the next (provider, model) pair in the chain.
    FallbackNextModel,
    /// No options remain; the request fails.
    Fail,
}

/// A recommendation produced by [`FallbackManager::decide`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackDecision {
    /// What to do next.
    pub action: FallbackAction,
    /// Human-readable explanation, suitable for a receipt or log line.
    pub reason: String,
    /// The provider to try next, present iff `action != Fail`.
    pub next_provider: Option<String>,
    /// The model to try next, present iff `action != Fail`.
    pub next_model: Option<String>,
    /// Whether the next attempt should append the repair-prompt suffix.
    pub use_repair_prompt: bool,
}

impl FallbackDecision {
    fn fail(reason: impl Into<String>) -> Self {
        Self {
            action: FallbackAction::Fail,
            reason: reason.into(),
            next_provider: None,
            next_model: None,
            use_repair_prompt: false,
        }
    }
}

/// An ordered list of `(provider, model)` pairs to try for a job.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ModelChain {
    /// The pairs, in try-order.
    pub models: Vec<(String, String)>,
}

impl ModelChain {
    fn new(pairs: &[(&str, &str)]) -> Self {
        Self {
            models: pairs.iter().map(|(p, m)| (p.to_string(), m.to_string())).collect(),
        }
    }
}

/// Deterministic retry and fallback logic (spec §4.5).
///
/// Enforces `max_attempts_per_model` and `max_models_per_request`, and
/// holds the default model chains by `(RoutingProfile, JobClass)`.
pub struct FallbackManager {
    max_attempts_per_model: usize,
    max_models_per_request: usize,
    chains: HashMap<(RoutingProfile, JobClass), ModelChain>,
}

impl Default for FallbackManager {
    fn default() -> Self {
        Self::new(MAX_ATTEMPTS_PER_MODEL, MAX_MODELS_PER_REQUEST)
    }
}

impl FallbackManager {
    /// Build a fallback manager with explicit caps (use [`FallbackManager::default`]
    /// for the spec-locked caps) and the built-in default chains.
    pub fn new(max_attempts_per_model: usize, max_models_per_request: usize) -> Self {
        let mut chains = HashMap::new();

        chains.insert(
            (RoutingProfile::Offline, JobClass::IntentRouting),
            ModelChain::new(&[("ollama", "llama3.2:1b"), ("ollama", "llama3.2"), ("ollama", "mistral")]),
        );
        chains.insert(
            (RoutingProfile::Offline, JobClass::Planning),
            ModelChain::new(&[("ollama", "llama3.2:1b"), ("ollama", "llama3.2"), ("ollama", "mistral")]),
        );
        chains.insert(
            (RoutingProfile::Offline, JobClass::Extraction),
            ModelChain::new(&[("ollama", "llama3.2:1b"), ("ollama", "llama3.2"), ("ollama", "mistral")]),
        );

        chains.insert(
            (RoutingProfile::Balanced, JobClass::IntentRouting),
            ModelChain::new(&[("openai", "gpt-4o-mini"), ("openai", "gpt-4o"), ("ollama", "llama3.2:1b")]),
        );
        chains.insert(
            (RoutingProfile::Balanced, JobClass::Planning),
            ModelChain::new(&[("openai", "gpt-4o-mini"), ("openai", "gpt-4o"), ("ollama", "llama3.2:1b")]),
        );
        chains.insert(
            (RoutingProfile::Balanced, JobClass::Extraction),
            ModelChain::new(&[("openai", "gpt-4o-mini"), ("ollama", "llama3.2:1b")]),
        );

        chains.insert(
            (RoutingProfile::Accuracy, JobClass::IntentRouting),
            ModelChain::new(&[("openai", "gpt-4o"), ("openai", "gpt-4o-mini"), ("ollama", "llama3.2:1b")]),
        );
        chains.insert(
            (RoutingProfile::Accuracy, JobClass::Planning),
            ModelChain::new(&[("openai", "gpt-4o"), ("openai", "gpt-4o-mini")]),
        );
        chains.insert(
            (RoutingProfile::Accuracy, JobClass::Extraction),
            ModelChain::new(&[("openai", "gpt-4o"), ("openai", "gpt-4o-mini")]),
        );

        let mut manager = Self {
            max_attempts_per_model,
            max_models_per_request,
            chains,
        };
        manager.set_defaults();
        manager
    }

    /// Fill in chains for any `(profile, job_class)` combination not given an
    /// explicit entry above: reuse that profile's intent-routing chain, or
    /// fall back to a single-entry local-Ollama chain if even that is absent.
    fn set_defaults(&mut self) {
        for &profile in &ALL_PROFILES {
            for &job_class in &ALL_JOB_CLASSES {
                let key = (profile, job_class);
                if self.chains.contains_key(&key) {
                    continue;
                }
                let fallback = self
                    .chains
                    .get(&(profile, JobClass::IntentRouting))
                    .cloned()
                    .unwrap_or_else(|| ModelChain::new(&[ULTIMATE_FALLBACK]));
                self.chains.insert(key, fallback);
            }
        }
    }

    /// The model chain for a profile and job class, truncated to
    /// `max_models_per_request` entries.
    pub fn get_model_chain(&self, profile: RoutingProfile, job_class: JobClass) -> Vec<(String, String)> {
        match self.chains.get(&(profile, job_class)) {
            Some(chain) => chain.models.iter().take(self.max_models_per_request).cloned().collect(),
            None => vec![(ULTIMATE_FALLBACK.0.to_string(), ULTIMATE_FALLBACK.1.to_string())],
        }
    }

    /// The first `(provider, model)` pair to try for a profile/job class.
    pub fn get_first_model(&self, profile: RoutingProfile, job_class: JobClass) -> (String, String) {
        self.get_model_chain(profile, job_class)
            .into_iter()
            .next()
            .unwrap_or_else(|| (ULTIMATE_FALLBACK.0.to_string(), ULTIMATE_FALLBACK.1.to_string()))
    }

    /// Decide what to do after a failed attempt.
    ///
    /// `attempts` must be non-empty and its last entry is treated as the
    /// attempt that just failed.
    pub fn decide(
        &self,
        trigger: FallbackTrigger,
        attempts: &[ModelAttempt],
        profile: RoutingProfile,
        job_class: JobClass,
    ) -> FallbackDecision {
        let Some(current) = attempts.last() else {
            return FallbackDecision::fail("No attempts recorded - invalid state");
        };
        let current_pair = (current.provider.clone(), current.model.clone());

        let current_model_attempts = attempts
            .iter()
            .filter(|a| (a.provider.as_str(), a.model.as_str()) == (current_pair.0.as_str(), current_pair.1.as_str()))
            .count();

        if current_model_attempts < self.max_attempts_per_model
            && matches!(trigger, FallbackTrigger::InvalidJson | FallbackTrigger::ValidationError)
        {
            return FallbackDecision {
                action: FallbackAction::RetrySameModel,
                reason: format!(
                    "Retry with repair prompt (attempt {}/{})",
                    current_model_attempts + 1,
                    self.max_attempts_per_model
                ),
                next_provider: Some(current_pair.0.clone()),
                next_model: Some(current_pair.1.clone()),
                use_repair_prompt: true,
            };
        }

        let chain = self.get_model_chain(profile, job_class);
        let unique_models_tried: HashSet<(String, String)> =
            attempts.iter().map(|a| (a.provider.clone(), a.model.clone())).collect();

        if unique_models_tried.len() >= self.max_models_per_request {
            return FallbackDecision::fail(format!("Exhausted all {} models", self.max_models_per_request));
        }

        for (provider, model) in &chain {
            let pair = (provider.clone(), model.clone());
            if !unique_models_tried.contains(&pair) {
                return FallbackDecision {
                    action: FallbackAction::FallbackNextModel,
                    reason: format!(
                        "Falling back from ({}, {}) to ({provider}, {model})",
                        current_pair.0, current_pair.1
                    ),
                    next_provider: Some(provider.clone()),
                    next_model: Some(model.clone()),
                    use_repair_prompt: false,
                };
            }
        }

        FallbackDecision::fail("No more models in chain to try")
    }

    /// Install a custom model chain for a profile/job class, overriding any
    /// default or previously configured chain.
    pub fn configure_chain(&mut self, profile: RoutingProfile, job_class: JobClass, models: Vec<(String, String)>) {
        self.chains.insert((profile, job_class), ModelChain { models });
    }
}
