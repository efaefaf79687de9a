// SPDX-License-Identifier: MIT OR Apache-2.0
use crate::{CompletionRequest, CompletionResponse, HealthStatus, ProviderAdapter, ProviderCapabilities, ProviderError, ProviderHealth};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Mutex;

/// An in-process provider for tests: returns a fixed script of responses
/// (or a configured failure) without touching the network.
///
/// Grounded on the teacher's in-process mock backend — same idea, scaled
/// to ATLAS's narrower adapter surface.
pub struct MockAdapter {
    name: String,
    script: Mutex<Vec<Result<String, ProviderError>>>,
    capabilities: ProviderCapabilities,
}

impl MockAdapter {
    /// Build a mock that always succeeds with `content`.
    pub fn always_succeeding(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script: Mutex::new(vec![Ok(content.into())]),
            capabilities: ProviderCapabilities { strict_json: true, ..Default::default() },
        }
    }

    /// Build a mock that plays back `script` in order, one entry per call
    /// to `complete`. The last entry repeats once exhausted.
    pub fn scripted(name: impl Into<String>, script: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            name: name.into(),
            script: Mutex::new(script),
            capabilities: ProviderCapabilities { strict_json: true, ..Default::default() },
        }
    }
}

#[async_trait]
impl ProviderAdapter for MockAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let mut script = self.script.lock().expect("mock script lock");
        let next = if script.len() > 1 { script.remove(0) } else { script.first().cloned().unwrap_or_else(|| Ok(String::new())) };

        next.map(|content| CompletionResponse {
            content,
            model: request.model,
            provider: self.name.clone(),
            usage: None,
            latency_ms: 0,
            finish_reason: Some("stop".to_string()),
        })
    }

    async fn health_check(&self) -> ProviderHealth {
        ProviderHealth { status: HealthStatus::Healthy, latency_ms: Some(0), last_check: Some(Utc::now()), error: None, models_available: None }
    }

    fn get_capabilities(&self, _model: &str) -> ProviderCapabilities {
        self.capabilities.clone()
    }

    async fn list_models(&self) -> Vec<String> {
        vec!["mock-model".to_string()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChatMessage;

    fn request() -> CompletionRequest {
        CompletionRequest {
            messages: vec![ChatMessage { role: "user".to_string(), content: "hi".to_string() }],
            model: "mock-model".to_string(),
            temperature: 0.0,
            max_tokens: 100,
            json_mode: true,
        }
    }

    #[tokio::test]
    async fn always_succeeding_returns_fixed_content() {
        let adapter = MockAdapter::always_succeeding("mock", r#"{"type":"UNKNOWN","confidence":0.1}"#);
        let response = adapter.complete(request()).await.unwrap();
        assert_eq!(response.content, r#"{"type":"UNKNOWN","confidence":0.1}"#);
    }

    #[tokio::test]
    async fn scripted_plays_back_in_order() {
        let adapter = MockAdapter::scripted(
            "mock",
            vec![
                Err(ProviderError::ProviderDown { provider: "mock".to_string(), message: "boom".to_string() }),
                Ok("second".to_string()),
            ],
        );
        assert!(adapter.complete(request()).await.is_err());
        assert_eq!(adapter.complete(request()).await.unwrap().content, "second");
    }
}
