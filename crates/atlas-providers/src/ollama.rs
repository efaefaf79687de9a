// SPDX-License-Identifier: MIT OR Apache-2.0
use crate::{
    ChatMessage, CompletionRequest, CompletionResponse, HealthStatus, ProviderAdapter, ProviderCapabilities,
    ProviderError, ProviderHealth,
};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Instant;

/// Adapter for a local Ollama model server.
///
/// Ollama serves local models (Llama, Mistral, Phi, ...) with no API key;
/// "down" here means the daemon isn't running, not an auth failure.
pub struct OllamaAdapter {
    base_url: String,
    client: reqwest::Client,
    capabilities: HashMap<&'static str, ProviderCapabilities>,
}

impl OllamaAdapter {
    /// Build an adapter pointed at `base_url` (e.g. `http://localhost:11434`).
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut capabilities = HashMap::new();
        capabilities.insert(
            "llama3.2",
            ProviderCapabilities { strict_json: false, tool_calls: false, max_tokens: 4096, context_window: 128_000, ..Default::default() },
        );
        capabilities.insert(
            "llama3.2:1b",
            ProviderCapabilities { strict_json: false, tool_calls: false, max_tokens: 4096, context_window: 128_000, ..Default::default() },
        );
        capabilities.insert(
            "mistral",
            ProviderCapabilities { strict_json: false, tool_calls: false, max_tokens: 4096, context_window: 32_000, ..Default::default() },
        );
        capabilities.insert(
            "phi3",
            ProviderCapabilities { strict_json: false, tool_calls: false, max_tokens: 4096, context_window: 128_000, ..Default::default() },
        );

        let base_url = base_url.into();
        let base_url = base_url.trim_end_matches('/').to_string();

        Self {
            base_url,
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .expect("reqwest client"),
            capabilities,
        }
    }
}

#[async_trait]
impl ProviderAdapter for OllamaAdapter {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let start = Instant::now();

        let messages: Vec<Value> = request
            .messages
            .iter()
            .map(|m: &ChatMessage| serde_json::json!({"role": m.role, "content": m.content}))
            .collect();

        let mut payload = serde_json::json!({
            "model": request.model,
            "messages": messages,
            "stream": false,
            "options": {
                "temperature": request.temperature,
                "num_predict": request.max_tokens,
            },
        });
        if request.json_mode {
            payload["format"] = Value::String("json".to_string());
        }

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&payload)
            .send()
            .await
            .map_err(|e| down_error("ollama", &e))?;

        if !response.status().is_success() {
            return Err(ProviderError::ProviderDown {
                provider: "ollama".to_string(),
                message: format!("Ollama error: {}", response.status()),
            });
        }

        let data: Value = response.json().await.map_err(|e| down_error("ollama", &e))?;
        let latency_ms = start.elapsed().as_millis() as u64;

        let mut usage = HashMap::new();
        usage.insert("prompt_tokens".to_string(), data["prompt_eval_count"].as_u64().unwrap_or(0));
        usage.insert("completion_tokens".to_string(), data["eval_count"].as_u64().unwrap_or(0));

        Ok(CompletionResponse {
            content: data["message"]["content"].as_str().unwrap_or_default().to_string(),
            model: request.model,
            provider: "ollama".to_string(),
            usage: Some(usage),
            latency_ms,
            finish_reason: None,
        })
    }

    async fn health_check(&self) -> ProviderHealth {
        let start = Instant::now();
        match self.client.get(format!("{}/api/tags", self.base_url)).send().await {
            Ok(response) if response.status().is_success() => {
                let latency_ms = start.elapsed().as_millis() as u64;
                match response.json::<Value>().await {
                    Ok(data) => {
                        let models = data["models"]
                            .as_array()
                            .map(|arr| {
                                arr.iter()
                                    .filter_map(|m| m["name"].as_str().map(str::to_string))
                                    .collect::<Vec<_>>()
                            })
                            .unwrap_or_default();
                        ProviderHealth {
                            status: HealthStatus::Healthy,
                            latency_ms: Some(latency_ms),
                            last_check: Some(Utc::now()),
                            error: None,
                            models_available: Some(models),
                        }
                    }
                    Err(e) => ProviderHealth {
                        status: HealthStatus::Unhealthy,
                        latency_ms: Some(latency_ms),
                        last_check: Some(Utc::now()),
                        error: Some(e.to_string()),
                        models_available: None,
                    },
                }
            }
            Ok(response) => ProviderHealth {
                status: HealthStatus::Degraded,
                latency_ms: Some(start.elapsed().as_millis() as u64),
                last_check: Some(Utc::now()),
                error: Some(format!("Unexpected status: {}", response.status())),
                models_available: None,
            },
            Err(e) => ProviderHealth {
                status: HealthStatus::Unhealthy,
                latency_ms: None,
                last_check: Some(Utc::now()),
                error: Some(if e.is_connect() { "Cannot connect to Ollama server".to_string() } else { e.to_string() }),
                models_available: None,
            },
        }
    }

    fn get_capabilities(&self, model: &str) -> ProviderCapabilities {
        if let Some(cap) = self.capabilities.get(model) {
            return cap.clone();
        }
        let base_model = model.split(':').next().unwrap_or(model);
        self.capabilities.get(base_model).cloned().unwrap_or_default()
    }

    async fn list_models(&self) -> Vec<String> {
        match self.client.get(format!("{}/api/tags", self.base_url)).send().await {
            Ok(response) if response.status().is_success() => response
                .json::<Value>()
                .await
                .ok()
                .and_then(|data| {
                    data["models"].as_array().map(|arr| {
                        arr.iter().filter_map(|m| m["name"].as_str().map(str::to_string)).collect()
                    })
                })
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }
}

fn down_error(provider: &str, e: &reqwest::Error) -> ProviderError {
    if e.is_connect() {
        ProviderError::ProviderDown { provider: provider.to_string(), message: format!("Cannot connect to {provider} server") }
    } else {
        ProviderError::ProviderDown { provider: provider.to_string(), message: e.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capabilities_fall_back_to_base_model_name() {
        let adapter = OllamaAdapter::new("http://localhost:11434");
        let tagged = adapter.get_capabilities("llama3.2:7b");
        let base = adapter.get_capabilities("llama3.2");
        assert_eq!(tagged.context_window, base.context_window);
    }

    #[test]
    fn unknown_model_gets_default_capabilities() {
        let adapter = OllamaAdapter::new("http://localhost:11434");
        let caps = adapter.get_capabilities("some-random-model");
        assert_eq!(caps, ProviderCapabilities::default());
    }

    #[tokio::test]
    async fn health_check_reports_unhealthy_when_unreachable() {
        let adapter = OllamaAdapter::new("http://127.0.0.1:1");
        let health = adapter.health_check().await;
        assert_eq!(health.status, HealthStatus::Unhealthy);
    }
}
