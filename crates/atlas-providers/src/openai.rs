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

/// Adapter for the OpenAI chat completions API. Requires a Bring-Your-Own
/// API key; a missing key is treated as the provider being down rather
/// than a hard panic, so a misconfigured deployment degrades gracefully.
pub struct OpenAiAdapter {
    api_key: Option<String>,
    base_url: String,
    client: reqwest::Client,
    capabilities: HashMap<&'static str, ProviderCapabilities>,
}

impl OpenAiAdapter {
    /// Build an adapter. Pass `None` to run with no key configured — every
    /// call will fail with [`ProviderError::ProviderDown`] until one is set.
    pub fn new(api_key: Option<String>) -> Self {
        let mut capabilities = HashMap::new();
        capabilities.insert(
            "gpt-4o",
            ProviderCapabilities { strict_json: true, tool_calls: true, max_tokens: 16_384, context_window: 128_000, ..Default::default() },
        );
        capabilities.insert(
            "gpt-4o-mini",
            ProviderCapabilities { strict_json: true, tool_calls: true, max_tokens: 16_384, context_window: 128_000, ..Default::default() },
        );
        capabilities.insert(
            "gpt-4-turbo",
            ProviderCapabilities { strict_json: true, tool_calls: true, max_tokens: 4096, context_window: 128_000, ..Default::default() },
        );
        capabilities.insert(
            "gpt-3.5-turbo",
            ProviderCapabilities { strict_json: true, tool_calls: true, max_tokens: 4096, context_window: 16_385, ..Default::default() },
        );

        Self {
            api_key,
            base_url: "https://api.openai.com/v1".to_string(),
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .expect("reqwest client"),
            capabilities,
        }
    }

    fn bearer(&self) -> Result<String, ProviderError> {
        self.api_key
            .clone()
            .map(|k| format!("Bearer {k}"))
            .ok_or_else(|| ProviderError::ProviderDown {
                provider: "openai".to_string(),
                message: "OpenAI API key not configured".to_string(),
            })
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let start = Instant::now();
        let auth = self.bearer()?;

        let messages: Vec<Value> = request
            .messages
            .iter()
            .map(|m: &ChatMessage| serde_json::json!({"role": m.role, "content": m.content}))
            .collect();

        let mut payload = serde_json::json!({
            "model": request.model,
            "messages": messages,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });
        if request.json_mode {
            payload["response_format"] = serde_json::json!({"type": "json_object"});
        }

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", auth)
            .json(&payload)
            .send()
            .await
            .map_err(|e| down_error(&e))?;

        let latency_ms = start.elapsed().as_millis() as u64;
        let status = response.status();

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            return Err(ProviderError::RateLimit { provider: "openai".to_string(), retry_after });
        }
        if status.as_u16() == 401 {
            return Err(ProviderError::ProviderDown { provider: "openai".to_string(), message: "Invalid OpenAI API key".to_string() });
        }
        if !status.is_success() {
            return Err(ProviderError::ProviderDown { provider: "openai".to_string(), message: format!("OpenAI error: {status}") });
        }

        let data: Value = response.json().await.map_err(|e| down_error(&e))?;
        let choice = &data["choices"][0];

        let usage = data["usage"].as_object().map(|obj| {
            obj.iter()
                .filter_map(|(k, v)| v.as_u64().map(|n| (k.clone(), n)))
                .collect::<HashMap<_, _>>()
        });

        Ok(CompletionResponse {
            content: choice["message"]["content"].as_str().unwrap_or_default().to_string(),
            model: data["model"].as_str().unwrap_or(&request.model).to_string(),
            provider: "openai".to_string(),
            usage,
            latency_ms,
            finish_reason: choice["finish_reason"].as_str().map(str::to_string),
        })
    }

    async fn health_check(&self) -> ProviderHealth {
        let Ok(auth) = self.bearer() else {
            return ProviderHealth {
                status: HealthStatus::Unhealthy,
                latency_ms: None,
                last_check: Some(Utc::now()),
                error: Some("API key not configured".to_string()),
                models_available: None,
            };
        };

        let start = Instant::now();
        match self.client.get(format!("{}/models", self.base_url)).header("Authorization", auth).send().await {
            Ok(response) if response.status().is_success() => {
                let latency_ms = start.elapsed().as_millis() as u64;
                let data: Value = response.json().await.unwrap_or(Value::Null);
                let models: Vec<String> = data["data"]
                    .as_array()
                    .map(|arr| arr.iter().filter_map(|m| m["id"].as_str().map(str::to_string)).collect())
                    .unwrap_or_default();
                let chat_models: Vec<String> = models.into_iter().filter(|m| m.to_lowercase().contains("gpt")).take(10).collect();
                ProviderHealth {
                    status: HealthStatus::Healthy,
                    latency_ms: Some(latency_ms),
                    last_check: Some(Utc::now()),
                    error: None,
                    models_available: Some(chat_models),
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
                error: Some(if e.is_connect() { "Cannot connect to OpenAI API".to_string() } else { e.to_string() }),
                models_available: None,
            },
        }
    }

    fn get_capabilities(&self, model: &str) -> ProviderCapabilities {
        self.capabilities
            .get(model)
            .cloned()
            .unwrap_or(ProviderCapabilities { strict_json: true, ..Default::default() })
    }

    async fn list_models(&self) -> Vec<String> {
        let Ok(auth) = self.bearer() else { return Vec::new() };
        match self.client.get(format!("{}/models", self.base_url)).header("Authorization", auth).send().await {
            Ok(response) if response.status().is_success() => response
                .json::<Value>()
                .await
                .ok()
                .and_then(|data| {
                    data["data"].as_array().map(|arr| {
                        arr.iter()
                            .filter_map(|m| m["id"].as_str().map(str::to_string))
                            .filter(|m| m.to_lowercase().contains("gpt"))
                            .collect()
                    })
                })
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }
}

fn down_error(e: &reqwest::Error) -> ProviderError {
    if e.is_connect() {
        ProviderError::ProviderDown { provider: "openai".to_string(), message: "Cannot connect to OpenAI API".to_string() }
    } else {
        ProviderError::ProviderDown { provider: "openai".to_string(), message: e.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn health_check_without_api_key_is_unhealthy() {
        let adapter = OpenAiAdapter::new(None);
        let health = adapter.health_check().await;
        assert_eq!(health.status, HealthStatus::Unhealthy);
        assert_eq!(health.error.as_deref(), Some("API key not configured"));
    }

    #[tokio::test]
    async fn list_models_without_api_key_is_empty() {
        let adapter = OpenAiAdapter::new(None);
        assert!(adapter.list_models().await.is_empty());
    }

    #[test]
    fn unknown_model_still_reports_strict_json() {
        let adapter = OpenAiAdapter::new(Some("sk-test".to_string()));
        let caps = adapter.get_capabilities("gpt-5-unreleased");
        assert!(caps.strict_json);
    }
}
