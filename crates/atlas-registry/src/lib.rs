// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

use atlas_providers::{HealthStatus, ProviderAdapter, ProviderCapabilities, ProviderHealth};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A point-in-time summary of one provider's registration and health.
#[derive(Debug, Clone)]
pub struct ProviderStatusSummary {
    /// Always `true` — only registered providers appear in a summary.
    pub registered: bool,
    /// Wire-form health status.
    pub status: &'static str,
    /// When health was last checked.
    pub last_check: Option<chrono::DateTime<chrono::Utc>>,
    /// Last observed health-check latency.
    pub latency_ms: Option<u64>,
    /// Last observed health error, if any.
    pub error: Option<String>,
}

/// Central registry for model providers (spec §4.4).
///
/// Manages registration, health monitoring, and capability queries for
/// all configured providers. Callers depend only on this registry and
/// the [`ProviderAdapter`] trait, never on a concrete adapter type.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: RwLock<HashMap<String, Arc<dyn ProviderAdapter>>>,
    health_cache: RwLock<HashMap<String, ProviderHealth>>,
}

impl ProviderRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider adapter, replacing any existing registration
    /// under the same name. Resets its cached health to unknown.
    pub async fn register(&self, provider: Arc<dyn ProviderAdapter>) {
        let name = provider.name().to_string();
        self.providers.write().await.insert(name.clone(), provider);
        self.health_cache.write().await.insert(name, ProviderHealth::unknown());
    }

    /// Remove a provider. Returns `true` if one was registered under that name.
    pub async fn unregister(&self, name: &str) -> bool {
        let removed = self.providers.write().await.remove(name).is_some();
        self.health_cache.write().await.remove(name);
        removed
    }

    /// Look up a registered provider by name.
    pub async fn get(&self, name: &str) -> Option<Arc<dyn ProviderAdapter>> {
        self.providers.read().await.get(name).cloned()
    }

    /// Names of every registered provider.
    pub async fn list_providers(&self) -> Vec<String> {
        self.providers.read().await.keys().cloned().collect()
    }

    /// Check and cache health for one provider.
    pub async fn check_health(&self, name: &str) -> ProviderHealth {
        let Some(provider) = self.get(name).await else {
            return ProviderHealth {
                status: HealthStatus::Unknown,
                latency_ms: None,
                last_check: None,
                error: Some(format!("Provider '{name}' not registered")),
                models_available: None,
            };
        };
        let health = provider.health_check().await;
        self.health_cache.write().await.insert(name.to_string(), health.clone());
        health
    }

    /// Check health of every registered provider.
    pub async fn check_all_health(&self) -> HashMap<String, ProviderHealth> {
        let names = self.list_providers().await;
        let mut results = HashMap::new();
        for name in names {
            results.insert(name.clone(), self.check_health(&name).await);
        }
        results
    }

    /// The last cached health reading for a provider, without re-probing it.
    pub async fn get_cached_health(&self, name: &str) -> Option<ProviderHealth> {
        self.health_cache.read().await.get(name).cloned()
    }

    /// Capabilities for a provider/model pair, or `None` if the provider
    /// isn't registered.
    pub async fn get_capabilities(&self, provider: &str, model: &str) -> Option<ProviderCapabilities> {
        self.get(provider).await.map(|adapter| adapter.get_capabilities(model))
    }

    /// Whether a provider might be usable right now: registered, and its
    /// cached health is healthy, degraded, or never-checked. Unhealthy
    /// providers are excluded so the fallback chain skips known-down
    /// providers without a fresh round-trip.
    pub async fn is_available(&self, name: &str) -> bool {
        if self.get(name).await.is_none() {
            return false;
        }
        match self.get_cached_health(name).await {
            None => true,
            Some(health) => !matches!(health.status, HealthStatus::Unhealthy),
        }
    }

    /// Models available from a provider, or an empty list if it isn't registered.
    pub async fn list_models(&self, provider: &str) -> Vec<String> {
        match self.get(provider).await {
            Some(adapter) => adapter.list_models().await,
            None => Vec::new(),
        }
    }

    /// A summary of every registered provider's status, for the `/v1/providers`
    /// endpoint.
    pub async fn get_status_summary(&self) -> HashMap<String, ProviderStatusSummary> {
        let names = self.list_providers().await;
        let mut summary = HashMap::new();
        for name in names {
            let health = self.get_cached_health(&name).await;
            summary.insert(
                name,
                ProviderStatusSummary {
                    registered: true,
                    status: health.as_ref().map(|h| h.status.as_str()).unwrap_or("UNKNOWN"),
                    last_check: health.as_ref().and_then(|h| h.last_check),
                    latency_ms: health.as_ref().and_then(|h| h.latency_ms),
                    error: health.as_ref().and_then(|h| h.error.clone()),
                },
            );
        }
        summary
    }

    /// Close every registered provider's connections.
    pub async fn close_all(&self) {
        let providers: Vec<Arc<dyn ProviderAdapter>> = self.providers.read().await.values().cloned().collect();
        for provider in providers {
            provider.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atlas_providers::MockAdapter;

    #[tokio::test]
    async fn register_then_get_round_trips() {
        let registry = ProviderRegistry::new();
        registry.register(Arc::new(MockAdapter::always_succeeding("mock", "hi"))).await;
        assert!(registry.get("mock").await.is_some());
        assert_eq!(registry.list_providers().await, vec!["mock".to_string()]);
    }

    #[tokio::test]
    async fn unregister_removes_provider_and_cached_health() {
        let registry = ProviderRegistry::new();
        registry.register(Arc::new(MockAdapter::always_succeeding("mock", "hi"))).await;
        assert!(registry.unregister("mock").await);
        assert!(registry.get("mock").await.is_none());
        assert!(registry.get_cached_health("mock").await.is_none());
    }

    #[tokio::test]
    async fn unregistered_provider_is_unavailable() {
        let registry = ProviderRegistry::new();
        assert!(!registry.is_available("nope").await);
    }

    #[tokio::test]
    async fn freshly_registered_provider_with_no_health_check_is_available() {
        let registry = ProviderRegistry::new();
        registry.register(Arc::new(MockAdapter::always_succeeding("mock", "hi"))).await;
        assert!(registry.is_available("mock").await);
    }

    #[tokio::test]
    async fn check_health_updates_cache() {
        let registry = ProviderRegistry::new();
        registry.register(Arc::new(MockAdapter::always_succeeding("mock", "hi"))).await;
        let health = registry.check_health("mock").await;
        assert_eq!(health.status, HealthStatus::Healthy);
        let cached = registry.get_cached_health("mock").await.unwrap();
        assert_eq!(cached.status, HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn check_health_for_unregistered_provider_is_unknown_with_error() {
        let registry = ProviderRegistry::new();
        let health = registry.check_health("nope").await;
        assert_eq!(health.status, HealthStatus::Unknown);
        assert!(health.error.is_some());
    }
}
