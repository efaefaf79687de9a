// SPDX-License-Identifier: MIT OR Apache-2.0
use crate::base::{Tool, ToolResult};
use atlas_core::{RiskLevel, ToolCall};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Metadata about a registered tool, for the `/v1/tools` endpoint.
#[derive(Debug, Clone)]
pub struct ToolInfo {
    /// Tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Risk level.
    pub risk_level: RiskLevel,
    /// Whether the tool needs confirmation before running.
    pub requires_confirmation: bool,
}

/// Central registry for all tools (spec §4.6).
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<BTreeMap<String, Arc<dyn Tool>>>,
}

impl ToolRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any existing registration under the same name.
    pub async fn register(&self, tool: Arc<dyn Tool>) {
        self.tools.write().await.insert(tool.name().to_string(), tool);
    }

    /// Remove a tool. Returns `true` if one was registered under that name.
    pub async fn unregister(&self, name: &str) -> bool {
        self.tools.write().await.remove(name).is_some()
    }

    /// Look up a tool by name.
    pub async fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.read().await.get(name).cloned()
    }

    /// Names of every registered tool.
    pub async fn list_tools(&self) -> Vec<String> {
        self.tools.read().await.keys().cloned().collect()
    }

    /// Metadata about every registered tool.
    pub async fn get_tool_info(&self) -> Vec<ToolInfo> {
        self.tools
            .read()
            .await
            .values()
            .map(|tool| ToolInfo {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                risk_level: tool.risk_level(),
                requires_confirmation: tool.requires_confirmation(),
            })
            .collect()
    }

    /// Execute a tool by name.
    ///
    /// - An unknown tool name produces a `FAILED` [`ToolCall`] and no result.
    /// - A tool that requires confirmation, when `skip_confirmation` is
    ///   `false`, produces a `PENDING_CONFIRM` call and is NOT run.
    /// - Otherwise the tool runs; its outcome maps to `OK`/`FAILED`, and any
    ///   error it returns is caught here rather than propagated.
    pub async fn execute(
        &self,
        tool_name: &str,
        args: BTreeMap<String, Value>,
        skip_confirmation: bool,
    ) -> (ToolCall, Option<ToolResult>) {
        let Some(tool) = self.get(tool_name).await else {
            return (ToolCall::failed(tool_name, args, format!("Tool not found: {tool_name}")), None);
        };

        if tool.requires_confirmation() && !skip_confirmation {
            return (ToolCall::pending_confirm(tool_name, args), None);
        }

        match tool.execute(&args).await {
            Ok(result) => {
                let call = if result.success {
                    ToolCall::ok(tool_name, args, result.data.clone())
                } else {
                    ToolCall::failed(tool_name, args, result.error.clone().unwrap_or_default())
                };
                (call, Some(result))
            }
            Err(error) => (ToolCall::failed(tool_name, args, error), None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "ECHO"
        }
        fn risk_level(&self) -> RiskLevel {
            RiskLevel::Low
        }
        async fn execute(&self, args: &BTreeMap<String, Value>) -> Result<ToolResult, String> {
            Ok(ToolResult::ok(serde_json::json!({"echoed": args})))
        }
    }

    struct ConfirmTool;

    #[async_trait]
    impl Tool for ConfirmTool {
        fn name(&self) -> &str {
            "DANGEROUS"
        }
        fn risk_level(&self) -> RiskLevel {
            RiskLevel::High
        }
        async fn execute(&self, _args: &BTreeMap<String, Value>) -> Result<ToolResult, String> {
            Ok(ToolResult::ok(Value::Null))
        }
    }

    struct ExplodingTool;

    #[async_trait]
    impl Tool for ExplodingTool {
        fn name(&self) -> &str {
            "EXPLODE"
        }
        fn risk_level(&self) -> RiskLevel {
            RiskLevel::Low
        }
        async fn execute(&self, _args: &BTreeMap<String, Value>) -> Result<ToolResult, String> {
            Err("kaboom".to_string())
        }
    }

    #[tokio::test]
    async fn unknown_tool_fails() {
        let registry = ToolRegistry::new();
        let (call, result) = registry.execute("NOPE", BTreeMap::new(), false).await;
        assert_eq!(call.status, atlas_core::ToolCallStatus::Failed);
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn low_risk_tool_runs_immediately() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool)).await;
        let (call, result) = registry.execute("ECHO", BTreeMap::new(), false).await;
        assert_eq!(call.status, atlas_core::ToolCallStatus::Ok);
        assert!(result.is_some());
    }

    #[tokio::test]
    async fn high_risk_tool_without_skip_is_pending_confirm_and_does_not_run() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(ConfirmTool)).await;
        let (call, result) = registry.execute("DANGEROUS", BTreeMap::new(), false).await;
        assert_eq!(call.status, atlas_core::ToolCallStatus::PendingConfirm);
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn high_risk_tool_with_skip_runs() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(ConfirmTool)).await;
        let (call, result) = registry.execute("DANGEROUS", BTreeMap::new(), true).await;
        assert_eq!(call.status, atlas_core::ToolCallStatus::Ok);
        assert!(result.is_some());
    }

    #[tokio::test]
    async fn tool_error_is_caught_and_recorded_as_failed() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(ExplodingTool)).await;
        let (call, result) = registry.execute("EXPLODE", BTreeMap::new(), false).await;
        assert_eq!(call.status, atlas_core::ToolCallStatus::Failed);
        assert_eq!(call.error.as_deref(), Some("kaboom"));
        assert!(result.is_none());
    }
}
