//! Tool Registry & Invocation — every tool invoker receives an
//! `InvocationContext`; results follow a uniform `{status, ...}` shape, with
//! compact truncation applied for model feedback while the full value is
//! still carried in the emitted event.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::invocation::InvocationContext;
use crate::provider::ToolDefinition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolOutcome {
    pub status: ToolStatus,
    pub value: Value,
    /// Error classification per the error-kind table (`tool-timeout`,
    /// `tool-error`, `credential-missing`, ...). `None` on success.
    pub kind: Option<String>,
}

impl ToolOutcome {
    pub fn success(value: Value) -> Self {
        Self { status: ToolStatus::Success, value, kind: None }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { status: ToolStatus::Error, value: Value::String(message.into()), kind: Some("tool-error".to_string()) }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self { status: ToolStatus::Error, value: Value::String(message.into()), kind: Some("tool-timeout".to_string()) }
    }

    pub fn credential_missing(message: impl Into<String>) -> Self {
        Self { status: ToolStatus::Error, value: Value::String(message.into()), kind: Some("credential-missing".to_string()) }
    }

    /// Render a compact copy for model feedback: string values longer than
    /// `cap` chars are truncated; everything else passes through unchanged.
    pub fn truncated(&self, cap: usize) -> Value {
        match &self.value {
            Value::String(s) if s.chars().count() > cap => {
                let truncated: String = s.chars().take(cap).collect();
                Value::String(format!("{truncated}... [truncated]"))
            }
            other => other.clone(),
        }
    }
}

#[async_trait]
pub trait ToolInvoker: Send + Sync {
    async fn invoke(&self, args: Value, ctx: &InvocationContext) -> ToolOutcome;
}

pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameter_schema: Value,
    invoker: Arc<dyn ToolInvoker>,
}

impl ToolDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameter_schema: Value,
        invoker: Arc<dyn ToolInvoker>,
    ) -> Self {
        Self { name: name.into(), description: description.into(), parameter_schema, invoker }
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.parameter_schema.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ToolRegistryError {
    #[error("unknown tool: {name}")]
    UnknownTool { name: String },
    #[error("tool {name} timed out after {timeout_ms}ms")]
    Timeout { name: String, timeout_ms: u64 },
}

pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolDescriptor>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: HashMap::new() }
    }

    pub fn register(&mut self, descriptor: ToolDescriptor) {
        self.tools.insert(descriptor.name.clone(), descriptor);
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.get(name)
    }

    /// The subset of tool definitions named in `tool_names`, in the order
    /// given — this becomes the catalog presented to the model for one
    /// agent's turn. Names that are not registered are silently skipped;
    /// config validation is responsible for catching typos earlier.
    pub fn definitions_for(&self, tool_names: &[String]) -> Vec<ToolDefinition> {
        tool_names.iter().filter_map(|n| self.tools.get(n)).map(ToolDescriptor::definition).collect()
    }

    pub async fn invoke(
        &self,
        name: &str,
        args: Value,
        ctx: &InvocationContext,
        timeout: Duration,
    ) -> Result<ToolOutcome, ToolRegistryError> {
        let descriptor = self.get(name).ok_or_else(|| ToolRegistryError::UnknownTool { name: name.to_string() })?;
        match tokio::time::timeout(timeout, descriptor.invoker.invoke(args, ctx)).await {
            Ok(outcome) => Ok(outcome),
            Err(_) => Err(ToolRegistryError::Timeout { name: name.to_string(), timeout_ms: timeout.as_millis() as u64 }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct Echo;

    #[async_trait]
    impl ToolInvoker for Echo {
        async fn invoke(&self, args: Value, _ctx: &InvocationContext) -> ToolOutcome {
            ToolOutcome::success(args)
        }
    }

    struct Hangs;

    #[async_trait]
    impl ToolInvoker for Hangs {
        async fn invoke(&self, _args: Value, _ctx: &InvocationContext) -> ToolOutcome {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            ToolOutcome::success(Value::Null)
        }
    }

    fn ctx() -> InvocationContext {
        InvocationContext {
            session_id: "s1".to_string(),
            memory: skynet_memory::MemoryService::in_memory().unwrap(),
            config: skynet_core::config::ConfigSnapshot {
                base: skynet_core::config::SkynetConfig::default(),
                overlay: serde_json::Map::new(),
            },
            credentials: Arc::new(
                skynet_credentials::CredentialStore::new(
                    rusqlite::Connection::open_in_memory().unwrap(),
                    "test-key-that-is-at-least-32-bytes!",
                )
                .unwrap(),
            ),
            agent_memory_scope: None,
        }
    }

    #[tokio::test]
    async fn invoke_unknown_tool_errors() {
        let registry = ToolRegistry::new();
        let err = registry.invoke("nope", Value::Null, &ctx(), DEFAULT_TOOL_TIMEOUT).await.unwrap_err();
        assert!(matches!(err, ToolRegistryError::UnknownTool { .. }));
    }

    #[tokio::test]
    async fn invoke_dispatches_to_registered_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(ToolDescriptor::new("echo", "echoes input", serde_json::json!({}), Arc::new(Echo)));
        let outcome = registry.invoke("echo", serde_json::json!({"a": 1}), &ctx(), DEFAULT_TOOL_TIMEOUT).await.unwrap();
        assert_eq!(outcome.status, ToolStatus::Success);
        assert_eq!(outcome.value, serde_json::json!({"a": 1}));
    }

    #[tokio::test]
    async fn invoke_times_out() {
        let mut registry = ToolRegistry::new();
        registry.register(ToolDescriptor::new("hangs", "never returns", serde_json::json!({}), Arc::new(Hangs)));
        let err = registry
            .invoke("hangs", Value::Null, &ctx(), Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolRegistryError::Timeout { .. }));
    }

    #[test]
    fn truncated_shortens_long_strings() {
        let outcome = ToolOutcome::success(Value::String("x".repeat(100)));
        let Value::String(s) = outcome.truncated(10) else { panic!("expected string") };
        assert!(s.starts_with("xxxxxxxxxx"));
        assert!(s.ends_with("[truncated]"));
    }

    #[test]
    fn truncated_passes_short_values_through() {
        let outcome = ToolOutcome::success(serde_json::json!({"ok": true}));
        assert_eq!(outcome.truncated(10), serde_json::json!({"ok": true}));
    }
}
