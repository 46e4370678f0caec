//! `memory_search` / `memory_store` — the two tools every agent carries
//! regardless of its configured `tool_names`, since the turn loop always
//! makes the memory surface available.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::invocation::InvocationContext;
use crate::tool_registry::{ToolDescriptor, ToolInvoker, ToolOutcome};

pub const MEMORY_SEARCH: &str = "memory_search";
pub const MEMORY_STORE: &str = "memory_store";

const DEFAULT_K: usize = 5;

struct MemorySearchTool;

#[async_trait]
impl ToolInvoker for MemorySearchTool {
    async fn invoke(&self, args: Value, ctx: &InvocationContext) -> ToolOutcome {
        let Some(query) = args.get("query").and_then(Value::as_str) else {
            return ToolOutcome::error("memory_search requires a string `query`");
        };
        let k = args.get("k").and_then(Value::as_u64).map(|k| k as usize).unwrap_or(DEFAULT_K);
        // `scope: "global"` opts out of the caller agent's memory_scope filter.
        let scope = match args.get("scope").and_then(Value::as_str) {
            Some("global") => None,
            Some(other) => Some(other.to_string()),
            None => ctx.agent_memory_scope.clone(),
        };

        match ctx.memory.search(query, k, scope.as_deref()) {
            Ok(hits) => ToolOutcome::success(serde_json::to_value(hits).unwrap_or(Value::Null)),
            Err(e) => ToolOutcome::error(format!("memory search failed: {e}")),
        }
    }
}

struct MemoryStoreTool;

#[async_trait]
impl ToolInvoker for MemoryStoreTool {
    async fn invoke(&self, args: Value, ctx: &InvocationContext) -> ToolOutcome {
        let Some(text) = args.get("text").and_then(Value::as_str) else {
            return ToolOutcome::error("memory_store requires a string `text`");
        };
        let memory_type = args.get("memory_type").and_then(Value::as_str).unwrap_or("fact");
        let id = Uuid::new_v4().to_string();

        match ctx.memory.store(&id, text, ctx.agent_memory_scope.as_deref(), memory_type, Value::Null) {
            Ok(()) => ToolOutcome::success(serde_json::json!({"id": id})),
            Err(e) => ToolOutcome::error(format!("memory store failed: {e}")),
        }
    }
}

fn search_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "query": {"type": "string", "description": "Natural-language search text"},
            "k": {"type": "integer", "description": "Number of results to return", "default": DEFAULT_K},
            "scope": {"type": "string", "description": "\"global\" to search across all agents' memory"}
        },
        "required": ["query"]
    })
}

fn store_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "text": {"type": "string", "description": "The content to remember"},
            "memory_type": {"type": "string", "description": "Free-form category, e.g. \"fact\" or \"event\""}
        },
        "required": ["text"]
    })
}

pub fn register_core_tools(registry: &mut crate::tool_registry::ToolRegistry) {
    registry.register(ToolDescriptor::new(
        MEMORY_SEARCH,
        "Search long-term memory for items relevant to a query",
        search_schema(),
        Arc::new(MemorySearchTool),
    ));
    registry.register(ToolDescriptor::new(
        MEMORY_STORE,
        "Store a piece of text in long-term memory",
        store_schema(),
        Arc::new(MemoryStoreTool),
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool_registry::{ToolRegistry, ToolStatus, DEFAULT_TOOL_TIMEOUT};

    fn ctx(memory_scope: Option<&str>) -> InvocationContext {
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
            agent_memory_scope: memory_scope.map(String::from),
        }
    }

    #[tokio::test]
    async fn store_then_search_round_trips_through_registry() {
        let mut registry = ToolRegistry::new();
        register_core_tools(&mut registry);
        let context = ctx(Some("billing"));

        let stored = registry
            .invoke(MEMORY_STORE, serde_json::json!({"text": "invoice #42 is overdue"}), &context, DEFAULT_TOOL_TIMEOUT)
            .await
            .unwrap();
        assert_eq!(stored.status, ToolStatus::Success);

        let found = registry
            .invoke(MEMORY_SEARCH, serde_json::json!({"query": "invoice overdue"}), &context, DEFAULT_TOOL_TIMEOUT)
            .await
            .unwrap();
        assert_eq!(found.status, ToolStatus::Success);
        assert!(found.value.as_array().unwrap().len() >= 1);
    }

    #[tokio::test]
    async fn search_scoped_to_other_agent_finds_nothing() {
        let mut registry = ToolRegistry::new();
        register_core_tools(&mut registry);

        registry
            .invoke(MEMORY_STORE, serde_json::json!({"text": "secret note"}), &ctx(Some("billing")), DEFAULT_TOOL_TIMEOUT)
            .await
            .unwrap();

        let found = registry
            .invoke(MEMORY_SEARCH, serde_json::json!({"query": "secret note"}), &ctx(Some("scheduling")), DEFAULT_TOOL_TIMEOUT)
            .await
            .unwrap();
        assert_eq!(found.value.as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn missing_query_is_a_tool_error_not_a_panic() {
        let mut registry = ToolRegistry::new();
        register_core_tools(&mut registry);
        let outcome = registry.invoke(MEMORY_SEARCH, serde_json::json!({}), &ctx(None), DEFAULT_TOOL_TIMEOUT).await.unwrap();
        assert_eq!(outcome.status, ToolStatus::Error);
    }
}
