//! The event stream emitted by a running agent turn. Each variant mirrors
//! one `TurnEventKind` from `skynet_core::types` but carries the structured
//! payload subscribers (the WS fabric, persistence) actually need.

use serde::Serialize;
use serde_json::Value;
use skynet_core::types::TurnEventKind;

use crate::tool_registry::ToolStatus;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TurnEvent {
    TurnStarted {
        agent: String,
    },
    /// Emitted for every model response in a turn, possibly more than once
    /// across transfers. `is_final` marks the one that is durably persisted
    /// as a chat row; all others are still relayed to subscribers in order.
    ModelResponse {
        agent: String,
        text: String,
        is_final: bool,
    },
    ToolCall {
        name: String,
        args: Value,
    },
    ToolResult {
        name: String,
        status: ToolStatus,
        /// Error classification (`tool-timeout`, `tool-error`,
        /// `credential-missing`, ...), per the error-kind table. `None` on success.
        kind: Option<String>,
        truncated_value: Value,
    },
    AgentTransferred {
        from: String,
        to: String,
    },
    TurnCompleted,
    TurnAborted {
        reason: String,
    },
}

impl TurnEvent {
    pub fn kind(&self) -> TurnEventKind {
        match self {
            TurnEvent::TurnStarted { .. } => TurnEventKind::TurnStarted,
            TurnEvent::ModelResponse { .. } => TurnEventKind::ModelResponse,
            TurnEvent::ToolCall { .. } => TurnEventKind::ToolCall,
            TurnEvent::ToolResult { .. } => TurnEventKind::ToolResult,
            TurnEvent::AgentTransferred { .. } => TurnEventKind::AgentTransferred,
            TurnEvent::TurnCompleted => TurnEventKind::TurnCompleted,
            TurnEvent::TurnAborted { .. } => TurnEventKind::TurnAborted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        assert_eq!(TurnEvent::TurnCompleted.kind(), TurnEventKind::TurnCompleted);
        assert_eq!(
            TurnEvent::AgentTransferred { from: "root".into(), to: "billing".into() }.kind(),
            TurnEventKind::AgentTransferred
        );
    }

    #[test]
    fn serializes_with_kind_tag() {
        let event = TurnEvent::ToolCall { name: "memory_search".into(), args: serde_json::json!({"query": "x"}) };
        let v = serde_json::to_value(&event).unwrap();
        assert_eq!(v["kind"], "tool_call");
        assert_eq!(v["name"], "memory_search");
    }
}
