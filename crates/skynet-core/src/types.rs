use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifies a single agent (root orchestrator or specialist) by its
/// configured name. Agent names are stable, operator-chosen strings —
/// not generated IDs — since `AgentSpec` registries are defined in config.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentName(pub String);

impl AgentName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Name reserved for the root orchestrator.
    pub fn root() -> Self {
        Self("root".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0 == "root"
    }
}

impl fmt::Display for AgentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AgentName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for AgentName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A session's primary key — UUIDv4 per the entity's spec, generated at
/// session creation and otherwise opaque.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Per-connection identifier (random UUIDv4, never persisted).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnId(pub String);

impl ConnId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The set of event kinds emitted by a running agent turn onto a session's
/// broadcaster. Mirrors the event catalog in the orchestration spec exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnEventKind {
    TurnStarted,
    ModelResponse,
    ToolCall,
    ToolResult,
    AgentTransferred,
    TurnCompleted,
    TurnAborted,
}

/// The unit of work submitted to the Agent Orchestration Runtime by any
/// trigger source (chat WS, scheduler, webhook).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerEnvelope {
    pub session_id: String,
    pub initial_prompt: String,
    pub initial_agent: String,
}

impl fmt::Display for TurnEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TurnEventKind::TurnStarted => "turn_started",
            TurnEventKind::ModelResponse => "model_response",
            TurnEventKind::ToolCall => "tool_call",
            TurnEventKind::ToolResult => "tool_result",
            TurnEventKind::AgentTransferred => "agent_transferred",
            TurnEventKind::TurnCompleted => "turn_completed",
            TurnEventKind::TurnAborted => "turn_aborted",
        };
        write!(f, "{s}")
    }
}
