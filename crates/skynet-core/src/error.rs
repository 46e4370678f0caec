use thiserror::Error;

#[derive(Debug, Error)]
pub enum SkynetError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("WebSocket protocol error: {0}")]
    Protocol(String),

    #[error("Method not found: {method}")]
    MethodNotFound { method: String },

    #[error("Permission denied: {reason}")]
    PermissionDenied { reason: String },

    #[error("Session not found: {id}")]
    SessionNotFound { id: String },

    #[error("Agent not found: {name}")]
    AgentNotFound { name: String },

    #[error("Illegal transfer from '{from}' to '{to}'")]
    IllegalTransfer { from: String, to: String },

    #[error("Tool not found: {name}")]
    ToolNotFound { name: String },

    #[error("Tool invocation failed: {0}")]
    ToolFailed(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("LLM provider error: {0}")]
    LlmProvider(String),

    #[error("Model unavailable after retries: {0}")]
    ModelUnavailable(String),

    #[error("Webhook error: {0}")]
    Webhook(String),

    #[error("Credential error: {0}")]
    Credential(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Request timeout after {ms}ms")]
    Timeout { ms: u64 },

    #[error("Turn budget exhausted: {0}")]
    BudgetExhausted(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SkynetError {
    /// Short error code string sent to clients in WS RES frames and REST bodies.
    pub fn code(&self) -> &'static str {
        match self {
            SkynetError::Config(_) => "CONFIG_ERROR",
            SkynetError::AuthFailed(_) => "AUTH_FAILED",
            SkynetError::Protocol(_) => "PROTOCOL_ERROR",
            SkynetError::MethodNotFound { .. } => "METHOD_NOT_FOUND",
            SkynetError::PermissionDenied { .. } => "PERMISSION_DENIED",
            SkynetError::SessionNotFound { .. } => "SESSION_NOT_FOUND",
            SkynetError::AgentNotFound { .. } => "AGENT_NOT_FOUND",
            SkynetError::IllegalTransfer { .. } => "ILLEGAL_TRANSFER",
            SkynetError::ToolNotFound { .. } => "TOOL_NOT_FOUND",
            SkynetError::ToolFailed(_) => "TOOL_FAILED",
            SkynetError::Database(_) => "DATABASE_ERROR",
            SkynetError::LlmProvider(_) => "LLM_PROVIDER_ERROR",
            SkynetError::ModelUnavailable(_) => "MODEL_UNAVAILABLE",
            SkynetError::Webhook(_) => "WEBHOOK_ERROR",
            SkynetError::Credential(_) => "CREDENTIAL_ERROR",
            SkynetError::Serialization(_) => "SERIALIZATION_ERROR",
            SkynetError::Io(_) => "IO_ERROR",
            SkynetError::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            SkynetError::Timeout { .. } => "TIMEOUT",
            SkynetError::BudgetExhausted(_) => "BUDGET_EXHAUSTED",
            SkynetError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, SkynetError>;
