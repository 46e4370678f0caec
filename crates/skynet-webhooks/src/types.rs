use serde::{Deserialize, Serialize};

/// A registered webhook endpoint. No two definitions share `path_suffix`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookDefinition {
    /// UUIDv4 primary key.
    pub id: String,
    /// Unique human-readable label.
    pub name: String,
    /// URL-safe path segment: the endpoint is served at
    /// `POST /webhooks/trigger/{path_suffix}`.
    pub path_suffix: String,
    /// Prompt template with `{{payload.a.b.0.c}}` placeholders resolved
    /// against the decoded JSON body at dispatch time.
    pub prompt_template: String,
    /// HMAC-SHA256 signing secret. `None` disables signature verification
    /// for this endpoint.
    pub secret: Option<String>,
    pub enabled: bool,
    pub trigger_count: u64,
    pub last_triggered_at: Option<String>,
    /// Target session for result broadcast; `None` routes to a default session.
    pub session_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}
