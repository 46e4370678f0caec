use serde::{Deserialize, Serialize};

/// A persisted conversation session. At most one row per `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// UUIDv4 primary key.
    pub id: String,
    /// User-chosen or auto-derived display name.
    pub name: String,
    /// RFC3339 creation timestamp.
    pub created_at: String,
    /// RFC3339 timestamp of the most recent message, if any.
    pub last_message_at: Option<String>,
    /// Short string derived from the last message, for session-list UIs.
    pub preview: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    System,
}

impl std::fmt::Display for ChatRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::System => write!(f, "system"),
        }
    }
}

impl std::str::FromStr for ChatRole {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "system" => Ok(Self::System),
            other => Err(format!("unknown chat role: {other}")),
        }
    }
}

/// A single persisted message. Ordering within a session is total on
/// `(timestamp, id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub session_id: String,
    pub role: ChatRole,
    /// Which specialist produced this message. Only set for `role=assistant`.
    pub agent_name: Option<String>,
    pub content: String,
    pub timestamp: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// The source that produced a `PendingResult`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerOrigin {
    Scheduler,
    Webhook,
}

impl std::fmt::Display for TriggerOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scheduler => write!(f, "scheduler"),
            Self::Webhook => write!(f, "webhook"),
        }
    }
}

impl std::str::FromStr for TriggerOrigin {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduler" => Ok(Self::Scheduler),
            "webhook" => Ok(Self::Webhook),
            other => Err(format!("unknown trigger origin: {other}")),
        }
    }
}

/// Created when a scheduler/webhook trigger fires, updated when the agent
/// run completes, and marked `delivered` once a connected client has
/// consumed it (sync-on-reconnect).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingResult {
    pub id: String,
    pub origin: TriggerOrigin,
    pub session_id: String,
    pub prompt: String,
    pub response: Option<String>,
    pub delivered: bool,
    pub created_at: String,
}

/// A user-facing todo/reminder item. Optionally scoped to a session so a
/// conversation can surface "your open items" without a separate join.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub session_id: Option<String>,
    pub title: String,
    pub notes: Option<String>,
    pub done: bool,
    /// RFC3339 due timestamp, if any.
    pub due_at: Option<String>,
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_role_roundtrips_through_display_and_fromstr() {
        for role in [ChatRole::User, ChatRole::Assistant, ChatRole::System] {
            let s = role.to_string();
            assert_eq!(s.parse::<ChatRole>().unwrap(), role);
        }
    }

    #[test]
    fn trigger_origin_roundtrips() {
        for origin in [TriggerOrigin::Scheduler, TriggerOrigin::Webhook] {
            let s = origin.to_string();
            assert_eq!(s.parse::<TriggerOrigin>().unwrap(), origin);
        }
    }
}
