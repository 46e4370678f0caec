//! The `/ws/{session_id}` frame shapes per the session broadcast contract:
//! heartbeat echo, sync-on-reconnect, bounded history, and freeform chat
//! input.

use serde::{Deserialize, Serialize};
use skynet_sessions::types::{ChatMessage, PendingResult};

/// Client → Server frame on the session socket.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ClientFrame {
    Heartbeat(HeartbeatFrame),
    SyncRequest(SyncRequest),
    HistoryRequest(HistoryRequest),
    Chat(ChatInput),
}

#[derive(Debug, Clone, Deserialize)]
pub struct HeartbeatFrame {
    #[serde(rename = "type")]
    pub frame_type: HeartbeatTag,
}

#[derive(Debug, Clone, Deserialize)]
pub enum HeartbeatTag {
    #[serde(rename = "heartbeat")]
    Heartbeat,
}

/// `{ lastMessageId, timestamp }` — reply with every persisted message for
/// this session with `timestamp` greater than the one given, ascending.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncRequest {
    #[serde(rename = "lastMessageId")]
    pub last_message_id: Option<String>,
    pub timestamp: String,
}

/// `{ limit }` — reply with the last `limit` persisted messages.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryRequest {
    pub limit: u32,
}

/// `{ message: "..." }` — treated as user input for the session's agent.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatInput {
    pub message: String,
}

/// Server → Client frame on the session socket.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    Heartbeat,
    SyncResponse { messages: Vec<ChatMessage> },
    HistoryResponse { messages: Vec<ChatMessage> },
    TurnEvent { event: serde_json::Value },
    ScheduledTaskResult { task_name: String, prompt: String, response: Option<String> },
    WebhookResult { path: String, response: Option<String> },
    PendingResultReplay { result: PendingResult },
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_input_parses_from_bare_message_object() {
        let frame: ClientFrame = serde_json::from_str(r#"{"message":"hello"}"#).unwrap();
        assert!(matches!(frame, ClientFrame::Chat(ChatInput { message }) if message == "hello"));
    }

    #[test]
    fn heartbeat_parses_by_type_tag() {
        let frame: ClientFrame = serde_json::from_str(r#"{"type":"heartbeat"}"#).unwrap();
        assert!(matches!(frame, ClientFrame::Heartbeat(_)));
    }

    #[test]
    fn sync_request_parses_optional_last_message_id() {
        let frame: ClientFrame = serde_json::from_str(r#"{"lastMessageId":null,"timestamp":"2026-01-01T00:00:00Z"}"#).unwrap();
        assert!(matches!(frame, ClientFrame::SyncRequest(_)));
    }

    #[test]
    fn history_request_parses_limit() {
        let frame: ClientFrame = serde_json::from_str(r#"{"limit":20}"#).unwrap();
        assert!(matches!(frame, ClientFrame::HistoryRequest(HistoryRequest { limit: 20 })));
    }

    #[test]
    fn server_frame_heartbeat_serializes_with_type_tag() {
        let json = serde_json::to_string(&ServerFrame::Heartbeat).unwrap();
        assert_eq!(json, r#"{"type":"heartbeat"}"#);
    }
}
