use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::broadcast;

const BROADCAST_CAPACITY: usize = 256;

/// Fan-out point for a single session. One instance lives in the registry
/// for as long as at least one connection has referenced it; the
/// underlying `broadcast` channel just drops frames when nobody is
/// listening, so we never need to tear these down explicitly.
pub struct SessionBroadcaster {
    tx: broadcast::Sender<String>,
}

impl SessionBroadcaster {
    fn new() -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self { tx }
    }

    /// Register a new subscriber. Each connection holds its own receiver
    /// with its own lag tracking, so one slow consumer never blocks others.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    /// Serialize and publish a server frame. Silently a no-op if there are
    /// currently no subscribers.
    pub fn publish(&self, frame: &impl Serialize) {
        match serde_json::to_string(frame) {
            Ok(payload) => {
                let _ = self.tx.send(payload);
            }
            Err(e) => tracing::warn!(err = %e, "failed to serialize server frame"),
        }
    }
}

/// Per-session broadcasters, created lazily on first `/ws/{session_id}`
/// connect or first trigger targeting that session.
#[derive(Clone, Default)]
pub struct BroadcasterRegistry {
    sessions: Arc<DashMap<String, Arc<SessionBroadcaster>>>,
}

impl BroadcasterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(&self, session_id: &str) -> Arc<SessionBroadcaster> {
        self.sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(SessionBroadcaster::new()))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn subscriber_receives_published_frame() {
        let registry = BroadcasterRegistry::new();
        let broadcaster = registry.get_or_create("s1");
        let mut rx = broadcaster.subscribe();

        broadcaster.publish(&json!({"type": "heartbeat"}));

        let received = rx.recv().await.unwrap();
        assert_eq!(received, r#"{"type":"heartbeat"}"#);
    }

    #[test]
    fn same_session_id_returns_same_broadcaster() {
        let registry = BroadcasterRegistry::new();
        let a = registry.get_or_create("s1");
        let b = registry.get_or_create("s1");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn different_session_ids_get_distinct_broadcasters() {
        let registry = BroadcasterRegistry::new();
        let a = registry.get_or_create("s1");
        let b = registry.get_or_create("s2");
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
