use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use skynet_core::config::MAX_PAYLOAD_BYTES;
use skynet_core::types::TriggerEnvelope;
use skynet_protocol::session_ws::{ClientFrame, ServerFrame};
use skynet_sessions::ChatRole;
use std::sync::Arc;
use tracing::{info, warn};

use crate::app::AppState;

/// Axum handler — upgrades HTTP to WebSocket at GET /ws/{session_id}.
pub async fn ws_handler(
    Path(session_id): Path<String>,
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, session_id, state))
}

/// Per-connection task — lives for the entire WS session lifetime.
async fn handle_connection(socket: WebSocket, session_id: String, state: Arc<AppState>) {
    info!(%session_id, "new WS connection");

    if let Err(e) = state.sessions.get_or_create(&session_id, &session_id) {
        warn!(%session_id, err = %e, "failed to ensure session exists");
    }

    let (mut sink, mut stream) = socket.split();
    let broadcaster = state.broadcasters.get_or_create(&session_id);
    let mut broadcast_rx = broadcaster.subscribe();

    replay_pending(&state, &session_id, &mut sink).await;

    loop {
        tokio::select! {
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let text_ref: &str = &text;
                        if text_ref.len() > MAX_PAYLOAD_BYTES {
                            warn!(%session_id, size = text_ref.len(), "payload too large, dropping connection");
                            break;
                        }
                        if !handle_client_frame(&state, &session_id, text_ref, &mut sink).await {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sink.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        warn!(%session_id, err = %e, "WS read error");
                        break;
                    }
                    _ => {}
                }
            }

            event = broadcast_rx.recv() => {
                match event {
                    Ok(payload) => {
                        if sink.send(Message::Text(payload.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!(%session_id, skipped = n, "connection lagging, disconnecting");
                        break;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    info!(%session_id, "WS connection closed");
}

/// Send every undelivered `PendingResult` for this session, oldest first,
/// then mark them delivered. Runs once per connect, before the select
/// loop starts, so nothing emitted meanwhile races with it.
async fn replay_pending(
    state: &Arc<AppState>,
    session_id: &str,
    sink: &mut futures_util::stream::SplitSink<WebSocket, Message>,
) {
    let pending = match state.sessions.undelivered(session_id) {
        Ok(rows) => rows,
        Err(e) => {
            warn!(%session_id, err = %e, "failed to load pending results");
            return;
        }
    };
    if pending.is_empty() {
        return;
    }
    for result in pending {
        let frame = ServerFrame::PendingResultReplay { result };
        if let Ok(json) = serde_json::to_string(&frame) {
            if sink.send(Message::Text(json.into())).await.is_err() {
                return;
            }
        }
    }
    if let Err(e) = state.sessions.mark_delivered(session_id) {
        warn!(%session_id, err = %e, "failed to mark pending results delivered");
    }
}

/// Handle one inbound client frame. Returns `false` if the connection
/// should be closed.
async fn handle_client_frame(
    state: &Arc<AppState>,
    session_id: &str,
    text: &str,
    sink: &mut futures_util::stream::SplitSink<WebSocket, Message>,
) -> bool {
    let frame: ClientFrame = match serde_json::from_str(text) {
        Ok(f) => f,
        Err(e) => {
            warn!(%session_id, err = %e, "malformed client frame, ignoring");
            return true;
        }
    };

    match frame {
        ClientFrame::Heartbeat(_) => {
            send_frame(sink, &ServerFrame::Heartbeat).await;
        }

        ClientFrame::SyncRequest(req) => {
            match state.sessions.messages_since(session_id, &req.timestamp) {
                Ok(messages) => send_frame(sink, &ServerFrame::SyncResponse { messages }).await,
                Err(e) => send_frame(sink, &ServerFrame::Error { message: e.to_string() }).await,
            }
        }

        ClientFrame::HistoryRequest(req) => {
            match state.sessions.recent_messages(session_id, req.limit as usize) {
                Ok(messages) => send_frame(sink, &ServerFrame::HistoryResponse { messages }).await,
                Err(e) => send_frame(sink, &ServerFrame::Error { message: e.to_string() }).await,
            }
        }

        ClientFrame::Chat(input) => {
            if let Err(e) = state.sessions.append_message(
                session_id,
                ChatRole::User,
                None,
                &input.message,
                serde_json::Value::Null,
            ) {
                send_frame(sink, &ServerFrame::Error { message: e.to_string() }).await;
                return true;
            }

            let root_agent = match state.agents.root() {
                Ok(spec) => spec.name,
                Err(e) => {
                    send_frame(sink, &ServerFrame::Error { message: e.to_string() }).await;
                    return true;
                }
            };

            let envelope = TriggerEnvelope {
                session_id: session_id.to_string(),
                initial_prompt: input.message,
                initial_agent: root_agent,
            };

            let runner = state.clone();
            tokio::spawn(async move {
                runner.run_trigger(envelope).await;
            });
        }
    }

    true
}

async fn send_frame(
    sink: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    frame: &ServerFrame,
) {
    if let Ok(json) = serde_json::to_string(frame) {
        let _ = sink.send(Message::Text(json.into())).await;
    }
}
