use std::sync::Arc;

use axum::routing::{delete, get, post, put};
use axum::Router;
use skynet_agent::{AgentOrchestrator, AgentRegistry, TurnEvent, TurnOutcome};
use skynet_core::config::ConfigResolver;
use skynet_core::types::TriggerEnvelope;
use skynet_credentials::CredentialStore;
use skynet_scheduler::SchedulerHandle;
use skynet_sessions::{ChatRole, SessionManager};
use skynet_webhooks::WebhookStore;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;
use tracing::{instrument, warn};

use crate::http;
use crate::ws::broadcast::BroadcasterRegistry;
use crate::ws::connection::ws_handler;

/// Central shared state — passed as `Arc<AppState>` to all Axum handlers.
pub struct AppState {
    pub config: Arc<ConfigResolver>,
    pub sessions: Arc<SessionManager>,
    pub scheduler: Arc<SchedulerHandle>,
    pub webhooks: Arc<WebhookStore>,
    pub agents: Arc<AgentRegistry>,
    pub orchestrator: Arc<AgentOrchestrator>,
    pub credentials: Arc<CredentialStore>,
    pub broadcasters: BroadcasterRegistry,
    pub admin_token: Option<String>,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Arc<ConfigResolver>,
        sessions: Arc<SessionManager>,
        scheduler: Arc<SchedulerHandle>,
        webhooks: Arc<WebhookStore>,
        agents: Arc<AgentRegistry>,
        orchestrator: Arc<AgentOrchestrator>,
        credentials: Arc<CredentialStore>,
    ) -> Self {
        let admin_token = config.base().admin_token.clone();
        Self {
            config,
            sessions,
            scheduler,
            webhooks,
            agents,
            orchestrator,
            credentials,
            broadcasters: BroadcasterRegistry::new(),
            admin_token,
        }
    }

    /// Run a trigger to completion: drive the turn loop, persist the final
    /// assistant message as each event streams in, and fan every event out
    /// to the session's broadcaster. The caller is responsible for
    /// persisting any user-authored message before calling this (scheduler
    /// and webhook triggers have no user message to persist).
    #[instrument(skip(self, envelope), fields(session_id = %envelope.session_id))]
    pub async fn run_trigger(&self, envelope: TriggerEnvelope) -> TurnOutcome {
        let session_id = envelope.session_id.clone();
        let _ = self.sessions.get_or_create(&session_id, &session_id);

        let (tx, mut rx) = mpsc::channel::<TurnEvent>(64);
        let broadcaster = self.broadcasters.get_or_create(&session_id);
        let sessions = self.sessions.clone();
        let forward_session_id = session_id.clone();

        let forward = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match &event {
                    TurnEvent::ModelResponse { agent, text, is_final } if *is_final => {
                        if let Err(e) = sessions.append_message(
                            &forward_session_id,
                            ChatRole::Assistant,
                            Some(agent),
                            text,
                            serde_json::Value::Null,
                        ) {
                            warn!(err = %e, "failed to persist assistant message");
                        }
                    }
                    // Aborted triggers never drop silently — one system
                    // chat message explains why.
                    TurnEvent::TurnAborted { reason } => {
                        if let Err(e) = sessions.append_message(
                            &forward_session_id,
                            ChatRole::System,
                            None,
                            &format!("Turn aborted: {reason}"),
                            serde_json::Value::Null,
                        ) {
                            warn!(err = %e, "failed to persist turn-aborted system message");
                        }
                    }
                    _ => {}
                }
                let payload = serde_json::to_value(&event).unwrap_or(serde_json::Value::Null);
                broadcaster.publish(&skynet_protocol::session_ws::ServerFrame::TurnEvent { event: payload });
            }
        });

        let outcome = self.orchestrator.run_trigger(envelope, tx).await;
        let _ = forward.await;
        outcome
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(http::health::health_handler))
        .route("/api/sessions/", get(http::sessions::list))
        .route("/api/sessions/create", post(http::sessions::create))
        .route("/api/sessions/{id}", put(http::sessions::rename).delete(http::sessions::delete_session))
        .route("/api/sessions/{id}/messages", get(http::sessions::messages))
        .route("/ws/{session_id}", get(ws_handler))
        .route("/api/scheduled-tasks/", get(http::scheduler::list))
        .route("/api/scheduled-tasks/create", post(http::scheduler::create))
        .route("/api/scheduled-tasks/{id}", delete(http::scheduler::delete_task))
        .route("/api/scheduled-tasks/{id}/enabled", put(http::scheduler::set_enabled))
        .route("/api/webhooks/", get(http::webhooks::list))
        .route("/api/webhooks/create", post(http::webhooks::create))
        .route("/api/webhooks/{id}", delete(http::webhooks::delete_webhook))
        .route("/api/webhooks/{id}/enabled", put(http::webhooks::set_enabled))
        .route("/webhooks/trigger/{path_suffix}", post(http::webhooks::receive))
        .route("/api/tasks/", get(http::tasks::list))
        .route("/api/tasks/create", post(http::tasks::create))
        .route("/api/tasks/{id}/done", put(http::tasks::set_done))
        .route("/api/tasks/{id}", delete(http::tasks::delete_task))
        .route("/admin/api/config/{section}", get(http::admin::get_config_section).put(http::admin::set_config_field))
        .route("/admin/api/credentials/", get(http::admin::list_credentials))
        .route("/admin/api/credentials/{name}", put(http::admin::put_credential).delete(http::admin::delete_credential))
        .route("/admin/api/integrations/status", get(http::admin::integrations_status))
        .route("/admin/api/integrations/test", post(http::admin::integrations_test))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
