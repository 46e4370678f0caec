//! Webhook definitions CRUD plus the public ingress endpoint at
//! `POST /webhooks/trigger/{path_suffix}`.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

use skynet_core::config::MAX_WEBHOOK_BODY_BYTES;
use skynet_core::types::TriggerEnvelope;
use skynet_sessions::TriggerOrigin;
use skynet_webhooks::hmac_sig::{self, SIGNATURE_HEADER};
use skynet_webhooks::template;

use crate::app::AppState;

#[derive(Deserialize)]
pub struct CreateWebhookBody {
    pub name: String,
    pub path_suffix: String,
    pub prompt_template: String,
    pub secret: Option<String>,
    pub session_id: Option<String>,
}

#[derive(Deserialize)]
pub struct SetEnabledBody {
    pub enabled: bool,
}

/// GET /api/webhooks/
pub async fn list(State(state): State<Arc<AppState>>) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let hooks = state.webhooks.list().map_err(err)?;
    Ok(Json(json!({ "webhooks": hooks })))
}

/// POST /api/webhooks/create
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateWebhookBody>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let hook = state
        .webhooks
        .create(
            &body.name,
            &body.path_suffix,
            &body.prompt_template,
            body.secret.as_deref(),
            body.session_id.as_deref(),
        )
        .map_err(err)?;
    Ok(Json(json!(hook)))
}

/// DELETE /api/webhooks/{id}
pub async fn delete_webhook(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    state.webhooks.delete(&id).map_err(err)?;
    Ok(Json(json!({ "ok": true })))
}

/// PUT /api/webhooks/{id}/enabled
pub async fn set_enabled(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<SetEnabledBody>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    state.webhooks.set_enabled(&id, body.enabled).map_err(err)?;
    Ok(Json(json!({ "ok": true })))
}

/// POST /webhooks/trigger/{path_suffix}
///
/// Verifies the HMAC signature (when the definition carries a secret),
/// renders the prompt template against the JSON body, and submits a
/// trigger to the agent runtime. Responds 202 immediately; the turn runs
/// in the background and its result is delivered over the session's WS
/// connection (or replayed as a `PendingResult` on next connect).
pub async fn receive(
    Path(path_suffix): Path<String>,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    if body.len() > MAX_WEBHOOK_BODY_BYTES {
        return Err((
            StatusCode::PAYLOAD_TOO_LARGE,
            Json(json!({ "error": format!("body exceeds {MAX_WEBHOOK_BODY_BYTES} bytes") })),
        ));
    }

    let definition = state
        .webhooks
        .get_by_path_suffix(&path_suffix)
        .map_err(err)?
        .ok_or_else(|| {
            (StatusCode::NOT_FOUND, Json(json!({ "error": "unknown webhook path" })))
        })?;

    if !definition.enabled {
        return Err((StatusCode::NOT_FOUND, Json(json!({ "error": "webhook disabled" }))));
    }

    if let Some(secret) = &definition.secret {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                (StatusCode::UNAUTHORIZED, Json(json!({ "error": "missing signature header" })))
            })?;

        if !hmac_sig::verify(secret, &body, signature) {
            warn!(%path_suffix, "webhook signature verification failed");
            return Err((
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "signature verification failed" })),
            ));
        }
    }

    let payload: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let prompt = template::render(&definition.prompt_template, &payload);
    let session_id = definition
        .session_id
        .clone()
        .unwrap_or_else(|| format!("webhook-{}", definition.id));

    if let Err(e) = state.sessions.get_or_create(&session_id, &session_id) {
        warn!(%session_id, err = %e, "failed to ensure webhook session exists");
    }

    let pending = state
        .sessions
        .create_pending(TriggerOrigin::Webhook, &session_id, &prompt)
        .map_err(err)?;

    let root_agent = state.agents.root().map_err(|e| {
        (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() })))
    })?;

    let envelope = TriggerEnvelope {
        session_id: session_id.clone(),
        initial_prompt: prompt.clone(),
        initial_agent: root_agent.name,
    };

    // trigger_count reflects accepted (2xx) dispatches, not agent-turn
    // success — this request already cleared signature/size checks.
    if let Err(e) = state.webhooks.record_trigger(&definition.id) {
        warn!(err = %e, "failed to record webhook trigger");
    }

    let runner = state.clone();
    let webhook_path = definition.path_suffix.clone();
    tokio::spawn(async move {
        let outcome = runner.run_trigger(envelope).await;
        if let Some(text) = &outcome.final_text {
            if let Err(e) = runner.sessions.complete_pending(&pending.id, text) {
                warn!(err = %e, "failed to complete pending webhook result");
            }
        }
        let broadcaster = runner.broadcasters.get_or_create(&session_id);
        broadcaster.publish(&skynet_protocol::session_ws::ServerFrame::WebhookResult {
            path: webhook_path,
            response: outcome.final_text,
        });
    });

    info!(%path_suffix, "webhook accepted");
    Ok((StatusCode::ACCEPTED, Json(json!({ "status": "accepted" }))))
}

fn err(e: skynet_webhooks::WebhookError) -> (StatusCode, Json<Value>) {
    use skynet_webhooks::WebhookError::*;
    let status = match &e {
        NotFound { .. } => StatusCode::NOT_FOUND,
        DuplicatePathSuffix { .. } | MalformedBody(_) => StatusCode::BAD_REQUEST,
        InvalidSignature => StatusCode::UNAUTHORIZED,
        PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": e.to_string() })))
}
