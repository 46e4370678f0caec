//! Bearer-token protected admin surface: config sections, credential
//! management, and integration status/connection tests.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;

#[derive(Deserialize)]
pub struct SetFieldBody {
    pub key: String,
    pub value: Value,
}

#[derive(Deserialize)]
pub struct PutCredentialBody {
    pub plaintext: String,
}

#[derive(Deserialize)]
pub struct IntegrationTestBody {
    pub provider: String,
}

/// Rejects the request unless `Authorization: Bearer <admin_token>` matches
/// the configured token. When no admin token is configured, the whole
/// admin surface is unreachable rather than silently open.
fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), (StatusCode, Json<Value>)> {
    let Some(expected) = &state.admin_token else {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "admin surface disabled: no admin token configured" })),
        ));
    };

    let presented = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match presented {
        Some(token) if token == expected => Ok(()),
        _ => Err((StatusCode::UNAUTHORIZED, Json(json!({ "error": "invalid or missing admin token" })))),
    }
}

/// GET /admin/api/config/{section}
pub async fn get_config_section(
    Path(section): Path<String>,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    require_admin(&state, &headers)?;
    let snapshot = state.config.snapshot();
    let mut base_json = serde_json::to_value(&snapshot.base)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))?;
    if let Some(obj) = base_json.as_object_mut() {
        obj.insert("credential_key".to_string(), json!("<redacted>"));
    }
    let base_section = base_json.get(&section).cloned().ok_or_else(|| {
        (StatusCode::NOT_FOUND, Json(json!({ "error": format!("unknown config section '{section}'") })))
    })?;
    let section_value = match snapshot.overlay.get(&section) {
        Some(overlay_section) => skynet_core::config::deep_merge(&base_section, overlay_section),
        None => base_section,
    };
    Ok(Json(section_value))
}

/// PUT /admin/api/config/{section} — set a single field's override value.
pub async fn set_config_field(
    Path(section): Path<String>,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<SetFieldBody>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    require_admin(&state, &headers)?;
    state.config.set_override(&section, &body.key, body.value);
    Ok(Json(json!({ "ok": true })))
}

/// GET /admin/api/credentials/ — names only, never plaintext.
pub async fn list_credentials(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    require_admin(&state, &headers)?;
    let names = state
        .credentials
        .list_names()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))?;
    Ok(Json(json!({ "credentials": names })))
}

/// PUT /admin/api/credentials/{name}
pub async fn put_credential(
    Path(name): Path<String>,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<PutCredentialBody>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    require_admin(&state, &headers)?;
    state
        .credentials
        .put(&name, &body.plaintext)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))?;
    Ok(Json(json!({ "ok": true })))
}

/// DELETE /admin/api/credentials/{name}
pub async fn delete_credential(
    Path(name): Path<String>,
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    require_admin(&state, &headers)?;
    state
        .credentials
        .delete(&name)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))?;
    Ok(Json(json!({ "ok": true })))
}

/// GET /admin/api/integrations/status
pub async fn integrations_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    require_admin(&state, &headers)?;
    let agents = state.agents.names();
    let credentials = state
        .credentials
        .list_names()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))))?;
    Ok(Json(json!({ "agents": agents, "credentials_configured": credentials })))
}

/// POST /admin/api/integrations/test — checks that a named credential
/// exists and can be decrypted; does not place any outbound network call.
pub async fn integrations_test(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<IntegrationTestBody>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    require_admin(&state, &headers)?;
    let reachable = state.credentials.exists(&body.provider);
    Ok(Json(json!({ "provider": body.provider, "credential_present": reachable })))
}
