use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;

#[derive(Deserialize)]
pub struct CreateSessionBody {
    pub name: String,
}

#[derive(Deserialize)]
pub struct RenameSessionBody {
    pub name: String,
}

#[derive(Deserialize)]
pub struct MessagesQuery {
    pub limit: Option<usize>,
}

const DEFAULT_MESSAGE_LIMIT: usize = 50;

/// GET /api/sessions/
pub async fn list(State(state): State<Arc<AppState>>) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let sessions = state.sessions.list().map_err(db_err)?;
    Ok(Json(json!({ "sessions": sessions })))
}

/// POST /api/sessions/create
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateSessionBody>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let session = state.sessions.create(&body.name).map_err(db_err)?;
    Ok(Json(json!(session)))
}

/// PUT /api/sessions/{id}
pub async fn rename(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<RenameSessionBody>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    state.sessions.rename(&id, &body.name).map_err(db_err)?;
    Ok(Json(json!({ "ok": true })))
}

/// DELETE /api/sessions/{id}
pub async fn delete_session(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    state.sessions.delete(&id).map_err(db_err)?;
    Ok(Json(json!({ "ok": true })))
}

/// GET /api/sessions/{id}/messages?limit=N
pub async fn messages(
    Path(id): Path<String>,
    Query(query): Query<MessagesQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let limit = query.limit.unwrap_or(DEFAULT_MESSAGE_LIMIT);
    let messages = state.sessions.recent_messages(&id, limit).map_err(db_err)?;
    Ok(Json(json!({ "messages": messages })))
}

fn db_err(e: skynet_sessions::SessionError) -> (StatusCode, Json<Value>) {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() })))
}
