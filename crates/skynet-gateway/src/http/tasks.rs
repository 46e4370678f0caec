use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;

#[derive(Deserialize)]
pub struct CreateTaskBody {
    pub session_id: Option<String>,
    pub title: String,
    pub notes: Option<String>,
    pub due_at: Option<String>,
}

#[derive(Deserialize)]
pub struct SetDoneBody {
    pub done: bool,
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub session_id: Option<String>,
}

/// GET /api/tasks/?session_id=...
pub async fn list(
    Query(query): Query<ListQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let tasks = state
        .sessions
        .list_tasks(query.session_id.as_deref())
        .map_err(err)?;
    Ok(Json(json!({ "tasks": tasks })))
}

/// POST /api/tasks/create
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateTaskBody>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let task = state
        .sessions
        .create_task(
            body.session_id.as_deref(),
            &body.title,
            body.notes.as_deref(),
            body.due_at.as_deref(),
        )
        .map_err(err)?;
    Ok(Json(json!(task)))
}

/// PUT /api/tasks/{id}/done
pub async fn set_done(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<SetDoneBody>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    state.sessions.set_task_done(&id, body.done).map_err(err)?;
    Ok(Json(json!({ "ok": true })))
}

/// DELETE /api/tasks/{id}
pub async fn delete_task(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    state.sessions.delete_task(&id).map_err(err)?;
    Ok(Json(json!({ "ok": true })))
}

fn err(e: skynet_sessions::SessionError) -> (StatusCode, Json<Value>) {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() })))
}
