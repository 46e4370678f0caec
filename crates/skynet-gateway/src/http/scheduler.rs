use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;

#[derive(Deserialize)]
pub struct CreateTaskBody {
    pub name: String,
    pub cron_expression: String,
    pub prompt: String,
    pub timezone: String,
    pub session_id: Option<String>,
}

#[derive(Deserialize)]
pub struct SetEnabledBody {
    pub enabled: bool,
}

/// GET /api/scheduled-tasks/
pub async fn list(State(state): State<Arc<AppState>>) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let tasks = state.scheduler.list_tasks().map_err(err)?;
    Ok(Json(json!({ "tasks": tasks })))
}

/// POST /api/scheduled-tasks/create
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateTaskBody>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let task = state
        .scheduler
        .create_task(
            &body.name,
            &body.cron_expression,
            &body.prompt,
            &body.timezone,
            body.session_id.as_deref(),
        )
        .map_err(err)?;
    Ok(Json(json!(task)))
}

/// DELETE /api/scheduled-tasks/{id}
pub async fn delete_task(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    state.scheduler.delete_task(&id).map_err(err)?;
    Ok(Json(json!({ "ok": true })))
}

/// PUT /api/scheduled-tasks/{id}/enabled
pub async fn set_enabled(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<SetEnabledBody>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    state.scheduler.set_enabled(&id, body.enabled).map_err(err)?;
    Ok(Json(json!({ "ok": true })))
}

fn err(e: skynet_scheduler::SchedulerError) -> (StatusCode, Json<Value>) {
    use skynet_scheduler::SchedulerError::*;
    let status = match &e {
        TaskNotFound { .. } => StatusCode::NOT_FOUND,
        DuplicateName { .. } | InvalidSchedule(_) => StatusCode::BAD_REQUEST,
        Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": e.to_string() })))
}
