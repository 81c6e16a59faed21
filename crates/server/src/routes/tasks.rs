//! Per-task timers and task removal.

use axum::{
    Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{delete, get, post, put},
};
use db::models::task::Task;
use serde::{Deserialize, Serialize};
use services::services::timer::{TimerStatus, TimerTarget};
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    AppState,
    error::ApiError,
    routes::{staff_id_from, timers::requester},
};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct StartTaskTimerRequest {
    pub assignee: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct ControlTaskTimerRequest {
    pub requesting_staff: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ManualTaskTimerRequest {
    pub hours: f64,
    pub minutes: f64,
}

/// Only tasks that never ran may be removed.
pub async fn delete_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let pool = &state.db().pool;
    let task = Task::find_by_id(pool, task_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))?;
    if task.has_started() {
        return Err(ApiError::Conflict(
            "Task has already been started and cannot be deleted".to_string(),
        ));
    }
    if Task::delete_if_never_started(pool, task_id).await? == 0 {
        return Err(ApiError::Conflict(
            "Task was started before it could be deleted".to_string(),
        ));
    }
    tracing::info!(task_id = %task_id, "Task deleted");
    Ok(ResponseJson(ApiResponse::success(())))
}

pub async fn start_task_timer(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    axum::Json(payload): axum::Json<StartTaskTimerRequest>,
) -> Result<ResponseJson<ApiResponse<TimerStatus>>, ApiError> {
    let assignee = staff_id_from(Some(&payload.assignee), "assignee")?
        .ok_or_else(|| ApiError::BadRequest("assignee is required".to_string()))?;
    let status = state
        .timers()
        .start_timer(TimerTarget::Task { task_id }, assignee)
        .await?;
    Ok(ResponseJson(ApiResponse::success(status)))
}

pub async fn pause_task_timer(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    axum::Json(payload): axum::Json<ControlTaskTimerRequest>,
) -> Result<ResponseJson<ApiResponse<TimerStatus>>, ApiError> {
    let actor = requester(&state, payload.requesting_staff.as_deref())?;
    let status = state
        .timers()
        .pause_timer(TimerTarget::Task { task_id }, actor)
        .await?;
    Ok(ResponseJson(ApiResponse::success(status)))
}

pub async fn resume_task_timer(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    axum::Json(payload): axum::Json<ControlTaskTimerRequest>,
) -> Result<ResponseJson<ApiResponse<TimerStatus>>, ApiError> {
    let actor = requester(&state, payload.requesting_staff.as_deref())?;
    let status = state
        .timers()
        .resume_timer(TimerTarget::Task { task_id }, actor)
        .await?;
    Ok(ResponseJson(ApiResponse::success(status)))
}

pub async fn stop_task_timer(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    axum::Json(payload): axum::Json<ControlTaskTimerRequest>,
) -> Result<ResponseJson<ApiResponse<TimerStatus>>, ApiError> {
    let actor = requester(&state, payload.requesting_staff.as_deref())?;
    let status = state
        .timers()
        .stop_timer(TimerTarget::Task { task_id }, actor)
        .await?;
    Ok(ResponseJson(ApiResponse::success(status)))
}

pub async fn manual_update_task_timer(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    axum::Json(payload): axum::Json<ManualTaskTimerRequest>,
) -> Result<ResponseJson<ApiResponse<TimerStatus>>, ApiError> {
    let status = state
        .timers()
        .manual_update_timer(TimerTarget::Task { task_id }, payload.hours, payload.minutes)
        .await?;
    Ok(ResponseJson(ApiResponse::success(status)))
}

pub async fn get_task_timer(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<TimerStatus>>, ApiError> {
    let status = state
        .timers()
        .get_timer_status(TimerTarget::Task { task_id })
        .await?;
    Ok(ResponseJson(ApiResponse::success(status)))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/tasks/{task_id}", delete(delete_task))
        .route("/tasks/{task_id}/timer", get(get_task_timer))
        .route("/tasks/{task_id}/timer/start", post(start_task_timer))
        .route("/tasks/{task_id}/timer/pause", post(pause_task_timer))
        .route("/tasks/{task_id}/timer/resume", post(resume_task_timer))
        .route("/tasks/{task_id}/timer/stop", post(stop_task_timer))
        .route("/tasks/{task_id}/timer/manual", put(manual_update_task_timer))
}

#[cfg(test)]
mod tests {
    use axum::{Router, http::StatusCode};
    use serde_json::json;

    use crate::routes::{self, test_support::*};

    /// An order in `working` with one general-work task; returns the task id.
    async fn working_task(app: &Router) -> String {
        let (_, body) = send(
            app,
            "POST",
            "/api/orders",
            Some(json!({
                "client_name": "Dana",
                "notes": null,
                "due_date": null,
                "garments": [{ "name": "Dress" }]
            })),
        )
        .await;
        let order_id = body["data"]["id"].as_str().unwrap().to_string();
        send(
            app,
            "PUT",
            &format!("/api/orders/{order_id}/status"),
            Some(json!({ "status": "working" })),
        )
        .await;
        let (_, body) = send(app, "GET", &format!("/api/orders/{order_id}/tasks"), None).await;
        body["data"][0]["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn started_task_cannot_be_deleted() {
        let app = routes::router(test_state(&[]).await);
        let task_id = working_task(&app).await;

        let (status, body) = send(
            &app,
            "POST",
            &format!("/api/tasks/{task_id}/timer/start"),
            Some(json!({ "assignee": "alice" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["entity"], "task");

        let (status, _) = send(&app, "DELETE", &format!("/api/tasks/{task_id}"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = send(
            &app,
            "POST",
            &format!("/api/tasks/{task_id}/timer/stop"),
            Some(json!({ "requesting_staff": "bob" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn untouched_task_is_deleted() {
        let app = routes::router(test_state(&[]).await);
        let task_id = working_task(&app).await;

        let (status, body) = send(&app, "DELETE", &format!("/api/tasks/{task_id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        let (status, _) = send(&app, "DELETE", &format!("/api/tasks/{task_id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, "GET", &format!("/api/tasks/{task_id}/timer"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn task_timer_commands_map_to_http_statuses() {
        let app = routes::router(test_state(&[]).await);
        let task_id = working_task(&app).await;
        let base = format!("/api/tasks/{task_id}/timer");

        let (status, body) = send(
            &app,
            "POST",
            &format!("{base}/start"),
            Some(json!({ "assignee": "alice" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["state"], "running");

        let (status, _) = send(
            &app,
            "POST",
            &format!("{base}/start"),
            Some(json!({ "assignee": "bob" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = send(
            &app,
            "POST",
            &format!("{base}/pause"),
            Some(json!({ "requesting_staff": "bob" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(
            &app,
            "POST",
            &format!("{base}/pause"),
            Some(json!({ "requesting_staff": "alice" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["state"], "paused");
        assert_eq!(body["data"]["assignee"], "alice");

        let (status, _) = send(
            &app,
            "PUT",
            &format!("{base}/manual"),
            Some(json!({ "hours": 0.0, "minutes": 20.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(&app, "POST", &format!("{base}/resume"), Some(json!({}))).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(
            &app,
            "PUT",
            &format!("{base}/manual"),
            Some(json!({ "hours": 1.0, "minutes": 0.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = send(
            &app,
            "POST",
            &format!("{base}/stop"),
            Some(json!({ "requesting_staff": "alice" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["state"], "done");
        assert!(body["data"]["assignee"].is_null());

        let (status, body) = send(&app, "GET", &base, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["is_completed"], true);
        assert_eq!(body["data"]["accumulated_minutes"], 20.0);
    }
}
