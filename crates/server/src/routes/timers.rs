//! Garment work timers, addressed through their order.

use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use services::services::{
    authz::Actor,
    timer::{TimerStatus, TimerTarget},
};
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError, routes::staff_id_from};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct StartTimerRequest {
    pub garment_id: Option<Uuid>,
    pub assignee: String,
}

/// Body shared by pause, resume and stop.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct ControlTimerRequest {
    pub garment_id: Option<Uuid>,
    pub requesting_staff: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ManualTimerRequest {
    pub garment_id: Option<Uuid>,
    pub hours: f64,
    pub minutes: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TimerStatusQuery {
    pub garment_id: Option<Uuid>,
}

/// Resolve the optional requester of a control command to an actor.
pub(crate) fn requester(
    state: &AppState,
    requesting_staff: Option<&str>,
) -> Result<Option<Actor>, ApiError> {
    Ok(staff_id_from(requesting_staff, "requesting_staff")?.map(|id| state.actor(id)))
}

fn garment_target(order_id: Uuid, garment_id: Option<Uuid>) -> TimerTarget {
    TimerTarget::Garment {
        order_id,
        garment_id,
    }
}

pub async fn start_timer(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    axum::Json(payload): axum::Json<StartTimerRequest>,
) -> Result<ResponseJson<ApiResponse<TimerStatus>>, ApiError> {
    let assignee = staff_id_from(Some(&payload.assignee), "assignee")?
        .ok_or_else(|| ApiError::BadRequest("assignee is required".to_string()))?;
    let status = state
        .timers()
        .start_timer(garment_target(order_id, payload.garment_id), assignee)
        .await?;
    Ok(ResponseJson(ApiResponse::success(status)))
}

pub async fn pause_timer(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    axum::Json(payload): axum::Json<ControlTimerRequest>,
) -> Result<ResponseJson<ApiResponse<TimerStatus>>, ApiError> {
    let actor = requester(&state, payload.requesting_staff.as_deref())?;
    let status = state
        .timers()
        .pause_timer(garment_target(order_id, payload.garment_id), actor)
        .await?;
    Ok(ResponseJson(ApiResponse::success(status)))
}

pub async fn resume_timer(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    axum::Json(payload): axum::Json<ControlTimerRequest>,
) -> Result<ResponseJson<ApiResponse<TimerStatus>>, ApiError> {
    let actor = requester(&state, payload.requesting_staff.as_deref())?;
    let status = state
        .timers()
        .resume_timer(garment_target(order_id, payload.garment_id), actor)
        .await?;
    Ok(ResponseJson(ApiResponse::success(status)))
}

pub async fn stop_timer(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    axum::Json(payload): axum::Json<ControlTimerRequest>,
) -> Result<ResponseJson<ApiResponse<TimerStatus>>, ApiError> {
    let actor = requester(&state, payload.requesting_staff.as_deref())?;
    let status = state
        .timers()
        .stop_timer(garment_target(order_id, payload.garment_id), actor)
        .await?;
    Ok(ResponseJson(ApiResponse::success(status)))
}

pub async fn manual_update_timer(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    axum::Json(payload): axum::Json<ManualTimerRequest>,
) -> Result<ResponseJson<ApiResponse<TimerStatus>>, ApiError> {
    let status = state
        .timers()
        .manual_update_timer(
            garment_target(order_id, payload.garment_id),
            payload.hours,
            payload.minutes,
        )
        .await?;
    Ok(ResponseJson(ApiResponse::success(status)))
}

pub async fn get_timer_status(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Query(query): Query<TimerStatusQuery>,
) -> Result<ResponseJson<ApiResponse<TimerStatus>>, ApiError> {
    let status = state
        .timers()
        .get_timer_status(garment_target(order_id, query.garment_id))
        .await?;
    Ok(ResponseJson(ApiResponse::success(status)))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/orders/{order_id}/timer", get(get_timer_status))
        .route("/orders/{order_id}/timer/start", post(start_timer))
        .route("/orders/{order_id}/timer/pause", post(pause_timer))
        .route("/orders/{order_id}/timer/resume", post(resume_timer))
        .route("/orders/{order_id}/timer/stop", post(stop_timer))
        .route("/orders/{order_id}/timer/manual", put(manual_update_timer))
}
