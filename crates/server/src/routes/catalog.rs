//! Service catalog: the alterations a garment can be booked for.

use axum::{
    Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::get,
};
use db::models::service::{CreateService, Service};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

pub async fn list_services(
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<Vec<Service>>>, ApiError> {
    let services = Service::find_all(&state.db().pool).await?;
    Ok(ResponseJson(ApiResponse::success(services)))
}

pub async fn create_service(
    State(state): State<AppState>,
    axum::Json(payload): axum::Json<CreateService>,
) -> Result<ResponseJson<ApiResponse<Service>>, ApiError> {
    if payload.name.trim().is_empty() {
        return Err(ApiError::BadRequest("name must not be blank".to_string()));
    }
    if payload.estimated_minutes.is_some_and(|m| m < 0) {
        return Err(ApiError::BadRequest(
            "estimated_minutes must not be negative".to_string(),
        ));
    }
    let service = Service::create(&state.db().pool, &payload).await?;
    tracing::info!(service_id = %service.id, name = %service.name, "Service created");
    Ok(ResponseJson(ApiResponse::success(service)))
}

pub async fn get_service(
    State(state): State<AppState>,
    Path(service_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Service>>, ApiError> {
    let service = Service::find_by_id(&state.db().pool, service_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Service not found".to_string()))?;
    Ok(ResponseJson(ApiResponse::success(service)))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/services", get(list_services).post(create_service))
        .route("/services/{service_id}", get(get_service))
}
