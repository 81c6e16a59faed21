//! Order intake, status changes and per-order task listing.

use axum::{
    Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{get, post, put},
};
use db::models::{
    order::{CreateOrder, Order, OrderStatus, OrderWithGarments},
    service::Service,
    task::Task,
};
use serde::{Deserialize, Serialize};
use services::services::task_auto_creator::AutoCreateSummary;
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct UpdateOrderStatus {
    pub status: OrderStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct OrderStatusResponse {
    pub order: Order,
    /// Set whenever the order is put into `working`.
    pub auto_created: Option<AutoCreateSummary>,
}

pub async fn create_order(
    State(state): State<AppState>,
    axum::Json(payload): axum::Json<CreateOrder>,
) -> Result<ResponseJson<ApiResponse<OrderWithGarments>>, ApiError> {
    validate_intake(&state, &payload).await?;

    let pool = &state.db().pool;
    let order = Order::create(pool, &payload).await?;
    tracing::info!(
        order_id = %order.id,
        garments = payload.garments.len(),
        "Order created"
    );
    let order = order.with_garments(pool).await?;
    Ok(ResponseJson(ApiResponse::success(order)))
}

async fn validate_intake(state: &AppState, payload: &CreateOrder) -> Result<(), ApiError> {
    if payload.client_name.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "client_name must not be blank".to_string(),
        ));
    }
    for garment in &payload.garments {
        if garment.name.trim().is_empty() {
            return Err(ApiError::BadRequest(
                "garment name must not be blank".to_string(),
            ));
        }
        for line in &garment.services {
            if line.quantity <= 0 {
                return Err(ApiError::BadRequest(format!(
                    "quantity for service {} must be positive",
                    line.service_id
                )));
            }
            if Service::find_by_id(&state.db().pool, line.service_id)
                .await?
                .is_none()
            {
                return Err(ApiError::BadRequest(format!(
                    "unknown service {}",
                    line.service_id
                )));
            }
        }
    }
    Ok(())
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<OrderWithGarments>>, ApiError> {
    let pool = &state.db().pool;
    let order = Order::find_by_id(pool, order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Order not found".to_string()))?;
    Ok(ResponseJson(ApiResponse::success(
        order.with_garments(pool).await?,
    )))
}

/// Moving an order into `working` plans its production tasks.
pub async fn update_order_status(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    axum::Json(payload): axum::Json<UpdateOrderStatus>,
) -> Result<ResponseJson<ApiResponse<OrderStatusResponse>>, ApiError> {
    let pool = &state.db().pool;
    let previous = Order::find_by_id(pool, order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Order not found".to_string()))?;
    let order = Order::update_status(pool, order_id, payload.status)
        .await?
        .ok_or_else(|| ApiError::NotFound("Order not found".to_string()))?;

    tracing::info!(
        order_id = %order_id,
        from = %previous.status,
        to = %order.status,
        "Order status changed"
    );

    // Existing tasks are skipped, so a retry fills in what a failed run left out.
    let auto_created = if order.status == OrderStatus::Working {
        Some(state.task_creator().auto_create_tasks(order_id).await?)
    } else {
        None
    };

    Ok(ResponseJson(ApiResponse::success(OrderStatusResponse {
        order,
        auto_created,
    })))
}

pub async fn auto_create_tasks(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<AutoCreateSummary>>, ApiError> {
    let summary = state.task_creator().auto_create_tasks(order_id).await?;
    Ok(ResponseJson(ApiResponse::success(summary)))
}

pub async fn list_order_tasks(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<Task>>>, ApiError> {
    let pool = &state.db().pool;
    Order::find_by_id(pool, order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Order not found".to_string()))?;
    let tasks = Task::find_by_order_id(pool, order_id).await?;
    Ok(ResponseJson(ApiResponse::success(tasks)))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/orders", post(create_order))
        .route("/orders/{order_id}", get(get_order))
        .route("/orders/{order_id}/status", put(update_order_status))
        .route("/orders/{order_id}/tasks", get(list_order_tasks))
        .route(
            "/orders/{order_id}/tasks/auto-create",
            post(auto_create_tasks),
        )
}
