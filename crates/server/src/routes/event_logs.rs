use axum::{
    Router,
    extract::{Query, State},
    response::Json as ResponseJson,
    routing::get,
};
use db::models::event_log::{EventLogEntry, EventLogQuery};
use utils::response::ApiResponse;

use crate::{AppState, error::ApiError};

/// Audit trail, newest first, optionally narrowed to one entity.
pub async fn list_event_logs(
    State(state): State<AppState>,
    Query(query): Query<EventLogQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<EventLogEntry>>>, ApiError> {
    let entries = EventLogEntry::find(&state.db().pool, &query).await?;
    Ok(ResponseJson(ApiResponse::success(entries)))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().route("/event-logs", get(list_event_logs))
}
