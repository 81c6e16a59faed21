use axum::Router;
use services::services::authz::StaffId;

use crate::{AppState, error::ApiError};

pub mod catalog;
pub mod cron;
pub mod event_logs;
pub mod health;
pub mod orders;
pub mod tasks;
pub mod timers;

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .merge(health::router(&state))
        .merge(orders::router(&state))
        .merge(timers::router(&state))
        .merge(tasks::router(&state))
        .merge(catalog::router(&state))
        .merge(event_logs::router(&state))
        .merge(cron::router(&state));

    Router::new().nest("/api", api).with_state(state)
}

/// Parse a staff id from a request body, rejecting blank values.
pub(crate) fn staff_id_from(raw: Option<&str>, field: &str) -> Result<Option<StaffId>, ApiError> {
    match raw {
        None => Ok(None),
        Some(raw) => StaffId::new(raw)
            .map(Some)
            .ok_or_else(|| ApiError::BadRequest(format!("{field} must not be blank"))),
    }
}
