//! Entry point for an external scheduler to run the stale-timer sweep.

use axum::{
    Router,
    extract::State,
    http::{HeaderMap, header},
    response::Json as ResponseJson,
    routing::post,
};
use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use services::services::stale_timer_reaper::{StaleTimerReaper, SweepReport};
use subtle::ConstantTimeEq;
use utils::response::ApiResponse;

use crate::{AppState, error::ApiError};

/// True when the request carries `Authorization: Bearer <secret>`.
/// Without a configured secret nothing matches.
pub fn bearer_matches(headers: &HeaderMap, secret: Option<&SecretString>) -> bool {
    let Some(secret) = secret else {
        return false;
    };
    let Some(token) = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
    else {
        return false;
    };
    token
        .as_bytes()
        .ct_eq(secret.expose_secret().as_bytes())
        .into()
}

pub async fn sweep_stale_timers(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<ResponseJson<ApiResponse<SweepReport>>, ApiError> {
    if !bearer_matches(&headers, state.config().cron_secret.as_ref()) {
        tracing::warn!("Rejected stale-timer sweep with missing or wrong credentials");
        return Err(ApiError::Unauthorized);
    }

    let reaper = StaleTimerReaper::new(
        state.db().pool.clone(),
        state.config().stale_timer_ceiling,
        state.config().reaper_interval,
    );
    let report = reaper.sweep(Utc::now()).await?;
    Ok(ResponseJson(ApiResponse::success(report)))
}

pub fn router(_state: &AppState) -> Router<AppState> {
    Router::new().route("/cron/stale-timers", post(sweep_stale_timers))
}
