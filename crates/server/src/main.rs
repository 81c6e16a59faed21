use anyhow::Context;
use db::DBService;
use server::{AppState, routes};
use services::services::{config::Config, stale_timer_reaper::StaleTimerReaper};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{EnvFilter, prelude::*};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(env_filter))
        .init();

    let config = Config::from_env().context("invalid configuration")?;
    let db = DBService::new(&config.database_url)
        .await
        .with_context(|| format!("failed to open database {}", config.database_url))?;

    if config.reaper_enabled {
        StaleTimerReaper::new(
            db.pool.clone(),
            config.stale_timer_ceiling,
            config.reaper_interval,
        )
        .spawn();
    } else {
        tracing::info!("Stale timer reaper disabled; relying on the cron endpoint");
    }

    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::new(db, config);
    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("Server running on http://{}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
