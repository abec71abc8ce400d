use std::sync::Arc;

use anyhow::Context;
use chrono::{Duration, Utc};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use clipper_core::PipelineConfig;
use clipper_db::{Database, DatabaseConfig};
use clipper_server::routes;
use clipper_server::state::AppState;
use clipper_server::store::Storage;

/// Largest accepted request body (selections and classify markup).
const MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("clipper=info".parse()?))
        .with_target(false)
        .init();

    let api_key = std::env::var("CLIPPER_SERVER_API_KEY")
        .context("CLIPPER_SERVER_API_KEY must be set")?;
    let port = std::env::var("CLIPPER_SERVER_PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("0.0.0.0:{port}");

    let config = PipelineConfig::from_env()?;
    let storage = if std::env::var("DATABASE_URL").is_ok() {
        let db_config = DatabaseConfig::from_env()?;
        let db = Database::connect(&db_config).await?;
        db.migrate().await?;
        if let Some(days) = db_config.log_retention_days {
            let cutoff = Utc::now() - Duration::days(i64::from(days));
            let removed = db.event_log().prune(cutoff).await?;
            tracing::info!(removed, days, "Pruned old events");
        }
        Storage::Postgres(db)
    } else {
        tracing::warn!("DATABASE_URL not set; clips will not be stored");
        Storage::Disabled
    };

    let state = Arc::new(AppState::new(storage, api_key, &config)?);
    let shutdown = state.shutdown.clone();

    let app = routes::router(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    tracing::info!(
        development = config.development,
        vault = ?config.vault_path,
        "Starting server on {addr}"
    );
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    Ok(())
}

async fn shutdown_signal(token: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
    token.cancel();
}
