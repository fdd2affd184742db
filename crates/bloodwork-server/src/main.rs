use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use bloodwork_core::PipelineConfig;
use bloodwork_server::routes;
use bloodwork_server::state::AppState;
use bloodwork_store::{JsonFileStore, StoreConfig};

/// Report uploads are plain text; 10 MiB covers long multi-page reports.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("bloodwork=info".parse()?))
        .with_target(false)
        .init();

    let api_key = std::env::var("BLOODWORK_SERVER_API_KEY")
        .context("BLOODWORK_SERVER_API_KEY must be set")?;
    let port = std::env::var("BLOODWORK_SERVER_PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("0.0.0.0:{port}");

    let config = PipelineConfig::from_env()?;
    let store = JsonFileStore::from_config(&StoreConfig::from_env()?);
    tracing::info!(
        keys = config.api_keys.len(),
        model = %config.model,
        db = %store.path().display(),
        "Pipeline configured"
    );

    let state = Arc::new(AppState::build(&config, store, api_key)?);

    let app = routes::router(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    tracing::info!("Starting server on {addr}");
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install CTRL+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
