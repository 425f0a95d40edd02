mod classify;
mod codec;
mod config;
mod diagnosis;
mod engine;
mod envelope;
mod error;
mod ingest;
mod models;
mod routes;

use anyhow::Context;
use routes::{build_router, AppState};
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

use crate::{config::Settings, diagnosis::DiagnosisClient, engine::GroqClient, ingest::ImageIngestor};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let settings = Settings::from_env().context("loading configuration")?;
    tracing::info!(
        model = %settings.engine.model,
        base_url = %settings.engine.base_url,
        timeout_secs = settings.engine_timeout.as_secs(),
        "Using inference engine"
    );

    let engine = Arc::new(GroqClient::new(&settings.engine));
    let state = AppState {
        diagnosis: Arc::new(DiagnosisClient::new(engine, settings.engine_timeout)),
        ingestor: ImageIngestor::new(settings.max_upload_bytes),
    };
    let app = build_router(state, settings.body_limit());

    let addr = settings.bind_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "Starting server");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
