//! smogmap HTTP server: answers "what is the air quality around this point?".

use std::sync::Arc;

use anyhow::Result;
use axum::http::{HeaderValue, Method, header};
use clap::Parser;
use smogmap_core::{ErrorReporter, SmogService, TracingReporter};
use smogmap_server::{AppState, build_registry, build_router, config::Config};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    info!(
        "Starting smogmap-server v{} (radius {} m)",
        env!("CARGO_PKG_VERSION"),
        config.radius
    );

    // Reporter lives for the whole process and is flushed after shutdown.
    let reporter = Arc::new(TracingReporter::new());
    let shared_reporter = Arc::clone(&reporter) as Arc<dyn ErrorReporter>;

    let registry = Arc::new(build_registry(&config, &shared_reporter)?);
    if registry.is_empty() {
        warn!("No providers registered; every query will answer with an empty list");
    }
    info!(providers = registry.len(), "provider registry ready");
    for provider in registry.providers() {
        info!(provider = %provider.tag, name = %provider.name, "registered provider");
    }

    let service = SmogService::new(registry, shared_reporter).with_deadline(config.provider_deadline());
    let state = AppState::new(Arc::new(service), config.radius);

    let cors = CorsLayer::new()
        .allow_origin(config.cors_origin.parse::<HeaderValue>()?)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);
    let app = build_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    info!("smogmap-server listening on http://{}", config.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    reporter.flush();
    info!("smogmap-server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {err}");
    }
    info!("Shutdown requested");
}
