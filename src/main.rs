mod compare;
mod config;
mod demo;
mod encoder;
mod error;
mod gemini;
mod models;
mod orchestrator;
mod routes;
mod session;
mod view;
#[cfg(test)]
mod testing;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tower_http::cors::{CorsLayer, Any};
use tracing_subscriber::{fmt, EnvFilter};

use crate::{config::Config, demo::DemoModel, gemini::{GeminiClient, RedesignModel}, routes::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Init tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let config = Config::from_env();
    let model: Arc<dyn RedesignModel> = if config.is_demo() {
        tracing::warn!("GEMINI_API_KEY not set - running in demo mode with placeholder renders");
        Arc::new(DemoModel::new(config.demo_max_delay))
    } else {
        tracing::info!("Using API key: {}", config.redacted_key());
        Arc::new(GeminiClient::new(&config))
    };

    let state = AppState {
        store: Arc::default(),
        model,
    };

    tokio::spawn(session::sweep_idle_sessions(Arc::clone(&state.store), config.session_idle_ttl));

    let app = routes::router(state).layer(
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!(%addr, "Starting server");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutting down");
        })
        .await
        .context("server error")?;
    Ok(())
}
