mod config;
mod error;
mod handlers;
mod middleware;
mod routes;
mod state;

use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = config::Cli::parse();
    let cfg = config::load(&cli)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cfg.observability.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let state = Arc::new(state::AppState::init(&cfg)?);
    let app = routes::create_router(state, &cfg.server.endpoint_path);

    let addr = cfg.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(
        addr = %addr,
        endpoint = %cfg.server.endpoint_path,
        "meerkat-server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("meerkat-server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
