//! Main Entrypoint for the Call Relay Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Building the relay (AI connector, call logs, session settings).
//! 3. Constructing the Axum router.
//! 4. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use callrelay_api::{
    config::Config, router::create_router, state::AppState, ws::provider::OpenAiConnector,
};
use callrelay_core::{FileCallLogFactory, Relay};
use std::{net::SocketAddr, sync::Arc};
use tracing::info;

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Received shutdown signal. Shutting down gracefully...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing relay...");

    // --- 3. Build the Relay ---
    std::fs::create_dir_all(&config.call_log_dir).with_context(|| {
        format!(
            "Failed to create call log directory {}",
            config.call_log_dir.display()
        )
    })?;
    let logs = Arc::new(FileCallLogFactory::new(
        config.call_log_dir.clone(),
        config.call_log_max_bytes,
    ));
    let connector = Arc::new(OpenAiConnector::from_config(&config));
    let relay = Relay::new(
        connector,
        logs,
        config.session_config(),
        config.relay_options(),
    );

    let app_state = Arc::new(AppState { relay });

    // --- 4. Create Router ---
    let app = create_router(app_state);

    // --- 5. Start Server ---
    info!(
        model = %config.realtime_model,
        voice = %config.voice,
        call_log_dir = %config.call_log_dir.display(),
        bind_address = %config.bind_address,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address))?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
