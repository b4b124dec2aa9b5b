use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;
use tokio::sync::RwLock;

use cgmview_core::{AccessGate, Pipeline};
use cgmview_logging::{LogEvent, Logger};

use crate::api::{self, AppState};
use crate::commands::load_dataset;

pub async fn handle_serve_command(
    pipeline: Pipeline,
    gate: AccessGate,
    logger: Logger,
    input: Option<PathBuf>,
    host: &str,
    port: u16,
) -> Result<()> {
    // The initial dataset is optional; clients can upload one later.
    let dataset = match input {
        Some(path) => Some(load_dataset(&pipeline, &logger, &path)?),
        None => None,
    };

    let state = AppState {
        pipeline: Arc::new(pipeline),
        gate: Arc::new(gate),
        dataset: Arc::new(RwLock::new(dataset)),
        logger: Arc::new(logger),
    };
    let router = api::create_router(state.clone());

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind API server to {}", addr))?;
    let local = listener
        .local_addr()
        .map(|a| a.to_string())
        .unwrap_or(addr);

    state.logger.log(&LogEvent::ServerStarted { address: local });
    if !state.gate.is_open() {
        eprintln!(
            "  {} Requests must send the {} header",
            "->".dimmed(),
            api::ACCESS_KEY_HEADER.bold()
        );
    }
    eprintln!("  {} Press {} to stop", "->".dimmed(), "Ctrl+C".bold());

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("API server error")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    eprintln!("\nShutting down...");
}
