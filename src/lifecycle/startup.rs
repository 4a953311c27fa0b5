//! Startup orchestration.
//!
//! # Responsibilities
//! - Load and validate configuration for the selected role
//! - Initialize logging, metrics and span export
//! - Bind the listener and run the server until a signal arrives
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listener starts last (traffic only when ready)

use std::path::Path;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::loader::{load_or_default, ConfigError};
use crate::http::HttpServer;
use crate::lifecycle::{signals, Shutdown};
use crate::observability::{logging, metrics, SpanTracer};
use crate::resilience::TransportError;
use crate::services::ServiceRole;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("outbound client: {0}")]
    Transport(#[from] TransportError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    #[error("server: {0}")]
    Serve(#[from] std::io::Error),
}

/// Run `role` until SIGINT/SIGTERM.
pub async fn run(role: ServiceRole, config_path: Option<&Path>) -> Result<(), StartupError> {
    let config = load_or_default(config_path, role)?;
    logging::init(&config.observability);

    tracing::info!(
        role = %role,
        bind_address = %config.listener.bind_address,
        targets = config.targets.len(),
        failure_threshold = config.circuit_breaker.failure_threshold,
        max_attempts = config.retries.max_attempts,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let spans = SpanTracer::from_config(&config.observability, &format!("calc-mesh-{role}"));

    let address = config.listener.bind_address.clone();
    let server = HttpServer::new(role, config)?.with_spans(spans.clone());
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| StartupError::Bind { address, source })?;

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());
    let served = server.run(listener, shutdown).await;
    spans.shutdown();
    served?;

    tracing::info!("Shutdown complete");
    Ok(())
}
