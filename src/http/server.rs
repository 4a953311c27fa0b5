//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the shared application state for one role
//! - Create the Axum router with the role's handlers
//! - Wire up middleware (tracing, request ID, timeout, CORS)
//! - Run the drain worker next to the listener and join it on shutdown

use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderValue;
use axum::Router;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::{CorsConfig, ServiceConfig};
use crate::drain::DrainWorker;
use crate::lifecycle::Shutdown;
use crate::observability::SpanTracer;
use crate::queue::QueueRegistry;
use crate::resilience::{CallProtector, HttpTransport, RetryPolicy, Transport, TransportError};
use crate::services::history::HistoryStore;
use crate::services::ServiceRole;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub role: ServiceRole,
    pub config: Arc<ServiceConfig>,
    pub protector: Arc<CallProtector>,
    pub queues: Arc<QueueRegistry>,
    pub history: Arc<HistoryStore>,
    pub spans: SpanTracer,
}

impl AppState {
    pub fn new(role: ServiceRole, config: Arc<ServiceConfig>, transport: Arc<dyn Transport>) -> Self {
        let protector = CallProtector::new(
            transport,
            RetryPolicy::from_config(&config.retries),
            config.circuit_breaker.clone(),
        );
        Self {
            role,
            protector: Arc::new(protector),
            queues: Arc::new(QueueRegistry::new(config.queue.clone())),
            history: Arc::new(HistoryStore::new()),
            spans: SpanTracer::disabled(),
            config,
        }
    }
}

/// HTTP server for one service role.
pub struct HttpServer {
    router: Router,
    state: AppState,
    transport: Arc<dyn Transport>,
}

impl HttpServer {
    /// Create a server whose outbound calls go over `reqwest`.
    pub fn new(role: ServiceRole, config: ServiceConfig) -> Result<Self, TransportError> {
        let transport = HttpTransport::new(
            Duration::from_secs(config.timeouts.connect_secs),
            Duration::from_secs(config.timeouts.attempt_secs),
        )?;
        Ok(Self::with_transport(role, config, Arc::new(transport)))
    }

    pub fn with_transport(role: ServiceRole, config: ServiceConfig, transport: Arc<dyn Transport>) -> Self {
        let config = Arc::new(config);
        let state = AppState::new(role, config.clone(), transport.clone());
        let router = Self::build_router(role, &config, state.clone());
        Self {
            router,
            state,
            transport,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(role: ServiceRole, config: &ServiceConfig, state: AppState) -> Router {
        let router = role
            .routes()
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id()),
            );

        if role == ServiceRole::Edge {
            router.layer(cors_layer(&config.cors))
        } else {
            router
        }
    }

    /// Export call and replay spans through `spans`.
    pub fn with_spans(mut self, spans: SpanTracer) -> Self {
        self.state.spans = spans;
        self.router = Self::build_router(self.state.role, &self.state.config, self.state.clone());
        self
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until `shutdown` fires, then wait for the drain worker to stop.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, role = %self.state.role, "HTTP server starting");

        let worker = DrainWorker::new(
            self.state.queues.clone(),
            self.transport.clone(),
            &self.state.config.targets,
            self.state.config.drain.clone(),
        )
        .with_spans(self.state.spans.clone());
        let worker = tokio::spawn(worker.run(shutdown.subscribe()));

        let mut server_shutdown = shutdown.subscribe();
        let served = axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = server_shutdown.recv().await;
                tracing::info!("HTTP server draining connections");
            })
            .await;

        // The worker must not outlive the server, even when serving failed.
        shutdown.trigger();
        if let Err(e) = worker.await {
            tracing::error!(error = %e, "Drain worker task failed");
        }

        let queued = self.state.queues.total_queued();
        if queued > 0 {
            tracing::warn!(queued, "Stopping with undelivered queued requests");
        }

        served?;
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if config.allowed_origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}
