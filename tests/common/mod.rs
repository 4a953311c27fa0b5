//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use calc_mesh::config::{ServiceConfig, TargetConfig};
use calc_mesh::resilience::HttpTransport;
use parking_lot::Mutex;
use tokio::net::TcpListener;

/// A request seen by a mock backend.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

#[derive(Default)]
struct Inner {
    status: AtomicU16,
    path_status: Mutex<HashMap<String, u16>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

/// Programmable mock backend: answers every path with the current status
/// and records what it received.
#[derive(Clone, Default)]
pub struct MockBackend {
    inner: Arc<Inner>,
}

impl MockBackend {
    pub fn set_status(&self, status: u16) {
        self.inner.status.store(status, Ordering::SeqCst);
    }

    /// Answer `path` with `status` regardless of the default.
    pub fn set_path_status(&self, path: &str, status: u16) {
        self.inner.path_status.lock().insert(path.to_string(), status);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.inner.requests.lock().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests().into_iter().filter(|r| r.path == path).collect()
    }
}

async fn handle(
    State(backend): State<MockBackend>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().to_string();
    let code = backend
        .inner
        .path_status
        .lock()
        .get(&path)
        .copied()
        .unwrap_or_else(|| backend.inner.status.load(Ordering::SeqCst));

    backend.inner.requests.lock().push(RecordedRequest {
        method,
        path,
        headers: headers
            .iter()
            .filter_map(|(k, v)| Some((k.to_string(), v.to_str().ok()?.to_string())))
            .collect(),
        body: String::from_utf8_lossy(&body).into_owned(),
    });

    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        [("content-type", "application/json")],
        r#"{"value":5.0}"#,
    )
        .into_response()
}

/// Start a mock backend on an ephemeral port.
pub async fn start_backend(initial_status: u16) -> (SocketAddr, MockBackend) {
    let backend = MockBackend::default();
    backend.set_status(initial_status);

    let app = Router::new().fallback(handle).with_state(backend.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    (addr, backend)
}

/// Accept connections on an ephemeral port and never answer.
pub async fn start_hanging_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    addr
}

/// Serve `router` on an ephemeral port.
pub async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}

/// Config with every target pointed at `addr`, threshold 2, 3 attempts
/// and no backoff waits.
pub fn test_config(addr: SocketAddr) -> ServiceConfig {
    let base = format!("http://{addr}");
    let mut config = ServiceConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.targets = vec![
        TargetConfig::new("SumService", base.clone()),
        TargetConfig::new("SubtractService", base.clone()),
        TargetConfig::new("HistoryService", base),
    ];
    config.circuit_breaker.failure_threshold = 2;
    config.retries.max_attempts = 3;
    config.retries.base_delay_ms = 0;
    config.retries.max_delay_ms = 0;
    config.drain.interval_ms = 3_600_000;
    config.drain.base_delay_ms = 0;
    config.drain.max_delay_ms = 0;
    config.drain.probe_timeout_ms = 1000;
    config.observability.metrics_enabled = false;
    config
}

pub fn transport() -> Arc<HttpTransport> {
    Arc::new(HttpTransport::new(Duration::from_secs(1), Duration::from_secs(2)).unwrap())
}
