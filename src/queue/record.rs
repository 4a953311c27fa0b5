//! Failed-request records.

use std::time::SystemTime;

use axum::body::Bytes;
use reqwest::Method;
use uuid::Uuid;

use crate::resilience::transport::OutboundRequest;

/// An outbound call that must be replayed later.
///
/// Immutable once captured: replays read it, retry counts live in the
/// replaying loop.
#[derive(Debug, Clone)]
pub struct FailedRequestRecord {
    id: Uuid,
    target: String,
    method: Method,
    url: String,
    headers: Vec<(String, String)>,
    body: Bytes,
    enqueued_at: SystemTime,
}

impl FailedRequestRecord {
    /// Capture `request` (headers already carrying the injected trace
    /// context) for later delivery to `target`.
    pub fn capture(target: impl Into<String>, request: &OutboundRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            target: target.into(),
            method: request.method.clone(),
            url: request.url.clone(),
            headers: request.headers.clone(),
            body: request.body.clone(),
            enqueued_at: SystemTime::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn enqueued_at(&self) -> SystemTime {
        self.enqueued_at
    }

    /// Rebuild the outbound request exactly as captured.
    pub fn to_request(&self) -> OutboundRequest {
        OutboundRequest {
            method: self.method.clone(),
            url: self.url.clone(),
            headers: self.headers.clone(),
            body: self.body.clone(),
        }
    }
}
