//! Mapping of call failures to HTTP answers.
//!
//! Every handler turns failures into responses here, so the status contract
//! lives in one place:
//! - queued + `unavailable`: 503, body says the request was queued
//! - queued + `local`: 200 with the local result and `x-degraded: queued`
//! - terminal: downstream status and body relayed
//! - anything else: 503

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::config::FallbackPolicy;
use crate::resilience::CallError;
use crate::services::domain::CalcResult;

pub const DEGRADED_HEADER: &str = "x-degraded";

/// JSON error body `{"error": ..., ...}` with the given status.
pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

/// Answer for a request whose downstream call was queued for replay.
pub fn queued_response(
    target: &str,
    policy: FallbackPolicy,
    local: impl FnOnce() -> CalcResult,
) -> Response {
    match policy {
        FallbackPolicy::Unavailable => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "error": format!("{target} is unavailable, request queued for delivery"),
                "target": target,
                "queued": true,
            })),
        )
            .into_response(),
        FallbackPolicy::Local => {
            let mut response = Json(local()).into_response();
            response
                .headers_mut()
                .insert(DEGRADED_HEADER, HeaderValue::from_static("queued"));
            response
        }
    }
}

/// Answer for a call that failed without being queued.
pub fn call_error_response(error: &CallError) -> Response {
    match error {
        CallError::Rejected { status, body, .. } => {
            let mut response = (*status, body.clone()).into_response();
            response
                .headers_mut()
                .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
            response
        }
        CallError::CircuitOpen { target } | CallError::Exhausted { target, .. } => {
            tracing::error!(target_name = %target, error = %error, "Downstream unavailable");
            error_response(StatusCode::SERVICE_UNAVAILABLE, format!("{target} is unavailable"))
        }
    }
}
