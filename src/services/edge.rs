//! Edge (API) role: forwards arithmetic to the calculator roles.

use std::time::Instant;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::config::{FallbackPolicy, HISTORY_SERVICE, SUBTRACT_SERVICE, SUM_SERVICE};
use crate::http::AppState;
use crate::observability::metrics;
use crate::resilience::OutboundRequest;
use crate::services::domain::{OperationType, Problem};
use crate::services::fallback::{call_error_response, error_response, queued_response};
use crate::services::outbound::{deliver_or_enqueue, finish_span, traced_request, Delivery};

pub async fn sum(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let policy = state.config.fallback.sum;
    forward(&state, &headers, body, OperationType::Sum, SUM_SERVICE, policy).await
}

pub async fn subtract(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let policy = state.config.fallback.subtract;
    forward(&state, &headers, body, OperationType::Subtract, SUBTRACT_SERVICE, policy).await
}

/// Relay the operands verbatim so a queued record replays the caller's bytes.
async fn forward(
    state: &AppState,
    headers: &HeaderMap,
    body: Bytes,
    op: OperationType,
    target: &str,
    policy: FallbackPolicy,
) -> Response {
    let start = Instant::now();

    let problem: Problem = match serde_json::from_slice(&body) {
        Ok(problem) => problem,
        Err(e) => {
            metrics::record_request(op.path(), 400, start);
            return error_response(StatusCode::BAD_REQUEST, format!("invalid problem: {e}"));
        }
    };

    let Some(target_config) = state.config.target(target) else {
        metrics::record_request(op.path(), 503, start);
        return error_response(StatusCode::SERVICE_UNAVAILABLE, format!("{target} is not configured"));
    };

    let (request, cx) = traced_request(
        &state.spans,
        op.span_name(),
        headers,
        OutboundRequest::post_json(target_config.url(op.path()), body),
    );
    tracing::debug!(target_name = %target, trace_id = %cx.trace_id(), "Forwarding problem");

    let delivery = deliver_or_enqueue(state, target, &request, state.config.fallback.enqueue_on).await;
    finish_span(&cx, target, &delivery);
    let response = match delivery {
        Delivery::Delivered(downstream) => json_response(downstream.status, downstream.body),
        Delivery::Queued { .. } => queued_response(target, policy, || problem.solve(op)),
        Delivery::Failed { error } => call_error_response(&error),
    };

    metrics::record_request(op.path(), response.status().as_u16(), start);
    response
}

/// `GET /history` through the protector. Reads are never queued.
pub async fn history(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let start = Instant::now();

    let Some(target_config) = state.config.target(HISTORY_SERVICE) else {
        metrics::record_request("/history", 503, start);
        return error_response(StatusCode::SERVICE_UNAVAILABLE, "HistoryService is not configured");
    };
    let (request, cx) = traced_request(
        &state.spans,
        "history",
        &headers,
        OutboundRequest::get(target_config.url("/history")),
    );

    let delivery = match state.protector.execute(HISTORY_SERVICE, &request).await {
        Ok(downstream) => Delivery::Delivered(downstream),
        Err(error) => Delivery::Failed { error },
    };
    finish_span(&cx, HISTORY_SERVICE, &delivery);
    let response = match delivery {
        Delivery::Delivered(downstream) => json_response(downstream.status, downstream.body),
        Delivery::Queued { error } | Delivery::Failed { error } => call_error_response(&error),
    };

    metrics::record_request("/history", response.status().as_u16(), start);
    response
}

fn json_response(status: StatusCode, body: Bytes) -> Response {
    let mut response = (status, body).into_response();
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
