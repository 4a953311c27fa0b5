//! Sum and subtract roles.
//!
//! Both compute locally and record the operation at the history role. A
//! failed history call never fails the arithmetic: the record is queued for
//! replay and the result is returned anyway.

use std::time::Instant;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::config::{EnqueueOn, HISTORY_SERVICE};
use crate::http::AppState;
use crate::observability::metrics;
use crate::resilience::OutboundRequest;
use crate::services::domain::{Operation, OperationType, Problem};
use crate::services::outbound::{deliver_or_enqueue, finish_span, traced_request, Delivery};

pub async fn sum(State(state): State<AppState>, headers: HeaderMap, Json(problem): Json<Problem>) -> Response {
    calculate(&state, &headers, problem, OperationType::Sum).await
}

pub async fn subtract(State(state): State<AppState>, headers: HeaderMap, Json(problem): Json<Problem>) -> Response {
    calculate(&state, &headers, problem, OperationType::Subtract).await
}

async fn calculate(state: &AppState, headers: &HeaderMap, problem: Problem, op: OperationType) -> Response {
    let start = Instant::now();
    let result = problem.solve(op);

    record_history(state, headers, Operation::new(problem, op, result)).await;

    metrics::record_request(op.path(), 200, start);
    Json(result).into_response()
}

async fn record_history(state: &AppState, headers: &HeaderMap, operation: Operation) {
    let Some(history) = state.config.target(HISTORY_SERVICE) else {
        tracing::warn!("HistoryService not configured, operation not recorded");
        return;
    };

    let body = match serde_json::to_vec(&operation) {
        Ok(body) => body,
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode operation");
            return;
        }
    };
    let (request, cx) = traced_request(
        &state.spans,
        "record_history",
        headers,
        OutboundRequest::post_json(history.url("/history"), body),
    );

    let delivery = deliver_or_enqueue(state, HISTORY_SERVICE, &request, EnqueueOn::Transient).await;
    finish_span(&cx, HISTORY_SERVICE, &delivery);
    match delivery {
        Delivery::Delivered(_) | Delivery::Queued { .. } => {}
        Delivery::Failed { error } => {
            tracing::warn!(error = %error, "Operation not recorded in history");
        }
    }
}
