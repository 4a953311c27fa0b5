//! Protected outbound calls with enqueue-on-failure.
//!
//! # Data Flow
//! ```text
//! handler
//!     → traced_request (inbound trace context → client span → outbound headers)
//!     → CallProtector::execute
//!     → ok: Delivered
//!     → circuit open (or exhausted, per policy): capture record → target queue → Queued
//!     → otherwise: Failed
//! ```

use axum::http::HeaderMap;

use crate::config::EnqueueOn;
use crate::http::AppState;
use crate::observability::propagation::{HeaderCarrier, HeaderMapCarrier, TraceContext};
use crate::observability::SpanTracer;
use crate::queue::FailedRequestRecord;
use crate::resilience::{CallError, FailureKind, OutboundRequest, OutboundResponse};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// How a protected call ended from the handler's point of view.
#[derive(Debug)]
pub enum Delivery {
    Delivered(OutboundResponse),
    /// The call failed and a record was captured for replay.
    Queued { error: CallError },
    /// The call failed and nothing was queued (terminal, or queue refused it).
    Failed { error: CallError },
}

/// Open span `name` under the inbound trace context (or as a new trace) and
/// attach it to `request`. The inbound request id travels along when present.
/// End the returned span with [`finish_span`].
pub fn traced_request(
    spans: &SpanTracer,
    name: &'static str,
    inbound: &HeaderMap,
    mut request: OutboundRequest,
) -> (OutboundRequest, TraceContext) {
    let parent = TraceContext::extract(&HeaderMapCarrier(inbound));
    let cx = spans.start(name, parent.as_ref());
    cx.set_attribute("http.request.method", request.method.to_string());
    cx.set_attribute("url.full", request.url.clone());
    cx.inject(&mut HeaderCarrier(&mut request.headers));

    if let Some(id) = inbound.get(REQUEST_ID_HEADER).and_then(|v| v.to_str().ok()) {
        request = request.with_header(REQUEST_ID_HEADER, id);
    }
    (request, cx)
}

/// End the call span with the delivery's outcome.
pub fn finish_span(cx: &TraceContext, target: &str, delivery: &Delivery) {
    cx.set_attribute("calc.target", target.to_string());
    match delivery {
        Delivery::Delivered(response) => {
            cx.set_attribute("http.response.status_code", i64::from(response.status.as_u16()));
        }
        Delivery::Queued { error } => {
            cx.set_attribute("calc.queued", true);
            cx.record_error(error.to_string());
        }
        Delivery::Failed { error } => cx.record_error(error.to_string()),
    }
    cx.end();
}

fn should_enqueue(error: &CallError, policy: EnqueueOn) -> bool {
    match error.kind() {
        FailureKind::CircuitOpen => true,
        FailureKind::Transient => policy == EnqueueOn::Transient,
        FailureKind::Terminal => false,
    }
}

/// Run `request` against `target` through the protector, queueing it for
/// replay when the failure matches `policy`. Never blocks on the queue.
pub async fn deliver_or_enqueue(
    state: &AppState,
    target: &str,
    request: &OutboundRequest,
    policy: EnqueueOn,
) -> Delivery {
    let error = match state.protector.execute(target, request).await {
        Ok(response) => return Delivery::Delivered(response),
        Err(error) => error,
    };

    if !should_enqueue(&error, policy) {
        return Delivery::Failed { error };
    }

    let record = FailedRequestRecord::capture(target, request);
    let record_id = record.id();
    let queue = state.queues.get_queue(target);
    if queue.enqueue(record).is_accepted() {
        tracing::warn!(
            target_name = %target,
            record_id = %record_id,
            queued = queue.count(),
            error = %error,
            "Call failed, request queued for replay"
        );
        Delivery::Queued { error }
    } else {
        Delivery::Failed { error }
    }
}
