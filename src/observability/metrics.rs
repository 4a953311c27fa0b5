//! Metrics collection and exposition.
//!
//! # Metrics
//! - `calc_mesh_requests_total` (counter): inbound requests by route, status
//! - `calc_mesh_request_duration_seconds` (histogram): inbound latency
//! - `calc_mesh_call_attempt_failures_total` (counter): failed outbound attempts by target
//! - `calc_mesh_circuit_rejections_total` (counter): calls refused by an open circuit
//! - `calc_mesh_circuit_transitions_total` (counter): breaker transitions by target, state
//! - `calc_mesh_circuit_state` (gauge): 0=closed, 1=open, 2=half_open
//! - `calc_mesh_enqueued_total` (counter): enqueue outcomes by target
//! - `calc_mesh_queue_depth` (gauge): records waiting per target
//! - `calc_mesh_replays_total` (counter): replay outcomes by target
//! - `calc_mesh_replay_dropped_total` (counter): records lost during replay by reason
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::resilience::CircuitState;

/// Install the Prometheus recorder and its scrape listener on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(route: &str, status: u16, start: Instant) {
    let status = status.to_string();
    counter!(
        "calc_mesh_requests_total",
        "route" => route.to_string(),
        "status" => status.clone()
    )
    .increment(1);
    histogram!(
        "calc_mesh_request_duration_seconds",
        "route" => route.to_string(),
        "status" => status
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_attempt_failure(target: &str) {
    counter!("calc_mesh_call_attempt_failures_total", "target" => target.to_string()).increment(1);
}

pub fn record_circuit_rejection(target: &str) {
    counter!("calc_mesh_circuit_rejections_total", "target" => target.to_string()).increment(1);
}

pub fn record_circuit_transition(target: &str, to: CircuitState) {
    counter!(
        "calc_mesh_circuit_transitions_total",
        "target" => target.to_string(),
        "to" => to.as_str()
    )
    .increment(1);
    gauge!("calc_mesh_circuit_state", "target" => target.to_string()).set(f64::from(to as u8));
}

pub fn record_enqueue(target: &str, outcome: &'static str) {
    counter!(
        "calc_mesh_enqueued_total",
        "target" => target.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_queue_depth(target: &str, depth: usize) {
    gauge!("calc_mesh_queue_depth", "target" => target.to_string()).set(depth as f64);
}

pub fn record_replay(target: &str, outcome: &'static str) {
    counter!(
        "calc_mesh_replays_total",
        "target" => target.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_replay_dropped(target: &str, reason: &'static str) {
    counter!(
        "calc_mesh_replay_dropped_total",
        "target" => target.to_string(),
        "reason" => reason
    )
    .increment(1);
}
