//! Failure injection tests: outages, fallback queueing and replay.

mod common;

use std::time::Duration;

use calc_mesh::config::validation::{validate_config, ValidationError};
use calc_mesh::config::FallbackPolicy;
use calc_mesh::drain::DrainWorker;
use calc_mesh::observability::propagation::{HeaderSlice, TraceContext};
use calc_mesh::resilience::CircuitState;
use calc_mesh::{HttpServer, ServiceRole, Shutdown};
use common::{serve, start_backend, start_hanging_backend, test_config, transport};
use serde_json::Value;

const TRACE_ID: &str = "4bf92f3577b34da6a3ce929d0e0e4736";
const TRACEPARENT: &str = "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01";

#[tokio::test]
async fn test_open_circuit_queues_and_drain_replays_with_original_trace() {
    let (backend_addr, backend) = start_backend(503).await;
    let config = test_config(backend_addr);
    let server = HttpServer::with_transport(ServiceRole::Edge, config.clone(), transport());
    let state = server.state().clone();
    let edge = serve(server.router()).await;

    let client = reqwest::Client::new();
    let res = client
        .post(format!("http://{edge}/sum"))
        .header("content-type", "application/json")
        .header("traceparent", TRACEPARENT)
        .body(r#"{"operandA":2,"operandB":3}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 503);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["queued"], true);

    // Threshold 2: two attempts reached the target, the third failed fast.
    assert_eq!(backend.requests_to("/sum").len(), 2);
    assert_eq!(state.protector.circuit_state("SumService"), Some(CircuitState::Open));
    assert_eq!(state.queues.get_queue("SumService").count(), 1);

    // Further calls fail fast and queue without touching the target.
    let res = client
        .post(format!("http://{edge}/sum"))
        .header("content-type", "application/json")
        .body(r#"{"operandA":2,"operandB":3}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 503);
    assert_eq!(backend.requests_to("/sum").len(), 2);
    assert_eq!(state.queues.get_queue("SumService").count(), 2);
    state.queues.get_queue("SumService").dequeue();

    // Recovery: the next cycle probes, then replays on the first attempt.
    backend.set_status(200);
    let worker = DrainWorker::new(
        state.queues.clone(),
        transport(),
        &config.targets,
        config.drain.clone(),
    );
    let report = worker.run_cycle().await;

    assert_eq!(report.delivered, 1);
    assert_eq!(report.dropped, 0);
    assert_eq!(state.queues.get_queue("SumService").count(), 0);
    assert_eq!(backend.requests_to("/health").len(), 1);

    let replays = backend.requests_to("/sum");
    assert_eq!(replays.len(), 3);
    let replay = &replays[2];
    assert_eq!(replay.body, r#"{"operandA":2,"operandB":3}"#);

    let cx = TraceContext::extract(&HeaderSlice(&replay.headers)).unwrap();
    assert_eq!(cx.trace_id(), TRACE_ID);
    assert_ne!(cx.span_id(), "00f067aa0ba902b7");
}

#[tokio::test]
async fn test_exhausted_replay_drops_record_after_budget() {
    let (backend_addr, backend) = start_backend(503).await;
    let config = test_config(backend_addr);
    let server = HttpServer::with_transport(ServiceRole::Edge, config.clone(), transport());
    let state = server.state().clone();
    let edge = serve(server.router()).await;

    let res = reqwest::Client::new()
        .post(format!("http://{edge}/sum"))
        .header("content-type", "application/json")
        .body(r#"{"operandA":2,"operandB":3}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 503);
    assert_eq!(state.queues.get_queue("SumService").count(), 1);

    // Healthy probe, but the route keeps failing.
    backend.set_path_status("/health", 200);
    let worker = DrainWorker::new(
        state.queues.clone(),
        transport(),
        &config.targets,
        config.drain.clone(),
    );
    let before = backend.requests_to("/sum").len();
    let report = worker.run_cycle().await;

    assert_eq!(report.dropped, 1);
    assert_eq!(report.delivered, 0);
    assert_eq!(backend.requests_to("/sum").len() - before, 3);
    assert_eq!(state.queues.get_queue("SumService").count(), 0);

    // The dropped record does not come back.
    let report = worker.run_cycle().await;
    assert_eq!(report.probed, 0);
    assert_eq!(backend.requests_to("/sum").len() - before, 3);
}

#[tokio::test]
async fn test_local_fallback_answers_with_degraded_result() {
    let (backend_addr, _backend) = start_backend(503).await;
    let mut config = test_config(backend_addr);
    config.fallback.sum = FallbackPolicy::Local;
    let server = HttpServer::with_transport(ServiceRole::Edge, config, transport());
    let state = server.state().clone();
    let edge = serve(server.router()).await;

    let res = reqwest::Client::new()
        .post(format!("http://{edge}/sum"))
        .header("content-type", "application/json")
        .body(r#"{"operandA":2,"operandB":3}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["x-degraded"], "queued");
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["value"], 5.0);
    assert_eq!(state.queues.get_queue("SumService").count(), 1);
}

#[tokio::test]
async fn test_client_errors_are_relayed_not_queued() {
    let (backend_addr, backend) = start_backend(422).await;
    let server = HttpServer::with_transport(ServiceRole::Edge, test_config(backend_addr), transport());
    let state = server.state().clone();
    let edge = serve(server.router()).await;

    let res = reqwest::Client::new()
        .post(format!("http://{edge}/subtract"))
        .header("content-type", "application/json")
        .body(r#"{"operandA":2,"operandB":3}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 422);
    assert_eq!(backend.requests_to("/subtract").len(), 1);
    assert_eq!(state.queues.get_queue("SubtractService").count(), 0);
    assert_eq!(state.protector.circuit_state("SubtractService"), Some(CircuitState::Closed));
}

#[tokio::test]
async fn test_sum_role_succeeds_while_history_is_down() {
    let (backend_addr, backend) = start_backend(500).await;
    let server = HttpServer::with_transport(ServiceRole::Sum, test_config(backend_addr), transport());
    let state = server.state().clone();
    let sum = serve(server.router()).await;

    let res = reqwest::Client::new()
        .post(format!("http://{sum}/sum"))
        .header("content-type", "application/json")
        .header("traceparent", TRACEPARENT)
        .body(r#"{"operandA":2,"operandB":3}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["value"], 5.0);

    let queue = state.queues.get_queue("HistoryService");
    assert_eq!(queue.count(), 1);
    let record = queue.dequeue().unwrap();
    let cx = TraceContext::extract(&HeaderSlice(record.headers())).unwrap();
    assert_eq!(cx.trace_id(), TRACE_ID);

    let recorded: Value = serde_json::from_slice(record.body()).unwrap();
    assert_eq!(recorded["operationType"], "Sum");
    assert_eq!(recorded["result"]["value"], 5.0);
    assert_eq!(backend.requests_to("/history").len(), 2);
}

#[tokio::test]
async fn test_history_round_trip_through_edge() {
    let history = HttpServer::with_transport(
        ServiceRole::History,
        test_config("127.0.0.1:1".parse().unwrap()),
        transport(),
    );
    let history_addr = serve(history.router()).await;

    let sum = HttpServer::with_transport(ServiceRole::Sum, test_config(history_addr), transport());
    let sum_addr = serve(sum.router()).await;

    let mut edge_config = test_config(history_addr);
    edge_config.targets[0].base_url = format!("http://{sum_addr}");
    let edge = HttpServer::with_transport(ServiceRole::Edge, edge_config, transport());
    let edge_addr = serve(edge.router()).await;

    let client = reqwest::Client::new();
    let res = client
        .post(format!("http://{edge_addr}/sum"))
        .json(&serde_json::json!({ "operandA": 4, "operandB": 5 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["value"], 9.0);

    let res = client.get(format!("http://{edge_addr}/history")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    let operations: Value = res.json().await.unwrap();
    assert_eq!(operations.as_array().unwrap().len(), 1);
    assert_eq!(operations[0]["id"], 1);
    assert_eq!(operations[0]["operandA"], 4.0);
    assert_eq!(operations[0]["result"]["value"], 9.0);
}

#[tokio::test]
async fn test_server_stops_on_shutdown() {
    let (backend_addr, _backend) = start_backend(200).await;
    let server = HttpServer::with_transport(ServiceRole::Edge, test_config(backend_addr), transport());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let handle = tokio::spawn(server.run(listener, shutdown.clone()));

    let res = reqwest::get(format!("http://{addr}/health")).await.unwrap();
    assert_eq!(res.status(), 200);
    assert!(res.headers().contains_key("x-request-id"));

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server did not stop")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_hung_target_opens_circuit_and_queues() {
    let hung = start_hanging_backend().await;
    let mut config = test_config(hung);
    config.timeouts.attempt_secs = 1;
    config.timeouts.request_secs = 10;
    assert_eq!(validate_config(&config, ServiceRole::Edge), Ok(()));

    let server = HttpServer::new(ServiceRole::Edge, config).unwrap();
    let state = server.state().clone();
    let edge = serve(server.router()).await;

    let res = reqwest::Client::new()
        .post(format!("http://{edge}/sum"))
        .header("content-type", "application/json")
        .body(r#"{"operandA":2,"operandB":3}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 503);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["queued"], true);
    assert_eq!(state.protector.circuit_state("SumService"), Some(CircuitState::Open));
    assert_eq!(state.protector.breaker("SumService").consecutive_failures(), 2);
    assert_eq!(state.queues.get_queue("SumService").count(), 1);
}

#[tokio::test]
async fn test_hung_history_still_returns_result() {
    let hung = start_hanging_backend().await;
    let mut config = test_config(hung);
    config.timeouts.attempt_secs = 1;
    config.timeouts.request_secs = 10;

    let server = HttpServer::new(ServiceRole::Sum, config).unwrap();
    let state = server.state().clone();
    let sum = serve(server.router()).await;

    let res = reqwest::Client::new()
        .post(format!("http://{sum}/sum"))
        .header("content-type", "application/json")
        .body(r#"{"operandA":2,"operandB":3}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["value"], 5.0);
    assert_eq!(state.queues.get_queue("HistoryService").count(), 1);
}

#[test]
fn test_request_budget_shorter_than_attempts_is_rejected() {
    let mut config = test_config("127.0.0.1:1".parse().unwrap());
    config.timeouts.attempt_secs = 1;
    config.timeouts.request_secs = 1;

    let errors = validate_config(&config, ServiceRole::Edge).unwrap_err();
    assert_eq!(
        errors,
        vec![ValidationError::RequestBudgetTooShort {
            request_secs: 1,
            required_ms: 3_000
        }]
    );
}
