//! Scripted transports and span capture for unit tests.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use metrics::{Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit};
use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracerProvider};
use parking_lot::Mutex;
use reqwest::StatusCode;

use crate::observability::SpanTracer;

use crate::resilience::backoff::Backoff;
use crate::resilience::retries::RetryPolicy;
use crate::resilience::transport::{OutboundRequest, OutboundResponse, Transport, TransportError};

/// Retry policy without waits.
pub(crate) fn fast_retry(attempts: u32) -> RetryPolicy {
    RetryPolicy::new(attempts, Backoff::new(Duration::ZERO, 2, Duration::ZERO))
}

/// Tracer whose finished spans land in the returned exporter as soon as they end.
pub(crate) fn recording_spans() -> (SpanTracer, InMemorySpanExporter) {
    let exporter = InMemorySpanExporter::default();
    let provider = SdkTracerProvider::builder()
        .with_simple_exporter(exporter.clone())
        .build();
    (SpanTracer::new(provider), exporter)
}

/// Recorder that remembers the name and labels of every counter touched.
/// Install with `metrics::set_default_local_recorder`.
#[derive(Debug, Default)]
pub(crate) struct CounterLog {
    seen: Mutex<Vec<(String, Vec<(String, String)>)>>,
}

impl CounterLog {
    pub(crate) fn contains(&self, name: &str, labels: &[(&str, &str)]) -> bool {
        self.seen.lock().iter().any(|(seen_name, seen_labels)| {
            seen_name == name
                && labels
                    .iter()
                    .all(|(k, v)| seen_labels.iter().any(|(sk, sv)| sk == k && sv == v))
        })
    }
}

impl Recorder for CounterLog {
    fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
    fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
    fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

    fn register_counter(&self, key: &Key, _: &Metadata<'_>) -> Counter {
        let labels = key
            .labels()
            .map(|l| (l.key().to_string(), l.value().to_string()))
            .collect();
        self.seen.lock().push((key.name().to_string(), labels));
        Counter::noop()
    }

    fn register_gauge(&self, _: &Key, _: &Metadata<'_>) -> Gauge {
        Gauge::noop()
    }

    fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
        Histogram::noop()
    }
}

#[derive(Debug, Clone)]
enum Step {
    Status(u16),
    Fail(TransportError),
}

#[derive(Debug)]
struct Script {
    steps: VecDeque<Step>,
    /// Repeated once `steps` runs out.
    last: Step,
}

impl Script {
    fn statuses(statuses: &[u16]) -> Self {
        let last = statuses.last().copied().unwrap_or(200);
        Self {
            steps: statuses.iter().copied().map(Step::Status).collect(),
            last: Step::Status(last),
        }
    }

    fn next(&mut self) -> Step {
        self.steps.pop_front().unwrap_or_else(|| self.last.clone())
    }
}

/// Transport answering from per-URL scripts and recording every request.
#[derive(Debug)]
pub(crate) struct ScriptedTransport {
    routes: Mutex<Vec<(String, Script)>>,
    fallback: Mutex<Script>,
    requests: Mutex<Vec<OutboundRequest>>,
    delay: Duration,
}

impl ScriptedTransport {
    fn with_fallback(fallback: Script) -> Self {
        Self {
            routes: Mutex::new(Vec::new()),
            fallback: Mutex::new(fallback),
            requests: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
        }
    }

    /// Answer with `statuses` in order, then keep repeating the last one.
    pub(crate) fn statuses(statuses: &[u16]) -> Self {
        Self::with_fallback(Script::statuses(statuses))
    }

    pub(crate) fn always(status: u16) -> Self {
        Self::statuses(&[status])
    }

    pub(crate) fn network_errors() -> Self {
        Self::with_fallback(Script {
            steps: VecDeque::new(),
            last: Step::Fail(TransportError::Network("connection refused".into())),
        })
    }

    /// Requests whose URL ends with `suffix` use their own script.
    pub(crate) fn route(self, suffix: &str, statuses: &[u16]) -> Self {
        self.routes.lock().push((suffix.to_string(), Script::statuses(statuses)));
        self
    }

    /// Sleep before answering each request.
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub(crate) fn calls_to(&self, suffix: &str) -> usize {
        self.requests.lock().iter().filter(|r| r.url.ends_with(suffix)).count()
    }

    pub(crate) fn requests(&self) -> Vec<OutboundRequest> {
        self.requests.lock().clone()
    }

    fn next_step(&self, url: &str) -> Step {
        let mut routes = self.routes.lock();
        match routes.iter_mut().find(|(suffix, _)| url.ends_with(suffix.as_str())) {
            Some((_, script)) => script.next(),
            None => self.fallback.lock().next(),
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &OutboundRequest) -> Result<OutboundResponse, TransportError> {
        self.requests.lock().push(request.clone());
        let step = self.next_step(&request.url);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match step {
            Step::Status(code) => {
                let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                Ok(OutboundResponse::new(status, r#"{"value":5.0}"#))
            }
            Step::Fail(e) => Err(e),
        }
    }
}
