//! Drain worker.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};
use tracing::Instrument;

use crate::config::{DrainConfig, TargetConfig};
use crate::health::HealthProber;
use crate::observability::metrics;
use crate::observability::propagation::{HeaderCarrier, HeaderSlice, TraceContext};
use crate::observability::SpanTracer;
use crate::queue::{FailedRequestRecord, QueueRegistry, TargetQueue};
use crate::resilience::backoff::Backoff;
use crate::resilience::retries::{classify, Outcome, RetryPolicy};
use crate::resilience::transport::Transport;

/// Result of replaying one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayOutcome {
    Delivered,
    /// Terminal answer; the record is dropped.
    Rejected(StatusCode),
    /// Replay budget spent on transient failures; the record is dropped.
    Exhausted { attempts: u32, reason: String },
    /// Shutdown arrived mid-replay; the record is lost.
    Abandoned,
}

impl ReplayOutcome {
    fn label(&self) -> &'static str {
        match self {
            ReplayOutcome::Delivered => "delivered",
            ReplayOutcome::Rejected(_) => "rejected",
            ReplayOutcome::Exhausted { .. } => "exhausted",
            ReplayOutcome::Abandoned => "abandoned",
        }
    }
}

/// What a single cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub probed: usize,
    pub unhealthy: usize,
    pub delivered: usize,
    pub dropped: usize,
    /// The cycle ended early on shutdown.
    pub interrupted: bool,
}

/// Shutdown arrived while waiting.
struct Interrupted;

/// Single background loop draining every target's queue.
pub struct DrainWorker {
    registry: Arc<QueueRegistry>,
    transport: Arc<dyn Transport>,
    prober: HealthProber,
    targets: HashMap<String, TargetConfig>,
    config: DrainConfig,
    retry: RetryPolicy,
    spans: SpanTracer,
}

impl DrainWorker {
    pub fn new(
        registry: Arc<QueueRegistry>,
        transport: Arc<dyn Transport>,
        targets: &[TargetConfig],
        config: DrainConfig,
    ) -> Self {
        let prober = HealthProber::new(
            transport.clone(),
            Duration::from_millis(config.probe_timeout_ms),
        );
        let retry = RetryPolicy::new(
            config.max_attempts,
            Backoff::new(
                Duration::from_millis(config.base_delay_ms),
                config.backoff_base,
                Duration::from_millis(config.max_delay_ms),
            ),
        );
        Self {
            registry,
            transport,
            prober,
            targets: targets.iter().map(|t| (t.name.clone(), t.clone())).collect(),
            config,
            retry,
            spans: SpanTracer::disabled(),
        }
    }

    /// Export one `replay` span per record, nested under the stored context.
    pub fn with_spans(mut self, spans: SpanTracer) -> Self {
        self.spans = spans;
        self
    }

    /// Run until `shutdown` fires. Never returns an error.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Drain worker disabled");
            return;
        }

        tracing::info!(interval_ms = self.config.interval_ms, "Drain worker starting");

        let mut ticker = time::interval(Duration::from_millis(self.config.interval_ms.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; skip it so a fresh process
        // waits one interval before probing.
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                _ = ticker.tick() => {
                    let report = self.cycle(&mut shutdown).await;
                    if report.interrupted {
                        break;
                    }
                }
            }
        }

        tracing::info!("Drain worker received shutdown signal, exiting loop");
    }

    /// Probe every non-empty queue once and drain the healthy ones.
    pub async fn run_cycle(&self) -> CycleReport {
        let (_keep_open, mut never) = broadcast::channel(1);
        self.cycle(&mut never).await
    }

    async fn cycle(&self, shutdown: &mut broadcast::Receiver<()>) -> CycleReport {
        let mut report = CycleReport::default();

        for (target, queue) in self.registry.snapshot() {
            if queue.is_empty() {
                continue;
            }

            let Some(health_url) = self.health_url(&target, &queue) else {
                tracing::warn!(target_name = %target, "No health URL for queued target, skipping");
                continue;
            };

            report.probed += 1;
            let healthy = match until_shutdown(shutdown, self.prober.check(&health_url)).await {
                Ok(healthy) => healthy,
                Err(Interrupted) => {
                    report.interrupted = true;
                    return report;
                }
            };
            if !healthy {
                report.unhealthy += 1;
                tracing::info!(target_name = %target, queued = queue.count(), "Target unhealthy, keeping queue");
                continue;
            }

            tracing::info!(target_name = %target, queued = queue.count(), "Target healthy, draining queue");
            while let Some(record) = queue.dequeue() {
                let outcome = self.replay(&record, shutdown).await;
                metrics::record_replay(&target, outcome.label());

                match outcome {
                    ReplayOutcome::Delivered => report.delivered += 1,
                    ReplayOutcome::Rejected(status) => {
                        report.dropped += 1;
                        report_loss(&record, "rejected", &format!("status {status}"));
                    }
                    ReplayOutcome::Exhausted { attempts, reason } => {
                        report.dropped += 1;
                        report_loss(&record, "exhausted", &format!("{attempts} attempts: {reason}"));
                        break;
                    }
                    ReplayOutcome::Abandoned => {
                        report.dropped += 1;
                        report.interrupted = true;
                        report_loss(&record, "abandoned", "shutdown during replay");
                        return report;
                    }
                }
            }
        }

        report
    }

    /// Configured health URL, or the origin of the head record's URL.
    fn health_url(&self, target: &str, queue: &TargetQueue) -> Option<String> {
        if let Some(config) = self.targets.get(target) {
            return Some(config.health_url());
        }
        let head = queue.head_url()?;
        let url = url::Url::parse(&head).ok()?;
        let origin = url.origin();
        origin
            .is_tuple()
            .then(|| format!("{}/health", origin.ascii_serialization()))
    }

    async fn replay(
        &self,
        record: &FailedRequestRecord,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> ReplayOutcome {
        let mut request = record.to_request();
        let parent = TraceContext::extract(&HeaderSlice(record.headers()));
        let child = parent.as_ref().map(|p| self.spans.start("replay", Some(p)));
        if let Some(child) = &child {
            child.set_attribute("calc.target", record.target().to_string());
            child.set_attribute("calc.record_id", record.id().to_string());
            child.inject(&mut HeaderCarrier(&mut request.headers));
        }

        let span = tracing::info_span!(
            "replay",
            target_name = %record.target(),
            record_id = %record.id(),
            trace_id = %parent.as_ref().map(|p| p.trace_id()).unwrap_or_default(),
            parent_span_id = %parent.as_ref().map(|p| p.span_id()).unwrap_or_default(),
            span_id = %child.as_ref().map(|c| c.span_id()).unwrap_or_default(),
        );

        let outcome = async {
            let mut attempt = 0;
            loop {
                attempt += 1;

                let result = match until_shutdown(shutdown, self.transport.send(&request)).await {
                    Ok(result) => result,
                    Err(Interrupted) => return ReplayOutcome::Abandoned,
                };

                let reason = match (classify(&result), result) {
                    (Outcome::Success, Ok(_)) => {
                        tracing::info!(attempt, "Replay delivered");
                        return ReplayOutcome::Delivered;
                    }
                    (Outcome::Terminal, Ok(response)) => {
                        return ReplayOutcome::Rejected(response.status);
                    }
                    (_, Ok(response)) => format!("status {}", response.status),
                    (_, Err(e)) => e.to_string(),
                };

                tracing::warn!(attempt, reason = %reason, "Replay attempt failed");
                if !self.retry.has_attempts_left(attempt) {
                    return ReplayOutcome::Exhausted {
                        attempts: attempt,
                        reason,
                    };
                }

                let delay = self.retry.delay_after(attempt);
                if until_shutdown(shutdown, time::sleep(delay)).await.is_err() {
                    return ReplayOutcome::Abandoned;
                }
            }
        }
        .instrument(span)
        .await;

        if let Some(child) = &child {
            child.set_attribute("calc.replay.outcome", outcome.label());
            if outcome != ReplayOutcome::Delivered {
                child.record_error(outcome.label());
            }
            child.end();
        }
        outcome
    }
}

fn report_loss(record: &FailedRequestRecord, reason: &'static str, detail: &str) {
    let trace_id = TraceContext::extract(&HeaderSlice(record.headers()))
        .map(|cx| cx.trace_id())
        .unwrap_or_default();
    tracing::error!(
        target_name = %record.target(),
        record_id = %record.id(),
        trace_id = %trace_id,
        url = %record.url(),
        reason,
        detail = %detail,
        "Queued request dropped"
    );
    metrics::record_replay_dropped(record.target(), reason);
}

/// Await `fut` unless shutdown fires first. A closed channel counts as shutdown.
async fn until_shutdown<F: Future>(
    shutdown: &mut broadcast::Receiver<()>,
    fut: F,
) -> Result<F::Output, Interrupted> {
    tokio::select! {
        biased;
        _ = shutdown.recv() => Err(Interrupted),
        out = fut => Ok(out),
    }
}
