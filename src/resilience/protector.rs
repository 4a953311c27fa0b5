//! Call protector: retry + circuit breaker around one outbound call.
//!
//! # Responsibilities
//! - Own one circuit breaker per target name
//! - Retry transient failures with exponential backoff
//! - Fail fast without touching the network while a circuit is open
//! - Publish circuit transitions and failed attempts
//!
//! # Data Flow
//! ```text
//! execute(target, request)
//!     → breaker.acquire()      (None → CallError::CircuitOpen)
//!     → transport.send()
//!     → classify               (success / transient / terminal)
//!     → settle permit          (may trip or close the circuit)
//!     → transient: sleep backoff, loop while attempts remain
//! ```

use std::sync::Arc;

use axum::body::Bytes;
use dashmap::DashMap;
use reqwest::StatusCode;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::config::CircuitBreakerConfig;
use crate::observability::metrics;
use crate::resilience::circuit_breaker::{CircuitBreaker, CircuitState};
use crate::resilience::retries::{classify, Outcome, RetryPolicy};
use crate::resilience::transport::{OutboundRequest, OutboundResponse, Transport};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Observable side effects of protected calls.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtectorEvent {
    Transition {
        target: String,
        from: CircuitState,
        to: CircuitState,
    },
    AttemptFailed {
        target: String,
        attempt: u32,
        reason: String,
    },
}

/// Tag callers branch on instead of matching error variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Network error or 5xx after the retry budget was spent.
    Transient,
    /// 4xx: surfaced as-is, never retried.
    Terminal,
    /// Rejected locally; the network was not touched.
    CircuitOpen,
}

/// Failure of a protected call.
#[derive(Debug, Clone, Error)]
pub enum CallError {
    #[error("circuit open for {target}")]
    CircuitOpen { target: String },

    #[error("{target} still failing after {attempts} attempts: {reason}")]
    Exhausted {
        target: String,
        attempts: u32,
        reason: String,
    },

    #[error("{target} rejected the request with status {status}")]
    Rejected {
        target: String,
        status: StatusCode,
        body: Bytes,
    },
}

impl CallError {
    pub fn kind(&self) -> FailureKind {
        match self {
            CallError::CircuitOpen { .. } => FailureKind::CircuitOpen,
            CallError::Exhausted { .. } => FailureKind::Transient,
            CallError::Rejected { .. } => FailureKind::Terminal,
        }
    }

    pub fn target(&self) -> &str {
        match self {
            CallError::CircuitOpen { target }
            | CallError::Exhausted { target, .. }
            | CallError::Rejected { target, .. } => target,
        }
    }
}

/// Executes outbound calls under the retry and circuit-breaker policy.
pub struct CallProtector {
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
    breaker_config: CircuitBreakerConfig,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    events: broadcast::Sender<ProtectorEvent>,
}

impl CallProtector {
    pub fn new(
        transport: Arc<dyn Transport>,
        retry: RetryPolicy,
        breaker_config: CircuitBreakerConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            transport,
            retry,
            breaker_config,
            breakers: DashMap::new(),
            events,
        }
    }

    /// Subscribe to transition and failed-attempt events.
    pub fn subscribe(&self) -> broadcast::Receiver<ProtectorEvent> {
        self.events.subscribe()
    }

    /// Breaker for `target`, created on first use.
    pub fn breaker(&self, target: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(target) {
            return existing.clone();
        }
        self.breakers
            .entry(target.to_string())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::new(target, &self.breaker_config, self.events.clone()))
            })
            .clone()
    }

    pub fn circuit_state(&self, target: &str) -> Option<CircuitState> {
        self.breakers.get(target).map(|b| b.state())
    }

    /// Run one protected call.
    pub async fn execute(
        &self,
        target: &str,
        request: &OutboundRequest,
    ) -> Result<OutboundResponse, CallError> {
        let breaker = self.breaker(target);
        let mut attempt = 0;

        loop {
            attempt += 1;

            let Some(permit) = breaker.acquire() else {
                tracing::warn!(
                    target_name = %target,
                    attempt,
                    url = %request.url,
                    "Circuit open, failing fast"
                );
                metrics::record_circuit_rejection(target);
                return Err(CallError::CircuitOpen {
                    target: target.to_string(),
                });
            };

            let result = self.transport.send(request).await;

            let reason = match (classify(&result), result) {
                (Outcome::Success, Ok(response)) => {
                    permit.succeed();
                    return Ok(response);
                }
                (Outcome::Terminal, Ok(response)) => {
                    permit.terminal();
                    tracing::debug!(
                        target_name = %target,
                        status = %response.status,
                        "Terminal response, not retrying"
                    );
                    return Err(CallError::Rejected {
                        target: target.to_string(),
                        status: response.status,
                        body: response.body,
                    });
                }
                (_, Ok(response)) => {
                    permit.fail();
                    format!("status {}", response.status)
                }
                (_, Err(e)) => {
                    permit.fail();
                    e.to_string()
                }
            };

            self.report_failed_attempt(target, attempt, &reason);

            if !self.retry.has_attempts_left(attempt) {
                return Err(CallError::Exhausted {
                    target: target.to_string(),
                    attempts: attempt,
                    reason,
                });
            }

            let delay = self.retry.delay_after(attempt);
            tracing::info!(target_name = %target, attempt, delay = ?delay, "Retrying call");
            tokio::time::sleep(delay).await;
        }
    }

    fn report_failed_attempt(&self, target: &str, attempt: u32, reason: &str) {
        tracing::warn!(target_name = %target, attempt, reason = %reason, "Call attempt failed");
        metrics::record_attempt_failure(target);
        let _ = self.events.send(ProtectorEvent::AttemptFailed {
            target: target.to_string(),
            attempt,
            reason: reason.to_string(),
        });
    }
}
