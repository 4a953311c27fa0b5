//! Circuit breaker for downstream protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: target assumed down, requests fail fast
//! - Half-Open: one probe request decides recovery
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive transient failures >= threshold
//! Open → Half-Open: first acquire after the cool-down elapses
//! Half-Open → Closed: probe succeeds (failure counter reset)
//! Half-Open → Open: probe fails, or the probe permit is dropped unsettled
//! ```
//!
//! # Design Decisions
//! - One breaker per target, owned by the `CallProtector` registry
//! - State and the time it was entered live in one `AtomicU64`, so every
//!   transition is a single compare-and-swap with exactly one winner
//! - Only the caller holding the probe permit can leave Half-Open

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::broadcast;

use crate::config::CircuitBreakerConfig;
use crate::observability::metrics;
use crate::resilience::protector::ProtectorEvent;

/// Circuit state.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed = 0,
    Open = 1,
    HalfOpen = 2,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

impl From<u64> for CircuitState {
    fn from(val: u64) -> Self {
        match val & STATE_MASK {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }
}

const STATE_BITS: u32 = 2;
const STATE_MASK: u64 = 0b11;

fn pack(state: CircuitState, since_ms: u64) -> u64 {
    (since_ms << STATE_BITS) | state as u64
}

fn unpack(word: u64) -> (CircuitState, u64) {
    (CircuitState::from(word), word >> STATE_BITS)
}

/// Per-target circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    target: String,
    failure_threshold: u32,
    cool_down: Duration,
    /// Reference point for the millisecond timestamps packed into `word`.
    epoch: Instant,
    /// `(entered_at_ms << 2) | state`.
    word: AtomicU64,
    consecutive_failures: AtomicU32,
    events: broadcast::Sender<ProtectorEvent>,
}

impl CircuitBreaker {
    pub fn new(
        target: impl Into<String>,
        config: &CircuitBreakerConfig,
        events: broadcast::Sender<ProtectorEvent>,
    ) -> Self {
        Self {
            target: target.into(),
            failure_threshold: config.failure_threshold.max(1),
            cool_down: Duration::from_millis(config.cool_down_ms),
            epoch: Instant::now(),
            word: AtomicU64::new(pack(CircuitState::Closed, 0)),
            consecutive_failures: AtomicU32::new(0),
            events,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn state(&self) -> CircuitState {
        unpack(self.word.load(Ordering::Acquire)).0
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Acquire)
    }

    /// Ask to place a call. `None` means the circuit is open (or a probe is
    /// already in flight) and the caller must fail fast.
    pub fn acquire(self: &Arc<Self>) -> Option<CallPermit> {
        loop {
            let current = self.word.load(Ordering::Acquire);
            let (state, since_ms) = unpack(current);

            match state {
                CircuitState::Closed => return Some(self.permit(PermitKind::Normal)),
                CircuitState::HalfOpen => return None,
                CircuitState::Open => {
                    let now_ms = self.now_ms();
                    if now_ms.saturating_sub(since_ms) < self.cool_down_ms() {
                        return None;
                    }

                    let next = pack(CircuitState::HalfOpen, now_ms);
                    if self
                        .word
                        .compare_exchange(current, next, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        self.announce(CircuitState::Open, CircuitState::HalfOpen);
                        return Some(self.permit(PermitKind::Probe));
                    }
                    // Lost the race for the probe; re-read the new state.
                }
            }
        }
    }

    fn permit(self: &Arc<Self>, kind: PermitKind) -> CallPermit {
        CallPermit {
            breaker: Arc::clone(self),
            kind,
            settled: false,
        }
    }

    fn on_success(&self, kind: PermitKind) {
        self.consecutive_failures.store(0, Ordering::Release);
        if kind == PermitKind::Probe {
            self.transition(CircuitState::HalfOpen, CircuitState::Closed);
        }
    }

    fn on_transient_failure(&self, kind: PermitKind) {
        match kind {
            PermitKind::Probe => {
                self.transition(CircuitState::HalfOpen, CircuitState::Open);
            }
            PermitKind::Normal => {
                let failures = self.consecutive_failures.fetch_add(1, Ordering::AcqRel) + 1;
                if failures >= self.failure_threshold {
                    self.transition(CircuitState::Closed, CircuitState::Open);
                }
            }
        }
    }

    fn on_terminal(&self, kind: PermitKind) {
        // A 4xx answer to the probe proves the target is reachable.
        if kind == PermitKind::Probe {
            self.on_success(kind);
        }
    }

    /// CAS `from → to`. Returns false if the breaker was not in `from`.
    fn transition(&self, from: CircuitState, to: CircuitState) -> bool {
        loop {
            let current = self.word.load(Ordering::Acquire);
            if unpack(current).0 != from {
                return false;
            }

            let next = pack(to, self.now_ms());
            if self
                .word
                .compare_exchange(current, next, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                self.announce(from, to);
                return true;
            }
        }
    }

    fn announce(&self, from: CircuitState, to: CircuitState) {
        match to {
            CircuitState::Open => tracing::warn!(
                target_name = %self.target,
                from = ?from,
                consecutive_failures = self.consecutive_failures(),
                cool_down_ms = self.cool_down_ms(),
                "Circuit opened"
            ),
            CircuitState::HalfOpen => tracing::info!(
                target_name = %self.target,
                "Circuit half-open, allowing probe"
            ),
            CircuitState::Closed => tracing::info!(
                target_name = %self.target,
                "Circuit closed"
            ),
        }

        metrics::record_circuit_transition(&self.target, to);

        let _ = self.events.send(ProtectorEvent::Transition {
            target: self.target.clone(),
            from,
            to,
        });
    }

    fn now_ms(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX >> STATE_BITS)
    }

    fn cool_down_ms(&self) -> u64 {
        u64::try_from(self.cool_down.as_millis()).unwrap_or(u64::MAX)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermitKind {
    /// Regular call while the circuit is closed.
    Normal,
    /// The single half-open probe.
    Probe,
}

/// Permission to place one call. Settle it with the call's outcome.
///
/// Dropping an unsettled probe permit counts as a failed probe.
#[derive(Debug)]
pub struct CallPermit {
    breaker: Arc<CircuitBreaker>,
    kind: PermitKind,
    settled: bool,
}

impl CallPermit {
    pub fn kind(&self) -> PermitKind {
        self.kind
    }

    pub fn succeed(mut self) {
        self.settled = true;
        self.breaker.on_success(self.kind);
    }

    /// Transient failure (network error, 5xx).
    pub fn fail(mut self) {
        self.settled = true;
        self.breaker.on_transient_failure(self.kind);
    }

    /// Terminal (4xx) outcome: neutral while closed.
    pub fn terminal(mut self) {
        self.settled = true;
        self.breaker.on_terminal(self.kind);
    }
}

impl Drop for CallPermit {
    fn drop(&mut self) {
        if !self.settled && self.kind == PermitKind::Probe {
            tracing::warn!(target_name = %self.breaker.target, "Probe abandoned, reopening circuit");
            self.breaker.on_transient_failure(PermitKind::Probe);
        }
    }
}
