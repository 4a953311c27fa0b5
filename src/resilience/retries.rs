//! Retry logic.
//!
//! # Responsibilities
//! - Classify outcomes as success, transient or terminal
//! - Hold the retry budget (attempts) and backoff schedule
//!
//! # Design Decisions
//! - Connection errors, timeouts, 5xx and 408 are transient
//! - Other 4xx are terminal and never retried
//! - The budget counts total attempts, including the first

use std::time::Duration;

use reqwest::StatusCode;

use crate::config::RetryConfig;
use crate::resilience::backoff::Backoff;
use crate::resilience::transport::{OutboundResponse, TransportError};

/// Classification of a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Transient,
    Terminal,
}

/// Classify the result of one transport call.
pub fn classify(result: &Result<OutboundResponse, TransportError>) -> Outcome {
    match result {
        Ok(response) => classify_status(response.status),
        Err(_) => Outcome::Transient,
    }
}

pub fn classify_status(status: StatusCode) -> Outcome {
    if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
        Outcome::Transient
    } else if status.is_client_error() {
        Outcome::Terminal
    } else {
        Outcome::Success
    }
}

/// Attempt budget plus backoff schedule.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            Backoff::new(
                Duration::from_millis(config.base_delay_ms),
                config.backoff_base,
                Duration::from_millis(config.max_delay_ms),
            ),
        )
    }

    /// True if another attempt may follow the given (1-based) attempt.
    pub fn has_attempts_left(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Wait before the attempt following `attempt`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff.jittered(attempt)
    }

    /// Longest a call can run when every attempt hits `attempt_timeout`,
    /// counting the full jitter on every wait.
    pub fn worst_case(&self, attempt_timeout: Duration) -> Duration {
        let waits: Duration = (1..self.max_attempts)
            .map(|attempt| {
                let delay = self.backoff.delay_for(attempt);
                delay + delay / 10
            })
            .sum();
        attempt_timeout.saturating_mul(self.max_attempts).saturating_add(waits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(classify_status(StatusCode::OK), Outcome::Success);
        assert_eq!(classify_status(StatusCode::NO_CONTENT), Outcome::Success);
        assert_eq!(classify_status(StatusCode::INTERNAL_SERVER_ERROR), Outcome::Transient);
        assert_eq!(classify_status(StatusCode::SERVICE_UNAVAILABLE), Outcome::Transient);
        assert_eq!(classify_status(StatusCode::REQUEST_TIMEOUT), Outcome::Transient);
        assert_eq!(classify_status(StatusCode::BAD_REQUEST), Outcome::Terminal);
        assert_eq!(classify_status(StatusCode::NOT_FOUND), Outcome::Terminal);
    }

    #[test]
    fn test_network_errors_are_transient() {
        let result = Err(TransportError::Network("connection refused".into()));
        assert_eq!(classify(&result), Outcome::Transient);
        assert_eq!(classify(&Err(TransportError::Timeout)), Outcome::Transient);
    }

    #[test]
    fn test_budget_counts_total_attempts() {
        let policy = RetryPolicy::from_config(&RetryConfig::default());
        assert_eq!(policy.max_attempts, 3);
        assert!(policy.has_attempts_left(1));
        assert!(policy.has_attempts_left(2));
        assert!(!policy.has_attempts_left(3));
    }

    #[test]
    fn test_worst_case_covers_attempts_and_waits() {
        let policy = RetryPolicy::from_config(&RetryConfig::default());
        // 3 x 5s attempts, then 2s and 4s waits plus 10% jitter each.
        assert_eq!(
            policy.worst_case(Duration::from_secs(5)),
            Duration::from_millis(15_000 + 2_200 + 4_400)
        );

        let single = RetryPolicy::new(1, Backoff::new(Duration::from_secs(1), 2, Duration::from_secs(8)));
        assert_eq!(single.worst_case(Duration::from_secs(5)), Duration::from_secs(5));
    }

    #[test]
    fn test_zero_attempts_is_clamped() {
        let policy = RetryPolicy::new(0, Backoff::new(Duration::ZERO, 2, Duration::ZERO));
        assert_eq!(policy.max_attempts, 1);
    }
}
