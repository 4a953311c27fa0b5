//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds, attempts, backoff bases)
//! - Check that the selected role has every target it calls
//! - Check that the inbound budget outlasts a fully retried outbound call
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::time::Duration;

use thiserror::Error;

use crate::config::schema::ServiceConfig;
use crate::resilience::RetryPolicy;
use crate::services::ServiceRole;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} must be at least {min}")]
    TooSmall { field: &'static str, min: u64 },

    #[error("target name must not be empty")]
    EmptyTargetName,

    #[error("target '{0}' is defined more than once")]
    DuplicateTarget(String),

    #[error("target '{name}' has an invalid base_url '{url}'")]
    InvalidUrl { name: String, url: String },

    #[error("role {role} requires target '{target}'")]
    MissingTarget { role: ServiceRole, target: String },

    #[error("invalid bind address '{0}'")]
    InvalidBindAddress(String),

    #[error("timeouts.request_secs ({request_secs}s) is shorter than a fully retried call ({required_ms}ms)")]
    RequestBudgetTooShort { request_secs: u64, required_ms: u64 },
}

/// Validate `config` for `role`, collecting every problem.
pub fn validate_config(config: &ServiceConfig, role: ServiceRole) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let mut at_least = |field: &'static str, value: u64, min: u64| {
        if value < min {
            errors.push(ValidationError::TooSmall { field, min });
        }
    };
    at_least("circuit_breaker.failure_threshold", config.circuit_breaker.failure_threshold.into(), 1);
    at_least("retries.max_attempts", config.retries.max_attempts.into(), 1);
    at_least("retries.backoff_base", config.retries.backoff_base.into(), 1);
    at_least("drain.max_attempts", config.drain.max_attempts.into(), 1);
    at_least("drain.backoff_base", config.drain.backoff_base.into(), 1);
    at_least("drain.interval_ms", config.drain.interval_ms, 1);
    at_least("drain.probe_timeout_ms", config.drain.probe_timeout_ms, 1);
    at_least("timeouts.request_secs", config.timeouts.request_secs, 1);
    at_least("timeouts.attempt_secs", config.timeouts.attempt_secs, 1);
    if let Some(capacity) = config.queue.capacity {
        at_least("queue.capacity", capacity as u64, 1);
    }

    let worst_case = RetryPolicy::from_config(&config.retries)
        .worst_case(Duration::from_secs(config.timeouts.attempt_secs));
    if Duration::from_secs(config.timeouts.request_secs) < worst_case {
        errors.push(ValidationError::RequestBudgetTooShort {
            request_secs: config.timeouts.request_secs,
            required_ms: u64::try_from(worst_case.as_millis()).unwrap_or(u64::MAX),
        });
    }

    if config.listener.bind_address.parse::<std::net::SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(config.listener.bind_address.clone()));
    }

    let mut seen = HashSet::new();
    for target in &config.targets {
        if target.name.trim().is_empty() {
            errors.push(ValidationError::EmptyTargetName);
            continue;
        }
        if !seen.insert(target.name.as_str()) {
            errors.push(ValidationError::DuplicateTarget(target.name.clone()));
        }
        if url::Url::parse(&target.base_url).is_err() {
            errors.push(ValidationError::InvalidUrl {
                name: target.name.clone(),
                url: target.base_url.clone(),
            });
        }
    }

    for required in role.required_targets() {
        if config.target(required).is_none() {
            errors.push(ValidationError::MissingTarget {
                role,
                target: (*required).to_string(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
