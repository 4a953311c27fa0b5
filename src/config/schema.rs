//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for every
//! service role. All types derive Serde traits for deserialization from
//! config files.

use serde::{Deserialize, Serialize};

pub const SUM_SERVICE: &str = "SumService";
pub const SUBTRACT_SERVICE: &str = "SubtractService";
pub const HISTORY_SERVICE: &str = "HistoryService";

/// Root configuration shared by all roles.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Downstream targets reachable from this service.
    pub targets: Vec<TargetConfig>,

    /// Circuit breaker settings, applied per target.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Retry settings for protected calls.
    pub retries: RetryConfig,

    /// Fallback queue settings.
    pub queue: QueueConfig,

    /// Background drain worker settings.
    pub drain: DrainConfig,

    /// Outbound timeouts.
    pub timeouts: TimeoutConfig,

    /// What handlers do when a call cannot be delivered.
    pub fallback: FallbackConfig,

    /// CORS settings for the edge service.
    pub cors: CorsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            targets: default_targets(),
            circuit_breaker: CircuitBreakerConfig::default(),
            retries: RetryConfig::default(),
            queue: QueueConfig::default(),
            drain: DrainConfig::default(),
            timeouts: TimeoutConfig::default(),
            fallback: FallbackConfig::default(),
            cors: CorsConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl ServiceConfig {
    pub fn target(&self, name: &str) -> Option<&TargetConfig> {
        self.targets.iter().find(|t| t.name == name)
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// A logical downstream service.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct TargetConfig {
    /// Logical name, e.g. "SumService". Keys circuits and queues.
    pub name: String,

    /// Base URL, e.g. "http://sum-service:80".
    pub base_url: String,

    /// Liveness path probed by the drain worker.
    #[serde(default = "default_health_path")]
    pub health_path: String,
}

impl TargetConfig {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            health_path: default_health_path(),
        }
    }

    /// Join the base URL with a route path.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    pub fn health_url(&self) -> String {
        self.url(&self.health_path)
    }
}

fn default_health_path() -> String {
    "/health".to_string()
}

pub fn default_targets() -> Vec<TargetConfig> {
    vec![
        TargetConfig::new(SUM_SERVICE, "http://sum-service:80"),
        TargetConfig::new(SUBTRACT_SERVICE, "http://subtract-service:80"),
        TargetConfig::new(HISTORY_SERVICE, "http://history-service:80"),
    ]
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive transient failures before the circuit opens.
    pub failure_threshold: u32,

    /// Time the circuit stays open before a probe is allowed, in milliseconds.
    pub cool_down_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 2,
            cool_down_ms: 30_000,
        }
    }
}

/// Retry configuration for protected calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per call, including the first.
    pub max_attempts: u32,

    /// Delay unit in milliseconds.
    pub base_delay_ms: u64,

    /// Exponential base: the wait after attempt n is `base_delay_ms * backoff_base^n`.
    pub backoff_base: u32,

    /// Maximum delay in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            backoff_base: 2,
            max_delay_ms: 30_000,
        }
    }
}

/// What to do when a bounded queue is full.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Evict the oldest record and accept the new one.
    #[default]
    DropOldest,
    /// Refuse the new record.
    Reject,
}

/// Fallback queue configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum records per target. `None` means unbounded.
    pub capacity: Option<usize>,

    /// Applies only when `capacity` is set.
    pub overflow: OverflowPolicy,
}

/// Drain worker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DrainConfig {
    /// Run the drain worker.
    pub enabled: bool,

    /// Interval between probe cycles in milliseconds.
    pub interval_ms: u64,

    /// Replay attempts per record, independent of the call retry budget.
    pub max_attempts: u32,

    /// Replay delay unit in milliseconds.
    pub base_delay_ms: u64,

    /// Replay exponential base.
    pub backoff_base: u32,

    /// Maximum replay delay in milliseconds.
    pub max_delay_ms: u64,

    /// Health probe timeout in milliseconds.
    pub probe_timeout_ms: u64,
}

impl Default for DrainConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 60_000,
            max_attempts: 3,
            base_delay_ms: 1000,
            backoff_base: 2,
            max_delay_ms: 30_000,
            probe_timeout_ms: 5000,
        }
    }
}

/// Timeout configuration.
///
/// `attempt_secs` bounds one outbound attempt. `request_secs` bounds a whole
/// inbound request and must leave room for every attempt plus the backoff
/// waits between them, otherwise a hung target cancels the handler before
/// the breaker and the queue see the failure.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Total time for one outbound attempt (connect, send, read) in seconds.
    pub attempt_secs: u64,

    /// Inbound handler budget in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            attempt_secs: 5,
            request_secs: 30,
        }
    }
}

/// Which failures make a handler enqueue the request.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum EnqueueOn {
    /// Only when the circuit is open.
    #[default]
    CircuitOpen,
    /// Circuit open or retries exhausted.
    Transient,
}

/// Answer given to the caller after a request was queued.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// 503 Service Unavailable.
    #[default]
    Unavailable,
    /// 200 with a locally computed result, flagged as degraded.
    Local,
}

/// Fallback behavior per call site.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct FallbackConfig {
    pub enqueue_on: EnqueueOn,
    pub sum: FallbackPolicy,
    pub subtract: FallbackPolicy,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Allowed origins. Empty allows any origin.
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![
                "http://localhost:8080".to_string(),
                "http://localhost:5173".to_string(),
            ],
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,

    /// Where finished spans go.
    pub span_export: SpanExport,
}

/// Span exporter selection.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SpanExport {
    /// Spans only carry ids between services.
    #[default]
    Off,
    /// Finished spans are written to stdout.
    Stdout,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
            span_export: SpanExport::Off,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.circuit_breaker.failure_threshold, 2);
        assert_eq!(config.circuit_breaker.cool_down_ms, 30_000);
        assert_eq!(config.retries.max_attempts, 3);
        assert_eq!(config.drain.interval_ms, 60_000);
        assert_eq!(config.timeouts.attempt_secs, 5);
        assert_eq!(config.observability.span_export, SpanExport::Off);
        assert!(config.queue.capacity.is_none());
        assert_eq!(config.fallback.enqueue_on, EnqueueOn::CircuitOpen);
        assert_eq!(config.fallback.sum, FallbackPolicy::Unavailable);
        assert_eq!(config.targets.len(), 3);
        assert_eq!(
            config.target(HISTORY_SERVICE).map(|t| t.base_url.as_str()),
            Some("http://history-service:80")
        );
    }

    #[test]
    fn test_minimal_toml() {
        let config: ServiceConfig = toml::from_str(
            r#"
            [listener]
            bind_address = "127.0.0.1:9000"

            [[targets]]
            name = "SumService"
            base_url = "http://localhost:5001/"

            [queue]
            capacity = 100
            overflow = "reject"

            [fallback]
            sum = "local"
            enqueue_on = "transient"

            [observability]
            span_export = "stdout"
            "#,
        )
        .unwrap();

        assert_eq!(config.listener.bind_address, "127.0.0.1:9000");
        let sum = config.target("SumService").unwrap();
        assert_eq!(sum.health_path, "/health");
        assert_eq!(sum.health_url(), "http://localhost:5001/health");
        assert_eq!(sum.url("/sum"), "http://localhost:5001/sum");
        assert_eq!(config.queue.capacity, Some(100));
        assert_eq!(config.queue.overflow, OverflowPolicy::Reject);
        assert_eq!(config.fallback.sum, FallbackPolicy::Local);
        assert_eq!(config.fallback.subtract, FallbackPolicy::Unavailable);
        assert_eq!(config.fallback.enqueue_on, EnqueueOn::Transient);
        assert_eq!(config.retries.max_attempts, 3);
        assert_eq!(config.observability.span_export, SpanExport::Stdout);
        assert_eq!(config.observability.log_level, "info");
    }
}
