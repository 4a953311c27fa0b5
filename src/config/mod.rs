//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks for the selected role)
//!     → ServiceConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::{
    CircuitBreakerConfig, CorsConfig, DrainConfig, EnqueueOn, FallbackConfig, FallbackPolicy,
    ListenerConfig, LogFormat, ObservabilityConfig, OverflowPolicy, QueueConfig, RetryConfig,
    ServiceConfig, SpanExport, TargetConfig, TimeoutConfig, HISTORY_SERVICE, SUBTRACT_SERVICE, SUM_SERVICE,
};
