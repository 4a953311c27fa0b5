//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound call to a target:
//!     → protector.rs (per-target breaker check, retry loop)
//!     → transport.rs (reqwest with connect/request timeouts)
//!     → retries.rs (classify outcome, backoff schedule)
//!     → circuit_breaker.rs (count failures, open/half-open/close)
//! ```
//!
//! # Design Decisions
//! - Every outbound call has a deadline (transport timeouts)
//! - Only transient failures are retried and counted
//! - Circuit breaker is per target, never global

pub mod backoff;
pub mod circuit_breaker;
pub mod protector;
pub mod retries;
pub mod transport;

pub use circuit_breaker::{CallPermit, CircuitBreaker, CircuitState};
pub use protector::{CallError, CallProtector, FailureKind, ProtectorEvent};
pub use retries::RetryPolicy;
pub use transport::{HttpTransport, OutboundRequest, OutboundResponse, Transport, TransportError};
