//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Outbound calls and queued records carry:
//!     → propagation.rs (W3C trace context and baggage)
//!
//! Outbound calls and replays open:
//!     → spans.rs (OpenTelemetry client spans, optionally exported)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Trace id flows from the inbound request into every replay
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
pub mod propagation;
pub mod spans;

pub use propagation::{HeaderCarrier, HeaderMapCarrier, HeaderSlice, TraceContext};
pub use spans::SpanTracer;
