//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Drain worker cycle
//!     → prober.rs (GET <base_url><health_path> with its own timeout)
//!     → healthy: replay queued records
//!     → unhealthy: leave the queue untouched until the next cycle
//! ```
//!
//! # Design Decisions
//! - Probes never raise; any failure reads as unhealthy
//! - No health state is kept between cycles; the circuit breaker already
//!   tracks failures on the request path

pub mod prober;

pub use prober::HealthProber;
