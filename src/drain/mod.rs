//! Background replay of queued requests.
//!
//! # Data Flow
//! ```text
//! interval tick
//!     → for each target with a non-empty queue
//!     → health probe (unhealthy: skip until next tick)
//!     → dequeue + replay with its own retry budget
//!     → delivered / rejected (dropped) / exhausted (dropped, stop target)
//! ```
//!
//! # Design Decisions
//! - One worker per process, iterating every known target each cycle
//! - Replays bypass the circuit breaker: the probe already decided
//! - At most once after the first failure: dropped records are never re-enqueued
//! - Shutdown is observed at every await point

pub mod worker;

pub use worker::{CycleReport, DrainWorker, ReplayOutcome};
