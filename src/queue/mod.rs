//! Fallback queues for calls that cannot currently succeed.
//!
//! # Data Flow
//! ```text
//! Request handler (circuit open / retries exhausted)
//!     → record.rs (capture method, URL, headers incl. trace context, body)
//!     → registry.rs (get_queue(target), lazily created)
//!     → target_queue.rs (FIFO enqueue)
//!
//! Drain worker
//!     → registry.rs snapshot → target_queue.rs dequeue → replay
//! ```
//!
//! # Design Decisions
//! - Process-local and in-memory only
//! - Unbounded unless `queue.capacity` is set; overflow policy is explicit

pub mod record;
pub mod registry;
pub mod target_queue;

pub use record::FailedRequestRecord;
pub use registry::QueueRegistry;
pub use target_queue::{EnqueueOutcome, TargetQueue};
