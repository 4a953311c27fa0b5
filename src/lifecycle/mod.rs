//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Logging/metrics → Bind → Serve + drain worker
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Stop drain worker → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then core, then listeners
//! - Ordered shutdown: stop accept, stop background work, close

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
