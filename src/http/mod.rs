//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, trace, timeout, CORS)
//!     → services (role handlers)
//!     → protected outbound calls / fallback queue
//!     → Send to client
//! ```

pub mod server;

pub use server::{AppState, HttpServer};
