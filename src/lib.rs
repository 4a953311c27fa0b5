//! Calculator services with resilient outbound delivery.

// Core subsystems
pub mod config;
pub mod http;
pub mod services;

// Outbound delivery
pub mod drain;
pub mod health;
pub mod queue;
pub mod resilience;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

#[cfg(test)]
pub(crate) mod testing;

pub use config::schema::ServiceConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use services::ServiceRole;
