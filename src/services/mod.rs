//! Calculator services.
//!
//! One binary serves any of four roles:
//!
//! | Role     | Routes                                            | Protected targets |
//! |----------|---------------------------------------------------|-------------------|
//! | edge     | `POST /sum`, `POST /subtract`, `GET /history`     | sum, subtract, history |
//! | sum      | `POST /sum`                                       | history |
//! | subtract | `POST /subtract`                                  | history |
//! | history  | `POST /history`, `GET /history`                   | none |
//!
//! Every role serves `GET /health`; all but history serve `GET /admin/queues`.

pub mod admin;
pub mod arithmetic;
pub mod domain;
pub mod edge;
pub mod fallback;
pub mod history;
pub mod outbound;

use std::fmt;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{json, Value};

use crate::config::{HISTORY_SERVICE, SUBTRACT_SERVICE, SUM_SERVICE};
use crate::http::AppState;

/// Which part of the calculator this process plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ServiceRole {
    Edge,
    Sum,
    Subtract,
    History,
}

impl ServiceRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceRole::Edge => "edge",
            ServiceRole::Sum => "sum",
            ServiceRole::Subtract => "subtract",
            ServiceRole::History => "history",
        }
    }

    /// Targets this role calls and therefore must have configured.
    pub fn required_targets(&self) -> &'static [&'static str] {
        match self {
            ServiceRole::Edge => &[SUM_SERVICE, SUBTRACT_SERVICE, HISTORY_SERVICE],
            ServiceRole::Sum | ServiceRole::Subtract => &[HISTORY_SERVICE],
            ServiceRole::History => &[],
        }
    }

    /// Routes served by this role, without middleware or state.
    pub fn routes(&self) -> Router<AppState> {
        let router = Router::new().route("/health", get(health));
        match self {
            ServiceRole::Edge => router
                .route("/sum", post(edge::sum))
                .route("/subtract", post(edge::subtract))
                .route("/history", get(edge::history))
                .route("/admin/queues", get(admin::queues)),
            ServiceRole::Sum => router
                .route("/sum", post(arithmetic::sum))
                .route("/admin/queues", get(admin::queues)),
            ServiceRole::Subtract => router
                .route("/subtract", post(arithmetic::subtract))
                .route("/admin/queues", get(admin::queues)),
            ServiceRole::History => router.route(
                "/history",
                get(history::list_operations).post(history::add_operation),
            ),
        }
    }
}

impl fmt::Display for ServiceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "role": state.role,
        "queued": state.queues.total_queued(),
    }))
}
