//! Queue and circuit introspection.

use std::collections::BTreeSet;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::http::AppState;
use crate::resilience::CircuitState;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct QueueStatus {
    pub target: String,
    pub queued: usize,
    pub circuit: CircuitState,
}

/// Every configured or queued target, sorted by name.
pub fn queue_status(state: &AppState) -> Vec<QueueStatus> {
    let depths = state.queues.depths();
    let names: BTreeSet<String> = state
        .config
        .targets
        .iter()
        .map(|t| t.name.clone())
        .chain(depths.iter().map(|(name, _)| name.clone()))
        .collect();

    names
        .into_iter()
        .map(|target| QueueStatus {
            queued: depths
                .iter()
                .find(|(name, _)| *name == target)
                .map_or(0, |(_, depth)| *depth),
            circuit: state
                .protector
                .circuit_state(&target)
                .unwrap_or(CircuitState::Closed),
            target,
        })
        .collect()
}

pub async fn queues(State(state): State<AppState>) -> Json<Vec<QueueStatus>> {
    Json(queue_status(&state))
}
