//! History role: in-memory store of computed operations.

use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::State;
use axum::Json;
use parking_lot::RwLock;

use crate::http::AppState;
use crate::services::domain::Operation;

/// Process-local history, insertion ordered.
#[derive(Debug, Default)]
pub struct HistoryStore {
    next_id: AtomicU64,
    operations: RwLock<Vec<Operation>>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `operation` under a fresh id and return the stored copy.
    pub fn add(&self, mut operation: Operation) -> Operation {
        let mut operations = self.operations.write();
        operation.id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        operations.push(operation.clone());
        operation
    }

    pub fn all(&self) -> Vec<Operation> {
        self.operations.read().clone()
    }

    pub fn len(&self) -> usize {
        self.operations.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub async fn add_operation(State(state): State<AppState>, Json(operation): Json<Operation>) -> Json<Operation> {
    let stored = state.history.add(operation);
    tracing::debug!(id = stored.id, operation_type = ?stored.operation_type, "Operation recorded");
    Json(stored)
}

pub async fn list_operations(State(state): State<AppState>) -> Json<Vec<Operation>> {
    Json(state.history.all())
}
