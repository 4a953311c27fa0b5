//! Registry of per-target queues.

use std::sync::Arc;

use dashmap::DashMap;

use crate::config::QueueConfig;
use crate::queue::target_queue::TargetQueue;

/// Maps target name → queue. One queue per name for the life of the
/// registry; created lazily and idempotently under concurrent access.
#[derive(Debug, Default)]
pub struct QueueRegistry {
    queues: DashMap<String, Arc<TargetQueue>>,
    config: QueueConfig,
}

impl QueueRegistry {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            queues: DashMap::new(),
            config,
        }
    }

    pub fn get_queue(&self, target: &str) -> Arc<TargetQueue> {
        if let Some(existing) = self.queues.get(target) {
            return existing.clone();
        }
        self.queues
            .entry(target.to_string())
            .or_insert_with(|| {
                tracing::debug!(target_name = %target, "Creating failed-request queue");
                Arc::new(TargetQueue::new(target, self.config.clone()))
            })
            .clone()
    }

    /// Queues known so far, sorted by target name.
    pub fn snapshot(&self) -> Vec<(String, Arc<TargetQueue>)> {
        let mut queues: Vec<_> = self
            .queues
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        queues.sort_by(|a, b| a.0.cmp(&b.0));
        queues
    }

    /// `(target, count)` for every known queue.
    pub fn depths(&self) -> Vec<(String, usize)> {
        self.snapshot()
            .into_iter()
            .map(|(name, queue)| (name, queue.count()))
            .collect()
    }

    pub fn total_queued(&self) -> usize {
        self.queues.iter().map(|entry| entry.value().count()).sum()
    }
}
