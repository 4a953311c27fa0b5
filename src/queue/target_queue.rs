//! In-memory FIFO of failed requests for one target.
//!
//! Not persistent: records are lost on restart.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::config::{OverflowPolicy, QueueConfig};
use crate::observability::metrics;
use crate::queue::record::FailedRequestRecord;

/// Result of an enqueue. Never an error: the request path must not fail
/// because of the queue.
#[derive(Debug)]
pub enum EnqueueOutcome {
    Accepted,
    /// Queue was full; the oldest record was evicted to make room.
    DroppedOldest(FailedRequestRecord),
    /// Queue was full; the new record was refused.
    Rejected(FailedRequestRecord),
}

impl EnqueueOutcome {
    pub fn is_accepted(&self) -> bool {
        !matches!(self, EnqueueOutcome::Rejected(_))
    }

    fn label(&self) -> &'static str {
        match self {
            EnqueueOutcome::Accepted => "accepted",
            EnqueueOutcome::DroppedOldest(_) => "dropped_oldest",
            EnqueueOutcome::Rejected(_) => "rejected",
        }
    }
}

/// FIFO queue shared by many producers and the drain worker.
#[derive(Debug)]
pub struct TargetQueue {
    target: String,
    records: Mutex<VecDeque<FailedRequestRecord>>,
    config: QueueConfig,
    total_enqueued: AtomicU64,
    total_dropped: AtomicU64,
}

impl TargetQueue {
    pub fn new(target: impl Into<String>, config: QueueConfig) -> Self {
        let initial = config.capacity.unwrap_or(16).min(1024);
        Self {
            target: target.into(),
            records: Mutex::new(VecDeque::with_capacity(initial)),
            config,
            total_enqueued: AtomicU64::new(0),
            total_dropped: AtomicU64::new(0),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn enqueue(&self, record: FailedRequestRecord) -> EnqueueOutcome {
        let (outcome, depth) = {
            let mut records = self.records.lock();
            let full = self
                .config
                .capacity
                .is_some_and(|capacity| records.len() >= capacity);

            let outcome = if !full {
                records.push_back(record);
                EnqueueOutcome::Accepted
            } else {
                match self.config.overflow {
                    OverflowPolicy::DropOldest => {
                        let evicted = records.pop_front();
                        records.push_back(record);
                        match evicted {
                            Some(old) => EnqueueOutcome::DroppedOldest(old),
                            None => EnqueueOutcome::Accepted,
                        }
                    }
                    OverflowPolicy::Reject => EnqueueOutcome::Rejected(record),
                }
            };
            (outcome, records.len())
        };

        match &outcome {
            EnqueueOutcome::Accepted => {
                self.total_enqueued.fetch_add(1, Ordering::Relaxed);
            }
            EnqueueOutcome::DroppedOldest(old) => {
                self.total_enqueued.fetch_add(1, Ordering::Relaxed);
                self.total_dropped.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    target_name = %self.target,
                    record_id = %old.id(),
                    "Queue full, dropped oldest record"
                );
            }
            EnqueueOutcome::Rejected(rejected) => {
                self.total_dropped.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    target_name = %self.target,
                    record_id = %rejected.id(),
                    "Queue full, rejected record"
                );
            }
        }

        metrics::record_enqueue(&self.target, outcome.label());
        metrics::record_queue_depth(&self.target, depth);
        outcome
    }

    pub fn dequeue(&self) -> Option<FailedRequestRecord> {
        let (record, depth) = {
            let mut records = self.records.lock();
            let record = records.pop_front();
            (record, records.len())
        };
        if record.is_some() {
            metrics::record_queue_depth(&self.target, depth);
        }
        record
    }

    pub fn count(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// URL of the record at the head of the queue.
    pub fn head_url(&self) -> Option<String> {
        self.records.lock().front().map(|r| r.url().to_string())
    }

    pub fn total_enqueued(&self) -> u64 {
        self.total_enqueued.load(Ordering::Relaxed)
    }

    pub fn total_dropped(&self) -> u64 {
        self.total_dropped.load(Ordering::Relaxed)
    }
}
