use std::{collections::HashMap, sync::Arc};

use tracing::{debug, error, info, instrument, warn};

use crate::daemon::storage::{aggregate_storage::AggregateStore, entities::DailyAggregate};

/// Amount of unsaved tracked seconds after which the aggregate is written out.
pub const DEFAULT_FLUSH_THRESHOLD: u64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was pending, the store wasn't touched.
    Skipped,
    Flushed,
    /// The store refused the write. Pending time is kept for the next attempt.
    Failed,
}

/// Keeps track of time that was counted but isn't in the store yet and decides when to write the
/// current aggregate out. Writes are full replacements of the day record, so repeating one is
/// harmless and pending time is only forgotten once a write is confirmed.
pub struct PersistenceGate {
    store: Arc<dyn AggregateStore>,
    pending: HashMap<String, u64>,
    threshold: u64,
    /// Aggregates of previous days whose final write failed.
    unsaved_days: Vec<DailyAggregate>,
}

impl PersistenceGate {
    pub fn new(store: Arc<dyn AggregateStore>, threshold: u64) -> Self {
        Self {
            store,
            pending: HashMap::new(),
            threshold,
            unsaved_days: vec![],
        }
    }

    pub fn record(&mut self, app_name: &str, seconds: u64) {
        *self.pending.entry(app_name.to_string()).or_default() += seconds;
    }

    pub fn pending_seconds(&self) -> u64 {
        self.pending.values().sum()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn unsaved_days(&self) -> usize {
        self.unsaved_days.len()
    }

    /// Flushes once enough time has piled up.
    pub async fn flush_if_needed(&mut self, aggregate: &DailyAggregate) -> FlushOutcome {
        if self.pending_seconds() >= self.threshold {
            self.flush(aggregate).await
        } else {
            FlushOutcome::Skipped
        }
    }

    /// Writes `aggregate` out if anything is pending for it.
    #[instrument(skip_all, fields(day = %aggregate.day))]
    pub async fn flush(&mut self, aggregate: &DailyAggregate) -> FlushOutcome {
        self.retry_unsaved_days().await;
        if self.pending.is_empty() {
            return FlushOutcome::Skipped;
        }

        match self.store.upsert(aggregate).await {
            Ok(()) => {
                info!(
                    "Saved {} with {}s pending",
                    aggregate.day,
                    self.pending_seconds()
                );
                self.pending.clear();
                FlushOutcome::Flushed
            }
            Err(e) => {
                error!(
                    "Failed to save {}, keeping {}s pending {e}",
                    aggregate.day,
                    self.pending_seconds()
                );
                FlushOutcome::Failed
            }
        }
    }

    /// Final write of a day that is being replaced by a new one. Pending time belongs to the old
    /// day, so it is settled here no matter what. A failed write keeps the old aggregate around and
    /// retries it with every following flush.
    pub async fn retire(&mut self, aggregate: DailyAggregate) -> FlushOutcome {
        if self.pending.is_empty() {
            return FlushOutcome::Skipped;
        }
        let outcome = self.flush(&aggregate).await;
        if outcome == FlushOutcome::Failed {
            warn!("Keeping {} aside until it can be saved", aggregate.day);
            self.pending.clear();
            self.unsaved_days.retain(|v| v.day != aggregate.day);
            self.unsaved_days.push(aggregate);
        }
        outcome
    }

    /// Forgets everything that wasn't saved. Used when all data is being cleared.
    pub fn discard(&mut self) {
        self.pending.clear();
        self.unsaved_days.clear();
    }

    async fn retry_unsaved_days(&mut self) {
        if self.unsaved_days.is_empty() {
            return;
        }
        let mut still_unsaved = vec![];
        for aggregate in std::mem::take(&mut self.unsaved_days) {
            match self.store.upsert(&aggregate).await {
                Ok(()) => info!("Saved previously failed {}", aggregate.day),
                Err(e) => {
                    debug!("{} still can't be saved {e}", aggregate.day);
                    still_unsaved.push(aggregate);
                }
            }
        }
        self.unsaved_days = still_unsaved;
    }
}
