// 📬 Analytics Outbox
// In-memory FIFO of computed analytics waiting for an explicit batch save.
// Nothing here is durable: a restart drops whatever is pending.

use crate::db::TransactionStore;
use crate::error::AppError;
use crate::models::MonthlyAnalytics;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use tracing::{info, warn};

/// At most one pending entry per (user, month); a newer computation
/// replaces the queued one in place.
#[derive(Debug, Default)]
pub struct AnalyticsOutbox {
    pending: Mutex<VecDeque<MonthlyAnalytics>>,
    // held for the whole of a flush so a second save waits for the first
    flushing: Mutex<()>,
}

/// A flush that stopped at the first failing write
#[derive(Debug)]
pub struct FlushError {
    pub saved: usize,
    pub requeued: usize,
    pub source: AppError,
}

impl AnalyticsOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    // A poisoned lock only means another request panicked mid-push;
    // the queue itself is still consistent.
    fn queue(&self) -> MutexGuard<'_, VecDeque<MonthlyAnalytics>> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn push(&self, analytics: MonthlyAnalytics) {
        let mut queue = self.queue();
        match queue.iter_mut().find(|pending| same_bucket(pending, &analytics)) {
            Some(pending) => *pending = analytics,
            None => queue.push_back(analytics),
        }
    }

    pub fn len(&self) -> usize {
        self.queue().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue().is_empty()
    }

    /// Copy of the pending entries, oldest first
    pub fn snapshot(&self) -> Vec<MonthlyAnalytics> {
        self.queue().iter().cloned().collect()
    }

    /// Persist every pending entry in order.
    ///
    /// Entries are taken out under the lock and written without holding it,
    /// so requests can keep appending during a flush. Only persisted entries
    /// are dropped: on failure the failed entry and everything after it go
    /// back to the front of the queue, ahead of anything appended meanwhile,
    /// unless a newer entry for the same bucket arrived in the meantime.
    /// Concurrent flushes run one after another.
    pub fn flush(&self, store: &dyn TransactionStore) -> Result<usize, FlushError> {
        let _flushing = self.flushing.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let batch: Vec<MonthlyAnalytics> = self.queue().drain(..).collect();
        let total = batch.len();

        for (index, analytics) in batch.iter().enumerate() {
            if let Err(source) = store.save_analysis(analytics) {
                let unsaved = &batch[index..];
                {
                    let mut queue = self.queue();
                    for entry in unsaved.iter().rev() {
                        if !queue.iter().any(|pending| same_bucket(pending, entry)) {
                            queue.push_front(entry.clone());
                        }
                    }
                }

                warn!(
                    saved = index,
                    requeued = unsaved.len(),
                    error = %source,
                    "analytics flush stopped"
                );

                return Err(FlushError {
                    saved: index,
                    requeued: unsaved.len(),
                    source,
                });
            }
        }

        if total > 0 {
            info!(saved = total, "analytics flushed");
        }
        Ok(total)
    }
}

fn same_bucket(a: &MonthlyAnalytics, b: &MonthlyAnalytics) -> bool {
    a.user_id == b.user_id && a.month == b.month
}
