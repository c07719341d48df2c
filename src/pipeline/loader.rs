use crate::alarm::event::AlarmEvent;
use crate::storage::traits::{RunStatistics, Storage, StorageError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Errors reported by the batch loader
#[derive(Debug, Error)]
pub enum LoadError {
    /// Earlier batches stay committed; `written` counts them
    #[error("batch write failed after {written} of {total} events were persisted: {source}")]
    PartialWrite {
        written: usize,
        total: usize,
        batches_written: usize,
        #[source]
        source: StorageError,
    },

    /// Every event of the run was written; only its statistics row is missing
    #[error("run statistics could not be persisted after {events_written} events were written: {source}")]
    StatisticsWriteFailed {
        events_written: usize,
        #[source]
        source: StorageError,
    },
}

impl LoadError {
    /// Events persisted by the run when the error was raised.
    pub fn events_written(&self) -> usize {
        match self {
            LoadError::PartialWrite { written, .. } => *written,
            LoadError::StatisticsWriteFailed { events_written, .. } => *events_written,
        }
    }
}

/// Outcome of a successful event load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub events_written: usize,
    pub batches_written: usize,
}

impl LoadReport {
    /// True when there was nothing to write.
    pub fn is_noop(&self) -> bool {
        self.batches_written == 0
    }
}

/// Writes event collections to storage in fixed-size batches, in order.
pub struct BatchLoader {
    storage: Arc<dyn Storage>,
    batch_size: usize,
}

impl BatchLoader {
    pub fn new(storage: Arc<dyn Storage>, batch_size: usize) -> Self {
        Self {
            storage,
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Append `events` as `ceil(len / batch_size)` sequential batch writes.
    ///
    /// Stops at the first failed batch; batches already committed remain.
    pub async fn load_events(&self, events: &[AlarmEvent], run_id: Uuid) -> Result<LoadReport, LoadError> {
        if events.is_empty() {
            info!("No events to load");
            return Ok(LoadReport::default());
        }

        let total = events.len();
        let mut report = LoadReport::default();

        for (index, batch) in events.chunks(self.batch_size).enumerate() {
            match self.storage.append_batch(batch, run_id).await {
                Ok(written) => {
                    report.events_written += written;
                    report.batches_written += 1;
                    debug!(
                        batch = index,
                        size = batch.len(),
                        written = report.events_written,
                        total,
                        "Batch committed"
                    );
                }
                Err(e) => {
                    error!(
                        batch = index,
                        written = report.events_written,
                        total,
                        error = %e,
                        "Batch write failed"
                    );
                    return Err(LoadError::PartialWrite {
                        written: report.events_written,
                        total,
                        batches_written: report.batches_written,
                        source: e,
                    });
                }
            }
        }

        info!(
            events = report.events_written,
            batches = report.batches_written,
            "Events loaded"
        );
        Ok(report)
    }

    /// Persist the run's single statistics row.
    pub async fn record_statistics(&self, stats: &RunStatistics) -> Result<(), LoadError> {
        self.storage.insert_statistics(stats).await.map_err(|e| {
            error!(run_id = %stats.run_id, error = %e, "Statistics write failed");
            LoadError::StatisticsWriteFailed {
                events_written: stats.events_written,
                source: e,
            }
        })?;
        info!(run_id = %stats.run_id, status = %stats.status, "Run statistics recorded");
        Ok(())
    }
}
