use crate::alarm::event::{AlarmEvent, Stage};
use crate::sequencer::merge::EventSummary;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Persistence backend for alarm events and run statistics.
///
/// Event storage is append-only; rows are removed only through `clear`.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn init_schema(&self) -> Result<(), StorageError>;

    /// Append one batch atomically. Returns the number of rows written.
    async fn append_batch(&self, events: &[AlarmEvent], run_id: Uuid) -> Result<usize, StorageError>;

    async fn insert_statistics(&self, stats: &RunStatistics) -> Result<(), StorageError>;

    /// Filtered read, newest `event_time` first, events without a time last.
    async fn query_events(
        &self,
        filter: &EventFilter,
        limit: usize,
    ) -> Result<Vec<StoredEvent>, StorageError>;

    async fn count_events(&self) -> Result<usize, StorageError>;

    /// Run statistics, most recent run first.
    async fn list_statistics(&self, limit: usize) -> Result<Vec<RunStatistics>, StorageError>;

    /// Delete every row of one table. Returns the number of rows removed.
    async fn clear(&self, table: Table) -> Result<usize, StorageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage connection lock poisoned")]
    LockPoisoned,
}

/// An event as persisted, with its storage metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredEvent {
    pub event_id: Uuid,
    pub run_id: Uuid,
    pub ingested_at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: AlarmEvent,
}

/// Fixed-shape event filter; `None` fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventFilter {
    pub stage: Option<Stage>,
    pub device_id: Option<String>,
    pub alarm_code: Option<String>,
    pub source_file: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Events,
    Statistics,
}

impl Table {
    pub fn name(&self) -> &'static str {
        match self {
            Table::Events => "alarm_events",
            Table::Statistics => "run_statistics",
        }
    }
}

impl FromStr for Table {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "events" | "alarm_events" => Ok(Table::Events),
            "statistics" | "stats" | "run_statistics" => Ok(Table::Statistics),
            other => Err(format!(
                "unknown table '{}' (expected 'events' or 'statistics')",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Every event and the statistics were written
    Success,
    /// Some batches were committed before a batch failed
    Partial,
    /// Events existed but none could be written
    Failure,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::Partial => "partial",
            RunStatus::Failure => "failure",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(RunStatus::Success),
            "partial" => Ok(RunStatus::Partial),
            "failure" => Ok(RunStatus::Failure),
            other => Err(format!("unknown run status '{}'", other)),
        }
    }
}

/// One row per pipeline run. Never updated after insertion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunStatistics {
    pub run_id: Uuid,
    pub executed_at: DateTime<Utc>,
    pub total_files: usize,
    pub total_events: usize,
    pub confirmed_count: usize,
    pub acknowledged_count: usize,
    pub resolved_count: usize,
    pub distinct_devices: usize,
    pub distinct_alarms: usize,
    pub period_start: Option<NaiveDateTime>,
    pub period_end: Option<NaiveDateTime>,
    pub period_days: Option<i64>,
    pub duration_ms: u64,
    pub events_written: usize,
    pub status: RunStatus,
    pub events_by_file: BTreeMap<String, usize>,
}

impl RunStatistics {
    pub fn from_summary(
        run_id: Uuid,
        summary: &EventSummary,
        duration_ms: u64,
        events_written: usize,
        status: RunStatus,
    ) -> Self {
        Self {
            run_id,
            executed_at: Utc::now(),
            total_files: summary.total_files,
            total_events: summary.total_events,
            confirmed_count: summary.count(Stage::Confirmed),
            acknowledged_count: summary.count(Stage::Acknowledged),
            resolved_count: summary.count(Stage::Resolved),
            distinct_devices: summary.distinct_devices,
            distinct_alarms: summary.distinct_alarms,
            period_start: summary.period_start,
            period_end: summary.period_end,
            period_days: summary.period_days(),
            duration_ms,
            events_written,
            status,
            events_by_file: summary.by_file.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_from_str() {
        assert_eq!("events".parse::<Table>().unwrap(), Table::Events);
        assert_eq!("Statistics".parse::<Table>().unwrap(), Table::Statistics);
        assert!("alarms".parse::<Table>().is_err());
    }

    #[test]
    fn test_statistics_from_empty_summary() {
        let stats = RunStatistics::from_summary(
            Uuid::new_v4(),
            &EventSummary::default(),
            12,
            0,
            RunStatus::Success,
        );
        assert_eq!(stats.total_events, 0);
        assert_eq!(stats.period_days, None);
        assert!(stats.events_by_file.is_empty());
        assert_eq!(stats.status.to_string(), "success");
    }
}
