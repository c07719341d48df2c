use super::traits::{
    EventFilter, RunStatistics, RunStatus, Storage, StorageError, StoredEvent, Table,
};
use crate::alarm::event::{AlarmEvent, Stage};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use duckdb::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Check if a process with the given PID is still running
fn is_process_running(pid: u32) -> bool {
    #[cfg(unix)]
    {
        use std::process::Command;
        Command::new("ps")
            .arg("-p")
            .arg(pid.to_string())
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }
    #[cfg(not(unix))]
    {
        // Without a way to check, treat the holder as alive
        let _ = pid;
        true
    }
}

/// Extract PID from DuckDB lock error message, e.g. "... (PID 12345) ..."
fn extract_pid_from_lock_error(error_msg: &str) -> Option<u32> {
    let start = error_msg.find("(PID ")? + "(PID ".len();
    let end = error_msg[start..].find(')')?;
    error_msg[start..start + end].trim().parse().ok()
}

/// Remove DuckDB WAL and lock files left by a dead process
fn remove_lock_files(db_path: &Path) -> std::io::Result<()> {
    for suffix in ["wal", "lock"] {
        let stale = PathBuf::from(format!("{}.{}", db_path.display(), suffix));
        if stale.exists() {
            std::fs::remove_file(&stale)?;
            tracing::info!(path = %stale.display(), "Removed stale database file");
        }
    }
    Ok(())
}

fn conversion_error<E>(idx: usize, ty: duckdb::types::Type, err: E) -> duckdb::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    duckdb::Error::FromSqlConversionFailure(idx, ty, Box::new(err))
}

fn invalid_timestamp(idx: usize) -> duckdb::Error {
    conversion_error(
        idx,
        duckdb::types::Type::BigInt,
        std::io::Error::new(std::io::ErrorKind::InvalidData, "invalid timestamp"),
    )
}

fn utc_from_micros(idx: usize, micros: i64) -> Result<DateTime<Utc>, duckdb::Error> {
    DateTime::from_timestamp_micros(micros).ok_or_else(|| invalid_timestamp(idx))
}

fn naive_from_micros(idx: usize, micros: Option<i64>) -> Result<Option<NaiveDateTime>, duckdb::Error> {
    micros
        .map(|us| utc_from_micros(idx, us).map(|dt| dt.naive_utc()))
        .transpose()
}

fn uuid_from_column(idx: usize, value: String) -> Result<Uuid, duckdb::Error> {
    Uuid::parse_str(&value).map_err(|e| conversion_error(idx, duckdb::types::Type::Text, e))
}

/// Wall-clock plant times are stored as `TIMESTAMP` without a zone.
fn naive_to_sql(time: &NaiveDateTime) -> String {
    time.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

fn count_to_usize(value: i64) -> usize {
    usize::try_from(value).unwrap_or(0)
}

/// DuckDB implementation of the Storage trait
pub struct DuckDbStorage {
    conn: Arc<Mutex<Connection>>,
}

impl DuckDbStorage {
    /// Open (or create) the database file, recovering from a stale lock
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref();

        let e = match Connection::open(path) {
            Ok(conn) => {
                return Ok(Self {
                    conn: Arc::new(Mutex::new(conn)),
                })
            }
            Err(e) => e,
        };

        let error_msg = e.to_string();
        if !error_msg.contains("Could not set lock") {
            return Err(e.into());
        }

        tracing::warn!(error = %error_msg, "Database lock detected");
        let Some(pid) = extract_pid_from_lock_error(&error_msg) else {
            return Err(e.into());
        };

        if is_process_running(pid) {
            tracing::error!(pid, "Lock holder is still running, cannot acquire lock");
            return Err(e.into());
        }

        tracing::warn!(pid, "Lock holder is not running, removing stale lock files");
        if let Err(io_err) = remove_lock_files(path) {
            tracing::error!(error = %io_err, "Failed to remove lock files");
            return Err(e.into());
        }

        tracing::info!("Retrying database connection after removing stale locks");
        let conn = Connection::open(path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory DuckDB storage instance (for testing)
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

fn row_to_stored_event(row: &duckdb::Row<'_>) -> Result<StoredEvent, duckdb::Error> {
    let stage_code: String = row.get(8)?;
    let stage = stage_code
        .parse::<Stage>()
        .map_err(|e| conversion_error(8, duckdb::types::Type::Text, e))?;

    Ok(StoredEvent {
        event_id: uuid_from_column(0, row.get(0)?)?,
        run_id: uuid_from_column(1, row.get(1)?)?,
        ingested_at: utc_from_micros(2, row.get(2)?)?,
        event: AlarmEvent {
            source_file: row.get(3)?,
            raw_timestamp: row.get(4)?,
            event_time: naive_from_micros(5, row.get(5)?)?,
            device_id: row.get(6)?,
            alarm_code: row.get(7)?,
            stage,
            raw_line: row.get(9)?,
        },
    })
}

fn row_to_statistics(row: &duckdb::Row<'_>) -> Result<RunStatistics, duckdb::Error> {
    let status: String = row.get(14)?;
    let status = status.parse::<RunStatus>().map_err(|e| {
        conversion_error(
            14,
            duckdb::types::Type::Text,
            std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        )
    })?;
    let events_by_file: String = row.get(15)?;
    let events_by_file = serde_json::from_str(&events_by_file)
        .map_err(|e| conversion_error(15, duckdb::types::Type::Text, e))?;

    Ok(RunStatistics {
        run_id: uuid_from_column(0, row.get(0)?)?,
        executed_at: utc_from_micros(1, row.get(1)?)?,
        total_files: count_to_usize(row.get(2)?),
        total_events: count_to_usize(row.get(3)?),
        confirmed_count: count_to_usize(row.get(4)?),
        acknowledged_count: count_to_usize(row.get(5)?),
        resolved_count: count_to_usize(row.get(6)?),
        distinct_devices: count_to_usize(row.get(7)?),
        distinct_alarms: count_to_usize(row.get(8)?),
        period_start: naive_from_micros(9, row.get(9)?)?,
        period_end: naive_from_micros(10, row.get(10)?)?,
        period_days: row.get(11)?,
        duration_ms: u64::try_from(row.get::<_, i64>(12)?).unwrap_or(0),
        events_written: count_to_usize(row.get(13)?),
        status,
        events_by_file,
    })
}

#[async_trait]
impl Storage for DuckDbStorage {
    async fn init_schema(&self) -> Result<(), StorageError> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|_| StorageError::LockPoisoned)?;

            conn.execute(
                "CREATE SEQUENCE IF NOT EXISTS alarm_events_seq START 1",
                [],
            )?;

            conn.execute(
                "CREATE TABLE IF NOT EXISTS alarm_events (
                    event_id UUID PRIMARY KEY,
                    seq BIGINT NOT NULL DEFAULT nextval('alarm_events_seq'),
                    run_id UUID NOT NULL,
                    source_file VARCHAR NOT NULL,
                    raw_timestamp VARCHAR NOT NULL,
                    event_time TIMESTAMP,
                    device_id VARCHAR NOT NULL,
                    alarm_code VARCHAR NOT NULL,
                    stage VARCHAR NOT NULL,
                    raw_line VARCHAR NOT NULL,
                    ingested_at TIMESTAMPTZ NOT NULL
                )",
                [],
            )?;

            conn.execute(
                "CREATE INDEX IF NOT EXISTS idx_events_device_alarm ON alarm_events(device_id, alarm_code)",
                [],
            )?;

            conn.execute(
                "CREATE INDEX IF NOT EXISTS idx_events_stage_time ON alarm_events(stage, event_time)",
                [],
            )?;

            conn.execute(
                "CREATE INDEX IF NOT EXISTS idx_events_file_time ON alarm_events(source_file, event_time)",
                [],
            )?;

            conn.execute(
                "CREATE TABLE IF NOT EXISTS run_statistics (
                    run_id UUID PRIMARY KEY,
                    executed_at TIMESTAMPTZ NOT NULL,
                    total_files BIGINT NOT NULL,
                    total_events BIGINT NOT NULL,
                    confirmed_count BIGINT NOT NULL,
                    acknowledged_count BIGINT NOT NULL,
                    resolved_count BIGINT NOT NULL,
                    distinct_devices BIGINT NOT NULL,
                    distinct_alarms BIGINT NOT NULL,
                    period_start TIMESTAMP,
                    period_end TIMESTAMP,
                    period_days BIGINT,
                    duration_ms BIGINT NOT NULL,
                    events_written BIGINT NOT NULL,
                    status VARCHAR NOT NULL,
                    events_by_file VARCHAR NOT NULL
                )",
                [],
            )?;

            Ok::<(), StorageError>(())
        })
        .await
        .map_err(|e| StorageError::Database(format!("Task join error: {}", e)))?
    }

    async fn append_batch(&self, events: &[AlarmEvent], run_id: Uuid) -> Result<usize, StorageError> {
        if events.is_empty() {
            return Ok(0);
        }

        let conn = self.conn.clone();
        let events = events.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|_| StorageError::LockPoisoned)?;
            let ingested_at = Utc::now().timestamp_micros();
            let run_id = run_id.to_string();

            // Dropping the transaction without commit rolls the batch back
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO alarm_events (event_id, run_id, source_file, raw_timestamp, event_time, device_id, alarm_code, stage, raw_line, ingested_at)
                     VALUES (?, ?, ?, ?, CAST(? AS TIMESTAMP), ?, ?, ?, ?, to_timestamp(? / 1000000.0))",
                )?;

                for event in &events {
                    stmt.execute(duckdb::params![
                        Uuid::new_v4().to_string(),
                        run_id,
                        event.source_file,
                        event.raw_timestamp,
                        event.event_time.as_ref().map(naive_to_sql),
                        event.device_id,
                        event.alarm_code,
                        event.stage.code(),
                        event.raw_line,
                        ingested_at,
                    ])?;
                }
            }
            tx.commit()?;

            Ok::<usize, StorageError>(events.len())
        })
        .await
        .map_err(|e| StorageError::Database(format!("Task join error: {}", e)))?
    }

    async fn insert_statistics(&self, stats: &RunStatistics) -> Result<(), StorageError> {
        let conn = self.conn.clone();
        let stats = stats.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|_| StorageError::LockPoisoned)?;
            let events_by_file = serde_json::to_string(&stats.events_by_file)?;

            conn.execute(
                "INSERT INTO run_statistics (run_id, executed_at, total_files, total_events, confirmed_count, acknowledged_count, resolved_count, distinct_devices, distinct_alarms, period_start, period_end, period_days, duration_ms, events_written, status, events_by_file)
                 VALUES (?, to_timestamp(? / 1000000.0), ?, ?, ?, ?, ?, ?, ?, CAST(? AS TIMESTAMP), CAST(? AS TIMESTAMP), ?, ?, ?, ?, ?)",
                duckdb::params![
                    stats.run_id.to_string(),
                    stats.executed_at.timestamp_micros(),
                    stats.total_files as i64,
                    stats.total_events as i64,
                    stats.confirmed_count as i64,
                    stats.acknowledged_count as i64,
                    stats.resolved_count as i64,
                    stats.distinct_devices as i64,
                    stats.distinct_alarms as i64,
                    stats.period_start.as_ref().map(naive_to_sql),
                    stats.period_end.as_ref().map(naive_to_sql),
                    stats.period_days,
                    stats.duration_ms as i64,
                    stats.events_written as i64,
                    stats.status.as_str(),
                    events_by_file,
                ],
            )?;

            Ok::<(), StorageError>(())
        })
        .await
        .map_err(|e| StorageError::Database(format!("Task join error: {}", e)))?
    }

    async fn query_events(
        &self,
        filter: &EventFilter,
        limit: usize,
    ) -> Result<Vec<StoredEvent>, StorageError> {
        let conn = self.conn.clone();

        let mut clauses = Vec::new();
        let mut params: Vec<String> = Vec::new();
        let columns = [
            ("stage", filter.stage.map(|s| s.code().to_string())),
            ("device_id", filter.device_id.clone()),
            ("alarm_code", filter.alarm_code.clone()),
            ("source_file", filter.source_file.clone()),
        ];
        for (column, value) in columns {
            if let Some(value) = value {
                clauses.push(format!("{} = ?", column));
                params.push(value);
            }
        }
        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        let sql = format!(
            "SELECT event_id, run_id, epoch_us(ingested_at), source_file, raw_timestamp, epoch_us(event_time), device_id, alarm_code, stage, raw_line
             FROM alarm_events
             {}
             ORDER BY event_time DESC NULLS LAST, seq
             LIMIT {}",
            where_clause, limit
        );

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|_| StorageError::LockPoisoned)?;
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(duckdb::params_from_iter(params.iter()), row_to_stored_event)?;

            let mut events = Vec::new();
            for row in rows {
                events.push(row?);
            }
            Ok(events)
        })
        .await
        .map_err(|e| StorageError::Database(format!("Task join error: {}", e)))?
    }

    async fn count_events(&self) -> Result<usize, StorageError> {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|_| StorageError::LockPoisoned)?;
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM alarm_events", [], |row| row.get(0))?;
            Ok(count_to_usize(count))
        })
        .await
        .map_err(|e| StorageError::Database(format!("Task join error: {}", e)))?
    }

    async fn list_statistics(&self, limit: usize) -> Result<Vec<RunStatistics>, StorageError> {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|_| StorageError::LockPoisoned)?;
            let mut stmt = conn.prepare(
                "SELECT run_id, epoch_us(executed_at), total_files, total_events, confirmed_count, acknowledged_count, resolved_count, distinct_devices, distinct_alarms, epoch_us(period_start), epoch_us(period_end), period_days, duration_ms, events_written, status, CAST(events_by_file AS VARCHAR)
                 FROM run_statistics
                 ORDER BY executed_at DESC
                 LIMIT ?",
            )?;

            let rows = stmt.query_map(duckdb::params![limit as i64], row_to_statistics)?;

            let mut stats = Vec::new();
            for row in rows {
                stats.push(row?);
            }
            Ok(stats)
        })
        .await
        .map_err(|e| StorageError::Database(format!("Task join error: {}", e)))?
    }

    async fn clear(&self, table: Table) -> Result<usize, StorageError> {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|_| StorageError::LockPoisoned)?;
            let removed = conn.execute(&format!("DELETE FROM {}", table.name()), [])?;
            tracing::info!(table = table.name(), removed, "Cleared table");
            Ok::<usize, StorageError>(removed)
        })
        .await
        .map_err(|e| StorageError::Database(format!("Task join error: {}", e)))?
    }
}
