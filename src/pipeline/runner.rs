use crate::alarm::parser::{AlarmParser, ParsedFile};
use crate::alarm::rule::RuleError;
use crate::config::types::Config;
use crate::pipeline::loader::{BatchLoader, LoadError};
use crate::sequencer::group::group_sequences;
use crate::sequencer::lifecycle::{lifecycles, mean_time_to_acknowledge};
use crate::sequencer::merge::{consolidate, Consolidated, EventSummary};
use crate::source::encoding::DecodeError;
use crate::source::reader::{self, FileReader, ReadSummary};
use crate::storage::traits::{RunStatistics, RunStatus, Storage, StorageError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Errors that can end a pipeline run
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("encoding configuration error: {0}")]
    Decode(#[from] DecodeError),

    #[error("classification rule error: {0}")]
    Rule(#[from] RuleError),

    /// Carries the accounting needed to decide between retry and abort
    #[error("run {run_id} ended with status '{status}' ({events_written}/{total_events} events written, statistics recorded: {statistics_recorded}): {source}")]
    Load {
        run_id: Uuid,
        status: RunStatus,
        events_written: usize,
        total_events: usize,
        statistics_recorded: bool,
        #[source]
        source: LoadError,
    },
}

/// What a completed run did.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub read: ReadSummary,
    pub summary: EventSummary,
    pub lifecycles: usize,
    pub mean_time_to_acknowledge: Option<chrono::Duration>,
    pub events_written: usize,
    pub duration: Duration,
}

/// Reader → parser → consolidator → grouper → loader, one run at a time.
pub struct Pipeline {
    reader: FileReader,
    parser: AlarmParser,
    loader: BatchLoader,
}

impl Pipeline {
    pub fn new(reader: FileReader, parser: AlarmParser, loader: BatchLoader) -> Self {
        Self {
            reader,
            parser,
            loader,
        }
    }

    pub fn from_config(config: &Config, storage: Arc<dyn Storage>) -> Result<Self, PipelineError> {
        Ok(Self::new(
            FileReader::from_config(&config.source)?,
            AlarmParser::from_config(&config.parser)?,
            BatchLoader::new(storage, config.storage.batch_size),
        ))
    }

    /// Execute one full run and persist exactly one statistics row for it.
    pub async fn run(&self) -> Result<RunReport, PipelineError> {
        let started = Instant::now();
        let run_id = Uuid::new_v4();
        info!(
            %run_id,
            directory = %self.reader.directory().display(),
            "Pipeline run started"
        );

        let files = self.reader.read_all().await;
        let read = reader::summarize(&files);
        info!(
            files = read.total_files,
            lines = read.total_lines,
            encodings = ?read.encodings_used,
            "Files read"
        );

        let parsed: Vec<ParsedFile> = files.iter().map(|f| self.parser.parse_file(f)).collect();
        drop(files);

        let Consolidated { events, summary } = consolidate(parsed);

        let grouped = group_sequences(&events);
        let instances = lifecycles(&grouped);
        let mean_ack = mean_time_to_acknowledge(&instances);
        info!(
            instances = instances.len(),
            mean_time_to_ack_secs = ?mean_ack.map(|d| d.num_seconds()),
            "Alarm lifecycles"
        );

        let (status, events_written, load_error) = match self.loader.load_events(&events, run_id).await {
            Ok(report) => (RunStatus::Success, report.events_written, None),
            Err(e) => {
                let written = e.events_written();
                let status = if written > 0 {
                    RunStatus::Partial
                } else {
                    RunStatus::Failure
                };
                (status, written, Some(e))
            }
        };

        let duration = started.elapsed();
        let duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        let stats = RunStatistics::from_summary(run_id, &summary, duration_ms, events_written, status);
        let stats_result = self.loader.record_statistics(&stats).await;

        let total_events = summary.total_events;
        match (load_error, stats_result) {
            (None, Ok(())) => {
                info!(
                    %run_id,
                    events = events_written,
                    duration_ms,
                    "Pipeline run completed"
                );
                Ok(RunReport {
                    run_id,
                    status,
                    read,
                    summary,
                    lifecycles: instances.len(),
                    mean_time_to_acknowledge: mean_ack,
                    events_written,
                    duration,
                })
            }
            (Some(load_error), stats_result) => {
                if let Err(stats_error) = &stats_result {
                    warn!(error = %stats_error, "Statistics also failed after event load failure");
                }
                error!(%run_id, %status, events_written, total_events, "Pipeline run failed");
                Err(PipelineError::Load {
                    run_id,
                    status,
                    events_written,
                    total_events,
                    statistics_recorded: stats_result.is_ok(),
                    source: load_error,
                })
            }
            (None, Err(stats_error)) => {
                error!(%run_id, events_written, "Events loaded but statistics were not recorded");
                Err(PipelineError::Load {
                    run_id,
                    status,
                    events_written,
                    total_events,
                    statistics_recorded: false,
                    source: stats_error,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::rule::RuleSet;
    use crate::config::types::ParserConfig;
    use crate::pipeline::loader::tests::RecordingStorage;
    use crate::source::encoding::TextEncoding;
    use std::fs;
    use tempfile::TempDir;

    fn pipeline(dir: &TempDir, storage: Arc<RecordingStorage>, batch_size: usize) -> Pipeline {
        let config = ParserConfig::default();
        Pipeline::new(
            FileReader::new(dir.path().to_path_buf(), ".log", vec![TextEncoding::Utf8, TextEncoding::Latin1]),
            AlarmParser::new(config.markers.clone(), RuleSet::from_config(&config).unwrap()),
            BatchLoader::new(storage, batch_size),
        )
    }

    fn write_sample(dir: &TempDir) {
        fs::write(
            dir.path().join("a.log"),
            "2025-10-05 07:12:33,4 [PC510A00] FMDOS01 CFN ALARM Erro dosagem\n\
             IX_BATCHNR.A_CV = 1042\n\
             2025-10-05 07:14:01,0 [PC510A00] FMDOS01 ALARM is acknowledged by PC520A00::FORM ACK\n\
             2025-10-05 07:20:00,5 [PC510A00] FMDOS01 OK ALARM Erro dosagem\n",
        )
        .unwrap();
    }

    #[tokio::test]
    async fn test_successful_run_records_statistics() {
        let dir = TempDir::new().unwrap();
        write_sample(&dir);
        let storage = Arc::new(RecordingStorage::default());

        let report = pipeline(&dir, storage.clone(), 2).run().await.unwrap();
        assert_eq!(report.status, RunStatus::Success);
        assert_eq!(report.events_written, 3);
        assert_eq!(report.lifecycles, 1);
        assert_eq!(report.mean_time_to_acknowledge.map(|d| d.num_seconds()), Some(87));

        let stats = storage.statistics.lock().unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].run_id, report.run_id);
        assert_eq!(stats[0].confirmed_count, 1);
        assert_eq!(stats[0].acknowledged_count, 1);
        assert_eq!(stats[0].resolved_count, 1);
        assert_eq!(stats[0].period_days, Some(0));
    }

    #[tokio::test]
    async fn test_empty_directory_still_records_one_statistics_row() {
        let dir = TempDir::new().unwrap();
        let storage = Arc::new(RecordingStorage::default());

        let report = pipeline(&dir, storage.clone(), 10).run().await.unwrap();
        assert_eq!(report.summary.total_events, 0);
        assert!(storage.batches.lock().unwrap().is_empty());

        let stats = storage.statistics.lock().unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].period_days, None);
    }

    #[tokio::test]
    async fn test_partial_load_reports_counts_and_records_statistics() {
        let dir = TempDir::new().unwrap();
        write_sample(&dir);
        let storage = Arc::new(RecordingStorage {
            fail_on_batch: Some(1),
            ..Default::default()
        });

        let err = pipeline(&dir, storage.clone(), 2).run().await.unwrap_err();
        match err {
            PipelineError::Load {
                status,
                events_written,
                total_events,
                statistics_recorded,
                source,
                ..
            } => {
                assert_eq!(status, RunStatus::Partial);
                assert_eq!(events_written, 2);
                assert_eq!(total_events, 3);
                assert!(statistics_recorded);
                assert!(matches!(source, LoadError::PartialWrite { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }

        let stats = storage.statistics.lock().unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].status, RunStatus::Partial);
        assert_eq!(stats[0].events_written, 2);
    }

    #[tokio::test]
    async fn test_first_batch_failure_is_failure_status() {
        let dir = TempDir::new().unwrap();
        write_sample(&dir);
        let storage = Arc::new(RecordingStorage {
            fail_on_batch: Some(0),
            ..Default::default()
        });

        let err = pipeline(&dir, storage.clone(), 10).run().await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Load {
                status: RunStatus::Failure,
                events_written: 0,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_statistics_failure_after_successful_load() {
        let dir = TempDir::new().unwrap();
        write_sample(&dir);
        let storage = Arc::new(RecordingStorage {
            fail_statistics: true,
            ..Default::default()
        });

        let err = pipeline(&dir, storage.clone(), 10).run().await.unwrap_err();
        match err {
            PipelineError::Load {
                status,
                events_written,
                statistics_recorded,
                source,
                ..
            } => {
                assert_eq!(status, RunStatus::Success);
                assert_eq!(events_written, 3);
                assert!(!statistics_recorded);
                assert!(matches!(source, LoadError::StatisticsWriteFailed { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
