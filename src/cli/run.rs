use crate::config::parse::{load_config, ConfigError};
use crate::config::types::Config;
use crate::pipeline::{Pipeline, PipelineError, RunReport};
use crate::storage::duckdb::DuckDbStorage;
use crate::storage::traits::{Storage, StorageError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::signal;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("failed to create storage directory {path}: {source}")]
    StorageDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("run interrupted")]
    Interrupted,
}

/// Exit with the searched locations when no config file was found.
pub(crate) fn require_config_path(config_path: Option<PathBuf>) -> PathBuf {
    match config_path {
        Some(path) => path,
        None => {
            eprintln!("Error: config not found");
            eprintln!("Searched locations:");
            eprintln!("  ~/.config/alarmetl/config.yml");
            eprintln!("  /etc/alarmetl/config.yml");
            eprintln!("\nUse --config <path> to specify a config file, or run 'alarmetl config init' to generate one.");
            std::process::exit(1);
        }
    }
}

/// Open the configured database, creating its directory and schema if needed.
pub(crate) async fn open_storage(config: &Config) -> Result<Arc<DuckDbStorage>, RunError> {
    let path = &config.storage.path;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| RunError::StorageDirectory {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    info!(path = %path.display(), "Initializing storage");
    let storage = Arc::new(DuckDbStorage::new(path)?);
    storage.init_schema().await?;
    Ok(storage)
}

pub async fn run(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = require_config_path(config_path);
    let report = run_pipeline(&config_path).await?;
    print_report(&report);
    Ok(())
}

async fn run_pipeline(config_path: &Path) -> Result<RunReport, RunError> {
    info!(config_path = %config_path.display(), "Loading configuration");
    let config = load_config(config_path)?;

    let storage = open_storage(&config).await?;
    let pipeline = Pipeline::from_config(&config, storage)?;

    // The pipeline has no cancellation of its own; Ctrl+C abandons the run
    tokio::select! {
        result = pipeline.run() => Ok(result?),
        _ = signal::ctrl_c() => {
            warn!("Shutdown signal received, abandoning run");
            Err(RunError::Interrupted)
        }
    }
}

fn print_report(report: &RunReport) {
    let summary = &report.summary;
    println!("Run {} ({})", report.run_id, report.status);
    println!(
        "  files:    {} read, {} lines",
        report.read.total_files, report.read.total_lines
    );
    println!(
        "  events:   {} parsed, {} written",
        summary.total_events, report.events_written
    );
    for (stage, count) in &summary.by_stage {
        println!("    {:<13} {}", stage.name(), count);
    }
    println!(
        "  devices:  {}, alarm codes: {}",
        summary.distinct_devices, summary.distinct_alarms
    );
    match (summary.period_start, summary.period_end, summary.period_days()) {
        (Some(start), Some(end), Some(days)) => {
            println!("  period:   {} .. {} ({} days)", start, end, days)
        }
        _ => println!("  period:   unknown"),
    }
    match report.mean_time_to_acknowledge {
        Some(mean) => println!(
            "  alarms:   {} instances, mean time to acknowledge {}s",
            report.lifecycles,
            mean.num_seconds()
        ),
        None => println!("  alarms:   {} instances", report.lifecycles),
    }
    println!("  duration: {} ms", report.duration.as_millis());
}
