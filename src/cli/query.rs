use crate::alarm::event::Stage;
use crate::cli::run::{open_storage, require_config_path};
use crate::config::parse::load_config;
use crate::storage::traits::{EventFilter, RunStatistics, Storage, StoredEvent, Table};
use std::path::PathBuf;

pub async fn query(
    config_path: Option<PathBuf>,
    filter: EventFilter,
    limit: usize,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&require_config_path(config_path))?;
    let storage = open_storage(&config).await?;

    let events = storage.query_events(&filter, limit).await?;
    if json {
        for stored in &events {
            println!("{}", serde_json::to_string(stored)?);
        }
        return Ok(());
    }
    if events.is_empty() {
        println!("No events match");
        return Ok(());
    }

    for stored in &events {
        println!("{}", format_event(stored));
    }
    println!("{} event(s)", events.len());
    Ok(())
}

pub async fn history(
    config_path: Option<PathBuf>,
    limit: usize,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&require_config_path(config_path))?;
    let storage = open_storage(&config).await?;

    let runs = storage.list_statistics(limit).await?;
    if json {
        for stats in &runs {
            println!("{}", serde_json::to_string(stats)?);
        }
        return Ok(());
    }
    if runs.is_empty() {
        println!("No runs recorded");
        return Ok(());
    }

    for stats in &runs {
        println!("{}", format_run(stats));
    }
    Ok(())
}

pub async fn clear(config_path: Option<PathBuf>, table: Table) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&require_config_path(config_path))?;
    let storage = open_storage(&config).await?;

    let removed = storage.clear(table).await?;
    println!("Removed {} row(s) from {}", removed, table.name());
    Ok(())
}

fn format_event(stored: &StoredEvent) -> String {
    let event = &stored.event;
    let time = event
        .event_time
        .map(|t| t.format("%Y-%m-%d %H:%M:%S%.3f").to_string())
        .unwrap_or_else(|| format!("({})", event.raw_timestamp));
    format!(
        "{:<25} {:<3} [{}] {:<12} {}",
        time,
        event.stage.code(),
        event.device_id,
        event.alarm_code,
        event.source_file
    )
}

fn format_run(stats: &RunStatistics) -> String {
    let period = match stats.period_days {
        Some(days) => format!("{} days", days),
        None => "no period".to_string(),
    };
    format!(
        "{} {} {:<8} files={} events={} written={} {}={} {}={} {}={} devices={} alarms={} {} {}ms",
        stats.executed_at.format("%Y-%m-%d %H:%M:%S"),
        stats.run_id,
        stats.status.as_str(),
        stats.total_files,
        stats.total_events,
        stats.events_written,
        Stage::Confirmed.code(),
        stats.confirmed_count,
        Stage::Acknowledged.code(),
        stats.acknowledged_count,
        Stage::Resolved.code(),
        stats.resolved_count,
        stats.distinct_devices,
        stats.distinct_alarms,
        period,
        stats.duration_ms
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::event::AlarmEvent;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn test_format_event_without_time_shows_raw_timestamp() {
        let stored = StoredEvent {
            event_id: Uuid::new_v4(),
            run_id: Uuid::new_v4(),
            ingested_at: Utc::now(),
            event: AlarmEvent {
                source_file: "a.log".to_string(),
                raw_timestamp: "2025-19-45 07:12:33,4".to_string(),
                event_time: None,
                device_id: "PC510A00".to_string(),
                alarm_code: "FMDOS01".to_string(),
                stage: Stage::Confirmed,
                raw_line: String::new(),
            },
        };
        let line = format_event(&stored);
        assert!(line.contains("(2025-19-45 07:12:33,4)"));
        assert!(line.contains("CFN"));
        assert!(line.contains("[PC510A00]"));
    }

    #[test]
    fn test_stored_event_json_is_flat() {
        let run_id = Uuid::new_v4();
        let stored = StoredEvent {
            event_id: Uuid::new_v4(),
            run_id,
            ingested_at: Utc::now(),
            event: AlarmEvent {
                source_file: "a.log".to_string(),
                raw_timestamp: "2025-10-05 07:12:33,4".to_string(),
                event_time: crate::source::timestamp::parse_event_time("2025-10-05 07:12:33,4").ok(),
                device_id: "PC510A00".to_string(),
                alarm_code: "FMDOS01".to_string(),
                stage: Stage::Acknowledged,
                raw_line: "line".to_string(),
            },
        };
        let value = serde_json::to_value(&stored).unwrap();
        assert_eq!(value["run_id"], run_id.to_string());
        assert_eq!(value["stage"], "ACKNOWLEDGED");
        assert_eq!(value["device_id"], "PC510A00");
        assert!(value["event_time"]
            .as_str()
            .unwrap()
            .starts_with("2025-10-05T07:12:33"));
        assert!(value.get("event").is_none());
    }

    #[test]
    fn test_run_statistics_json_status_is_lowercase() {
        use crate::sequencer::merge::EventSummary;
        use crate::storage::traits::RunStatus;

        let stats = RunStatistics::from_summary(
            Uuid::new_v4(),
            &EventSummary::default(),
            7,
            0,
            RunStatus::Partial,
        );
        let value = serde_json::to_value(&stats).unwrap();
        assert_eq!(value["status"], "partial");
        assert_eq!(value["period_days"], serde_json::Value::Null);
        assert!(value["events_by_file"].as_object().unwrap().is_empty());
    }
}
