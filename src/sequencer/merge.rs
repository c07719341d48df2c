use crate::alarm::event::{AlarmEvent, Stage};
use crate::alarm::parser::ParsedFile;
use crate::source::timestamp::whole_days_between;
use chrono::NaiveDateTime;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use tracing::{info, warn};

/// Orders known times ascending; an absent time sorts after every known one.
pub fn compare_event_time(a: Option<&NaiveDateTime>, b: Option<&NaiveDateTime>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Statistics derived from a consolidated event collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventSummary {
    pub total_files: usize,
    pub total_events: usize,
    pub by_stage: BTreeMap<Stage, usize>,
    pub by_file: BTreeMap<String, usize>,
    pub distinct_devices: usize,
    pub distinct_alarms: usize,
    /// Earliest known `event_time`; events without a time are not considered
    pub period_start: Option<NaiveDateTime>,
    pub period_end: Option<NaiveDateTime>,
}

impl EventSummary {
    pub fn count(&self, stage: Stage) -> usize {
        self.by_stage.get(&stage).copied().unwrap_or(0)
    }

    /// Whole days covered, or `None` when no event has a known time.
    pub fn period_days(&self) -> Option<i64> {
        match (self.period_start, self.period_end) {
            (Some(start), Some(end)) => Some(whole_days_between(start, end)),
            _ => None,
        }
    }
}

/// Events from every file, ordered by time, with their summary.
#[derive(Debug, Clone, Default)]
pub struct Consolidated {
    pub events: Vec<AlarmEvent>,
    pub summary: EventSummary,
}

/// Merge per-file results in the order given and sort by `event_time`.
///
/// The sort is stable: events with equal times, and all events without a
/// time, keep their relative input order.
pub fn consolidate(files: Vec<ParsedFile>) -> Consolidated {
    let total_files = files.len();
    let files_with_events = files.iter().filter(|f| !f.events.is_empty()).count();

    let mut events: Vec<AlarmEvent> = files.into_iter().flat_map(|f| f.events).collect();
    events.sort_by(|a, b| compare_event_time(a.event_time.as_ref(), b.event_time.as_ref()));

    if events.is_empty() {
        warn!("No events were parsed");
    } else {
        info!(
            events = events.len(),
            files = files_with_events,
            "Consolidated events"
        );
    }

    let summary = summarize(&events, total_files);
    Consolidated { events, summary }
}

pub fn summarize(events: &[AlarmEvent], total_files: usize) -> EventSummary {
    let mut summary = EventSummary {
        total_files,
        total_events: events.len(),
        ..Default::default()
    };

    let mut devices = HashSet::new();
    let mut alarms = HashSet::new();

    for event in events {
        *summary.by_stage.entry(event.stage).or_insert(0) += 1;
        *summary.by_file.entry(event.source_file.clone()).or_insert(0) += 1;
        devices.insert(event.device_id.as_str());
        alarms.insert(event.alarm_code.as_str());

        if let Some(time) = event.event_time {
            summary.period_start = Some(summary.period_start.map_or(time, |s| s.min(time)));
            summary.period_end = Some(summary.period_end.map_or(time, |e| e.max(time)));
        }
    }

    summary.distinct_devices = devices.len();
    summary.distinct_alarms = alarms.len();
    summary
}
