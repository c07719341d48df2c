use crate::alarm::event::AlarmEvent;
use crate::alarm::rule::{RuleError, RuleSet};
use crate::config::types::ParserConfig;
use crate::source::reader::RawFile;
use crate::source::timestamp::parse_event_time;
use tracing::{debug, info, warn};

/// Result of parsing a single file.
#[derive(Debug, Clone, Default)]
pub struct ParsedFile {
    pub source_file: String,
    pub lines_read: usize,
    pub events: Vec<AlarmEvent>,
    /// Events kept without an `event_time` because their timestamp did not parse
    pub unparseable_timestamps: usize,
}

/// Turns raw log lines into alarm events.
#[derive(Debug)]
pub struct AlarmParser {
    markers: Vec<String>,
    rules: RuleSet,
}

impl AlarmParser {
    pub fn new(markers: Vec<String>, rules: RuleSet) -> Self {
        Self { markers, rules }
    }

    pub fn from_config(config: &ParserConfig) -> Result<Self, RuleError> {
        Ok(Self::new(config.markers.clone(), RuleSet::from_config(config)?))
    }

    /// Cheap rejection: the line must carry at least one marker substring.
    fn passes_prefilter(&self, line: &str) -> bool {
        self.markers.iter().any(|m| line.contains(m.as_str()))
    }

    /// Parse one line into at most one event.
    pub fn parse_line(&self, line: &str, source_file: &str) -> Option<AlarmEvent> {
        if !self.passes_prefilter(line) {
            return None;
        }

        let line = line.trim();
        let (stage, captured) = self.rules.classify(line)?;

        let event_time = match parse_event_time(captured.raw_timestamp) {
            Ok(time) => Some(time),
            Err(e) => {
                warn!(
                    file = %source_file,
                    timestamp = %captured.raw_timestamp,
                    error = %e,
                    "Unparseable timestamp, keeping event without time"
                );
                None
            }
        };

        Some(AlarmEvent {
            source_file: source_file.to_string(),
            raw_timestamp: captured.raw_timestamp.to_string(),
            event_time,
            device_id: captured.device_id.to_string(),
            alarm_code: captured.alarm_code.trim().to_string(),
            stage,
            raw_line: line.to_string(),
        })
    }

    /// Parse every line of a file, in order.
    pub fn parse_lines<S: AsRef<str>>(&self, lines: &[S], source_file: &str) -> ParsedFile {
        let mut events = Vec::new();
        let mut unparseable_timestamps = 0;

        for line in lines {
            if let Some(event) = self.parse_line(line.as_ref(), source_file) {
                if event.event_time.is_none() {
                    unparseable_timestamps += 1;
                }
                events.push(event);
            }
        }

        info!(
            file = %source_file,
            lines = lines.len(),
            events = events.len(),
            "Parsed file"
        );
        if unparseable_timestamps > 0 {
            debug!(
                file = %source_file,
                count = unparseable_timestamps,
                "Events without a parseable timestamp"
            );
        }

        ParsedFile {
            source_file: source_file.to_string(),
            lines_read: lines.len(),
            events,
            unparseable_timestamps,
        }
    }

    pub fn parse_file(&self, file: &RawFile) -> ParsedFile {
        self.parse_lines(&file.lines, &file.file_name)
    }
}
