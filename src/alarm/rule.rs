use crate::alarm::event::Stage;
use crate::config::types::ParserConfig;
use regex::Regex;
use thiserror::Error;

/// Timestamp, bracketed device and alarm code at the start of a line.
const LINE_HEAD: &str =
    r"^(?P<ts>\d{4}-\d{2}-\d{2}\s+\d{2}:\d{2}:\d{2},\d+)\s+\[(?P<device>[^\]]+)\]\s+(?P<code>\S+)\s+";

/// Error type for classification rule compilation
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("regex compilation error for pattern '{pattern}': {source}")]
    RegexCompilation {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Fields captured from a line by a matching rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Captured<'a> {
    pub raw_timestamp: &'a str,
    pub device_id: &'a str,
    pub alarm_code: &'a str,
}

/// One row of the classification table: a line shape plus an optional
/// substring the line must also contain.
#[derive(Debug)]
pub struct ClassificationRule {
    pub stage: Stage,
    pub regex: Regex,
    pub marker: Option<String>,
}

impl ClassificationRule {
    pub fn new(stage: Stage, pattern: &str, marker: Option<&str>) -> Result<Self, RuleError> {
        let regex = Regex::new(pattern).map_err(|source| RuleError::RegexCompilation {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            stage,
            regex,
            marker: marker.map(str::to_string),
        })
    }

    /// Returns the captured fields if the line has this rule's shape and marker.
    pub fn apply<'a>(&self, line: &'a str) -> Option<Captured<'a>> {
        if let Some(marker) = &self.marker {
            if !line.contains(marker.as_str()) {
                return None;
            }
        }

        let caps = self.regex.captures(line)?;
        Some(Captured {
            raw_timestamp: caps.name("ts")?.as_str(),
            device_id: caps.name("device")?.as_str(),
            alarm_code: caps.name("code")?.as_str(),
        })
    }
}

/// Pattern for lines of the form `<ts> [<device>] <code> ALARM is acknowledged ...`.
pub fn acknowledgment_pattern() -> String {
    format!(r"{LINE_HEAD}ALARM\s+is\s+acknowledged.*")
}

/// Pattern for any timestamped alarm line.
pub fn alarm_line_pattern() -> String {
    format!("{LINE_HEAD}.*")
}

/// Ordered classification table. The first rule that applies decides the stage.
#[derive(Debug)]
pub struct RuleSet {
    rules: Vec<ClassificationRule>,
}

impl RuleSet {
    pub fn new(rules: Vec<ClassificationRule>) -> Self {
        Self { rules }
    }

    /// Acknowledgment shape first, then confirmation, then resolution.
    ///
    /// The acknowledgment shape also satisfies the general alarm-line shape, so
    /// it must be tried before any marker-based rule.
    pub fn from_config(config: &ParserConfig) -> Result<Self, RuleError> {
        let general = alarm_line_pattern();
        Ok(Self::new(vec![
            ClassificationRule::new(Stage::Acknowledged, &acknowledgment_pattern(), None)?,
            ClassificationRule::new(
                Stage::Confirmed,
                &general,
                Some(&config.confirmation_marker),
            )?,
            ClassificationRule::new(Stage::Resolved, &general, Some(&config.resolution_marker))?,
        ]))
    }

    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }

    /// Classify a trimmed line. Returns `None` when no rule applies or the
    /// winning rule captured an empty alarm code.
    pub fn classify<'a>(&self, line: &'a str) -> Option<(Stage, Captured<'a>)> {
        let (stage, captured) = self
            .rules
            .iter()
            .find_map(|rule| rule.apply(line).map(|captured| (rule.stage, captured)))?;

        if captured.alarm_code.trim().is_empty() {
            return None;
        }
        Some((stage, captured))
    }
}
