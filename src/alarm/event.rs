use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Lifecycle stage of an alarm occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Confirmed,
    Acknowledged,
    Resolved,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Confirmed, Stage::Acknowledged, Stage::Resolved];

    /// Short code stored in the database (`CFN`, `ACK`, `OK`).
    pub fn code(&self) -> &'static str {
        match self {
            Stage::Confirmed => "CFN",
            Stage::Acknowledged => "ACK",
            Stage::Resolved => "OK",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Confirmed => "CONFIRMED",
            Stage::Acknowledged => "ACKNOWLEDGED",
            Stage::Resolved => "RESOLVED",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown stage '{0}' (expected CFN, ACK, OK or their full names)")]
pub struct UnknownStage(pub String);

impl FromStr for Stage {
    type Err = UnknownStage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.code().eq_ignore_ascii_case(s) || stage.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownStage(s.to_string()))
    }
}

/// One alarm line, parsed.
///
/// `alarm_code` is never empty. `event_time` is `None` when the captured
/// timestamp could not be parsed; such events have no known position in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlarmEvent {
    pub source_file: String,
    pub raw_timestamp: String,
    pub event_time: Option<NaiveDateTime>,
    pub device_id: String,
    pub alarm_code: String,
    pub stage: Stage,
    pub raw_line: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_codes_and_names() {
        assert_eq!(Stage::Confirmed.code(), "CFN");
        assert_eq!(Stage::Acknowledged.code(), "ACK");
        assert_eq!(Stage::Resolved.code(), "OK");
        assert_eq!(Stage::Acknowledged.to_string(), "ACKNOWLEDGED");
    }

    #[test]
    fn test_stage_from_str() {
        assert_eq!("cfn".parse::<Stage>().unwrap(), Stage::Confirmed);
        assert_eq!("RESOLVED".parse::<Stage>().unwrap(), Stage::Resolved);
        assert_eq!("ack".parse::<Stage>().unwrap(), Stage::Acknowledged);
        assert!("N/A".parse::<Stage>().is_err());
    }
}
