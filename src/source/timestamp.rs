use chrono::{NaiveDateTime, Timelike};
use thiserror::Error;

/// Format of the date/time part, before the fractional separator.
const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error)]
pub enum TimestampError {
    #[error("timestamp '{value}' has no ',<fraction>' component")]
    MissingFraction { value: String },

    #[error("timestamp '{value}' has an invalid fractional component")]
    InvalidFraction { value: String },

    #[error("failed to parse timestamp '{value}' with format '{format}': {source}")]
    ParseError {
        value: String,
        format: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// Parse a log timestamp of the form `YYYY-MM-DD HH:MM:SS,<digits>`.
///
/// Any run of whitespace may separate date and time. The fraction holds 1 to 9
/// digits and is read as a decimal fraction of a second, so `,4` is 400ms.
pub fn parse_event_time(value: &str) -> Result<NaiveDateTime, TimestampError> {
    let (base, fraction) = value
        .trim()
        .rsplit_once(',')
        .ok_or_else(|| TimestampError::MissingFraction {
            value: value.to_string(),
        })?;

    let nanos = parse_fraction(fraction).ok_or_else(|| TimestampError::InvalidFraction {
        value: value.to_string(),
    })?;

    let normalized = base.split_whitespace().collect::<Vec<_>>().join(" ");
    let seconds = NaiveDateTime::parse_from_str(&normalized, DATE_TIME_FORMAT).map_err(|e| {
        TimestampError::ParseError {
            value: value.to_string(),
            format: DATE_TIME_FORMAT.to_string(),
            source: e,
        }
    })?;

    seconds
        .with_nanosecond(nanos)
        .ok_or_else(|| TimestampError::InvalidFraction {
            value: value.to_string(),
        })
}

fn parse_fraction(digits: &str) -> Option<u32> {
    if digits.is_empty() || digits.len() > 9 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let value: u32 = digits.parse().ok()?;
    Some(value * 10u32.pow(9 - digits.len() as u32))
}

/// Whole days between two instants, truncated toward zero.
pub fn whole_days_between(start: NaiveDateTime, end: NaiveDateTime) -> i64 {
    (end - start).num_days()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_single_digit_fraction_is_tenths() {
        let dt = parse_event_time("2025-10-05 07:12:33,4").unwrap();
        assert_eq!(dt.date(), NaiveDate::from_ymd_opt(2025, 10, 5).unwrap());
        assert_eq!(dt.hour(), 7);
        assert_eq!(dt.minute(), 12);
        assert_eq!(dt.second(), 33);
        assert_eq!(dt.nanosecond(), 400_000_000);
    }

    #[test]
    fn test_millisecond_fraction() {
        let dt = parse_event_time("2025-10-05 07:14:01,026").unwrap();
        assert_eq!(dt.nanosecond(), 26_000_000);
    }

    #[test]
    fn test_extra_whitespace_between_date_and_time() {
        let dt = parse_event_time("2025-10-05   07:14:01,0").unwrap();
        assert_eq!(dt.minute(), 14);
    }

    #[test]
    fn test_invalid_calendar_date() {
        let result = parse_event_time("2025-13-45 07:12:33,4");
        assert!(matches!(result, Err(TimestampError::ParseError { .. })));
    }

    #[test]
    fn test_missing_fraction() {
        let result = parse_event_time("2025-10-05 07:12:33");
        assert!(matches!(result, Err(TimestampError::MissingFraction { .. })));
    }

    #[test]
    fn test_fraction_too_long() {
        let result = parse_event_time("2025-10-05 07:12:33,1234567890");
        assert!(matches!(result, Err(TimestampError::InvalidFraction { .. })));
    }

    #[test]
    fn test_whole_days_between() {
        let start = parse_event_time("2025-10-01 23:00:00,0").unwrap();
        let end = parse_event_time("2025-10-03 22:59:59,9").unwrap();
        assert_eq!(whole_days_between(start, end), 1);
    }
}
