use crate::alarm::event::AlarmEvent;
use crate::sequencer::merge::compare_event_time;
use tracing::info;

/// Reorder events by device, then alarm code, then time.
///
/// Each alarm's lifecycle becomes one contiguous, chronological run. Nothing
/// is merged or dropped; ties and absent times keep their input order, with
/// absent times last inside their group.
pub fn group_sequences(events: &[AlarmEvent]) -> Vec<AlarmEvent> {
    let mut grouped = events.to_vec();
    grouped.sort_by(|a, b| {
        a.device_id
            .cmp(&b.device_id)
            .then_with(|| a.alarm_code.cmp(&b.alarm_code))
            .then_with(|| compare_event_time(a.event_time.as_ref(), b.event_time.as_ref()))
    });

    info!(events = grouped.len(), "Grouped alarm sequences");
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::event::Stage;
    use crate::source::timestamp::parse_event_time;

    fn event(ts: Option<&str>, device: &str, code: &str, stage: Stage, tag: &str) -> AlarmEvent {
        AlarmEvent {
            source_file: "a.log".to_string(),
            raw_timestamp: ts.unwrap_or("?").to_string(),
            event_time: ts.map(|t| parse_event_time(t).unwrap()),
            device_id: device.to_string(),
            alarm_code: code.to_string(),
            stage,
            raw_line: tag.to_string(),
        }
    }

    #[test]
    fn test_empty() {
        assert!(group_sequences(&[]).is_empty());
    }

    #[test]
    fn test_lifecycles_become_contiguous() {
        let events = vec![
            event(Some("2025-10-05 07:00:00,0"), "PC2", "B", Stage::Confirmed, "b-cfn"),
            event(Some("2025-10-05 07:01:00,0"), "PC1", "A", Stage::Confirmed, "a-cfn"),
            event(Some("2025-10-05 07:02:00,0"), "PC2", "B", Stage::Acknowledged, "b-ack"),
            event(Some("2025-10-05 07:03:00,0"), "PC1", "A", Stage::Acknowledged, "a-ack"),
            event(Some("2025-10-05 07:04:00,0"), "PC1", "A", Stage::Resolved, "a-ok"),
            event(Some("2025-10-05 07:05:00,0"), "PC2", "B", Stage::Resolved, "b-ok"),
        ];

        let grouped = group_sequences(&events);
        let tags: Vec<&str> = grouped.iter().map(|e| e.raw_line.as_str()).collect();
        assert_eq!(tags, vec!["a-cfn", "a-ack", "a-ok", "b-cfn", "b-ack", "b-ok"]);
    }

    #[test]
    fn test_is_permutation_with_absent_times_last_in_group() {
        let events = vec![
            event(None, "PC1", "A", Stage::Resolved, "none"),
            event(Some("2025-10-05 07:03:00,0"), "PC1", "A", Stage::Acknowledged, "late"),
            event(Some("2025-10-05 07:01:00,0"), "PC1", "A", Stage::Confirmed, "early"),
            event(Some("2025-10-05 07:01:00,0"), "PC1", "A", Stage::Confirmed, "early-tie"),
            event(Some("2025-10-05 06:00:00,0"), "PC1", "B", Stage::Confirmed, "other"),
        ];

        let grouped = group_sequences(&events);
        assert_eq!(grouped.len(), events.len());

        let tags: Vec<&str> = grouped.iter().map(|e| e.raw_line.as_str()).collect();
        assert_eq!(tags, vec!["early", "early-tie", "late", "none", "other"]);

        for window in grouped.windows(2) {
            let (a, b) = (&window[0], &window[1]);
            if a.device_id == b.device_id && a.alarm_code == b.alarm_code {
                if let (Some(ta), Some(tb)) = (a.event_time, b.event_time) {
                    assert!(ta <= tb);
                }
            }
        }
    }

    #[test]
    fn test_input_is_not_modified() {
        let events = vec![
            event(Some("2025-10-05 07:00:00,0"), "PC2", "B", Stage::Confirmed, "1"),
            event(Some("2025-10-05 07:00:00,0"), "PC1", "A", Stage::Confirmed, "2"),
        ];
        let before = events.clone();
        let _ = group_sequences(&events);
        assert_eq!(events, before);
    }
}
