use crate::alarm::event::{AlarmEvent, Stage};
use chrono::{Duration, NaiveDateTime};

/// One alarm instance: a confirmation plus the acknowledgment and resolution
/// that followed it for the same device and alarm code.
#[derive(Debug, Clone, PartialEq)]
pub struct AlarmLifecycle {
    pub device_id: String,
    pub alarm_code: String,
    pub confirmed_at: Option<NaiveDateTime>,
    pub acknowledged_at: Option<NaiveDateTime>,
    pub resolved_at: Option<NaiveDateTime>,
    pub acknowledged: bool,
    pub resolved: bool,
}

impl AlarmLifecycle {
    fn open(event: &AlarmEvent) -> Self {
        Self {
            device_id: event.device_id.clone(),
            alarm_code: event.alarm_code.clone(),
            confirmed_at: event.event_time,
            acknowledged_at: None,
            resolved_at: None,
            acknowledged: false,
            resolved: false,
        }
    }

    pub fn time_to_acknowledge(&self) -> Option<Duration> {
        Some(self.acknowledged_at? - self.confirmed_at?)
    }

    pub fn time_to_resolve(&self) -> Option<Duration> {
        Some(self.resolved_at? - self.confirmed_at?)
    }
}

/// Forward scan over events ordered by `group_sequences`.
///
/// Within a `(device_id, alarm_code)` run each CONFIRMED opens an instance;
/// the first ACKNOWLEDGED and the first RESOLVED after it attach to that
/// instance, and RESOLVED closes it. Acknowledgments or resolutions with no
/// open instance are not reported.
pub fn lifecycles(grouped: &[AlarmEvent]) -> Vec<AlarmLifecycle> {
    let mut instances = Vec::new();
    let mut open: Option<AlarmLifecycle> = None;

    for event in grouped {
        let same_alarm = open
            .as_ref()
            .is_some_and(|o| o.device_id == event.device_id && o.alarm_code == event.alarm_code);
        if !same_alarm {
            instances.extend(open.take());
        }

        match event.stage {
            Stage::Confirmed => {
                instances.extend(open.take());
                open = Some(AlarmLifecycle::open(event));
            }
            Stage::Acknowledged => {
                if let Some(current) = open.as_mut().filter(|o| !o.acknowledged) {
                    current.acknowledged = true;
                    current.acknowledged_at = event.event_time;
                }
            }
            Stage::Resolved => {
                if let Some(mut current) = open.take() {
                    current.resolved = true;
                    current.resolved_at = event.event_time;
                    instances.push(current);
                }
            }
        }
    }

    instances.extend(open);
    instances
}

/// Mean of the known time-to-acknowledge values, if any.
pub fn mean_time_to_acknowledge(instances: &[AlarmLifecycle]) -> Option<Duration> {
    let known: Vec<Duration> = instances
        .iter()
        .filter_map(AlarmLifecycle::time_to_acknowledge)
        .collect();
    if known.is_empty() {
        return None;
    }
    let total_ms: i64 = known.iter().map(Duration::num_milliseconds).sum();
    Some(Duration::milliseconds(total_ms / known.len() as i64))
}
