//! Inactivity monitor (dead man's switch)
//!
//! Status and trigger checks are pure functions of an explicit `now`; the
//! host decides when to poll. On expiry, [`InactivityMonitor::poll`] hands one
//! action to an external [`ActionSink`].

use crate::emergency::EmergencyContact;
use crate::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Days remaining at or below which the switch is in warning
pub const WARNING_DAYS: i64 = 14;

/// Days remaining at or below which the switch is critical
pub const CRITICAL_DAYS: i64 = 7;

/// Default inactivity threshold in days
pub const DEFAULT_THRESHOLD_DAYS: u32 = 30;

/// Action taken when the switch fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InactivityAction {
    /// Destroy local data
    Wipe,
    /// Notify emergency contacts
    Notify,
    /// Export to emergency contacts
    Export,
}

/// How close the switch is to firing
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrgencyLevel {
    /// More than two weeks left, or disarmed
    Safe,
    /// Two weeks or less
    Warning,
    /// One week or less
    Critical,
}

/// Snapshot for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InactivityStatus {
    /// Whole days since last activity
    pub days_inactive: i64,
    /// Whole days until the switch fires; `None` while disarmed
    pub days_until_trigger: Option<i64>,
    /// Urgency band
    pub urgency: UrgencyLevel,
}

/// Persisted switch state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InactivityState {
    /// Last recorded user activity
    pub last_activity: DateTime<Utc>,
    /// Days of inactivity before firing
    pub threshold_days: u32,
    /// What to do when firing
    pub action: InactivityAction,
    /// Only changed by explicit user action
    pub armed: bool,
    /// Set when the action was dispatched; cleared by activity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fired_at: Option<DateTime<Utc>>,
}

impl Default for InactivityState {
    fn default() -> Self {
        Self {
            last_activity: Utc::now(),
            threshold_days: DEFAULT_THRESHOLD_DAYS,
            action: InactivityAction::Notify,
            armed: false,
            fired_at: None,
        }
    }
}

impl InactivityState {
    /// Mark the user as active
    pub fn record_activity(&mut self, now: DateTime<Utc>) {
        self.last_activity = now;
        self.fired_at = None;
    }

    /// Current status
    pub fn status(&self, now: DateTime<Utc>) -> InactivityStatus {
        get_status(self.armed, self.last_activity, self.threshold_days, self.action, now)
    }

    /// Whether the switch is due
    pub fn should_trigger(&self, now: DateTime<Utc>) -> bool {
        should_trigger(self.armed, self.last_activity, self.threshold_days, now)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.threshold_days == 0 {
            return Err(Error::Validation(
                "Inactivity threshold must be at least one day.".to_string(),
            ));
        }
        Ok(())
    }
}

/// Compute status for display
///
/// `action` does not affect the result; it is accepted so callers can pass
/// the stored state field by field.
pub fn get_status(
    enabled: bool,
    last_activity: DateTime<Utc>,
    threshold_days: u32,
    _action: InactivityAction,
    now: DateTime<Utc>,
) -> InactivityStatus {
    let days_inactive = (now - last_activity).num_days().max(0);

    if !enabled {
        return InactivityStatus {
            days_inactive,
            days_until_trigger: None,
            urgency: UrgencyLevel::Safe,
        };
    }

    let remaining = i64::from(threshold_days) - days_inactive;
    let urgency = if remaining <= CRITICAL_DAYS {
        UrgencyLevel::Critical
    } else if remaining <= WARNING_DAYS {
        UrgencyLevel::Warning
    } else {
        UrgencyLevel::Safe
    };

    InactivityStatus {
        days_inactive,
        days_until_trigger: Some(remaining),
        urgency,
    }
}

/// Whether an armed switch has reached its threshold
pub fn should_trigger(
    enabled: bool,
    last_activity: DateTime<Utc>,
    threshold_days: u32,
    now: DateTime<Utc>,
) -> bool {
    enabled && now - last_activity >= Duration::days(i64::from(threshold_days))
}

/// Receiver for switch actions
pub trait ActionSink: Send + Sync {
    /// Destroy local data
    fn wipe(&self) -> Result<()>;

    /// Tell contacts the switch fired
    fn notify(&self, contacts: &[EmergencyContact]) -> Result<()>;

    /// Deliver an export to contacts
    fn export(&self, contacts: &[EmergencyContact]) -> Result<()>;
}

/// Polls switch state and dispatches to an [`ActionSink`]
#[derive(Clone)]
pub struct InactivityMonitor {
    sink: Arc<dyn ActionSink>,
}

impl std::fmt::Debug for InactivityMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InactivityMonitor").finish_non_exhaustive()
    }
}

impl InactivityMonitor {
    /// Create around a sink
    pub fn new(sink: Arc<dyn ActionSink>) -> Self {
        Self { sink }
    }

    /// Dispatch the configured action once if the switch is due
    ///
    /// Returns the action taken. `fired_at` is only stamped after the sink
    /// succeeds, so a failed dispatch is retried on the next poll.
    pub fn poll(
        &self,
        state: &mut InactivityState,
        contacts: &[EmergencyContact],
        now: DateTime<Utc>,
    ) -> Result<Option<InactivityAction>> {
        if state.fired_at.is_some() || !state.should_trigger(now) {
            return Ok(None);
        }

        tracing::warn!(
            action = ?state.action,
            threshold_days = state.threshold_days,
            "inactivity switch firing"
        );
        match state.action {
            InactivityAction::Wipe => self.sink.wipe()?,
            InactivityAction::Notify => self.sink.notify(contacts)?,
            InactivityAction::Export => self.sink.export(contacts)?,
        }
        state.fired_at = Some(now);

        Ok(Some(state.action))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use parking_lot::Mutex;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    #[derive(Default)]
    struct RecordingSink {
        calls: Mutex<Vec<String>>,
    }

    impl ActionSink for RecordingSink {
        fn wipe(&self) -> Result<()> {
            self.calls.lock().push("wipe".to_string());
            Ok(())
        }

        fn notify(&self, contacts: &[EmergencyContact]) -> Result<()> {
            self.calls.lock().push(format!("notify:{}", contacts.len()));
            Ok(())
        }

        fn export(&self, contacts: &[EmergencyContact]) -> Result<()> {
            self.calls.lock().push(format!("export:{}", contacts.len()));
            Ok(())
        }
    }

    #[test]
    fn test_should_trigger_cases() {
        let last = t0();
        assert!(!should_trigger(true, last, 30, last + Duration::days(29)));
        assert!(should_trigger(true, last, 30, last + Duration::days(30)));
        assert!(should_trigger(true, last, 30, last + Duration::days(45)));
        assert!(!should_trigger(false, last, 30, last + Duration::days(45)));
    }

    #[test]
    fn test_status_urgency_bands() {
        let last = t0();
        let status = |days| {
            get_status(true, last, 30, InactivityAction::Notify, last + Duration::days(days))
        };

        assert_eq!(status(0).urgency, UrgencyLevel::Safe);
        assert_eq!(status(15).urgency, UrgencyLevel::Safe);
        assert_eq!(status(16).urgency, UrgencyLevel::Warning);
        assert_eq!(status(16).days_until_trigger, Some(14));
        assert_eq!(status(23).urgency, UrgencyLevel::Critical);
        assert_eq!(status(40).urgency, UrgencyLevel::Critical);
        assert_eq!(status(40).days_until_trigger, Some(-10));
        assert_eq!(status(40).days_inactive, 40);
    }

    #[test]
    fn test_disabled_status_has_no_countdown() {
        let last = t0();
        let status = get_status(false, last, 30, InactivityAction::Wipe, last + Duration::days(29));
        assert_eq!(status.days_inactive, 29);
        assert_eq!(status.days_until_trigger, None);
        assert_eq!(status.urgency, UrgencyLevel::Safe);
    }

    #[test]
    fn test_future_last_activity_clamps_to_zero() {
        let last = t0();
        let status = get_status(true, last, 30, InactivityAction::Notify, last - Duration::days(3));
        assert_eq!(status.days_inactive, 0);
        assert_eq!(status.days_until_trigger, Some(30));
    }

    #[test]
    fn test_poll_dispatches_once_until_activity() {
        let sink = Arc::new(RecordingSink::default());
        let monitor = InactivityMonitor::new(sink.clone());
        let contacts = vec![EmergencyContact::new("Sam", "sam@example.org").unwrap()];
        let mut state = InactivityState {
            last_activity: t0(),
            threshold_days: 30,
            action: InactivityAction::Export,
            armed: true,
            fired_at: None,
        };

        let early = t0() + Duration::days(10);
        assert_eq!(monitor.poll(&mut state, &contacts, early).unwrap(), None);

        let late = t0() + Duration::days(31);
        assert_eq!(
            monitor.poll(&mut state, &contacts, late).unwrap(),
            Some(InactivityAction::Export)
        );
        assert_eq!(state.fired_at, Some(late));
        assert_eq!(monitor.poll(&mut state, &contacts, late).unwrap(), None);
        assert_eq!(*sink.calls.lock(), vec!["export:1".to_string()]);

        state.record_activity(late);
        assert_eq!(state.fired_at, None);
        assert!(!state.should_trigger(late + Duration::days(1)));
    }

    #[test]
    fn test_disarmed_switch_never_fires() {
        let sink = Arc::new(RecordingSink::default());
        let monitor = InactivityMonitor::new(sink.clone());
        let mut state = InactivityState {
            last_activity: t0(),
            ..InactivityState::default()
        };

        let result = monitor.poll(&mut state, &[], t0() + Duration::days(365)).unwrap();
        assert_eq!(result, None);
        assert!(sink.calls.lock().is_empty());
    }
}
