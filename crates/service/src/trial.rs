//! Trial window and entitlement rules.

use models::{PaymentRecord, TrialState};

pub const DAY_MS: i64 = 24 * 60 * 60 * 1000;
pub const DEFAULT_TRIAL_DAYS: u32 = 7;

/// Current wall-clock time in epoch milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrialPolicy {
    trial_days: u32,
}

impl Default for TrialPolicy {
    fn default() -> Self {
        Self { trial_days: DEFAULT_TRIAL_DAYS }
    }
}

impl TrialPolicy {
    pub fn new(trial_days: u32) -> Self {
        Self { trial_days: trial_days.max(1) }
    }

    pub fn trial_days(&self) -> u32 {
        self.trial_days
    }

    /// Period string handed to the provider's trial page, e.g. `"7 day"`.
    pub fn period_label(&self) -> String {
        format!("{} day", self.trial_days)
    }

    /// Derive the trial state. A start time in the future counts as zero elapsed.
    pub fn state(&self, trial_started_at: Option<i64>, now_ms: i64) -> TrialState {
        let Some(started) = trial_started_at else {
            return TrialState::Inactive;
        };
        let window = i64::from(self.trial_days) * DAY_MS;
        let elapsed = now_ms.saturating_sub(started).max(0);
        if elapsed < window {
            let left = window - elapsed;
            let remaining_days = ((left + DAY_MS - 1) / DAY_MS) as u32;
            TrialState::Active { remaining_days }
        } else {
            TrialState::Expired { remaining_days: 0 }
        }
    }

    /// Paid users and users inside an active trial may enable configs.
    pub fn is_allowed(&self, payment: &PaymentRecord, now_ms: i64) -> bool {
        payment.paid || self.state(payment.trial_started_at, now_ms).is_active()
    }
}
