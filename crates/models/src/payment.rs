use serde::{Deserialize, Serialize};

/// Payment state as reported by the payment provider. Timestamps are epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub paid: bool,
    #[serde(default)]
    pub paid_at: Option<i64>,
    pub installed_at: i64,
    #[serde(default)]
    pub trial_started_at: Option<i64>,
}

/// Trial status derived from `trial_started_at`; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum TrialState {
    Inactive,
    Active {
        #[serde(rename = "remainingDays")]
        remaining_days: u32,
    },
    Expired {
        #[serde(rename = "remainingDays")]
        remaining_days: u32,
    },
}

impl TrialState {
    pub fn is_active(&self) -> bool {
        matches!(self, TrialState::Active { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn trial_state_wire_shape() {
        let v = serde_json::to_value(TrialState::Active { remaining_days: 3 }).unwrap();
        assert_eq!(v, json!({"status": "active", "remainingDays": 3}));
        let v = serde_json::to_value(TrialState::Inactive).unwrap();
        assert_eq!(v, json!({"status": "inactive"}));
    }

    #[test]
    fn payment_record_tolerates_missing_nullable_fields() {
        let p: PaymentRecord = serde_json::from_value(json!({"paid": false, "installedAt": 5})).unwrap();
        assert_eq!(p.paid_at, None);
        assert_eq!(p.trial_started_at, None);
    }
}
