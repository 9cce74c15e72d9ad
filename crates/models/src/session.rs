use serde::{Deserialize, Serialize};

/// Analytics session, kept in the local storage tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub start_ms: i64,
    pub session_id: String,
}

impl Session {
    pub fn is_expired(&self, now_ms: i64, timeout_ms: i64) -> bool {
        now_ms.saturating_sub(self.start_ms) > timeout_ms
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdAndSession {
    pub client_id: String,
    pub session: Session,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_expiry_tolerates_extreme_start_times() {
        let ancient = Session { start_ms: i64::MIN, session_id: "s".into() };
        assert!(ancient.is_expired(1_700_000_000_000, 1_800_000));
        let future = Session { start_ms: i64::MAX, session_id: "s".into() };
        assert!(!future.is_expired(1_700_000_000_000, 1_800_000));
    }
}
