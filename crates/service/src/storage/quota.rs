use std::time::Instant;

use configs::SyncQuotaConfig;
use tracing::{debug, warn};

use super::{StorageError, StorageTier, StoredSnapshot};

/// Limits enforced by the synced storage area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaLimits {
    pub max_items: usize,
    /// Serialized key + JSON value length.
    pub max_bytes_per_item: usize,
    /// Burst size of the write bucket; refills evenly over a minute.
    pub max_writes_per_minute: u64,
}

impl From<&SyncQuotaConfig> for QuotaLimits {
    fn from(cfg: &SyncQuotaConfig) -> Self {
        Self {
            max_items: cfg.max_items,
            max_bytes_per_item: cfg.max_bytes_per_item,
            max_writes_per_minute: cfg.max_writes_per_minute,
        }
    }
}

impl Default for QuotaLimits {
    fn default() -> Self {
        Self::from(&SyncQuotaConfig::default())
    }
}

#[derive(Debug)]
pub struct TokenBucket {
    capacity: u64,
    tokens: u64,
    refill_rate: u64, // tokens per second
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(capacity: u64, refill_rate: u64) -> Self {
        Self {
            capacity,
            tokens: capacity,
            refill_rate,
            last_refill: Instant::now(),
        }
    }

    pub fn try_acquire(&mut self, tokens: u64) -> bool {
        self.refill();

        if self.tokens >= tokens {
            self.tokens -= tokens;
            debug!(remaining = self.tokens, "write token acquired");
            true
        } else {
            warn!(tokens = self.tokens, requested = tokens, "write rate exceeded");
            false
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill);
        let tokens_to_add = (elapsed.as_secs_f64() * self.refill_rate as f64) as u64;

        if tokens_to_add > 0 {
            self.tokens = (self.tokens + tokens_to_add).min(self.capacity);
            self.last_refill = now;
        }
    }
}

/// Quota state owned by one backend: static limits plus the write-rate bucket.
#[derive(Debug)]
pub struct Quota {
    limits: QuotaLimits,
    bucket: TokenBucket,
}

impl Quota {
    pub fn new(limits: QuotaLimits) -> Self {
        let burst = limits.max_writes_per_minute;
        Self { limits, bucket: TokenBucket::new(burst, (burst / 60).max(1)) }
    }

    /// Validate a write of `items` on top of `current`; consumes one write token on success.
    pub fn admit_set(&mut self, tier: StorageTier, current: &StoredSnapshot, items: &StoredSnapshot) -> Result<(), StorageError> {
        for (key, value) in items {
            let bytes = key.len() + serde_json::to_string(value).map_err(|e| StorageError::Encode(e.to_string()))?.len();
            if bytes > self.limits.max_bytes_per_item {
                return Err(StorageError::QuotaExceeded {
                    tier,
                    reason: format!("item {key} is {bytes} bytes (max {})", self.limits.max_bytes_per_item),
                });
            }
        }
        let added = items.keys().filter(|k| !current.contains_key(*k)).count();
        if current.len() + added > self.limits.max_items {
            return Err(StorageError::QuotaExceeded {
                tier,
                reason: format!("{} items exceeds max {}", current.len() + added, self.limits.max_items),
            });
        }
        self.admit_write(tier)
    }

    pub fn admit_write(&mut self, tier: StorageTier) -> Result<(), StorageError> {
        if self.bucket.try_acquire(1) {
            Ok(())
        } else {
            Err(StorageError::RateLimited { tier })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::time::{sleep, Duration};

    fn limits(max_items: usize, max_bytes: usize, per_minute: u64) -> QuotaLimits {
        QuotaLimits { max_items, max_bytes_per_item: max_bytes, max_writes_per_minute: per_minute }
    }

    #[test]
    fn test_token_bucket_basic() {
        let mut bucket = TokenBucket::new(2, 2);
        assert!(bucket.try_acquire(1));
        assert!(bucket.try_acquire(1));
        assert!(!bucket.try_acquire(1));
    }

    #[tokio::test]
    async fn test_token_bucket_refill() {
        let mut bucket = TokenBucket::new(2, 2);
        assert!(bucket.try_acquire(2));
        assert!(!bucket.try_acquire(1));
        sleep(Duration::from_millis(1100)).await;
        assert!(bucket.try_acquire(2));
    }

    #[test]
    fn default_limits_allow_a_burst_of_popup_edits() {
        let mut quota = Quota::new(QuotaLimits::default());
        for _ in 0..120 {
            assert!(quota.admit_write(StorageTier::Sync).is_ok());
        }
        assert!(matches!(quota.admit_write(StorageTier::Sync), Err(StorageError::RateLimited { .. })));
    }

    #[test]
    fn oversized_item_is_rejected() {
        let mut quota = Quota::new(limits(10, 16, 10));
        let mut items = StoredSnapshot::new();
        items.insert("PREFS".into(), json!({"showControlsOverlay": true}));
        let err = quota.admit_set(StorageTier::Sync, &StoredSnapshot::new(), &items).unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded { .. }));
    }

    #[test]
    fn item_count_counts_only_new_keys() {
        let mut quota = Quota::new(limits(1, 1024, 10));
        let mut current = StoredSnapshot::new();
        current.insert("ENABLED".into(), json!(true));
        let mut overwrite = StoredSnapshot::new();
        overwrite.insert("ENABLED".into(), json!(false));
        assert!(quota.admit_set(StorageTier::Sync, &current, &overwrite).is_ok());

        let mut extra = StoredSnapshot::new();
        extra.insert("ONBOARDED".into(), json!(true));
        assert!(quota.admit_set(StorageTier::Sync, &current, &extra).is_err());
    }
}
