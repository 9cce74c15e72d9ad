//! Persisted store adapter.
//!
//! Two key-value tiers sit behind [`KvBackend`]: a synced tier with tight
//! quotas and a local tier used as fallback. [`TieredStore`] tries the
//! synced tier first and retries the identical operation once against the
//! local tier; if both fail the error is fatal for the caller.

use std::fmt;

use async_trait::async_trait;
use indexmap::IndexMap;
use thiserror::Error;

pub mod json_map_store;
pub mod keys;
pub mod memory;
pub mod quota;
pub mod tiered;

pub use json_map_store::JsonMapStore;
pub use memory::MemoryBackend;
pub use quota::QuotaLimits;
pub use tiered::TieredStore;

/// Flat key → value mapping as returned by a backend. Key order is the backend's order.
pub type StoredSnapshot = IndexMap<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageTier {
    Sync,
    Local,
}

impl fmt::Display for StorageTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageTier::Sync => f.write_str("sync"),
            StorageTier::Local => f.write_str("local"),
        }
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{tier} storage quota exceeded: {reason}")]
    QuotaExceeded { tier: StorageTier, reason: String },
    #[error("{tier} storage write rate exceeded")]
    RateLimited { tier: StorageTier },
    #[error("{tier} storage unavailable")]
    Unavailable { tier: StorageTier },
    #[error("{tier} storage io error: {reason}")]
    Io { tier: StorageTier, reason: String },
    #[error("storage encode error: {0}")]
    Encode(String),
    #[error("unable to access settings (sync: {sync}; local: {local})")]
    BothTiersFailed { sync: Box<StorageError>, local: Box<StorageError> },
}

/// A single key-value storage area.
#[async_trait]
pub trait KvBackend: Send + Sync {
    fn tier(&self) -> StorageTier;
    /// Entries for `keys` in request order (missing keys omitted); `None` returns every entry.
    async fn get(&self, keys: Option<&[String]>) -> Result<StoredSnapshot, StorageError>;
    /// Upsert every item. Either all items are written or none.
    async fn set(&self, items: StoredSnapshot) -> Result<(), StorageError>;
    async fn remove(&self, keys: &[String]) -> Result<(), StorageError>;
}

/// Select `keys` from `map` preserving request order.
pub(crate) fn select(map: &StoredSnapshot, keys: Option<&[String]>) -> StoredSnapshot {
    match keys {
        None => map.clone(),
        Some(keys) => keys
            .iter()
            .filter_map(|k| map.get(k).map(|v| (k.clone(), v.clone())))
            .collect(),
    }
}
