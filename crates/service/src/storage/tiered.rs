use std::sync::Arc;

use configs::StorageConfig;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use super::keys::LocalKey;
use super::quota::QuotaLimits;
use super::{select, JsonMapStore, KvBackend, StorageError, StorageTier, StoredSnapshot};
use crate::observability::{STORAGE_FAILURES_TOTAL, STORAGE_FALLBACKS_TOTAL};

/// Latest fallback operation applied to a key in the local tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Mark {
    Set,
    Removed,
}

type Journal = IndexMap<String, Mark>;

/// Synced tier with a single fallback attempt against the local tier.
///
/// Adds no retries or timeouts of its own. Keys that only reached the local
/// tier are marked in the `SYNC_FALLBACK` journal and overlaid on synced
/// reads until a later synced write of the same key settles them.
#[derive(Clone)]
pub struct TieredStore {
    sync: Arc<dyn KvBackend>,
    local: Arc<dyn KvBackend>,
    // serializes writes so journal updates never interleave
    writes: Arc<Mutex<()>>,
}

impl TieredStore {
    pub fn new(sync: Arc<dyn KvBackend>, local: Arc<dyn KvBackend>) -> Self {
        Self { sync, local, writes: Arc::new(Mutex::new(())) }
    }

    /// Open both tiers as JSON files under `cfg.data_dir`; the synced one enforces the configured quota.
    pub async fn open(cfg: &StorageConfig) -> Result<Self, StorageError> {
        let limits = QuotaLimits::from(&cfg.sync_quota);
        let sync = JsonMapStore::open(cfg.sync_path(), StorageTier::Sync, Some(limits)).await?;
        let local = JsonMapStore::open(cfg.local_path(), StorageTier::Local, None).await?;
        Ok(Self::new(sync, local))
    }

    /// Direct access to the local tier for local-only keys.
    pub fn local(&self) -> &dyn KvBackend {
        self.local.as_ref()
    }

    pub async fn get(&self, keys: Option<&[String]>) -> Result<StoredSnapshot, StorageError> {
        match self.sync.get(keys).await {
            Ok(mut snapshot) => {
                if let Err(e) = self.overlay(&mut snapshot, keys).await {
                    warn!(error = %e, "local fallback entries unreadable; serving synced values");
                }
                Ok(snapshot)
            }
            Err(sync_err) => {
                self.note_fallback("get", &sync_err);
                let mut snapshot = self.local.get(keys).await.map_err(|local_err| both_failed("get", sync_err, local_err))?;
                snapshot.shift_remove(LocalKey::SyncFallback.as_str());
                Ok(snapshot)
            }
        }
    }

    pub async fn get_all(&self) -> Result<StoredSnapshot, StorageError> {
        self.get(None).await
    }

    pub async fn set(&self, items: StoredSnapshot) -> Result<(), StorageError> {
        let _guard = self.writes.lock().await;
        match self.sync.set(items.clone()).await {
            Ok(()) => {
                self.settle(items.keys()).await;
                Ok(())
            }
            Err(sync_err) => {
                self.note_fallback("set", &sync_err);
                self.fallback_set(items).await.map_err(|local_err| both_failed("set", sync_err, local_err))
            }
        }
    }

    pub async fn remove(&self, keys: &[String]) -> Result<(), StorageError> {
        let _guard = self.writes.lock().await;
        match self.sync.remove(keys).await {
            Ok(()) => {
                self.settle(keys).await;
                Ok(())
            }
            Err(sync_err) => {
                self.note_fallback("remove", &sync_err);
                self.fallback_remove(keys).await.map_err(|local_err| both_failed("remove", sync_err, local_err))
            }
        }
    }

    async fn journal(&self) -> Result<Journal, StorageError> {
        let key = journal_key();
        let mut got = self.local.get(Some(std::slice::from_ref(&key))).await?;
        Ok(match got.shift_remove(&key) {
            None => Journal::new(),
            Some(value) => serde_json::from_value(value).unwrap_or_else(|e| {
                warn!(error = %e, "discarding malformed fallback journal");
                Journal::new()
            }),
        })
    }

    /// Apply journal marks within `keys` to a synced snapshot.
    async fn overlay(&self, snapshot: &mut StoredSnapshot, keys: Option<&[String]>) -> Result<(), StorageError> {
        let journal = self.journal().await?;
        let in_scope = |key: &str| keys.map_or(true, |keys| keys.iter().any(|k| k == key));
        let mut written = Vec::new();
        for (key, mark) in journal.iter().filter(|(key, _)| in_scope(key.as_str())) {
            match mark {
                Mark::Set => written.push(key.clone()),
                Mark::Removed => {
                    snapshot.shift_remove(key);
                }
            }
        }
        if !written.is_empty() {
            let local = self.local.get(Some(&written)).await?;
            snapshot.extend(local);
            if keys.is_some() {
                *snapshot = select(snapshot, keys);
            }
        }
        Ok(())
    }

    async fn fallback_set(&self, items: StoredSnapshot) -> Result<(), StorageError> {
        let mut journal = self.journal().await?;
        for key in items.keys() {
            journal.insert(key.clone(), Mark::Set);
        }
        let mut batch = items;
        batch.insert(journal_key(), encode(&journal)?);
        self.local.set(batch).await
    }

    async fn fallback_remove(&self, keys: &[String]) -> Result<(), StorageError> {
        let mut journal = self.journal().await?;
        self.local.remove(keys).await?;
        for key in keys {
            journal.insert(key.clone(), Mark::Removed);
        }
        self.local.set(single(journal_key(), encode(&journal)?)).await
    }

    /// Drop marks and local copies of keys the synced tier now holds authoritatively.
    async fn settle<'a>(&self, keys: impl IntoIterator<Item = &'a String>) {
        let result = async {
            let mut journal = self.journal().await?;
            let settled: Vec<String> = keys.into_iter().filter(|key| journal.shift_remove(*key).is_some()).cloned().collect();
            if settled.is_empty() {
                return Ok(settled);
            }
            self.local.remove(&settled).await?;
            if journal.is_empty() {
                self.local.remove(&[journal_key()]).await?;
            } else {
                self.local.set(single(journal_key(), encode(&journal)?)).await?;
            }
            Ok::<_, StorageError>(settled)
        }
        .await;
        match result {
            Ok(settled) if !settled.is_empty() => debug!(keys = ?settled, "settled local fallback entries"),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "unable to settle local fallback entries"),
        }
    }

    fn note_fallback(&self, op: &'static str, err: &StorageError) {
        STORAGE_FALLBACKS_TOTAL.with_label_values(&[op]).inc();
        warn!(op, error = %err, "synced storage failed; falling back to local tier");
    }
}

fn journal_key() -> String {
    LocalKey::SyncFallback.as_str().to_string()
}

fn single(key: String, value: serde_json::Value) -> StoredSnapshot {
    let mut snapshot = StoredSnapshot::new();
    snapshot.insert(key, value);
    snapshot
}

fn encode(journal: &Journal) -> Result<serde_json::Value, StorageError> {
    serde_json::to_value(journal).map_err(|e| StorageError::Encode(e.to_string()))
}

fn both_failed(op: &'static str, sync: StorageError, local: StorageError) -> StorageError {
    STORAGE_FAILURES_TOTAL.with_label_values(&[op]).inc();
    error!(op, sync_error = %sync, local_error = %local, "both storage tiers failed");
    StorageError::BothTiersFailed { sync: Box::new(sync), local: Box::new(local) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBackend;
    use serde_json::json;

    fn one(key: &str, value: serde_json::Value) -> StoredSnapshot {
        let mut s = StoredSnapshot::new();
        s.insert(key.to_string(), value);
        s
    }

    #[tokio::test]
    async fn writes_go_to_sync_when_available() {
        let sync = MemoryBackend::new(StorageTier::Sync);
        let local = MemoryBackend::new(StorageTier::Local);
        let store = TieredStore::new(sync.clone(), local.clone());

        store.set(one("ENABLED", json!(true))).await.unwrap();
        assert_eq!(sync.entries().await["ENABLED"], json!(true));
        assert!(local.entries().await.is_empty());
    }

    #[tokio::test]
    async fn every_operation_falls_back_to_local() {
        let sync = MemoryBackend::new(StorageTier::Sync);
        let local = MemoryBackend::new(StorageTier::Local);
        sync.set_available(false);
        let store = TieredStore::new(sync.clone(), local.clone());

        store.set(one("PREFS", json!({"showControlsOverlay": true}))).await.unwrap();
        let got = store.get(Some(&["PREFS".to_string()])).await.unwrap();
        assert_eq!(got["PREFS"]["showControlsOverlay"], json!(true));
        store.remove(&["PREFS".to_string()]).await.unwrap();
        assert!(!local.entries().await.contains_key("PREFS"));
        assert!(store.get_all().await.unwrap().is_empty());
        assert_eq!(sync.write_count(), 0);
    }

    #[tokio::test]
    async fn fallback_writes_read_back_once_sync_recovers() {
        let sync = MemoryBackend::with_entries(StorageTier::Sync, one("ENABLED", json!(true)));
        let local = MemoryBackend::new(StorageTier::Local);
        let store = TieredStore::new(sync.clone(), local.clone());

        sync.set_available(false);
        store.set(one("ENABLED", json!(false))).await.unwrap();
        store.set(one("GP_CONF:racing", json!({"keyConfig": {}}))).await.unwrap();
        sync.set_available(true);

        let all = store.get_all().await.unwrap();
        assert_eq!(all["ENABLED"], json!(false));
        assert!(all.contains_key("GP_CONF:racing"));
        assert!(!all.contains_key("SYNC_FALLBACK"));
        let some = store.get(Some(&["ENABLED".to_string()])).await.unwrap();
        assert_eq!(some.len(), 1);
        assert_eq!(some["ENABLED"], json!(false));
    }

    #[tokio::test]
    async fn fallback_removal_hides_the_synced_entry() {
        let sync = MemoryBackend::with_entries(StorageTier::Sync, one("GP_CONF:racing", json!({"keyConfig": {}})));
        let local = MemoryBackend::new(StorageTier::Local);
        let store = TieredStore::new(sync.clone(), local.clone());

        sync.set_available(false);
        store.remove(&["GP_CONF:racing".to_string()]).await.unwrap();
        sync.set_available(true);

        assert!(sync.entries().await.contains_key("GP_CONF:racing"));
        assert!(store.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn synced_writes_settle_fallback_entries() {
        let sync = MemoryBackend::new(StorageTier::Sync);
        let local = MemoryBackend::new(StorageTier::Local);
        let store = TieredStore::new(sync.clone(), local.clone());

        sync.set_available(false);
        store.set(one("PREFS", json!({"showControlsOverlay": true}))).await.unwrap();
        sync.set_available(true);
        store.set(one("PREFS", json!({"showControlsOverlay": false}))).await.unwrap();

        assert!(local.entries().await.is_empty());
        assert_eq!(store.get_all().await.unwrap()["PREFS"]["showControlsOverlay"], json!(false));
    }

    #[tokio::test]
    async fn burst_over_the_default_quota_stays_consistent() -> Result<(), anyhow::Error> {
        let dir = tempfile::tempdir()?;
        let cfg = StorageConfig { data_dir: dir.path().to_string_lossy().into_owned(), ..StorageConfig::default() };
        let store = TieredStore::open(&cfg).await?;

        for i in 0..130 {
            store.set(one(&format!("GP_CONF:p{i}"), json!({"keyConfig": {}}))).await?;
        }
        store.remove(&["GP_CONF:p129".to_string(), "GP_CONF:p0".to_string()]).await?;

        let all = store.get_all().await?;
        assert_eq!(all.len(), 128);
        assert!(all.contains_key("GP_CONF:p128"));
        assert!(!all.contains_key("GP_CONF:p129"));
        assert!(!all.contains_key("GP_CONF:p0"));
        Ok(())
    }

    #[tokio::test]
    async fn both_tiers_failing_is_fatal() {
        let sync = MemoryBackend::new(StorageTier::Sync);
        let local = MemoryBackend::new(StorageTier::Local);
        sync.set_available(false);
        local.set_available(false);
        let store = TieredStore::new(sync, local);

        let err = store.get_all().await.unwrap_err();
        assert!(matches!(err, StorageError::BothTiersFailed { .. }));
        assert!(err.to_string().starts_with("unable to access settings"));
    }
}
