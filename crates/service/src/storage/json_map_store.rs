use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::{fs, sync::RwLock};
use tracing::debug;

use super::quota::{Quota, QuotaLimits};
use super::{select, KvBackend, StorageError, StorageTier, StoredSnapshot};

struct State {
    map: StoredSnapshot,
    quota: Option<Quota>,
}

/// JSON file-backed storage area.
///
/// Keeps the whole area in memory and rewrites the file after every
/// mutation. Entry order survives reloads. With [`QuotaLimits`] it behaves
/// like the synced tier and rejects writes beyond the limits.
pub struct JsonMapStore {
    tier: StorageTier,
    inner: RwLock<State>,
    file_path: PathBuf,
}

impl JsonMapStore {
    /// Open the area stored at `path`. Creates the file with an empty map if missing.
    pub async fn open<P: Into<PathBuf>>(
        path: P,
        tier: StorageTier,
        limits: Option<QuotaLimits>,
    ) -> Result<Arc<Self>, StorageError> {
        let file_path = path.into();
        let io = |e: std::io::Error| StorageError::Io { tier, reason: e.to_string() };
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).await.ok();
        }

        let map: StoredSnapshot = match fs::read(&file_path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_default(),
            Err(_) => {
                let empty = StoredSnapshot::new();
                let bytes = serde_json::to_vec(&empty).map_err(|e| StorageError::Encode(e.to_string()))?;
                fs::write(&file_path, bytes).await.map_err(io)?;
                empty
            }
        };

        Ok(Arc::new(Self {
            tier,
            inner: RwLock::new(State { map, quota: limits.map(Quota::new) }),
            file_path,
        }))
    }

    async fn save(&self, map: &StoredSnapshot) -> Result<(), StorageError> {
        let data = serde_json::to_vec(map).map_err(|e| StorageError::Encode(e.to_string()))?;
        fs::write(&self.file_path, data)
            .await
            .map_err(|e| StorageError::Io { tier: self.tier, reason: e.to_string() })
    }

    /// Persist `next` and swap it in; the in-memory map is untouched when the write fails.
    async fn commit(&self, state: &mut State, next: StoredSnapshot) -> Result<(), StorageError> {
        self.save(&next).await?;
        state.map = next;
        Ok(())
    }
}

#[async_trait]
impl KvBackend for JsonMapStore {
    fn tier(&self) -> StorageTier {
        self.tier
    }

    async fn get(&self, keys: Option<&[String]>) -> Result<StoredSnapshot, StorageError> {
        let state = self.inner.read().await;
        Ok(select(&state.map, keys))
    }

    async fn set(&self, items: StoredSnapshot) -> Result<(), StorageError> {
        let mut state = self.inner.write().await;
        let State { map, quota } = &mut *state;
        if let Some(quota) = quota {
            quota.admit_set(self.tier, map, &items)?;
        }
        let mut next = map.clone();
        next.extend(items);
        self.commit(&mut state, next).await?;
        debug!(tier = %self.tier, "storage set committed");
        Ok(())
    }

    async fn remove(&self, keys: &[String]) -> Result<(), StorageError> {
        let mut state = self.inner.write().await;
        if let Some(quota) = state.quota.as_mut() {
            quota.admit_write(self.tier)?;
        }
        let mut next = state.map.clone();
        for key in keys {
            next.shift_remove(key);
        }
        self.commit(&mut state, next).await
    }
}
