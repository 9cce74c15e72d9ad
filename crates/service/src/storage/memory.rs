use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{select, KvBackend, StorageError, StorageTier, StoredSnapshot};

/// In-memory storage area that can be switched offline to exercise the
/// tier fallback.
pub struct MemoryBackend {
    tier: StorageTier,
    map: RwLock<StoredSnapshot>,
    available: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryBackend {
    pub fn new(tier: StorageTier) -> Arc<Self> {
        Self::with_entries(tier, StoredSnapshot::new())
    }

    pub fn with_entries(tier: StorageTier, entries: StoredSnapshot) -> Arc<Self> {
        Arc::new(Self {
            tier,
            map: RwLock::new(entries),
            available: AtomicBool::new(true),
            writes: AtomicUsize::new(0),
        })
    }

    /// Make every subsequent operation fail with [`StorageError::Unavailable`] (or succeed again).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of successful `set`/`remove` calls.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub async fn entries(&self) -> StoredSnapshot {
        self.map.read().await.clone()
    }

    fn check(&self) -> Result<(), StorageError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::Unavailable { tier: self.tier })
        }
    }
}

#[async_trait]
impl KvBackend for MemoryBackend {
    fn tier(&self) -> StorageTier {
        self.tier
    }

    async fn get(&self, keys: Option<&[String]>) -> Result<StoredSnapshot, StorageError> {
        self.check()?;
        Ok(select(&*self.map.read().await, keys))
    }

    async fn set(&self, items: StoredSnapshot) -> Result<(), StorageError> {
        self.check()?;
        self.map.write().await.extend(items);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn remove(&self, keys: &[String]) -> Result<(), StorageError> {
        self.check()?;
        let mut map = self.map.write().await;
        for key in keys {
            map.shift_remove(key);
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
