use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument};

use models::session::Session;
use models::{AllConfigs, GamepadConfig, GlobalPrefs, PaymentRecord};

use super::normalize::normalize;
use crate::errors::ServiceError;
use crate::storage::keys::{ConfigKey, LocalKey, SyncKey};
use crate::storage::{KvBackend, StorageError, StoredSnapshot, TieredStore};

/// Typed operations over the tiered store.
///
/// Synced keys go through the tier fallback; local-only keys (game name,
/// analytics session) go straight to the local tier. Nothing is cached here:
/// every read hits the backend.
#[derive(Clone)]
pub struct ConfigStore {
    store: TieredStore,
}

impl ConfigStore {
    pub fn new(store: TieredStore) -> Self {
        Self { store }
    }

    /// Read the whole synced area and normalize it.
    pub async fn load_all(&self) -> Result<AllConfigs, ServiceError> {
        let snapshot = self.store.get_all().await?;
        Ok(normalize(&snapshot))
    }

    pub async fn seen_onboarding(&self) -> Result<bool, ServiceError> {
        Ok(self.load_all().await?.seen_onboarding)
    }

    pub async fn store_seen_onboarding(&self) -> Result<(), ServiceError> {
        self.set_one(SyncKey::Onboarded.as_str(), &true).await
    }

    /// Update a config by name without activating it.
    #[instrument(skip(self, config))]
    pub async fn store_gamepad_config(&self, name: &str, config: &GamepadConfig) -> Result<(), ServiceError> {
        let key = ConfigKey::new(name)?;
        self.set_one(key.as_str(), config).await
    }

    /// Delete a config. The reserved default is refused before storage is touched.
    /// Callers are responsible for not leaving a deleted config active.
    #[instrument(skip(self))]
    pub async fn delete_gamepad_config(&self, name: &str) -> Result<(), ServiceError> {
        let key = ConfigKey::removable(name)?;
        self.store.remove(&[key.into_string()]).await?;
        debug!(name, "gamepad config deleted");
        Ok(())
    }

    pub async fn store_enabled(&self, enabled: bool) -> Result<(), ServiceError> {
        self.set_one(SyncKey::Enabled.as_str(), &enabled).await
    }

    pub async fn store_global_prefs(&self, prefs: &GlobalPrefs) -> Result<(), ServiceError> {
        self.set_one(SyncKey::GlobalPrefs.as_str(), prefs).await
    }

    /// Mark `name` active; also turns remapping on. The name is not checked against stored configs.
    #[instrument(skip(self))]
    pub async fn store_active_gamepad_config(&self, name: &str) -> Result<(), ServiceError> {
        let mut items = StoredSnapshot::new();
        items.insert(SyncKey::Enabled.as_str().into(), Value::Bool(true));
        items.insert(SyncKey::ActiveConfig.as_str().into(), Value::from(name));
        self.store.set(items).await?;
        Ok(())
    }

    pub async fn store_client_id(&self, client_id: &str) -> Result<(), ServiceError> {
        self.set_one(SyncKey::ClientId.as_str(), &client_id).await
    }

    pub async fn client_id(&self) -> Result<Option<String>, ServiceError> {
        let snapshot = self.store.get(Some(&[SyncKey::ClientId.as_str().to_string()])).await?;
        Ok(snapshot
            .get(SyncKey::ClientId.as_str())
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_owned))
    }

    pub async fn store_payment(&self, payment: &PaymentRecord) -> Result<(), ServiceError> {
        self.set_one(SyncKey::Payment.as_str(), payment).await
    }

    pub async fn payment(&self) -> Result<Option<PaymentRecord>, ServiceError> {
        let snapshot = self.store.get(Some(&[SyncKey::Payment.as_str().to_string()])).await?;
        Ok(snapshot.get(SyncKey::Payment.as_str()).and_then(decode_lenient))
    }

    pub async fn update_game_name(&self, game_name: Option<&str>) -> Result<(), ServiceError> {
        self.set_local(LocalKey::GameName, &game_name).await
    }

    pub async fn game_name(&self) -> Result<Option<String>, ServiceError> {
        let value = self.get_local(LocalKey::GameName).await?;
        Ok(value.as_ref().and_then(Value::as_str).filter(|s| !s.is_empty()).map(str::to_owned))
    }

    pub async fn store_session(&self, session: &Session) -> Result<(), ServiceError> {
        self.set_local(LocalKey::Session, session).await
    }

    pub async fn session(&self) -> Result<Option<Session>, ServiceError> {
        let value = self.get_local(LocalKey::Session).await?;
        Ok(value.as_ref().and_then(decode_lenient))
    }

    async fn set_one<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), ServiceError> {
        let mut items = StoredSnapshot::new();
        items.insert(key.to_string(), encode(value)?);
        self.store.set(items).await?;
        Ok(())
    }

    async fn set_local<T: Serialize + ?Sized>(&self, key: LocalKey, value: &T) -> Result<(), ServiceError> {
        let mut items = StoredSnapshot::new();
        items.insert(key.as_str().to_string(), encode(value)?);
        self.store.local().set(items).await?;
        Ok(())
    }

    async fn get_local(&self, key: LocalKey) -> Result<Option<Value>, ServiceError> {
        let mut snapshot = self.store.local().get(Some(&[key.as_str().to_string()])).await?;
        Ok(snapshot.shift_remove(key.as_str()))
    }
}

fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Value, ServiceError> {
    serde_json::to_value(value).map_err(|e| ServiceError::Storage(StorageError::Encode(e.to_string())))
}

fn decode_lenient<T: DeserializeOwned>(value: &Value) -> Option<T> {
    serde_json::from_value(value.clone()).ok()
}
