//! Storage key scheme.
//!
//! Single-value fields use fixed keys. Gamepad configs form a sub-collection
//! inside the flat synced area: each one lives under
//! `"<CONFIG_PREFIX><KEY_SEPARATOR><name>"`. The name is everything after the
//! first separator, so names may themselves contain the separator.

use models::DEFAULT_CONFIG_NAME;

use crate::errors::ServiceError;

pub const CONFIG_PREFIX: &str = "GP_CONF";
pub const KEY_SEPARATOR: char = ':';

/// Keys stored in the synced tier (with local fallback).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncKey {
    ClientId,
    ActiveConfig,
    Enabled,
    Payment,
    Onboarded,
    GlobalPrefs,
}

impl SyncKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncKey::ClientId => "CID",
            SyncKey::ActiveConfig => "ACTIVE_GP_CONF",
            SyncKey::Enabled => "ENABLED",
            SyncKey::Payment => "PAYMENT",
            SyncKey::Onboarded => "ONBOARDED",
            SyncKey::GlobalPrefs => "PREFS",
        }
    }
}

/// Keys that only ever live in the local tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalKey {
    GameName,
    Session,
    /// Keys whose latest write or removal only reached the local tier.
    SyncFallback,
}

impl LocalKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocalKey::GameName => "GAME_NAME",
            LocalKey::Session => "SESSION",
            LocalKey::SyncFallback => "SYNC_FALLBACK",
        }
    }
}

/// Storage key of one gamepad config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigKey(String);

impl ConfigKey {
    pub fn new(name: &str) -> Result<Self, ServiceError> {
        if name.trim().is_empty() {
            return Err(ServiceError::Validation("config name must not be empty".into()));
        }
        Ok(Self(format!("{CONFIG_PREFIX}{KEY_SEPARATOR}{name}")))
    }

    /// Key of a config that may be removed; the reserved default is refused.
    pub fn removable(name: &str) -> Result<Self, ServiceError> {
        if name == DEFAULT_CONFIG_NAME {
            return Err(ServiceError::ReservedConfig(name.to_string()));
        }
        Self::new(name)
    }

    /// Config name embedded in `key`, if `key` belongs to the config namespace
    /// and the name is one [`ConfigKey::new`] accepts.
    pub fn parse(key: &str) -> Option<&str> {
        key.strip_prefix(CONFIG_PREFIX)?
            .strip_prefix(KEY_SEPARATOR)
            .filter(|name| !name.trim().is_empty())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}
