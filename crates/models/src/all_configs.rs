use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::gamepad::GamepadConfig;
use crate::payment::PaymentRecord;
use crate::prefs::GlobalPrefs;

/// Ordered name → config map. The reserved default entry comes first.
pub type ConfigMap = IndexMap<String, GamepadConfig>;

/// Aggregate view over everything kept in the synced tier.
///
/// Rebuilt from a storage snapshot on every read; each field lives under its own key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllConfigs {
    pub cid: Option<String>,
    pub is_enabled: bool,
    pub payment: Option<PaymentRecord>,
    pub seen_onboarding: bool,
    pub active_config: String,
    pub configs: ConfigMap,
    pub prefs: GlobalPrefs,
}

impl AllConfigs {
    pub fn config(&self, name: &str) -> Option<&GamepadConfig> {
        self.configs.get(name)
    }

    pub fn active(&self) -> Option<&GamepadConfig> {
        self.configs.get(&self.active_config)
    }

    pub fn is_active(&self, name: &str) -> bool {
        self.active_config == name
    }

    /// Case-insensitive name lookup, used to reject duplicate names on create.
    pub fn is_name_taken(&self, name: &str) -> bool {
        let wanted = name.to_lowercase();
        self.configs.keys().any(|existing| existing.to_lowercase() == wanted)
    }
}
