use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use models::all_configs::ConfigMap;
use models::{AllConfigs, GamepadConfig, GlobalPrefs, PaymentRecord, DEFAULT_CONFIG_NAME};

use super::upgrade::upgrade_legacy_config;
use crate::storage::keys::{ConfigKey, SyncKey};
use crate::storage::StoredSnapshot;

/// Build the structured view of a synced-tier snapshot.
///
/// Total: malformed values read as absent and undecodable config entries are
/// skipped. Legacy installs without an explicit enabled flag count as enabled
/// when they ever persisted an active config name. Onboarding counts as seen
/// when it was stored, or when there are signs of customization (more than one
/// stored config, or a non-default active config).
pub fn normalize(snapshot: &StoredSnapshot) -> AllConfigs {
    let cid = field(snapshot, SyncKey::ClientId).and_then(non_empty_str).map(str::to_owned);
    let stored_active = field(snapshot, SyncKey::ActiveConfig).and_then(non_empty_str);
    let active_config = stored_active.unwrap_or(DEFAULT_CONFIG_NAME).to_string();
    let payment: Option<PaymentRecord> = field(snapshot, SyncKey::Payment).and_then(|v| decode(SyncKey::Payment.as_str(), v));
    let prefs: GlobalPrefs = field(snapshot, SyncKey::GlobalPrefs)
        .and_then(|v| decode(SyncKey::GlobalPrefs.as_str(), v))
        .unwrap_or_default();
    let is_enabled = match field(snapshot, SyncKey::Enabled).and_then(Value::as_bool) {
        Some(enabled) => enabled,
        None => stored_active.is_some(),
    };
    let onboarded = field(snapshot, SyncKey::Onboarded).and_then(Value::as_bool).unwrap_or(false);

    let mut configs = ConfigMap::new();
    configs.insert(DEFAULT_CONFIG_NAME.to_string(), GamepadConfig::builtin());
    let mut stored_configs = 0usize;
    for (key, value) in snapshot {
        let Some(name) = ConfigKey::parse(key) else { continue };
        stored_configs += 1;
        let mut value = value.clone();
        upgrade_legacy_config(&mut value);
        if let Some(config) = decode::<GamepadConfig>(key, &value) {
            configs.insert(name.to_string(), config);
        }
    }

    let seen_onboarding = onboarded || stored_configs > 1 || active_config != DEFAULT_CONFIG_NAME;

    AllConfigs { cid, is_enabled, payment, seen_onboarding, active_config, configs, prefs }
}

/// Flatten `all` back into storage items, one key per field.
///
/// The default config is only written when it differs from the built-in one,
/// so `normalize(&to_snapshot(&normalize(s))) == normalize(s)`.
pub fn to_snapshot(all: &AllConfigs) -> StoredSnapshot {
    let mut out = StoredSnapshot::new();
    if let Some(cid) = &all.cid {
        out.insert(SyncKey::ClientId.as_str().into(), Value::from(cid.as_str()));
    }
    let builtin = GamepadConfig::builtin();
    for (name, config) in &all.configs {
        if name == DEFAULT_CONFIG_NAME && *config == builtin {
            continue;
        }
        if let Ok(key) = ConfigKey::new(name) {
            out.insert(key.into_string(), config.to_value());
        }
    }
    out.insert(SyncKey::ActiveConfig.as_str().into(), Value::from(all.active_config.as_str()));
    out.insert(SyncKey::Enabled.as_str().into(), Value::Bool(all.is_enabled));
    if let Some(payment) = &all.payment {
        if let Ok(v) = serde_json::to_value(payment) {
            out.insert(SyncKey::Payment.as_str().into(), v);
        }
    }
    out.insert(SyncKey::Onboarded.as_str().into(), Value::Bool(all.seen_onboarding));
    if let Ok(v) = serde_json::to_value(&all.prefs) {
        out.insert(SyncKey::GlobalPrefs.as_str().into(), v);
    }
    out
}

fn field(snapshot: &StoredSnapshot, key: SyncKey) -> Option<&Value> {
    snapshot.get(key.as_str())
}

fn non_empty_str(v: &Value) -> Option<&str> {
    v.as_str().filter(|s| !s.is_empty())
}

fn decode<T: DeserializeOwned>(key: &str, value: &Value) -> Option<T> {
    match serde_json::from_value(value.clone()) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(key, error = %e, "ignoring malformed stored value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use models::gamepad::{GamepadInput, KeyBinding};
    use serde_json::json;

    fn snapshot(pairs: &[(&str, Value)]) -> StoredSnapshot {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn custom_config(key: &str) -> Value {
        json!({"keyConfig": {"a": key}, "mouseConfig": {"mouseControls": 1, "sensitivity": 5}})
    }

    #[test]
    fn empty_snapshot_yields_only_defaults() {
        let all = normalize(&StoredSnapshot::new());
        assert_eq!(all.configs.len(), 1);
        assert_eq!(all.configs[DEFAULT_CONFIG_NAME], GamepadConfig::builtin());
        assert_eq!(all.active_config, DEFAULT_CONFIG_NAME);
        assert!(!all.is_enabled);
        assert!(!all.seen_onboarding);
        assert_eq!(all.prefs, GlobalPrefs::default());
        assert_eq!(all.cid, None);
        assert_eq!(all.payment, None);
    }

    #[test]
    fn legacy_install_with_active_name_counts_as_enabled() {
        let all = normalize(&snapshot(&[("ACTIVE_GP_CONF", json!("default"))]));
        assert!(all.is_enabled);
        let all = normalize(&snapshot(&[("ACTIVE_GP_CONF", json!("default")), ("ENABLED", json!(false))]));
        assert!(!all.is_enabled);
    }

    #[test]
    fn onboarding_is_inferred_from_customization() {
        let two_configs = snapshot(&[("GP_CONF:a", custom_config("KeyA")), ("GP_CONF:b", custom_config("KeyB"))]);
        assert!(normalize(&two_configs).seen_onboarding);

        let non_default_active = snapshot(&[("GP_CONF:a", custom_config("KeyA")), ("ACTIVE_GP_CONF", json!("a"))]);
        assert!(normalize(&non_default_active).seen_onboarding);

        let single_config = snapshot(&[("GP_CONF:a", custom_config("KeyA"))]);
        assert!(!normalize(&single_config).seen_onboarding);

        let explicit = snapshot(&[("ONBOARDED", json!(true))]);
        assert!(normalize(&explicit).seen_onboarding);
    }

    #[test]
    fn default_is_first_and_can_be_overridden() {
        let all = normalize(&snapshot(&[
            ("GP_CONF:zeta", custom_config("KeyZ")),
            ("GP_CONF:default", custom_config("KeyD")),
            ("GP_CONF:alpha", custom_config("KeyA")),
        ]));
        let names: Vec<&str> = all.configs.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["default", "zeta", "alpha"]);
        assert_eq!(
            all.configs["default"].key_config.get(GamepadInput::A),
            Some(&KeyBinding::Single("KeyD".into()))
        );
    }

    #[test]
    fn legacy_configs_are_upgraded_and_malformed_ones_skipped() {
        let all = normalize(&snapshot(&[
            ("GP_CONF:old", json!({"keyConfig": {"a": "KeyJ"}})),
            ("GP_CONF:broken", json!("not a config")),
            ("PREFS", json!(42)),
        ]));
        assert_eq!(all.configs["old"].mouse_config.sensitivity, 10.0);
        assert!(!all.configs.contains_key("broken"));
        assert_eq!(all.prefs, GlobalPrefs::default());
    }

    #[test]
    fn normalize_is_idempotent_through_storage() {
        let samples = vec![
            StoredSnapshot::new(),
            snapshot(&[("GP_CONF:a", custom_config("KeyA"))]),
            snapshot(&[("GP_CONF:default", custom_config("KeyD"))]),
            snapshot(&[("GP_CONF:broken", json!(1))]),
            snapshot(&[("GP_CONF: ", custom_config("KeyW"))]),
            snapshot(&[("GP_CONF: ", custom_config("KeyW")), ("GP_CONF:  ", custom_config("KeyX"))]),
            snapshot(&[
                ("CID", json!("cid-1")),
                ("GP_CONF:a", json!({"keyConfig": {"b": ["KeyQ", "KeyE"]}})),
                ("GP_CONF:b", custom_config("KeyB")),
                ("ACTIVE_GP_CONF", json!("b")),
                ("PAYMENT", json!({"paid": false, "paidAt": null, "installedAt": 1, "trialStartedAt": 2})),
                ("PREFS", json!({"showControlsOverlay": true})),
            ]),
            snapshot(&[("ACTIVE_GP_CONF", json!("missing")), ("ONBOARDED", json!(false))]),
        ];
        for s in samples {
            let once = normalize(&s);
            let twice = normalize(&to_snapshot(&once));
            assert_eq!(twice, once, "snapshot {s:?}");
        }
    }
}
