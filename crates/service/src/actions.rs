//! Operations behind the popup.

use serde::Serialize;
use serde_json::json;
use tracing::{info, instrument};

use models::messages::OutboundMessage;
use models::{AllConfigs, GamepadConfig, GlobalPrefs, PaymentRecord, TrialState, DEFAULT_CONFIG_NAME};

use crate::analytics::AnalyticsEvent;
use crate::errors::ServiceError;
use crate::payment::PaymentPage;
use crate::runtime::Background;
use crate::storage::keys::ConfigKey;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStatus {
    pub game_name: Option<String>,
}

#[derive(Clone)]
pub struct ConfigActions {
    bg: Background,
}

impl ConfigActions {
    pub fn new(bg: Background) -> Self {
        Self { bg }
    }

    pub async fn fetch_all(&self) -> Result<AllConfigs, ServiceError> {
        self.bg.store().load_all().await
    }

    /// `refresh` bypasses the cache and asks the provider.
    pub async fn fetch_payment(&self, refresh: bool) -> Result<PaymentRecord, ServiceError> {
        if refresh {
            self.bg.payments().refresh().await
        } else {
            self.bg.payments().get_if_needed().await
        }
    }

    pub async fn trial_state(&self) -> Result<TrialState, ServiceError> {
        let payment = self.bg.payments().get_if_needed().await?;
        Ok(self.bg.payments().trial_state(&payment))
    }

    pub async fn game_status(&self) -> Result<GameStatus, ServiceError> {
        Ok(GameStatus { game_name: self.bg.store().game_name().await? })
    }

    #[instrument(skip(self))]
    pub async fn activate(&self, name: &str) -> Result<(), ServiceError> {
        let all = self.bg.store().load_all().await?;
        let config = all.config(name).ok_or_else(|| ServiceError::MissingConfig(name.to_string()))?;
        let payment = self.bg.payments().get_if_needed().await?;
        if !self.bg.payments().is_allowed(&payment) {
            return Err(ServiceError::NotAllowed);
        }
        self.bg.analytics().track(AnalyticsEvent::SwitchConfig, json!({"name": name}));
        self.bg.set_active_config(name, config).await
    }

    pub async fn disable(&self) -> Result<(), ServiceError> {
        self.bg.analytics().track(AnalyticsEvent::DisableConfig, json!({}));
        self.bg.disable_active_config().await
    }

    /// Delete `name`. Deleting the active config switches to the default one; the
    /// delete itself goes through even when that switch is refused.
    #[instrument(skip(self))]
    pub async fn delete(&self, name: &str) -> Result<(), ServiceError> {
        ConfigKey::removable(name)?;
        let all = self.bg.store().load_all().await?;
        if !all.configs.contains_key(name) {
            return Err(ServiceError::MissingConfig(name.to_string()));
        }
        self.bg.analytics().track(AnalyticsEvent::ModifyConfig, json!({"name": name, "action": "delete"}));

        let switched = if all.is_active(name) { self.activate(DEFAULT_CONFIG_NAME).await } else { Ok(()) };
        self.bg.store().delete_gamepad_config(name).await?;
        info!(name, "gamepad config deleted");
        switched
    }

    /// Replace the stored config `name`, pushing it to pages first when it is the active one.
    #[instrument(skip(self, config))]
    pub async fn modify(&self, name: &str, config: GamepadConfig) -> Result<(), ServiceError> {
        self.bg.analytics().track(AnalyticsEvent::ModifyConfig, json!({"name": name, "action": "update"}));
        let all = self.bg.store().load_all().await?;
        if all.is_active(name) {
            self.bg.bridge().send_to_pages(&OutboundMessage::ActivateGamepadConfig {
                name: name.to_string(),
                config: config.clone(),
            });
        }
        self.bg.store().store_gamepad_config(name, &config).await
    }

    /// Store a new config under an unused name, from `template` or the built-in default.
    #[instrument(skip(self, template))]
    pub async fn create(&self, name: &str, template: Option<GamepadConfig>) -> Result<GamepadConfig, ServiceError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::Validation("config name must not be empty".into()));
        }
        let all = self.bg.store().load_all().await?;
        if all.is_name_taken(name) {
            return Err(ServiceError::Conflict(name.to_string()));
        }
        let config = template.unwrap_or_else(GamepadConfig::builtin);
        self.bg.store().store_gamepad_config(name, &config).await?;
        info!(name, "gamepad config created");
        Ok(config)
    }

    pub async fn update_prefs(&self, prefs: GlobalPrefs) -> Result<(), ServiceError> {
        self.bg.analytics().track(AnalyticsEvent::UpdatePrefs, json!({"showControlsOverlay": prefs.show_controls_overlay}));
        self.bg.bridge().send_to_pages(&OutboundMessage::UpdatePrefs { prefs: prefs.clone() });
        self.bg.store().store_global_prefs(&prefs).await
    }

    /// Open a payment provider page and close the popup. Returns the opened URL.
    pub fn open_payment_page(&self, page: PaymentPage) -> String {
        let (title, location) = match page {
            PaymentPage::Trial => ("Trial page", "/popup/upsell/trial"),
            PaymentPage::Payment => ("Payment page", "/popup/upsell/payment"),
            PaymentPage::Login => ("Login page", "/popup/upsell/login"),
        };
        let analytics = self.bg.analytics();
        analytics.track(AnalyticsEvent::PageView, json!({"page_title": title, "page_location": location}));
        if page == PaymentPage::Payment {
            analytics.track(
                AnalyticsEvent::BeginCheckout,
                json!({"currency": "USD", "value": 0.0, "items": [{"item_name": "Full Version"}]}),
            );
        }
        let url = self.bg.payments().page_url(page);
        self.bg.bridge().open_url(&url);
        self.bg.bridge().send_to_popup(&OutboundMessage::CloseWindow);
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use models::gamepad::{GamepadInput, KeyBinding};

    use crate::config::ConfigStore;
    use crate::storage::{MemoryBackend, QuotaLimits, TieredStore};
    use crate::test_support::{memory_store, quota_store, RecordingAnalytics, RecordingBridge, StaticPaymentProvider};
    use crate::trial::TrialPolicy;

    struct Fixture {
        actions: ConfigActions,
        store: ConfigStore,
        sync: Arc<MemoryBackend>,
        local: Arc<MemoryBackend>,
        bridge: Arc<RecordingBridge>,
        analytics: Arc<RecordingAnalytics>,
    }

    fn fixture(paid: bool) -> Fixture {
        let (store, sync, local) = memory_store();
        let bridge = RecordingBridge::new();
        let analytics = RecordingAnalytics::new();
        let provider = StaticPaymentProvider::new(PaymentRecord { paid, paid_at: None, installed_at: 0, trial_started_at: None });
        let bg = Background::new(store.clone(), provider, analytics.clone(), bridge.clone(), TrialPolicy::default());
        Fixture { actions: bg.actions(), store, sync, local, bridge, analytics }
    }

    fn paid_actions(store: ConfigStore) -> ConfigActions {
        let provider = StaticPaymentProvider::new(PaymentRecord { paid: true, paid_at: None, installed_at: 0, trial_started_at: None });
        Background::new(store, provider, RecordingAnalytics::new(), RecordingBridge::new(), TrialPolicy::default()).actions()
    }

    fn names(all: &AllConfigs) -> Vec<&str> {
        all.configs.keys().map(String::as_str).collect()
    }

    fn custom() -> GamepadConfig {
        let mut config = GamepadConfig::builtin();
        config.key_config.bind(GamepadInput::A, KeyBinding::from("KeyJ"));
        config
    }

    #[tokio::test]
    async fn deleting_default_is_refused_without_writes() {
        let f = fixture(true);
        let err = f.actions.delete(DEFAULT_CONFIG_NAME).await.unwrap_err();
        assert!(matches!(err, ServiceError::ReservedConfig(_)));
        assert_eq!(f.sync.write_count() + f.local.write_count(), 0);
        assert!(f.analytics.events().is_empty());
    }

    #[tokio::test]
    async fn deleting_the_active_config_falls_back_to_default() {
        let f = fixture(true);
        f.store.store_gamepad_config("racing", &custom()).await.unwrap();
        f.store.store_active_gamepad_config("racing").await.unwrap();

        f.actions.delete("racing").await.unwrap();
        let all = f.actions.fetch_all().await.unwrap();
        assert_eq!(all.active_config, DEFAULT_CONFIG_NAME);
        assert!(!all.configs.contains_key("racing"));
        assert!(f.analytics.names().contains(&"modify_config"));
    }

    #[tokio::test]
    async fn activation_requires_existing_config_and_entitlement() {
        let f = fixture(false);
        let err = f.actions.activate("nope").await.unwrap_err();
        assert!(matches!(err, ServiceError::MissingConfig(_)));
        let err = f.actions.activate(DEFAULT_CONFIG_NAME).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotAllowed));
        assert!(f.bridge.page_messages().is_empty());
    }

    #[tokio::test]
    async fn activate_and_disable_notify_pages() {
        let f = fixture(true);
        f.actions.activate(DEFAULT_CONFIG_NAME).await.unwrap();
        f.actions.disable().await.unwrap();
        let msgs = f.bridge.page_messages();
        assert!(matches!(&msgs[0], OutboundMessage::ActivateGamepadConfig { name, .. } if name == DEFAULT_CONFIG_NAME));
        assert_eq!(msgs[1], OutboundMessage::DisableGamepad);
        assert!(!f.actions.fetch_all().await.unwrap().is_enabled);
        assert_eq!(f.analytics.names(), vec!["switch_config", "disable_config"]);
    }

    #[tokio::test]
    async fn modifying_the_active_config_pushes_it_live() {
        let f = fixture(true);
        f.store.store_gamepad_config("racing", &GamepadConfig::builtin()).await.unwrap();
        f.actions.modify("racing", custom()).await.unwrap();
        assert!(f.bridge.page_messages().is_empty());

        f.store.store_active_gamepad_config("racing").await.unwrap();
        f.actions.modify("racing", custom()).await.unwrap();
        assert_eq!(f.bridge.page_messages().len(), 1);
        assert_eq!(f.actions.fetch_all().await.unwrap().configs["racing"], custom());
    }

    #[tokio::test]
    async fn create_rejects_empty_and_taken_names() {
        let f = fixture(true);
        assert!(matches!(f.actions.create("  ", None).await, Err(ServiceError::Validation(_))));
        assert!(matches!(f.actions.create("Default", None).await, Err(ServiceError::Conflict(_))));

        let created = f.actions.create("Shooter", Some(custom())).await.unwrap();
        assert_eq!(created, custom());
        assert!(matches!(f.actions.create("shooter", None).await, Err(ServiceError::Conflict(_))));
    }

    #[tokio::test]
    async fn prefs_are_broadcast_and_stored() {
        let f = fixture(true);
        let prefs = GlobalPrefs { show_controls_overlay: true };
        f.actions.update_prefs(prefs.clone()).await.unwrap();
        assert_eq!(f.actions.fetch_all().await.unwrap().prefs, prefs);
        assert_eq!(f.bridge.page_messages(), vec![OutboundMessage::UpdatePrefs { prefs }]);
    }

    #[tokio::test]
    async fn payment_pages_open_and_close_popup() {
        let f = fixture(false);
        let url = f.actions.open_payment_page(PaymentPage::Payment);
        assert_eq!(url, "https://pay.test/choose-plan");
        assert_eq!(f.bridge.opened_urls(), vec![url]);
        assert_eq!(f.bridge.popup_messages(), vec![OutboundMessage::CloseWindow]);
        assert_eq!(f.analytics.names(), vec!["page_view", "begin_checkout"]);
    }

    #[tokio::test]
    async fn game_status_reads_local_tier() {
        let f = fixture(true);
        assert_eq!(f.actions.game_status().await.unwrap(), GameStatus { game_name: None });
        f.store.update_game_name(Some("Halo")).await.unwrap();
        assert_eq!(f.actions.game_status().await.unwrap().game_name.as_deref(), Some("Halo"));
        assert_eq!(f.actions.trial_state().await.unwrap(), TrialState::Inactive);
    }
    #[tokio::test]
    async fn edits_over_the_default_sync_quota_take_effect() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let cfg = configs::StorageConfig { data_dir: dir.path().to_string_lossy().into_owned(), ..Default::default() };
        let actions = paid_actions(ConfigStore::new(TieredStore::open(&cfg).await?));

        actions.create("a", None).await?;
        actions.create("b", None).await?;
        actions.delete("b").await?;
        assert_eq!(names(&actions.fetch_all().await?), vec![DEFAULT_CONFIG_NAME, "a"]);
        Ok(())
    }

    #[tokio::test]
    async fn rate_limited_sync_writes_fall_back_and_read_back() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let limits = QuotaLimits { max_items: 512, max_bytes_per_item: 8192, max_writes_per_minute: 1 };
        let actions = paid_actions(quota_store(dir.path(), limits).await?);

        actions.create("a", None).await?;
        actions.create("b", Some(custom())).await?;
        let all = actions.fetch_all().await?;
        assert_eq!(names(&all), vec![DEFAULT_CONFIG_NAME, "a", "b"]);
        assert_eq!(all.configs["b"], custom());

        actions.delete("a").await?;
        actions.delete("b").await?;
        assert_eq!(names(&actions.fetch_all().await?), vec![DEFAULT_CONFIG_NAME]);
        Ok(())
    }

    #[tokio::test]
    async fn configs_beyond_the_sync_item_limit_stay_usable() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let limits = QuotaLimits { max_items: 1, max_bytes_per_item: 8192, max_writes_per_minute: 120 };
        let actions = paid_actions(quota_store(dir.path(), limits).await?);

        actions.create("a", None).await?;
        actions.create("b", None).await?;
        actions.activate("b").await?;
        let all = actions.fetch_all().await?;
        assert_eq!(names(&all), vec![DEFAULT_CONFIG_NAME, "a", "b"]);
        assert_eq!(all.active_config, "b");
        assert!(all.is_enabled);
        Ok(())
    }
}
