//! Process-wide collaborators shared by the message router and the popup actions.
//!
//! Nothing here holds configuration state: every decision re-reads storage.
//! The only caches are the payment record and the analytics ids, both rebuilt
//! lazily from storage after a restart.

use std::sync::Arc;

use tracing::{debug, info};

use configs::AppConfig;
use models::messages::OutboundMessage;
use models::GamepadConfig;

use crate::actions::ConfigActions;
use crate::analytics::{Analytics, MeasurementClient};
use crate::bridge::PageBridge;
use crate::config::ConfigStore;
use crate::errors::ServiceError;
use crate::payment::{ExtPayClient, PaymentProvider, PaymentService};
use crate::router::MessageRouter;
use crate::storage::TieredStore;
use crate::trial::TrialPolicy;

#[derive(Clone)]
pub struct Background {
    store: ConfigStore,
    payments: Arc<PaymentService>,
    analytics: Arc<dyn Analytics>,
    bridge: Arc<dyn PageBridge>,
}

impl Background {
    pub fn new(
        store: ConfigStore,
        provider: Arc<dyn PaymentProvider>,
        analytics: Arc<dyn Analytics>,
        bridge: Arc<dyn PageBridge>,
        policy: TrialPolicy,
    ) -> Self {
        let payments = Arc::new(PaymentService::new(provider, store.clone(), analytics.clone(), policy));
        Self { store, payments, analytics, bridge }
    }

    /// Wire file-backed storage, the measurement client and the payment provider from settings.
    pub async fn from_config(cfg: &AppConfig, bridge: Arc<dyn PageBridge>) -> anyhow::Result<Self> {
        let store = ConfigStore::new(TieredStore::open(&cfg.storage).await?);
        let analytics = Arc::new(MeasurementClient::new(cfg.analytics.clone(), store.clone())?);
        let provider = Arc::new(ExtPayClient::new(&cfg.payment)?);
        info!(
            data_dir = %cfg.storage.data_dir,
            trial_days = cfg.payment.trial_days,
            analytics = cfg.analytics.api_secret.is_some(),
            "background wired"
        );
        Ok(Self::new(store, provider, analytics, bridge, TrialPolicy::new(cfg.payment.trial_days)))
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn payments(&self) -> &PaymentService {
        &self.payments
    }

    pub fn analytics(&self) -> &dyn Analytics {
        self.analytics.as_ref()
    }

    pub fn bridge(&self) -> &dyn PageBridge {
        self.bridge.as_ref()
    }

    pub fn router(&self) -> MessageRouter {
        MessageRouter::new(self.clone())
    }

    pub fn actions(&self) -> ConfigActions {
        ConfigActions::new(self.clone())
    }

    /// Persist `name` as active (turning remapping on) and push it to every page.
    pub async fn set_active_config(&self, name: &str, config: &GamepadConfig) -> Result<(), ServiceError> {
        self.store.store_active_gamepad_config(name).await?;
        let sent = self.bridge.send_to_pages(&OutboundMessage::ActivateGamepadConfig {
            name: name.to_string(),
            config: config.clone(),
        });
        debug!(name, pages = sent, "activated gamepad config");
        Ok(())
    }

    /// Persist remapping as off and tell every page to stop.
    pub async fn disable_active_config(&self) -> Result<(), ServiceError> {
        self.store.store_enabled(false).await?;
        let sent = self.bridge.send_to_pages(&OutboundMessage::DisableGamepad);
        debug!(pages = sent, "disabled gamepad");
        Ok(())
    }
}
