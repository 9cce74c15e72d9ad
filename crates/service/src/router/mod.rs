//! Runtime message handling.
//!
//! The router keeps no state between messages. Each message reloads the
//! stored configuration and, where entitlement matters, the payment record.

use serde_json::json;
use tracing::{debug, info, instrument, warn};

use models::messages::{InboundMessage, InitializeReply, InjectedReply, InstallReason, MessageSender, Reply};
use models::{TrialState, DEFAULT_CONFIG_NAME};

use crate::analytics::AnalyticsEvent;
use crate::errors::ServiceError;
use crate::observability::MESSAGES_TOTAL;
use crate::payment::PaymentPage;
use crate::runtime::Background;

pub mod commands;

pub use commands::cycle_profile;

#[derive(Clone)]
pub struct MessageRouter {
    bg: Background,
}

impl MessageRouter {
    pub fn new(bg: Background) -> Self {
        Self { bg }
    }

    /// Handle one message from a page script. `Ok(None)` means no reply is sent.
    #[instrument(skip(self, msg, sender), fields(kind = msg.kind(), tab = ?sender.tab_id))]
    pub async fn handle(&self, msg: InboundMessage, sender: MessageSender) -> Result<Option<Reply>, ServiceError> {
        let Some(tab_id) = sender.tab_id else {
            debug!("ignoring message without a sender tab");
            return Ok(None);
        };
        MESSAGES_TOTAL.with_label_values(&[msg.kind()]).inc();

        match msg {
            InboundMessage::Injected => {
                self.bg.bridge().enable_action_button(tab_id);
                let all = self.bg.store().load_all().await?;
                Ok(Some(Reply::Injected(InjectedReply { seen_onboarding: all.seen_onboarding })))
            }
            InboundMessage::Initialized { game_name } => self.initialized(game_name).await.map(Some),
            InboundMessage::GameChanged { game_name } => {
                info!(game = ?game_name, "game changed");
                if let Some(game) = &game_name {
                    self.bg.analytics().track(AnalyticsEvent::Play, json!({"gameName": game}));
                }
                self.record_game_name(game_name.as_deref()).await;
                Ok(None)
            }
            InboundMessage::SeenOnboarding => {
                self.bg.analytics().track(AnalyticsEvent::Dismiss, json!({"modal": "onboarding"}));
                self.bg.store().store_seen_onboarding().await?;
                let payment = self.bg.payments().get_if_needed().await?;
                // first dismissal by someone who never started a trial opens the trial page
                if !payment.paid && self.bg.payments().trial_state(&payment) == TrialState::Inactive {
                    self.bg.bridge().open_url(&self.bg.payments().page_url(PaymentPage::Trial));
                }
                Ok(None)
            }
        }
    }

    async fn initialized(&self, game_name: Option<String>) -> Result<Reply, ServiceError> {
        info!(game = ?game_name, "page initialized");
        self.record_game_name(game_name.as_deref()).await;

        let (all, payment) = tokio::join!(self.bg.store().load_all(), self.bg.payments().get_if_needed());
        let (all, payment) = (all?, payment?);
        let allowed = self.bg.payments().is_allowed(&payment);
        let disabled = !all.is_enabled || !allowed;

        self.bg.analytics().track(
            AnalyticsEvent::Initialize,
            json!({"paid": payment.paid.to_string(), "seenOnboarding": all.seen_onboarding.to_string()}),
        );
        if let Some(game) = &game_name {
            self.bg.analytics().track(AnalyticsEvent::Play, json!({"gameName": game}));
        }

        let (config_name, config) = if disabled {
            (None, None)
        } else {
            (Some(all.active_config.clone()), all.active().cloned())
        };
        debug!(enabled = all.is_enabled, allowed, config = ?config_name, "initialize reply");
        Ok(Reply::Initialized(InitializeReply {
            config_name,
            config,
            seen_onboarding: all.seen_onboarding,
            prefs: all.prefs,
        }))
    }

    /// First install activates the default config, which also turns remapping on.
    pub async fn on_installed(&self, reason: InstallReason) -> Result<(), ServiceError> {
        info!(?reason, "extension installed");
        if reason == InstallReason::Install {
            self.bg.store().store_active_gamepad_config(DEFAULT_CONFIG_NAME).await?;
        }
        Ok(())
    }

    async fn record_game_name(&self, game_name: Option<&str>) {
        if let Err(e) = self.bg.store().update_game_name(game_name).await {
            warn!(error = %e, "could not record game name");
        }
    }
}
