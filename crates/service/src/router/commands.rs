use serde_json::json;
use tracing::{info, instrument};

use models::all_configs::ConfigMap;
use models::messages::{Command, OutboundMessage};
use models::DEFAULT_CONFIG_NAME;

use super::MessageRouter;
use crate::analytics::AnalyticsEvent;
use crate::errors::ServiceError;
use crate::observability::COMMANDS_TOTAL;

/// Name of the config before (`prev`) or after `active` in map order, wrapping around.
/// An active name that is not in the map selects the default config.
pub fn cycle_profile(configs: &ConfigMap, active: &str, prev: bool) -> String {
    let len = configs.len();
    let next = configs.get_index_of(active).and_then(|i| {
        let j = if prev { (i + len - 1) % len } else { (i + 1) % len };
        configs.get_index(j).map(|(name, _)| name.clone())
    });
    next.unwrap_or_else(|| DEFAULT_CONFIG_NAME.to_string())
}

impl MessageRouter {
    /// Run a keyboard command. The popup is always told to close afterwards, even on error.
    #[instrument(skip(self))]
    pub async fn handle_command(&self, command: &str) -> Result<(), ServiceError> {
        let parsed = Command::parse(command);
        COMMANDS_TOTAL
            .with_label_values(&[parsed.map(|c| c.as_str()).unwrap_or("unknown")])
            .inc();
        info!("keyboard command");
        self.bg.analytics().track(AnalyticsEvent::KeyboardCommand, json!({"command": command}));

        let outcome = match parsed {
            Some(cmd) => self.run_command(cmd).await,
            None => Ok(()),
        };
        // a stale popup would show outdated state
        self.bg.bridge().send_to_popup(&OutboundMessage::CloseWindow);
        outcome
    }

    async fn run_command(&self, cmd: Command) -> Result<(), ServiceError> {
        let all = self.bg.store().load_all().await?;

        if cmd == Command::ShowHideCheatsheet {
            let prefs = all.prefs.with_overlay_toggled();
            self.bg.bridge().send_to_pages(&OutboundMessage::UpdatePrefs { prefs: prefs.clone() });
            self.bg.store().store_global_prefs(&prefs).await?;
            return Ok(());
        }

        let payment = self.bg.payments().get_if_needed().await?;
        if !self.bg.payments().is_allowed(&payment) {
            info!(command = %cmd, "command ignored: not entitled");
            return Ok(());
        }

        match cmd {
            Command::ProfilePrev | Command::ProfileNext => {
                let name = cycle_profile(&all.configs, &all.active_config, cmd == Command::ProfilePrev);
                if let Some(config) = all.config(&name) {
                    self.bg.set_active_config(&name, config).await?;
                }
            }
            Command::ToggleOnOff if all.is_enabled => self.bg.disable_active_config().await?,
            Command::ToggleOnOff => {
                let name = match all.active() {
                    Some(_) => all.active_config.as_str(),
                    None => DEFAULT_CONFIG_NAME,
                };
                if let Some(config) = all.config(name) {
                    self.bg.set_active_config(name, config).await?;
                }
            }
            Command::ShowHideCheatsheet => {}
        }
        Ok(())
    }
}
