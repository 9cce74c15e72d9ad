//! Runtime message protocol.
//!
//! Page scripts send [`InboundMessage`]s and may receive a [`Reply`]. The
//! background pushes [`OutboundMessage`]s to pages and to the popup. Every
//! message carries a `type` discriminant on the wire.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::gamepad::GamepadConfig;
use crate::prefs::GlobalPrefs;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InboundMessage {
    #[serde(rename = "INJECTED")]
    Injected,
    #[serde(rename = "INITIALIZED")]
    Initialized {
        #[serde(rename = "gameName", default)]
        game_name: Option<String>,
    },
    #[serde(rename = "GAME_CHANGED")]
    GameChanged {
        #[serde(rename = "gameName", default)]
        game_name: Option<String>,
    },
    #[serde(rename = "SEEN_ONBOARDING")]
    SeenOnboarding,
}

impl InboundMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            InboundMessage::Injected => "INJECTED",
            InboundMessage::Initialized { .. } => "INITIALIZED",
            InboundMessage::GameChanged { .. } => "GAME_CHANGED",
            InboundMessage::SeenOnboarding => "SEEN_ONBOARDING",
        }
    }
}

/// Origin of an inbound message. Only messages coming from a tab are handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSender {
    #[serde(default)]
    pub tab_id: Option<u32>,
}

impl MessageSender {
    pub fn tab(tab_id: u32) -> Self {
        Self { tab_id: Some(tab_id) }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InjectedReply {
    pub seen_onboarding: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeReply {
    pub config_name: Option<String>,
    pub config: Option<GamepadConfig>,
    pub seen_onboarding: bool,
    pub prefs: GlobalPrefs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reply {
    Initialized(InitializeReply),
    Injected(InjectedReply),
}

/// Messages pushed by the background to page scripts or the popup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OutboundMessage {
    ActivateGamepadConfig { name: String, config: GamepadConfig },
    DisableGamepad,
    UpdatePrefs { prefs: GlobalPrefs },
    CloseWindow,
    OpenTab { url: String },
}

/// Keyboard shortcuts registered by the extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Command {
    ProfilePrev,
    ProfileNext,
    ToggleOnOff,
    ShowHideCheatsheet,
}

impl Command {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "profile-prev" => Some(Command::ProfilePrev),
            "profile-next" => Some(Command::ProfileNext),
            "toggle-on-off" => Some(Command::ToggleOnOff),
            "show-hide-cheatsheet" => Some(Command::ShowHideCheatsheet),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Command::ProfilePrev => "profile-prev",
            Command::ProfileNext => "profile-next",
            Command::ToggleOnOff => "toggle-on-off",
            Command::ShowHideCheatsheet => "show-hide-cheatsheet",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reason passed to the install hook, as reported by the browser runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallReason {
    Install,
    Update,
    ChromeUpdate,
    SharedModuleUpdate,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn inbound_messages_decode_from_type_tag() {
        let m: InboundMessage = serde_json::from_value(json!({"type": "INITIALIZED", "gameName": "Halo"})).unwrap();
        assert_eq!(m, InboundMessage::Initialized { game_name: Some("Halo".into()) });
        let m: InboundMessage = serde_json::from_value(json!({"type": "GAME_CHANGED", "gameName": null})).unwrap();
        assert_eq!(m, InboundMessage::GameChanged { game_name: None });
        let m: InboundMessage = serde_json::from_value(json!({"type": "INJECTED"})).unwrap();
        assert_eq!(m.kind(), "INJECTED");
    }

    #[test]
    fn outbound_messages_use_camel_case_type() {
        let v = serde_json::to_value(OutboundMessage::CloseWindow).unwrap();
        assert_eq!(v, json!({"type": "closeWindow"}));
        let v = serde_json::to_value(OutboundMessage::UpdatePrefs { prefs: GlobalPrefs { show_controls_overlay: true } }).unwrap();
        assert_eq!(v, json!({"type": "updatePrefs", "prefs": {"showControlsOverlay": true}}));
    }

    #[test]
    fn initialize_reply_serializes_nulls_when_disabled() {
        let reply = Reply::Initialized(InitializeReply {
            config_name: None,
            config: None,
            seen_onboarding: false,
            prefs: GlobalPrefs::default(),
        });
        let v = serde_json::to_value(reply).unwrap();
        assert_eq!(v["configName"], json!(null));
        assert_eq!(v["config"], json!(null));
    }

    #[test]
    fn commands_round_trip_through_names() {
        for name in ["profile-prev", "profile-next", "toggle-on-off", "show-hide-cheatsheet"] {
            assert_eq!(Command::parse(name).map(|c| c.as_str()), Some(name));
        }
        assert!(Command::parse("open-popup").is_none());
    }
}
