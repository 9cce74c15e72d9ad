use serde::{Deserialize, Serialize};

/// Preferences that apply regardless of the active gamepad config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalPrefs {
    /// Show the on-screen controls cheatsheet while playing.
    #[serde(default)]
    pub show_controls_overlay: bool,
}

impl GlobalPrefs {
    pub fn with_overlay_toggled(&self) -> Self {
        Self { show_controls_overlay: !self.show_controls_overlay, ..self.clone() }
    }
}
