use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::ModelError;

/// Reserved name of the built-in configuration. Always present, never deletable.
pub const DEFAULT_CONFIG_NAME: &str = "default";

/// Logical gamepad inputs that can be bound to keys (buttons first, then stick axes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GamepadInput {
    A,
    B,
    X,
    Y,
    LeftShoulder,
    RightShoulder,
    LeftTrigger,
    RightTrigger,
    Select,
    Start,
    LeftStickPressed,
    RightStickPressed,
    DpadUp,
    DpadDown,
    DpadLeft,
    DpadRight,
    Home,
    LeftStickUp,
    LeftStickDown,
    LeftStickLeft,
    LeftStickRight,
    RightStickUp,
    RightStickDown,
    RightStickLeft,
    RightStickRight,
}

/// One key code or several key codes bound to the same input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyBinding {
    Single(String),
    Multiple(Vec<String>),
}

impl KeyBinding {
    pub fn keys(&self) -> Vec<&str> {
        match self {
            KeyBinding::Single(k) => vec![k.as_str()],
            KeyBinding::Multiple(ks) => ks.iter().map(String::as_str).collect(),
        }
    }
}

impl From<&str> for KeyBinding {
    fn from(key: &str) -> Self {
        KeyBinding::Single(key.to_string())
    }
}

/// Input → binding map. Unbound inputs are absent; stored `null` bindings read as unbound.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyConfig(#[serde(deserialize_with = "skip_null_bindings")] BTreeMap<GamepadInput, KeyBinding>);

fn skip_null_bindings<'de, D>(deserializer: D) -> Result<BTreeMap<GamepadInput, KeyBinding>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: BTreeMap<GamepadInput, Option<KeyBinding>> = BTreeMap::deserialize(deserializer)?;
    Ok(raw.into_iter().filter_map(|(k, v)| v.map(|b| (k, b))).collect())
}

impl KeyConfig {
    pub fn get(&self, input: GamepadInput) -> Option<&KeyBinding> {
        self.0.get(&input)
    }

    pub fn bind(&mut self, input: GamepadInput, binding: KeyBinding) {
        self.0.insert(input, binding);
    }
}

/// Analog stick index as reported by the Gamepad API (0 = left, 1 = right).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Stick {
    Left,
    Right,
}

impl TryFrom<u8> for Stick {
    type Error = ModelError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Stick::Left),
            1 => Ok(Stick::Right),
            other => Err(ModelError::InvalidStick(other)),
        }
    }
}

impl From<Stick> for u8 {
    fn from(s: Stick) -> u8 {
        match s {
            Stick::Left => 0,
            Stick::Right => 1,
        }
    }
}

pub const DEFAULT_SENSITIVITY: f64 = 10.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MouseConfig {
    /// Stick that drives the mouse, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mouse_controls: Option<Stick>,
    pub sensitivity: f64,
}

impl Default for MouseConfig {
    fn default() -> Self {
        Self { mouse_controls: Some(Stick::Right), sensitivity: DEFAULT_SENSITIVITY }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GamepadConfig {
    pub key_config: KeyConfig,
    pub mouse_config: MouseConfig,
}

impl GamepadConfig {
    /// The built-in mapping stored under [`DEFAULT_CONFIG_NAME`].
    pub fn builtin() -> Self {
        use GamepadInput::*;
        let bindings: [(GamepadInput, KeyBinding); 21] = [
            (A, "Space".into()),
            (B, KeyBinding::Multiple(vec!["KeyQ".into(), "Backspace".into()])),
            (X, "KeyR".into()),
            (Y, "KeyF".into()),
            (LeftShoulder, "KeyC".into()),
            (RightShoulder, "KeyE".into()),
            (LeftTrigger, "RightClick".into()),
            (RightTrigger, "Click".into()),
            (Select, "Tab".into()),
            (Start, "Escape".into()),
            (LeftStickPressed, "ShiftLeft".into()),
            (RightStickPressed, "KeyV".into()),
            (DpadUp, "ArrowUp".into()),
            (DpadDown, "ArrowDown".into()),
            (DpadLeft, "ArrowLeft".into()),
            (DpadRight, "ArrowRight".into()),
            (Home, "Backquote".into()),
            (LeftStickUp, "KeyW".into()),
            (LeftStickDown, "KeyS".into()),
            (LeftStickLeft, "KeyA".into()),
            (LeftStickRight, "KeyD".into()),
        ];
        let mut key_config = KeyConfig::default();
        for (input, binding) in bindings {
            key_config.bind(input, binding);
        }
        Self { key_config, mouse_config: MouseConfig::default() }
    }

    pub fn to_value(&self) -> serde_json::Value {
        // Plain structs with string keys; serialization cannot fail.
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl Default for GamepadConfig {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builtin_config_uses_right_stick_for_mouse() {
        let cfg = GamepadConfig::builtin();
        assert_eq!(cfg.mouse_config.mouse_controls, Some(Stick::Right));
        assert_eq!(cfg.key_config.get(GamepadInput::A), Some(&KeyBinding::Single("Space".into())));
        assert!(cfg.key_config.get(GamepadInput::RightStickUp).is_none());
    }

    #[test]
    fn key_config_accepts_single_list_and_null_bindings() {
        let cfg: GamepadConfig = serde_json::from_value(json!({
            "keyConfig": { "a": "Space", "b": ["KeyQ", "KeyZ"], "x": null },
            "mouseConfig": { "mouseControls": 0, "sensitivity": 4 }
        }))
        .unwrap();
        assert!(cfg.key_config.get(GamepadInput::X).is_none());
        assert_eq!(cfg.key_config.get(GamepadInput::B).unwrap().keys(), vec!["KeyQ", "KeyZ"]);
        assert_eq!(cfg.mouse_config.mouse_controls, Some(Stick::Left));
        assert_eq!(cfg.mouse_config.sensitivity, 4.0);
    }

    #[test]
    fn serialized_shape_is_camel_case() {
        let value = GamepadConfig::builtin().to_value();
        assert_eq!(value["keyConfig"]["leftStickUp"], json!("KeyW"));
        assert_eq!(value["mouseConfig"]["mouseControls"], json!(1));
    }

    #[test]
    fn rejects_unknown_stick_index() {
        let res = serde_json::from_value::<GamepadConfig>(json!({
            "keyConfig": {},
            "mouseConfig": { "mouseControls": 2, "sensitivity": 1 }
        }));
        assert!(res.is_err());
    }
}
