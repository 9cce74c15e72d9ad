use serde_json::{Map, Value};

use models::gamepad::{MouseConfig, DEFAULT_SENSITIVITY};

/// Fill in fields that configs persisted by older versions lack.
///
/// Purely additive: existing fields, including unknown ones, are left as is.
/// Returns whether anything was added. Non-object values are left untouched
/// and will fail to decode later.
pub fn upgrade_legacy_config(value: &mut Value) -> bool {
    let Some(obj) = value.as_object_mut() else {
        return false;
    };
    let mut changed = false;

    if !obj.contains_key("keyConfig") {
        obj.insert("keyConfig".into(), Value::Object(Map::new()));
        changed = true;
    }

    match obj.get_mut("mouseConfig") {
        Some(Value::Object(mouse)) => {
            if !mouse.contains_key("sensitivity") {
                mouse.insert("sensitivity".into(), Value::from(DEFAULT_SENSITIVITY));
                changed = true;
            }
        }
        Some(_) => {}
        None => {
            let default_mouse = serde_json::to_value(MouseConfig::default()).unwrap_or(Value::Null);
            obj.insert("mouseConfig".into(), default_mouse);
            changed = true;
        }
    }

    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fills_missing_mouse_config() {
        let mut v = json!({"keyConfig": {"a": "Space"}});
        assert!(upgrade_legacy_config(&mut v));
        assert_eq!(v["mouseConfig"], json!({"mouseControls": 1, "sensitivity": 10.0}));
        assert_eq!(v["keyConfig"]["a"], json!("Space"));
    }

    #[test]
    fn fills_missing_sensitivity_only() {
        let mut v = json!({"keyConfig": {}, "mouseConfig": {"mouseControls": 0}});
        assert!(upgrade_legacy_config(&mut v));
        assert_eq!(v["mouseConfig"], json!({"mouseControls": 0, "sensitivity": 10.0}));
    }

    #[test]
    fn current_configs_and_unknown_fields_are_kept() {
        let mut v = json!({"keyConfig": {}, "mouseConfig": {"sensitivity": 3}, "note": "mine"});
        assert!(!upgrade_legacy_config(&mut v));
        assert_eq!(v["note"], json!("mine"));
        assert_eq!(v["mouseConfig"], json!({"sensitivity": 3}));
    }
}
