//! User notification preferences.
//!
//! Stored upstream next to the tasks; the response shapes are just as loose,
//! so the same boolean coercion applies.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::normalize::{coerce_bool, first_present};

pub const DEFAULT_LANGUAGE: &str = "en";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSettings {
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default, rename = "notifyUpcoming")]
    pub notify_upcoming: bool,
    #[serde(default, rename = "notifyOverdue")]
    pub notify_overdue: bool,
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            language: default_language(),
            notify_upcoming: false,
            notify_overdue: false,
        }
    }
}

/// Map an upstream settings payload into [`UserSettings`], accepting both
/// camelCase and snake_case keys. Anything unusable falls back to defaults.
pub fn normalize_settings(payload: &Value) -> UserSettings {
    UserSettings {
        language: payload
            .get("language")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(default_language),
        notify_upcoming: first_present(payload, &["notifyUpcoming", "notify_upcoming"])
            .is_some_and(coerce_bool),
        notify_overdue: first_present(payload, &["notifyOverdue", "notify_overdue"])
            .is_some_and(coerce_bool),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_when_payload_is_unusable() {
        for payload in [json!(null), json!({}), json!({ "language": 4 })] {
            let settings = normalize_settings(&payload);
            assert_eq!(settings, UserSettings::default(), "for {payload}");
        }
    }

    #[test]
    fn accepts_both_key_conventions_and_loose_booleans() {
        let settings = normalize_settings(&json!({
            "language": "fr",
            "notify_upcoming": "yes",
            "notifyOverdue": 1
        }));
        assert_eq!(settings.language, "fr");
        assert!(settings.notify_upcoming);
        assert!(settings.notify_overdue);

        let settings = normalize_settings(&json!({
            "notifyUpcoming": "off",
            "notify_overdue": "maybe"
        }));
        assert!(!settings.notify_upcoming);
        assert!(!settings.notify_overdue);
    }
}
