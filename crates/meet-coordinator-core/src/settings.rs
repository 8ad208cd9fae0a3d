//! User settings for the coordinator.

use std::{path::Path, sync::RwLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What clicking the toolbar action button does.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionButtonBehavior {
    /// Open the meeting list popup.
    #[default]
    Popup,
    /// Toggle mute directly without a popup.
    Toggle,
}

/// Coordinator settings.
///
/// Missing fields in a settings file fall back to their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Focus the targeted meeting's tab when a broadcast command is sent.
    pub autofocus: bool,

    /// Action button behavior.
    pub action_button_behavior: ActionButtonBehavior,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            autofocus: true,
            action_button_behavior: ActionButtonBehavior::default(),
        }
    }
}

/// Settings loading error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid settings: {0}")]
    Json(#[from] serde_json::Error),
}

impl Settings {
    /// Parse settings from a JSON document.
    ///
    /// # Errors
    /// Returns error if the document is not valid settings JSON.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load settings from a JSON file.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

/// Source of the current settings.
///
/// Read on every use so that changes made elsewhere apply on the next
/// recomputation.
pub trait SettingsStore: Send + Sync {
    /// Current settings.
    fn settings(&self) -> Settings;
}

impl SettingsStore for Settings {
    fn settings(&self) -> Settings {
        *self
    }
}

/// In-memory settings store.
#[derive(Debug, Default)]
pub struct MemorySettings {
    inner: RwLock<Settings>,
}

impl MemorySettings {
    /// Create a store holding the given settings.
    #[must_use]
    pub const fn new(settings: Settings) -> Self {
        Self {
            inner: RwLock::new(settings),
        }
    }

    /// Replace the stored settings.
    pub fn replace(&self, settings: Settings) {
        match self.inner.write() {
            Ok(mut inner) => *inner = settings,
            Err(poisoned) => *poisoned.into_inner() = settings,
        }
    }
}

impl SettingsStore for MemorySettings {
    fn settings(&self) -> Settings {
        match self.inner.read() {
            Ok(inner) => *inner,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let settings = Settings::from_json_str("{}").unwrap();
        assert_eq!(settings, Settings::default());
        assert!(settings.autofocus);
        assert_eq!(settings.action_button_behavior, ActionButtonBehavior::Popup);
    }

    #[test]
    fn test_parse_camel_case() {
        let settings =
            Settings::from_json_str(r#"{"autofocus": false, "actionButtonBehavior": "toggle"}"#)
                .unwrap();
        assert!(!settings.autofocus);
        assert_eq!(settings.action_button_behavior, ActionButtonBehavior::Toggle);
    }

    #[test]
    fn test_invalid_settings() {
        let err = Settings::from_json_str(r#"{"actionButtonBehavior": "explode"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Settings::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_memory_store_replace() {
        let store = MemorySettings::default();
        assert!(store.settings().autofocus);

        store.replace(Settings {
            autofocus: false,
            action_button_behavior: ActionButtonBehavior::Toggle,
        });

        assert!(!store.settings().autofocus);
    }
}
