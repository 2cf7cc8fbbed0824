//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Timer durations, long break interval and auto-start flags
//! - Alert prompt cadence and the default (unanswered) response
//! - Theme name
//!
//! Configuration is stored at `<data_dir>/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::alert::{AlertResponse, AlertSchedule};
use crate::error::{ConfigError, CoreError, Result};
use crate::timer::TimerSettings;

/// Timer configuration, in minutes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerConfig {
    #[serde(default = "default_focus_duration")]
    pub focus_duration: u32,
    #[serde(default = "default_short_break")]
    pub short_break: u32,
    #[serde(default = "default_long_break")]
    pub long_break: u32,
    #[serde(default = "default_long_break_interval")]
    pub long_break_interval: u32,
    #[serde(default)]
    pub auto_start_breaks: bool,
    #[serde(default)]
    pub auto_start_pomodoros: bool,
    /// Overrides `focus_duration` when set.
    #[serde(default)]
    pub countdown_minutes: Option<u32>,
}

/// Alert prompt configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_alert_interval")]
    pub interval_minutes: u32,
    #[serde(default = "default_alert_response")]
    pub default_response: AlertResponse,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiConfig {
    #[serde(default = "default_theme")]
    pub theme: String,
}

/// Application configuration.
///
/// Serialized to/from TOML at `<data_dir>/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub timer: TimerConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
    #[serde(default)]
    pub ui: UiConfig,
}

fn default_focus_duration() -> u32 {
    25
}
fn default_short_break() -> u32 {
    5
}
fn default_long_break() -> u32 {
    15
}
fn default_long_break_interval() -> u32 {
    4
}
fn default_alert_interval() -> u32 {
    15
}
fn default_alert_response() -> AlertResponse {
    AlertResponse::Focused
}
fn default_theme() -> String {
    "default".into()
}
fn default_true() -> bool {
    true
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            focus_duration: default_focus_duration(),
            short_break: default_short_break(),
            long_break: default_long_break(),
            long_break_interval: default_long_break_interval(),
            auto_start_breaks: false,
            auto_start_pomodoros: false,
            countdown_minutes: None,
        }
    }
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_minutes: default_alert_interval(),
            default_response: default_alert_response(),
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            theme: default_theme(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().map_or(true, |p| p.is_empty()) {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let clears = matches!(value, "" | "none" | "null");
                let new_value = match existing {
                    // Only optional fields accept null; the typed round-trip in
                    // `apply` rejects it for required ones.
                    serde_json::Value::Number(_) | serde_json::Value::Null if clears => {
                        serde_json::Value::Null
                    }
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => serde_json::Value::Number(
                        value
                            .parse::<u64>()
                            .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?
                            .into(),
                    ),
                    serde_json::Value::Null => serde_json::Value::Number(
                        value
                            .parse::<u64>()
                            .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?
                            .into(),
                    ),
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    serde_json::Value::String(_) => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    pub fn path() -> Result<PathBuf> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the data directory or write and return the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| {
                CoreError::Config(ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Persist to the data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a value by dot-separated key without saving.
    ///
    /// The result must still produce valid timer settings; otherwise the
    /// config is left unchanged.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<()> {
        let mut json = serde_json::to_value(&*self)?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        updated
            .timer_settings()
            .validate()
            .map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        *self = updated;
        Ok(())
    }

    /// Set a config value by key and save.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the config cannot be saved.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.apply(key, value)?;
        self.save()
    }

    /// Timer snapshot handed to a new focus session.
    pub fn timer_settings(&self) -> TimerSettings {
        let t = &self.timer;
        TimerSettings {
            focus_secs: i64::from(t.focus_duration) * 60,
            short_break_secs: i64::from(t.short_break) * 60,
            long_break_secs: i64::from(t.long_break) * 60,
            long_break_interval: t.long_break_interval,
            auto_start_breaks: t.auto_start_breaks,
            auto_start_pomodoros: t.auto_start_pomodoros,
            countdown_override_secs: t.countdown_minutes.map(|m| i64::from(m) * 60),
        }
    }

    pub fn alert_schedule(&self) -> AlertSchedule {
        if self.alerts.enabled {
            AlertSchedule::every_secs(u64::from(self.alerts.interval_minutes) * 60)
        } else {
            AlertSchedule::disabled()
        }
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|err| {
            tracing::warn!(%err, "falling back to default configuration");
            Self::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let parsed: Config = toml::from_str("[timer]\nfocus_duration = 50\n").unwrap();
        assert_eq!(parsed.timer.focus_duration, 50);
        assert_eq!(parsed.timer.short_break, 5);
        assert_eq!(parsed.alerts.default_response, AlertResponse::Focused);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("timer.focus_duration").as_deref(), Some("25"));
        assert_eq!(cfg.get("alerts.default_response").as_deref(), Some("focused"));
        assert_eq!(cfg.get("timer.countdown_minutes").as_deref(), Some("null"));
        assert!(cfg.get("timer.missing_key").is_none());
    }

    #[test]
    fn apply_updates_nested_values() {
        let mut cfg = Config::default();
        cfg.apply("timer.auto_start_breaks", "true").unwrap();
        cfg.apply("timer.long_break_interval", "2").unwrap();
        cfg.apply("alerts.default_response", "deviated").unwrap();
        cfg.apply("timer.countdown_minutes", "40").unwrap();

        assert!(cfg.timer.auto_start_breaks);
        assert_eq!(cfg.timer.long_break_interval, 2);
        assert_eq!(cfg.alerts.default_response, AlertResponse::Deviated);
        assert_eq!(cfg.timer.countdown_minutes, Some(40));

        cfg.apply("timer.countdown_minutes", "none").unwrap();
        assert_eq!(cfg.timer.countdown_minutes, None);
    }

    #[test]
    fn cleared_override_survives_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut cfg = Config::default();
        cfg.apply("timer.countdown_minutes", "40").unwrap();
        cfg.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap().timer.countdown_minutes, Some(40));

        cfg.apply("timer.countdown_minutes", "none").unwrap();
        cfg.save_to(&path).unwrap();
        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.timer.countdown_minutes, None);
        assert_eq!(loaded.timer_settings().countdown_override_secs, None);
    }

    #[test]
    fn apply_rejects_clearing_required_value() {
        let mut cfg = Config::default();
        let err = cfg.apply("timer.focus_duration", "none").unwrap_err();
        assert!(matches!(err, CoreError::Config(ConfigError::InvalidValue { .. })));
        assert_eq!(cfg.timer.focus_duration, 25);
    }

    #[test]
    fn apply_rejects_unknown_key() {
        let mut cfg = Config::default();
        let err = cfg.apply("timer.nonexistent", "1").unwrap_err();
        assert!(matches!(err, CoreError::Config(ConfigError::UnknownKey(_))));
    }

    #[test]
    fn apply_rejects_invalid_type() {
        let mut cfg = Config::default();
        assert!(cfg.apply("timer.auto_start_breaks", "sometimes").is_err());
        assert!(cfg.apply("alerts.default_response", "asleep").is_err());
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn apply_rejects_zero_duration() {
        let mut cfg = Config::default();
        let err = cfg.apply("timer.short_break", "0").unwrap_err();
        assert!(matches!(err, CoreError::Config(ConfigError::InvalidValue { .. })));
        assert_eq!(cfg.timer.short_break, 5);
    }

    #[test]
    fn timer_settings_convert_minutes() {
        let mut cfg = Config::default();
        cfg.timer.countdown_minutes = Some(10);
        let settings = cfg.timer_settings();
        assert_eq!(settings.focus_secs, 1500);
        assert_eq!(settings.long_break_secs, 900);
        assert_eq!(settings.countdown_override_secs, Some(600));
    }

    #[test]
    fn alert_schedule_follows_enabled_flag() {
        let mut cfg = Config::default();
        assert_eq!(cfg.alert_schedule().interval_secs(), 900);
        cfg.alerts.enabled = false;
        assert!(!cfg.alert_schedule().is_enabled());
    }

    #[test]
    fn load_from_missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg, Config::default());
        assert!(path.exists());

        let mut changed = cfg.clone();
        changed.ui.theme = "forest".into();
        changed.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap().ui.theme, "forest");
    }
}
