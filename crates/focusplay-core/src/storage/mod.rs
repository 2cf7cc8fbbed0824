mod config;
pub mod database;

pub use config::{AlertsConfig, Config, TimerConfig, UiConfig};
pub use database::{DayStats, Database, Stats};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns the data directory, creating it if needed.
///
/// `FOCUSPLAY_DATA_DIR` wins when set. Otherwise `~/.config/focusplay/`,
/// or `~/.config/focusplay-dev/` when `FOCUSPLAY_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("FOCUSPLAY_DATA_DIR") {
        Some(custom) => PathBuf::from(custom),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("FOCUSPLAY_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("focusplay-dev")
            } else {
                base_dir.join("focusplay")
            }
        }
    };

    std::fs::create_dir_all(&dir).map_err(|source| ConfigError::DataDir {
        path: dir.clone(),
        source,
    })?;
    Ok(dir)
}
