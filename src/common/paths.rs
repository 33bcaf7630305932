//! Configuration paths
//!
//! Uses the directories crate for platform-appropriate locations:
//! - Linux: `~/.config/integrator/`
//! - macOS: `~/Library/Application Support/integrator/`
//! - Windows: `%APPDATA%\integrator\`

use std::path::PathBuf;

/// Name used for the settings directory
const APP_NAME: &str = "integrator";

/// Environment variable overriding the settings file location
pub const SETTINGS_ENV: &str = "INTEGRATOR_SETTINGS";

/// Get the configuration directory path
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the settings file
///
/// `INTEGRATOR_SETTINGS` wins over the platform location.
pub fn settings_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(SETTINGS_ENV) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    config_dir().map(|dir| dir.join("config.toml"))
}
