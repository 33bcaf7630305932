//! Settings file handling
//!
//! The settings file supplies the default layer that sits beneath every
//! environment's `common` layer and each target layer.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::Path;

use super::paths::settings_path;
use super::Result;

/// Main settings structure
#[derive(Debug, Deserialize, Default)]
pub struct Settings {
    /// Baseline values for every target
    #[serde(default)]
    pub defaults: Defaults,

    /// Session transport settings
    #[serde(default)]
    pub session: SessionSettings,
}

/// Default layer settings
#[derive(Debug, Deserialize)]
pub struct Defaults {
    /// WebDriver hub URL used when no layer overrides `hub`
    #[serde(default = "default_hub")]
    pub hub: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self { hub: default_hub() }
    }
}

fn default_hub() -> String {
    "http://localhost:4444/wd/hub".to_string()
}

/// Session transport settings
#[derive(Debug, Deserialize)]
pub struct SessionSettings {
    /// Timeout for each WebDriver HTTP request
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    60
}

impl Settings {
    /// Load settings from the default settings file
    ///
    /// Returns default settings if the file doesn't exist
    pub fn load() -> Result<Self> {
        match settings_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load settings from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| super::Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        toml::from_str(&content).map_err(|e| super::Error::ConfigParse(e.to_string()))
    }

    /// The layer applied beneath `common` and each target layer
    pub fn default_layer(&self) -> Map<String, Value> {
        let mut layer = Map::new();
        layer.insert("hub".to_string(), Value::String(self.defaults.hub.clone()));
        layer
    }
}
