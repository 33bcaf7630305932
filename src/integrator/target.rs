//! Target expansion
//!
//! Turns one environment into concrete targets by merging
//! `[default, common, target]` and stamping the result with its
//! environment and a name derived from the merged config.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use super::merge::{merge_layers, Layer};
use super::schema::Environment;

pub const HUB_KEY: &str = "hub";
pub const ENV_NAME_KEY: &str = "envName";
pub const TARGET_NAME_KEY: &str = "targetName";

/// Capability keys that name a target, in naming order
const NAME_KEYS: &[&str] = &[
    "browserName",
    "version",
    "browserVersion",
    "platform",
    "platformName",
    "deviceName",
];

/// One fully merged configuration for a single run
///
/// Immutable once built; clones share the merged mapping.
#[derive(Clone, PartialEq)]
pub struct Target {
    env_name: String,
    target_name: String,
    config: Arc<Layer>,
}

impl Target {
    /// Build a target from an already merged config
    pub fn new(env_name: impl Into<String>, config: Layer) -> Self {
        let target_name = target_name(&config);
        Self {
            env_name: env_name.into(),
            target_name,
            config: Arc::new(config),
        }
    }

    pub fn env_name(&self) -> &str {
        &self.env_name
    }

    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    /// The merged layers, without the `envName`/`targetName` stamps
    pub fn config(&self) -> &Layer {
        &self.config
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.config.get(key)
    }

    pub fn hub(&self) -> Option<&str> {
        self.get(HUB_KEY).and_then(Value::as_str)
    }

    /// The merged config with `envName` and `targetName` stamped on
    pub fn to_value(&self) -> Value {
        let mut stamped = (*self.config).clone();
        stamped.insert(ENV_NAME_KEY.to_string(), Value::String(self.env_name.clone()));
        stamped.insert(
            TARGET_NAME_KEY.to_string(),
            Value::String(self.target_name.clone()),
        );
        Value::Object(stamped)
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Target({} / {})", self.env_name, self.target_name)
    }
}

/// Expand every target of `environment`, in declaration order
pub fn expand_targets(default_layer: &Layer, environment: &Environment) -> Vec<Target> {
    environment
        .targets
        .iter()
        .map(|spec| {
            let merged = merge_layers([default_layer, &environment.common, spec]);
            Target::new(environment.env_name.clone(), merged)
        })
        .collect()
}

/// Human-readable name for a merged config
///
/// Pure: equal configs (including key order) always produce equal names.
pub fn target_name(config: &Map<String, Value>) -> String {
    let named: Vec<String> = NAME_KEYS
        .iter()
        .filter_map(|key| config.get(*key).and_then(scalar_text))
        .collect();
    if !named.is_empty() {
        return named.join(", ");
    }

    let described: Vec<String> = config
        .iter()
        .filter(|(key, _)| !matches!(key.as_str(), HUB_KEY | ENV_NAME_KEY | TARGET_NAME_KEY))
        .filter_map(|(key, value)| scalar_text(value).map(|text| format!("{}={}", key, text)))
        .collect();
    if !described.is_empty() {
        return described.join(", ");
    }

    "default".to_string()
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
