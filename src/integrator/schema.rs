//! Integrator configuration model
//!
//! Defines the environments/targets/plugins tree a multi-run is driven by,
//! and its loading from YAML files.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::merge::Layer;
use super::shell::{ShellAction, ShellHook};
use crate::common::{Error, Result};

/// Lifecycle phase wrapping a multi-run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Before,
    After,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Before => "before",
            Phase::After => "after",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something a plugin can run at a lifecycle phase
#[async_trait]
pub trait HookFn: Send + Sync {
    async fn call(&self, config: &IntegratorConfig) -> Result<Value>;
}

/// A plugin's entry for one phase
#[derive(Clone)]
pub enum Hook {
    /// A runnable hook
    Callable(Arc<dyn HookFn>),
    /// The phase was declared with something that cannot be run
    NotCallable { found: String },
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hook::Callable(_) => f.write_str("Callable"),
            Hook::NotCallable { found } => write!(f, "NotCallable({found})"),
        }
    }
}

/// Lifecycle-hook provider
#[derive(Clone, Debug)]
pub struct Plugin {
    name: String,
    before: Option<Hook>,
    after: Option<Hook>,
}

impl Plugin {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            before: None,
            after: None,
        }
    }

    /// Set the hook for `phase`
    pub fn with_hook(mut self, phase: Phase, hook: Hook) -> Self {
        match phase {
            Phase::Before => self.before = Some(hook),
            Phase::After => self.after = Some(hook),
        }
        self
    }

    /// Set a callable hook for `phase`
    pub fn on(self, phase: Phase, hook: impl HookFn + 'static) -> Self {
        self.with_hook(phase, Hook::Callable(Arc::new(hook)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The hook declared for `phase`, if any
    pub fn hook(&self, phase: Phase) -> Option<&Hook> {
        match phase {
            Phase::Before => self.before.as_ref(),
            Phase::After => self.after.as_ref(),
        }
    }
}

/// Named grouping of targets sharing common configuration and plugins
#[derive(Clone, Debug)]
pub struct Environment {
    pub env_name: String,
    pub common: Layer,
    pub targets: Vec<Layer>,
    pub plugins: Vec<Plugin>,
}

impl Environment {
    pub fn builder(env_name: impl Into<String>) -> EnvironmentBuilder {
        EnvironmentBuilder {
            env: Environment {
                env_name: env_name.into(),
                common: Layer::new(),
                targets: Vec::new(),
                plugins: Vec::new(),
            },
        }
    }
}

/// Builder for programmatic environments
pub struct EnvironmentBuilder {
    env: Environment,
}

impl EnvironmentBuilder {
    /// Set the common layer; non-mapping values are treated as empty
    pub fn common(mut self, layer: Value) -> Self {
        self.env.common = into_layer(layer);
        self
    }

    /// Append a target layer; non-mapping values are treated as empty
    pub fn target(mut self, layer: Value) -> Self {
        self.env.targets.push(into_layer(layer));
        self
    }

    pub fn plugin(mut self, plugin: Plugin) -> Self {
        self.env.plugins.push(plugin);
        self
    }

    pub fn build(self) -> Environment {
        self.env
    }
}

fn into_layer(value: Value) -> Layer {
    match value {
        Value::Object(map) => map,
        _ => Layer::new(),
    }
}

/// Root configuration for one multi-run
#[derive(Clone, Debug, Default)]
pub struct IntegratorConfig {
    pub environments: Vec<Environment>,
}

impl IntegratorConfig {
    pub fn new(environments: Vec<Environment>) -> Self {
        Self { environments }
    }

    /// Every plugin, in environment order then declaration order
    pub fn plugins(&self) -> impl Iterator<Item = &Plugin> {
        self.environments.iter().flat_map(|env| env.plugins.iter())
    }

    /// Total number of targets across environments
    pub fn target_count(&self) -> usize {
        self.environments.iter().map(|env| env.targets.len()).sum()
    }
}

/// A loaded config file: the environment tree plus its declarative suite
#[derive(Debug)]
pub struct IntegratorFile {
    pub config: IntegratorConfig,
    /// Suite declared in the file, in declaration order
    pub suite: IndexMap<String, ShellAction>,
}

/// Raw file layout as written in YAML
#[derive(Deserialize, Debug)]
struct RawFile {
    #[serde(default)]
    environments: Vec<RawEnvironment>,
    #[serde(default)]
    suite: IndexMap<String, RawAction>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct RawEnvironment {
    env_name: String,
    #[serde(default)]
    common: Map<String, Value>,
    #[serde(default)]
    targets: Vec<Map<String, Value>>,
    /// Kept loose so malformed hooks survive until plugin validation
    #[serde(default)]
    plugins: Vec<Map<String, Value>>,
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum RawAction {
    Command(String),
    Shell { shell: String },
}

impl IntegratorFile {
    /// Load an integrator file from disk
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::from_yaml(&content)
    }

    /// Parse an integrator file from YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        let raw: RawFile = serde_yaml::from_str(content)
            .map_err(|e| Error::ConfigParse(format!("Failed to parse integrator config: {}", e)))?;

        let environments = raw
            .environments
            .into_iter()
            .map(|env| Environment {
                plugins: env
                    .plugins
                    .iter()
                    .enumerate()
                    .map(|(i, spec)| plugin_from_spec(&env.env_name, i, spec))
                    .collect(),
                env_name: env.env_name,
                common: env.common,
                targets: env.targets,
            })
            .collect();

        let suite = raw
            .suite
            .into_iter()
            .map(|(key, action)| {
                let command = match action {
                    RawAction::Command(command) | RawAction::Shell { shell: command } => command,
                };
                (key, ShellAction::new(command))
            })
            .collect();

        Ok(Self {
            config: IntegratorConfig::new(environments),
            suite,
        })
    }
}

fn plugin_from_spec(env_name: &str, index: usize, spec: &Map<String, Value>) -> Plugin {
    let name = spec
        .get("name")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}#{}", env_name, index));

    let mut plugin = Plugin::new(name.clone());
    for phase in [Phase::Before, Phase::After] {
        if let Some(value) = spec.get(phase.as_str()) {
            plugin = plugin.with_hook(phase, hook_from_value(&name, value));
        }
    }
    plugin
}

/// A string or `{shell: ...}` mapping runs a shell command; anything else is not callable
fn hook_from_value(plugin: &str, value: &Value) -> Hook {
    let command = match value {
        Value::String(command) => Some(command.clone()),
        Value::Object(map) => map.get("shell").and_then(Value::as_str).map(str::to_string),
        _ => None,
    };
    match command {
        Some(command) => Hook::Callable(Arc::new(ShellHook::new(plugin, command))),
        None => Hook::NotCallable {
            found: value_kind(value).to_string(),
        },
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "mapping without 'shell'",
    }
}
