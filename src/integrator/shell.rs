//! Shell-command actions and plugin hooks
//!
//! Lets a config file declare suites and plugins without any Rust code:
//! each command runs under `sh -c` with the target exported through
//! `INTEGRATOR_*` environment variables.

use std::process::Stdio;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::process::Command as TokioCommand;

use super::dispatch::{Action, ActionContext, State};
use super::schema::{HookFn, IntegratorConfig};
use crate::common::{Error, Result};

/// Action running a shell command against the current target
#[derive(Debug, Clone)]
pub struct ShellAction {
    command: String,
}

impl ShellAction {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl Action for ShellAction {
    async fn run(&self, ctx: &ActionContext, mut state: State) -> Result<State> {
        let mut cmd = shell(&self.command);
        if let Some(target) = &ctx.target {
            cmd.env("INTEGRATOR_ENV", target.env_name())
                .env("INTEGRATOR_TARGET", target.target_name())
                .env("INTEGRATOR_TARGET_JSON", target.to_value().to_string());
            if let Some(hub) = target.hub() {
                cmd.env("INTEGRATOR_HUB", hub);
            }
        }
        if let Some(session) = &ctx.session {
            cmd.env("INTEGRATOR_SESSION", session.id());
        }

        let code = run_checked(&self.command, cmd).await?;

        // Results are recorded under `results`, keyed by action
        if !state.is_object() {
            state = json!({});
        }
        let results = state
            .as_object_mut()
            .map(|map| map.entry("results").or_insert_with(|| json!({})));
        if let Some(Value::Object(results)) = results {
            results.insert(ctx.key.clone(), json!({ "status": code }));
        }
        Ok(state)
    }

    fn description(&self) -> Option<String> {
        Some(format!("$ {}", self.command))
    }
}

/// Plugin hook running a shell command once per phase
pub struct ShellHook {
    plugin: String,
    command: String,
}

impl ShellHook {
    pub fn new(plugin: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            command: command.into(),
        }
    }
}

#[async_trait]
impl HookFn for ShellHook {
    async fn call(&self, config: &IntegratorConfig) -> Result<Value> {
        let envs: Vec<&str> = config
            .environments
            .iter()
            .map(|env| env.env_name.as_str())
            .collect();

        let mut cmd = shell(&self.command);
        cmd.env("INTEGRATOR_PLUGIN", &self.plugin)
            .env("INTEGRATOR_ENVS", envs.join(","));

        let code = run_checked(&self.command, cmd).await?;
        Ok(json!({ "status": code }))
    }
}

fn shell(command: &str) -> TokioCommand {
    let mut cmd = TokioCommand::new("sh");
    cmd.arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());
    cmd
}

/// Run to completion; a non-zero exit is an error carrying stderr
async fn run_checked(command: &str, mut cmd: TokioCommand) -> Result<i32> {
    tracing::debug!(command = %command, "Running shell command");
    let output = cmd.output().await.map_err(|source| Error::CommandSpawn {
        command: command.to_string(),
        source,
    })?;

    if !output.status.success() {
        return Err(Error::CommandFailed {
            command: command.to_string(),
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output.status.code().unwrap_or(0))
}
