//! Multi-run orchestration
//!
//! `before` plugins, then every target of every environment dispatched
//! concurrently, then `after` plugins, then the report. Dispatches are
//! interleaved on the calling task rather than spawned, and their entries
//! come back in issuance order whatever order they settle in.

use std::sync::Arc;

use colored::Colorize;
use futures_util::future::join_all;

use super::dispatch::{DispatchRequest, Dispatcher, RunArgs, RunResult, Suite};
use super::merge::Layer;
use super::plugins::{run_phase, validate_phase};
use super::report::{report, AggregateEntry, Summary};
use super::schema::{Environment, IntegratorConfig, Phase};
use super::target::{expand_targets, Target};
use crate::common::{tap, Result};
use crate::session::SessionProvider;

/// Outcome of a complete multi-run
#[derive(Debug)]
pub struct RunReport {
    /// One entry per target, environment order then target order
    pub entries: Vec<AggregateEntry>,
    pub summary: Summary,
}

/// Top-level orchestrator
pub struct MultiRunner {
    default_layer: Layer,
    dispatcher: Dispatcher,
    provider: Option<Arc<dyn SessionProvider>>,
}

impl MultiRunner {
    /// Runner merging every target over `default_layer`
    pub fn new(default_layer: Layer, dispatcher: Dispatcher) -> Self {
        Self {
            default_layer,
            dispatcher,
            provider: None,
        }
    }

    /// Provision one session per target through `provider`
    pub fn with_provider(mut self, provider: Arc<dyn SessionProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Every target the run would dispatch, in issuance order
    pub fn targets(&self, config: &IntegratorConfig) -> Vec<Target> {
        config
            .environments
            .iter()
            .flat_map(|env| expand_targets(&self.default_layer, env))
            .collect()
    }

    /// Run the full pipeline
    ///
    /// `init_suite` is called once per target so no two dispatches share
    /// suite state. Plugin hooks of both phases are validated before
    /// anything runs. Only plugin failures are returned as errors; target
    /// failures end up in the report.
    pub async fn run<F>(&self, init_suite: F, args: &RunArgs, config: &IntegratorConfig) -> Result<RunReport>
    where
        F: Fn() -> Suite,
    {
        println!("{}", "integrator\n===========================".green());

        validate_phase(config, Phase::Before)?;
        validate_phase(config, Phase::After)?;

        run_phase(Phase::Before, config).await?;
        let entries = self.run_targets(&init_suite, args, config).await;
        let entries = tap(entries, |entries| {
            tracing::info!(targets = entries.len(), "All dispatches settled");
        });
        run_phase(Phase::After, config).await?;

        let summary = report(&entries);
        Ok(RunReport { entries, summary })
    }

    async fn run_targets<F>(&self, init_suite: &F, args: &RunArgs, config: &IntegratorConfig) -> Vec<AggregateEntry>
    where
        F: Fn() -> Suite,
    {
        let mut dispatches = Vec::with_capacity(config.target_count());
        for env in &config.environments {
            let env = Arc::new(env.clone());
            println!(
                "{}",
                format!(
                    "Running: {}\n  in {} configurations:",
                    env.env_name,
                    env.targets.len()
                )
                .cyan()
            );
            for target in expand_targets(&self.default_layer, &env) {
                println!("    {}", target.target_name());
                dispatches.push(self.run_target(init_suite(), args.clone(), target, env.clone()));
            }
        }
        join_all(dispatches).await
    }

    async fn run_target(&self, suite: Suite, args: RunArgs, target: Target, environment: Arc<Environment>) -> AggregateEntry {
        let mut request = DispatchRequest::new(suite).args(args).target(target.clone());
        if let Some(provider) = &self.provider {
            request = request.provider(provider.clone());
        }

        tracing::debug!(env = %environment.env_name, target = target.target_name(), "Dispatching");
        let run_result = RunResult::from(self.dispatcher.dispatch(request).await);
        tracing::info!(
            env = %environment.env_name,
            target = target.target_name(),
            result = run_result.type_name(),
            "Target settled"
        );

        AggregateEntry {
            target,
            environment,
            run_result,
        }
    }
}
