//! CLI command handling
//!
//! Loads settings and the integrator config, then hands off to the
//! orchestration core.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;

use crate::commands::Commands;
use crate::common::config::Settings;
use crate::common::Result;
use crate::integrator::{
    validate_phase, Dispatcher, IntegratorFile, MultiRunner, Phase, RunArgs, Suite,
};
use crate::session::{install_signal_handler, ShutdownRegistry, WebDriverProvider};

/// Dispatch a CLI command
///
/// Returns whether every target passed; commands that run nothing return
/// `true` on success.
pub async fn dispatch(command: Commands) -> Result<bool> {
    match command {
        Commands::Run {
            config,
            only,
            no_session,
        } => run(&config, only, no_session).await,

        Commands::Targets { config } => {
            let settings = Settings::load()?;
            let file = IntegratorFile::load(&config)?;
            let runner = MultiRunner::new(settings.default_layer(), Dispatcher::default());

            for target in runner.targets(&file.config) {
                println!(
                    "{} / {}",
                    target.env_name().cyan(),
                    target.target_name().white().bold()
                );
                println!("  {}", target.to_value().to_string().dimmed());
            }
            Ok(true)
        }

        Commands::Validate { config } => {
            let file = IntegratorFile::load(&config)?;
            for phase in [Phase::Before, Phase::After] {
                validate_phase(&file.config, phase)?;
            }
            println!(
                "{} {} environments, {} targets, {} plugins, {} actions",
                "✓".green(),
                file.config.environments.len(),
                file.config.target_count(),
                file.config.plugins().count(),
                file.suite.len()
            );
            Ok(true)
        }
    }
}

async fn run(config: &Path, only: Option<String>, no_session: bool) -> Result<bool> {
    let settings = Settings::load()?;
    let file = IntegratorFile::load(config)?;

    if file.suite.is_empty() {
        tracing::warn!(config = %config.display(), "Config declares no suite actions");
    }

    let registry = ShutdownRegistry::global();
    install_signal_handler(registry.clone());

    let mut runner = MultiRunner::new(settings.default_layer(), Dispatcher::new(registry));
    if !no_session {
        let timeout = Duration::from_secs(settings.session.request_timeout_secs);
        runner = runner.with_provider(Arc::new(WebDriverProvider::new(timeout)?));
    }

    let actions = file.suite;
    let init_suite = || {
        actions
            .iter()
            .fold(Suite::new(), |suite, (key, action)| suite.with(key.clone(), action.clone()))
    };

    let report = runner
        .run(init_suite, &RunArgs { only }, &file.config)
        .await?;
    Ok(report.summary.all_passed())
}
