//! Plugin lifecycle phases
//!
//! Every hook of a phase is validated up front, then all of them run
//! concurrently. A malformed hook or any hook failure is fatal for the
//! whole multi-run.

use colored::Colorize;
use futures_util::future::try_join_all;

use super::schema::{Hook, IntegratorConfig, Phase};
use crate::common::{Error, Result};

/// Check that every hook declared for `phase` is callable
pub fn validate_phase(config: &IntegratorConfig, phase: Phase) -> Result<()> {
    for plugin in config.plugins() {
        if let Some(Hook::NotCallable { found }) = plugin.hook(phase) {
            return Err(Error::plugin_not_callable(plugin.name(), phase.as_str(), found));
        }
    }
    Ok(())
}

/// Run `phase` across every plugin of every environment
pub async fn run_phase(phase: Phase, config: &IntegratorConfig) -> Result<()> {
    println!("\n{}", format!("Running plugins ({}):", phase).cyan());
    validate_phase(config, phase)?;

    let calls = config.plugins().filter_map(|plugin| match plugin.hook(phase) {
        Some(Hook::Callable(hook)) => Some(async move {
            tracing::debug!(plugin = plugin.name(), phase = %phase, "Running plugin hook");
            hook.call(config).await.map_err(|e| {
                Error::plugin_failed(phase.as_str(), &format!("{}: {}", plugin.name(), e.chain()))
            })
        }),
        _ => None,
    });

    let results = try_join_all(calls).await?;
    tracing::info!(phase = %phase, hooks = results.len(), "Plugins finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrator::schema::{HookFn, Plugin};
    use crate::integrator::Environment;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    struct Counting(Arc<AtomicUsize>);

    #[async_trait]
    impl HookFn for Counting {
        async fn call(&self, _config: &IntegratorConfig) -> Result<Value> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Null)
        }
    }

    /// Waits until `peers` hooks are in flight at once
    struct Barrier {
        in_flight: Arc<AtomicUsize>,
        peers: usize,
    }

    #[async_trait]
    impl HookFn for Barrier {
        async fn call(&self, _config: &IntegratorConfig) -> Result<Value> {
            self.in_flight.fetch_add(1, Ordering::SeqCst);
            while self.in_flight.load(Ordering::SeqCst) < self.peers {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
            Ok(Value::Null)
        }
    }

    struct Failing;

    #[async_trait]
    impl HookFn for Failing {
        async fn call(&self, _config: &IntegratorConfig) -> Result<Value> {
            Err(Error::Internal("database unreachable".to_string()))
        }
    }

    fn config_with(plugins: Vec<Plugin>) -> IntegratorConfig {
        let mut builder = Environment::builder("dev");
        for plugin in plugins {
            builder = builder.plugin(plugin);
        }
        IntegratorConfig::new(vec![builder.build()])
    }

    #[tokio::test]
    async fn test_runs_only_hooks_for_phase() {
        let before = Arc::new(AtomicUsize::new(0));
        let after = Arc::new(AtomicUsize::new(0));
        let config = config_with(vec![
            Plugin::new("a")
                .on(Phase::Before, Counting(before.clone()))
                .on(Phase::After, Counting(after.clone())),
            Plugin::new("b").on(Phase::Before, Counting(before.clone())),
        ]);

        run_phase(Phase::Before, &config).await.unwrap();
        assert_eq!(before.load(Ordering::SeqCst), 2);
        assert_eq!(after.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_hooks_run_concurrently() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let config = config_with(
            (0..3)
                .map(|i| {
                    Plugin::new(format!("p{}", i)).on(
                        Phase::After,
                        Barrier {
                            in_flight: in_flight.clone(),
                            peers: 3,
                        },
                    )
                })
                .collect(),
        );

        tokio::time::timeout(Duration::from_secs(5), run_phase(Phase::After, &config))
            .await
            .expect("hooks should not wait on each other")
            .unwrap();
    }

    #[tokio::test]
    async fn test_not_callable_hook_fails_before_any_call() {
        let calls = Arc::new(AtomicUsize::new(0));
        let config = config_with(vec![
            Plugin::new("good").on(Phase::Before, Counting(calls.clone())),
            Plugin::new("bad").with_hook(
                Phase::Before,
                Hook::NotCallable {
                    found: "number".to_string(),
                },
            ),
        ]);

        let err = run_phase(Phase::Before, &config).await.unwrap_err();
        match err {
            Error::PluginNotCallable { plugin, phase, .. } => {
                assert_eq!(plugin, "bad");
                assert_eq!(phase, "before");
            }
            other => panic!("Expected PluginNotCallable, got {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_malformed_other_phase_is_ignored() {
        let config = config_with(vec![Plugin::new("x").with_hook(
            Phase::After,
            Hook::NotCallable {
                found: "list".to_string(),
            },
        )]);
        assert!(run_phase(Phase::Before, &config).await.is_ok());
        assert!(validate_phase(&config, Phase::After).is_err());
    }

    #[tokio::test]
    async fn test_hook_failure_is_fatal() {
        let config = config_with(vec![Plugin::new("db").on(Phase::After, Failing)]);
        let err = run_phase(Phase::After, &config).await.unwrap_err();
        match err {
            Error::PluginFailed { phase, message } => {
                assert_eq!(phase, "after");
                assert!(message.contains("db"));
                assert!(message.contains("database unreachable"));
            }
            other => panic!("Expected PluginFailed, got {:?}", other),
        }
    }
}
