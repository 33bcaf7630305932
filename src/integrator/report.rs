//! Result reporting
//!
//! Prints one block per target in issuance order and tallies the outcome.
//! Reporting never changes control flow.

use std::sync::Arc;

use colored::Colorize;

use super::dispatch::RunResult;
use super::schema::Environment;
use super::target::Target;

/// One target's normalized outcome
#[derive(Debug, Clone)]
pub struct AggregateEntry {
    pub target: Target,
    pub environment: Arc<Environment>,
    pub run_result: RunResult,
}

/// Tally of a reported run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub passed: usize,
    pub failed: usize,
}

impl Summary {
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }

    pub fn total(&self) -> usize {
        self.passed + self.failed
    }
}

/// Plain-text report block for one entry
pub fn format_entry(entry: &AggregateEntry) -> String {
    let env_name = entry.target.env_name();
    let target_name = entry.target.target_name();
    match &entry.run_result {
        RunResult::Fail(err) => format!(
            "Failed: {}\n  on {}\n  in {}\n{}",
            err.action().map(|a| a.describe()).unwrap_or_default(),
            env_name,
            target_name,
            err.stack()
        ),
        RunResult::Pass(_) => format!("Passed:\n  on {}\n  in {}", env_name, target_name),
    }
}

/// Print every entry and return the tally
pub fn report(entries: &[AggregateEntry]) -> Summary {
    let mut summary = Summary::default();
    for entry in entries {
        let block = format_entry(entry);
        if entry.run_result.is_pass() {
            summary.passed += 1;
            println!("\n{}", block.green());
        } else {
            summary.failed += 1;
            eprintln!("\n{}", block.red());
        }
        tracing::debug!(
            env = entry.environment.env_name.as_str(),
            target = entry.target.target_name(),
            result = entry.run_result.type_name(),
            "Reported"
        );
    }

    let line = format!("{} passed, {} failed", summary.passed, summary.failed);
    if summary.all_passed() {
        println!("\n{}", line.green().bold());
    } else {
        println!("\n{}", line.red().bold());
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrator::dispatch::{Action, ActionContext, ActionRef, DispatchError, State};
    use async_trait::async_trait;
    use serde_json::{json, Map};

    struct Noop;

    #[async_trait]
    impl Action for Noop {
        async fn run(&self, _ctx: &ActionContext, state: State) -> crate::Result<State> {
            Ok(state)
        }

        fn description(&self) -> Option<String> {
            Some("opens the page".to_string())
        }
    }

    fn entry(run_result: RunResult) -> AggregateEntry {
        let mut config = Map::new();
        config.insert("browserName".into(), json!("chrome"));
        AggregateEntry {
            target: Target::new("dev", config),
            environment: Arc::new(Environment::builder("dev").build()),
            run_result,
        }
    }

    #[test]
    fn test_pass_block_names_env_and_target() {
        let text = format_entry(&entry(RunResult::Pass(json!({}))));
        assert_eq!(text, "Passed:\n  on dev\n  in chrome");
    }

    #[test]
    fn test_fail_block_includes_action_and_stack() {
        let err = DispatchError::TestsFailed {
            action: ActionRef {
                key: "open".to_string(),
                action: Arc::new(Noop),
            },
            message: "Nope.".to_string(),
            stack: "Nope.\n    in action 'open'".to_string(),
        };
        let text = format_entry(&entry(RunResult::Fail(err)));
        assert!(text.starts_with("Failed: open (opens the page)\n  on dev\n  in chrome\n"));
        assert!(text.ends_with("in action 'open'"));
    }

    #[test]
    fn test_fail_without_action_leaves_description_empty() {
        let err = DispatchError::SessionUnavailable {
            message: "refused".to_string(),
            stack: "refused".to_string(),
        };
        let text = format_entry(&entry(RunResult::Fail(err)));
        assert!(text.starts_with("Failed: \n  on dev"));
    }

    #[test]
    fn test_report_tallies() {
        let entries = vec![
            entry(RunResult::Pass(json!(1))),
            entry(RunResult::Fail(DispatchError::SessionUnavailable {
                message: "m".into(),
                stack: "s".into(),
            })),
            entry(RunResult::Pass(json!(2))),
        ];
        let summary = report(&entries);
        assert_eq!(summary, Summary { passed: 2, failed: 1 });
        assert_eq!(summary.total(), 3);
        assert!(!summary.all_passed());
    }
}
