//! Multi-environment test orchestration
//!
//! Merges layered configuration into targets, runs a suite of actions
//! against each target concurrently, wraps the run in plugin lifecycle
//! hooks and reports pass/fail per target.

pub mod dispatch;
pub mod merge;
pub mod multi_runner;
pub mod plugins;
pub mod report;
pub mod schema;
pub mod shell;
pub mod target;

pub use dispatch::{
    Action, ActionContext, ActionRef, DispatchError, DispatchRequest, Dispatcher, RunArgs,
    RunResult, State, Suite,
};
pub use merge::{merge_layers, Layer};
pub use multi_runner::{MultiRunner, RunReport};
pub use plugins::{run_phase, validate_phase};
pub use report::{AggregateEntry, Summary};
pub use schema::{Environment, Hook, HookFn, IntegratorConfig, IntegratorFile, Phase, Plugin};
pub use shell::{ShellAction, ShellHook};
pub use target::{expand_targets, target_name, Target};
