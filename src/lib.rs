//! Integrator - multi-environment test orchestration
//!
//! This library merges layered configuration into concrete targets, runs a
//! suite of test actions against every target concurrently, and wraps the
//! whole run in plugin lifecycle hooks.

pub mod cli;
pub mod commands;
pub mod common;
pub mod integrator;
pub mod session;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use integrator::{
    Action, ActionContext, DispatchError, DispatchRequest, Dispatcher, Environment,
    IntegratorConfig, MultiRunner, Plugin, RunArgs, RunResult, Suite, Target,
};
