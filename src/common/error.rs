//! Error types for the integrator
//!
//! Everything in here is fatal for a multi-run. Per-target test failures
//! never travel through this type; they are carried by
//! [`DispatchError`](crate::integrator::DispatchError) instead.

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the integrator
#[derive(Error, Debug)]
pub enum Error {
    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Plugin Errors ===
    #[error("Plugin {plugin} '{phase}' property is not a function (found {found})")]
    PluginNotCallable {
        plugin: String,
        phase: String,
        found: String,
    },

    #[error("Plugins failed to run successfully ({phase}): {message}")]
    PluginFailed { phase: String, message: String },

    // === Session Errors ===
    #[error("Failed to start session on {hub}: {message}")]
    SessionStart { hub: String, message: String },

    #[error("Failed to quit session {id}: {message}")]
    SessionQuit { id: String, message: String },

    // === Action Errors ===
    #[error("Command '{command}' failed with exit code {code:?}: {stderr}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Command '{command}' failed to execute: {source}")]
    CommandSpawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("Test assertion failed: {0}")]
    TestAssertion(String),

    // === Transport Errors ===
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a malformed plugin hook error
    pub fn plugin_not_callable(plugin: &str, phase: &str, found: &str) -> Self {
        Self::PluginNotCallable {
            plugin: plugin.to_string(),
            phase: phase.to_string(),
            found: found.to_string(),
        }
    }

    /// Create a plugin hook failure error
    pub fn plugin_failed(phase: &str, message: &str) -> Self {
        Self::PluginFailed {
            phase: phase.to_string(),
            message: message.to_string(),
        }
    }

    /// Create a session start error
    pub fn session_start(hub: &str, message: &str) -> Self {
        Self::SessionStart {
            hub: hub.to_string(),
            message: message.to_string(),
        }
    }

    /// Render the error together with its `source()` chain, one cause per line
    pub fn chain(&self) -> String {
        render_chain(self)
    }
}

/// Render any error with its full source chain
pub fn render_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str("\n    caused by: ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugin_not_callable_message_names_plugin_and_phase() {
        let err = Error::plugin_not_callable("seed-db", "before", "number");
        let msg = err.to_string();
        assert!(msg.contains("seed-db"));
        assert!(msg.contains("'before'"));
        assert!(msg.contains("not a function"));
    }

    #[test]
    fn test_chain_includes_sources() {
        let err = Error::CommandSpawn {
            command: "./seed.sh".to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "missing"),
        };
        assert_eq!(
            err.chain(),
            "Command './seed.sh' failed to execute: missing\n    caused by: missing"
        );
    }
}
