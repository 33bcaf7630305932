//! CLI command definitions
//!
//! Defines the clap commands for the integrator CLI.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run the suite against every target of every environment
    Run {
        /// Path to the integrator config (YAML)
        config: PathBuf,

        /// Run only the suite action with this exact key
        #[arg(long)]
        only: Option<String>,

        /// Don't start a WebDriver session per target
        #[arg(long)]
        no_session: bool,
    },

    /// List the expanded targets without running anything
    Targets {
        /// Path to the integrator config (YAML)
        config: PathBuf,
    },

    /// Check that every plugin hook is runnable
    Validate {
        /// Path to the integrator config (YAML)
        config: PathBuf,
    },
}
