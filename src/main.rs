//! Integrator - multi-environment test runner
//!
//! Explodes one config into many targets, runs a suite against each of them
//! concurrently and reports pass/fail per target.

use clap::Parser;
use colored::Colorize;
use commands::Commands;
use integrator::{cli, commands, common::logging};

#[derive(Parser)]
#[command(name = "integrator", about = "Run a test suite across environments and targets")]
#[command(version, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_cli(cli.verbose);

    match cli::dispatch(cli.command).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("\n{}\n{}", "Something went wrong.".red().bold(), e.chain());
            std::process::exit(2);
        }
    }
}
