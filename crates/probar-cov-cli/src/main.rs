//! probar-cov: coverage-instrumenting test server
//!
//! ## Usage
//!
//! ```bash
//! probar-cov serve --dir site --config coverage.yaml --client-root /components --package my-app
//! probar-cov serve --dir site --config coverage.yaml --once   # exit with the run's result
//! probar-cov check --config coverage.yaml chrome.json firefox.json
//! ```

use clap::Parser;
use probar_cov_cli::{
    handlers::{check::execute_check, serve::run_serve},
    Cli, CliConfig, CliResult, Commands, Printer, Verbosity,
};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();
    let config = build_config(&cli);
    init_tracing(config.verbosity);

    let printer = Printer::new(config.color.should_color(), config.verbosity.is_quiet());
    match cli.command {
        Commands::Serve(args) => run_serve(&args, &printer),
        Commands::Check(args) => execute_check(&args, &printer),
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    CliConfig::new()
        .with_verbosity(Verbosity::from_flags(cli.quiet, cli.verbose))
        .with_color(cli.color.into())
}

/// `RUST_LOG` wins; otherwise the verbosity flags pick the level
fn init_tracing(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.filter_directive()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
