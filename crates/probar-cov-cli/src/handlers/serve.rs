//! Serve command handler

use crate::commands::ServeArgs;
use crate::error::{CliError, CliResult};
use crate::handlers::load_options;
use crate::output::Printer;
use crate::server::{CoverageServer, CoverageServerConfig, RunOutcome};

/// Build server config from CLI args
#[must_use]
pub fn build_server_config(args: &ServeArgs) -> CoverageServerConfig {
    CoverageServerConfig::builder()
        .directory(&args.dir)
        .port(args.port)
        .cors(args.cors)
        .client_root(args.client_root.as_str())
        .package(args.package.as_str())
        .once(args.once)
        .build()
}

/// Run the coverage server until Ctrl+C, or until the first run end with `--once`
pub fn run_serve(args: &ServeArgs, printer: &Printer) -> CliResult<()> {
    let options = load_options(args.config.as_deref())?;
    if options.include.is_empty() {
        printer.info("No include patterns configured; files are served uninstrumented");
    }
    let server = CoverageServer::new(build_server_config(args), options)?;
    printer.info(&format!("Serving {} at {}", args.dir.display(), server.http_url()));

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::server(format!("Failed to create runtime: {e}")))?;
    let outcome = rt.block_on(server.run())?;

    match outcome {
        Some(outcome) => {
            print_outcome(&outcome, printer);
            outcome.into_result()
        }
        None => Ok(()),
    }
}

/// Print a run outcome
pub fn print_outcome(outcome: &RunOutcome, printer: &Printer) {
    match outcome {
        RunOutcome::Passed { total, files, .. } => {
            printer.summary(total);
            printer.success(&format!("Coverage thresholds met ({files} files)"));
        }
        RunOutcome::Failed { failures } => {
            for failure in failures {
                printer.failure(failure);
            }
        }
        RunOutcome::Skipped { error } => {
            printer.info(&format!("Run failed, coverage not reported: {error}"));
        }
        RunOutcome::Error { message } => printer.failure(message),
    }
}
