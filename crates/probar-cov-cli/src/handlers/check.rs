//! Check command handler
//!
//! Offline counterpart of a run end: merge saved coverage, write the
//! configured reports, then validate thresholds.

use crate::commands::CheckArgs;
use crate::error::{CliError, CliResult};
use crate::handlers::load_options;
use crate::output::Printer;
use probar_cov::{
    write_reports, CoverageCollector, CoverageMap, FinalCoverage, ThresholdValidator,
    ValidationReport,
};
use std::path::{Path, PathBuf};

/// Outcome of a successful check
#[derive(Debug)]
pub struct CheckOutcome {
    /// Merged coverage
    pub coverage: FinalCoverage,
    /// Report files written
    pub reports: Vec<PathBuf>,
    /// Passed threshold checks
    pub validation: ValidationReport,
}

/// Read a coverage file: a bare coverage map or a `{"__coverage__": ..}` payload
pub fn read_coverage_file(path: &Path) -> CliResult<CoverageMap> {
    let source = std::fs::read_to_string(path)?;
    let mut value: serde_json::Value = serde_json::from_str(&source)
        .map_err(|e| CliError::invalid_argument(format!("{}: {e}", path.display())))?;
    if let Some(payload) = value.get_mut("__coverage__") {
        value = payload.take();
    }
    if value.is_null() {
        return Ok(CoverageMap::new());
    }
    serde_json::from_value(value)
        .map_err(|e| CliError::invalid_argument(format!("{}: {e}", path.display())))
}

/// Merge `args.files`, write reports and validate thresholds
pub fn run_check(args: &CheckArgs) -> CliResult<CheckOutcome> {
    let options = load_options(args.config.as_deref())?;
    let mut collector = CoverageCollector::new();
    for file in &args.files {
        let map = read_coverage_file(file)?;
        tracing::debug!(file = %file.display(), files = map.len(), "coverage file loaded");
        collector.add(&map);
    }
    let coverage = collector.finalize();

    let dir = args.dir.clone().unwrap_or_else(|| options.dir.clone());
    let reports = write_reports(&options.reporters, &coverage, &dir)?;
    let validation = ThresholdValidator::new(options.thresholds)
        .validate(&coverage)
        .into_result()?;
    Ok(CheckOutcome {
        coverage,
        reports,
        validation,
    })
}

/// Run the check command and print the result
pub fn execute_check(args: &CheckArgs, printer: &Printer) -> CliResult<()> {
    match run_check(args) {
        Ok(outcome) => {
            printer.summary(&outcome.coverage.total);
            for report in &outcome.reports {
                printer.info(&format!("Wrote {}", report.display()));
            }
            printer.success(&format!(
                "Coverage thresholds met ({} files, {} checks)",
                outcome.coverage.files.len(),
                outcome.validation.checks.len()
            ));
            Ok(())
        }
        Err(e) => {
            if let Some(failures) = e.threshold_failures() {
                for failure in failures {
                    printer.failure(failure);
                }
            }
            Err(e)
        }
    }
}
