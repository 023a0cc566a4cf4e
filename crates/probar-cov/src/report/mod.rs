//! Coverage reporters
//!
//! Each [`ReporterKind`] maps to one [`Reporter`] writing into the report
//! directory. Reporters run after every run, before thresholds are checked,
//! so a failing run still leaves its reports behind.

mod cobertura;
mod json;
mod lcov;
mod text;

pub use cobertura::CoberturaReporter;
pub use json::{JsonReporter, JsonSummaryReporter};
pub use lcov::LcovReporter;
pub use text::{render_text_summary, TextSummaryReporter};

use crate::config::ReporterKind;
use crate::coverage::FinalCoverage;
use crate::result::{CoverageError, CoverageResult};
use std::fmt::Debug;
use std::fs;
use std::path::{Path, PathBuf};

/// Writes one report format
pub trait Reporter: Debug + Send + Sync {
    /// Format this reporter produces
    fn kind(&self) -> ReporterKind;

    /// Write the report into `dir`.
    ///
    /// Returns the written file, or `None` for reporters that only log.
    fn write(&self, coverage: &FinalCoverage, dir: &Path) -> CoverageResult<Option<PathBuf>>;
}

/// Reporter implementing `kind`
#[must_use]
pub fn reporter_for(kind: ReporterKind) -> Box<dyn Reporter> {
    match kind {
        ReporterKind::Json => Box::new(JsonReporter),
        ReporterKind::JsonSummary => Box::new(JsonSummaryReporter),
        ReporterKind::Lcov => Box::new(LcovReporter::default()),
        ReporterKind::Cobertura => Box::new(CoberturaReporter::default()),
        ReporterKind::TextSummary => Box::new(TextSummaryReporter),
    }
}

/// Run every reporter in `kinds`, creating `dir` first
pub fn write_reports(
    kinds: &[ReporterKind],
    coverage: &FinalCoverage,
    dir: &Path,
) -> CoverageResult<Vec<PathBuf>> {
    if kinds.is_empty() {
        return Ok(Vec::new());
    }
    fs::create_dir_all(dir)?;
    let mut written = Vec::new();
    for kind in kinds {
        if let Some(path) = reporter_for(*kind).write(coverage, dir)? {
            tracing::debug!(reporter = %kind, path = %path.display(), "coverage report written");
            written.push(path);
        }
    }
    Ok(written)
}

/// Write `content` to `dir/name`, attributing failures to `kind`
fn write_file(kind: ReporterKind, dir: &Path, name: &str, content: &str) -> CoverageResult<PathBuf> {
    let path = dir.join(name);
    fs::write(&path, content)
        .map_err(|e| CoverageError::report(kind.as_str(), format!("{}: {e}", path.display())))?;
    Ok(path)
}
