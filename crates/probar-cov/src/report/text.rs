//! Text summary reporter
//!
//! Logs the run totals at info level instead of writing a file.

use super::Reporter;
use crate::config::ReporterKind;
use crate::coverage::{CoverageSummary, FinalCoverage, Metric};
use crate::result::CoverageResult;
use std::path::{Path, PathBuf};

const RULE: &str = "=============================== Coverage summary ===============================";
const END_RULE: &str = "================================================================================";

/// Logs the coverage summary through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TextSummaryReporter;

impl Reporter for TextSummaryReporter {
    fn kind(&self) -> ReporterKind {
        ReporterKind::TextSummary
    }

    fn write(&self, coverage: &FinalCoverage, _dir: &Path) -> CoverageResult<Option<PathBuf>> {
        for line in render_text_summary(&coverage.total).lines() {
            tracing::info!("{line}");
        }
        Ok(None)
    }
}

/// Render the summary block, one line per metric
#[must_use]
pub fn render_text_summary(total: &CoverageSummary) -> String {
    let mut out = String::new();
    out.push_str(RULE);
    out.push('\n');
    for metric in Metric::ALL {
        let totals = total.get(metric);
        let label = capitalize(metric.as_str());
        out.push_str(&format!(
            "{label:<12} : {}% ( {}/{} )\n",
            totals.pct, totals.covered, totals.total
        ));
    }
    out.push_str(END_RULE);
    out.push('\n');
    out
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_ascii_uppercase().to_string() + chars.as_str()
    })
}
