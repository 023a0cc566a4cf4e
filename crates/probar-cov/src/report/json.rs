//! JSON reporters
//!
//! `coverage-final.json` holds the merged coverage map in Istanbul layout.
//! `coverage-summary.json` holds a `total` entry followed by one entry per file.

use super::{write_file, Reporter};
use crate::config::ReporterKind;
use crate::coverage::FinalCoverage;
use crate::result::CoverageResult;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Writes `coverage-final.json`
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonReporter;

impl Reporter for JsonReporter {
    fn kind(&self) -> ReporterKind {
        ReporterKind::Json
    }

    fn write(&self, coverage: &FinalCoverage, dir: &Path) -> CoverageResult<Option<PathBuf>> {
        let json = serde_json::to_string(&coverage.coverage)?;
        write_file(self.kind(), dir, "coverage-final.json", &json).map(Some)
    }
}

/// Writes `coverage-summary.json`
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSummaryReporter;

impl JsonSummaryReporter {
    /// Summary document
    pub fn summary(coverage: &FinalCoverage) -> CoverageResult<Value> {
        let mut doc = Map::new();
        let _ = doc.insert("total".to_string(), serde_json::to_value(coverage.total)?);
        for (path, summary) in &coverage.files {
            let _ = doc.insert(path.clone(), serde_json::to_value(summary)?);
        }
        Ok(Value::Object(doc))
    }
}

impl Reporter for JsonSummaryReporter {
    fn kind(&self) -> ReporterKind {
        ReporterKind::JsonSummary
    }

    fn write(&self, coverage: &FinalCoverage, dir: &Path) -> CoverageResult<Option<PathBuf>> {
        let json = serde_json::to_string_pretty(&Self::summary(coverage)?)?;
        write_file(self.kind(), dir, "coverage-summary.json", &json).map(Some)
    }
}
