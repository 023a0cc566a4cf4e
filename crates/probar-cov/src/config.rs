//! Plugin configuration
//!
//! Loaded from YAML or JSON:
//!
//! ```yaml
//! include: ["**/*.js", "**/*.html"]
//! exclude: ["test/**", "vendor/**"]
//! dir: coverage
//! reporters: [json, lcov, text-summary]
//! thresholds:
//!   global: 80
//!   each:
//!     default: 50
//!     branches: 0
//! ```

use crate::coverage::Metric;
use crate::matcher::MatchRules;
use crate::result::{CoverageError, CoverageResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Output format of a coverage reporter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReporterKind {
    /// `coverage-final.json`: the merged coverage map
    Json,
    /// `coverage-summary.json`: per-file and total summaries
    JsonSummary,
    /// `lcov.info`
    #[serde(alias = "lcovonly")]
    Lcov,
    /// `cobertura-coverage.xml`
    Cobertura,
    /// Summary table through `tracing`
    TextSummary,
}

impl ReporterKind {
    /// Configuration name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::JsonSummary => "json-summary",
            Self::Lcov => "lcov",
            Self::Cobertura => "cobertura",
            Self::TextSummary => "text-summary",
        }
    }
}

impl fmt::Display for ReporterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-metric thresholds of one granularity
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetricThresholds {
    /// Applies to every metric without its own value
    pub default: Option<f64>,
    /// Statements
    pub statements: Option<f64>,
    /// Branches
    pub branches: Option<f64>,
    /// Functions
    pub functions: Option<f64>,
    /// Lines
    pub lines: Option<f64>,
}

/// Threshold level: a scalar for all metrics or per-metric values
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ThresholdLevel {
    /// Same threshold for every metric
    All(f64),
    /// Individual thresholds
    PerMetric(MetricThresholds),
}

impl ThresholdLevel {
    /// Threshold for `metric`: its own value, else the level default.
    ///
    /// `None` means the metric is not checked.
    #[must_use]
    pub fn for_metric(&self, metric: Metric) -> Option<f64> {
        match self {
            Self::All(value) => Some(*value),
            Self::PerMetric(m) => {
                let specific = match metric {
                    Metric::Statements => m.statements,
                    Metric::Branches => m.branches,
                    Metric::Functions => m.functions,
                    Metric::Lines => m.lines,
                };
                specific.or(m.default)
            }
        }
    }
}

/// Global and per-file thresholds
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThresholdConfig {
    /// Checked against the run total
    pub global: Option<ThresholdLevel>,
    /// Checked against every file
    pub each: Option<ThresholdLevel>,
}

impl ThresholdConfig {
    /// True if no threshold is configured
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.global.is_none() && self.each.is_none()
    }
}

/// Coverage plugin options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoverageOptions {
    /// Globs selecting assets to instrument; empty matches nothing
    pub include: Vec<String>,
    /// Globs removing assets from `include`
    pub exclude: Vec<String>,
    /// Report directory, relative to the served root
    pub dir: PathBuf,
    /// Reporters to run at the end of each run
    pub reporters: Vec<ReporterKind>,
    /// Pass/fail thresholds
    pub thresholds: ThresholdConfig,
}

impl Default for CoverageOptions {
    fn default() -> Self {
        Self {
            include: Vec::new(),
            exclude: Vec::new(),
            dir: PathBuf::from("coverage"),
            reporters: vec![
                ReporterKind::Json,
                ReporterKind::Lcov,
                ReporterKind::TextSummary,
            ],
            thresholds: ThresholdConfig::default(),
        }
    }
}

impl CoverageOptions {
    /// Create default options
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse options from YAML (JSON is accepted too)
    pub fn from_yaml_str(source: &str) -> CoverageResult<Self> {
        if source.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml_ng::from_str(source).map_err(|e| CoverageError::config(e.to_string()))
    }

    /// Load options from a YAML or JSON file
    pub fn from_file(path: impl AsRef<Path>) -> CoverageResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&source).map_err(|e| match e {
            CoverageError::Config { message } => {
                CoverageError::config(format!("{}: {message}", path.display()))
            }
            other => other,
        })
    }

    /// Set include globs
    #[must_use]
    pub fn with_include<S: Into<String>>(mut self, include: impl IntoIterator<Item = S>) -> Self {
        self.include = include.into_iter().map(Into::into).collect();
        self
    }

    /// Set exclude globs
    #[must_use]
    pub fn with_exclude<S: Into<String>>(mut self, exclude: impl IntoIterator<Item = S>) -> Self {
        self.exclude = exclude.into_iter().map(Into::into).collect();
        self
    }

    /// Set the report directory
    #[must_use]
    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = dir.into();
        self
    }

    /// Set the reporters
    #[must_use]
    pub fn with_reporters(mut self, reporters: Vec<ReporterKind>) -> Self {
        self.reporters = reporters;
        self
    }

    /// Set the thresholds
    #[must_use]
    pub const fn with_thresholds(mut self, thresholds: ThresholdConfig) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Compile the include/exclude globs
    pub fn match_rules(&self) -> CoverageResult<MatchRules> {
        MatchRules::new(self.include.as_slice(), self.exclude.as_slice())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let opts = CoverageOptions::default();
        assert!(opts.include.is_empty());
        assert_eq!(opts.dir, PathBuf::from("coverage"));
        assert_eq!(
            opts.reporters,
            vec![ReporterKind::Json, ReporterKind::Lcov, ReporterKind::TextSummary]
        );
        assert!(opts.thresholds.is_empty());
    }

    #[test]
    fn test_empty_source_is_default() {
        assert_eq!(
            CoverageOptions::from_yaml_str("  \n").unwrap(),
            CoverageOptions::default()
        );
    }

    #[test]
    fn test_parse_full_yaml() {
        let yaml = r#"
include: ["**/*.js"]
exclude: ["vendor/**"]
dir: out/cov
reporters: [json-summary, lcovonly, cobertura]
thresholds:
  global: 80
  each:
    default: 50
    branches: 0
"#;
        let opts = CoverageOptions::from_yaml_str(yaml).unwrap();
        assert_eq!(opts.include, vec!["**/*.js"]);
        assert_eq!(opts.dir, PathBuf::from("out/cov"));
        assert_eq!(
            opts.reporters,
            vec![
                ReporterKind::JsonSummary,
                ReporterKind::Lcov,
                ReporterKind::Cobertura
            ]
        );
        let global = opts.thresholds.global.unwrap();
        assert_eq!(global.for_metric(Metric::Lines), Some(80.0));
        let each = opts.thresholds.each.unwrap();
        assert_eq!(each.for_metric(Metric::Statements), Some(50.0));
        assert_eq!(each.for_metric(Metric::Branches), Some(0.0));
    }

    #[test]
    fn test_parse_json() {
        let json = r#"{"include": ["*.js"], "thresholds": {"each": {"lines": -10}}}"#;
        let opts = CoverageOptions::from_yaml_str(json).unwrap();
        let each = opts.thresholds.each.unwrap();
        assert_eq!(each.for_metric(Metric::Lines), Some(-10.0));
        assert_eq!(each.for_metric(Metric::Functions), None);
        assert!(opts.thresholds.global.is_none());
    }

    #[test]
    fn test_unknown_reporter_is_config_error() {
        let err = CoverageOptions::from_yaml_str("reporters: [html-spa]").unwrap_err();
        assert!(matches!(err, CoverageError::Config { .. }));
    }

    #[test]
    fn test_unknown_key_is_config_error() {
        let err = CoverageOptions::from_yaml_str("inclde: ['*.js']").unwrap_err();
        assert!(matches!(err, CoverageError::Config { .. }));
    }

    #[test]
    fn test_from_file_names_the_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("coverage.yaml");
        std::fs::write(&path, "thresholds: {global: nope}").unwrap();
        let err = CoverageOptions::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("coverage.yaml"));

        let missing = CoverageOptions::from_file(dir.path().join("missing.yaml")).unwrap_err();
        assert!(matches!(missing, CoverageError::Io(_)));
    }

    #[test]
    fn test_builders_and_rules() {
        let opts = CoverageOptions::new()
            .with_include(["*.js"])
            .with_exclude(["skip.js"])
            .with_dir("reports")
            .with_reporters(vec![ReporterKind::Json]);
        let rules = opts.match_rules().unwrap();
        assert!(rules.is_eligible("a.js"));
        assert!(!rules.is_eligible("skip.js"));
        assert_eq!(opts.dir, PathBuf::from("reports"));
    }

    #[test]
    fn test_reporter_names() {
        assert_eq!(ReporterKind::TextSummary.to_string(), "text-summary");
        let json = serde_json::to_string(&ReporterKind::JsonSummary).unwrap();
        assert_eq!(json, "\"json-summary\"");
    }
}
