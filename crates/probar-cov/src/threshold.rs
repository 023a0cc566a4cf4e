//! Threshold validation
//!
//! Every configured `(granularity, metric)` pair becomes one [`ThresholdCheck`].
//! A non-negative threshold is a minimum percentage; a negative threshold is
//! the maximum number of uncovered items allowed.

use crate::config::{ThresholdConfig, ThresholdLevel};
use crate::coverage::{FinalCoverage, Metric, Totals};
use crate::result::{CoverageError, CoverageResult};
use serde::Serialize;
use std::fmt;

/// Where a threshold applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// Run total
    Global,
    /// Every file on its own
    Each,
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Global => "global",
            Self::Each => "each",
        })
    }
}

/// Result of one `(granularity, metric)` check
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdCheck {
    /// Granularity
    pub granularity: Granularity,
    /// Metric
    pub metric: Metric,
    /// Configured threshold
    pub threshold: f64,
    /// Global percentage, or uncovered count for negative thresholds.
    /// For `each` checks: the lowest value among files.
    pub actual: f64,
    /// Files below the threshold (`each` only)
    pub failed_files: Vec<String>,
    /// Outcome
    pub passed: bool,
}

impl ThresholdCheck {
    /// Human readable failure message, `None` if the check passed
    #[must_use]
    pub fn message(&self) -> Option<String> {
        if self.passed {
            return None;
        }
        let metric = self.metric;
        let expected = self.threshold;
        let text = match (self.granularity, expected < 0.0) {
            (Granularity::Global, false) => format!(
                "Coverage for {metric} ({}%) does not meet global threshold ({expected}%)",
                self.actual
            ),
            (Granularity::Global, true) => format!(
                "Uncovered {metric} count ({}) exceeds global threshold ({})",
                self.actual, -expected
            ),
            (Granularity::Each, negative) => {
                let mut text = if negative {
                    format!(
                        "Uncovered {metric} count exceeds per-file threshold ({}) in files:",
                        -expected
                    )
                } else {
                    format!("Coverage threshold ({expected}%) not met for {metric} in files:")
                };
                for file in &self.failed_files {
                    text.push_str("\n  ");
                    text.push_str(file);
                }
                text
            }
        };
        Some(text)
    }
}

/// All checks of one validation
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    /// Checks in granularity then metric order
    pub checks: Vec<ThresholdCheck>,
}

impl ValidationReport {
    /// True if every check passed
    #[must_use]
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    /// Failed checks
    pub fn failures(&self) -> impl Iterator<Item = &ThresholdCheck> {
        self.checks.iter().filter(|c| !c.passed)
    }

    /// One message per failed check
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.failures().filter_map(ThresholdCheck::message).collect()
    }

    /// `Err(ThresholdFailure)` if any check failed
    pub fn into_result(self) -> CoverageResult<Self> {
        if self.passed() {
            Ok(self)
        } else {
            Err(CoverageError::ThresholdFailure {
                failures: self.messages(),
            })
        }
    }
}

/// Evaluates [`ThresholdConfig`] against finalized coverage
#[derive(Debug, Clone, Copy, Default)]
pub struct ThresholdValidator {
    config: ThresholdConfig,
}

impl ThresholdValidator {
    /// Validator for `config`
    #[must_use]
    pub const fn new(config: ThresholdConfig) -> Self {
        Self { config }
    }

    /// Run every configured check; failures are logged at error level
    #[must_use]
    pub fn validate(&self, coverage: &FinalCoverage) -> ValidationReport {
        let mut checks = Vec::new();
        if let Some(level) = &self.config.global {
            checks.extend(global_checks(level, coverage));
        }
        if let Some(level) = &self.config.each {
            checks.extend(each_checks(level, coverage));
        }
        let report = ValidationReport { checks };
        for message in report.messages() {
            tracing::error!("{message}");
        }
        report
    }
}

fn global_checks(level: &ThresholdLevel, coverage: &FinalCoverage) -> Vec<ThresholdCheck> {
    Metric::ALL
        .into_iter()
        .filter_map(|metric| {
            let threshold = level.for_metric(metric)?;
            let totals = coverage.total.get(metric);
            Some(ThresholdCheck {
                granularity: Granularity::Global,
                metric,
                threshold,
                actual: measured(totals, threshold),
                failed_files: Vec::new(),
                passed: meets(totals, threshold),
            })
        })
        .collect()
}

fn each_checks(level: &ThresholdLevel, coverage: &FinalCoverage) -> Vec<ThresholdCheck> {
    Metric::ALL
        .into_iter()
        .filter_map(|metric| {
            let threshold = level.for_metric(metric)?;
            let mut failed_files = Vec::new();
            let mut worst: Option<f64> = None;
            for (path, summary) in &coverage.files {
                let totals = summary.get(metric);
                let value = measured(totals, threshold);
                worst = Some(match worst {
                    None => value,
                    Some(w) if threshold < 0.0 => w.max(value),
                    Some(w) => w.min(value),
                });
                if !meets(totals, threshold) {
                    failed_files.push(path.clone());
                }
            }
            Some(ThresholdCheck {
                granularity: Granularity::Each,
                metric,
                threshold,
                actual: worst.unwrap_or(if threshold < 0.0 { 0.0 } else { 100.0 }),
                passed: failed_files.is_empty(),
                failed_files,
            })
        })
        .collect()
}

fn measured(totals: Totals, threshold: f64) -> f64 {
    if threshold < 0.0 {
        totals.uncovered() as f64
    } else {
        totals.pct
    }
}

fn meets(totals: Totals, threshold: f64) -> bool {
    if threshold < 0.0 {
        totals.uncovered() as f64 <= -threshold
    } else {
        totals.pct >= threshold
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::MetricThresholds;
    use crate::coverage::{CoverageMap, FileCoverage, Range};

    fn file(path: &str, hits: &[u64]) -> FileCoverage {
        let mut fc = FileCoverage::new(path);
        for (i, hit) in hits.iter().enumerate() {
            let id = fc.add_statement(Range::on_line(i as u32 + 1, 0, 4));
            fc.s.insert(id, *hit);
        }
        fc
    }

    /// `covered` of `total` statements hit, on distinct lines
    fn coverage_of(files: &[(&str, u64, u64)]) -> FinalCoverage {
        let map: CoverageMap = files
            .iter()
            .map(|(path, covered, total)| {
                let hits: Vec<u64> = (0..*total).map(|i| u64::from(i < *covered)).collect();
                file(path, &hits)
            })
            .collect();
        FinalCoverage::from_map(map)
    }

    fn global(value: f64) -> ThresholdConfig {
        ThresholdConfig {
            global: Some(ThresholdLevel::All(value)),
            each: None,
        }
    }

    #[test]
    fn test_boundary_exact_threshold_passes() {
        // 8000 of 10000 -> 80.00%
        let cov = coverage_of(&[("/a.js", 8000, 10_000)]);
        let report = ThresholdValidator::new(global(80.0)).validate(&cov);
        let statements = &report.checks[0];
        assert_eq!(statements.metric, Metric::Statements);
        assert!(statements.passed);
    }

    #[test]
    fn test_boundary_just_below_fails() {
        // 7999 of 10000 -> 79.99%
        let cov = coverage_of(&[("/a.js", 7999, 10_000)]);
        let report = ThresholdValidator::new(global(80.0)).validate(&cov);
        assert!(!report.passed());
        let messages = report.messages();
        assert!(messages.contains(
            &"Coverage for statements (79.99%) does not meet global threshold (80%)".to_string()
        ));
        assert!(messages
            .iter()
            .any(|m| m.starts_with("Coverage for lines (79.99%)")));
    }

    #[test]
    fn test_metric_order() {
        let cov = coverage_of(&[("/a.js", 0, 2)]);
        let report = ThresholdValidator::new(global(10.0)).validate(&cov);
        let metrics: Vec<Metric> = report.checks.iter().map(|c| c.metric).collect();
        assert_eq!(metrics, Metric::ALL.to_vec());
        // no branches or functions: 100%
        assert!(report.checks[1].passed);
        assert!(report.checks[3].passed);
        assert!(!report.checks[0].passed);
    }

    #[test]
    fn test_each_names_offending_files() {
        let cov = coverage_of(&[("/srv/a.js", 2, 2), ("/srv/b.js", 0, 3)]);
        let config = ThresholdConfig {
            global: None,
            each: Some(ThresholdLevel::All(50.0)),
        };
        let report = ThresholdValidator::new(config).validate(&cov);
        assert!(!report.passed());
        let statements = report
            .failures()
            .find(|c| c.metric == Metric::Statements)
            .unwrap();
        assert_eq!(statements.failed_files, vec!["/srv/b.js"]);
        assert_eq!(statements.actual, 0.0);
        assert_eq!(
            statements.message().unwrap(),
            "Coverage threshold (50%) not met for statements in files:\n  /srv/b.js"
        );
    }

    #[test]
    fn test_negative_threshold_limits_uncovered_count() {
        let cov = coverage_of(&[("/a.js", 7, 10)]);
        let pass = ThresholdValidator::new(global(-3.0)).validate(&cov);
        assert!(pass.checks[0].passed);

        let fail = ThresholdValidator::new(global(-2.0)).validate(&cov);
        assert!(!fail.checks[0].passed);
        assert_eq!(
            fail.checks[0].message().unwrap(),
            "Uncovered statements count (3) exceeds global threshold (2)"
        );
    }

    #[test]
    fn test_absent_metric_is_not_checked() {
        let cov = coverage_of(&[("/a.js", 0, 4)]);
        let config = ThresholdConfig {
            global: Some(ThresholdLevel::PerMetric(MetricThresholds {
                functions: Some(90.0),
                ..MetricThresholds::default()
            })),
            each: None,
        };
        let report = ThresholdValidator::new(config).validate(&cov);
        assert_eq!(report.checks.len(), 1);
        assert_eq!(report.checks[0].metric, Metric::Functions);
        assert!(report.passed());
    }

    #[test]
    fn test_override_beats_default() {
        let cov = coverage_of(&[("/a.js", 1, 4)]);
        let config = ThresholdConfig {
            global: None,
            each: Some(ThresholdLevel::PerMetric(MetricThresholds {
                default: Some(90.0),
                statements: Some(25.0),
                ..MetricThresholds::default()
            })),
        };
        let report = ThresholdValidator::new(config).validate(&cov);
        assert_eq!(report.checks.len(), 4);
        assert!(report.checks[0].passed);
        let lines = &report.checks[2];
        assert_eq!(lines.metric, Metric::Lines);
        assert!(!lines.passed);
    }

    #[test]
    fn test_no_thresholds_pass() {
        let cov = coverage_of(&[("/a.js", 0, 4)]);
        let report = ThresholdValidator::default().validate(&cov);
        assert!(report.checks.is_empty());
        assert!(report.into_result().is_ok());
    }

    #[test]
    fn test_into_result_carries_messages() {
        let cov = coverage_of(&[("/a.js", 0, 4)]);
        let err = ThresholdValidator::new(global(50.0))
            .validate(&cov)
            .into_result()
            .unwrap_err();
        match err {
            CoverageError::ThresholdFailure { failures } => assert_eq!(failures.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
    }
}
