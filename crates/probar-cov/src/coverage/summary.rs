//! Coverage summary statistics
//!
//! Percentages are truncated to two decimals: `floor(covered * 10000 / total) / 100`.
//! A metric with nothing to cover reports 100%.

use super::FileCoverage;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coverage metric type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Statement coverage
    Statements,
    /// Branch arm coverage
    Branches,
    /// Line coverage (derived from statements)
    Lines,
    /// Function coverage
    Functions,
}

impl Metric {
    /// All metrics in check/report order
    pub const ALL: [Self; 4] = [
        Self::Statements,
        Self::Branches,
        Self::Lines,
        Self::Functions,
    ];

    /// Lowercase name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Statements => "statements",
            Self::Branches => "branches",
            Self::Lines => "lines",
            Self::Functions => "functions",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Covered/total counts for one metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    /// Number of coverable items
    pub total: u64,
    /// Number of items hit at least once
    pub covered: u64,
    /// Coverage percentage
    pub pct: f64,
}

impl Totals {
    /// Build totals and compute the percentage
    #[must_use]
    pub fn new(covered: u64, total: u64) -> Self {
        Self {
            total,
            covered,
            pct: percent(covered, total),
        }
    }

    /// Items never hit
    #[must_use]
    pub const fn uncovered(&self) -> u64 {
        self.total.saturating_sub(self.covered)
    }

    /// Sum two totals
    #[must_use]
    pub fn combine(self, other: Self) -> Self {
        Self::new(
            self.covered.saturating_add(other.covered),
            self.total.saturating_add(other.total),
        )
    }
}

/// Two-decimal truncated percentage
#[must_use]
pub fn percent(covered: u64, total: u64) -> f64 {
    if total == 0 {
        return 100.0;
    }
    let basis_points = u128::from(covered) * 10_000 / u128::from(total);
    basis_points as f64 / 100.0
}

/// Per-metric totals for one file or the whole run
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CoverageSummary {
    /// Statements
    pub statements: Totals,
    /// Branch arms
    pub branches: Totals,
    /// Lines
    pub lines: Totals,
    /// Functions
    pub functions: Totals,
}

impl CoverageSummary {
    /// Summary for a single file record
    #[must_use]
    pub fn of_file(file: &FileCoverage) -> Self {
        let statements = count_hits(file.statement_map.keys().map(|id| file.s.get(id)));
        let functions = count_hits(file.fn_map.keys().map(|id| file.f.get(id)));

        let mut branch_total = 0;
        let mut branch_covered = 0;
        for (id, meta) in &file.branch_map {
            let arms = file.b.get(id);
            for arm in 0..meta.locations.len().max(arms.map_or(0, Vec::len)) {
                branch_total += 1;
                if arms.and_then(|a| a.get(arm)).copied().unwrap_or(0) > 0 {
                    branch_covered += 1;
                }
            }
        }

        let lines = file.line_hits();
        let lines_covered = lines.values().filter(|c| **c > 0).count() as u64;

        Self {
            statements,
            branches: Totals::new(branch_covered, branch_total),
            lines: Totals::new(lines_covered, lines.len() as u64),
            functions,
        }
    }

    /// Totals for `metric`
    #[must_use]
    pub const fn get(&self, metric: Metric) -> Totals {
        match metric {
            Metric::Statements => self.statements,
            Metric::Branches => self.branches,
            Metric::Lines => self.lines,
            Metric::Functions => self.functions,
        }
    }

    /// Sum two summaries
    #[must_use]
    pub fn combine(self, other: Self) -> Self {
        Self {
            statements: self.statements.combine(other.statements),
            branches: self.branches.combine(other.branches),
            lines: self.lines.combine(other.lines),
            functions: self.functions.combine(other.functions),
        }
    }
}

impl Default for Totals {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

fn count_hits<'a>(counts: impl Iterator<Item = Option<&'a u64>>) -> Totals {
    let mut total = 0;
    let mut covered = 0;
    for count in counts {
        total += 1;
        if count.copied().unwrap_or(0) > 0 {
            covered += 1;
        }
    }
    Totals::new(covered, total)
}
