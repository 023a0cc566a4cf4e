//! Coverage data model
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  PROBAR-COV AGGREGATION                                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  Browser payloads ─┐                                            │
//! │                    ├─► CoverageCollector ─► FinalCoverage        │
//! │  Sweep records ────┘        (merge)          (summaries)        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Records use Istanbul's JSON layout (`statementMap`, `fnMap`, `branchMap`,
//! `s`, `f`, `b`), so any Istanbul-compatible browser payload can be merged.

mod collector;
mod file;
mod summary;

pub use collector::{CoverageCollector, CoverageMap, FinalCoverage};
pub use file::{BranchMeta, FileCoverage, FunctionMeta, Position, Range};
pub use summary::{percent, CoverageSummary, Metric, Totals};
