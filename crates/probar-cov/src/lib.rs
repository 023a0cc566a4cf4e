//! Probar-Cov: Coverage Instrumentation for Browser Test Runs
//!
//! Instruments JavaScript served to browsers during a test run, collects the
//! counters each browser reports back, adds zero-coverage records for eligible
//! files no test loaded, writes reports and checks thresholds.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    PROBAR-COV Architecture                       │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ Middleware │───►│ Instrument │───►│ Browser    │            │
//! │   │ (axum)     │    │ Cache      │    │ __coverage__│           │
//! │   └────────────┘    └────────────┘    └─────┬──────┘            │
//! │                                             │ sub_suite_end     │
//! │   ┌────────────┐    ┌────────────┐    ┌─────▼──────┐            │
//! │   │ Thresholds │◄───│ Reporters  │◄───│ Collector  │◄── Sweep   │
//! │   └────────────┘    └────────────┘    └────────────┘            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use probar_cov::{CoverageOptions, CoveragePlugin};
//!
//! # fn main() -> probar_cov::CoverageResult<()> {
//! let options = CoverageOptions::from_file("coverage.yaml")?;
//! let plugin = CoveragePlugin::new("./site", options)?.with_scope("/components", "my-app");
//! let app = plugin.wrap(axum::Router::new());
//! # let _ = app;
//! // ... browsers run, each suite calls plugin.sub_suite_end(..)
//! let report = plugin.run_end(None)?;
//! # let _ = report;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

mod cache;
mod config;
mod context;
pub mod coverage;
mod diagnostics;
pub mod instrument;
mod matcher;
mod middleware;
mod plugin;
pub mod report;
mod result;
mod sweep;
mod threshold;

pub use cache::{InstrumentationCache, InstrumentedEntry};
pub use config::{CoverageOptions, MetricThresholds, ReporterKind, ThresholdConfig, ThresholdLevel};
pub use context::CoverageContext;
pub use coverage::{
    CoverageCollector, CoverageMap, CoverageSummary, FileCoverage, FinalCoverage, Metric, Totals,
};
pub use diagnostics::{Action, DiagnosticEvent, DiagnosticSink, Level, MemorySink, TracingSink};
pub use instrument::{AssetKind, Instrumented, InstrumentedSegments, Instrumenter, LineInstrumenter};
pub use matcher::{
    normalize_separators, relative_match_path, MatchRules, PatternSet, DEFAULT_PLATFORM_PATTERN,
};
pub use middleware::{mime_type, CoverageMiddleware, ServeDecision};
pub use plugin::{CoveragePlugin, RunReport, SuiteData};
pub use report::{write_reports, Reporter};
pub use result::{CoverageError, CoverageResult};
pub use sweep::sweep_uncovered;
pub use threshold::{Granularity, ThresholdCheck, ThresholdValidator, ValidationReport};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::{
        CoverageError, CoverageOptions, CoveragePlugin, CoverageResult, DiagnosticSink,
        Instrumenter, MatchRules, RunReport, SuiteData,
    };
}
