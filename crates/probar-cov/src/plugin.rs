//! Coverage plugin
//!
//! Glues the pieces to the test runner's lifecycle:
//!
//! ```text
//! define_webserver ─► wrap app with CoverageMiddleware
//! sub_suite_end    ─► CoverageCollector::add
//! run_end(None)    ─► sweep ─► merge ─► reporters ─► clear cache ─► thresholds
//! run_end(Some(e)) ─► clear cache, drop collected coverage
//! ```

use crate::config::CoverageOptions;
use crate::context::CoverageContext;
use crate::coverage::{CoverageCollector, CoverageMap, FinalCoverage};
use crate::middleware::CoverageMiddleware;
use crate::report::write_reports;
use crate::result::{CoverageError, CoverageResult};
use crate::sweep::sweep_uncovered;
use crate::threshold::{ThresholdValidator, ValidationReport};
use axum::Router;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Payload of a "sub-suite finished" event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteData {
    /// The browser's coverage object; absent when nothing was instrumented
    #[serde(rename = "__coverage__", default)]
    pub coverage: Option<CoverageMap>,
}

/// Outcome of a successful run end
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Merged coverage with summaries
    pub coverage: FinalCoverage,
    /// Threshold checks, all passed
    pub validation: ValidationReport,
    /// Report files written
    pub reports: Vec<PathBuf>,
    /// Files added by the uncovered-file sweep
    pub swept: usize,
}

/// Run-scoped coverage orchestration
#[derive(Debug)]
pub struct CoveragePlugin {
    ctx: Arc<CoverageContext>,
    options: CoverageOptions,
    collector: Mutex<CoverageCollector>,
    validator: ThresholdValidator,
    middleware: Arc<CoverageMiddleware>,
}

impl CoveragePlugin {
    /// Plugin serving `root` with the built-in instrumenter
    pub fn new(root: impl AsRef<Path>, options: CoverageOptions) -> CoverageResult<Self> {
        let ctx = CoverageContext::new(root, options.match_rules()?)?;
        Ok(Self::with_context(ctx, options))
    }

    /// Plugin around a prepared context (custom engine or sink)
    #[must_use]
    pub fn with_context(ctx: CoverageContext, options: CoverageOptions) -> Self {
        let ctx = Arc::new(ctx);
        Self {
            middleware: Arc::new(CoverageMiddleware::new(Arc::clone(&ctx))),
            validator: ThresholdValidator::new(options.thresholds),
            collector: Mutex::new(CoverageCollector::new()),
            options,
            ctx,
        }
    }

    /// Scope instrumentation to `/<client_root>/<package>/...` request paths
    #[must_use]
    pub fn with_scope(mut self, client_root: &str, package: &str) -> Self {
        let middleware = CoverageMiddleware::new(Arc::clone(&self.ctx))
            .with_client_root(client_root)
            .with_package(package);
        self.middleware = Arc::new(middleware);
        self
    }

    /// Options in effect
    #[must_use]
    pub fn options(&self) -> &CoverageOptions {
        &self.options
    }

    /// Run context
    #[must_use]
    pub fn context(&self) -> &Arc<CoverageContext> {
        &self.ctx
    }

    /// Serving middleware
    #[must_use]
    pub fn middleware(&self) -> &Arc<CoverageMiddleware> {
        &self.middleware
    }

    /// Directory reports are written to
    #[must_use]
    pub fn report_dir(&self) -> PathBuf {
        self.ctx.root().join(&self.options.dir)
    }

    /// Wrap `app` with the coverage middleware
    #[must_use]
    pub fn wrap(&self, app: Router) -> Router {
        Arc::clone(&self.middleware).wrap(app)
    }

    /// "Define web server" hook: hand the wrapped app to `replace`
    pub fn define_webserver<F>(&self, app: Router, replace: F)
    where
        F: FnOnce(Router),
    {
        replace(self.wrap(app));
    }

    /// "Sub-suite finished" hook
    pub fn sub_suite_end(&self, browser: &str, payload: &SuiteData) {
        let Some(coverage) = &payload.coverage else {
            tracing::debug!(browser, "sub-suite reported no coverage");
            return;
        };
        let mut collector = self.lock_collector();
        collector.add(coverage);
        tracing::debug!(
            browser,
            files = coverage.len(),
            reports = collector.reports_received(),
            "coverage received"
        );
    }

    /// "Run finished" hook.
    ///
    /// With `error` set, nothing is reported or validated. Otherwise reports are
    /// written before thresholds are checked; a threshold failure is returned
    /// as [`CoverageError::ThresholdFailure`].
    pub fn run_end(&self, error: Option<&str>) -> CoverageResult<Option<RunReport>> {
        let _gate = self.ctx.enter_run_end();
        let collector = std::mem::take(&mut *self.lock_collector());

        if let Some(error) = error {
            tracing::warn!(error, "run failed, skipping coverage report");
            self.ctx.reset();
            return Ok(None);
        }

        let written = self.write_run(collector);
        self.ctx.reset();
        let (coverage, reports, swept) = written?;

        let validation = self.validator.validate(&coverage);
        if !validation.passed() {
            return Err(CoverageError::ThresholdFailure {
                failures: validation.messages(),
            });
        }
        tracing::info!(
            files = coverage.files.len(),
            swept,
            reports = reports.len(),
            "coverage run complete"
        );
        Ok(Some(RunReport {
            coverage,
            validation,
            reports,
            swept,
        }))
    }

    /// Sweep, merge and write every configured report
    fn write_run(
        &self,
        mut collector: CoverageCollector,
    ) -> CoverageResult<(FinalCoverage, Vec<PathBuf>, usize)> {
        let swept = sweep_uncovered(&self.ctx)?;
        let swept_count = swept.len();
        for (_, record) in swept {
            collector.add_file(record);
        }
        let coverage = collector.finalize();
        let reports = write_reports(&self.options.reporters, &coverage, &self.report_dir())?;
        Ok((coverage, reports, swept_count))
    }

    fn lock_collector(&self) -> MutexGuard<'_, CoverageCollector> {
        self.collector
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
