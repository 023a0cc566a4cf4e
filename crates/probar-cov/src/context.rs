//! Run-scoped coverage state
//!
//! One [`CoverageContext`] is owned by the plugin and shared by reference with
//! the middleware and the sweep. [`CoverageContext::reset`] marks the run
//! boundary.

use crate::cache::InstrumentationCache;
use crate::diagnostics::{DiagnosticSink, TracingSink};
use crate::instrument::{Instrumenter, LineInstrumenter};
use crate::matcher::MatchRules;
use crate::result::CoverageResult;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Shared state of one test run
pub struct CoverageContext {
    root: PathBuf,
    rules: MatchRules,
    cache: InstrumentationCache,
    instrumenter: Arc<dyn Instrumenter>,
    sink: Arc<dyn DiagnosticSink>,
    gate: RwLock<()>,
}

impl fmt::Debug for CoverageContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoverageContext")
            .field("root", &self.root)
            .field("rules", &self.rules)
            .field("cached", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl CoverageContext {
    /// Context for `root` using the built-in instrumenter and tracing sink.
    ///
    /// `root` is canonicalized so cache keys are resolved from disk location.
    pub fn new(root: impl AsRef<Path>, rules: MatchRules) -> CoverageResult<Self> {
        Ok(Self {
            root: root.as_ref().canonicalize()?,
            rules,
            cache: InstrumentationCache::new(),
            instrumenter: Arc::new(LineInstrumenter::new()),
            sink: Arc::new(TracingSink),
            gate: RwLock::new(()),
        })
    }

    /// Use another instrumentation engine
    #[must_use]
    pub fn with_instrumenter(mut self, instrumenter: Arc<dyn Instrumenter>) -> Self {
        self.instrumenter = instrumenter;
        self
    }

    /// Send diagnostic events to `sink`
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Canonical served root
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Compiled include/exclude rules
    #[must_use]
    pub fn rules(&self) -> &MatchRules {
        &self.rules
    }

    /// Instrumentation cache
    #[must_use]
    pub fn cache(&self) -> &InstrumentationCache {
        &self.cache
    }

    /// Instrumentation engine
    #[must_use]
    pub fn instrumenter(&self) -> &dyn Instrumenter {
        self.instrumenter.as_ref()
    }

    /// Diagnostic sink
    #[must_use]
    pub fn sink(&self) -> &dyn DiagnosticSink {
        self.sink.as_ref()
    }

    /// Held by requests while they decide
    pub fn enter_request(&self) -> RwLockReadGuard<'_, ()> {
        self.gate.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Held by run-end; waits for in-flight requests
    pub fn enter_run_end(&self) -> RwLockWriteGuard<'_, ()> {
        self.gate.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Clear run-scoped state
    pub fn reset(&self) {
        self.cache.clear();
    }
}
