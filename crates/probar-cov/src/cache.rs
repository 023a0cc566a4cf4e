//! Asset instrumentation cache
//!
//! Memoizes instrumented output per absolute asset path for the lifetime of a
//! run. The first stored entry for a path is authoritative; a racing request
//! that computed the same entry concurrently is served the stored one.

use crate::coverage::FileCoverage;
use crate::instrument::{AssetKind, Instrumenter};
use crate::result::CoverageResult;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

/// Instrumented content of one asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentedEntry {
    /// Content served in place of the original file
    pub content: String,
    /// Zero-count coverage shape of the asset
    pub coverage: FileCoverage,
}

/// Run-scoped map from absolute asset path to instrumented entry
#[derive(Debug, Default)]
pub struct InstrumentationCache {
    entries: RwLock<HashMap<PathBuf, Arc<InstrumentedEntry>>>,
}

impl InstrumentationCache {
    /// Create an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Instrumented content for `path`.
    ///
    /// Returns `Ok(None)` when the file does not exist, is not UTF-8 text or
    /// the engine cannot instrument it; nothing is cached in those cases.
    /// Unexpected read failures propagate.
    pub fn get_instrumented(
        &self,
        path: &Path,
        instrumenter: &dyn Instrumenter,
    ) -> CoverageResult<Option<Arc<InstrumentedEntry>>> {
        if let Some(hit) = self.get(path) {
            return Ok(Some(hit));
        }
        if !path.is_file() {
            return Ok(None);
        }

        let source = match fs::read_to_string(path) {
            Ok(source) => source,
            Err(e) if matches!(e.kind(), ErrorKind::InvalidData | ErrorKind::NotFound) => {
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let kind = AssetKind::from_path(path);
        let instrumented = match kind.instrument(instrumenter, &source, path) {
            Ok(Some(out)) => out,
            Ok(None) => return Ok(None),
            Err(e) if e.is_not_instrumentable() => return Ok(None),
            Err(e) => return Err(e),
        };

        let entry = Arc::new(InstrumentedEntry {
            content: instrumented.code,
            coverage: instrumented.coverage,
        });
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let stored = entries.entry(path.to_path_buf()).or_insert(entry);
        Ok(Some(Arc::clone(stored)))
    }

    /// Cached entry for `path`, without touching the disk
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<Arc<InstrumentedEntry>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }

    /// True if `path` has an entry
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(path)
    }

    /// Snapshot of every cached path
    #[must_use]
    pub fn keys(&self) -> Vec<PathBuf> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Number of cached entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// True if nothing is cached
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
