//! Uncovered-file sweep
//!
//! After a run, every eligible file under the root that was never served gets
//! a zero-count record, so coverage percentages reflect the whole eligible set
//! rather than only what the tests happened to load.

use crate::context::CoverageContext;
use crate::coverage::FileCoverage;
use crate::matcher::relative_match_path;
use crate::result::{CoverageError, CoverageResult};
use std::collections::HashSet;
use std::path::PathBuf;

/// Zero-coverage records for eligible files the cache never saw.
///
/// Files that cannot be instrumented are omitted. An unreadable directory
/// entry is skipped; a root that cannot be walked at all is an error.
pub fn sweep_uncovered(ctx: &CoverageContext) -> CoverageResult<Vec<(PathBuf, FileCoverage)>> {
    let served: HashSet<PathBuf> = ctx.cache().keys().into_iter().collect();
    let pattern = format!(
        "{}/**/*",
        glob::Pattern::escape(&ctx.root().to_string_lossy())
    );
    let walker = glob::glob(&pattern).map_err(|e| CoverageError::Pattern {
        pattern: pattern.clone(),
        message: e.msg.to_string(),
    })?;

    let mut records = Vec::new();
    for entry in walker {
        let path = match entry {
            Ok(path) => path,
            Err(e) => {
                tracing::debug!(path = %e.path().display(), "sweep skipped unreadable entry");
                continue;
            }
        };
        if !path.is_file() || served.contains(&path) {
            continue;
        }
        let Some(relative) = relative_match_path(ctx.root(), &path) else {
            continue;
        };
        if !ctx.rules().is_eligible(&relative) {
            continue;
        }
        match ctx.cache().get_instrumented(&path, ctx.instrumenter()) {
            Ok(Some(entry)) => {
                let mut coverage = entry.coverage.zeroed();
                coverage.path = path.to_string_lossy().into_owned();
                records.push((path, coverage));
            }
            Ok(None) => {}
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "sweep omitted file");
            }
        }
    }
    Ok(records)
}
