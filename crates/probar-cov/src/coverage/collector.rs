//! Coverage Collector
//!
//! Merges coverage reported by many browsers (and the uncovered-file sweep)
//! into one coverage map. Merging only sums counters, so the order in which
//! browsers report never changes the final totals.

use super::{CoverageSummary, FileCoverage};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Path -> file coverage, as found in a browser's `__coverage__` object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CoverageMap(BTreeMap<String, FileCoverage>);

impl CoverageMap {
    /// Empty map
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a single file record, keyed by its path
    pub fn add_file(&mut self, file: FileCoverage) {
        match self.0.get_mut(&file.path) {
            Some(existing) => existing.merge(&file),
            None => {
                let _ = self.0.insert(file.path.clone(), file);
            }
        }
    }

    /// Merge every record of `other` into this map.
    ///
    /// Records whose embedded path is empty take the map key as their path.
    pub fn merge(&mut self, other: &Self) {
        for (key, file) in &other.0 {
            let mut file = file.clone();
            if file.path.is_empty() {
                file.path.clone_from(key);
            }
            self.add_file(file);
        }
    }

    /// Record for `path`
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&FileCoverage> {
        self.0.get(path)
    }

    /// Iterate over records in path order
    pub fn files(&self) -> impl Iterator<Item = (&String, &FileCoverage)> {
        self.0.iter()
    }

    /// Number of files
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if no file was recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<FileCoverage> for CoverageMap {
    fn from_iter<T: IntoIterator<Item = FileCoverage>>(iter: T) -> Self {
        let mut map = Self::new();
        for file in iter {
            map.add_file(file);
        }
        map
    }
}

/// Accumulates coverage for one test run
#[derive(Debug, Default)]
pub struct CoverageCollector {
    coverage: CoverageMap,
    reports: usize,
}

impl CoverageCollector {
    /// Create an empty collector
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a browser-reported coverage map
    pub fn add(&mut self, coverage: &CoverageMap) {
        self.coverage.merge(coverage);
        self.reports += 1;
    }

    /// Add one file record (used for sweep output)
    pub fn add_file(&mut self, file: FileCoverage) {
        self.coverage.add_file(file);
    }

    /// Number of coverage maps received via [`Self::add`]
    #[must_use]
    pub fn reports_received(&self) -> usize {
        self.reports
    }

    /// Coverage merged so far
    #[must_use]
    pub fn coverage(&self) -> &CoverageMap {
        &self.coverage
    }

    /// Compute per-file and global summaries, consuming the collector
    #[must_use]
    pub fn finalize(self) -> FinalCoverage {
        FinalCoverage::from_map(self.coverage)
    }
}

/// Finalized coverage of a run: merged map plus summaries
#[derive(Debug, Clone, Serialize)]
pub struct FinalCoverage {
    /// Merged coverage map
    pub coverage: CoverageMap,
    /// Summary per file path
    pub files: BTreeMap<String, CoverageSummary>,
    /// Summary across all files
    pub total: CoverageSummary,
}

impl FinalCoverage {
    /// Summarize a merged coverage map
    #[must_use]
    pub fn from_map(coverage: CoverageMap) -> Self {
        let files: BTreeMap<String, CoverageSummary> = coverage
            .files()
            .map(|(path, file)| (path.clone(), CoverageSummary::of_file(file)))
            .collect();
        let total = files
            .values()
            .fold(CoverageSummary::default(), |acc, s| acc.combine(*s));
        Self {
            coverage,
            files,
            total,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::coverage::{Metric, Range, Totals};
    use proptest::prelude::*;

    fn record(path: &str, hits: &[u64]) -> FileCoverage {
        let mut fc = FileCoverage::new(path);
        for (i, hit) in hits.iter().enumerate() {
            let id = fc.add_statement(Range::on_line(i as u32 + 1, 0, 4));
            fc.s.insert(id, *hit);
        }
        fc
    }

    fn map_of(records: Vec<FileCoverage>) -> CoverageMap {
        records.into_iter().collect()
    }

    #[test]
    fn test_collector_merges_same_file() {
        let mut collector = CoverageCollector::new();
        collector.add(&map_of(vec![record("/a.js", &[1, 0])]));
        collector.add(&map_of(vec![record("/a.js", &[0, 2])]));
        assert_eq!(collector.reports_received(), 2);

        let fin = collector.finalize();
        assert_eq!(fin.coverage.len(), 1);
        assert_eq!(fin.files["/a.js"].statements, Totals::new(2, 2));
    }

    #[test]
    fn test_empty_path_takes_map_key() {
        let json = r#"{"/srv/x.js": {"statementMap": {}, "s": {}}}"#;
        let incoming: CoverageMap = serde_json::from_str(json).unwrap();
        let mut map = CoverageMap::new();
        map.merge(&incoming);
        assert_eq!(map.get("/srv/x.js").unwrap().path, "/srv/x.js");
    }

    #[test]
    fn test_global_total_sums_files() {
        let mut collector = CoverageCollector::new();
        collector.add(&map_of(vec![record("/a.js", &[1, 1]), record("/b.js", &[0, 0])]));
        let fin = collector.finalize();
        assert_eq!(fin.total.get(Metric::Statements), Totals::new(2, 4));
        assert_eq!(fin.total.statements.pct, 50.0);
    }

    #[test]
    fn test_sweep_records_join_browser_records() {
        let mut collector = CoverageCollector::new();
        collector.add(&map_of(vec![record("/a.js", &[3])]));
        collector.add_file(record("/b.js", &[0, 0]));
        assert_eq!(collector.reports_received(), 1);
        let fin = collector.finalize();
        assert_eq!(fin.files["/b.js"].statements.pct, 0.0);
        assert_eq!(fin.files["/a.js"].statements.pct, 100.0);
    }

    #[test]
    fn test_repeated_max_counter_payload_saturates() {
        let json = r#"{"__coverage__": {"/a.js": {"statementMap": {"0": {"start": {"line": 1, "column": 0}, "end": {"line": 1, "column": 4}}}, "s": {"0": 18446744073709551615}}}}"#;
        let payload: serde_json::Value = serde_json::from_str(json).unwrap();
        let map: CoverageMap = serde_json::from_value(payload["__coverage__"].clone()).unwrap();

        let mut collector = CoverageCollector::new();
        collector.add(&map);
        collector.add(&map);
        let fin = collector.finalize();
        assert_eq!(fin.coverage.get("/a.js").unwrap().s["0"], u64::MAX);
        assert_eq!(fin.files["/a.js"].statements, Totals::new(1, 1));
    }

    proptest! {
        #[test]
        fn prop_merge_is_commutative(
            a in prop::collection::vec(0u64..5, 1..6),
            b in prop::collection::vec(0u64..5, 1..6),
        ) {
            let r1 = map_of(vec![record("/x.js", &a), record("/y.js", &b)]);
            let r2 = map_of(vec![record("/x.js", &b)]);

            let mut forward = CoverageCollector::new();
            forward.add(&r1);
            forward.add(&r2);

            let mut backward = CoverageCollector::new();
            backward.add(&r2);
            backward.add(&r1);

            let f = forward.finalize();
            let g = backward.finalize();
            prop_assert_eq!(f.files, g.files);
            prop_assert_eq!(f.total, g.total);
            for (path, file) in f.coverage.files() {
                prop_assert_eq!(&file.s, &g.coverage.get(path).unwrap().s);
            }
        }
    }
}
