//! Per-file coverage record
//!
//! Field names follow the Istanbul `__coverage__` object so payloads from
//! browsers instrumented by any Istanbul-style engine deserialize directly.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Line/column position (1-based line, 0-based column)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Position {
    /// Line number
    pub line: u32,
    /// Column number
    pub column: u32,
}

/// Source range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Range {
    /// Start position
    pub start: Position,
    /// End position
    pub end: Position,
}

impl Range {
    /// Range covering columns `start..end` of a single line
    #[must_use]
    pub const fn on_line(line: u32, start: u32, end: u32) -> Self {
        Self {
            start: Position {
                line,
                column: start,
            },
            end: Position { line, column: end },
        }
    }
}

/// Function declaration metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionMeta {
    /// Function name (`(anonymous_N)` when unnamed)
    pub name: String,
    /// Declaration range
    #[serde(default)]
    pub decl: Range,
    /// Full location
    #[serde(default)]
    pub loc: Range,
    /// Declaration line
    #[serde(default)]
    pub line: u32,
}

/// Branch metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchMeta {
    /// Branch kind (`if`, `switch`, `cond-expr`, ...)
    #[serde(rename = "type")]
    pub kind: String,
    /// Full location
    #[serde(default)]
    pub loc: Range,
    /// One location per branch arm
    #[serde(default)]
    pub locations: Vec<Range>,
    /// Line of the branch
    #[serde(default)]
    pub line: u32,
}

/// Coverage counters and shape for a single asset
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileCoverage {
    /// Absolute asset path
    #[serde(default)]
    pub path: String,
    /// Statement id -> range
    #[serde(default)]
    pub statement_map: BTreeMap<String, Range>,
    /// Function id -> metadata
    #[serde(default)]
    pub fn_map: BTreeMap<String, FunctionMeta>,
    /// Branch id -> metadata
    #[serde(default)]
    pub branch_map: BTreeMap<String, BranchMeta>,
    /// Statement hit counts
    #[serde(default)]
    pub s: BTreeMap<String, u64>,
    /// Function hit counts
    #[serde(default)]
    pub f: BTreeMap<String, u64>,
    /// Branch arm hit counts
    #[serde(default)]
    pub b: BTreeMap<String, Vec<u64>>,
}

impl FileCoverage {
    /// Empty record for `path`
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Register a statement and return its id
    pub fn add_statement(&mut self, range: Range) -> String {
        let id = self.statement_map.len().to_string();
        let _ = self.statement_map.insert(id.clone(), range);
        let _ = self.s.insert(id.clone(), 0);
        id
    }

    /// Register a function and return its id
    pub fn add_function(&mut self, name: Option<&str>, decl: Range) -> String {
        let id = self.fn_map.len().to_string();
        let name = name.map_or_else(|| format!("(anonymous_{id})"), str::to_string);
        let meta = FunctionMeta {
            name,
            decl,
            loc: decl,
            line: decl.start.line,
        };
        let _ = self.fn_map.insert(id.clone(), meta);
        let _ = self.f.insert(id.clone(), 0);
        id
    }

    /// Register a branch with `arms` locations and return its id
    pub fn add_branch(&mut self, kind: &str, loc: Range, arms: Vec<Range>) -> String {
        let id = self.branch_map.len().to_string();
        let counts = vec![0; arms.len()];
        let meta = BranchMeta {
            kind: kind.to_string(),
            loc,
            locations: arms,
            line: loc.start.line,
        };
        let _ = self.branch_map.insert(id.clone(), meta);
        let _ = self.b.insert(id.clone(), counts);
        id
    }

    /// Copy of this record with every counter reset to zero
    #[must_use]
    pub fn zeroed(&self) -> Self {
        let mut out = self.clone();
        out.s.values_mut().for_each(|c| *c = 0);
        out.f.values_mut().for_each(|c| *c = 0);
        out.b
            .values_mut()
            .for_each(|arms| arms.iter_mut().for_each(|c| *c = 0));
        // ids present in a map but missing a counter still count as uncovered
        for id in out.statement_map.keys() {
            let _ = out.s.entry(id.clone()).or_insert(0);
        }
        for id in out.fn_map.keys() {
            let _ = out.f.entry(id.clone()).or_insert(0);
        }
        for (id, meta) in &out.branch_map {
            let _ = out
                .b
                .entry(id.clone())
                .or_insert_with(|| vec![0; meta.locations.len()]);
        }
        out
    }

    /// Merge another record for the same file into this one.
    ///
    /// Counters are summed (element-wise for branches), saturating at
    /// `u64::MAX`; shape maps are unioned, keeping the existing entry on id
    /// collisions.
    pub fn merge(&mut self, other: &Self) {
        for (id, range) in &other.statement_map {
            let _ = self.statement_map.entry(id.clone()).or_insert(*range);
        }
        for (id, meta) in &other.fn_map {
            let _ = self.fn_map.entry(id.clone()).or_insert_with(|| meta.clone());
        }
        for (id, meta) in &other.branch_map {
            let _ = self
                .branch_map
                .entry(id.clone())
                .or_insert_with(|| meta.clone());
        }
        for (id, count) in &other.s {
            let slot = self.s.entry(id.clone()).or_insert(0);
            *slot = slot.saturating_add(*count);
        }
        for (id, count) in &other.f {
            let slot = self.f.entry(id.clone()).or_insert(0);
            *slot = slot.saturating_add(*count);
        }
        for (id, arms) in &other.b {
            let mine = self.b.entry(id.clone()).or_default();
            if mine.len() < arms.len() {
                mine.resize(arms.len(), 0);
            }
            for (slot, count) in mine.iter_mut().zip(arms) {
                *slot = slot.saturating_add(*count);
            }
        }
    }

    /// Line hit counts derived from statements.
    ///
    /// Each statement contributes its start line; a line's count is the
    /// highest count of the statements starting on it.
    #[must_use]
    pub fn line_hits(&self) -> BTreeMap<u32, u64> {
        let mut lines = BTreeMap::new();
        for (id, range) in &self.statement_map {
            let count = self.s.get(id).copied().unwrap_or(0);
            let slot = lines.entry(range.start.line).or_insert(0);
            if count > *slot {
                *slot = count;
            }
        }
        lines
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn sample(path: &str, hits: &[u64]) -> FileCoverage {
        let mut fc = FileCoverage::new(path);
        for (i, hit) in hits.iter().enumerate() {
            let id = fc.add_statement(Range::on_line(i as u32 + 1, 0, 10));
            let _ = fc.s.insert(id, *hit);
        }
        fc
    }

    #[test]
    fn test_add_statement_ids_are_sequential() {
        let mut fc = FileCoverage::new("/a.js");
        assert_eq!(fc.add_statement(Range::on_line(1, 0, 1)), "0");
        assert_eq!(fc.add_statement(Range::on_line(2, 0, 1)), "1");
        assert_eq!(fc.s.get("1"), Some(&0));
    }

    #[test]
    fn test_anonymous_function_name() {
        let mut fc = FileCoverage::new("/a.js");
        let id = fc.add_function(None, Range::on_line(3, 0, 12));
        assert_eq!(fc.fn_map[&id].name, "(anonymous_0)");
        assert_eq!(fc.fn_map[&id].line, 3);
        let id = fc.add_function(Some("boot"), Range::on_line(5, 0, 12));
        assert_eq!(fc.fn_map[&id].name, "boot");
    }

    #[test]
    fn test_merge_sums_counters() {
        let mut a = sample("/a.js", &[1, 0, 2]);
        let b = sample("/a.js", &[0, 3, 1]);
        a.merge(&b);
        assert_eq!(a.s["0"], 1);
        assert_eq!(a.s["1"], 3);
        assert_eq!(a.s["2"], 3);
        assert_eq!(a.statement_map.len(), 3);
    }

    #[test]
    fn test_merge_branches_elementwise() {
        let mut a = FileCoverage::new("/a.js");
        let id = a.add_branch("if", Range::on_line(1, 0, 5), vec![Range::default(); 2]);
        a.b.insert(id.clone(), vec![1, 0]);
        let mut b = a.clone();
        b.b.insert(id.clone(), vec![2, 5]);
        a.merge(&b);
        assert_eq!(a.b[&id], vec![3, 5]);
    }

    #[test]
    fn test_merge_grows_short_branch_vectors() {
        let mut a = FileCoverage::new("/a.js");
        a.b.insert("0".to_string(), vec![1]);
        let mut b = FileCoverage::new("/a.js");
        b.b.insert("0".to_string(), vec![1, 4, 2]);
        a.merge(&b);
        assert_eq!(a.b["0"], vec![2, 4, 2]);
    }

    #[test]
    fn test_merge_saturates_at_max() {
        let mut a = sample("/a.js", &[u64::MAX, 1]);
        let f = a.add_function(Some("hot"), Range::on_line(1, 0, 3));
        a.f.insert(f.clone(), u64::MAX);
        a.b.insert("0".to_string(), vec![u64::MAX, 0]);
        let b = a.clone();
        a.merge(&b);
        assert_eq!(a.s["0"], u64::MAX);
        assert_eq!(a.s["1"], 2);
        assert_eq!(a.f[&f], u64::MAX);
        assert_eq!(a.b["0"], vec![u64::MAX, 0]);
    }

    #[test]
    fn test_zeroed_resets_every_counter() {
        let mut fc = sample("/a.js", &[4, 5]);
        let f = fc.add_function(Some("go"), Range::on_line(1, 0, 2));
        fc.f.insert(f, 7);
        let zero = fc.zeroed();
        assert!(zero.s.values().all(|c| *c == 0));
        assert!(zero.f.values().all(|c| *c == 0));
        assert_eq!(zero.statement_map, fc.statement_map);
    }

    #[test]
    fn test_zeroed_fills_missing_counters() {
        let mut fc = FileCoverage::new("/a.js");
        fc.statement_map.insert("0".to_string(), Range::on_line(1, 0, 3));
        let zero = fc.zeroed();
        assert_eq!(zero.s.get("0"), Some(&0));
    }

    #[test]
    fn test_line_hits_take_max_per_line() {
        let mut fc = FileCoverage::new("/a.js");
        let a = fc.add_statement(Range::on_line(1, 0, 3));
        let b = fc.add_statement(Range::on_line(1, 4, 8));
        let c = fc.add_statement(Range::on_line(2, 0, 3));
        fc.s.insert(a, 2);
        fc.s.insert(b, 9);
        fc.s.insert(c, 0);
        let lines = fc.line_hits();
        assert_eq!(lines[&1], 9);
        assert_eq!(lines[&2], 0);
    }

    #[test]
    fn test_istanbul_json_shape() {
        let json = r#"{
            "path": "/srv/a.js",
            "statementMap": {"0": {"start": {"line": 1, "column": 0}, "end": {"line": 1, "column": 9}}},
            "fnMap": {"0": {"name": "f", "line": 1, "loc": {"start": {"line": 1, "column": 0}, "end": {"line": 1, "column": 9}}}},
            "branchMap": {"0": {"type": "if", "line": 2, "locations": [{"start": {"line": 2, "column": 0}, "end": {"line": 2, "column": 1}}]}},
            "s": {"0": 3},
            "f": {"0": 1},
            "b": {"0": [1, 0]},
            "l": {"1": 3}
        }"#;
        let fc: FileCoverage = serde_json::from_str(json).unwrap();
        assert_eq!(fc.path, "/srv/a.js");
        assert_eq!(fc.s["0"], 3);
        assert_eq!(fc.fn_map["0"].name, "f");
        assert_eq!(fc.branch_map["0"].kind, "if");
        assert_eq!(fc.b["0"], vec![1, 0]);

        let back = serde_json::to_value(&fc).unwrap();
        assert!(back.get("statementMap").is_some());
        assert!(back.get("fnMap").is_some());
        assert!(back.get("branchMap").is_some());
    }
}
