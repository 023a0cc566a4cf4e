//! Include/exclude path matching
//!
//! Decides whether a root-relative asset path is subject to instrumentation.
//! Patterns are compiled once per run and evaluated against `/`-separated
//! paths, so Windows separators never cause false negatives.
//!
//! An asset is eligible iff it matches at least one include pattern and no
//! exclude pattern. The test runner's own files are always excluded.

use crate::result::{CoverageError, CoverageResult};
use glob::{MatchOptions, Pattern};
use std::path::{Component, Path};

/// Files served by the test runner itself; never instrumented
pub const DEFAULT_PLATFORM_PATTERN: &str = "web-component-tester/*";

/// `*` stays inside one path segment, `**` crosses segments
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Ordered list of compiled glob patterns
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<Pattern>,
}

impl PatternSet {
    /// Compile a list of glob strings
    pub fn compile<S: AsRef<str>>(patterns: &[S]) -> CoverageResult<Self> {
        let patterns = patterns
            .iter()
            .map(|p| compile_pattern(p.as_ref()))
            .collect::<CoverageResult<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// True if `path` glob-matches at least one pattern. An empty set matches nothing.
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        self.patterns
            .iter()
            .any(|p| p.matches_with(path, MATCH_OPTIONS))
    }

    /// Number of patterns
    #[must_use]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// True if no patterns were configured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Original pattern strings, in order
    pub fn as_strs(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(Pattern::as_str)
    }
}

fn compile_pattern(pattern: &str) -> CoverageResult<Pattern> {
    Pattern::new(pattern).map_err(|e| CoverageError::Pattern {
        pattern: pattern.to_string(),
        message: e.msg.to_string(),
    })
}

/// Compiled include/exclude rule set
#[derive(Debug, Clone)]
pub struct MatchRules {
    include: PatternSet,
    exclude: PatternSet,
    platform: Pattern,
}

impl MatchRules {
    /// Compile include and exclude globs; the platform pattern defaults to
    /// [`DEFAULT_PLATFORM_PATTERN`].
    pub fn new<I: AsRef<str>, E: AsRef<str>>(include: &[I], exclude: &[E]) -> CoverageResult<Self> {
        Ok(Self {
            include: PatternSet::compile(include)?,
            exclude: PatternSet::compile(exclude)?,
            platform: compile_pattern(DEFAULT_PLATFORM_PATTERN)?,
        })
    }

    /// Replace the always-excluded platform pattern
    pub fn with_platform_pattern(mut self, pattern: &str) -> CoverageResult<Self> {
        self.platform = compile_pattern(pattern)?;
        Ok(self)
    }

    /// Eligibility check for a root-relative path.
    ///
    /// Include is evaluated first; exclude (user list plus platform pattern)
    /// always wins.
    #[must_use]
    pub fn is_eligible(&self, relative_path: &str) -> bool {
        let path = normalize_separators(relative_path);
        if !self.include.matches(&path) {
            return false;
        }
        !(self.exclude.matches(&path) || self.platform.matches_with(&path, MATCH_OPTIONS))
    }

    /// Include patterns
    #[must_use]
    pub fn include(&self) -> &PatternSet {
        &self.include
    }

    /// Exclude patterns (without the platform pattern)
    #[must_use]
    pub fn exclude(&self) -> &PatternSet {
        &self.exclude
    }
}

/// Convert `\` to `/`, collapse repeated separators and drop a leading `./` or `/`
#[must_use]
pub fn normalize_separators(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        let c = if c == '\\' { '/' } else { c };
        if c == '/' && out.ends_with('/') {
            continue;
        }
        out.push(c);
    }
    let trimmed = out.trim_start_matches("./").trim_start_matches('/');
    trimmed.to_string()
}

/// Root-relative match path for a file on disk, or `None` if `path` is not under `root`
#[must_use]
pub fn relative_match_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}
