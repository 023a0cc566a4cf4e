//! LCOV Report Reporter
//!
//! ## LCOV Format
//!
//! ```text
//! TN:<test name>
//! SF:<source file>
//! FN:<line>,<function name>
//! FNDA:<execution count>,<function name>
//! FNF:<functions found>
//! FNH:<functions hit>
//! BRDA:<line>,<block>,<branch>,<taken>
//! BRF:<branches found>
//! BRH:<branches hit>
//! DA:<line>,<execution count>
//! LF:<lines found>
//! LH:<lines hit>
//! end_of_record
//! ```

use super::{write_file, Reporter};
use crate::config::ReporterKind;
use crate::coverage::{FileCoverage, FinalCoverage};
use crate::result::CoverageResult;
use std::fmt::Write;
use std::path::{Path, PathBuf};

/// Writes `lcov.info`
#[derive(Debug, Clone, Default)]
pub struct LcovReporter {
    test_name: Option<String>,
}

impl LcovReporter {
    /// Set the test name for the report
    #[must_use]
    pub fn with_test_name(mut self, name: impl Into<String>) -> Self {
        self.test_name = Some(name.into());
        self
    }

    /// Generate LCOV format report as a string
    #[must_use]
    pub fn generate(&self, coverage: &FinalCoverage) -> String {
        let mut output = String::new();
        for (_, file) in coverage.coverage.files() {
            match self.test_name {
                Some(ref name) => {
                    let _ = writeln!(output, "TN:{name}");
                }
                None => output.push_str("TN:\n"),
            }
            Self::write_file_record(&mut output, file);
        }
        output
    }

    fn write_file_record(output: &mut String, file: &FileCoverage) {
        let _ = writeln!(output, "SF:{}", file.path);

        let mut functions_hit = 0;
        for meta in file.fn_map.values() {
            let _ = writeln!(output, "FN:{},{}", meta.line, meta.name);
        }
        for (id, meta) in &file.fn_map {
            let count = file.f.get(id).copied().unwrap_or(0);
            let _ = writeln!(output, "FNDA:{count},{}", meta.name);
            if count > 0 {
                functions_hit += 1;
            }
        }
        let _ = writeln!(output, "FNF:{}", file.fn_map.len());
        let _ = writeln!(output, "FNH:{functions_hit}");

        let mut branches_found = 0;
        let mut branches_hit = 0;
        for (id, meta) in &file.branch_map {
            let arms = file.b.get(id).map_or(&[][..], Vec::as_slice);
            for arm in 0..meta.locations.len().max(arms.len()) {
                let taken = arms.get(arm).copied().unwrap_or(0);
                let _ = writeln!(output, "BRDA:{},{id},{arm},{taken}", meta.line);
                branches_found += 1;
                if taken > 0 {
                    branches_hit += 1;
                }
            }
        }
        let _ = writeln!(output, "BRF:{branches_found}");
        let _ = writeln!(output, "BRH:{branches_hit}");

        let lines = file.line_hits();
        let mut lines_hit = 0;
        for (line, count) in &lines {
            let _ = writeln!(output, "DA:{line},{count}");
            if *count > 0 {
                lines_hit += 1;
            }
        }
        let _ = writeln!(output, "LF:{}", lines.len());
        let _ = writeln!(output, "LH:{lines_hit}");

        output.push_str("end_of_record\n");
    }
}

impl Reporter for LcovReporter {
    fn kind(&self) -> ReporterKind {
        ReporterKind::Lcov
    }

    fn write(&self, coverage: &FinalCoverage, dir: &Path) -> CoverageResult<Option<PathBuf>> {
        write_file(self.kind(), dir, "lcov.info", &self.generate(coverage)).map(Some)
    }
}
