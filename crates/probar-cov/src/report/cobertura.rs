//! Cobertura XML Coverage Reporter
//!
//! ## Cobertura XML Format
//!
//! ```xml
//! <?xml version="1.0" ?>
//! <!DOCTYPE coverage SYSTEM "http://cobertura.sourceforge.net/xml/coverage-04.dtd">
//! <coverage line-rate="0.8" branch-rate="0.7" version="1.0">
//!   <packages>
//!     <package name="src" line-rate="0.8" branch-rate="0.7" complexity="0">
//!       <classes>
//!         <class name="app.js" filename="src/app.js" line-rate="0.9">
//!           <lines>
//!             <line number="10" hits="5"/>
//!           </lines>
//!         </class>
//!       </classes>
//!     </package>
//!   </packages>
//! </coverage>
//! ```

use super::{write_file, Reporter};
use crate::config::ReporterKind;
use crate::coverage::{CoverageSummary, FileCoverage, FinalCoverage, Totals};
use crate::result::CoverageResult;
use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::{Path, PathBuf};

/// Files grouped by parent directory
type PackageMap<'a> = BTreeMap<String, Vec<&'a FileCoverage>>;

/// Writes `cobertura-coverage.xml`
#[derive(Debug, Clone)]
pub struct CoberturaReporter {
    version: String,
}

impl Default for CoberturaReporter {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
        }
    }
}

impl CoberturaReporter {
    /// Set the version string
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Generate Cobertura XML report as a string
    #[must_use]
    pub fn generate(&self, coverage: &FinalCoverage) -> String {
        let total = coverage.total;
        let packages = Self::group_by_package(coverage);

        let mut xml = String::from(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
        xml.push('\n');
        xml.push_str(
            r#"<!DOCTYPE coverage SYSTEM "http://cobertura.sourceforge.net/xml/coverage-04.dtd">"#,
        );
        xml.push('\n');
        let _ = writeln!(
            xml,
            r#"<coverage line-rate="{:.4}" branch-rate="{:.4}" lines-covered="{}" lines-valid="{}" branches-covered="{}" branches-valid="{}" complexity="0" version="{}">"#,
            rate(total.lines),
            rate(total.branches),
            total.lines.covered,
            total.lines.total,
            total.branches.covered,
            total.branches.total,
            escape(&self.version),
        );

        xml.push_str("  <packages>\n");
        for (package_name, files) in &packages {
            let summary = files
                .iter()
                .map(|f| CoverageSummary::of_file(f))
                .fold(CoverageSummary::default(), CoverageSummary::combine);
            let _ = writeln!(
                xml,
                r#"    <package name="{}" line-rate="{:.4}" branch-rate="{:.4}" complexity="0">"#,
                escape(package_name),
                rate(summary.lines),
                rate(summary.branches),
            );
            xml.push_str("      <classes>\n");
            for file in files {
                Self::write_class(&mut xml, file);
            }
            xml.push_str("      </classes>\n");
            xml.push_str("    </package>\n");
        }
        xml.push_str("  </packages>\n");
        xml.push_str("</coverage>\n");
        xml
    }

    fn write_class(xml: &mut String, file: &FileCoverage) {
        let summary = CoverageSummary::of_file(file);
        let class_name = Path::new(&file.path)
            .file_name()
            .map_or_else(|| file.path.clone(), |n| n.to_string_lossy().into_owned());
        let _ = writeln!(
            xml,
            r#"        <class name="{}" filename="{}" line-rate="{:.4}" branch-rate="{:.4}" complexity="0">"#,
            escape(&class_name),
            escape(&file.path),
            rate(summary.lines),
            rate(summary.branches),
        );

        xml.push_str("          <methods>\n");
        for (id, meta) in &file.fn_map {
            let hits = file.f.get(id).copied().unwrap_or(0);
            let _ = writeln!(
                xml,
                r#"            <method name="{}" hits="{hits}" signature="()V"><lines><line number="{}" hits="{hits}"/></lines></method>"#,
                escape(&meta.name),
                meta.line,
            );
        }
        xml.push_str("          </methods>\n");

        xml.push_str("          <lines>\n");
        for (line, count) in file.line_hits() {
            let _ = writeln!(xml, r#"            <line number="{line}" hits="{count}"/>"#);
        }
        xml.push_str("          </lines>\n");
        xml.push_str("        </class>\n");
    }

    /// Group files by parent directory
    fn group_by_package(coverage: &FinalCoverage) -> PackageMap<'_> {
        let mut packages: PackageMap<'_> = BTreeMap::new();
        for (_, file) in coverage.coverage.files() {
            let package = Path::new(&file.path)
                .parent()
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| ".".to_string());
            packages.entry(package).or_default().push(file);
        }
        packages
    }
}

impl Reporter for CoberturaReporter {
    fn kind(&self) -> ReporterKind {
        ReporterKind::Cobertura
    }

    fn write(&self, coverage: &FinalCoverage, dir: &Path) -> CoverageResult<Option<PathBuf>> {
        write_file(self.kind(), dir, "cobertura-coverage.xml", &self.generate(coverage)).map(Some)
    }
}

fn rate(totals: Totals) -> f64 {
    totals.pct / 100.0
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
