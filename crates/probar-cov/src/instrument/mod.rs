//! Asset instrumentation
//!
//! An [`Instrumenter`] turns JavaScript source into a counting variant plus the
//! Istanbul record describing what it counts. [`AssetKind`] decides how much
//! of an asset is handed to the instrumenter: scripts go in whole, HTML pages
//! contribute their inline scripts only, as pieces of a single record.

mod html;
mod line;

pub use html::{inline_script_ranges, inline_scripts, splice_inline_scripts};
pub use line::{LineInstrumenter, DEFAULT_COVERAGE_VARIABLE};

use crate::coverage::FileCoverage;
use crate::result::{CoverageError, CoverageResult};
use std::fmt::Debug;
use std::path::Path;

/// Output of instrumenting one unit of JavaScript
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instrumented {
    /// Instrumented source
    pub code: String,
    /// Shape of the counters embedded in `code`, all zero
    pub coverage: FileCoverage,
}

/// Output of instrumenting the pieces of one asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentedSegments {
    /// Instrumented pieces, one per input piece and in the same order
    pub segments: Vec<String>,
    /// Shape of the counters across all pieces, all zero
    pub coverage: FileCoverage,
}

/// Line placed between pieces by the default [`Instrumenter::instrument_segments`]
const SEGMENT_MARKER: &str = "\n/*probar-cov:segment*/\n";

/// Instrumentation engine
///
/// `file_id` is the absolute path of the asset and becomes the key of its
/// record in the browser's coverage object. Input the engine cannot handle
/// yields [`crate::CoverageError::NotInstrumentable`].
pub trait Instrumenter: Send + Sync + Debug {
    /// Instrument `code` on behalf of `file_id`
    fn instrument(&self, code: &str, file_id: &Path) -> CoverageResult<Instrumented>;

    /// Instrument separate pieces of one asset into a single record.
    ///
    /// Counter ids keep counting across pieces. The default instruments the
    /// pieces joined by a marker comment and splits the output on it, so it
    /// needs an engine that keeps comments; engines whose pieces must each
    /// run on their own override it.
    fn instrument_segments(
        &self,
        segments: &[&str],
        file_id: &Path,
    ) -> CoverageResult<InstrumentedSegments> {
        let out = self.instrument(&segments.join(SEGMENT_MARKER), file_id)?;
        let pieces: Vec<String> = out.code.split(SEGMENT_MARKER).map(str::to_string).collect();
        if pieces.len() != segments.len() {
            return Err(CoverageError::not_instrumentable(
                file_id,
                "engine output lost script boundaries",
            ));
        }
        Ok(InstrumentedSegments {
            segments: pieces,
            coverage: out.coverage,
        })
    }
}

/// How an asset is fed to the instrumenter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    /// The whole file is JavaScript
    Script,
    /// Only inline `<script>` bodies are JavaScript
    Html,
}

impl AssetKind {
    /// Kind of the asset at `path`, by extension
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("html" | "htm") => Self::Html,
            _ => Self::Script,
        }
    }

    /// JavaScript pieces to instrument, or `None` if the asset has none
    #[must_use]
    pub fn extract(self, source: &str) -> Option<Vec<&str>> {
        match self {
            Self::Script => Some(vec![source]),
            Self::Html => {
                let scripts = inline_scripts(source);
                (!scripts.is_empty()).then_some(scripts)
            }
        }
    }

    /// Rebuild the served asset around the instrumented pieces
    #[must_use]
    pub fn assemble(self, source: &str, pieces: &[String]) -> String {
        match self {
            Self::Script => pieces.concat(),
            Self::Html => splice_inline_scripts(source, pieces),
        }
    }

    /// Extract, instrument and reassemble `source`.
    ///
    /// `Ok(None)` means there is nothing to instrument (an HTML page without
    /// eligible inline scripts).
    pub fn instrument(
        self,
        instrumenter: &dyn Instrumenter,
        source: &str,
        file_id: &Path,
    ) -> CoverageResult<Option<Instrumented>> {
        let Some(pieces) = self.extract(source) else {
            return Ok(None);
        };
        let out = instrumenter.instrument_segments(&pieces, file_id)?;
        Ok(Some(Instrumented {
            code: self.assemble(source, &out.segments),
            coverage: out.coverage,
        }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_kind_from_path() {
        assert_eq!(AssetKind::from_path(Path::new("/a/index.html")), AssetKind::Html);
        assert_eq!(AssetKind::from_path(Path::new("/a/INDEX.HTM")), AssetKind::Html);
        assert_eq!(AssetKind::from_path(Path::new("/a/app.js")), AssetKind::Script);
        assert_eq!(AssetKind::from_path(Path::new("/a/Makefile")), AssetKind::Script);
    }

    #[test]
    fn test_script_passes_through_whole() {
        assert_eq!(AssetKind::Script.extract("a();").unwrap(), vec!["a();"]);
        assert_eq!(AssetKind::Script.assemble("a();", &["X".to_string()]), "X");
    }

    #[test]
    fn test_html_without_scripts_is_nothing() {
        let out = AssetKind::Html
            .instrument(&LineInstrumenter::new(), "<p>hi</p>", Path::new("/a.html"))
            .unwrap();
        assert!(out.is_none());
    }

    #[test]
    fn test_html_instrumented_in_place() {
        let page = "<html><script>one();</script><p>x</p><script>two();</script></html>";
        let path = PathBuf::from("/srv/page.html");
        let out = AssetKind::Html
            .instrument(&LineInstrumenter::new(), page, &path)
            .unwrap()
            .unwrap();
        assert!(out.code.contains("<p>x</p>"));
        assert!(out.code.contains("one();"));
        assert!(out.code.contains("two();"));
        assert_eq!(out.code.matches("<script>").count(), 2);
        assert_eq!(out.coverage.path, "/srv/page.html");
        assert_eq!(out.coverage.statement_map.len(), 2);

        let one = out.code.find("one();").unwrap();
        let markup = out.code.find("<p>x</p>").unwrap();
        let two = out.code.find("two();").unwrap();
        assert!(one < markup && markup < two);
        assert!(out.code.contains(".s['0']++;one();"));
        assert!(out.code.contains(".s['1']++;two();"));
    }

    #[test]
    fn test_html_scripts_keep_order_around_external_script() {
        let page = r#"<script>var early = 1;</script><script src="lib.js"></script><div id="d"></div><script>document.getElementById('d').textContent = lib.value;</script>"#;
        let out = AssetKind::Html
            .instrument(&LineInstrumenter::new(), page, Path::new("/srv/order.html"))
            .unwrap()
            .unwrap();

        let early = out.code.find("var early = 1;").unwrap();
        let lib = out.code.find(r#"<script src="lib.js"></script>"#).unwrap();
        let div = out.code.find(r#"<div id="d"></div>"#).unwrap();
        let body = out.code.find("document.getElementById('d')").unwrap();
        assert!(early < lib && lib < div && div < body);
        assert!(!out.code.contains("<script></script>"));

        // every piece can run on its own and finds the shared record
        let pieces: Vec<&str> = out.code.split("<script>").skip(1).collect();
        assert_eq!(pieces.len(), 2);
        for piece in pieces {
            assert!(piece.trim_start().starts_with("var __cov_"));
        }
        assert_eq!(out.coverage.statement_map.len(), 2);
        assert_eq!(out.coverage.statement_map["1"].start.line, 2);
    }

    #[test]
    fn test_module_script_stays_a_module() {
        let page = "<script>var a = 1;</script>\n<script type=\"module\">\nimport { x } from './x.js';\nx(a);\n</script>";
        let out = AssetKind::Html
            .instrument(&LineInstrumenter::new(), page, Path::new("/srv/mod.html"))
            .unwrap()
            .unwrap();
        let module = out.code.find("<script type=\"module\">").unwrap();
        assert!(out.code.find("var a = 1;").unwrap() < module);
        assert!(out.code.find("import { x }").unwrap() > module);
    }

    /// Engine that leaves code alone and reports one statement
    #[derive(Debug)]
    struct Passthrough;

    impl Instrumenter for Passthrough {
        fn instrument(&self, code: &str, file_id: &Path) -> CoverageResult<Instrumented> {
            let mut coverage = FileCoverage::new(file_id.to_string_lossy().into_owned());
            let _ = coverage.add_statement(crate::coverage::Range::on_line(1, 0, 1));
            Ok(Instrumented {
                code: code.to_string(),
                coverage,
            })
        }
    }

    #[test]
    fn test_default_segments_split_on_marker() {
        let out = Passthrough
            .instrument_segments(&["a();", "b();"], Path::new("/p.html"))
            .unwrap();
        assert_eq!(out.segments, vec!["a();", "b();"]);
        assert_eq!(out.coverage.statement_map.len(), 1);
    }

    #[test]
    fn test_engine_errors_propagate() {
        let err = AssetKind::Script
            .instrument(&LineInstrumenter::new(), "{", Path::new("/a.js"))
            .unwrap_err();
        assert!(err.is_not_instrumentable());
    }
}
