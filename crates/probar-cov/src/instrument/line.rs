//! Line-oriented JavaScript instrumenter
//!
//! A conservative engine for the development server and tests. It counts a
//! statement at every line that starts one, and a function entry for every
//! `function` whose body opens on the same line. Anything it cannot place a
//! counter into safely is left untouched; input with unbalanced braces is
//! rejected as not instrumentable.
//!
//! Counters live in `globalThis[<coverage variable>][<path>]`, seeded with the
//! file's Istanbul record, so the browser can post the whole object back at the
//! end of a suite. The seeding header and function counters go after any
//! `'use strict'` prologue so strict mode survives instrumentation.

use super::{Instrumented, InstrumentedSegments, Instrumenter};
use crate::coverage::{FileCoverage, Range};
use crate::result::{CoverageError, CoverageResult};
use regex::Regex;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::OnceLock;

/// Default global holding coverage objects
pub const DEFAULT_COVERAGE_VARIABLE: &str = "__coverage__";

const SUPPORTED_EXTENSIONS: [&str; 5] = ["js", "mjs", "cjs", "html", "htm"];

/// Tokens that continue the previous line's expression
const CONTINUATION_PREFIXES: [&str; 15] = [
    ".", ")", "]", "}", ",", "?", ":", "+", "-", "*", "/", "%", "&", "|", "=",
];

const NON_STATEMENT_KEYWORDS: [&str; 8] = [
    "else", "catch", "finally", "case", "default", "function", "import", "class",
];

#[allow(clippy::expect_used)]
fn function_head() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\bfunction\b\s*\*?\s*([A-Za-z_$][\w$]*)?\s*\(").expect("static function regex")
    })
}

#[allow(clippy::expect_used)]
fn code_block_tail() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\)|=>|\belse|\btry|\bdo|\bfinally)\s*$").expect("static block regex")
    })
}

#[allow(clippy::expect_used)]
fn class_keyword() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\bclass\b").expect("static class regex"))
}

/// Line-level instrumentation engine
#[derive(Debug, Clone)]
pub struct LineInstrumenter {
    coverage_variable: String,
}

impl Default for LineInstrumenter {
    fn default() -> Self {
        Self {
            coverage_variable: DEFAULT_COVERAGE_VARIABLE.to_string(),
        }
    }
}

impl LineInstrumenter {
    /// Create an instrumenter writing to `__coverage__`
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different global for coverage objects
    #[must_use]
    pub fn with_coverage_variable(mut self, name: impl Into<String>) -> Self {
        self.coverage_variable = name.into();
        self
    }

    /// Global holding coverage objects
    #[must_use]
    pub fn coverage_variable(&self) -> &str {
        &self.coverage_variable
    }

    fn header(&self, var: &str, coverage: &FileCoverage) -> CoverageResult<String> {
        let global = escape_script(&serde_json::to_string(&self.coverage_variable)?);
        let path = escape_script(&serde_json::to_string(&coverage.path)?);
        let record = escape_script(&serde_json::to_string(coverage)?);
        Ok(format!(
            "var {var} = (function () {{ var g = typeof globalThis !== 'undefined' ? globalThis : this; \
             var c = g[{global}] || (g[{global}] = {{}}); var p = {path}; \
             if (!c[p]) {{ c[p] = {record}; }} return c[p]; }})();"
        ))
    }
}

impl Instrumenter for LineInstrumenter {
    fn instrument(&self, code: &str, file_id: &Path) -> CoverageResult<Instrumented> {
        let mut out = self.instrument_segments(&[code], file_id)?;
        Ok(Instrumented {
            code: out.segments.pop().unwrap_or_default(),
            coverage: out.coverage,
        })
    }

    /// Every piece carries the seeding header, so each one runs on its own
    /// (module scripts included). Line numbers continue across pieces.
    fn instrument_segments(
        &self,
        segments: &[&str],
        file_id: &Path,
    ) -> CoverageResult<InstrumentedSegments> {
        let supported = file_id
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| SUPPORTED_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
        if !supported {
            return Err(CoverageError::not_instrumentable(
                file_id,
                "unsupported file type",
            ));
        }

        let path = file_id.to_string_lossy().into_owned();
        let var = counter_variable(&path);
        let mut coverage = FileCoverage::new(path);
        let mut bodies = Vec::with_capacity(segments.len());
        let mut first_line = 1;
        for code in segments {
            bodies.push(instrument_body(code, first_line, &var, &mut coverage, file_id)?);
            first_line += code.matches('\n').count() as u32 + 1;
        }

        let header = self.header(&var, &coverage)?;
        Ok(InstrumentedSegments {
            segments: bodies.into_iter().map(|b| b.with_header(&header)).collect(),
            coverage,
        })
    }
}

/// Instrumented piece waiting for its header
#[derive(Debug)]
struct Body {
    code: String,
    header_at: usize,
}

impl Body {
    fn with_header(mut self, header: &str) -> String {
        self.code.insert_str(self.header_at, header);
        self.code
    }
}

/// Function counter held back until the body's directives are passed
#[derive(Debug)]
struct PendingCounter {
    line: usize,
    brace: usize,
    code: String,
}

fn instrument_body(
    code: &str,
    first_line: u32,
    var: &str,
    coverage: &mut FileCoverage,
    file_id: &Path,
) -> CoverageResult<Body> {
    let mut scanner = Scanner::default();
    let mut lines: Vec<(String, &str)> = Vec::new();
    let mut pending: Option<PendingCounter> = None;
    let mut in_prologue = true;
    let mut header_line = 0;

    for (index, raw) in code.split_inclusive('\n').enumerate() {
        let line_no = first_line + index as u32;
        let (content, ending) = split_line_ending(raw);
        let Some(analysis) = scanner.analyze(content) else {
            return Err(CoverageError::not_instrumentable(
                file_id,
                format!("unbalanced braces at line {line_no}"),
            ));
        };
        let opens_code = analysis.starts_in_code && analysis.has_code && !analysis.directive;

        if in_prologue {
            if analysis.directive {
                header_line = index + 1;
            } else if analysis.has_code {
                in_prologue = false;
            }
        }

        let mut line = content.to_string();
        if analysis.statement {
            let id = coverage.add_statement(Range::on_line(
                line_no,
                analysis.indent as u32,
                content.len() as u32,
            ));
            line.insert_str(analysis.indent, &format!("{var}.s['{id}']++;"));
        }

        if let Some(counter) = pending.take() {
            if !analysis.starts_in_code {
                lines[counter.line].0.insert_str(counter.brace, &counter.code);
            } else if opens_code {
                line.insert_str(analysis.indent, &counter.code);
            } else {
                pending = Some(counter);
            }
        }

        if let Some(brace) = analysis.function_body_at {
            let name = analysis.function_name.as_deref();
            let id = coverage.add_function(
                name,
                Range::on_line(line_no, analysis.indent as u32, content.len() as u32),
            );
            pending = Some(PendingCounter {
                line: index,
                brace: brace + 1 + line.len() - content.len(),
                code: format!("{var}.f['{id}']++;"),
            });
        }
        lines.push((line, ending));
    }

    if !scanner.is_balanced() {
        return Err(CoverageError::not_instrumentable(
            file_id,
            "unbalanced braces at end of input",
        ));
    }
    if let Some(counter) = pending {
        lines[counter.line].0.insert_str(counter.brace, &counter.code);
    }

    let mut body = String::with_capacity(code.len() * 2);
    let mut header_at = None;
    for (index, (line, ending)) in lines.iter().enumerate() {
        if index == header_line {
            header_at = Some(body.len());
        }
        body.push_str(line);
        body.push_str(ending);
    }
    let header_at = match header_at {
        Some(at) => at,
        None => {
            if !body.is_empty() && !body.ends_with('\n') {
                body.push('\n');
            }
            body.len()
        }
    };
    Ok(Body {
        code: body,
        header_at,
    })
}

/// Per-file counter variable derived from the asset path
fn counter_variable(path: &str) -> String {
    let digest = Sha256::digest(path.as_bytes());
    let hex: String = digest.iter().take(4).map(|b| format!("{b:02x}")).collect();
    format!("__cov_{hex}")
}

/// Keep `</script>` out of values embedded in HTML-hosted scripts
fn escape_script(json: &str) -> String {
    json.replace("</", "<\\/")
}

fn split_line_ending(raw: &str) -> (&str, &str) {
    if let Some(content) = raw.strip_suffix("\r\n") {
        (content, "\r\n")
    } else if let Some(content) = raw.strip_suffix('\n') {
        (content, "\n")
    } else {
        (raw, "")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    Code,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineEnd {
    Start,
    Semicolon,
    OpenBrace,
    CloseBrace,
    CaseLabel,
    CodeHead,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lexical {
    Code,
    BlockComment,
    Template,
}

#[derive(Debug)]
struct LineAnalysis {
    indent: usize,
    starts_in_code: bool,
    has_code: bool,
    directive: bool,
    statement: bool,
    function_body_at: Option<usize>,
    function_name: Option<String>,
}

#[derive(Debug)]
struct Scanner {
    blocks: Vec<Block>,
    lexical: Lexical,
    previous: LineEnd,
}

impl Default for Scanner {
    fn default() -> Self {
        Self {
            blocks: Vec::new(),
            lexical: Lexical::Code,
            previous: LineEnd::Start,
        }
    }
}

impl Scanner {
    fn is_balanced(&self) -> bool {
        self.blocks.is_empty()
    }

    fn in_code_block(&self) -> bool {
        self.blocks.last().map_or(true, |b| *b == Block::Code)
    }

    /// Analyze one line; `None` when a `}` closes nothing
    fn analyze(&mut self, content: &str) -> Option<LineAnalysis> {
        let started_in_code = self.lexical == Lexical::Code;
        let masked = self.mask(content);
        let code = masked.trim();
        let indent = content.len() - content.trim_start().len();

        let mut analysis = LineAnalysis {
            indent,
            starts_in_code: started_in_code,
            has_code: !code.is_empty(),
            directive: started_in_code && is_directive(content.trim_start()),
            statement: false,
            function_body_at: None,
            function_name: None,
        };
        if code.is_empty() {
            return Some(analysis);
        }

        analysis.statement = started_in_code
            && self.in_code_block()
            && matches!(
                self.previous,
                LineEnd::Start
                    | LineEnd::Semicolon
                    | LineEnd::OpenBrace
                    | LineEnd::CloseBrace
                    | LineEnd::CaseLabel
            )
            && masked.len() - masked.trim_start().len() == indent
            && starts_statement(code)
            && !analysis.directive;

        if code.ends_with('{') {
            if let Some(caps) = function_head().captures(code) {
                analysis.function_name = caps.get(1).map(|m| m.as_str().to_string());
                analysis.function_body_at = masked.rfind('{');
            }
        }

        let previous = self.previous;
        for (pos, byte) in masked.bytes().enumerate() {
            match byte {
                b'{' => {
                    let kind = classify_block(&masked[..pos], previous, self.in_code_block());
                    self.blocks.push(kind);
                }
                b'}' => {
                    self.blocks.pop()?;
                }
                _ => {}
            }
        }

        self.previous = classify_end(code);
        Some(analysis)
    }

    /// Blank out comments and string contents, preserving byte offsets
    fn mask(&mut self, content: &str) -> String {
        let bytes = content.as_bytes();
        let mut out = bytes.to_vec();
        let mut i = 0;
        while i < bytes.len() {
            match self.lexical {
                Lexical::BlockComment => {
                    if bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/') {
                        out[i] = b' ';
                        out[i + 1] = b' ';
                        i += 2;
                        self.lexical = Lexical::Code;
                        continue;
                    }
                    out[i] = b' ';
                }
                Lexical::Template => {
                    if bytes[i] == b'\\' {
                        out[i] = b' ';
                        if i + 1 < bytes.len() {
                            out[i + 1] = b' ';
                        }
                        i += 2;
                        continue;
                    }
                    if bytes[i] == b'`' {
                        self.lexical = Lexical::Code;
                    } else {
                        out[i] = b' ';
                    }
                }
                Lexical::Code => match bytes[i] {
                    b'/' if bytes.get(i + 1) == Some(&b'/') => {
                        out[i..].iter_mut().for_each(|b| *b = b' ');
                        break;
                    }
                    b'/' if bytes.get(i + 1) == Some(&b'*') => {
                        out[i] = b' ';
                        out[i + 1] = b' ';
                        i += 2;
                        self.lexical = Lexical::BlockComment;
                        continue;
                    }
                    b'`' => self.lexical = Lexical::Template,
                    quote @ (b'\'' | b'"') => {
                        let mut j = i + 1;
                        while j < bytes.len() && bytes[j] != quote {
                            out[j] = b' ';
                            if bytes[j] == b'\\' && j + 1 < bytes.len() {
                                out[j + 1] = b' ';
                                j += 1;
                            }
                            j += 1;
                        }
                        i = j + 1;
                        continue;
                    }
                    _ => {}
                },
            }
            i += 1;
        }
        String::from_utf8_lossy(&out).into_owned()
    }
}

fn is_directive(line: &str) -> bool {
    line.starts_with("'use strict'") || line.starts_with("\"use strict\"")
}

fn starts_statement(code: &str) -> bool {
    if CONTINUATION_PREFIXES.iter().any(|p| code.starts_with(p)) {
        return false;
    }
    let word: String = code
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '$')
        .collect();
    if word == "async" && code["async".len()..].trim_start().starts_with("function") {
        return false;
    }
    !NON_STATEMENT_KEYWORDS.contains(&word.as_str())
}

fn classify_block(before: &str, previous: LineEnd, in_code: bool) -> Block {
    let head = before.trim();
    if class_keyword().is_match(head) {
        return Block::Other;
    }
    if head.is_empty() {
        return match previous {
            LineEnd::CodeHead => Block::Code,
            LineEnd::Start
            | LineEnd::Semicolon
            | LineEnd::OpenBrace
            | LineEnd::CloseBrace
            | LineEnd::CaseLabel
                if in_code =>
            {
                Block::Code
            }
            _ => Block::Other,
        };
    }
    if code_block_tail().is_match(head) || head.ends_with('}') {
        // `} else {`, `} catch (e) {` and friends end up here too
        Block::Code
    } else {
        Block::Other
    }
}

fn classify_end(code: &str) -> LineEnd {
    if code.ends_with(';') {
        LineEnd::Semicolon
    } else if code.ends_with('{') {
        LineEnd::OpenBrace
    } else if code.ends_with('}') {
        LineEnd::CloseBrace
    } else if code.ends_with(':') && (code.starts_with("case ") || code.starts_with("default")) {
        LineEnd::CaseLabel
    } else if code_block_tail().is_match(code) {
        LineEnd::CodeHead
    } else {
        LineEnd::Other
    }
}
