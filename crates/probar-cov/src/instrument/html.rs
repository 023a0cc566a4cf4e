//! Inline script extraction for HTML assets
//!
//! Only `<script>` elements without a `src` attribute and with a JavaScript
//! (or missing) `type` take part. Bodies that contain nothing but comments are
//! skipped. Each eligible script keeps its place in the document, so scripts
//! still run in document order around external scripts and markup.

use regex::Regex;
use std::ops::Range;
use std::sync::OnceLock;

const JS_TYPES: [&str; 6] = [
    "text/javascript",
    "application/javascript",
    "text/ecmascript",
    "application/ecmascript",
    "module",
    "text/jsx",
];

#[allow(clippy::expect_used)]
fn script_element() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<script\b([^>]*)>(.*?)</script\s*>").expect("static script regex")
    })
}

#[allow(clippy::expect_used)]
fn src_attribute() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(?:^|\s)src\s*=").expect("static src regex"))
}

#[allow(clippy::expect_used)]
fn type_attribute() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)(?:^|\s)type\s*=\s*["']?([^"'\s>]*)"#).expect("static type regex")
    })
}

/// Byte ranges of every eligible inline script body, in document order
#[must_use]
pub fn inline_script_ranges(html: &str) -> Vec<Range<usize>> {
    script_element()
        .captures_iter(html)
        .filter_map(|caps| {
            let attrs = caps.get(1).map_or("", |m| m.as_str());
            let body = caps.get(2)?;
            if src_attribute().is_match(attrs) || !is_javascript_type(attrs) {
                return None;
            }
            if is_comment_only(body.as_str()) {
                return None;
            }
            Some(body.range())
        })
        .collect()
}

/// Trimmed bodies of the eligible inline scripts, in document order
#[must_use]
pub fn inline_scripts(html: &str) -> Vec<&str> {
    inline_script_ranges(html)
        .into_iter()
        .map(|r| html[r].trim())
        .collect()
}

/// Put instrumented pieces back into the document.
///
/// Pieces pair with [`inline_script_ranges`] in order, each replacing the body
/// it was made from. Markup and every other script are left where they are.
#[must_use]
pub fn splice_inline_scripts(html: &str, pieces: &[String]) -> String {
    let extra: usize = pieces.iter().map(|p| p.len() + 2).sum();
    let mut out = String::with_capacity(html.len() + extra);
    let mut cursor = 0;
    for (range, piece) in inline_script_ranges(html).into_iter().zip(pieces) {
        out.push_str(&html[cursor..range.start]);
        out.push('\n');
        out.push_str(piece);
        out.push('\n');
        cursor = range.end;
    }
    out.push_str(&html[cursor..]);
    out
}

fn is_javascript_type(attrs: &str) -> bool {
    let Some(caps) = type_attribute().captures(attrs) else {
        return true;
    };
    let kind = caps.get(1).map_or("", |m| m.as_str()).to_ascii_lowercase();
    kind.is_empty() || JS_TYPES.contains(&kind.as_str())
}

/// True if the script body holds only whitespace, `//`, `/* */` or `<!-- -->` comments
fn is_comment_only(body: &str) -> bool {
    let mut rest = body.trim_start();
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("//") {
            rest = after.split_once('\n').map_or("", |(_, tail)| tail);
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = after.split_once("*/").map_or("", |(_, tail)| tail);
        } else if let Some(after) = rest.strip_prefix("<!--") {
            rest = after.split_once("-->").map_or("", |(_, tail)| tail);
        } else {
            return false;
        }
        rest = rest.trim_start();
    }
    true
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!doctype html>
<html>
<head>
  <script src="../lib/vendor.js"></script>
  <script>var a = 1;</script>
  <script type="text/template"><div>{{ name }}</div></script>
</head>
<body>
  <script>
    // just a note
  </script>
  <script type="module">window.b = a + 1;</script>
</body>
</html>"#;

    #[test]
    fn test_inline_scripts_in_document_order() {
        assert_eq!(inline_scripts(PAGE), vec!["var a = 1;", "window.b = a + 1;"]);
    }

    #[test]
    fn test_external_and_template_scripts_ignored() {
        let ranges = inline_script_ranges(PAGE);
        assert_eq!(ranges.len(), 2);
        for r in ranges {
            assert!(!PAGE[r].contains("{{ name }}"));
        }
    }

    #[test]
    fn test_no_inline_scripts_is_none() {
        let html = r#"<html><script src="app.js"></script><p>hi</p></html>"#;
        assert!(inline_scripts(html).is_empty());
    }

    #[test]
    fn test_comment_only_scripts_are_none() {
        let html = "<script>/* nothing */ <!-- legacy --> // here\n</script>";
        assert!(inline_scripts(html).is_empty());
    }

    #[test]
    fn test_splice_replaces_each_script_in_place() {
        let pieces = vec!["FIRST();".to_string(), "SECOND();".to_string()];
        let out = splice_inline_scripts(PAGE, &pieces);
        assert!(!out.contains("var a = 1;"));
        assert!(!out.contains("window.b = a + 1;"));
        assert!(out.contains("{{ name }}"));
        assert!(out.contains("// just a note"));

        let vendor = out.find(r#"<script src="../lib/vendor.js"></script>"#).unwrap();
        let first = out.find("<script>\nFIRST();\n</script>").unwrap();
        let template = out.find("text/template").unwrap();
        let second = out
            .find("<script type=\"module\">\nSECOND();\n</script>")
            .unwrap();
        assert!(vendor < first && first < template && template < second);
    }

    #[test]
    fn test_splice_keeps_order_around_external_script() {
        let html = r#"<script>var early = 1;</script><script src="lib.js"></script><div id="d"></div><script>show(lib.value);</script>"#;
        let out = splice_inline_scripts(html, &["A();".to_string(), "B();".to_string()]);
        assert_eq!(
            out,
            "<script>\nA();\n</script><script src=\"lib.js\"></script><div id=\"d\"></div><script>\nB();\n</script>"
        );
    }

    #[test]
    fn test_uppercase_tags_and_attributes() {
        let html = "<SCRIPT TYPE='text/javascript'>go();</SCRIPT>";
        assert_eq!(inline_scripts(html), vec!["go();"]);
    }

    #[test]
    fn test_comment_only_detection() {
        assert!(is_comment_only("  \n "));
        assert!(is_comment_only("// a\n/* b */"));
        assert!(!is_comment_only("// a\nrun();"));
    }
}
