//! End-to-end coverage run
//!
//! Serves a small package through the coverage middleware, plays the browser's
//! part by reporting counters for what it loaded, then ends the run.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use probar_cov::{
    Action, CoverageContext, CoverageError, CoverageOptions, CoveragePlugin, MemorySink, Metric,
    ReporterKind, SuiteData, ThresholdConfig, ThresholdLevel,
};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

fn write_package(root: &Path) {
    fs::write(
        root.join("a.js"),
        "function greet(name) {\n  return 'hi ' + name;\n}\ngreet('a');\n",
    )
    .unwrap();
    fs::write(root.join("b.js"), "var unused = 1;\nconsole.log(unused);\n").unwrap();
    fs::write(root.join("index.html"), "<html><script src=\"a.js\"></script></html>").unwrap();
}

fn options(each: Option<f64>) -> CoverageOptions {
    CoverageOptions::new()
        .with_include(["*.js"])
        .with_reporters(vec![
            ReporterKind::Json,
            ReporterKind::JsonSummary,
            ReporterKind::Lcov,
            ReporterKind::TextSummary,
        ])
        .with_thresholds(ThresholdConfig {
            global: None,
            each: each.map(ThresholdLevel::All),
        })
}

fn static_files() -> Router {
    Router::new().fallback(|| async { "uninstrumented" })
}

async fn get(app: &Router, uri: &str) -> (StatusCode, String) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

/// What a browser would report after executing everything it loaded
fn browser_payload(plugin: &CoveragePlugin, loaded: &[&str]) -> SuiteData {
    let records = loaded.iter().map(|name| {
        let path = plugin.context().root().join(name);
        let entry = plugin.context().cache().get(&path).expect("asset was served");
        let mut record = entry.coverage.clone();
        record.s.values_mut().for_each(|c| *c = 1);
        record.f.values_mut().for_each(|c| *c = 1);
        record
    });
    SuiteData {
        coverage: Some(records.collect()),
    }
}

#[tokio::test]
async fn test_each_threshold_fails_on_unrequested_file() {
    let dir = TempDir::new().unwrap();
    write_package(dir.path());
    let sink = Arc::new(MemorySink::new());
    let opts = options(Some(50.0));
    let ctx = CoverageContext::new(dir.path(), opts.match_rules().unwrap())
        .unwrap()
        .with_sink(sink.clone());
    let plugin = CoveragePlugin::with_context(ctx, opts).with_scope("/components", "pkg");

    let mut app = None;
    plugin.define_webserver(static_files(), |wrapped| app = Some(wrapped));
    let app = app.unwrap();

    let (status, body) = get(&app, "/components/pkg/a.js").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("__coverage__"));
    assert!(body.contains("return 'hi ' + name;"));

    let (_, page) = get(&app, "/components/pkg/index.html").await;
    assert_eq!(page, "uninstrumented");
    let (_, outside) = get(&app, "/components/other/b.js").await;
    assert_eq!(outside, "uninstrumented");

    plugin.sub_suite_end("chrome", &browser_payload(&plugin, &["a.js"]));
    plugin.sub_suite_end("firefox", &browser_payload(&plugin, &["a.js"]));

    let err = plugin.run_end(None).unwrap_err();
    let CoverageError::ThresholdFailure { failures } = err else {
        panic!("expected a threshold failure");
    };
    let b_path = plugin.context().root().join("b.js");
    let statements = failures
        .iter()
        .find(|f| f.contains(Metric::Statements.as_str()))
        .unwrap();
    assert!(statements.contains("Coverage threshold (50%) not met"));
    assert!(statements.contains(&*b_path.to_string_lossy()));
    assert!(!failures.iter().any(|f| f.contains("a.js")));

    // reports were written before validation failed
    let summary: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(plugin.report_dir().join("coverage-summary.json")).unwrap(),
    )
    .unwrap();
    let a_path = plugin.context().root().join("a.js");
    assert_eq!(summary[&*a_path.to_string_lossy()]["statements"]["pct"], 100.0);
    assert_eq!(summary[&*b_path.to_string_lossy()]["statements"]["pct"], 0.0);
    assert!(plugin.report_dir().join("lcov.info").is_file());

    assert_eq!(sink.with_action(Action::Instrument).len(), 1);
    assert!(plugin.context().cache().is_empty());
}

#[tokio::test]
async fn test_run_passes_without_thresholds() {
    let dir = TempDir::new().unwrap();
    write_package(dir.path());
    let plugin = CoveragePlugin::new(dir.path(), options(None)).unwrap();
    let app = plugin.wrap(static_files());

    let (_, body) = get(&app, "/a.js").await;
    assert!(body.contains("greet('a');"));
    plugin.sub_suite_end("chrome", &browser_payload(&plugin, &["a.js"]));

    let report = plugin.run_end(None).unwrap().unwrap();
    assert_eq!(report.swept, 1);
    assert!(report.validation.passed());
    let total = report.coverage.total;
    assert_eq!(total.statements.covered, 2);
    assert_eq!(total.statements.total, 4);
    assert_eq!(total.statements.pct, 50.0);
    assert_eq!(total.functions.covered, 1);
    assert_eq!(total.functions.total, 1);
}

#[tokio::test]
async fn test_next_run_starts_fresh() {
    let dir = TempDir::new().unwrap();
    write_package(dir.path());
    let plugin = CoveragePlugin::new(dir.path(), options(None)).unwrap();
    let app = plugin.wrap(static_files());

    let _ = get(&app, "/a.js").await;
    plugin.sub_suite_end("chrome", &browser_payload(&plugin, &["a.js"]));
    assert!(plugin.run_end(Some("suite crashed")).unwrap().is_none());
    assert!(!plugin.report_dir().exists());

    fs::write(dir.path().join("a.js"), "changed();\n").unwrap();
    let (_, body) = get(&app, "/a.js").await;
    assert!(body.contains("changed();"));
}
