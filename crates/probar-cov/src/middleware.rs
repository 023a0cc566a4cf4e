//! Coverage serving middleware
//!
//! Sits in front of any axum [`Router`]. For every GET/HEAD request it maps the
//! URL to a file of the package under test and, when that file is eligible and
//! instrumentable, answers with the instrumented content. Everything else falls
//! through to the wrapped router untouched.
//!
//! ```text
//! request ─► strip client root ─► strip package token ─► eligible? ─► cache
//!               │ no                  │ no                  │ no       │ miss
//!               └─────────────────────┴─────────────────────┴──────────┴─► next
//! ```

use crate::cache::InstrumentedEntry;
use crate::context::CoverageContext;
use crate::diagnostics::{Action, DiagnosticEvent};
use crate::matcher::normalize_separators;
use crate::result::CoverageResult;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::Router;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const COMPONENT: &str = "coverage-middleware";

/// Outcome of the per-request decision
#[derive(Debug, Clone)]
pub enum ServeDecision {
    /// Serve this instrumented content instead of the file
    Instrumented {
        /// Absolute asset path
        path: PathBuf,
        /// Cached entry
        entry: Arc<InstrumentedEntry>,
    },
    /// Let the next handler serve the request
    PassThrough,
}

/// Request-path to instrumented-content resolver
#[derive(Debug, Clone)]
pub struct CoverageMiddleware {
    ctx: Arc<CoverageContext>,
    client_root: String,
    package: String,
}

impl CoverageMiddleware {
    /// Middleware serving the whole root (no client root, no package token)
    #[must_use]
    pub fn new(ctx: Arc<CoverageContext>) -> Self {
        Self {
            ctx,
            client_root: String::new(),
            package: String::new(),
        }
    }

    /// URL prefix under which the root is served (e.g. `/components/`)
    #[must_use]
    pub fn with_client_root(mut self, client_root: &str) -> Self {
        self.client_root = trim_slashes(client_root);
        self
    }

    /// Path segment naming the package under test
    #[must_use]
    pub fn with_package(mut self, package: &str) -> Self {
        self.package = trim_slashes(package);
        self
    }

    /// Shared run context
    #[must_use]
    pub fn context(&self) -> &Arc<CoverageContext> {
        &self.ctx
    }

    /// Decide how to serve `request_path`.
    ///
    /// Only unexpected I/O failures are errors; missing or non-instrumentable
    /// files pass through.
    pub fn decide(&self, request_path: &str) -> CoverageResult<ServeDecision> {
        let _request = self.ctx.enter_request();

        let Some(relative) = self.package_relative(request_path) else {
            self.emit(Action::Skip, request_path);
            return Ok(ServeDecision::PassThrough);
        };
        if relative.is_empty()
            || relative.split('/').any(|segment| segment == "..")
            || !self.ctx.rules().is_eligible(&relative)
        {
            self.emit(Action::Skip, &relative);
            return Ok(ServeDecision::PassThrough);
        }

        let path = self.ctx.root().join(&relative);
        match self
            .ctx
            .cache()
            .get_instrumented(&path, self.ctx.instrumenter())?
        {
            Some(entry) => {
                self.emit(Action::Instrument, &path.to_string_lossy());
                Ok(ServeDecision::Instrumented { path, entry })
            }
            None => {
                self.emit(Action::Skip, &relative);
                Ok(ServeDecision::PassThrough)
            }
        }
    }

    /// Install the middleware in front of `app`.
    ///
    /// Applies to the routes and fallback already registered on `app`.
    #[must_use]
    pub fn wrap(self: Arc<Self>, app: Router) -> Router {
        app.layer(middleware::from_fn_with_state(self, coverage_layer))
    }

    /// Path relative to the package, or `None` when the request is outside it
    fn package_relative(&self, request_path: &str) -> Option<String> {
        let path = normalize_separators(request_path);
        let scoped = strip_segment_prefix(&path, &self.client_root)?;
        let relative = strip_segment_prefix(scoped, &self.package)?;
        Some(relative.to_string())
    }

    fn emit(&self, action: Action, detail: &str) {
        self.ctx
            .sink()
            .emit(DiagnosticEvent::debug(COMPONENT, action, detail));
    }
}

async fn coverage_layer(
    State(middleware): State<Arc<CoverageMiddleware>>,
    request: Request,
    next: Next,
) -> Response {
    if !matches!(*request.method(), Method::GET | Method::HEAD) {
        return next.run(request).await;
    }

    let request_path = request.uri().path().to_string();
    let decider = Arc::clone(&middleware);
    let decision = tokio::task::spawn_blocking(move || decider.decide(&request_path)).await;

    match decision {
        Ok(Ok(ServeDecision::Instrumented { path, entry })) => instrumented_response(&path, &entry),
        Ok(Ok(ServeDecision::PassThrough)) => next.run(request).await,
        Ok(Err(e)) => {
            tracing::error!(error = %e, "coverage middleware failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "coverage middleware task failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn instrumented_response(path: &Path, entry: &InstrumentedEntry) -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, mime_type(path))
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from(entry.content.clone()))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// MIME type for a served file
#[must_use]
pub fn mime_type(path: &Path) -> String {
    match path.extension().and_then(|e| e.to_str()) {
        Some("wasm") => "application/wasm".to_string(),
        Some("js" | "mjs" | "cjs") => "text/javascript".to_string(),
        Some("html" | "htm") => "text/html".to_string(),
        Some("css") => "text/css".to_string(),
        Some("json") => "application/json".to_string(),
        Some("svg") => "image/svg+xml".to_string(),
        _ => mime_guess::from_path(path)
            .first_or_octet_stream()
            .to_string(),
    }
}

fn trim_slashes(s: &str) -> String {
    normalize_separators(s).trim_end_matches('/').to_string()
}

/// Strip `prefix` from `path` at a segment boundary
fn strip_segment_prefix<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    if prefix.is_empty() {
        return Some(path);
    }
    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() {
        Some(rest)
    } else {
        rest.strip_prefix('/')
    }
}
