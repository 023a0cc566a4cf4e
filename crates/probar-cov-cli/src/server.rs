//! Coverage test server
//!
//! Static file server for a browser test run with the coverage middleware in
//! front of it. The runner's lifecycle events arrive over HTTP:
//!
//! - `POST /__coverage/suite`: `{"browser": "chrome", "data": {"__coverage__": {..}}}`
//! - `POST /__coverage/run-end`: `{"error": null}`; answers with the run outcome
//!   (`200`), or `422` listing the threshold failures

use crate::error::{CliError, CliResult};
use axum::{
    extract::State,
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use probar_cov::{
    mime_type, CoverageError, CoverageOptions, CoveragePlugin, CoverageResult, CoverageSummary,
    RunReport, SuiteData,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tower_http::cors::{Any, CorsLayer};

/// Route receiving per-browser coverage
pub const SUITE_PATH: &str = "/__coverage/suite";

/// Route finishing the run
pub const RUN_END_PATH: &str = "/__coverage/run-end";

/// Coverage server configuration
#[derive(Debug, Clone)]
pub struct CoverageServerConfig {
    /// Directory to serve static files from
    pub directory: PathBuf,
    /// HTTP port
    pub port: u16,
    /// Enable CORS
    pub cors: bool,
    /// URL prefix the directory is mounted under
    pub client_root: String,
    /// Package token following the client root
    pub package: String,
    /// Stop after the first run-end
    pub once: bool,
}

impl Default for CoverageServerConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            port: 8080,
            cors: false,
            client_root: "/".to_string(),
            package: String::new(),
            once: false,
        }
    }
}

impl CoverageServerConfig {
    /// Create a builder
    #[must_use]
    pub fn builder() -> CoverageServerConfigBuilder {
        CoverageServerConfigBuilder::default()
    }

    /// URL path the served directory appears under, without surrounding slashes
    #[must_use]
    pub fn mount(&self) -> String {
        self.client_root
            .split('/')
            .chain(self.package.split('/'))
            .filter(|segment| !segment.is_empty())
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Builder for `CoverageServerConfig`
#[derive(Debug, Clone, Default)]
pub struct CoverageServerConfigBuilder {
    config: CoverageServerConfig,
}

impl CoverageServerConfigBuilder {
    /// Set directory to serve
    #[must_use]
    pub fn directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.directory = dir.into();
        self
    }

    /// Set HTTP port
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Enable CORS
    #[must_use]
    pub const fn cors(mut self, enabled: bool) -> Self {
        self.config.cors = enabled;
        self
    }

    /// Set the client root prefix
    #[must_use]
    pub fn client_root(mut self, client_root: impl Into<String>) -> Self {
        self.config.client_root = client_root.into();
        self
    }

    /// Set the package token
    #[must_use]
    pub fn package(mut self, package: impl Into<String>) -> Self {
        self.config.package = package.into();
        self
    }

    /// Stop after the first run-end
    #[must_use]
    pub const fn once(mut self, once: bool) -> Self {
        self.config.once = once;
        self
    }

    /// Build the configuration
    #[must_use]
    pub fn build(self) -> CoverageServerConfig {
        self.config
    }
}

/// Body of a suite event
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SuiteEvent {
    /// Browser that ran the sub-suite
    #[serde(default)]
    pub browser: String,
    /// Coverage payload
    #[serde(default)]
    pub data: SuiteData,
}

/// Body of a run-end event
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunEndEvent {
    /// Runner error; set when the run failed
    #[serde(default)]
    pub error: Option<String>,
}

/// Result of a run-end event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RunOutcome {
    /// Reports written, thresholds met
    Passed {
        /// Totals across all files
        total: CoverageSummary,
        /// Files in the report
        files: usize,
        /// Files added by the uncovered-file sweep
        swept: usize,
        /// Report files written
        reports: Vec<PathBuf>,
    },
    /// Reports written, thresholds not met
    Failed {
        /// One message per failed check
        failures: Vec<String>,
    },
    /// The runner reported an error; nothing was reported
    Skipped {
        /// Runner error
        error: String,
    },
    /// Run end itself failed
    Error {
        /// Error message
        message: String,
    },
}

impl RunOutcome {
    /// Outcome of [`CoveragePlugin::run_end`]
    #[must_use]
    pub fn from_run(result: CoverageResult<Option<RunReport>>, error: Option<String>) -> Self {
        match result {
            Ok(Some(report)) => Self::Passed {
                total: report.coverage.total,
                files: report.coverage.files.len(),
                swept: report.swept,
                reports: report.reports,
            },
            Ok(None) => Self::Skipped {
                error: error.unwrap_or_default(),
            },
            Err(CoverageError::ThresholdFailure { failures }) => Self::Failed { failures },
            Err(e) => Self::Error {
                message: e.to_string(),
            },
        }
    }

    /// HTTP status answering the run-end event
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Passed { .. } | Self::Skipped { .. } => StatusCode::OK,
            Self::Failed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Error { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// `Err` for failed thresholds or a failed run end
    pub fn into_result(self) -> CliResult<()> {
        match self {
            Self::Passed { .. } | Self::Skipped { .. } => Ok(()),
            Self::Failed { failures } => Err(CoverageError::ThresholdFailure { failures }.into()),
            Self::Error { message } => Err(CliError::server(message)),
        }
    }
}

#[derive(Debug, Clone)]
struct HookState {
    plugin: Arc<CoveragePlugin>,
    outcomes: Option<mpsc::Sender<RunOutcome>>,
}

/// Static server with coverage instrumentation and run hooks
#[derive(Debug)]
pub struct CoverageServer {
    config: CoverageServerConfig,
    plugin: Arc<CoveragePlugin>,
}

impl CoverageServer {
    /// Create a server for `config` using `options`
    pub fn new(config: CoverageServerConfig, options: CoverageOptions) -> CliResult<Self> {
        if !config.directory.is_dir() {
            return Err(CliError::invalid_argument(format!(
                "not a directory: {}",
                config.directory.display()
            )));
        }
        let plugin = CoveragePlugin::new(&config.directory, options)?
            .with_scope(&config.client_root, &config.package);
        Ok(Self {
            config,
            plugin: Arc::new(plugin),
        })
    }

    /// The coverage plugin behind this server
    #[must_use]
    pub fn plugin(&self) -> &Arc<CoveragePlugin> {
        &self.plugin
    }

    /// Configuration in effect
    #[must_use]
    pub fn config(&self) -> &CoverageServerConfig {
        &self.config
    }

    /// Get the HTTP URL of the served package
    #[must_use]
    pub fn http_url(&self) -> String {
        let mount = self.config.mount();
        if mount.is_empty() {
            format!("http://localhost:{}/", self.config.port)
        } else {
            format!("http://localhost:{}/{mount}/", self.config.port)
        }
    }

    /// Build the application: instrumented static files plus the hook routes.
    ///
    /// Run outcomes are sent to `outcomes` when given.
    pub fn router(&self, outcomes: Option<mpsc::Sender<RunOutcome>>) -> Router {
        let directory = Arc::new(self.plugin.context().root().to_path_buf());
        let mount = Arc::new(self.config.mount());
        let files = Router::new().fallback(move |uri: Uri| {
            serve_static(Arc::clone(&directory), Arc::clone(&mount), uri)
        });

        let mut app = Router::new();
        self.plugin.define_webserver(files, |wrapped| app = wrapped);

        let hooks = Router::new()
            .route(SUITE_PATH, post(suite_end))
            .route(RUN_END_PATH, post(run_end))
            .with_state(HookState {
                plugin: Arc::clone(&self.plugin),
                outcomes,
            });
        let app = app.merge(hooks);

        if self.config.cors {
            app.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            )
        } else {
            app
        }
    }

    /// Bind the configured port and serve until Ctrl+C, or until the first
    /// run end in `once` mode
    pub async fn run(&self) -> CliResult<Option<RunOutcome>> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| CliError::server(format!("cannot bind {addr}: {e}")))?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener
    pub async fn serve(&self, listener: TcpListener) -> CliResult<Option<RunOutcome>> {
        tracing::info!(
            url = %self.http_url(),
            directory = %self.plugin.context().root().display(),
            report_dir = %self.plugin.report_dir().display(),
            "coverage server listening"
        );

        if !self.config.once {
            axum::serve(listener, self.router(None))
                .with_graceful_shutdown(ctrl_c())
                .await?;
            return Ok(None);
        }

        let (outcome_tx, mut outcome_rx) = mpsc::channel(1);
        let (first_tx, first_rx) = oneshot::channel();
        let shutdown = async move {
            tokio::select! {
                outcome = outcome_rx.recv() => {
                    if let Some(outcome) = outcome {
                        let _ = first_tx.send(outcome);
                    }
                }
                () = ctrl_c() => {}
            }
        };
        axum::serve(listener, self.router(Some(outcome_tx)))
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(first_rx.await.ok())
    }
}

async fn ctrl_c() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

async fn suite_end(State(state): State<HookState>, Json(event): Json<SuiteEvent>) -> StatusCode {
    state.plugin.sub_suite_end(&event.browser, &event.data);
    StatusCode::NO_CONTENT
}

async fn run_end(State(state): State<HookState>, Json(event): Json<RunEndEvent>) -> Response {
    let plugin = Arc::clone(&state.plugin);
    let error = event.error;
    let runner_error = error.clone();
    let outcome =
        match tokio::task::spawn_blocking(move || plugin.run_end(runner_error.as_deref())).await {
            Ok(result) => RunOutcome::from_run(result, error),
            Err(e) => RunOutcome::Error {
                message: e.to_string(),
            },
        };
    if let Some(outcomes) = &state.outcomes {
        let _ = outcomes.try_send(outcome.clone());
    }
    (outcome.status_code(), Json(outcome)).into_response()
}

/// Map a request path to a file under `directory`.
///
/// `None` for paths outside `mount` or containing `..`.
fn resolve_static(directory: &Path, mount: &str, request_path: &str) -> Option<PathBuf> {
    let path = request_path.trim_start_matches('/');
    let relative = if mount.is_empty() {
        path
    } else if path == mount {
        ""
    } else {
        path.strip_prefix(mount)?.strip_prefix('/')?
    };
    if relative.split('/').any(|segment| segment == "..") {
        return None;
    }
    Some(directory.join(relative))
}

/// Serve static file based on URI
///
/// Handles directory requests by serving index.html if it exists.
async fn serve_static(directory: Arc<PathBuf>, mount: Arc<String>, uri: Uri) -> Response {
    let Some(file_path) = resolve_static(&directory, &mount, uri.path()) else {
        return (StatusCode::NOT_FOUND, format!("Not found: {}", uri.path())).into_response();
    };

    if file_path.is_dir() {
        let index_path = file_path.join("index.html");
        if index_path.exists() {
            return serve_file(&index_path).await;
        }
    }

    serve_file(&file_path).await
}

/// Serve a file with its MIME type
async fn serve_file(path: &Path) -> Response {
    match tokio::fs::read(path).await {
        Ok(contents) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, mime_type(path))
            .header(header::CACHE_CONTROL, "no-cache")
            .body(axum::body::Body::from(contents))
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => (
            StatusCode::NOT_FOUND,
            format!("File not found: {}", path.display()),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Error reading file: {e}"),
        )
            .into_response(),
    }
}
