//! Diagnostic events
//!
//! The core never prints. Every instrument/skip decision is described by a
//! [`DiagnosticEvent`] and handed to a [`DiagnosticSink`].

use serde::Serialize;
use std::fmt;
use std::sync::{Mutex, PoisonError};

/// Event severity; instrument/skip decisions are debug detail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Fine-grained decision tracing
    Debug,
}

/// What the middleware decided for an asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Instrumented content was served
    Instrument,
    /// The request was passed through
    Skip,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Instrument => "instrument",
            Self::Skip => "skip",
        })
    }
}

/// Structured `(level, component, action, detail)` event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticEvent {
    /// Severity
    pub level: Level,
    /// Emitting component
    pub component: &'static str,
    /// Decision
    pub action: Action,
    /// Asset path the decision applies to
    pub detail: String,
}

impl DiagnosticEvent {
    /// Debug-level event
    #[must_use]
    pub fn debug(component: &'static str, action: Action, detail: impl Into<String>) -> Self {
        Self {
            level: Level::Debug,
            component,
            action,
            detail: detail.into(),
        }
    }
}

/// Consumer of diagnostic events
pub trait DiagnosticSink: Send + Sync + fmt::Debug {
    /// Record one event
    fn emit(&self, event: DiagnosticEvent);
}

/// Forwards events to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&self, event: DiagnosticEvent) {
        let DiagnosticEvent {
            level,
            component,
            action,
            detail,
        } = event;
        match level {
            Level::Debug => {
                tracing::debug!(component, action = %action, detail = %detail, "coverage decision");
            }
        }
    }
}

/// Keeps events in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<DiagnosticEvent>>,
}

impl MemorySink {
    /// Create an empty sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Events recorded so far
    #[must_use]
    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Events with the given action
    #[must_use]
    pub fn with_action(&self, action: Action) -> Vec<DiagnosticEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.action == action)
            .collect()
    }
}

impl DiagnosticSink for MemorySink {
    fn emit(&self, event: DiagnosticEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}
