//! Diagnostic reporting for schema failures.
//!
//! The client calls its [`DiagnosticSink`] exactly once for every response that
//! arrives with a 2xx status but fails schema validation. Transport failures are
//! returned to the caller without a diagnostic.

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;

use crate::schema::SchemaError;
use crate::Method;

/// A response body that failed schema validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaDiagnostic {
    /// Request method.
    pub method: Method,
    /// Resolved request URL.
    pub url: String,
    /// Response status (always 2xx).
    pub status: u16,
    /// The validation error returned to the caller.
    pub error: SchemaError,
}

impl SchemaDiagnostic {
    /// Format as JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.error.to_string())
    }
}

/// Receives schema failure diagnostics.
pub trait DiagnosticSink: Send + Sync {
    /// Record one schema failure.
    fn schema_failure(&self, diagnostic: &SchemaDiagnostic);
}

impl<T: DiagnosticSink + ?Sized> DiagnosticSink for Arc<T> {
    fn schema_failure(&self, diagnostic: &SchemaDiagnostic) {
        (**self).schema_failure(diagnostic)
    }
}

/// Emits diagnostics as `tracing` error events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn schema_failure(&self, diagnostic: &SchemaDiagnostic) {
        tracing::error!(
            method = %diagnostic.method,
            url = %diagnostic.url,
            status = diagnostic.status,
            issues = diagnostic.error.issues().len(),
            error = %diagnostic.error,
            "response failed schema validation"
        );
    }
}

/// Keeps diagnostics in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    entries: Arc<Mutex<Vec<SchemaDiagnostic>>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded diagnostics, oldest first.
    pub fn entries(&self) -> Vec<SchemaDiagnostic> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of recorded diagnostics.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Check if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all recorded diagnostics.
    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl DiagnosticSink for MemorySink {
    fn schema_failure(&self, diagnostic: &SchemaDiagnostic) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(diagnostic.clone());
    }
}
