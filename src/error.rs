//! Error types for XSD loading, translation diagnostics and output.

use std::path::PathBuf;
use thiserror::Error;
use tracing::warn;

/// Fatal errors while loading a source schema. Any of these aborts the run.
#[derive(Debug, Error)]
pub enum LoadError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    // Parse errors (exit code 2)
    #[error("invalid XML: {source}")]
    InvalidXml {
        #[source]
        source: roxmltree::Error,
    },

    #[error("not an XML Schema document: root element is <{root}>")]
    NotASchema { root: String },

    #[error("invalid documentation overrides in {path}: {message}")]
    InvalidOverrides { path: PathBuf, message: String },
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::FileNotFound { .. } | LoadError::ReadError { .. } => 3,
            #[cfg(feature = "remote")]
            LoadError::NetworkError { .. } => 3,
            _ => 2,
        }
    }
}

/// Errors while rendering or persisting a translated schema.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("cannot write {path}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to render YAML: {source}")]
    Serialize {
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to render JSON: {source}")]
    Json {
        #[source]
        source: serde_json::Error,
    },
}

impl OutputError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            OutputError::WriteError { .. } => 3,
            _ => 2,
        }
    }
}

/// Category of a recovered, per-declaration failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// A keyref, substitution head or derivation base that has no target class.
    UnresolvableReference,
    /// Identity constraint without selector or field paths.
    MalformedIdentity,
    /// Attribute or element that could not be interpreted.
    MalformedDeclaration,
}

impl DiagnosticKind {
    pub fn code(&self) -> &'static str {
        match self {
            DiagnosticKind::UnresolvableReference => "W001",
            DiagnosticKind::MalformedIdentity => "W002",
            DiagnosticKind::MalformedDeclaration => "W003",
        }
    }
}

/// A declaration that was skipped during translation, and why.
///
/// Diagnostics never interrupt a run; they are collected on the
/// [`Conversion`](crate::Conversion) alongside the produced schema.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// Class, constraint or declaration the diagnostic is about.
    pub subject: String,
    pub message: String,
}

impl Diagnostic {
    pub fn new(
        kind: DiagnosticKind,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            subject: subject.into(),
            message: message.into(),
        }
    }
}

/// Collector that logs each diagnostic as it is recorded.
#[derive(Debug, Default)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &mut self,
        kind: DiagnosticKind,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) {
        let diagnostic = Diagnostic::new(kind, subject, message);
        warn!(
            code = diagnostic.kind.code(),
            subject = %diagnostic.subject,
            "{}",
            diagnostic.message
        );
        self.0.push(diagnostic);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.0
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.kind.code(), self.subject, self.message)
    }
}
