//! The typed error taxonomy surfaced to MCP callers.
//!
//! Internal plumbing still uses `anyhow::Error` with `.context(...)` for
//! leaf I/O; at every service boundary (editor host, runtime resolver, LSP
//! surface, DAP broker, editing surface) failures are converted into an
//! [`OtterError`] before reaching the dispatcher. Nothing crosses that
//! boundary as an opaque failure.

use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    DependencyMissing,
    RuntimeNotResolved,
    AdapterUnavailable,
    NotOpenOrNotAttached,
    LspFailed,
    DapFailed,
    SessionNotFound,
    InvalidRange,
    AmbiguousSymbol,
    Timeout,
    NotImplemented,
}

#[derive(Debug, Error, Clone, Serialize)]
#[error("{kind:?}: {message}")]
pub struct OtterError {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl OtterError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), suggestions: Vec::new() }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn dependency_missing(binary: &str, install_cmd: &str) -> Self {
        Self::new(
            ErrorKind::DependencyMissing,
            format!("required external binary `{binary}` was not found"),
        )
        .with_suggestion(format!("install it with: {install_cmd}"))
    }

    pub fn runtime_not_resolved(language: &str, attempted: &[String]) -> Self {
        Self::new(
            ErrorKind::RuntimeNotResolved,
            format!(
                "no interpreter/toolchain found for `{language}` (tried: {})",
                attempted.join(", ")
            ),
        )
    }

    pub fn adapter_unavailable(language: &str, install_cmd: &str) -> Self {
        Self::new(
            ErrorKind::AdapterUnavailable,
            format!("no LSP/DAP adapter available for `{language}`"),
        )
        .with_suggestion(format!("install it with: {install_cmd}"))
    }

    pub fn not_open_or_not_attached(file: &str) -> Self {
        Self::new(
            ErrorKind::NotOpenOrNotAttached,
            format!("`{file}` is not open, or no language server is attached to it"),
        )
        .with_suggestion(format!("open the file first (read_file or edit_buffer on `{file}`)"))
    }

    pub fn lsp_failed(method: &str, elapsed: Duration, detail: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::LspFailed,
            format!("LSP method `{method}` failed after {:?}: {}", elapsed, detail.into()),
        )
    }

    pub fn dap_failed(request: &str, elapsed: Duration, detail: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::DapFailed,
            format!("DAP request `{request}` failed after {:?}: {}", elapsed, detail.into()),
        )
    }

    pub fn session_not_found(id: &str) -> Self {
        Self::new(ErrorKind::SessionNotFound, format!("no debug session with id `{id}`"))
    }

    pub fn invalid_range(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRange, detail.into())
    }

    pub fn ambiguous_symbol(name: &str, candidates: usize) -> Self {
        Self::new(
            ErrorKind::AmbiguousSymbol,
            format!("symbol `{name}` matched {candidates} candidates without a positional hint"),
        )
        .with_suggestion("pass a `line` hint to disambiguate")
    }

    pub fn timeout(operation: &str, elapsed: Duration) -> Self {
        Self::new(ErrorKind::Timeout, format!("`{operation}` timed out after {:?}", elapsed))
    }

    pub fn not_implemented(feature: &str) -> Self {
        Self::new(ErrorKind::NotImplemented, format!("`{feature}` is not implemented"))
    }
}

impl From<anyhow::Error> for OtterError {
    fn from(err: anyhow::Error) -> Self {
        OtterError::new(ErrorKind::LspFailed, err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, OtterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_kind_message_suggestions() {
        let err = OtterError::dependency_missing("rg", "brew install ripgrep");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "dependency_missing");
        assert!(json["message"].as_str().unwrap().contains("rg"));
        assert_eq!(json["suggestions"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn not_implemented_carries_feature_name() {
        let err = OtterError::not_implemented("import_expansion");
        assert_eq!(err.kind, ErrorKind::NotImplemented);
        assert!(err.message.contains("import_expansion"));
    }
}
