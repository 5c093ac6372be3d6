//! Error types for MailGuard.

use std::time::Duration;

/// Top-level error type for the triage engine.
///
/// Only input validation failures and internal invariant violations ever
/// reach a caller of the coordinator. Analyzer and summarization failures
/// are absorbed into the audit trail.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid input: {0}")]
    Input(#[from] InputError),

    #[error("Internal invariant violated: {0}")]
    Invariant(String),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Malformed email input. Surfaced immediately, no verdict is produced.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("Missing sender address")]
    MissingSender,

    #[error("Invalid sender address {address:?}: {reason}")]
    InvalidSender { address: String, reason: String },

    #[error("Invalid attachment #{index}: {reason}")]
    InvalidAttachment { index: usize, reason: String },

    #[error("Unparsable message: {0}")]
    UnparsableMessage(String),

    #[error("Malformed request body: {0}")]
    MalformedRequest(String),
}

/// Analyzer invocation failures. Always recovered locally by the coordinator.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AnalyzerError {
    #[error("Analyzer {name} failed: {reason}")]
    Failed { name: String, reason: String },

    #[error("Analyzer {name} timed out after {timeout:?}")]
    Timeout { name: String, timeout: Duration },

    #[error("Analyzer {name} transport error: {reason}")]
    Transport { name: String, reason: String },

    #[error("Invalid response from analyzer {name}: {reason}")]
    InvalidResponse { name: String, reason: String },

    #[error("Analyzer {name} was cancelled before completion")]
    Cancelled { name: String },

    #[error("Analyzer {name} panicked")]
    Panicked { name: String },
}

/// Output summarization failure. Never propagates past the audit builder.
#[derive(Debug, thiserror::Error)]
pub enum SummaryError {
    #[error("Cannot summarize output of {tool}: {reason}")]
    Unavailable { tool: String, reason: String },
}

/// Result type alias for the triage engine.
pub type Result<T> = std::result::Result<T, Error>;
