//! Error types for the Dirflow domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; only [`Error`] crosses the
//! orchestrator boundary, and only for configuration mistakes or cancellation.

use serde::Serialize;
use thiserror::Error;

/// The top-level error type for Dirflow operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Gateway errors ---
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    // --- Validation errors ---
    #[error("Validation rejected: {0}")]
    Validation(#[from] ValidationError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Malformed caller input ---
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // --- Caller aborted the exchange ---
    #[error("Request cancelled before completion")]
    Cancelled,

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// A failed call to a language-model backend.
///
/// Every variant is recoverable: the orchestrator answers with a fallback
/// response instead of propagating it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("{provider}: credential missing or rejected: {message}")]
    Unauthorized { provider: String, message: String },

    #[error("{provider}: backend unreachable: {message}")]
    Unreachable { provider: String, message: String },

    #[error("{provider}: rate limited{}", retry_hint(.retry_after_secs))]
    RateLimited {
        provider: String,
        retry_after_secs: Option<u64>,
    },

    #[error("{provider}: unexpected response body: {message}")]
    BadResponseShape { provider: String, message: String },

    #[error("{provider}: upstream returned {status_code}: {body}")]
    UpstreamError {
        provider: String,
        status_code: u16,
        body: String,
    },
}

fn retry_hint(secs: &Option<u64>) -> String {
    match secs {
        Some(s) => format!(", retry after {s}s"),
        None => String::new(),
    }
}

impl GatewayError {
    /// The provider identifier the failure came from.
    pub fn provider(&self) -> &str {
        match self {
            Self::Unauthorized { provider, .. }
            | Self::Unreachable { provider, .. }
            | Self::RateLimited { provider, .. }
            | Self::BadResponseShape { provider, .. }
            | Self::UpstreamError { provider, .. } => provider,
        }
    }
}

/// Why a proposed command was refused by the validator.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationError {
    #[error("command must be a JSON object")]
    NotAnObject,

    #[error("missing action field")]
    MissingAction,

    #[error("action '{action}' is not allowed")]
    UnknownAction { action: String },

    #[error("{action}: required field '{field}' is missing")]
    MissingField { action: String, field: String },

    #[error("{action}: field '{field}' must not be empty")]
    EmptyField { action: String, field: String },

    #[error("{action}: field '{field}' must be {expected}")]
    InvalidType {
        action: String,
        field: String,
        expected: String,
    },

    #[error("path traversal detected in '{path}'")]
    PathTraversal { path: String },

    #[error("home-directory shorthand is not allowed in '{path}'")]
    HomeShorthand { path: String },

    #[error("path '{path}' matches forbidden system path '{pattern}'")]
    ForbiddenPath { path: String, pattern: String },

    #[error("path '{path}' is outside the sandbox root '{root}'")]
    OutsideSandbox { path: String, root: String },

    #[error("{field} contains {count} entries, limit is {limit}")]
    BatchTooLarge {
        field: String,
        count: usize,
        limit: usize,
    },

    #[error("{field} must contain at least one entry")]
    EmptyBatch { field: String },

    #[error("invalid web search: {reason}")]
    InvalidSearch { reason: String },

    #[error("refusing to delete '{path}'")]
    UnsafeDeletion { path: String },
}

impl ValidationError {
    /// Human-readable reason, as reported in `validationErrors`.
    pub fn reason(&self) -> String {
        self.to_string()
    }
}

/// A failed call to the search backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SearchError {
    #[error("search provider '{0}' is not available")]
    ProviderUnavailable(String),

    #[error("search request failed: {0}")]
    Failed(String),
}
