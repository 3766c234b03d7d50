//! Structured error types for resolution and reload passes.

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Capability lookup
    NoReader,
    NoParser,

    // Reference graph
    CircularReference,
    FragmentNotFound,
    InvalidToken,
    InvalidUri,

    // Source errors
    ReadFailed,
    ParseFailed,
    QueryFailed,

    // Validation and reload
    ConfigInvalid,
    SchemaInvalid,
    UnhandledChange,

    // Lifecycle
    Cancelled,
    AlreadyRunning,
}

/// One failed schema constraint.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ValidationIssue {
    /// Dotted path of the offending value (empty for the root).
    pub path: String,
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{} {}", self.path, self.message)
        }
    }
}

/// Error raised while resolving, validating or reloading configuration.
///
/// Errors are `Clone` because a single failed read is observed by every
/// consumer sharing the memoized resolution of that source.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("Unable to find reader for {uri}")]
    NoReader { uri: String },

    #[error("Unable to find parser for {content_type} on {uri}")]
    NoParser { content_type: String, uri: String },

    #[error("Circular reference to {uri} from {referrer}")]
    CircularReference { uri: String, referrer: String },

    #[error("Fragment {fragment} not found in {uri}")]
    FragmentNotFound { fragment: String, uri: String },

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Invalid uri '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("Unable to read {uri}: {message}")]
    Read { uri: String, message: String },

    #[error("Unable to parse {content_type} content: {message}")]
    Parse {
        content_type: String,
        message: String,
    },

    #[error("Query '{expression}' failed: {message}")]
    Query { expression: String, message: String },

    #[error("{message}")]
    Config {
        message: String,
        issues: Vec<ValidationIssue>,
        /// The rejected candidate, before coercion.
        candidate: Arc<Value>,
    },

    #[error("Invalid schema: {0}")]
    Schema(String),

    #[error("Unhandled config watch change for {path}")]
    UnhandledChange { path: String },

    #[error("Resolution of {uri} was cancelled")]
    Cancelled { uri: String },

    #[error("Already running")]
    AlreadyRunning,
}

impl Error {
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::NoReader { .. } => ErrorCode::NoReader,
            Error::NoParser { .. } => ErrorCode::NoParser,
            Error::CircularReference { .. } => ErrorCode::CircularReference,
            Error::FragmentNotFound { .. } => ErrorCode::FragmentNotFound,
            Error::InvalidToken(_) => ErrorCode::InvalidToken,
            Error::InvalidUri { .. } => ErrorCode::InvalidUri,
            Error::Read { .. } => ErrorCode::ReadFailed,
            Error::Parse { .. } => ErrorCode::ParseFailed,
            Error::Query { .. } => ErrorCode::QueryFailed,
            Error::Config { .. } => ErrorCode::ConfigInvalid,
            Error::Schema(_) => ErrorCode::SchemaInvalid,
            Error::UnhandledChange { .. } => ErrorCode::UnhandledChange,
            Error::Cancelled { .. } => ErrorCode::Cancelled,
            Error::AlreadyRunning => ErrorCode::AlreadyRunning,
        }
    }

    // Convenience constructors

    pub fn read(uri: &str, err: impl fmt::Display) -> Self {
        Error::Read {
            uri: uri.to_string(),
            message: err.to_string(),
        }
    }

    pub fn parse(content_type: &str, err: impl fmt::Display) -> Self {
        Error::Parse {
            content_type: content_type.to_string(),
            message: err.to_string(),
        }
    }

    pub fn query(expression: &str, err: impl fmt::Display) -> Self {
        Error::Query {
            expression: expression.to_string(),
            message: err.to_string(),
        }
    }

    pub fn invalid_uri(uri: &str, reason: impl Into<String>) -> Self {
        Error::InvalidUri {
            uri: uri.to_string(),
            reason: reason.into(),
        }
    }

    pub fn fragment_not_found(fragment: &str, uri: &str) -> Self {
        Error::FragmentNotFound {
            fragment: fragment.to_string(),
            uri: uri.to_string(),
        }
    }

    pub fn cancelled(uri: &str) -> Self {
        Error::Cancelled {
            uri: uri.to_string(),
        }
    }

    /// Build a validation failure; the message names the first issue.
    pub fn config(issues: Vec<ValidationIssue>, candidate: Value) -> Self {
        let message = match issues.first() {
            Some(issue) => format!("Configuration {}", issue),
            None => "Configuration is invalid".to_string(),
        };
        Error::Config {
            message,
            issues,
            candidate: Arc::new(candidate),
        }
    }
}

/// Result type for resolution operations.
pub type Result<T> = std::result::Result<T, Error>;
