use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-wide error types for Clipper.
///
/// Every variant declares the [`ErrorKind`] the resilience layer uses to pick
/// a recovery strategy. Only the untyped variants (`HttpError`, `Generic`)
/// are classified by inspecting their message.
#[derive(Error, Debug)]
pub enum AppError {
    /// HTTP request failed for a reason without a more specific variant.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// The server answered with a non-success status.
    #[error("HTTP {status} for {url}")]
    HttpStatus { status: u16, url: String },

    /// The URL is malformed, uses another scheme, or points at a blocked address.
    #[error("URL rejected: {0}")]
    UrlRejected(String),

    /// The host name did not resolve. Retrying will not help.
    #[error("Could not resolve host: {0}")]
    HostUnresolved(String),

    /// The remote host actively refused the connection.
    #[error("Connection refused: {0}")]
    ConnectionRefused(String),

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// An upstream service or stage cannot serve the request right now.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Every content extraction strategy came back empty.
    #[error("No extraction strategy produced content (tried: {})", .attempted.join(", "))]
    ExtractionFailed { attempted: Vec<String> },

    /// HTML-to-Markdown conversion failed.
    #[error("Cleaner error: {0}")]
    CleanerError(String),

    /// A template could not be loaded or rendered.
    #[error("Template error: {0}")]
    TemplateError(String),

    /// Writing a rendered document failed.
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Data does not match its declared shape. Carries the offending data and
    /// the shape so the value can be repaired.
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        data: serde_json::Value,
        shape: serde_json::Value,
    },

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Database operation failed.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

/// Failure categories understood by the recovery dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    ConnectionRefused,
    RateLimited,
    ServiceUnavailable,
    ValidationError,
    Unknown,
}

impl ErrorKind {
    /// Stable machine-readable code, as written to the event log.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::ConnectionRefused => "ECONNREFUSED",
            ErrorKind::RateLimited => "RATE_LIMIT",
            ErrorKind::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            ErrorKind::ValidationError => "VALIDATION_ERROR",
            ErrorKind::Unknown => "UNKNOWN",
        }
    }

    /// Classify a bare error message. Compatibility path for errors that do
    /// not carry a declared kind.
    pub fn from_message(message: &str) -> Self {
        let msg = message.to_lowercase();
        if msg.contains("econnrefused") || msg.contains("connection refused") {
            ErrorKind::ConnectionRefused
        } else if msg.contains("rate limit") {
            ErrorKind::RateLimited
        } else if msg.contains("service unavailable") {
            ErrorKind::ServiceUnavailable
        } else if msg.contains("validation") {
            ErrorKind::ValidationError
        } else {
            ErrorKind::Unknown
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl AppError {
    /// The failure category this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::ConnectionRefused(_) | AppError::NetworkError(_) | AppError::Timeout(_) => {
                ErrorKind::ConnectionRefused
            }
            AppError::RateLimitExceeded => ErrorKind::RateLimited,
            AppError::ServiceUnavailable(_)
            | AppError::ExtractionFailed { .. }
            | AppError::TemplateError(_)
            | AppError::StorageError(_)
            | AppError::DatabaseError(_) => ErrorKind::ServiceUnavailable,
            AppError::Validation { .. } => ErrorKind::ValidationError,
            AppError::HttpStatus { .. }
            | AppError::UrlRejected(_)
            | AppError::HostUnresolved(_)
            | AppError::CleanerError(_)
            | AppError::SerializationError(_)
            | AppError::ConfigError(_) => ErrorKind::Unknown,
            AppError::HttpError(msg) | AppError::Generic(msg) => ErrorKind::from_message(msg),
        }
    }
}
