//! Error types for the taxonomy API
//!
//! One enum for every layer. Hierarchy inconsistencies are deliberately
//! absent: they surface as diagnostics, never as errors.

use hyper::StatusCode;
use mongodb::error::{ErrorKind, WriteFailure};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::taxonomy::validation::ValidationErrors;

/// MongoDB duplicate key error code
pub const DUPLICATE_KEY_CODE: i32 = 11000;

/// Main error type for taxonomy operations
#[derive(Debug, thiserror::Error)]
pub enum TaxonomyError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Invalid cursor parameter: {0}")]
    InvalidCursor(String),

    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller broke an API contract (e.g. supplied a server-assigned field)
    #[error("{0}")]
    Contract(String),

    #[error("Duplicate key: {0}")]
    Duplicate(String),

    #[error("{0}")]
    Model(ModelCheckError),

    #[error("Database error: {0}")]
    Database(String),

    /// A failure wrapped with the repository operation that hit it
    #[error("{context}: {source}")]
    Repository {
        context: String,
        #[source]
        source: Box<TaxonomyError>,
    },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication error: {0}")]
    Auth(String),
}

/// Outcome of the model-writable check run before every write
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ModelCheckError {
    #[error("Model not found")]
    NotFound,
    #[error("Model is released and cannot be modified")]
    Released,
    #[error("Failed to fetch the model from the database")]
    FetchFailed,
}

impl ModelCheckError {
    /// Stable error code returned to clients
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound => "MODEL_NOT_FOUND_BY_ID",
            Self::Released => "MODEL_IS_RELEASED",
            Self::FetchFailed => "FAILED_TO_FETCH_FROM_DB",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Released => StatusCode::BAD_REQUEST,
            Self::FetchFailed => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl TaxonomyError {
    /// Wrap an error with the `<Entity>Repository.<op>` that produced it
    pub fn in_repository(self, repository: &str, op: &str) -> Self {
        Self::Repository {
            context: format!("{repository}.{op}: {op} failed"),
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping repository wrappers
    pub fn root(&self) -> &TaxonomyError {
        match self {
            Self::Repository { source, .. } => source.root(),
            other => other,
        }
    }

    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::InvalidCursor(_) => StatusCode::BAD_REQUEST,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Contract(_) => StatusCode::BAD_REQUEST,
            Self::Duplicate(_) => StatusCode::CONFLICT,
            Self::Model(e) => e.status_code(),
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Repository { source, .. } => source.status_code(),
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
        }
    }

    /// Stable machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::InvalidCursor(_) => "INVALID_CURSOR",
            Self::Validation(_) => "INVALID_JSON_SCHEMA",
            Self::Unauthorized(_) | Self::Auth(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Contract(_) => "CONTRACT_VIOLATION",
            Self::Duplicate(_) => "DUPLICATE_KEY",
            Self::Model(e) => e.code(),
            Self::Database(_) => "DB_FAILED",
            Self::Repository { source, .. } => source.error_code(),
            Self::Internal(_) | Self::Config(_) => "INTERNAL_SERVER_ERROR",
        }
    }
}

static URI_CREDENTIALS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?P<scheme>[A-Za-z][A-Za-z0-9+.-]*://)[^/@\s]+@").expect("valid regex")
});

/// Strip `user:password@` from any URI embedded in a message
pub fn redact_credentials(message: &str) -> String {
    URI_CREDENTIALS
        .replace_all(message, "${scheme}***@")
        .into_owned()
}

/// Whether a driver error is a unique-index violation
pub fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY_CODE,
        ErrorKind::InsertMany(e) => e
            .write_errors
            .as_ref()
            .is_some_and(|errs| errs.iter().any(|we| we.code == DUPLICATE_KEY_CODE)),
        _ => false,
    }
}

// Implement From conversions for common error types

impl From<std::io::Error> for TaxonomyError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for TaxonomyError {
    fn from(err: serde_json::Error) -> Self {
        Self::BadRequest(format!("JSON error: {}", err))
    }
}

impl From<hyper::Error> for TaxonomyError {
    fn from(err: hyper::Error) -> Self {
        Self::Internal(format!("HTTP error: {}", err))
    }
}

impl From<mongodb::error::Error> for TaxonomyError {
    fn from(err: mongodb::error::Error) -> Self {
        let message = redact_credentials(&err.to_string());
        if is_duplicate_key(&err) {
            Self::Duplicate(message)
        } else {
            Self::Database(message)
        }
    }
}

impl From<jsonwebtoken::errors::Error> for TaxonomyError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::Unauthorized(format!("JWT error: {}", err))
    }
}

/// Result type alias for taxonomy operations
pub type Result<T> = std::result::Result<T, TaxonomyError>;
