//! Error types for the startrail collector
//!
//! This module defines the transport and storage error types shared by the
//! API client, the storage layer and the collector.

use rusqlite::ErrorCode;
use thiserror::Error;

/// Errors that can occur while talking to the repository-hosting API
#[derive(Error, Debug)]
pub enum TransportError {
    /// Network-level request failure
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Request timeout
    #[error("Request timeout: {url}")]
    Timeout { url: String },

    /// Non-success HTTP status
    #[error("{url} returned status {status} (rate limit remaining: {})", display_remaining(.rate_limit_remaining))]
    Status {
        status: u16,
        url: String,
        rate_limit_remaining: Option<u64>,
    },

    /// Response body could not be decoded
    #[error("Decoding error: {0}")]
    Decode(String),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

fn display_remaining(remaining: &Option<u64>) -> String {
    remaining.map_or_else(|| "unknown".to_string(), |r| r.to_string())
}

impl TransportError {
    /// HTTP status attached to the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Rate-limit headroom reported alongside the failure, if any
    pub fn rate_limit_remaining(&self) -> Option<u64> {
        match self {
            Self::Status {
                rate_limit_remaining,
                ..
            } => *rate_limit_remaining,
            _ => None,
        }
    }

    /// Check if a later attempt could plausibly succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Http(_) | Self::Timeout { .. } => true,
            Self::Status { status, .. } => matches!(status, 403 | 429 | 500 | 502 | 503 | 504),
            Self::Decode(_) | Self::InvalidUrl(_) => false,
        }
    }

    /// Short label used for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Http(_) => "http",
            Self::Timeout { .. } => "timeout",
            Self::Status { .. } => "status",
            Self::Decode(_) => "decode",
            Self::InvalidUrl(_) => "invalid_url",
        }
    }
}

/// Errors raised by the storage layer
#[derive(Error, Debug)]
pub enum StorageError {
    /// Generic SQLite failure
    #[error("SQLite error: {0}")]
    Sqlite(rusqlite::Error),

    /// Uniqueness or other constraint violation
    #[error("Constraint violation: {message}")]
    Constraint { message: String },

    /// Filesystem error while opening the database
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored value could not be parsed back
    #[error("Corrupt value in column '{column}': {value}")]
    Corrupt { column: String, value: String },

    /// History write for a project missing from the snapshot table
    #[error("Unknown project: {0}")]
    UnknownProject(i64),

    /// Connection mutex poisoned by a panicking writer
    #[error("Storage lock poisoned")]
    LockPoisoned,

    /// Blocking storage task was cancelled or panicked
    #[error("Storage task failed: {0}")]
    TaskFailed(String),
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(ref e, ref msg)
                if e.code == ErrorCode::ConstraintViolation =>
            {
                Self::Constraint {
                    message: msg.clone().unwrap_or_else(|| e.to_string()),
                }
            }
            other => Self::Sqlite(other),
        }
    }
}

impl StorageError {
    /// Create a corrupt-value error
    pub fn corrupt(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Corrupt {
            column: column.into(),
            value: value.into(),
        }
    }

    /// Check if this is a constraint violation
    pub fn is_constraint(&self) -> bool {
        matches!(self, Self::Constraint { .. })
    }

    /// Check if retrying the write could succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Sqlite(rusqlite::Error::SqliteFailure(e, _)) => {
                matches!(e.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
            }
            Self::Io(_) => true,
            _ => false,
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
