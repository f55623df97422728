//! Error handling for the eCFR analyzer
//!
//! One taxonomy for the whole crate: upstream store failures, not-found
//! conditions, malformed input and malformed records. The HTTP layer maps
//! each family onto a status code (see `api::error`).

use thiserror::Error;

/// Main error type for the analyzer
#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[cfg(feature = "database")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Node '{id}' not found")]
    NodeNotFound { id: String },

    #[error("Agency '{id}' not found")]
    AgencyNotFound { id: String },

    #[error("No regulation found at path '{path}'")]
    PathNotFound { path: String },

    #[error("{name} is required")]
    MissingParameter { name: &'static str },

    #[error("Invalid value for '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Invalid browse path segment '{segment}': expected <level>=<number>")]
    InvalidPath { segment: String },

    #[error("Invalid date '{value}': expected YYYY-MM-DD")]
    InvalidDate { value: String },

    #[error("Malformed record: {reason}")]
    MalformedRecord { reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Coarse classification used by the HTTP layer and by logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    BadRequest,
    Upstream,
}

impl AnalyzerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NodeNotFound { .. } | Self::AgencyNotFound { .. } | Self::PathNotFound { .. } => {
                ErrorKind::NotFound
            }
            Self::MissingParameter { .. }
            | Self::InvalidParameter { .. }
            | Self::InvalidPath { .. }
            | Self::InvalidDate { .. } => ErrorKind::BadRequest,
            _ => ErrorKind::Upstream,
        }
    }

    pub fn node_not_found(id: impl Into<String>) -> Self {
        Self::NodeNotFound { id: id.into() }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AnalyzerError>;
