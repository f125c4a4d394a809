//! Error types for the bulk reconciliation system.
//!
//! Errors fall into two groups. Fatal errors (`SourceUnavailable`,
//! `FilterResolution`, configuration and I/O failures) abort a run before
//! any entity is mutated. `ApplyFailed` is per-entity: the engine records it
//! as an outcome and moves on to the next entity.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the reconciliation system.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The scope cannot be enumerated (collaborator unreachable or scope missing).
    #[error("Source unavailable for scope '{scope}': {reason}")]
    SourceUnavailable {
        /// Scope that was requested.
        scope: String,
        /// Why the scope could not be listed.
        reason: String,
    },

    /// A group or exclusion referenced by a filter cannot be resolved.
    #[error("Cannot resolve filter reference '{reference}': {reason}")]
    FilterResolution {
        /// The group name or entity id that failed to resolve.
        reference: String,
        /// Why resolution failed.
        reason: String,
    },

    /// Mutation of a single entity failed.
    #[error("Failed to apply target to '{entity}': {reason}")]
    ApplyFailed {
        /// Entity identifier.
        entity: String,
        /// Reason for the failure.
        reason: String,
    },

    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Directory collaborator transport errors.
    #[error("Directory error: {0}")]
    Directory(#[from] DirectoryError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The outcome export could not be written.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// Environment variable is missing.
    #[error("Missing environment variable: {name}")]
    MissingEnvVar {
        /// Name of the missing variable.
        name: String,
    },
}

/// Errors raised while talking to a directory backend.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// Authentication failed.
    #[error("Directory authentication failed: {message}")]
    AuthenticationFailed {
        /// Description of the auth failure.
        message: String,
    },

    /// API request failed.
    #[error("Directory request failed: {status} - {message}")]
    ApiRequestFailed {
        /// HTTP status code.
        status: u16,
        /// Error message from the API.
        message: String,
    },

    /// Rate limited.
    #[error("Directory rate limited, retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// Network error.
    #[error("Network error communicating with directory: {message}")]
    NetworkError {
        /// Description of the network error.
        message: String,
    },

    /// Invalid response from the backend.
    #[error("Invalid response from directory: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },

    /// The local inventory file is unreadable or malformed.
    #[error("Inventory error: {message}")]
    Inventory {
        /// Description of the inventory problem.
        message: String,
    },
}

/// Result type alias for reconciliation operations.
pub type Result<T> = std::result::Result<T, ReconcileError>;

impl ReconcileError {
    /// Creates a per-entity apply failure.
    #[must_use]
    pub fn apply_failed(entity: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ApplyFailed {
            entity: entity.into(),
            reason: reason.into(),
        }
    }

    /// Creates a source-unavailable error for a scope.
    #[must_use]
    pub fn source_unavailable(scope: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            scope: scope.into(),
            reason: reason.into(),
        }
    }

    /// Creates a filter resolution error.
    #[must_use]
    pub fn filter_resolution(reference: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::FilterResolution {
            reference: reference.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if this error must abort the whole run.
    ///
    /// Only `ApplyFailed` is recoverable at the batch level.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::ApplyFailed { .. })
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Directory(
                DirectoryError::RateLimited { .. } | DirectoryError::NetworkError { .. }
            )
        )
    }

    /// Returns the suggested retry delay in seconds, if applicable.
    #[must_use]
    pub const fn retry_delay_secs(&self) -> Option<u64> {
        match self {
            Self::Directory(DirectoryError::RateLimited { retry_after_secs }) => {
                Some(*retry_after_secs)
            }
            Self::Directory(DirectoryError::NetworkError { .. }) => Some(1),
            _ => None,
        }
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

impl DirectoryError {
    /// Creates an API request error.
    #[must_use]
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiRequestFailed {
            status,
            message: message.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError {
            message: message.into(),
        }
    }

    /// Creates an inventory error.
    #[must_use]
    pub fn inventory(message: impl Into<String>) -> Self {
        Self::Inventory {
            message: message.into(),
        }
    }
}
