//! Structured error types for store operations.

use serde::Serialize;
use std::fmt;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Referenced item or edge is absent.
    NotFound,
    /// Malformed status/type/filter, or a self-merge.
    InvalidArgument,
    /// A structural mutation would create a dependency cycle.
    CycleRejected,
    /// A lifecycle guard was violated.
    ConflictRejected,
    /// Identifier generation gave up after its bounded attempts.
    ExhaustedRetries,
    /// The underlying store failed.
    StorageFailure,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NotFound => "not_found",
            ErrorCode::InvalidArgument => "invalid_argument",
            ErrorCode::CycleRejected => "cycle_rejected",
            ErrorCode::ConflictRejected => "conflict_rejected",
            ErrorCode::ExhaustedRetries => "exhausted_retries",
            ErrorCode::StorageFailure => "storage_failure",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured error returned by every store operation.
#[derive(Debug, Serialize, thiserror::Error)]
#[error("{message}")]
pub struct ItemError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ItemError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            field: None,
            details: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    // Convenience constructors

    pub fn not_found(kind: &str, id: &str) -> Self {
        Self::new(ErrorCode::NotFound, format!("{} not found: {}", kind, id))
    }

    pub fn item_not_found(item_id: &str) -> Self {
        Self::not_found("Item", item_id)
    }

    pub fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidArgument, reason).with_field(field)
    }

    pub fn cycle(item_id: &str, other_id: &str) -> Self {
        Self::new(
            ErrorCode::CycleRejected,
            format!(
                "A dependency path already connects {} and {}; the change would create a cycle",
                item_id, other_id
            ),
        )
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConflictRejected, message)
    }

    pub fn exhausted_retries(prefix: &str, length: usize, attempts: usize) -> Self {
        Self::new(
            ErrorCode::ExhaustedRetries,
            format!(
                "Failed to generate a unique ID with prefix '{}' after {} attempts",
                prefix, attempts
            ),
        )
        .with_details(format!(
            "Consider increasing the ID length (currently {})",
            length
        ))
    }

    pub fn storage(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::StorageFailure, err.to_string())
    }

    pub fn is(&self, code: ErrorCode) -> bool {
        self.code == code
    }
}

impl From<rusqlite::Error> for ItemError {
    fn from(err: rusqlite::Error) -> Self {
        ItemError::storage(err)
    }
}

impl From<serde_json::Error> for ItemError {
    fn from(err: serde_json::Error) -> Self {
        ItemError::storage(err)
    }
}

impl From<refinery::Error> for ItemError {
    fn from(err: refinery::Error) -> Self {
        ItemError::storage(err)
    }
}

// Allow using ? with anyhow errors by converting them
impl From<anyhow::Error> for ItemError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<ItemError>() {
            Ok(item_err) => item_err,
            Err(err) => ItemError::storage(err),
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, ItemError>;
