//! Error types for the domain layer.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use thiserror::Error;

/// Errors that occur during value object construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Field '{field}' cannot be empty")]
    EmptyField { field: String },

    #[error("Field '{field}' must be between {min} and {max}, got {actual}")]
    OutOfRange {
        field: String,
        min: i64,
        max: i64,
        actual: i64,
    },

    #[error("Field '{field}' has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

impl ValidationError {
    /// Creates an empty field validation error.
    pub fn empty_field(field: impl Into<String>) -> Self {
        ValidationError::EmptyField { field: field.into() }
    }

    /// Creates an out of range validation error.
    pub fn out_of_range(field: impl Into<String>, min: i64, max: i64, actual: i64) -> Self {
        ValidationError::OutOfRange {
            field: field.into(),
            min,
            max,
            actual,
        }
    }

    /// Creates an invalid format validation error.
    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Name of the offending field.
    pub fn field(&self) -> &str {
        match self {
            ValidationError::EmptyField { field }
            | ValidationError::OutOfRange { field, .. }
            | ValidationError::InvalidFormat { field, .. } => field,
        }
    }
}

/// Error codes organized by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Validation errors
    ValidationFailed,

    // Not found errors
    PipelineNotFound,
    StageNotFound,
    ChecklistItemNotFound,
    EntryNotFound,
    RuleNotFound,
    ExecutionNotFound,

    // State errors
    InvalidStateTransition,
    ChecklistIncomplete,
    EntryArchived,
    AlreadyEnrolled,
    Conflict,

    // Automation errors
    ActionFailed,
    Timeout,

    // Infrastructure errors
    StorageError,
    InternalError,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::ValidationFailed => "VALIDATION_FAILED",
            ErrorCode::PipelineNotFound => "PIPELINE_NOT_FOUND",
            ErrorCode::StageNotFound => "STAGE_NOT_FOUND",
            ErrorCode::ChecklistItemNotFound => "CHECKLIST_ITEM_NOT_FOUND",
            ErrorCode::EntryNotFound => "ENTRY_NOT_FOUND",
            ErrorCode::RuleNotFound => "RULE_NOT_FOUND",
            ErrorCode::ExecutionNotFound => "EXECUTION_NOT_FOUND",
            ErrorCode::InvalidStateTransition => "INVALID_STATE_TRANSITION",
            ErrorCode::ChecklistIncomplete => "CHECKLIST_INCOMPLETE",
            ErrorCode::EntryArchived => "ENTRY_ARCHIVED",
            ErrorCode::AlreadyEnrolled => "ALREADY_ENROLLED",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::ActionFailed => "ACTION_FAILED",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::StorageError => "STORAGE_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        };
        write!(f, "{}", s)
    }
}

/// Standard domain error with code, message, and optional details.
///
/// This is the error currency of the ports; module errors convert from it.
#[derive(Debug, Clone)]
pub struct DomainError {
    pub code: ErrorCode,
    pub message: String,
    pub details: HashMap<String, String>,
}

impl DomainError {
    /// Creates a new domain error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: HashMap::new(),
        }
    }

    /// Creates a validation error for a specific field.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationFailed, message).with_detail("field", field.into())
    }

    /// Creates an optimistic-concurrency conflict error.
    pub fn conflict(expected: u64, actual: u64) -> Self {
        Self::new(
            ErrorCode::Conflict,
            format!("Stale write: expected version {}, found {}", expected, actual),
        )
        .with_detail("expected_version", expected.to_string())
        .with_detail("actual_version", actual.to_string())
    }

    /// Creates a storage failure error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StorageError, message)
    }

    /// Adds a detail to the error.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Reads a detail and parses it as a version number.
    pub fn version_detail(&self, key: &str) -> Option<u64> {
        self.detail_as(key)
    }

    /// Reads a detail and parses it into `T`.
    pub fn detail_as<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
        self.details.get(key).and_then(|v| v.parse().ok())
    }
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl Error for DomainError {}

impl From<ValidationError> for DomainError {
    fn from(err: ValidationError) -> Self {
        DomainError::validation(err.field().to_string(), err.to_string())
    }
}
