//! Automation-specific error types.

use thiserror::Error;

use crate::domain::foundation::{DomainError, ErrorCode, RuleId, ValidationError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AutomationError {
    #[error("Automation rule not found: {0}")]
    RuleNotFound(RuleId),

    /// One action of a rule failed. Captured into the ledger, never
    /// propagated to the event source.
    #[error("Action {index} ({action}) failed: {message}")]
    ActionExecution {
        index: usize,
        action: String,
        message: String,
    },

    #[error("Execution timed out after {after_ms}ms")]
    TimedOut { after_ms: u64 },

    #[error("Validation failed for '{field}': {message}")]
    Validation { field: String, message: String },

    #[error("Error: {0}")]
    Infrastructure(String),
}

impl AutomationError {
    pub fn action(index: usize, action: impl Into<String>, message: impl Into<String>) -> Self {
        AutomationError::ActionExecution {
            index,
            action: action.into(),
            message: message.into(),
        }
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        AutomationError::Infrastructure(message.into())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            AutomationError::RuleNotFound(_) => ErrorCode::RuleNotFound,
            AutomationError::ActionExecution { .. } => ErrorCode::ActionFailed,
            AutomationError::TimedOut { .. } => ErrorCode::Timeout,
            AutomationError::Validation { .. } => ErrorCode::ValidationFailed,
            AutomationError::Infrastructure(_) => ErrorCode::StorageError,
        }
    }
}

impl From<ValidationError> for AutomationError {
    fn from(err: ValidationError) -> Self {
        AutomationError::Validation {
            field: err.field().to_string(),
            message: err.to_string(),
        }
    }
}

impl From<DomainError> for AutomationError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::ValidationFailed => AutomationError::Validation {
                field: err
                    .details
                    .get("field")
                    .cloned()
                    .unwrap_or_else(|| "unknown".to_string()),
                message: err.message,
            },
            _ => AutomationError::Infrastructure(err.to_string()),
        }
    }
}
