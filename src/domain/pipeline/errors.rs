//! Pipeline-specific error types.

use thiserror::Error;

use crate::domain::foundation::{
    ChecklistItemId, DomainError, EntryId, ErrorCode, LeadId, PipelineId, StageId,
    ValidationError,
};

/// Errors returned synchronously to the caller of a pipeline operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// The exit gate rejected a user-initiated advance.
    #[error("{}", checklist_message(.missing_titles, .criteria_pending))]
    ChecklistIncomplete {
        missing_titles: Vec<String>,
        criteria_pending: bool,
    },

    /// Target stage not reachable from the entry's current state.
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// The entry changed since it was read.
    #[error("Entry was modified concurrently (expected version {expected}, found {actual})")]
    Conflict { expected: u64, actual: u64 },

    #[error("Pipeline entry not found: {0}")]
    EntryNotFound(EntryId),

    #[error("Stage not found: {0}")]
    StageNotFound(StageId),

    #[error("Pipeline not found: {0}")]
    PipelineNotFound(PipelineId),

    #[error("Checklist item {0} does not belong to the current stage")]
    ChecklistItemNotFound(ChecklistItemId),

    #[error("Lead {lead_id} already has an active entry in pipeline {pipeline_id}")]
    AlreadyEnrolled {
        lead_id: LeadId,
        pipeline_id: PipelineId,
    },

    #[error("Validation failed for '{field}': {message}")]
    Validation { field: String, message: String },

    #[error("Error: {0}")]
    Infrastructure(String),
}

fn checklist_message(missing: &[String], criteria_pending: &bool) -> String {
    let mut parts = Vec::new();
    if !missing.is_empty() {
        parts.push(format!("complete required items: {}", missing.join(", ")));
    }
    if *criteria_pending {
        parts.push("acknowledge the exit criteria".to_string());
    }
    format!("Cannot advance: {}", parts.join("; "))
}

impl PipelineError {
    pub fn invalid_transition(message: impl Into<String>) -> Self {
        PipelineError::InvalidTransition(message.into())
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        PipelineError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            PipelineError::ChecklistIncomplete { .. } => ErrorCode::ChecklistIncomplete,
            PipelineError::InvalidTransition(_) => ErrorCode::InvalidStateTransition,
            PipelineError::Conflict { .. } => ErrorCode::Conflict,
            PipelineError::EntryNotFound(_) => ErrorCode::EntryNotFound,
            PipelineError::StageNotFound(_) => ErrorCode::StageNotFound,
            PipelineError::PipelineNotFound(_) => ErrorCode::PipelineNotFound,
            PipelineError::ChecklistItemNotFound(_) => ErrorCode::ChecklistItemNotFound,
            PipelineError::AlreadyEnrolled { .. } => ErrorCode::AlreadyEnrolled,
            PipelineError::Validation { .. } => ErrorCode::ValidationFailed,
            PipelineError::Infrastructure(_) => ErrorCode::StorageError,
        }
    }
}

impl From<DomainError> for PipelineError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::Conflict => PipelineError::Conflict {
                expected: err.version_detail("expected_version").unwrap_or_default(),
                actual: err.version_detail("actual_version").unwrap_or_default(),
            },
            ErrorCode::AlreadyEnrolled => {
                match (err.detail_as("lead_id"), err.detail_as("pipeline_id")) {
                    (Some(lead_id), Some(pipeline_id)) => PipelineError::AlreadyEnrolled {
                        lead_id,
                        pipeline_id,
                    },
                    _ => PipelineError::Infrastructure(err.to_string()),
                }
            }
            ErrorCode::EntryNotFound => match err.detail_as("entry_id") {
                Some(id) => PipelineError::EntryNotFound(id),
                None => PipelineError::Infrastructure(err.to_string()),
            },
            ErrorCode::InvalidStateTransition | ErrorCode::EntryArchived => {
                PipelineError::InvalidTransition(err.message)
            }
            ErrorCode::ValidationFailed => PipelineError::Validation {
                field: err
                    .details
                    .get("field")
                    .cloned()
                    .unwrap_or_else(|| "unknown".to_string()),
                message: err.message,
            },
            _ => PipelineError::Infrastructure(err.to_string()),
        }
    }
}

impl From<ValidationError> for PipelineError {
    fn from(err: ValidationError) -> Self {
        PipelineError::validation(err.field().to_string(), err.to_string())
    }
}
