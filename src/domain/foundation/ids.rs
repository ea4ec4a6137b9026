//! Strongly-typed identifier value objects.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::ValidationError;

/// Declares a UUID-backed identifier newtype with the standard accessors.
macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a sales pipeline.
    PipelineId
);

uuid_id!(
    /// Unique identifier for a stage within a pipeline.
    StageId
);

uuid_id!(
    /// Unique identifier for a checklist item attached to a stage.
    ChecklistItemId
);

uuid_id!(
    /// Unique identifier for a lead's membership in a pipeline.
    EntryId
);

uuid_id!(
    /// Unique identifier for a lead (prospective customer).
    LeadId
);

uuid_id!(
    /// Unique identifier for an automation rule.
    RuleId
);

uuid_id!(
    /// Unique identifier for one recorded rule execution.
    ExecutionId
);

uuid_id!(
    /// Identifier returned by the appointment collaborator.
    AppointmentId
);

/// Identifier reserved for changes made by the automation engine.
const AUTOMATION_USER: &str = "system:automation";

/// User identifier (typically from auth provider).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Creates a new UserId, returning error if empty.
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ValidationError::empty_field("user_id"));
        }
        Ok(Self(id))
    }

    /// The pseudo-user recorded on automation-initiated commands.
    pub fn automation() -> Self {
        Self(AUTOMATION_USER.to_string())
    }

    /// Returns true for the automation pseudo-user.
    pub fn is_automation(&self) -> bool {
        self.0 == AUTOMATION_USER
    }

    /// Returns the inner string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
