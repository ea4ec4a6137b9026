//! Command infrastructure shared by the application handlers.
//!
//! Handlers accept a single `CommandMetadata` instead of separate
//! `user_id`, `correlation_id` and `source` parameters.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::UserId;

/// Metadata context for command handlers.
///
/// Carries the acting user and correlation context through command
/// processing and onto emitted events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandMetadata {
    /// The user executing this command.
    pub user_id: UserId,

    #[serde(skip_serializing_if = "Option::is_none")]
    correlation_id: Option<String>,

    /// ID of the event that caused this command (automation chains).
    #[serde(skip_serializing_if = "Option::is_none")]
    causation_id: Option<String>,

    /// Source of this command (e.g., "api", "automation", "scheduler").
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<String>,
}

impl CommandMetadata {
    /// Creates new command metadata with required user ID.
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            correlation_id: None,
            causation_id: None,
            source: None,
        }
    }

    /// Metadata for commands issued by the automation engine.
    pub fn automation() -> Self {
        Self::new(UserId::automation()).with_source("automation")
    }

    /// Builder: Add correlation ID for request tracing.
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Builder: Add the ID of the event that caused this command.
    pub fn with_causation_id(mut self, id: impl Into<String>) -> Self {
        self.causation_id = Some(id.into());
        self
    }

    /// Builder: Add source identifier.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Returns the correlation ID, generating one if not set.
    pub fn correlation_id(&self) -> String {
        self.correlation_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string())
    }

    /// Returns the causation ID if set.
    pub fn causation_id(&self) -> Option<&str> {
        self.causation_id.as_deref()
    }

    /// Returns the source if set.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correlation_id_is_generated_when_missing() {
        let meta = CommandMetadata::new(UserId::new("rep").unwrap());
        assert!(!meta.correlation_id().is_empty());
    }

    #[test]
    fn correlation_id_is_preserved_when_set() {
        let meta =
            CommandMetadata::new(UserId::new("rep").unwrap()).with_correlation_id("corr-7");
        assert_eq!(meta.correlation_id(), "corr-7");
    }

    #[test]
    fn automation_metadata_uses_automation_user() {
        let meta = CommandMetadata::automation().with_causation_id("evt-1");
        assert!(meta.user_id.is_automation());
        assert_eq!(meta.source(), Some("automation"));
        assert_eq!(meta.causation_id(), Some("evt-1"));
    }
}
