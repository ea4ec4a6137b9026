//! The event shape consumed by the rule engine.

use serde::{Deserialize, Serialize};

use super::trigger::{ContextValue, TriggerContext, TriggerType};
use crate::domain::foundation::{EntryId, EventId, LeadId, Timestamp};

/// A domain occurrence that may fire automation rules.
///
/// Raised by the stage-change bridge, the scheduler, or external field and
/// score collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerEvent {
    pub event_id: EventId,
    pub trigger_type: TriggerType,
    pub lead_id: LeadId,
    #[serde(default)]
    pub entry_id: Option<EntryId>,
    #[serde(default)]
    pub context: TriggerContext,
    /// Number of automation hops that led to this event.
    #[serde(default)]
    pub cascade_depth: u32,
    pub occurred_at: Timestamp,
}

impl TriggerEvent {
    pub fn new(trigger_type: TriggerType, lead_id: LeadId) -> Self {
        Self {
            event_id: EventId::new(),
            trigger_type,
            lead_id,
            entry_id: None,
            context: TriggerContext::new(),
            cascade_depth: 0,
            occurred_at: Timestamp::now(),
        }
    }

    pub fn with_event_id(mut self, event_id: EventId) -> Self {
        self.event_id = event_id;
        self
    }

    pub fn with_entry(mut self, entry_id: EntryId) -> Self {
        self.entry_id = Some(entry_id);
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<ContextValue>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn with_cascade_depth(mut self, depth: u32) -> Self {
        self.cascade_depth = depth;
        self
    }

    pub fn with_occurred_at(mut self, at: Timestamp) -> Self {
        self.occurred_at = at;
        self
    }
}
