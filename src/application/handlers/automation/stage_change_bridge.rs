//! Turns published stage changes into `stage_change` trigger events.

use async_trait::async_trait;
use std::sync::Arc;

use super::dispatcher::AutomationDispatcher;
use crate::domain::automation::{ContextValue, TriggerEvent, TriggerType};
use crate::domain::foundation::{DomainError, ErrorCode, EventEnvelope, EventId};
use crate::domain::pipeline::{LeadStageChanged, TransitionOrigin};
use crate::ports::EventHandler;

/// Event type this handler subscribes to.
pub const STAGE_CHANGED_EVENT: &str = "lead.stage_changed";

/// Subscribes the dispatcher to `lead.stage_changed`.
///
/// Context keys: `from_stage`, `to_stage` (names), `from_stage_id`,
/// `to_stage_id`, `pipeline_id`, `from_pipeline_id`, `transition` and
/// `origin` (`user` or `automation`, plus `rule_id` for the latter).
pub struct StageChangeTriggerBridge {
    dispatcher: Arc<AutomationDispatcher>,
}

impl StageChangeTriggerBridge {
    pub fn new(dispatcher: Arc<AutomationDispatcher>) -> Self {
        Self { dispatcher }
    }
}

/// Builds the trigger event for a stage change.
pub fn stage_change_trigger(changed: &LeadStageChanged, event_id: EventId) -> TriggerEvent {
    let mut event = TriggerEvent::new(TriggerType::StageChange, changed.lead_id)
        .with_event_id(event_id)
        .with_entry(changed.entry_id)
        .with_cascade_depth(changed.cascade_depth)
        .with_occurred_at(changed.changed_at)
        .with_context("from_stage", changed.from_stage_name.clone())
        .with_context("to_stage", changed.to_stage_name.clone())
        .with_context(
            "from_stage_id",
            changed.from_stage_id.map(|id| id.to_string()),
        )
        .with_context("to_stage_id", changed.to_stage_id.to_string())
        .with_context("pipeline_id", changed.to_pipeline_id.to_string())
        .with_context("from_pipeline_id", changed.from_pipeline_id.to_string())
        .with_context("transition", changed.kind.as_str());

    event = match changed.origin {
        TransitionOrigin::User => event.with_context("origin", "user"),
        TransitionOrigin::Automation { rule_id } => event
            .with_context("origin", "automation")
            .with_context("rule_id", ContextValue::Text(rule_id.to_string())),
    };
    event
}

#[async_trait]
impl EventHandler for StageChangeTriggerBridge {
    async fn handle(&self, envelope: EventEnvelope) -> Result<(), DomainError> {
        let changed: LeadStageChanged = envelope.payload_as().map_err(|e| {
            DomainError::new(
                ErrorCode::InternalError,
                format!("Malformed {} payload: {}", envelope.event_type, e),
            )
        })?;

        let event = stage_change_trigger(&changed, envelope.event_id.clone());

        // Rule failures never reach the publisher of the stage change.
        if let Err(e) = self.dispatcher.dispatch(&event).await {
            tracing::error!(
                event_id = %envelope.event_id,
                entry_id = %changed.entry_id,
                error = %e,
                "stage change automation failed"
            );
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "StageChangeTriggerBridge"
    }
}
