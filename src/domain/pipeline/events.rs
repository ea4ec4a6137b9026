//! Pipeline domain events.
//!
//! - `LeadEnrolled` - Lead entered a pipeline at its entry stage
//! - `LeadStageChanged` - Entry moved between stages or pipelines
//! - `LeadArchived` - Entry left the pipeline (terminal)
//! - `EntryHealthChanged` - Cached health value was replaced

use serde::{Deserialize, Serialize};

use super::entry::{StageChange, TransitionKind, TransitionOrigin};
use super::health::StageHealth;
use crate::domain::foundation::{
    domain_event, EntryId, EventId, LeadId, PipelineId, StageId, Timestamp, UserId,
};

// ════════════════════════════════════════════════════════════════════════════
// LeadEnrolled
// ════════════════════════════════════════════════════════════════════════════

/// Published when a lead is enrolled in a pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadEnrolled {
    pub event_id: EventId,
    pub entry_id: EntryId,
    pub lead_id: LeadId,
    pub pipeline_id: PipelineId,
    pub stage_id: StageId,
    pub enrolled_by: UserId,
    pub enrolled_at: Timestamp,
}

domain_event!(
    LeadEnrolled,
    event_type = "lead.enrolled",
    aggregate_id = entry_id,
    aggregate_type = "LeadPipelineEntry",
    occurred_at = enrolled_at,
    event_id = event_id
);

// ════════════════════════════════════════════════════════════════════════════
// LeadStageChanged
// ════════════════════════════════════════════════════════════════════════════

/// Published on every stage-changing operation.
///
/// Automation-originated changes carry the rule and the cascade depth of
/// the trigger that produced them, so downstream automation can stop
/// runaway chains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadStageChanged {
    pub event_id: EventId,
    pub entry_id: EntryId,
    pub lead_id: LeadId,

    pub from_pipeline_id: PipelineId,
    pub from_stage_id: Option<StageId>,
    /// Stage name at the time of the change, for condition matching.
    pub from_stage_name: Option<String>,

    pub to_pipeline_id: PipelineId,
    pub to_stage_id: StageId,
    pub to_stage_name: String,

    pub kind: TransitionKind,
    pub origin: TransitionOrigin,
    pub cascade_depth: u32,
    pub reason: Option<String>,
    pub changed_by: UserId,
    pub changed_at: Timestamp,
}

impl LeadStageChanged {
    /// Builds the event from an aggregate stage change.
    pub fn from_change(
        entry_id: EntryId,
        lead_id: LeadId,
        change: &StageChange,
        from_stage_name: Option<String>,
        to_stage_name: String,
        cascade_depth: u32,
        changed_by: UserId,
    ) -> Self {
        Self {
            event_id: EventId::new(),
            entry_id,
            lead_id,
            from_pipeline_id: change.from_pipeline_id,
            from_stage_id: change.from_stage_id,
            from_stage_name,
            to_pipeline_id: change.to_pipeline_id,
            to_stage_id: change.to_stage_id,
            to_stage_name,
            kind: change.kind,
            origin: change.origin,
            cascade_depth,
            reason: change.reason.clone(),
            changed_by,
            changed_at: change.changed_at,
        }
    }
}

domain_event!(
    LeadStageChanged,
    event_type = "lead.stage_changed",
    aggregate_id = entry_id,
    aggregate_type = "LeadPipelineEntry",
    occurred_at = changed_at,
    event_id = event_id
);

// ════════════════════════════════════════════════════════════════════════════
// LeadArchived
// ════════════════════════════════════════════════════════════════════════════

/// Published once when an entry is archived.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadArchived {
    pub event_id: EventId,
    pub entry_id: EntryId,
    pub lead_id: LeadId,
    pub pipeline_id: PipelineId,
    pub reason: Option<String>,
    pub archived_by: UserId,
    pub archived_at: Timestamp,
}

domain_event!(
    LeadArchived,
    event_type = "lead.archived",
    aggregate_id = entry_id,
    aggregate_type = "LeadPipelineEntry",
    occurred_at = archived_at,
    event_id = event_id
);

// ════════════════════════════════════════════════════════════════════════════
// EntryHealthChanged
// ════════════════════════════════════════════════════════════════════════════

/// Published when a recomputation changes an entry's cached health.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryHealthChanged {
    pub event_id: EventId,
    pub entry_id: EntryId,
    pub lead_id: LeadId,
    pub pipeline_id: PipelineId,
    pub previous: StageHealth,
    pub current: StageHealth,
    pub days_in_stage: i64,
    pub computed_at: Timestamp,
}

domain_event!(
    EntryHealthChanged,
    event_type = "lead.health_changed",
    aggregate_id = entry_id,
    aggregate_type = "LeadPipelineEntry",
    occurred_at = computed_at,
    event_id = event_id
);
