//! Pipeline domain module.
//!
//! Pipelines, their ordered stages and checklists, and the
//! `LeadPipelineEntry` aggregate that tracks one lead's progress.
//!
//! # Components
//!
//! - `HealthCalculator` - SLA classification of time in stage
//! - `ChecklistGate` - exit gate consulted for user advances
//! - `LeadPipelineEntry` - stage-transition state machine
//!
//! # Events
//!
//! - `LeadEnrolled`
//! - `LeadStageChanged`
//! - `LeadArchived`
//! - `EntryHealthChanged`

mod checklist;
mod entry;
mod errors;
mod events;
mod health;
mod stage;

pub use checklist::{ChecklistGate, ChecklistItem, ChecklistState, GateDecision};
pub use entry::{
    EnrollmentStatus, HealthChange, LeadPipelineEntry, StageChange, TransitionKind,
    TransitionOrigin, MAX_STAGE_HISTORY,
};
pub use errors::PipelineError;
pub use events::{EntryHealthChanged, LeadArchived, LeadEnrolled, LeadStageChanged};
pub use health::{HealthCalculator, StageHealth, DEFAULT_SLA_DAYS};
pub use stage::{
    validate_appointment_timing, AppointmentTemplate, Pipeline, PipelineStage,
    MAX_APPOINTMENT_MINUTES, MAX_APPOINTMENT_OFFSET_HOURS,
};
