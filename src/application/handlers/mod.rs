//! Application handlers.
//!
//! Services that orchestrate domain operations over the ports.

pub mod automation;
pub mod pipeline;

pub use automation::{
    stage_change_trigger, ActionExecutor, AutomationDispatcher, AutomationRuleStore,
    AutomationScheduler, AutomationSchedulerConfig, RetryPolicy, StageChangeTriggerBridge,
    TickSummary, STAGE_CHANGED_EVENT,
};
pub use pipeline::{
    AdvanceStageCommand, ArchiveEntryCommand, ArchiveOutcome, EnrollLeadCommand, EnrollResult,
    HealthRefreshSummary, MoveStageCommand, SetChecklistItemCommand, StageTransitionManager,
    TransferEntryCommand, TransitionResult, UpdateStageNoteCommand,
};
