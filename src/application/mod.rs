//! Application layer - Command services and automation orchestration.
//!
//! This layer orchestrates domain operations and coordinates between ports.

pub mod handlers;

pub use handlers::{
    // Pipeline
    AdvanceStageCommand, ArchiveEntryCommand, ArchiveOutcome, EnrollLeadCommand, EnrollResult,
    HealthRefreshSummary, MoveStageCommand, SetChecklistItemCommand, StageTransitionManager,
    TransferEntryCommand, TransitionResult, UpdateStageNoteCommand,
    // Automation
    stage_change_trigger, ActionExecutor, AutomationDispatcher, AutomationRuleStore,
    AutomationScheduler, AutomationSchedulerConfig, RetryPolicy, StageChangeTriggerBridge,
    TickSummary, STAGE_CHANGED_EVENT,
};
