//! Pipeline command handlers.
//!
//! - `StageTransitionManager` - enrollment, transitions, archive, health

mod stage_transition_manager;

pub use stage_transition_manager::{
    AdvanceStageCommand, ArchiveEntryCommand, ArchiveOutcome, EnrollLeadCommand, EnrollResult,
    HealthRefreshSummary, MoveStageCommand, SetChecklistItemCommand, StageTransitionManager,
    TransferEntryCommand, TransitionResult, UpdateStageNoteCommand,
};
