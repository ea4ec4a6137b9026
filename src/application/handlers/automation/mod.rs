//! Automation services.
//!
//! - `AutomationRuleStore` - rule CRUD and YAML import
//! - `ActionExecutor` - runs a rule's actions with retry and timeout
//! - `AutomationDispatcher` - evaluates and executes rules per event
//! - `StageChangeTriggerBridge` - feeds stage changes back into the dispatcher
//! - `AutomationScheduler` - periodic `time_elapsed` / `inactivity` triggers

mod action_executor;
mod dispatcher;
mod rule_store;
mod scheduler;
mod stage_change_bridge;

pub use action_executor::{ActionExecutor, RetryPolicy};
pub use dispatcher::{
    AutomationDispatcher, DEFAULT_MAX_CASCADE_DEPTH, DEFAULT_MAX_CONCURRENT_EXECUTIONS,
};
pub use rule_store::AutomationRuleStore;
pub use scheduler::{AutomationScheduler, AutomationSchedulerConfig, TickSummary};
pub use stage_change_bridge::{stage_change_trigger, StageChangeTriggerBridge, STAGE_CHANGED_EVENT};
