//! Automation domain module.
//!
//! Declarative trigger/action rules, the evaluator that matches them
//! against trigger events, and the execution records kept per run.

mod action;
mod errors;
mod evaluator;
mod event;
mod execution;
mod rule;
mod trigger;

pub use action::{
    Action, NotificationPriority, DEFAULT_APPOINTMENT_MINUTES, DEFAULT_APPOINTMENT_OFFSET_HOURS,
};
pub use errors::AutomationError;
pub use evaluator::{EvaluationOrder, TriggerEvaluator};
pub use event::TriggerEvent;
pub use execution::{ActionStep, AutomationExecution, ExecutionStatus, StepOutcome};
pub use rule::{AutomationRule, RuleDefinition};
pub use trigger::{Condition, ContextValue, Trigger, TriggerContext, TriggerType};
