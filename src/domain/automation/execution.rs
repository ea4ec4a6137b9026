//! Execution records: one run of one rule against one lead.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::event::TriggerEvent;
use super::rule::AutomationRule;
use crate::domain::foundation::{
    EntryId, EventId, ExecutionId, LeadId, RuleId, StateMachine, Timestamp, ValidationError,
};

/// Lifecycle: pending → executing → completed | failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    #[default]
    Pending,
    Executing,
    Completed,
    Failed,
}

impl StateMachine for ExecutionStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use ExecutionStatus::*;
        matches!(
            (self, target),
            (Pending, Executing) | (Pending, Failed) | (Executing, Completed) | (Executing, Failed)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use ExecutionStatus::*;
        match self {
            Pending => vec![Executing, Failed],
            Executing => vec![Completed, Failed],
            Completed | Failed => vec![],
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecutionStatus::Pending => "pending",
            ExecutionStatus::Executing => "executing",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Recorded result of one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Succeeded,
    Failed,
    /// Never run because an earlier step failed.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionStep {
    pub index: usize,
    pub action: String,
    pub outcome: StepOutcome,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ActionStep {
    pub fn succeeded(index: usize, action: &str, attempts: u32, detail: Option<String>) -> Self {
        Self {
            index,
            action: action.to_string(),
            outcome: StepOutcome::Succeeded,
            attempts,
            detail,
        }
    }

    pub fn failed(index: usize, action: &str, attempts: u32, error: impl Into<String>) -> Self {
        Self {
            index,
            action: action.to_string(),
            outcome: StepOutcome::Failed,
            attempts,
            detail: Some(error.into()),
        }
    }

    pub fn skipped(index: usize, action: &str) -> Self {
        Self {
            index,
            action: action.to_string(),
            outcome: StepOutcome::Skipped,
            attempts: 0,
            detail: None,
        }
    }
}

/// Audit record of a rule run.
///
/// Terminal records are never modified again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutomationExecution {
    id: ExecutionId,
    rule_id: RuleId,
    rule_name: String,
    lead_id: LeadId,
    entry_id: Option<EntryId>,
    event_id: EventId,
    status: ExecutionStatus,
    error: Option<String>,
    steps: Vec<ActionStep>,
    started_at: Timestamp,
    finished_at: Option<Timestamp>,
}

impl AutomationExecution {
    /// Creates a pending record for a matched rule.
    pub fn pending(rule: &AutomationRule, event: &TriggerEvent, now: Timestamp) -> Self {
        Self {
            id: ExecutionId::new(),
            rule_id: rule.id,
            rule_name: rule.name().to_string(),
            lead_id: event.lead_id,
            entry_id: event.entry_id,
            event_id: event.event_id.clone(),
            status: ExecutionStatus::Pending,
            error: None,
            steps: Vec::new(),
            started_at: now,
            finished_at: None,
        }
    }

    pub fn id(&self) -> &ExecutionId {
        &self.id
    }

    pub fn rule_id(&self) -> &RuleId {
        &self.rule_id
    }

    pub fn rule_name(&self) -> &str {
        &self.rule_name
    }

    pub fn lead_id(&self) -> &LeadId {
        &self.lead_id
    }

    pub fn entry_id(&self) -> Option<&EntryId> {
        self.entry_id.as_ref()
    }

    pub fn event_id(&self) -> &EventId {
        &self.event_id
    }

    pub fn status(&self) -> ExecutionStatus {
        self.status
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn steps(&self) -> &[ActionStep] {
        &self.steps
    }

    pub fn started_at(&self) -> &Timestamp {
        &self.started_at
    }

    pub fn finished_at(&self) -> Option<&Timestamp> {
        self.finished_at.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn start(&mut self) -> Result<(), ValidationError> {
        self.status = self.status.transition_to(ExecutionStatus::Executing)?;
        Ok(())
    }

    pub fn record_step(&mut self, step: ActionStep) -> Result<(), ValidationError> {
        if self.status != ExecutionStatus::Executing {
            return Err(ValidationError::invalid_format(
                "status",
                format!("cannot record steps while {}", self.status),
            ));
        }
        self.steps.push(step);
        Ok(())
    }

    pub fn complete(&mut self, now: Timestamp) -> Result<(), ValidationError> {
        self.status = self.status.transition_to(ExecutionStatus::Completed)?;
        self.finished_at = Some(now);
        Ok(())
    }

    pub fn fail(&mut self, error: impl Into<String>, now: Timestamp) -> Result<(), ValidationError> {
        self.status = self.status.transition_to(ExecutionStatus::Failed)?;
        self.error = Some(error.into());
        self.finished_at = Some(now);
        Ok(())
    }
}
