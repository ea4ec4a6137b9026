//! ActionExecutor - runs one matched rule against one trigger event.
//!
//! Actions run strictly in order. The first failing action is recorded as
//! failed, the rest are recorded as skipped and never run, and nothing that
//! already happened is rolled back. Failures stay in the returned execution
//! and the ledger; they are never raised to the event source.
//!
//! The execution timeout bounds each action's own call. A `move_stage`
//! action is not cut short once started: its event dispatches follow-on
//! rules inline, and each of those runs under its own deadline.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::application::handlers::pipeline::{MoveStageCommand, StageTransitionManager};
use crate::domain::automation::{
    Action, ActionStep, AutomationError, AutomationExecution, AutomationRule, TriggerEvent,
    DEFAULT_APPOINTMENT_MINUTES, DEFAULT_APPOINTMENT_OFFSET_HOURS,
};
use crate::domain::foundation::{
    CommandMetadata, DomainError, EntryId, ErrorCode, StageId, Timestamp,
};
use crate::domain::pipeline::{AppointmentTemplate, PipelineError, TransitionOrigin};
use crate::ports::{
    AppointmentRequest, AppointmentScheduler, ExecutionLedger, LeadEntryRepository,
    LeadFieldWriter, Notification, NotificationSink, PipelineCatalog,
};

/// Bounded retry for a single action.
///
/// Only transient failures (storage, timeouts, concurrent modification)
/// are retried. The delay doubles after every attempt up to `max_backoff`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts including the first; 1 disables retry.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
            max_backoff,
        }
    }

    /// Delay before the attempt following `attempt` (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
        }
    }
}

/// Why one attempt of an action failed.
#[derive(Debug)]
struct StepError {
    message: String,
    retryable: bool,
    timed_out_after_ms: Option<u64>,
}

impl StepError {
    fn permanent(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
            timed_out_after_ms: None,
        }
    }

    fn timed_out(deadline: &Deadline) -> Self {
        let after_ms = u64::try_from(deadline.limit.as_millis()).unwrap_or(u64::MAX);
        Self {
            message: format!("timed out after {}ms", after_ms),
            retryable: false,
            timed_out_after_ms: Some(after_ms),
        }
    }
}

/// When the running execution has to give up.
#[derive(Debug, Clone, Copy)]
struct Deadline {
    at: Instant,
    limit: Duration,
}

impl Deadline {
    fn after(limit: Duration) -> Self {
        Self {
            at: Instant::now() + limit,
            limit,
        }
    }

    fn has_passed(&self) -> bool {
        Instant::now() >= self.at
    }
}

impl From<DomainError> for StepError {
    fn from(err: DomainError) -> Self {
        let retryable = matches!(
            err.code,
            ErrorCode::StorageError | ErrorCode::InternalError | ErrorCode::Timeout | ErrorCode::Conflict
        );
        Self {
            message: err.to_string(),
            retryable,
            timed_out_after_ms: None,
        }
    }
}

impl From<PipelineError> for StepError {
    fn from(err: PipelineError) -> Self {
        let retryable = matches!(
            err,
            PipelineError::Conflict { .. } | PipelineError::Infrastructure(_)
        );
        Self {
            message: err.to_string(),
            retryable,
            timed_out_after_ms: None,
        }
    }
}

/// The action that stopped a rule.
struct StepFailure {
    index: usize,
    attempts: u32,
    error: AutomationError,
}

pub struct ActionExecutor {
    transitions: Arc<StageTransitionManager>,
    entries: Arc<dyn LeadEntryRepository>,
    catalog: Arc<dyn PipelineCatalog>,
    fields: Arc<dyn LeadFieldWriter>,
    appointments: Arc<dyn AppointmentScheduler>,
    notifications: Arc<dyn NotificationSink>,
    ledger: Arc<dyn ExecutionLedger>,
    retry: RetryPolicy,
    execution_timeout: Option<Duration>,
}

impl ActionExecutor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        transitions: Arc<StageTransitionManager>,
        entries: Arc<dyn LeadEntryRepository>,
        catalog: Arc<dyn PipelineCatalog>,
        fields: Arc<dyn LeadFieldWriter>,
        appointments: Arc<dyn AppointmentScheduler>,
        notifications: Arc<dyn NotificationSink>,
        ledger: Arc<dyn ExecutionLedger>,
    ) -> Self {
        Self {
            transitions,
            entries,
            catalog,
            fields,
            appointments,
            notifications,
            ledger,
            retry: RetryPolicy::default(),
            execution_timeout: None,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_execution_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.execution_timeout = timeout;
        self
    }

    /// Runs every action of `rule` for `event` and returns the finished record.
    pub async fn execute(&self, rule: &AutomationRule, event: &TriggerEvent) -> AutomationExecution {
        let mut execution = AutomationExecution::pending(rule, event, Timestamp::now());
        self.record(&execution).await;

        if let Err(e) = execution.start() {
            tracing::error!(execution_id = %execution.id(), error = %e, "execution could not start");
            return execution;
        }
        self.record(&execution).await;

        let deadline = self.execution_timeout.map(Deadline::after);
        let outcome = self.run_actions(rule, event, &mut execution, deadline).await;

        let now = Timestamp::now();
        let finished = match outcome {
            Ok(()) => {
                tracing::info!(
                    rule = rule.name(),
                    lead_id = %event.lead_id,
                    steps = execution.steps().len(),
                    "automation rule completed"
                );
                execution.complete(now)
            }
            Err(failure) => {
                tracing::warn!(
                    rule = rule.name(),
                    lead_id = %event.lead_id,
                    action_index = failure.index,
                    error = %failure.error,
                    "automation rule failed"
                );
                self.record_failure(rule, &mut execution, &failure);
                execution.fail(failure.error.to_string(), now)
            }
        };
        if let Err(e) = finished {
            tracing::error!(execution_id = %execution.id(), error = %e, "execution could not finish");
        }

        self.record(&execution).await;
        execution
    }

    async fn run_actions(
        &self,
        rule: &AutomationRule,
        event: &TriggerEvent,
        execution: &mut AutomationExecution,
        deadline: Option<Deadline>,
    ) -> Result<(), StepFailure> {
        for (index, action) in rule.actions().iter().enumerate() {
            let (result, attempts) = self
                .perform_with_retry(rule, event, action, deadline)
                .await;
            match result {
                Ok(detail) => push_step(
                    execution,
                    ActionStep::succeeded(index, action.kind(), attempts, detail),
                ),
                Err(err) => {
                    let error = match err.timed_out_after_ms {
                        Some(after_ms) => AutomationError::TimedOut { after_ms },
                        None => AutomationError::action(index, action.kind(), err.message),
                    };
                    return Err(StepFailure {
                        index,
                        attempts,
                        error,
                    });
                }
            }
        }
        Ok(())
    }

    fn record_failure(
        &self,
        rule: &AutomationRule,
        execution: &mut AutomationExecution,
        failure: &StepFailure,
    ) {
        let actions = rule.actions();
        if let Some(action) = actions.get(failure.index) {
            push_step(
                execution,
                ActionStep::failed(
                    failure.index,
                    action.kind(),
                    failure.attempts,
                    failure.error.to_string(),
                ),
            );
        }
        for (index, action) in actions.iter().enumerate().skip(failure.index + 1) {
            push_step(execution, ActionStep::skipped(index, action.kind()));
        }
    }

    async fn perform_with_retry(
        &self,
        rule: &AutomationRule,
        event: &TriggerEvent,
        action: &Action,
        deadline: Option<Deadline>,
    ) -> (Result<Option<String>, StepError>, u32) {
        let mut attempt = 1;
        loop {
            match self.perform_within(rule, event, action, deadline).await {
                Ok(detail) => return (Ok(detail), attempt),
                Err(err) if err.retryable && attempt < self.retry.max_attempts => {
                    let delay = self.retry.backoff_for(attempt);
                    tracing::warn!(
                        action = action.kind(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err.message,
                        "action failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return (Err(err), attempt),
            }
        }
    }

    async fn perform_within(
        &self,
        rule: &AutomationRule,
        event: &TriggerEvent,
        action: &Action,
        deadline: Option<Deadline>,
    ) -> Result<Option<String>, StepError> {
        let Some(deadline) = deadline else {
            return self.perform(rule, event, action).await;
        };
        if deadline.has_passed() {
            return Err(StepError::timed_out(&deadline));
        }
        match action {
            // runs to completion; follow-on rules it triggers have their own deadlines
            Action::MoveStage { .. } => self.perform(rule, event, action).await,
            _ => tokio::time::timeout_at(deadline.at, self.perform(rule, event, action))
                .await
                .unwrap_or_else(|_| Err(StepError::timed_out(&deadline))),
        }
    }

    async fn perform(
        &self,
        rule: &AutomationRule,
        event: &TriggerEvent,
        action: &Action,
    ) -> Result<Option<String>, StepError> {
        match action {
            Action::MoveStage { stage_id } => self.move_stage(rule, event, stage_id).await,

            Action::CreateAppointment {
                title,
                start_at,
                offset_hours,
                duration_minutes,
            } => {
                let template = self.stage_template(event).await?;
                let now = Timestamp::now();

                let start = match (start_at, offset_hours, &template) {
                    (Some(at), _, _) => Some(*at),
                    (None, Some(hours), _) => now.checked_plus_hours(*hours),
                    (None, None, Some(t)) => now.checked_plus_hours(t.offset_hours),
                    (None, None, None) => now.checked_plus_hours(DEFAULT_APPOINTMENT_OFFSET_HOURS),
                };
                let minutes = duration_minutes
                    .or_else(|| template.as_ref().map(|t| t.duration_minutes))
                    .unwrap_or(DEFAULT_APPOINTMENT_MINUTES);
                let (start, end) = start
                    .and_then(|start| Some((start, start.checked_plus_minutes(minutes)?)))
                    .ok_or_else(|| StepError::permanent("appointment time is out of range"))?;
                let title = title
                    .clone()
                    .or_else(|| template.as_ref().map(|t| t.title.clone()))
                    .unwrap_or_else(|| rule.name().to_string());

                let request = AppointmentRequest {
                    lead_id: event.lead_id,
                    start_at: start,
                    end_at: end,
                    title,
                    source_rule: rule.name().to_string(),
                };
                let id = self.appointments.create_appointment(request).await?;
                Ok(Some(format!("appointment {}", id)))
            }

            Action::SendNotification {
                priority,
                title,
                message,
            } => {
                self.notifications
                    .send(Notification {
                        lead_id: event.lead_id,
                        priority: *priority,
                        title: title.clone(),
                        message: message.clone(),
                    })
                    .await?;
                Ok(None)
            }

            Action::UpdateField { field, value } => {
                self.fields.update_field(&event.lead_id, field, value).await?;
                Ok(Some(format!("{} = {}", field, value)))
            }

            Action::AssignUser { user_id } => {
                self.fields.assign_user(&event.lead_id, user_id).await?;
                Ok(Some(format!("assigned to {}", user_id)))
            }
        }
    }

    async fn move_stage(
        &self,
        rule: &AutomationRule,
        event: &TriggerEvent,
        stage_id: &StageId,
    ) -> Result<Option<String>, StepError> {
        let entry_id = self.resolve_entry(event, stage_id).await?;

        let metadata = CommandMetadata::automation()
            .with_causation_id(event.event_id.to_string())
            .with_correlation_id(event.event_id.to_string());
        let result = self
            .transitions
            .move_ungated(
                MoveStageCommand {
                    entry_id,
                    target_stage_id: *stage_id,
                    expected_version: None,
                },
                TransitionOrigin::Automation { rule_id: rule.id },
                event.cascade_depth + 1,
                metadata,
            )
            .await?;

        Ok(Some(format!("moved to {}", result.event.to_stage_name)))
    }

    /// The event's entry, or the lead's Active entry in the pipeline that
    /// owns the target stage.
    async fn resolve_entry(
        &self,
        event: &TriggerEvent,
        stage_id: &StageId,
    ) -> Result<EntryId, StepError> {
        if let Some(entry_id) = event.entry_id {
            return Ok(entry_id);
        }

        let pipelines = self.catalog.list_pipelines().await?;
        let pipeline = pipelines
            .iter()
            .find(|p| p.stage(stage_id).is_some())
            .ok_or_else(|| StepError::permanent(format!("stage {} is not in any pipeline", stage_id)))?;

        let entry = self
            .entries
            .find_active(&event.lead_id, pipeline.id())
            .await?
            .ok_or_else(|| {
                StepError::permanent(format!(
                    "lead {} has no active entry in pipeline '{}'",
                    event.lead_id,
                    pipeline.name()
                ))
            })?;
        Ok(*entry.id())
    }

    /// Appointment template of the event entry's current stage, if any.
    async fn stage_template(
        &self,
        event: &TriggerEvent,
    ) -> Result<Option<AppointmentTemplate>, StepError> {
        let Some(entry_id) = event.entry_id else {
            return Ok(None);
        };
        let Some(entry) = self.entries.find_by_id(&entry_id).await? else {
            return Ok(None);
        };
        let Some(stage_id) = entry.current_stage_id() else {
            return Ok(None);
        };
        let pipeline = self.catalog.find_pipeline(entry.pipeline_id()).await?;

        Ok(pipeline
            .as_ref()
            .and_then(|p| p.stage(stage_id))
            .and_then(|stage| stage.appointment_template.clone()))
    }

    async fn record(&self, execution: &AutomationExecution) {
        if let Err(e) = self.ledger.record(execution).await {
            tracing::error!(
                execution_id = %execution.id(),
                status = %execution.status(),
                error = %e,
                "failed to record automation execution"
            );
        }
    }
}

fn push_step(execution: &mut AutomationExecution, step: ActionStep) {
    if let Err(e) = execution.record_step(step) {
        tracing::error!(execution_id = %execution.id(), error = %e, "step not recorded");
    }
}
