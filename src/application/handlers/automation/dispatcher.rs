//! AutomationDispatcher - routes trigger events to matching rules.

use futures::stream::{self, StreamExt};
use std::sync::Arc;

use super::action_executor::ActionExecutor;
use crate::domain::automation::{
    AutomationError, AutomationExecution, EvaluationOrder, TriggerEvaluator, TriggerEvent,
};
use crate::ports::AutomationRuleRepository;

pub const DEFAULT_MAX_CASCADE_DEPTH: u32 = 3;
pub const DEFAULT_MAX_CONCURRENT_EXECUTIONS: usize = 8;

/// Loads the current rules, selects the ones an event fires and runs them.
///
/// Matched rules for one event run one after another in evaluation order.
/// Separate events run concurrently through [`dispatch_all`](Self::dispatch_all).
pub struct AutomationDispatcher {
    rules: Arc<dyn AutomationRuleRepository>,
    evaluator: TriggerEvaluator,
    executor: Arc<ActionExecutor>,
    max_cascade_depth: u32,
    max_concurrent_executions: usize,
}

impl AutomationDispatcher {
    pub fn new(rules: Arc<dyn AutomationRuleRepository>, executor: Arc<ActionExecutor>) -> Self {
        Self {
            rules,
            evaluator: TriggerEvaluator::default(),
            executor,
            max_cascade_depth: DEFAULT_MAX_CASCADE_DEPTH,
            max_concurrent_executions: DEFAULT_MAX_CONCURRENT_EXECUTIONS,
        }
    }

    pub fn with_evaluation_order(mut self, order: EvaluationOrder) -> Self {
        self.evaluator = TriggerEvaluator::new(order);
        self
    }

    pub fn with_max_cascade_depth(mut self, depth: u32) -> Self {
        self.max_cascade_depth = depth;
        self
    }

    pub fn with_max_concurrent_executions(mut self, limit: usize) -> Self {
        self.max_concurrent_executions = limit.max(1);
        self
    }

    pub fn max_cascade_depth(&self) -> u32 {
        self.max_cascade_depth
    }

    /// Runs every rule the event fires.
    ///
    /// Events deeper than the cascade limit are dropped and yield no
    /// executions. Action failures are inside the returned executions;
    /// only rule loading errors are returned as `Err`.
    pub async fn dispatch(
        &self,
        event: &TriggerEvent,
    ) -> Result<Vec<AutomationExecution>, AutomationError> {
        if event.cascade_depth > self.max_cascade_depth {
            tracing::warn!(
                event_id = %event.event_id,
                trigger = %event.trigger_type,
                lead_id = %event.lead_id,
                cascade_depth = event.cascade_depth,
                max_cascade_depth = self.max_cascade_depth,
                "cascade limit reached, dropping trigger event"
            );
            return Ok(Vec::new());
        }

        let rules = self.rules.load_all().await?;
        let matched = self.evaluator.select(&rules, event);
        tracing::debug!(
            event_id = %event.event_id,
            trigger = %event.trigger_type,
            matched = matched.len(),
            "trigger evaluated"
        );

        let mut executions = Vec::with_capacity(matched.len());
        for rule in matched {
            executions.push(self.executor.execute(rule, event).await);
        }
        Ok(executions)
    }

    /// Dispatches many events with bounded concurrency.
    ///
    /// Events whose rules could not be loaded are logged and contribute
    /// no executions.
    pub async fn dispatch_all(&self, events: Vec<TriggerEvent>) -> Vec<AutomationExecution> {
        let results: Vec<(TriggerEvent, Result<Vec<AutomationExecution>, AutomationError>)> =
            stream::iter(events)
                .map(|event| async move {
                    let result = self.dispatch(&event).await;
                    (event, result)
                })
                .buffer_unordered(self.max_concurrent_executions)
                .collect()
                .await;

        let mut executions = Vec::new();
        for (event, result) in results {
            match result {
                Ok(mut batch) => executions.append(&mut batch),
                Err(e) => tracing::error!(
                    event_id = %event.event_id,
                    error = %e,
                    "trigger dispatch failed"
                ),
            }
        }
        executions
    }
}
