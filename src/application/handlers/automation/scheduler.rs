//! AutomationScheduler - Background service raising time-based triggers.
//!
//! Each tick:
//! 1. Optionally recomputes stage health for every pipeline
//! 2. Scans Active entries and raises `time_elapsed` and `inactivity` events
//! 3. Dispatches them through the same dispatcher as stage changes
//!
//! ## Configuration
//!
//! | Setting | Default | Description |
//! |---------|---------|-------------|
//! | `poll_interval` | 300s | How often to scan entries |
//! | `inactivity_days` | 14 | Idle days before `inactivity` fires |
//! | `refresh_health` | true | Recompute cached health each tick |
//!
//! ## Deduplication
//!
//! `time_elapsed` fires once per entry for every new whole-day value while
//! the entry stays in the same stage. `inactivity` fires once per idle
//! period, i.e. once per `last_activity_at` value. Marks for entries that
//! are no longer Active are dropped.
//!
//! ## Graceful Shutdown
//!
//! The loop stops when the shutdown watch channel flips to `true`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::time;

use super::dispatcher::AutomationDispatcher;
use crate::application::handlers::pipeline::StageTransitionManager;
use crate::domain::automation::{AutomationExecution, TriggerEvent, TriggerType};
use crate::domain::foundation::{CommandMetadata, DomainError, EntryId, PipelineId, Timestamp};
use crate::domain::pipeline::{LeadPipelineEntry, Pipeline, PipelineStage, DEFAULT_SLA_DAYS};
use crate::ports::{LeadEntryRepository, PipelineCatalog};

/// Configuration for the AutomationScheduler service.
#[derive(Debug, Clone)]
pub struct AutomationSchedulerConfig {
    pub poll_interval: Duration,
    pub inactivity_days: u32,
    pub refresh_health: bool,
}

impl Default for AutomationSchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(300),
            inactivity_days: 14,
            refresh_health: true,
        }
    }
}

impl AutomationSchedulerConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_inactivity_days(mut self, days: u32) -> Self {
        self.inactivity_days = days;
        self
    }

    pub fn with_refresh_health(mut self, enabled: bool) -> Self {
        self.refresh_health = enabled;
        self
    }
}

/// What one tick did.
#[derive(Debug, Clone, Default)]
pub struct TickSummary {
    pub scanned: usize,
    pub time_elapsed: usize,
    pub inactivity: usize,
    pub health_changed: usize,
    pub executions: Vec<AutomationExecution>,
}

/// Per-entry dedupe marks.
#[derive(Debug, Clone)]
struct EntryMarks {
    entered_stage_at: Timestamp,
    last_days_fired: Option<i64>,
    inactivity_fired_for: Option<Timestamp>,
}

pub struct AutomationScheduler {
    entries: Arc<dyn LeadEntryRepository>,
    catalog: Arc<dyn PipelineCatalog>,
    transitions: Arc<StageTransitionManager>,
    dispatcher: Arc<AutomationDispatcher>,
    config: AutomationSchedulerConfig,
    marks: Mutex<HashMap<EntryId, EntryMarks>>,
}

impl AutomationScheduler {
    pub fn new(
        entries: Arc<dyn LeadEntryRepository>,
        catalog: Arc<dyn PipelineCatalog>,
        transitions: Arc<StageTransitionManager>,
        dispatcher: Arc<AutomationDispatcher>,
        config: AutomationSchedulerConfig,
    ) -> Self {
        Self {
            entries,
            catalog,
            transitions,
            dispatcher,
            config,
            marks: Mutex::new(HashMap::new()),
        }
    }

    /// Run the scheduler loop until shutdown signal is received.
    ///
    /// Tick failures are logged and retried on the next interval.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    // a dropped sender also stops the loop
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("automation scheduler stopping");
                        return;
                    }
                }

                _ = interval.tick() => {
                    match self.tick(Timestamp::now()).await {
                        Ok(summary) => tracing::debug!(
                            scanned = summary.scanned,
                            time_elapsed = summary.time_elapsed,
                            inactivity = summary.inactivity,
                            executions = summary.executions.len(),
                            "scheduler tick"
                        ),
                        Err(e) => tracing::error!(error = %e, "scheduler tick failed"),
                    }
                }
            }
        }
    }

    /// Run exactly one scan at `now`.
    pub async fn tick(&self, now: Timestamp) -> Result<TickSummary, DomainError> {
        let pipelines: HashMap<PipelineId, Pipeline> = self
            .catalog
            .list_pipelines()
            .await?
            .into_iter()
            .map(|p| (*p.id(), p))
            .collect();

        let mut summary = TickSummary::default();
        if self.config.refresh_health {
            summary.health_changed = self.refresh_health(pipelines.keys()).await;
        }

        let active = self.entries.list_active().await?;
        summary.scanned = active.len();

        let events = {
            let mut marks = self.marks.lock().await;
            let live: HashSet<EntryId> = active.iter().map(|e| *e.id()).collect();
            marks.retain(|id, _| live.contains(id));

            let mut events = Vec::new();
            for entry in &active {
                let pipeline = pipelines.get(entry.pipeline_id());
                let stage = pipeline
                    .zip(entry.current_stage_id())
                    .and_then(|(p, id)| p.stage(id));
                let entry_marks = marks.entry(*entry.id()).or_insert_with(|| EntryMarks {
                    entered_stage_at: *entry.entered_stage_at(),
                    last_days_fired: None,
                    inactivity_fired_for: None,
                });

                if let Some(event) = self.time_elapsed_event(entry, stage, entry_marks, now) {
                    summary.time_elapsed += 1;
                    events.push(event);
                }
                if let Some(event) = self.inactivity_event(entry, stage, entry_marks, now) {
                    summary.inactivity += 1;
                    events.push(event);
                }
            }
            events
        };

        if !events.is_empty() {
            summary.executions = self.dispatcher.dispatch_all(events).await;
        }
        Ok(summary)
    }

    async fn refresh_health<'a>(&self, pipeline_ids: impl Iterator<Item = &'a PipelineId>) -> usize {
        let metadata = CommandMetadata::automation().with_source("scheduler");
        let mut changed = 0;
        for pipeline_id in pipeline_ids {
            match self
                .transitions
                .refresh_pipeline_health(pipeline_id, metadata.clone())
                .await
            {
                Ok(result) => changed += result.changed,
                Err(e) => tracing::warn!(
                    pipeline_id = %pipeline_id,
                    error = %e,
                    "health refresh failed"
                ),
            }
        }
        changed
    }

    fn time_elapsed_event(
        &self,
        entry: &LeadPipelineEntry,
        stage: Option<&PipelineStage>,
        marks: &mut EntryMarks,
        now: Timestamp,
    ) -> Option<TriggerEvent> {
        if marks.entered_stage_at != *entry.entered_stage_at() {
            marks.entered_stage_at = *entry.entered_stage_at();
            marks.last_days_fired = None;
        }

        let days = entry.days_in_stage(now);
        if days < 1 || marks.last_days_fired == Some(days) {
            return None;
        }
        marks.last_days_fired = Some(days);

        let sla_days = stage.map_or(DEFAULT_SLA_DAYS, PipelineStage::effective_sla_days);
        Some(
            base_event(TriggerType::TimeElapsed, entry, stage, now)
                .with_context("days_in_stage", days)
                .with_context("sla_days", sla_days)
                .with_context("health", entry.health().as_str()),
        )
    }

    fn inactivity_event(
        &self,
        entry: &LeadPipelineEntry,
        stage: Option<&PipelineStage>,
        marks: &mut EntryMarks,
        now: Timestamp,
    ) -> Option<TriggerEvent> {
        let last_activity = *entry.last_activity_at();
        let idle_days = now.whole_days_since(&last_activity);
        if idle_days < i64::from(self.config.inactivity_days)
            || marks.inactivity_fired_for == Some(last_activity)
        {
            return None;
        }
        marks.inactivity_fired_for = Some(last_activity);

        Some(
            base_event(TriggerType::Inactivity, entry, stage, now)
                .with_context("days_inactive", idle_days),
        )
    }
}

fn base_event(
    trigger_type: TriggerType,
    entry: &LeadPipelineEntry,
    stage: Option<&PipelineStage>,
    now: Timestamp,
) -> TriggerEvent {
    TriggerEvent::new(trigger_type, *entry.lead_id())
        .with_entry(*entry.id())
        .with_occurred_at(now)
        .with_context("stage", stage.map(|s| s.name.clone()))
        .with_context("stage_id", entry.current_stage_id().map(|id| id.to_string()))
        .with_context("pipeline_id", entry.pipeline_id().to_string())
}
