//! StageTransitionManager - Command service for moving leads through pipelines.
//!
//! Every operation follows the same shape: load the entry (checking the
//! caller's expected version), apply the domain transition, persist with the
//! version that was read, then publish the resulting event.
//!
//! Publishing happens after the write is committed. A subscriber failure is
//! logged and does not turn a committed change into an error for the caller.

use std::sync::Arc;

use crate::domain::foundation::{
    ChecklistItemId, CommandMetadata, EntryId, EventEnvelope, EventId, LeadId,
    PipelineId, SerializableDomainEvent, StageId, Timestamp,
};
use crate::domain::pipeline::{
    ChecklistGate, EnrollmentStatus, EntryHealthChanged, HealthChange, LeadArchived, LeadEnrolled,
    LeadPipelineEntry, LeadStageChanged, Pipeline, PipelineError, PipelineStage, StageChange,
    TransitionOrigin, DEFAULT_SLA_DAYS,
};
use crate::ports::{EventPublisher, LeadEntryRepository, PipelineCatalog};

// ════════════════════════════════════════════════════════════════════════════
// Commands
// ════════════════════════════════════════════════════════════════════════════

/// Enroll a lead at the entry stage of a pipeline.
#[derive(Debug, Clone)]
pub struct EnrollLeadCommand {
    pub lead_id: LeadId,
    pub pipeline_id: PipelineId,
}

/// Gated one-step advance.
#[derive(Debug, Clone)]
pub struct AdvanceStageCommand {
    pub entry_id: EntryId,
    pub target_stage_id: StageId,
    /// The user confirmed the stage's exit criteria.
    pub criteria_acknowledged: bool,
    /// Version the caller last saw; `None` skips the check.
    pub expected_version: Option<u64>,
}

/// Ungated move within the entry's pipeline (regress, jump, automation).
#[derive(Debug, Clone)]
pub struct MoveStageCommand {
    pub entry_id: EntryId,
    pub target_stage_id: StageId,
    pub expected_version: Option<u64>,
}

/// Reassign an entry to another pipeline.
#[derive(Debug, Clone)]
pub struct TransferEntryCommand {
    pub entry_id: EntryId,
    pub pipeline_id: PipelineId,
    pub target_stage_id: StageId,
    pub reason: String,
    pub expected_version: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ArchiveEntryCommand {
    pub entry_id: EntryId,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct SetChecklistItemCommand {
    pub entry_id: EntryId,
    pub item_id: ChecklistItemId,
    pub checked: bool,
}

#[derive(Debug, Clone)]
pub struct UpdateStageNoteCommand {
    pub entry_id: EntryId,
    pub note: String,
}

// ════════════════════════════════════════════════════════════════════════════
// Results
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct EnrollResult {
    pub entry: LeadPipelineEntry,
    pub event: LeadEnrolled,
}

/// Result of any stage-changing operation.
#[derive(Debug, Clone)]
pub struct TransitionResult {
    pub entry: LeadPipelineEntry,
    pub change: StageChange,
    pub event: LeadStageChanged,
}

/// Result of an archive request.
///
/// `changed` is false when the entry was already archived; nothing was
/// written or published in that case.
#[derive(Debug, Clone)]
pub struct ArchiveOutcome {
    pub entry: LeadPipelineEntry,
    pub changed: bool,
    pub event: Option<LeadArchived>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HealthRefreshSummary {
    pub examined: usize,
    pub changed: usize,
}

// ════════════════════════════════════════════════════════════════════════════
// Manager
// ════════════════════════════════════════════════════════════════════════════

/// Application service owning every entry mutation.
pub struct StageTransitionManager {
    catalog: Arc<dyn PipelineCatalog>,
    entries: Arc<dyn LeadEntryRepository>,
    event_publisher: Arc<dyn EventPublisher>,
}

impl StageTransitionManager {
    pub fn new(
        catalog: Arc<dyn PipelineCatalog>,
        entries: Arc<dyn LeadEntryRepository>,
        event_publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            catalog,
            entries,
            event_publisher,
        }
    }

    pub async fn enroll(
        &self,
        cmd: EnrollLeadCommand,
        metadata: CommandMetadata,
    ) -> Result<EnrollResult, PipelineError> {
        let pipeline = self.load_pipeline(&cmd.pipeline_id).await?;

        if self
            .entries
            .find_active(&cmd.lead_id, &cmd.pipeline_id)
            .await?
            .is_some()
        {
            return Err(PipelineError::AlreadyEnrolled {
                lead_id: cmd.lead_id,
                pipeline_id: cmd.pipeline_id,
            });
        }

        let now = Timestamp::now();
        let entry = LeadPipelineEntry::enroll(cmd.lead_id, &pipeline, now)?;
        let stage_id = *entry
            .current_stage_id()
            .ok_or_else(|| PipelineError::invalid_transition("enrolled entry has no stage"))?;

        self.entries.insert(&entry).await?;

        let event = LeadEnrolled {
            event_id: EventId::new(),
            entry_id: *entry.id(),
            lead_id: cmd.lead_id,
            pipeline_id: cmd.pipeline_id,
            stage_id,
            enrolled_by: metadata.user_id.clone(),
            enrolled_at: now,
        };
        self.publish(&event, &metadata).await;

        tracing::info!(
            entry_id = %entry.id(),
            lead_id = %cmd.lead_id,
            pipeline = pipeline.name(),
            "lead enrolled"
        );

        Ok(EnrollResult { entry, event })
    }

    /// One step forward, guarded by the current stage's checklist gate.
    ///
    /// # Errors
    ///
    /// - `ChecklistIncomplete` when required items are unchecked or the exit
    ///   criteria were not acknowledged
    /// - `InvalidTransition` when the target is not the next stage
    /// - `Conflict` when `expected_version` is stale
    pub async fn advance(
        &self,
        cmd: AdvanceStageCommand,
        metadata: CommandMetadata,
    ) -> Result<TransitionResult, PipelineError> {
        let mut entry = self.load_entry(&cmd.entry_id, cmd.expected_version).await?;
        let pipeline = self.load_pipeline(entry.pipeline_id()).await?;
        let current = current_stage(&pipeline, &entry)?;

        let items = self.catalog.checklist_items(&current.id).await?;
        let gate = ChecklistGate::evaluate(
            current,
            &items,
            entry.checklist_state(),
            cmd.criteria_acknowledged,
        );

        let read_version = entry.version();
        let from_name = Some(current.name.clone());
        let change = entry.advance(&pipeline, &cmd.target_stage_id, &gate, Timestamp::now())?;

        self.commit_change(entry, read_version, change, from_name, &pipeline, 0, &metadata)
            .await
    }

    /// Moves back to an earlier stage.
    pub async fn regress(
        &self,
        cmd: MoveStageCommand,
        metadata: CommandMetadata,
    ) -> Result<TransitionResult, PipelineError> {
        let mut entry = self.load_entry(&cmd.entry_id, cmd.expected_version).await?;
        let pipeline = self.load_pipeline(entry.pipeline_id()).await?;

        let read_version = entry.version();
        let from_name = stage_name(&pipeline, entry.current_stage_id());
        let change = entry.regress(&pipeline, &cmd.target_stage_id, Timestamp::now())?;

        self.commit_change(entry, read_version, change, from_name, &pipeline, 0, &metadata)
            .await
    }

    /// Skips forward to any later stage without consulting the gate.
    pub async fn jump(
        &self,
        cmd: MoveStageCommand,
        metadata: CommandMetadata,
    ) -> Result<TransitionResult, PipelineError> {
        let mut entry = self.load_entry(&cmd.entry_id, cmd.expected_version).await?;
        let pipeline = self.load_pipeline(entry.pipeline_id()).await?;

        let read_version = entry.version();
        let from_name = stage_name(&pipeline, entry.current_stage_id());
        let change = entry.jump(&pipeline, &cmd.target_stage_id, Timestamp::now())?;

        self.commit_change(entry, read_version, change, from_name, &pipeline, 0, &metadata)
            .await
    }

    /// Ungated move to any other stage of the same pipeline.
    ///
    /// Used by `move_stage` automation actions; `cascade_depth` is stamped
    /// on the published event so downstream rules can stop loops.
    pub async fn move_ungated(
        &self,
        cmd: MoveStageCommand,
        origin: TransitionOrigin,
        cascade_depth: u32,
        metadata: CommandMetadata,
    ) -> Result<TransitionResult, PipelineError> {
        let mut entry = self.load_entry(&cmd.entry_id, cmd.expected_version).await?;
        let pipeline = self.load_pipeline(entry.pipeline_id()).await?;

        let read_version = entry.version();
        let from_name = stage_name(&pipeline, entry.current_stage_id());
        let change =
            entry.move_ungated(&pipeline, &cmd.target_stage_id, origin, Timestamp::now())?;

        self.commit_change(
            entry,
            read_version,
            change,
            from_name,
            &pipeline,
            cascade_depth,
            &metadata,
        )
        .await
    }

    /// Reassigns the entry to another pipeline.
    ///
    /// # Errors
    ///
    /// - `Validation` when the reason is blank
    /// - `AlreadyEnrolled` when the lead is already active in the target
    /// - `InvalidTransition` for the current pipeline or a foreign stage
    pub async fn transfer(
        &self,
        cmd: TransferEntryCommand,
        metadata: CommandMetadata,
    ) -> Result<TransitionResult, PipelineError> {
        let mut entry = self.load_entry(&cmd.entry_id, cmd.expected_version).await?;
        let new_pipeline = self.load_pipeline(&cmd.pipeline_id).await?;

        // The source pipeline may have been removed from the catalog.
        let from_name = self
            .catalog
            .find_pipeline(entry.pipeline_id())
            .await?
            .and_then(|old| stage_name(&old, entry.current_stage_id()));

        let read_version = entry.version();
        let change = entry.transfer(
            &new_pipeline,
            &cmd.target_stage_id,
            &cmd.reason,
            Timestamp::now(),
        )?;

        if self
            .entries
            .find_active(entry.lead_id(), &cmd.pipeline_id)
            .await?
            .is_some()
        {
            return Err(PipelineError::AlreadyEnrolled {
                lead_id: *entry.lead_id(),
                pipeline_id: cmd.pipeline_id,
            });
        }

        self.commit_change(
            entry,
            read_version,
            change,
            from_name,
            &new_pipeline,
            0,
            &metadata,
        )
        .await
    }

    /// Archives the entry. Archiving twice is a successful no-op.
    pub async fn archive(
        &self,
        cmd: ArchiveEntryCommand,
        metadata: CommandMetadata,
    ) -> Result<ArchiveOutcome, PipelineError> {
        let mut entry = self.load_entry(&cmd.entry_id, None).await?;
        let read_version = entry.version();
        let now = Timestamp::now();

        if !entry.archive(&cmd.reason, now) {
            tracing::debug!(entry_id = %cmd.entry_id, "entry already archived");
            return Ok(ArchiveOutcome {
                entry,
                changed: false,
                event: None,
            });
        }

        self.entries.update(&entry, read_version).await?;

        let event = LeadArchived {
            event_id: EventId::new(),
            entry_id: cmd.entry_id,
            lead_id: *entry.lead_id(),
            pipeline_id: *entry.pipeline_id(),
            reason: entry.archive_reason().map(str::to_string),
            archived_by: metadata.user_id.clone(),
            archived_at: now,
        };
        self.publish(&event, &metadata).await;

        tracing::info!(entry_id = %cmd.entry_id, "entry archived");

        Ok(ArchiveOutcome {
            entry,
            changed: true,
            event: Some(event),
        })
    }

    /// Checks or unchecks an item of the entry's current stage.
    pub async fn set_checklist_item(
        &self,
        cmd: SetChecklistItemCommand,
        _metadata: CommandMetadata,
    ) -> Result<LeadPipelineEntry, PipelineError> {
        let mut entry = self.load_entry(&cmd.entry_id, None).await?;
        let read_version = entry.version();

        entry.set_checklist_item(cmd.item_id, cmd.checked, Timestamp::now())?;

        let stage_id = *entry
            .current_stage_id()
            .ok_or_else(|| PipelineError::invalid_transition("entry has no current stage"))?;
        let items = self.catalog.checklist_items(&stage_id).await?;
        if !items.iter().any(|item| item.id == cmd.item_id) {
            return Err(PipelineError::ChecklistItemNotFound(cmd.item_id));
        }

        self.entries.update(&entry, read_version).await?;
        Ok(entry)
    }

    pub async fn update_stage_note(
        &self,
        cmd: UpdateStageNoteCommand,
        _metadata: CommandMetadata,
    ) -> Result<LeadPipelineEntry, PipelineError> {
        let mut entry = self.load_entry(&cmd.entry_id, None).await?;
        let read_version = entry.version();

        entry.update_stage_note(cmd.note, Timestamp::now())?;

        self.entries.update(&entry, read_version).await?;
        Ok(entry)
    }

    /// Recomputes one entry's health, persisting only a changed value.
    pub async fn refresh_health(
        &self,
        entry_id: &EntryId,
        metadata: CommandMetadata,
    ) -> Result<Option<HealthChange>, PipelineError> {
        let entry = self.load_entry(entry_id, None).await?;
        let pipeline = self.load_pipeline(entry.pipeline_id()).await?;
        self.refresh_loaded(entry, &pipeline, &metadata).await
    }

    /// Recomputes health for every Active entry of a pipeline.
    ///
    /// Entries modified concurrently are skipped; the next pass picks
    /// them up.
    pub async fn refresh_pipeline_health(
        &self,
        pipeline_id: &PipelineId,
        metadata: CommandMetadata,
    ) -> Result<HealthRefreshSummary, PipelineError> {
        let pipeline = self.load_pipeline(pipeline_id).await?;
        let entries = self
            .entries
            .list_by_pipeline(pipeline_id, Some(EnrollmentStatus::Active))
            .await?;

        let mut summary = HealthRefreshSummary::default();
        for entry in entries {
            summary.examined += 1;
            let entry_id = *entry.id();
            match self.refresh_loaded(entry, &pipeline, &metadata).await {
                Ok(Some(_)) => summary.changed += 1,
                Ok(None) => {}
                Err(PipelineError::Conflict { .. }) => {
                    tracing::warn!(entry_id = %entry_id, "skipping health refresh, entry changed concurrently");
                }
                Err(e) => return Err(e),
            }
        }

        tracing::debug!(
            pipeline = pipeline.name(),
            examined = summary.examined,
            changed = summary.changed,
            "pipeline health refreshed"
        );
        Ok(summary)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Private helpers
    // ─────────────────────────────────────────────────────────────────────────

    async fn load_entry(
        &self,
        entry_id: &EntryId,
        expected_version: Option<u64>,
    ) -> Result<LeadPipelineEntry, PipelineError> {
        let entry = self
            .entries
            .find_by_id(entry_id)
            .await?
            .ok_or(PipelineError::EntryNotFound(*entry_id))?;

        match expected_version {
            Some(expected) if expected != entry.version() => Err(PipelineError::Conflict {
                expected,
                actual: entry.version(),
            }),
            _ => Ok(entry),
        }
    }

    async fn load_pipeline(&self, pipeline_id: &PipelineId) -> Result<Pipeline, PipelineError> {
        self.catalog
            .find_pipeline(pipeline_id)
            .await?
            .ok_or(PipelineError::PipelineNotFound(*pipeline_id))
    }

    async fn refresh_loaded(
        &self,
        mut entry: LeadPipelineEntry,
        pipeline: &Pipeline,
        metadata: &CommandMetadata,
    ) -> Result<Option<HealthChange>, PipelineError> {
        let now = Timestamp::now();
        let sla_days = entry
            .current_stage_id()
            .and_then(|id| pipeline.stage(id))
            .map_or(DEFAULT_SLA_DAYS, PipelineStage::effective_sla_days);

        let read_version = entry.version();
        let Some(change) = entry.refresh_health(now, sla_days) else {
            return Ok(None);
        };

        self.entries.update(&entry, read_version).await?;

        let event = EntryHealthChanged {
            event_id: EventId::new(),
            entry_id: *entry.id(),
            lead_id: *entry.lead_id(),
            pipeline_id: *entry.pipeline_id(),
            previous: change.previous,
            current: change.current,
            days_in_stage: entry.days_in_stage(now),
            computed_at: now,
        };
        self.publish(&event, metadata).await;

        tracing::info!(
            entry_id = %entry.id(),
            previous = change.previous.as_str(),
            current = change.current.as_str(),
            "entry health changed"
        );
        Ok(Some(change))
    }

    #[allow(clippy::too_many_arguments)]
    async fn commit_change(
        &self,
        entry: LeadPipelineEntry,
        read_version: u64,
        change: StageChange,
        from_stage_name: Option<String>,
        target_pipeline: &Pipeline,
        cascade_depth: u32,
        metadata: &CommandMetadata,
    ) -> Result<TransitionResult, PipelineError> {
        self.entries.update(&entry, read_version).await?;

        let to_stage_name = stage_name(target_pipeline, Some(&change.to_stage_id)).unwrap_or_default();
        let event = LeadStageChanged::from_change(
            *entry.id(),
            *entry.lead_id(),
            &change,
            from_stage_name,
            to_stage_name,
            cascade_depth,
            metadata.user_id.clone(),
        );
        self.publish(&event, metadata).await;

        tracing::info!(
            entry_id = %entry.id(),
            kind = change.kind.as_str(),
            to_stage = %event.to_stage_name,
            cascade_depth,
            "stage changed"
        );

        Ok(TransitionResult {
            entry,
            change,
            event,
        })
    }

    async fn publish<E: SerializableDomainEvent>(&self, event: &E, metadata: &CommandMetadata) {
        let result = match event.to_envelope() {
            Ok(envelope) => self.event_publisher.publish(stamp(envelope, metadata)).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            tracing::error!(
                event_type = event.event_type(),
                aggregate_id = %event.aggregate_id(),
                error = %e,
                "event not delivered after commit"
            );
        }
    }
}

fn stamp(envelope: EventEnvelope, metadata: &CommandMetadata) -> EventEnvelope {
    let envelope = envelope
        .with_correlation_id(metadata.correlation_id())
        .with_user_id(metadata.user_id.as_str());
    match metadata.causation_id() {
        Some(cause) => envelope.with_causation_id(cause),
        None => envelope,
    }
}

fn stage_name(pipeline: &Pipeline, stage_id: Option<&StageId>) -> Option<String> {
    stage_id
        .and_then(|id| pipeline.stage(id))
        .map(|stage| stage.name.clone())
}

fn current_stage<'a>(
    pipeline: &'a Pipeline,
    entry: &LeadPipelineEntry,
) -> Result<&'a PipelineStage, PipelineError> {
    let stage_id = entry
        .current_stage_id()
        .ok_or_else(|| PipelineError::invalid_transition("entry has no current stage"))?;
    pipeline
        .stage(stage_id)
        .ok_or(PipelineError::StageNotFound(*stage_id))
}
