//! LeadPipelineEntry aggregate - one lead's membership in one pipeline.
//!
//! The aggregate owns the stage-transition state machine. Callers load the
//! pipeline definition and (for gated advances) evaluate the checklist gate,
//! then invoke the matching transition here.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::checklist::{ChecklistState, GateDecision};
use super::errors::PipelineError;
use super::health::{HealthCalculator, StageHealth};
use super::stage::{Pipeline, PipelineStage};
use crate::domain::foundation::{
    ChecklistItemId, EntryId, LeadId, PipelineId, RuleId, StageId, StateMachine, Timestamp,
};

/// Stage changes kept on an entry; older ones are dropped first.
/// The full trail lives in the `lead.stage_changed` events.
pub const MAX_STAGE_HISTORY: usize = 100;

/// Whether the entry still participates in its pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    #[default]
    Active,
    Archived,
}

impl StateMachine for EnrollmentStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        matches!((self, target), (EnrollmentStatus::Active, EnrollmentStatus::Archived))
    }

    fn valid_transitions(&self) -> Vec<Self> {
        match self {
            EnrollmentStatus::Active => vec![EnrollmentStatus::Archived],
            EnrollmentStatus::Archived => vec![],
        }
    }
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnrollmentStatus::Active => write!(f, "active"),
            EnrollmentStatus::Archived => write!(f, "archived"),
        }
    }
}

/// How a stage change was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    Enrollment,
    /// One step forward through the checklist gate.
    Advance,
    Regress,
    /// Forward past intermediate stages, no gate.
    Jump,
    /// Ungated move requested by an automation rule.
    AutomationMove,
    Transfer,
}

impl TransitionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionKind::Enrollment => "enrollment",
            TransitionKind::Advance => "advance",
            TransitionKind::Regress => "regress",
            TransitionKind::Jump => "jump",
            TransitionKind::AutomationMove => "automation_move",
            TransitionKind::Transfer => "transfer",
        }
    }
}

/// Who initiated a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransitionOrigin {
    User,
    Automation { rule_id: RuleId },
}

impl TransitionOrigin {
    pub fn is_automation(&self) -> bool {
        matches!(self, TransitionOrigin::Automation { .. })
    }
}

/// Audit record of one stage change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageChange {
    pub from_pipeline_id: PipelineId,
    pub from_stage_id: Option<StageId>,
    pub to_pipeline_id: PipelineId,
    pub to_stage_id: StageId,
    pub kind: TransitionKind,
    pub origin: TransitionOrigin,
    pub reason: Option<String>,
    pub changed_at: Timestamp,
}

/// A cached health value that was replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthChange {
    pub previous: StageHealth,
    pub current: StageHealth,
}

/// A lead's membership in one pipeline.
///
/// # Invariants
///
/// - `version` increases by one on every persisted mutation
/// - archived entries accept no further transitions and keep their health
/// - checklist state is never cleared; keys of earlier stages are inert
/// - `stage_history` holds at most `MAX_STAGE_HISTORY` changes, newest last
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadPipelineEntry {
    id: EntryId,
    lead_id: LeadId,
    pipeline_id: PipelineId,
    current_stage_id: Option<StageId>,
    entered_stage_at: Timestamp,
    enrollment_status: EnrollmentStatus,
    health: StageHealth,
    checklist_state: ChecklistState,
    stage_note: String,
    archive_reason: Option<String>,
    last_activity_at: Timestamp,
    stage_history: Vec<StageChange>,
    version: u64,
    created_at: Timestamp,
    updated_at: Timestamp,
}

impl LeadPipelineEntry {
    /// Enrolls a lead at the pipeline's entry stage.
    ///
    /// # Errors
    ///
    /// - `InvalidTransition` if the pipeline is inactive or has no stages
    pub fn enroll(
        lead_id: LeadId,
        pipeline: &Pipeline,
        now: Timestamp,
    ) -> Result<Self, PipelineError> {
        if !pipeline.is_active() {
            return Err(PipelineError::invalid_transition(format!(
                "pipeline '{}' is not active",
                pipeline.name()
            )));
        }
        let entry_stage = pipeline.entry_stage().ok_or_else(|| {
            PipelineError::invalid_transition(format!(
                "pipeline '{}' has no stages",
                pipeline.name()
            ))
        })?;

        let mut entry = Self {
            id: EntryId::new(),
            lead_id,
            pipeline_id: *pipeline.id(),
            current_stage_id: None,
            entered_stage_at: now,
            enrollment_status: EnrollmentStatus::Active,
            health: StageHealth::Green,
            checklist_state: ChecklistState::new(),
            stage_note: String::new(),
            archive_reason: None,
            last_activity_at: now,
            stage_history: Vec::new(),
            version: 0,
            created_at: now,
            updated_at: now,
        };
        entry.enter_stage(
            *pipeline.id(),
            entry_stage,
            TransitionKind::Enrollment,
            TransitionOrigin::User,
            None,
            now,
        );
        entry.version = 1;
        Ok(entry)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn id(&self) -> &EntryId {
        &self.id
    }

    pub fn lead_id(&self) -> &LeadId {
        &self.lead_id
    }

    pub fn pipeline_id(&self) -> &PipelineId {
        &self.pipeline_id
    }

    pub fn current_stage_id(&self) -> Option<&StageId> {
        self.current_stage_id.as_ref()
    }

    pub fn entered_stage_at(&self) -> &Timestamp {
        &self.entered_stage_at
    }

    pub fn enrollment_status(&self) -> EnrollmentStatus {
        self.enrollment_status
    }

    pub fn is_active(&self) -> bool {
        self.enrollment_status == EnrollmentStatus::Active
    }

    /// Last computed health (cached, not recomputed on read).
    pub fn health(&self) -> StageHealth {
        self.health
    }

    pub fn checklist_state(&self) -> &ChecklistState {
        &self.checklist_state
    }

    pub fn is_item_checked(&self, item_id: &ChecklistItemId) -> bool {
        self.checklist_state.get(item_id).copied().unwrap_or(false)
    }

    pub fn stage_note(&self) -> &str {
        &self.stage_note
    }

    pub fn archive_reason(&self) -> Option<&str> {
        self.archive_reason.as_deref()
    }

    /// Last user-visible change (stage, checklist or note).
    pub fn last_activity_at(&self) -> &Timestamp {
        &self.last_activity_at
    }

    pub fn stage_history(&self) -> &[StageChange] {
        &self.stage_history
    }

    /// Optimistic concurrency token.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn created_at(&self) -> &Timestamp {
        &self.created_at
    }

    pub fn updated_at(&self) -> &Timestamp {
        &self.updated_at
    }

    /// Whole days spent in the current stage.
    pub fn days_in_stage(&self, now: Timestamp) -> i64 {
        now.whole_days_since(&self.entered_stage_at)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Stage transitions
    // ─────────────────────────────────────────────────────────────────────────

    /// One step forward, permitted only when the gate passed.
    ///
    /// # Errors
    ///
    /// - `InvalidTransition` if archived or `target` is not the next stage
    /// - `ChecklistIncomplete` if the gate rejected the move
    pub fn advance(
        &mut self,
        pipeline: &Pipeline,
        target: &StageId,
        gate: &GateDecision,
        now: Timestamp,
    ) -> Result<StageChange, PipelineError> {
        self.ensure_active()?;
        let current = self.current_position(pipeline)?;
        let next = pipeline.stages().get(current + 1).ok_or_else(|| {
            PipelineError::invalid_transition("entry is already in the final stage")
        })?;
        if &next.id != target {
            return Err(PipelineError::invalid_transition(
                "advance only moves to the next stage",
            ));
        }
        if !gate.can_advance {
            return Err(PipelineError::ChecklistIncomplete {
                missing_titles: gate.missing_titles.clone(),
                criteria_pending: gate.criteria_pending,
            });
        }

        Ok(self.enter_stage(
            *pipeline.id(),
            next,
            TransitionKind::Advance,
            TransitionOrigin::User,
            None,
            now,
        ))
    }

    /// Moves back to any earlier stage. Never gated.
    pub fn regress(
        &mut self,
        pipeline: &Pipeline,
        target: &StageId,
        now: Timestamp,
    ) -> Result<StageChange, PipelineError> {
        self.ensure_active()?;
        let current = self.current_position(pipeline)?;
        let (position, stage) = Self::locate(pipeline, target)?;
        if position >= current {
            return Err(PipelineError::invalid_transition(format!(
                "'{}' is not before the current stage",
                stage.name
            )));
        }

        Ok(self.enter_stage(
            *pipeline.id(),
            stage,
            TransitionKind::Regress,
            TransitionOrigin::User,
            None,
            now,
        ))
    }

    /// Moves forward to any later stage, skipping intermediates. Never gated.
    pub fn jump(
        &mut self,
        pipeline: &Pipeline,
        target: &StageId,
        now: Timestamp,
    ) -> Result<StageChange, PipelineError> {
        self.ensure_active()?;
        let current = self.current_position(pipeline)?;
        let (position, stage) = Self::locate(pipeline, target)?;
        if position <= current {
            return Err(PipelineError::invalid_transition(format!(
                "'{}' is not after the current stage",
                stage.name
            )));
        }

        Ok(self.enter_stage(
            *pipeline.id(),
            stage,
            TransitionKind::Jump,
            TransitionOrigin::User,
            None,
            now,
        ))
    }

    /// Ungated move to any other stage of the same pipeline.
    ///
    /// Works from an entry without a current stage as well.
    pub fn move_ungated(
        &mut self,
        pipeline: &Pipeline,
        target: &StageId,
        origin: TransitionOrigin,
        now: Timestamp,
    ) -> Result<StageChange, PipelineError> {
        self.ensure_active()?;
        self.ensure_pipeline(pipeline)?;
        let (_, stage) = Self::locate(pipeline, target)?;
        if self.current_stage_id.as_ref() == Some(target) {
            return Err(PipelineError::invalid_transition(format!(
                "entry is already in '{}'",
                stage.name
            )));
        }

        let kind = if origin.is_automation() {
            TransitionKind::AutomationMove
        } else {
            TransitionKind::Jump
        };
        Ok(self.enter_stage(*pipeline.id(), stage, kind, origin, None, now))
    }

    /// Reassigns the entry to another pipeline.
    ///
    /// # Errors
    ///
    /// - `Validation` if the reason is blank
    /// - `InvalidTransition` if archived, same pipeline, inactive pipeline,
    ///   or the target stage belongs elsewhere
    pub fn transfer(
        &mut self,
        new_pipeline: &Pipeline,
        target: &StageId,
        reason: &str,
        now: Timestamp,
    ) -> Result<StageChange, PipelineError> {
        self.ensure_active()?;
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(PipelineError::validation("reason", "a transfer reason is required"));
        }
        if new_pipeline.id() == &self.pipeline_id {
            return Err(PipelineError::invalid_transition(
                "transfer target is the current pipeline",
            ));
        }
        if !new_pipeline.is_active() {
            return Err(PipelineError::invalid_transition(format!(
                "pipeline '{}' is not active",
                new_pipeline.name()
            )));
        }
        let (_, stage) = Self::locate(new_pipeline, target)?;

        Ok(self.enter_stage(
            *new_pipeline.id(),
            stage,
            TransitionKind::Transfer,
            TransitionOrigin::User,
            Some(reason.to_string()),
            now,
        ))
    }

    /// Archives the entry. Returns `false` when it was already archived.
    pub fn archive(&mut self, reason: &str, now: Timestamp) -> bool {
        if self.enrollment_status.is_terminal() {
            return false;
        }
        self.enrollment_status = EnrollmentStatus::Archived;
        let reason = reason.trim();
        self.archive_reason = (!reason.is_empty()).then(|| reason.to_string());
        self.last_activity_at = now;
        self.touch(now);
        true
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Checklist, note, health
    // ─────────────────────────────────────────────────────────────────────────

    /// Records completion of a checklist item.
    pub fn set_checklist_item(
        &mut self,
        item_id: ChecklistItemId,
        checked: bool,
        now: Timestamp,
    ) -> Result<(), PipelineError> {
        self.ensure_active()?;
        self.checklist_state.insert(item_id, checked);
        self.last_activity_at = now;
        self.touch(now);
        Ok(())
    }

    /// Replaces the free-text note for the current stage.
    pub fn update_stage_note(
        &mut self,
        note: impl Into<String>,
        now: Timestamp,
    ) -> Result<(), PipelineError> {
        self.ensure_active()?;
        self.stage_note = note.into();
        self.last_activity_at = now;
        self.touch(now);
        Ok(())
    }

    /// Recomputes health and stores it only when it changed.
    ///
    /// Archived entries are never recomputed.
    pub fn refresh_health(&mut self, now: Timestamp, sla_days: u32) -> Option<HealthChange> {
        if !self.is_active() {
            return None;
        }
        let current = HealthCalculator::classify(now, self.entered_stage_at, sla_days);
        if current == self.health {
            return None;
        }
        let previous = std::mem::replace(&mut self.health, current);
        self.touch(now);
        Some(HealthChange { previous, current })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Private helpers
    // ─────────────────────────────────────────────────────────────────────────

    fn ensure_active(&self) -> Result<(), PipelineError> {
        if self.is_active() {
            Ok(())
        } else {
            Err(PipelineError::invalid_transition("entry is archived"))
        }
    }

    fn ensure_pipeline(&self, pipeline: &Pipeline) -> Result<(), PipelineError> {
        if pipeline.id() == &self.pipeline_id {
            Ok(())
        } else {
            Err(PipelineError::invalid_transition(format!(
                "entry does not belong to pipeline '{}'",
                pipeline.name()
            )))
        }
    }

    fn current_position(&self, pipeline: &Pipeline) -> Result<usize, PipelineError> {
        self.ensure_pipeline(pipeline)?;
        let stage_id = self
            .current_stage_id
            .ok_or_else(|| PipelineError::invalid_transition("entry has no current stage"))?;
        pipeline
            .position(&stage_id)
            .ok_or(PipelineError::StageNotFound(stage_id))
    }

    fn locate<'a>(
        pipeline: &'a Pipeline,
        target: &StageId,
    ) -> Result<(usize, &'a PipelineStage), PipelineError> {
        pipeline
            .position(target)
            .map(|pos| (pos, &pipeline.stages()[pos]))
            .ok_or_else(|| {
                PipelineError::invalid_transition(format!(
                    "stage {} is not part of pipeline '{}'",
                    target,
                    pipeline.name()
                ))
            })
    }

    fn enter_stage(
        &mut self,
        pipeline_id: PipelineId,
        stage: &PipelineStage,
        kind: TransitionKind,
        origin: TransitionOrigin,
        reason: Option<String>,
        now: Timestamp,
    ) -> StageChange {
        let change = StageChange {
            from_pipeline_id: self.pipeline_id,
            from_stage_id: self.current_stage_id,
            to_pipeline_id: pipeline_id,
            to_stage_id: stage.id,
            kind,
            origin,
            reason,
            changed_at: now,
        };

        self.pipeline_id = pipeline_id;
        self.current_stage_id = Some(stage.id);
        self.entered_stage_at = now;
        self.health = HealthCalculator::classify(now, now, stage.effective_sla_days());
        self.last_activity_at = now;
        if self.stage_history.len() >= MAX_STAGE_HISTORY {
            let excess = self.stage_history.len() + 1 - MAX_STAGE_HISTORY;
            self.stage_history.drain(..excess);
        }
        self.stage_history.push(change.clone());
        self.touch(now);
        change
    }

    fn touch(&mut self, now: Timestamp) {
        self.version += 1;
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::pipeline::checklist::{ChecklistGate, ChecklistItem};

    fn pipeline() -> Pipeline {
        let id = PipelineId::new();
        let stages = vec![
            PipelineStage::new(id, "New", 1),
            PipelineStage::new(id, "Qualified", 2).with_sla_days(10),
            PipelineStage::new(id, "Proposal", 3),
            PipelineStage::new(id, "Won", 4),
        ];
        Pipeline::new(id, "Sales", stages).unwrap()
    }

    fn stage_id(pipeline: &Pipeline, index: usize) -> StageId {
        pipeline.stages()[index].id
    }

    fn open_gate() -> GateDecision {
        GateDecision {
            can_advance: true,
            missing_titles: vec![],
            criteria_pending: false,
        }
    }

    fn enrolled(pipeline: &Pipeline) -> LeadPipelineEntry {
        LeadPipelineEntry::enroll(LeadId::new(), pipeline, Timestamp::now().minus_days(3)).unwrap()
    }

    #[test]
    fn enroll_places_entry_in_first_stage() {
        let pipeline = pipeline();
        let entry = enrolled(&pipeline);

        assert_eq!(entry.current_stage_id(), Some(&stage_id(&pipeline, 0)));
        assert!(entry.is_active());
        assert_eq!(entry.health(), StageHealth::Green);
        assert_eq!(entry.version(), 1);
        assert_eq!(entry.stage_history().len(), 1);
        assert_eq!(entry.stage_history()[0].kind, TransitionKind::Enrollment);
    }

    #[test]
    fn stage_history_keeps_only_the_most_recent_changes() {
        let pipeline = pipeline();
        let mut entry = enrolled(&pipeline);
        let origin = TransitionOrigin::Automation {
            rule_id: RuleId::new(),
        };

        for round in 0..MAX_STAGE_HISTORY + 20 {
            let target = stage_id(&pipeline, 1 + round % 3);
            entry
                .move_ungated(&pipeline, &target, origin, Timestamp::now())
                .unwrap();
        }

        let history = entry.stage_history();
        assert_eq!(history.len(), MAX_STAGE_HISTORY);
        assert!(history.iter().all(|c| c.kind == TransitionKind::AutomationMove));
        assert_eq!(
            history.last().unwrap().to_stage_id,
            *entry.current_stage_id().unwrap()
        );
    }

    #[test]
    fn enroll_rejects_inactive_pipeline() {
        let pipeline = pipeline().deactivated();
        let result = LeadPipelineEntry::enroll(LeadId::new(), &pipeline, Timestamp::now());
        assert!(matches!(result, Err(PipelineError::InvalidTransition(_))));
    }

    #[test]
    fn advance_resets_timestamp_and_health() {
        let pipeline = pipeline();
        let mut entry = enrolled(&pipeline);
        entry.refresh_health(Timestamp::now().plus_days(30), 7);
        assert_eq!(entry.health(), StageHealth::Red);

        let now = Timestamp::now();
        let change = entry
            .advance(&pipeline, &stage_id(&pipeline, 1), &open_gate(), now)
            .unwrap();

        assert_eq!(entry.entered_stage_at(), &now);
        assert_eq!(entry.health(), StageHealth::Green);
        assert_eq!(change.kind, TransitionKind::Advance);
        assert_eq!(change.from_stage_id, Some(stage_id(&pipeline, 0)));
    }

    #[test]
    fn advance_requires_next_stage() {
        let pipeline = pipeline();
        let mut entry = enrolled(&pipeline);
        let result = entry.advance(&pipeline, &stage_id(&pipeline, 2), &open_gate(), Timestamp::now());
        assert!(matches!(result, Err(PipelineError::InvalidTransition(_))));
    }

    #[test]
    fn advance_is_blocked_by_gate() {
        let pipeline = pipeline();
        let mut entry = enrolled(&pipeline);
        let first = &pipeline.stages()[0];
        let item = ChecklistItem::required(first.id, "Call scheduled", 1);
        let gate = ChecklistGate::evaluate(first, &[item], entry.checklist_state(), false);

        let result = entry.advance(&pipeline, &stage_id(&pipeline, 1), &gate, Timestamp::now());

        assert_eq!(
            result,
            Err(PipelineError::ChecklistIncomplete {
                missing_titles: vec!["Call scheduled".to_string()],
                criteria_pending: false,
            })
        );
        assert_eq!(entry.current_stage_id(), Some(&stage_id(&pipeline, 0)));
    }

    #[test]
    fn checklist_state_survives_stage_change() {
        let pipeline = pipeline();
        let mut entry = enrolled(&pipeline);
        let item = ChecklistItemId::new();
        entry.set_checklist_item(item, true, Timestamp::now()).unwrap();

        entry
            .advance(&pipeline, &stage_id(&pipeline, 1), &open_gate(), Timestamp::now())
            .unwrap();

        assert!(entry.is_item_checked(&item));
    }

    #[test]
    fn regress_only_moves_backward() {
        let pipeline = pipeline();
        let mut entry = enrolled(&pipeline);
        entry.jump(&pipeline, &stage_id(&pipeline, 2), Timestamp::now()).unwrap();

        assert!(entry.regress(&pipeline, &stage_id(&pipeline, 3), Timestamp::now()).is_err());
        let change = entry.regress(&pipeline, &stage_id(&pipeline, 0), Timestamp::now()).unwrap();
        assert_eq!(change.kind, TransitionKind::Regress);
        assert_eq!(entry.current_stage_id(), Some(&stage_id(&pipeline, 0)));
    }

    #[test]
    fn jump_skips_intermediate_stages_without_gate() {
        let pipeline = pipeline();
        let mut entry = enrolled(&pipeline);
        entry.jump(&pipeline, &stage_id(&pipeline, 3), Timestamp::now()).unwrap();
        assert_eq!(entry.current_stage_id(), Some(&stage_id(&pipeline, 3)));
        assert!(entry.jump(&pipeline, &stage_id(&pipeline, 1), Timestamp::now()).is_err());
    }

    #[test]
    fn move_ungated_records_automation_origin() {
        let pipeline = pipeline();
        let mut entry = enrolled(&pipeline);
        let rule_id = RuleId::new();

        let change = entry
            .move_ungated(
                &pipeline,
                &stage_id(&pipeline, 2),
                TransitionOrigin::Automation { rule_id },
                Timestamp::now(),
            )
            .unwrap();

        assert_eq!(change.kind, TransitionKind::AutomationMove);
        assert_eq!(change.origin, TransitionOrigin::Automation { rule_id });
    }

    #[test]
    fn move_ungated_to_current_stage_is_rejected() {
        let pipeline = pipeline();
        let mut entry = enrolled(&pipeline);
        let result = entry.move_ungated(
            &pipeline,
            &stage_id(&pipeline, 0),
            TransitionOrigin::User,
            Timestamp::now(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn move_ungated_rejects_foreign_stage() {
        let pipeline = pipeline();
        let other = self::pipeline();
        let mut entry = enrolled(&pipeline);
        let result = entry.move_ungated(
            &pipeline,
            &stage_id(&other, 1),
            TransitionOrigin::User,
            Timestamp::now(),
        );
        assert!(matches!(result, Err(PipelineError::InvalidTransition(_))));
    }

    #[test]
    fn transfer_requires_reason() {
        let pipeline = pipeline();
        let other = self::pipeline();
        let mut entry = enrolled(&pipeline);
        let result = entry.transfer(&other, &stage_id(&other, 0), "  ", Timestamp::now());
        assert!(matches!(result, Err(PipelineError::Validation { .. })));
    }

    #[test]
    fn transfer_moves_to_new_pipeline() {
        let pipeline = pipeline();
        let other = self::pipeline();
        let mut entry = enrolled(&pipeline);

        let change = entry
            .transfer(&other, &stage_id(&other, 1), "Upsell team", Timestamp::now())
            .unwrap();

        assert_eq!(entry.pipeline_id(), other.id());
        assert_eq!(entry.current_stage_id(), Some(&stage_id(&other, 1)));
        assert_eq!(change.reason.as_deref(), Some("Upsell team"));
        assert_eq!(change.from_pipeline_id, *pipeline.id());
    }

    #[test]
    fn transfer_to_same_pipeline_is_rejected() {
        let pipeline = pipeline();
        let mut entry = enrolled(&pipeline);
        let result = entry.transfer(&pipeline, &stage_id(&pipeline, 1), "why", Timestamp::now());
        assert!(matches!(result, Err(PipelineError::InvalidTransition(_))));
    }

    #[test]
    fn archive_twice_yields_same_state() {
        let pipeline = pipeline();
        let mut entry = enrolled(&pipeline);

        assert!(entry.archive("Lost to competitor", Timestamp::now()));
        let after_first = entry.clone();
        assert!(!entry.archive("Again", Timestamp::now()));

        assert_eq!(entry, after_first);
        assert_eq!(entry.enrollment_status(), EnrollmentStatus::Archived);
        assert_eq!(entry.archive_reason(), Some("Lost to competitor"));
    }

    #[test]
    fn archived_entry_rejects_transitions_and_health() {
        let pipeline = pipeline();
        let mut entry = enrolled(&pipeline);
        entry.archive("done", Timestamp::now());

        assert!(entry.jump(&pipeline, &stage_id(&pipeline, 2), Timestamp::now()).is_err());
        assert!(entry.set_checklist_item(ChecklistItemId::new(), true, Timestamp::now()).is_err());
        assert!(entry.refresh_health(Timestamp::now().plus_days(90), 7).is_none());
        assert_eq!(entry.health(), StageHealth::Green);
    }

    #[test]
    fn refresh_health_reports_only_changes() {
        let pipeline = pipeline();
        let mut entry = enrolled(&pipeline);
        let version = entry.version();
        let now = *entry.entered_stage_at();

        assert!(entry.refresh_health(now.plus_days(1), 10).is_none());
        assert_eq!(entry.version(), version);

        let change = entry.refresh_health(now.plus_days(9), 10).unwrap();
        assert_eq!(change.previous, StageHealth::Green);
        assert_eq!(change.current, StageHealth::Yellow);
        assert_eq!(entry.version(), version + 1);

        assert!(entry.refresh_health(now.plus_days(9), 10).is_none());
    }

    #[test]
    fn note_and_checklist_update_activity() {
        let pipeline = pipeline();
        let mut entry = enrolled(&pipeline);
        let now = Timestamp::now();
        entry.update_stage_note("Waiting on legal", now).unwrap();
        assert_eq!(entry.stage_note(), "Waiting on legal");
        assert_eq!(entry.last_activity_at(), &now);
    }

    #[test]
    fn archived_status_is_terminal() {
        assert!(EnrollmentStatus::Archived.is_terminal());
        assert!(EnrollmentStatus::Active.can_transition_to(&EnrollmentStatus::Archived));
    }
}
