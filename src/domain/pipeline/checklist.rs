//! Stage checklists and the exit gate evaluated before a user advance.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::stage::PipelineStage;
use crate::domain::foundation::{ChecklistItemId, StageId};

/// A task attached to a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub id: ChecklistItemId,
    pub stage_id: StageId,
    pub title: String,
    pub order_index: i32,
    pub required: bool,
}

impl ChecklistItem {
    pub fn required(stage_id: StageId, title: impl Into<String>, order_index: i32) -> Self {
        Self {
            id: ChecklistItemId::new(),
            stage_id,
            title: title.into(),
            order_index,
            required: true,
        }
    }

    pub fn optional(stage_id: StageId, title: impl Into<String>, order_index: i32) -> Self {
        Self {
            required: false,
            ..Self::required(stage_id, title, order_index)
        }
    }
}

/// Per-entry completion map. Keys from earlier stages stay but are ignored.
pub type ChecklistState = HashMap<ChecklistItemId, bool>;

/// Outcome of evaluating the exit gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateDecision {
    pub can_advance: bool,
    /// Titles of unchecked required items, in checklist order.
    pub missing_titles: Vec<String>,
    /// Exit criteria that still need acknowledgement.
    pub criteria_pending: bool,
}

/// Evaluates whether an entry may leave its current stage.
pub struct ChecklistGate;

impl ChecklistGate {
    /// Checks required items and the exit criteria acknowledgement.
    ///
    /// Only `required` items matter. Exit criteria count only when the
    /// stage declares non-blank text.
    pub fn evaluate(
        stage: &PipelineStage,
        items: &[ChecklistItem],
        state: &ChecklistState,
        criteria_acknowledged: bool,
    ) -> GateDecision {
        let mut required: Vec<&ChecklistItem> = items.iter().filter(|i| i.required).collect();
        required.sort_by_key(|i| i.order_index);

        let missing_titles: Vec<String> = required
            .iter()
            .filter(|item| !state.get(&item.id).copied().unwrap_or(false))
            .map(|item| item.title.clone())
            .collect();

        let criteria_pending = stage.exit_criteria_text().is_some() && !criteria_acknowledged;

        GateDecision {
            can_advance: missing_titles.is_empty() && !criteria_pending,
            missing_titles,
            criteria_pending,
        }
    }
}
