//! Pipeline and stage definitions.
//!
//! Stage management (create/rename/reorder) lives outside this crate;
//! these types are the read model the engine consumes.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::health::DEFAULT_SLA_DAYS;
use crate::domain::foundation::{PipelineId, StageId, ValidationError};

/// Furthest ahead an automated appointment may be booked.
pub const MAX_APPOINTMENT_OFFSET_HOURS: i64 = 24 * 366;

/// Longest automated appointment.
pub const MAX_APPOINTMENT_MINUTES: i64 = 7 * 24 * 60;

/// Checks appointment lead time and length against the supported range.
pub fn validate_appointment_timing(
    offset_hours: Option<i64>,
    duration_minutes: Option<i64>,
) -> Result<(), ValidationError> {
    if let Some(hours) = offset_hours {
        if !(0..=MAX_APPOINTMENT_OFFSET_HOURS).contains(&hours) {
            return Err(ValidationError::out_of_range(
                "offset_hours",
                0,
                MAX_APPOINTMENT_OFFSET_HOURS,
                hours,
            ));
        }
    }
    if let Some(minutes) = duration_minutes {
        if !(1..=MAX_APPOINTMENT_MINUTES).contains(&minutes) {
            return Err(ValidationError::out_of_range(
                "duration_minutes",
                1,
                MAX_APPOINTMENT_MINUTES,
                minutes,
            ));
        }
    }
    Ok(())
}

/// Appointment to propose when a lead sits in a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentTemplate {
    pub title: String,
    /// Hours after "now" the appointment should start.
    #[serde(default = "default_offset_hours")]
    pub offset_hours: i64,
    #[serde(default = "default_duration_minutes")]
    pub duration_minutes: i64,
}

impl AppointmentTemplate {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::empty_field("appointment_template.title"));
        }
        validate_appointment_timing(Some(self.offset_hours), Some(self.duration_minutes))
    }
}

fn default_offset_hours() -> i64 {
    24
}

fn default_duration_minutes() -> i64 {
    60
}

/// One ordered step of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStage {
    pub id: StageId,
    pub pipeline_id: PipelineId,
    pub name: String,
    pub order_index: i32,
    /// Days a lead may stay before the stage is overdue.
    pub sla_days: Option<u32>,
    pub exit_criteria: Option<String>,
    pub appointment_template: Option<AppointmentTemplate>,
}

impl PipelineStage {
    /// Creates a stage with no SLA override, exit criteria or template.
    pub fn new(pipeline_id: PipelineId, name: impl Into<String>, order_index: i32) -> Self {
        Self {
            id: StageId::new(),
            pipeline_id,
            name: name.into(),
            order_index,
            sla_days: None,
            exit_criteria: None,
            appointment_template: None,
        }
    }

    pub fn with_sla_days(mut self, days: u32) -> Self {
        self.sla_days = Some(days);
        self
    }

    pub fn with_exit_criteria(mut self, criteria: impl Into<String>) -> Self {
        self.exit_criteria = Some(criteria.into());
        self
    }

    pub fn with_appointment_template(mut self, template: AppointmentTemplate) -> Self {
        self.appointment_template = Some(template);
        self
    }

    /// SLA in days, falling back to the default when unset or zero.
    pub fn effective_sla_days(&self) -> u32 {
        match self.sla_days {
            Some(days) if days > 0 => days,
            _ => DEFAULT_SLA_DAYS,
        }
    }

    /// Exit criteria text, ignoring blank values.
    pub fn exit_criteria_text(&self) -> Option<&str> {
        self.exit_criteria
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }
}

/// A sales pipeline and its ordered stages.
///
/// # Invariants
///
/// - `stages` sorted ascending by `order_index`, indexes unique
/// - every stage belongs to this pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    id: PipelineId,
    name: String,
    active: bool,
    stages: Vec<PipelineStage>,
}

impl Pipeline {
    /// Builds a pipeline, sorting the stages by order index.
    ///
    /// # Errors
    ///
    /// - `EmptyField` if the name is blank
    /// - `InvalidFormat` on duplicate order indexes or foreign stages
    /// - `EmptyField` / `OutOfRange` from a stage's appointment template
    pub fn new(
        id: PipelineId,
        name: impl Into<String>,
        mut stages: Vec<PipelineStage>,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ValidationError::empty_field("name"));
        }

        let mut seen = HashSet::new();
        for stage in &stages {
            if stage.pipeline_id != id {
                return Err(ValidationError::invalid_format(
                    "stages",
                    format!("stage '{}' belongs to another pipeline", stage.name),
                ));
            }
            if !seen.insert(stage.order_index) {
                return Err(ValidationError::invalid_format(
                    "stages",
                    format!("duplicate order index {}", stage.order_index),
                ));
            }
            if let Some(template) = &stage.appointment_template {
                template.validate()?;
            }
        }

        stages.sort_by_key(|s| s.order_index);
        Ok(Self {
            id,
            name,
            active: true,
            stages,
        })
    }

    pub fn deactivated(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn id(&self) -> &PipelineId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn stages(&self) -> &[PipelineStage] {
        &self.stages
    }

    /// The stage with the lowest order index.
    pub fn entry_stage(&self) -> Option<&PipelineStage> {
        self.stages.first()
    }

    pub fn stage(&self, id: &StageId) -> Option<&PipelineStage> {
        self.stages.iter().find(|s| &s.id == id)
    }

    /// Position of a stage in the ordered list.
    pub fn position(&self, id: &StageId) -> Option<usize> {
        self.stages.iter().position(|s| &s.id == id)
    }

    /// The stage immediately after `id`, if any.
    pub fn next_after(&self, id: &StageId) -> Option<&PipelineStage> {
        self.position(id).and_then(|pos| self.stages.get(pos + 1))
    }
}
