//! Appointment scheduler port.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{AppointmentId, DomainError, LeadId, Timestamp};

/// An appointment to create for a lead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentRequest {
    pub lead_id: LeadId,
    pub start_at: Timestamp,
    pub end_at: Timestamp,
    pub title: String,
    /// Name of the rule that requested it.
    pub source_rule: String,
}

/// Creates appointments. Reminder delivery is the collaborator's concern.
#[async_trait]
pub trait AppointmentScheduler: Send + Sync {
    async fn create_appointment(
        &self,
        request: AppointmentRequest,
    ) -> Result<AppointmentId, DomainError>;
}
