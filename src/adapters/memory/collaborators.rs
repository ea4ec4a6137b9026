//! In-memory stand-ins for lead, calendar and notification collaborators.
//!
//! Each records what it was asked to do and logs it.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::automation::ContextValue;
use crate::domain::foundation::{AppointmentId, DomainError, LeadId, UserId};
use crate::ports::{
    AppointmentRequest, AppointmentScheduler, LeadFieldWriter, Notification, NotificationSink,
};

/// Lead fields and assignments kept in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLeadFields {
    fields: Arc<RwLock<HashMap<LeadId, BTreeMap<String, ContextValue>>>>,
    assignees: Arc<RwLock<HashMap<LeadId, UserId>>>,
}

impl InMemoryLeadFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn field(&self, lead_id: &LeadId, field: &str) -> Option<ContextValue> {
        self.fields
            .read()
            .await
            .get(lead_id)
            .and_then(|fields| fields.get(field).cloned())
    }

    pub async fn assignee(&self, lead_id: &LeadId) -> Option<UserId> {
        self.assignees.read().await.get(lead_id).cloned()
    }
}

#[async_trait]
impl LeadFieldWriter for InMemoryLeadFields {
    async fn update_field(
        &self,
        lead_id: &LeadId,
        field: &str,
        value: &ContextValue,
    ) -> Result<(), DomainError> {
        tracing::info!(%lead_id, field, value = %value, "lead field updated");
        self.fields
            .write()
            .await
            .entry(*lead_id)
            .or_default()
            .insert(field.to_string(), value.clone());
        Ok(())
    }

    async fn assign_user(&self, lead_id: &LeadId, user_id: &UserId) -> Result<(), DomainError> {
        tracing::info!(%lead_id, %user_id, "lead assigned");
        self.assignees.write().await.insert(*lead_id, user_id.clone());
        Ok(())
    }
}

/// Appointment book kept in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAppointmentBook {
    appointments: Arc<RwLock<Vec<(AppointmentId, AppointmentRequest)>>>,
}

impl InMemoryAppointmentBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn appointments(&self) -> Vec<(AppointmentId, AppointmentRequest)> {
        self.appointments.read().await.clone()
    }
}

#[async_trait]
impl AppointmentScheduler for InMemoryAppointmentBook {
    async fn create_appointment(
        &self,
        request: AppointmentRequest,
    ) -> Result<AppointmentId, DomainError> {
        let id = AppointmentId::new();
        tracing::info!(
            appointment_id = %id,
            lead_id = %request.lead_id,
            start_at = %request.start_at,
            source_rule = %request.source_rule,
            "appointment created"
        );
        self.appointments.write().await.push((id, request));
        Ok(id)
    }
}

/// Notification outbox kept in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotificationSink {
    sent: Arc<RwLock<Vec<Notification>>>,
}

impl InMemoryNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<Notification> {
        self.sent.read().await.clone()
    }
}

#[async_trait]
impl NotificationSink for InMemoryNotificationSink {
    async fn send(&self, notification: Notification) -> Result<(), DomainError> {
        tracing::info!(
            lead_id = %notification.lead_id,
            priority = %notification.priority,
            title = %notification.title,
            "notification queued"
        );
        self.sent.write().await.push(notification);
        Ok(())
    }
}
