//! Notification sink port.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::automation::NotificationPriority;
use crate::domain::foundation::{DomainError, LeadId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub lead_id: LeadId,
    pub priority: NotificationPriority,
    pub title: String,
    pub message: String,
}

/// Accepts notifications; delivery channels are out of scope.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, notification: Notification) -> Result<(), DomainError>;
}
