//! Lead field writer port.
//!
//! Lead records live outside the engine; automation may patch single
//! fields and the responsible party.

use async_trait::async_trait;

use crate::domain::automation::ContextValue;
use crate::domain::foundation::{DomainError, LeadId, UserId};

#[async_trait]
pub trait LeadFieldWriter: Send + Sync {
    /// Sets one named field on the lead.
    async fn update_field(
        &self,
        lead_id: &LeadId,
        field: &str,
        value: &ContextValue,
    ) -> Result<(), DomainError>;

    /// Sets the lead's responsible party.
    async fn assign_user(&self, lead_id: &LeadId, user_id: &UserId) -> Result<(), DomainError>;
}
