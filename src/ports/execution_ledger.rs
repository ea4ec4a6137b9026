//! Execution ledger port.
//!
//! Audit trail of rule runs. Records are upserted as they progress and
//! never deleted.

use async_trait::async_trait;

use crate::domain::automation::AutomationExecution;
use crate::domain::foundation::{DomainError, ExecutionId, LeadId, RuleId};

#[async_trait]
pub trait ExecutionLedger: Send + Sync {
    /// Insert or overwrite the record with the same id.
    ///
    /// # Errors
    ///
    /// - `InvalidStateTransition` when overwriting a finished record
    async fn record(&self, execution: &AutomationExecution) -> Result<(), DomainError>;

    /// Returns `None` if not found.
    async fn find_by_id(
        &self,
        id: &ExecutionId,
    ) -> Result<Option<AutomationExecution>, DomainError>;

    /// Executions for a lead, oldest first.
    async fn list_by_lead(&self, lead_id: &LeadId)
        -> Result<Vec<AutomationExecution>, DomainError>;

    /// Executions of a rule, oldest first.
    async fn list_by_rule(&self, rule_id: &RuleId)
        -> Result<Vec<AutomationExecution>, DomainError>;
}
