//! In-memory execution ledger.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::automation::AutomationExecution;
use crate::domain::foundation::{DomainError, ErrorCode, ExecutionId, LeadId, RuleId};
use crate::ports::ExecutionLedger;

/// Append-mostly ledger; records keep their first-insert position.
#[derive(Debug, Clone, Default)]
pub struct InMemoryExecutionLedger {
    executions: Arc<RwLock<Vec<AutomationExecution>>>,
}

impl InMemoryExecutionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every record, oldest first.
    pub async fn all(&self) -> Vec<AutomationExecution> {
        self.executions.read().await.clone()
    }
}

#[async_trait]
impl ExecutionLedger for InMemoryExecutionLedger {
    async fn record(&self, execution: &AutomationExecution) -> Result<(), DomainError> {
        let mut executions = self.executions.write().await;
        match executions.iter_mut().find(|e| e.id() == execution.id()) {
            Some(existing) if existing.is_finished() => Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!("Execution {} is already {}", existing.id(), existing.status()),
            )),
            Some(existing) => {
                *existing = execution.clone();
                Ok(())
            }
            None => {
                executions.push(execution.clone());
                Ok(())
            }
        }
    }

    async fn find_by_id(
        &self,
        id: &ExecutionId,
    ) -> Result<Option<AutomationExecution>, DomainError> {
        Ok(self.executions.read().await.iter().find(|e| e.id() == id).cloned())
    }

    async fn list_by_lead(
        &self,
        lead_id: &LeadId,
    ) -> Result<Vec<AutomationExecution>, DomainError> {
        Ok(self
            .executions
            .read()
            .await
            .iter()
            .filter(|e| e.lead_id() == lead_id)
            .cloned()
            .collect())
    }

    async fn list_by_rule(
        &self,
        rule_id: &RuleId,
    ) -> Result<Vec<AutomationExecution>, DomainError> {
        Ok(self
            .executions
            .read()
            .await
            .iter()
            .filter(|e| e.rule_id() == rule_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::automation::{
        AutomationRule, ExecutionStatus, RuleDefinition, Trigger, TriggerEvent, TriggerType,
    };
    use crate::domain::foundation::Timestamp;

    fn execution(lead: LeadId) -> AutomationExecution {
        let rule = AutomationRule::create(
            RuleDefinition::new("r", Trigger::new(TriggerType::Inactivity), vec![]),
            Timestamp::now(),
        )
        .unwrap();
        AutomationExecution::pending(
            &rule,
            &TriggerEvent::new(TriggerType::Inactivity, lead),
            Timestamp::now(),
        )
    }

    #[tokio::test]
    async fn record_upserts_until_finished() {
        let ledger = InMemoryExecutionLedger::new();
        let mut exec = execution(LeadId::new());
        ledger.record(&exec).await.unwrap();

        exec.start().unwrap();
        ledger.record(&exec).await.unwrap();
        exec.complete(Timestamp::now()).unwrap();
        ledger.record(&exec).await.unwrap();

        let stored = ledger.find_by_id(exec.id()).await.unwrap().unwrap();
        assert_eq!(stored.status(), ExecutionStatus::Completed);
        assert_eq!(ledger.all().await.len(), 1);

        let err = ledger.record(&exec).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidStateTransition);
    }

    #[tokio::test]
    async fn lists_by_lead() {
        let ledger = InMemoryExecutionLedger::new();
        let lead = LeadId::new();
        ledger.record(&execution(lead)).await.unwrap();
        ledger.record(&execution(LeadId::new())).await.unwrap();

        assert_eq!(ledger.list_by_lead(&lead).await.unwrap().len(), 1);
    }
}
