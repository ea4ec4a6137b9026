//! In-memory automation rule repository.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::automation::AutomationRule;
use crate::domain::foundation::{DomainError, RuleId};
use crate::ports::AutomationRuleRepository;

/// Rule collection swapped as a whole under one write lock.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAutomationRuleRepository {
    rules: Arc<RwLock<Vec<AutomationRule>>>,
}

impl InMemoryAutomationRuleRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(rules: Vec<AutomationRule>) -> Self {
        Self {
            rules: Arc::new(RwLock::new(rules)),
        }
    }
}

#[async_trait]
impl AutomationRuleRepository for InMemoryAutomationRuleRepository {
    async fn load_all(&self) -> Result<Vec<AutomationRule>, DomainError> {
        Ok(self.rules.read().await.clone())
    }

    async fn find_by_id(&self, id: &RuleId) -> Result<Option<AutomationRule>, DomainError> {
        Ok(self.rules.read().await.iter().find(|r| &r.id == id).cloned())
    }

    async fn replace_all(&self, rules: Vec<AutomationRule>) -> Result<(), DomainError> {
        *self.rules.write().await = rules;
        Ok(())
    }
}
