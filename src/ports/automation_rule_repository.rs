//! Automation rule repository port.
//!
//! The rule collection is persisted as a unit. Readers always observe
//! either the previous or the next full collection.

use async_trait::async_trait;

use crate::domain::automation::AutomationRule;
use crate::domain::foundation::{DomainError, RuleId};

#[async_trait]
pub trait AutomationRuleRepository: Send + Sync {
    /// All rules in store (insertion) order.
    async fn load_all(&self) -> Result<Vec<AutomationRule>, DomainError>;

    /// Returns `None` if not found.
    async fn find_by_id(&self, id: &RuleId) -> Result<Option<AutomationRule>, DomainError>;

    /// Replaces the whole collection.
    async fn replace_all(&self, rules: Vec<AutomationRule>) -> Result<(), DomainError>;
}
