//! AutomationRuleStore - CRUD over the rule collection.
//!
//! The repository persists the whole collection as a unit, so every
//! mutation is a read-modify-replace serialized by a store-wide lock.

use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::domain::automation::{AutomationError, AutomationRule, RuleDefinition};
use crate::domain::foundation::{RuleId, Timestamp};
use crate::ports::AutomationRuleRepository;

/// Shape of an importable rule document.
#[derive(Debug, Deserialize)]
struct RuleImport {
    #[serde(default)]
    rules: Vec<RuleDefinition>,
}

pub struct AutomationRuleStore {
    repository: Arc<dyn AutomationRuleRepository>,
    write_lock: Mutex<()>,
}

impl AutomationRuleStore {
    pub fn new(repository: Arc<dyn AutomationRuleRepository>) -> Self {
        Self {
            repository,
            write_lock: Mutex::new(()),
        }
    }

    /// Appends a new rule with a generated id.
    pub async fn create(&self, definition: RuleDefinition) -> Result<AutomationRule, AutomationError> {
        let _guard = self.write_lock.lock().await;
        let mut rules = self.repository.load_all().await?;

        let rule = AutomationRule::create(definition, Timestamp::now())?;
        rules.push(rule.clone());
        self.repository.replace_all(rules).await?;

        tracing::info!(rule_id = %rule.id, name = rule.name(), "automation rule created");
        Ok(rule)
    }

    /// Replaces a rule's definition in place.
    pub async fn update(
        &self,
        id: &RuleId,
        definition: RuleDefinition,
    ) -> Result<AutomationRule, AutomationError> {
        let _guard = self.write_lock.lock().await;
        let mut rules = self.repository.load_all().await?;

        let rule = rules
            .iter_mut()
            .find(|r| &r.id == id)
            .ok_or(AutomationError::RuleNotFound(*id))?;
        rule.redefine(definition, Timestamp::now())?;
        let updated = rule.clone();

        self.repository.replace_all(rules).await?;
        tracing::info!(rule_id = %id, "automation rule updated");
        Ok(updated)
    }

    pub async fn delete(&self, id: &RuleId) -> Result<(), AutomationError> {
        let _guard = self.write_lock.lock().await;
        let mut rules = self.repository.load_all().await?;

        let before = rules.len();
        rules.retain(|r| &r.id != id);
        if rules.len() == before {
            return Err(AutomationError::RuleNotFound(*id));
        }

        self.repository.replace_all(rules).await?;
        tracing::info!(rule_id = %id, "automation rule deleted");
        Ok(())
    }

    pub async fn get(&self, id: &RuleId) -> Result<AutomationRule, AutomationError> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or(AutomationError::RuleNotFound(*id))
    }

    /// All rules in store order.
    pub async fn list(&self) -> Result<Vec<AutomationRule>, AutomationError> {
        Ok(self.repository.load_all().await?)
    }

    pub async fn set_enabled(
        &self,
        id: &RuleId,
        enabled: bool,
    ) -> Result<AutomationRule, AutomationError> {
        let _guard = self.write_lock.lock().await;
        let mut rules = self.repository.load_all().await?;

        let rule = rules
            .iter_mut()
            .find(|r| &r.id == id)
            .ok_or(AutomationError::RuleNotFound(*id))?;
        rule.set_enabled(enabled, Timestamp::now());
        let updated = rule.clone();

        self.repository.replace_all(rules).await?;
        tracing::info!(rule_id = %id, enabled, "automation rule toggled");
        Ok(updated)
    }

    /// Appends every rule of a YAML document (`rules: [...]`).
    ///
    /// All definitions are validated before anything is stored; one bad
    /// definition rejects the whole document.
    pub async fn import_yaml(&self, yaml: &str) -> Result<Vec<AutomationRule>, AutomationError> {
        let import: RuleImport =
            serde_yaml::from_str(yaml).map_err(|e| AutomationError::Validation {
                field: "rules".to_string(),
                message: e.to_string(),
            })?;

        let now = Timestamp::now();
        let imported = import
            .rules
            .into_iter()
            .map(|definition| AutomationRule::create(definition, now))
            .collect::<Result<Vec<_>, _>>()?;

        let _guard = self.write_lock.lock().await;
        let mut rules = self.repository.load_all().await?;
        rules.extend(imported.iter().cloned());
        self.repository.replace_all(rules).await?;

        tracing::info!(count = imported.len(), "automation rules imported");
        Ok(imported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryAutomationRuleRepository;
    use crate::domain::automation::{Action, NotificationPriority, Trigger, TriggerType};

    fn store() -> AutomationRuleStore {
        AutomationRuleStore::new(Arc::new(InMemoryAutomationRuleRepository::new()))
    }

    fn definition(name: &str) -> RuleDefinition {
        RuleDefinition::new(
            name,
            Trigger::new(TriggerType::Inactivity),
            vec![Action::SendNotification {
                priority: NotificationPriority::High,
                title: "Stale lead".into(),
                message: "No activity".into(),
            }],
        )
    }

    #[tokio::test]
    async fn create_appends_in_order() {
        let store = store();

        store.create(definition("first")).await.unwrap();
        store.create(definition("second")).await.unwrap();

        let names: Vec<String> = store
            .list()
            .await
            .unwrap()
            .iter()
            .map(|r| r.name().to_string())
            .collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn update_keeps_identity_and_position() {
        let store = store();
        let first = store.create(definition("first")).await.unwrap();
        store.create(definition("second")).await.unwrap();

        let updated = store
            .update(&first.id, definition("renamed").with_priority(4))
            .await
            .unwrap();

        assert_eq!(updated.id, first.id);
        assert_eq!(updated.created_at, first.created_at);
        let rules = store.list().await.unwrap();
        assert_eq!(rules[0].name(), "renamed");
        assert_eq!(rules[0].priority(), 4);
    }

    #[tokio::test]
    async fn missing_ids_are_rule_not_found() {
        let store = store();
        let missing = RuleId::new();

        assert_eq!(
            store.get(&missing).await.unwrap_err(),
            AutomationError::RuleNotFound(missing)
        );
        assert_eq!(
            store.delete(&missing).await.unwrap_err(),
            AutomationError::RuleNotFound(missing)
        );
        assert!(store.update(&missing, definition("x")).await.is_err());
        assert!(store.set_enabled(&missing, false).await.is_err());
    }

    #[tokio::test]
    async fn delete_and_toggle() {
        let store = store();
        let a = store.create(definition("a")).await.unwrap();
        let b = store.create(definition("b")).await.unwrap();

        store.delete(&a.id).await.unwrap();
        let toggled = store.set_enabled(&b.id, false).await.unwrap();

        assert!(!toggled.is_enabled());
        assert_eq!(store.list().await.unwrap().len(), 1);
        assert!(!store.get(&b.id).await.unwrap().is_enabled());
    }

    #[tokio::test]
    async fn create_rejects_blank_name() {
        let store = store();

        let result = store.create(definition("  ")).await;

        assert!(matches!(result, Err(AutomationError::Validation { .. })));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn import_yaml_appends_all_rules() {
        let store = store();
        let yaml = r#"
rules:
  - name: Qualified follow-up
    priority: 5
    trigger:
      type: stage_change
      conditions:
        to_stage: Qualified
    actions:
      - type: create_appointment
        title: Discovery call
        offset_hours: 48
  - name: Idle alert
    trigger:
      type: inactivity
      conditions:
        days_inactive:
          operator: greater_than
          value: 10
    actions:
      - type: send_notification
        priority: urgent
        title: Idle lead
        message: Follow up now
"#;

        let imported = store.import_yaml(yaml).await.unwrap();

        assert_eq!(imported.len(), 2);
        assert_eq!(imported[0].priority(), 5);
        assert_eq!(imported[1].trigger().trigger_type, TriggerType::Inactivity);
        assert_eq!(store.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn import_yaml_is_all_or_nothing() {
        let store = store();
        let yaml = "rules:\n  - name: ok\n    trigger:\n      type: inactivity\n  - name: ''\n    trigger:\n      type: inactivity\n";

        let result = store.import_yaml(yaml).await;

        assert!(result.is_err());
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn import_yaml_rejects_unbounded_appointment_offset() {
        let store = store();
        let yaml = r#"
rules:
  - name: Far future call
    trigger:
      type: inactivity
    actions:
      - type: create_appointment
        offset_hours: 9223372036854775807
"#;

        let result = store.import_yaml(yaml).await;

        assert!(matches!(
            result,
            Err(AutomationError::Validation { ref field, .. }) if field == "offset_hours"
        ));
        assert!(store.list().await.unwrap().is_empty());
    }
}
