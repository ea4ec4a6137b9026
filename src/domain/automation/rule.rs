//! Automation rules: a trigger plus an ordered list of actions.

use serde::{Deserialize, Serialize};

use super::action::Action;
use super::trigger::Trigger;
use crate::domain::foundation::{RuleId, Timestamp, ValidationError};

/// User-editable part of a rule, as written in rule files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDefinition {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub trigger: Trigger,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Higher runs first under priority ordering.
    #[serde(default)]
    pub priority: i32,
}

fn default_enabled() -> bool {
    true
}

impl RuleDefinition {
    pub fn new(name: impl Into<String>, trigger: Trigger, actions: Vec<Action>) -> Self {
        Self {
            name: name.into(),
            description: None,
            trigger,
            actions,
            enabled: true,
            priority: 0,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Validates the name and every action's parameters.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::empty_field("name"));
        }
        for action in &self.actions {
            action.validate()?;
        }
        Ok(())
    }
}

/// A stored automation rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationRule {
    pub id: RuleId,
    #[serde(flatten)]
    pub definition: RuleDefinition,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl AutomationRule {
    /// Creates a rule with a fresh identifier.
    pub fn create(definition: RuleDefinition, now: Timestamp) -> Result<Self, ValidationError> {
        definition.validate()?;
        Ok(Self {
            id: RuleId::new(),
            definition,
            created_at: now,
            updated_at: now,
        })
    }

    /// Replaces the definition, keeping identity and creation time.
    pub fn redefine(
        &mut self,
        definition: RuleDefinition,
        now: Timestamp,
    ) -> Result<(), ValidationError> {
        definition.validate()?;
        self.definition = definition;
        self.updated_at = now;
        Ok(())
    }

    pub fn set_enabled(&mut self, enabled: bool, now: Timestamp) {
        self.definition.enabled = enabled;
        self.updated_at = now;
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn trigger(&self) -> &Trigger {
        &self.definition.trigger
    }

    pub fn actions(&self) -> &[Action] {
        &self.definition.actions
    }

    pub fn is_enabled(&self) -> bool {
        self.definition.enabled
    }

    pub fn priority(&self) -> i32 {
        self.definition.priority
    }
}
