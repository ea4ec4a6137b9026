//! TriggerEvaluator - selects the rules an event fires.

use serde::{Deserialize, Serialize};
use std::cmp::Reverse;

use super::event::TriggerEvent;
use super::rule::AutomationRule;

/// Order in which matched rules are returned (and executed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationOrder {
    /// Store order.
    Insertion,
    /// Highest priority first; ties keep store order.
    #[default]
    Priority,
}

/// Pure rule matcher.
#[derive(Debug, Clone, Copy, Default)]
pub struct TriggerEvaluator {
    order: EvaluationOrder,
}

impl TriggerEvaluator {
    pub fn new(order: EvaluationOrder) -> Self {
        Self { order }
    }

    pub fn order(&self) -> EvaluationOrder {
        self.order
    }

    /// Returns enabled rules of the event's trigger type whose conditions
    /// all hold against the event context.
    pub fn select<'a>(
        &self,
        rules: &'a [AutomationRule],
        event: &TriggerEvent,
    ) -> Vec<&'a AutomationRule> {
        let mut matched: Vec<&AutomationRule> = rules
            .iter()
            .filter(|rule| rule.is_enabled())
            .filter(|rule| rule.trigger().trigger_type == event.trigger_type)
            .filter(|rule| rule.trigger().conditions_hold(&event.context))
            .collect();

        if self.order == EvaluationOrder::Priority {
            // sort_by_key is stable, so equal priorities keep store order
            matched.sort_by_key(|rule| Reverse(rule.priority()));
        }
        matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::automation::rule::RuleDefinition;
    use crate::domain::automation::trigger::{Condition, Trigger, TriggerType};
    use crate::domain::foundation::{LeadId, Timestamp};

    fn rule(def: RuleDefinition) -> AutomationRule {
        AutomationRule::create(def, Timestamp::now()).unwrap()
    }

    fn stage_rule(name: &str, to_stage: &str) -> AutomationRule {
        rule(RuleDefinition::new(
            name,
            Trigger::new(TriggerType::StageChange)
                .with_condition("to_stage", Condition::Equals(to_stage.into())),
            vec![],
        ))
    }

    fn names<'a>(rules: &[&'a AutomationRule]) -> Vec<&'a str> {
        rules.iter().map(|r| r.name()).collect()
    }

    #[test]
    fn stage_change_matches_only_equal_condition() {
        let rules = vec![stage_rule("qualified", "Qualified"), stage_rule("closed", "Closed")];
        let event = TriggerEvent::new(TriggerType::StageChange, LeadId::new())
            .with_context("to_stage", "Qualified");

        let matched = TriggerEvaluator::default().select(&rules, &event);

        assert_eq!(names(&matched), vec!["qualified"]);
    }

    #[test]
    fn disabled_and_other_type_rules_are_ignored() {
        let rules = vec![
            rule(RuleDefinition::new("off", Trigger::new(TriggerType::Inactivity), vec![]).disabled()),
            rule(RuleDefinition::new("score", Trigger::new(TriggerType::LeadScore), vec![])),
            rule(RuleDefinition::new("on", Trigger::new(TriggerType::Inactivity), vec![])),
        ];
        let event = TriggerEvent::new(TriggerType::Inactivity, LeadId::new());

        let matched = TriggerEvaluator::default().select(&rules, &event);

        assert_eq!(names(&matched), vec!["on"]);
    }

    #[test]
    fn priority_order_is_stable() {
        let trigger = || Trigger::new(TriggerType::FieldChange);
        let rules = vec![
            rule(RuleDefinition::new("low", trigger(), vec![]).with_priority(1)),
            rule(RuleDefinition::new("high-a", trigger(), vec![]).with_priority(5)),
            rule(RuleDefinition::new("high-b", trigger(), vec![]).with_priority(5)),
        ];
        let event = TriggerEvent::new(TriggerType::FieldChange, LeadId::new());

        let by_priority = TriggerEvaluator::new(EvaluationOrder::Priority).select(&rules, &event);
        let by_insertion = TriggerEvaluator::new(EvaluationOrder::Insertion).select(&rules, &event);

        assert_eq!(names(&by_priority), vec!["high-a", "high-b", "low"]);
        assert_eq!(names(&by_insertion), vec!["low", "high-a", "high-b"]);
    }
}
