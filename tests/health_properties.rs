//! Property tests for the pure pipeline calculators.

use proptest::prelude::*;

use lead_pipeline::domain::automation::{Condition, ContextValue};
use lead_pipeline::domain::foundation::{PipelineId, Timestamp};
use lead_pipeline::domain::pipeline::{
    ChecklistGate, ChecklistItem, ChecklistState, HealthCalculator, PipelineStage, StageHealth,
};

fn rank(health: StageHealth) -> u8 {
    match health {
        StageHealth::Green => 0,
        StageHealth::Yellow => 1,
        StageHealth::Red => 2,
    }
}

proptest! {
    /// Property: an entry is red exactly when it is past its SLA
    #[test]
    fn red_exactly_past_sla(days in 0i64..400, sla in 0u32..120) {
        let health = HealthCalculator::classify_days(days, sla);
        prop_assert_eq!(health == StageHealth::Red, days > i64::from(sla));
    }

    /// Property: an entry is green exactly before 80% of its SLA
    #[test]
    fn green_exactly_before_warning_threshold(days in 0i64..400, sla in 0u32..120) {
        let health = HealthCalculator::classify_days(days, sla);
        let threshold = (i64::from(sla) * 8) / 10;
        prop_assert_eq!(health == StageHealth::Green, days < threshold);
    }

    /// Property: health never improves while time in stage grows
    #[test]
    fn health_is_monotonic_in_days(a in 0i64..400, b in 0i64..400, sla in 0u32..120) {
        let (early, late) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(
            rank(HealthCalculator::classify_days(early, sla))
                <= rank(HealthCalculator::classify_days(late, sla))
        );
    }

    /// Property: timestamp classification agrees with whole-day classification
    #[test]
    fn timestamp_classification_uses_whole_days(days in 0i64..60, extra_hours in 0i64..24, sla in 1u32..30) {
        let entered = Timestamp::now();
        let now = entered.plus_days(days).plus_hours(extra_hours);
        prop_assert_eq!(
            HealthCalculator::classify(now, entered, sla),
            HealthCalculator::classify_days(days, sla)
        );
    }

    /// Property: the gate opens exactly when every required item is checked
    /// and any exit criteria were acknowledged
    #[test]
    fn gate_opens_only_when_requirements_met(
        items in prop::collection::vec((any::<bool>(), any::<bool>()), 0..8),
        has_criteria in any::<bool>(),
        acknowledged in any::<bool>(),
    ) {
        let mut stage = PipelineStage::new(PipelineId::new(), "Discovery", 1);
        if has_criteria {
            stage = stage.with_exit_criteria("Budget holder on the call");
        }

        let mut checklist = Vec::new();
        let mut state = ChecklistState::new();
        for (i, (required, checked)) in items.iter().enumerate() {
            let title = format!("Item {}", i);
            let item = if *required {
                ChecklistItem::required(stage.id, title, i as i32)
            } else {
                ChecklistItem::optional(stage.id, title, i as i32)
            };
            state.insert(item.id, *checked);
            checklist.push(item);
        }

        let decision = ChecklistGate::evaluate(&stage, &checklist, &state, acknowledged);

        let unchecked_required = items.iter().filter(|(required, checked)| *required && !*checked).count();
        prop_assert_eq!(decision.missing_titles.len(), unchecked_required);
        prop_assert_eq!(decision.criteria_pending, has_criteria && !acknowledged);
        prop_assert_eq!(
            decision.can_advance,
            unchecked_required == 0 && !(has_criteria && !acknowledged)
        );
    }

    /// Property: numeric conditions compare like the underlying numbers
    #[test]
    fn numeric_conditions_follow_ordering(expected in -1000i64..1000, actual in -1000i64..1000) {
        let actual_value = ContextValue::from(actual);
        prop_assert_eq!(
            Condition::GreaterThan(ContextValue::from(expected)).matches(&actual_value),
            actual > expected
        );
        prop_assert_eq!(
            Condition::LessThan(ContextValue::from(expected)).matches(&actual_value),
            actual < expected
        );
        prop_assert_eq!(
            Condition::Equals(ContextValue::from(expected)).matches(&actual_value),
            actual == expected
        );
    }
}
