//! Triggers, typed context values and conditions.
//!
//! A rule's trigger names the event type it reacts to plus a set of
//! conditions over the event context. Conditions are written either as a
//! bare value (equality) or as `{ operator, value }`:
//!
//! ```yaml
//! conditions:
//!   to_stage: Qualified
//!   score:
//!     operator: greater_than
//!     value: 50
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// The kinds of domain events a rule can react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    StageChange,
    TimeElapsed,
    FieldChange,
    LeadScore,
    Inactivity,
}

impl TriggerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerType::StageChange => "stage_change",
            TriggerType::TimeElapsed => "time_elapsed",
            TriggerType::FieldChange => "field_change",
            TriggerType::LeadScore => "lead_score",
            TriggerType::Inactivity => "inactivity",
        }
    }
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TriggerType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stage_change" => Ok(TriggerType::StageChange),
            "time_elapsed" => Ok(TriggerType::TimeElapsed),
            "field_change" => Ok(TriggerType::FieldChange),
            "lead_score" => Ok(TriggerType::LeadScore),
            "inactivity" => Ok(TriggerType::Inactivity),
            other => Err(ValidationError::invalid_format(
                "trigger_type",
                format!("unknown trigger type '{}'", other),
            )),
        }
    }
}

/// A typed value in an event context or condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContextValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl ContextValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContextValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            ContextValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for ContextValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextValue::Null => write!(f, "null"),
            ContextValue::Bool(b) => write!(f, "{}", b),
            ContextValue::Number(n) => write!(f, "{}", n),
            ContextValue::Text(t) => write!(f, "{}", t),
        }
    }
}

impl From<&str> for ContextValue {
    fn from(value: &str) -> Self {
        ContextValue::Text(value.to_string())
    }
}

impl From<String> for ContextValue {
    fn from(value: String) -> Self {
        ContextValue::Text(value)
    }
}

impl From<bool> for ContextValue {
    fn from(value: bool) -> Self {
        ContextValue::Bool(value)
    }
}

impl From<f64> for ContextValue {
    fn from(value: f64) -> Self {
        ContextValue::Number(value)
    }
}

impl From<i64> for ContextValue {
    fn from(value: i64) -> Self {
        ContextValue::Number(value as f64)
    }
}

impl From<u32> for ContextValue {
    fn from(value: u32) -> Self {
        ContextValue::Number(f64::from(value))
    }
}

impl<T: Into<ContextValue>> From<Option<T>> for ContextValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(ContextValue::Null, Into::into)
    }
}

/// Event context: field name to value.
pub type TriggerContext = BTreeMap<String, ContextValue>;

/// A single predicate over one context value.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Equals(ContextValue),
    GreaterThan(ContextValue),
    LessThan(ContextValue),
    /// Case-sensitive substring match on text.
    Contains(ContextValue),
}

impl Condition {
    pub fn operator(&self) -> &'static str {
        match self {
            Condition::Equals(_) => "equals",
            Condition::GreaterThan(_) => "greater_than",
            Condition::LessThan(_) => "less_than",
            Condition::Contains(_) => "contains",
        }
    }

    pub fn expected(&self) -> &ContextValue {
        match self {
            Condition::Equals(v)
            | Condition::GreaterThan(v)
            | Condition::LessThan(v)
            | Condition::Contains(v) => v,
        }
    }

    /// Builds a condition from an operator name; unknown names mean equality.
    pub fn from_operator(operator: &str, value: ContextValue) -> Self {
        match operator {
            "greater_than" => Condition::GreaterThan(value),
            "less_than" => Condition::LessThan(value),
            "contains" => Condition::Contains(value),
            _ => Condition::Equals(value),
        }
    }

    /// Tests the condition against an actual value.
    ///
    /// Ordering compares numbers numerically and text lexicographically.
    /// Values of different kinds never satisfy an ordering or containment.
    pub fn matches(&self, actual: &ContextValue) -> bool {
        use ContextValue::{Number, Text};

        match (self, actual) {
            (Condition::Equals(expected), actual) => actual == expected,
            (Condition::GreaterThan(Number(expected)), Number(actual)) => actual > expected,
            (Condition::GreaterThan(Text(expected)), Text(actual)) => actual > expected,
            (Condition::LessThan(Number(expected)), Number(actual)) => actual < expected,
            (Condition::LessThan(Text(expected)), Text(actual)) => actual < expected,
            (Condition::Contains(Text(needle)), Text(haystack)) => haystack.contains(needle.as_str()),
            _ => false,
        }
    }
}

#[derive(Serialize)]
struct ConditionRepr<'a> {
    operator: &'static str,
    value: &'a ContextValue,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawCondition {
    Operator { operator: String, value: ContextValue },
    Bare(ContextValue),
}

impl Serialize for Condition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ConditionRepr {
            operator: self.operator(),
            value: self.expected(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Condition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match RawCondition::deserialize(deserializer)? {
            RawCondition::Operator { operator, value } => Condition::from_operator(&operator, value),
            RawCondition::Bare(value) => Condition::Equals(value),
        })
    }
}

/// What a rule reacts to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    #[serde(rename = "type")]
    pub trigger_type: TriggerType,
    #[serde(default)]
    pub conditions: BTreeMap<String, Condition>,
}

impl Trigger {
    pub fn new(trigger_type: TriggerType) -> Self {
        Self {
            trigger_type,
            conditions: BTreeMap::new(),
        }
    }

    pub fn with_condition(mut self, field: impl Into<String>, condition: Condition) -> Self {
        self.conditions.insert(field.into(), condition);
        self
    }

    /// True when every condition holds; a missing key fails its condition.
    pub fn conditions_hold(&self, context: &TriggerContext) -> bool {
        self.conditions.iter().all(|(field, condition)| {
            context
                .get(field)
                .map_or(false, |actual| condition.matches(actual))
        })
    }
}
