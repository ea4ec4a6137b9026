//! Actions a rule performs, in declared order.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::trigger::ContextValue;
use crate::domain::foundation::{StageId, Timestamp, UserId, ValidationError};
use crate::domain::pipeline::validate_appointment_timing;

/// Default appointment length when neither the action nor a template sets one.
pub const DEFAULT_APPOINTMENT_MINUTES: i64 = 60;

/// Default lead time for appointments without an explicit start.
pub const DEFAULT_APPOINTMENT_OFFSET_HOURS: i64 = 24;

/// Urgency attached to a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl fmt::Display for NotificationPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NotificationPriority::Low => "low",
            NotificationPriority::Normal => "normal",
            NotificationPriority::High => "high",
            NotificationPriority::Urgent => "urgent",
        };
        write!(f, "{}", s)
    }
}

/// One step of a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Ungated move within the entry's pipeline.
    MoveStage { stage_id: StageId },

    /// Books an appointment for the lead.
    ///
    /// Start resolution: `start_at`, then now + `offset_hours`, then the
    /// current stage's template, then now + 24h.
    CreateAppointment {
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        start_at: Option<Timestamp>,
        #[serde(default)]
        offset_hours: Option<i64>,
        #[serde(default)]
        duration_minutes: Option<i64>,
    },

    SendNotification {
        #[serde(default)]
        priority: NotificationPriority,
        title: String,
        message: String,
    },

    /// Patches a single named field on the lead.
    UpdateField { field: String, value: ContextValue },

    /// Sets the lead's responsible party.
    AssignUser { user_id: UserId },
}

impl Action {
    /// Short name used in logs and execution steps.
    pub fn kind(&self) -> &'static str {
        match self {
            Action::MoveStage { .. } => "move_stage",
            Action::CreateAppointment { .. } => "create_appointment",
            Action::SendNotification { .. } => "send_notification",
            Action::UpdateField { .. } => "update_field",
            Action::AssignUser { .. } => "assign_user",
        }
    }

    /// Checks parameters that serde alone cannot.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Action::CreateAppointment {
                title,
                duration_minutes,
                offset_hours,
                ..
            } => {
                if let Some(title) = title {
                    if title.trim().is_empty() {
                        return Err(ValidationError::empty_field("title"));
                    }
                }
                validate_appointment_timing(*offset_hours, *duration_minutes)
            }
            Action::SendNotification { title, message, .. } => {
                if title.trim().is_empty() {
                    return Err(ValidationError::empty_field("title"));
                }
                if message.trim().is_empty() {
                    return Err(ValidationError::empty_field("message"));
                }
                Ok(())
            }
            Action::UpdateField { field, .. } => {
                if field.trim().is_empty() {
                    return Err(ValidationError::empty_field("field"));
                }
                Ok(())
            }
            Action::MoveStage { .. } | Action::AssignUser { .. } => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actions_parse_from_tagged_yaml() {
        let yaml = r#"
- type: send_notification
  priority: high
  title: Stalled lead
  message: No activity for a week
- type: update_field
  field: status
  value: nurture
- type: create_appointment
  title: Discovery call
  offset_hours: 48
"#;
        let actions: Vec<Action> = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(actions.len(), 3);
        assert_eq!(actions[0].kind(), "send_notification");
        assert!(matches!(
            actions[0],
            Action::SendNotification {
                priority: NotificationPriority::High,
                ..
            }
        ));
        assert_eq!(
            actions[1],
            Action::UpdateField {
                field: "status".into(),
                value: "nurture".into()
            }
        );
        assert!(matches!(
            actions[2],
            Action::CreateAppointment {
                offset_hours: Some(48),
                duration_minutes: None,
                ..
            }
        ));
    }

    #[test]
    fn notification_priority_defaults_to_normal() {
        let action: Action =
            serde_json::from_str(r#"{"type":"send_notification","title":"t","message":"m"}"#)
                .unwrap();
        assert!(matches!(
            action,
            Action::SendNotification {
                priority: NotificationPriority::Normal,
                ..
            }
        ));
    }

    #[test]
    fn blank_field_name_is_invalid() {
        let action = Action::UpdateField {
            field: " ".into(),
            value: ContextValue::Null,
        };
        assert!(action.validate().is_err());
    }

    #[test]
    fn non_positive_duration_is_invalid() {
        let action = Action::CreateAppointment {
            title: None,
            start_at: None,
            offset_hours: None,
            duration_minutes: Some(0),
        };
        assert!(matches!(
            action.validate(),
            Err(ValidationError::OutOfRange { .. })
        ));
    }

    #[test]
    fn offset_past_one_year_is_invalid() {
        let action = Action::CreateAppointment {
            title: None,
            start_at: None,
            offset_hours: Some(i64::MAX),
            duration_minutes: None,
        };
        assert!(matches!(
            action.validate(),
            Err(ValidationError::OutOfRange { field, .. }) if field == "offset_hours"
        ));
    }
}
