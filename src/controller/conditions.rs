//! Condition management helpers following Kubernetes API conventions

use chrono::Utc;

use crate::crd::{Condition, ConditionReason, ConditionStatus};

/// Condition types owned by the APIService controller
pub const CONDITION_TYPE_DEGRADED: &str = "RegistrationsDegraded";
pub const CONDITION_TYPE_AVAILABLE: &str = "RegistrationsAvailable";

/// Update or add a condition to the conditions list
///
/// If a condition with the same type exists it is overwritten, keeping the
/// previous transition time unless the status changed.
pub fn set_condition(conditions: &mut Vec<Condition>, condition: Condition) {
    if let Some(existing) = conditions.iter_mut().find(|c| c.type_ == condition.type_) {
        let should_update_time = existing.status != condition.status;

        existing.status = condition.status;
        existing.reason = condition.reason;
        existing.message = condition.message;

        if should_update_time {
            existing.last_transition_time = Utc::now().to_rfc3339();
        }
    } else {
        conditions.push(condition);
    }
}

/// Find a condition by type
pub fn find_condition<'a>(conditions: &'a [Condition], type_: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.type_ == type_)
}

fn as_expected(type_: &str, status: ConditionStatus) -> Condition {
    let mut condition = Condition::new(type_, status);
    condition.reason = ConditionReason::AsExpected.as_str().to_string();
    condition
}

/// Initial RegistrationsDegraded=False condition for a sync cycle
pub fn not_degraded_condition() -> Condition {
    as_expected(CONDITION_TYPE_DEGRADED, ConditionStatus::False)
}

/// Initial RegistrationsAvailable=True condition for a sync cycle
pub fn available_condition() -> Condition {
    as_expected(CONDITION_TYPE_AVAILABLE, ConditionStatus::True)
}
