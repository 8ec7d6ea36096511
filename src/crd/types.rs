//! Shared types for the operator status and management state
//!
//! - [`ManagementState`] - operator-level instruction (Managed, Unmanaged, Removed)
//! - [`ConditionStatus`] - tri-state condition status following Kubernetes conventions
//! - [`ConditionReason`] - closed set of reasons the controller reports
//! - [`Condition`] - a typed status condition written to the operator resource

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Whether and how the controller acts on its registrations
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ManagementState {
    /// Reconcile enabled and disabled registrations
    #[default]
    Managed,
    /// Leave everything untouched
    Unmanaged,
    /// Remove every owned registration
    Removed,
    /// A value this version does not understand; logged and ignored
    Unknown(String),
}

impl From<String> for ManagementState {
    fn from(value: String) -> Self {
        match value.as_str() {
            // An empty management state is treated as Managed
            "Managed" | "" => ManagementState::Managed,
            "Unmanaged" => ManagementState::Unmanaged,
            "Removed" => ManagementState::Removed,
            _ => ManagementState::Unknown(value),
        }
    }
}

impl From<ManagementState> for String {
    fn from(state: ManagementState) -> Self {
        state.to_string()
    }
}

impl std::fmt::Display for ManagementState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ManagementState::Managed => write!(f, "Managed"),
            ManagementState::Unmanaged => write!(f, "Unmanaged"),
            ManagementState::Removed => write!(f, "Removed"),
            ManagementState::Unknown(other) => write!(f, "{}", other),
        }
    }
}

/// Status of a condition: "True", "False", or "Unknown"
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum ConditionStatus {
    True,
    False,
    #[default]
    Unknown,
}

impl ConditionStatus {
    pub fn is_true(&self) -> bool {
        matches!(self, ConditionStatus::True)
    }
}

impl std::fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConditionStatus::True => write!(f, "True"),
            ConditionStatus::False => write!(f, "False"),
            ConditionStatus::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Machine-readable reasons reported on the operator conditions
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConditionReason {
    /// Nothing to report
    AsExpected,
    /// Deleting one or more disabled registrations failed
    DisabledRegistrationsPresent,
    /// The precondition check itself failed
    ErrorCheckingPrecondition,
    /// Backing endpoints are not ready yet
    PreconditionNotReady,
    /// Applying or verifying enabled registrations failed
    Error,
}

impl ConditionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionReason::AsExpected => "AsExpected",
            ConditionReason::DisabledRegistrationsPresent => "DisabledRegistrationsPresent",
            ConditionReason::ErrorCheckingPrecondition => "ErrorCheckingPrecondition",
            ConditionReason::PreconditionNotReady => "PreconditionNotReady",
            ConditionReason::Error => "Error",
        }
    }
}

impl std::fmt::Display for ConditionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kubernetes-style condition on the operator status
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition (e.g., "RegistrationsAvailable")
    #[serde(rename = "type")]
    pub type_: String,
    pub status: ConditionStatus,
    /// Last time the condition transitioned
    #[serde(default)]
    pub last_transition_time: String,
    /// Machine-readable reason for the condition
    #[serde(default)]
    pub reason: String,
    /// Human-readable message
    #[serde(default)]
    pub message: String,
}

impl Condition {
    pub fn new(type_: &str, status: ConditionStatus) -> Self {
        Self {
            type_: type_.to_string(),
            status,
            last_transition_time: chrono::Utc::now().to_rfc3339(),
            reason: String::new(),
            message: String::new(),
        }
    }

    /// Set status, reason and message in one go
    pub fn set(&mut self, status: ConditionStatus, reason: ConditionReason, message: &str) {
        self.status = status;
        self.reason = reason.as_str().to_string();
        self.message = message.to_string();
    }
}
