//! APIServiceOperator Custom Resource Definition
//!
//! A single cluster-scoped object carries the operator's management state
//! and the health conditions the controller reports back.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{Condition, ManagementState};

#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "operator.apiservices.io",
    version = "v1alpha1",
    kind = "APIServiceOperator",
    status = "APIServiceOperatorStatus",
    shortname = "apisvcop",
    printcolumn = r#"{"name":"State","type":"string","jsonPath":".spec.managementState"}"#,
    printcolumn = r#"{"name":"Available","type":"string","jsonPath":".status.conditions[?(@.type=='RegistrationsAvailable')].status"}"#,
    printcolumn = r#"{"name":"Degraded","type":"string","jsonPath":".status.conditions[?(@.type=='RegistrationsDegraded')].status"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct APIServiceOperatorSpec {
    /// Managed, Unmanaged or Removed
    #[serde(default)]
    #[schemars(with = "String")]
    pub management_state: ManagementState,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct APIServiceOperatorStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}
