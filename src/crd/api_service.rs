//! APIService resource (`apiregistration.k8s.io/v1`)
//!
//! k8s-openapi does not ship the kube-aggregator types, so the subset of the
//! schema the controller reads and writes is declared here.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::ConditionStatus;

/// Condition type reported by the aggregator once the backing service answers
pub const APISERVICE_AVAILABLE: &str = "Available";

/// Port used when a service reference leaves it empty
pub const DEFAULT_SERVICE_PORT: i32 = 443;

#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "apiregistration.k8s.io",
    version = "v1",
    kind = "APIService",
    status = "APIServiceStatus",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct APIServiceSpec {
    /// Backing service; `None` means the API is served locally by the apiserver
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<ServiceReference>,

    pub group: String,
    pub version: String,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub insecure_skip_tls_verify: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca_bundle: Option<String>,

    pub group_priority_minimum: i32,
    pub version_priority: i32,
}

/// Reference to the Service that serves an aggregated API
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceReference {
    #[serde(default)]
    pub namespace: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<i32>,
}

impl ServiceReference {
    /// Fill in the fields the apiserver would default
    pub fn set_defaults(&mut self) {
        if self.port.is_none() {
            self.port = Some(DEFAULT_SERVICE_PORT);
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct APIServiceStatus {
    #[serde(default)]
    pub conditions: Vec<APIServiceCondition>,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct APIServiceCondition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: ConditionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub message: String,
}

/// An API group and version served through an APIService
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupVersion {
    pub group: String,
    pub version: String,
}

impl std::fmt::Display for GroupVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.group, self.version)
    }
}

impl APIService {
    /// The group/version this registration advertises
    pub fn group_version(&self) -> GroupVersion {
        GroupVersion {
            group: self.spec.group.clone(),
            version: self.spec.version.clone(),
        }
    }

    /// Defaulted copy of the spec, ready to be applied
    pub fn with_defaults(&self) -> APIService {
        let mut defaulted = self.clone();
        if let Some(service) = defaulted.spec.service.as_mut() {
            service.set_defaults();
        }
        defaulted
    }

    /// The first `Available` condition, if the aggregator has reported one
    pub fn available_condition(&self) -> Option<&APIServiceCondition> {
        self.status
            .as_ref()?
            .conditions
            .iter()
            .find(|c| c.type_ == APISERVICE_AVAILABLE)
    }
}
