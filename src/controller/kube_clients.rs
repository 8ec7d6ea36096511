//! kube-rs backed implementations of the controller collaborators

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Endpoints, Event, ObjectReference};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::{
    api::{Api, DeleteParams, ObjectMeta, Patch, PatchParams, PostParams},
    runtime::reflector::{ObjectRef, Store},
    Client, Resource, ResourceExt,
};
use serde_json::json;
use tracing::{debug, warn};

use super::apiservice::APISERVICE_RESOURCE;
use super::clients::{Applied, DiscoveryProber, EventRecorder, OperatorStatusStore, RegistrationStore};
use super::conditions::set_condition;
use super::precondition::EndpointsReader;
use crate::crd::{APIService, APIServiceOperator, Condition, GroupVersion, ManagementState};
use crate::error::{Error, Result};

/// Field manager used for server-side apply
pub const FIELD_MANAGER: &str = "apiservice-operator";

/// APIService store backed by a reflector cache for reads
pub struct KubeRegistrationStore {
    api: Api<APIService>,
    cache: Store<APIService>,
}

impl KubeRegistrationStore {
    pub fn new(client: Client, cache: Store<APIService>) -> Self {
        Self {
            api: Api::all(client),
            cache,
        }
    }
}

#[async_trait]
impl RegistrationStore for KubeRegistrationStore {
    fn get_cached(&self, name: &str) -> Option<APIService> {
        self.cache
            .get(&ObjectRef::new(name))
            .map(|obj| (*obj).clone())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        match self.api.delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(e)) if e.code == 404 => {
                debug!("APIService {} not found", name);
                Ok(())
            }
            Err(e) => Err(Error::KubeError(e)),
        }
    }

    async fn apply(&self, desired: &APIService) -> Result<Applied> {
        let name = desired.name_any();
        let previous_version = self
            .get_cached(&name)
            .and_then(|cached| cached.resource_version());

        let mut object = desired.clone();
        object.metadata.resource_version = None;
        object.metadata.managed_fields = None;
        object.status = None;

        let stored = self
            .api
            .patch(
                &name,
                &PatchParams::apply(FIELD_MANAGER).force(),
                &Patch::Apply(&object),
            )
            .await?;

        let changed = match (&previous_version, stored.resource_version()) {
            (Some(before), Some(after)) => *before != after,
            _ => true,
        };

        Ok(Applied {
            object: stored,
            changed,
        })
    }
}

/// Asks the apiserver's discovery endpoint whether each group/version is served
pub struct KubeDiscoveryProber {
    client: Client,
}

impl KubeDiscoveryProber {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DiscoveryProber for KubeDiscoveryProber {
    async fn probe_group_versions(&self, group_versions: &[GroupVersion]) -> Vec<String> {
        let mut missing = Vec::new();

        for gv in group_versions {
            let api_service = format!("{}.{}", gv.version, gv.group);
            match self.client.list_api_group_resources(&gv.to_string()).await {
                Ok(_) => debug!("Discovery serves {}", gv),
                Err(kube::Error::Api(e)) if e.code == 404 || e.code == 503 => {
                    missing.push(format!(
                        "{}/{}: not available: {} is missing from discovery: {}",
                        APISERVICE_RESOURCE, api_service, gv, e.message
                    ));
                }
                Err(e) => {
                    warn!("Discovery probe for {} failed: {}", gv, e);
                    missing.push(format!(
                        "{}/{}: not available: discovery check for {} failed: {}",
                        APISERVICE_RESOURCE, api_service, gv, e
                    ));
                }
            }
        }

        missing
    }
}

/// Reads the management state from, and writes conditions to, the operator resource
pub struct KubeOperatorStatusStore {
    api: Api<APIServiceOperator>,
    name: String,
}

impl KubeOperatorStatusStore {
    pub fn new(client: Client, name: impl Into<String>) -> Self {
        Self {
            api: Api::all(client),
            name: name.into(),
        }
    }

    async fn get(&self) -> Result<APIServiceOperator> {
        self.api
            .get_opt(&self.name)
            .await?
            .ok_or_else(|| Error::NotFound {
                kind: "APIServiceOperator".to_string(),
                name: self.name.clone(),
            })
    }
}

#[async_trait]
impl OperatorStatusStore for KubeOperatorStatusStore {
    async fn read_mode(&self) -> Result<ManagementState> {
        Ok(self.get().await?.spec.management_state)
    }

    async fn write_conditions(&self, conditions: Vec<Condition>) -> Result<()> {
        let operator = self.get().await?;
        let existing = operator
            .status
            .as_ref()
            .map(|s| s.conditions.clone())
            .unwrap_or_default();

        let mut merged = existing.clone();
        for condition in conditions {
            set_condition(&mut merged, condition);
        }

        let generation = operator.metadata.generation;
        let observed = operator.status.as_ref().and_then(|s| s.observed_generation);
        if merged == existing && observed == generation {
            debug!("Operator conditions unchanged, skipping status update");
            return Ok(());
        }

        let patch = json!({
            "status": {
                "conditions": merged,
                "observedGeneration": generation,
            }
        });
        self.api
            .patch_status(
                &self.name,
                &PatchParams::apply(FIELD_MANAGER),
                &Patch::Merge(&patch),
            )
            .await?;

        Ok(())
    }
}

/// Emits Kubernetes Events against the operator resource
pub struct KubeEventRecorder {
    client: Client,
    operator_name: String,
    namespace: String,
}

impl KubeEventRecorder {
    pub fn new(client: Client, operator_name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            client,
            operator_name: operator_name.into(),
            namespace: namespace.into(),
        }
    }

    fn involved_object(&self) -> ObjectReference {
        ObjectReference {
            api_version: Some(APIServiceOperator::api_version(&()).to_string()),
            kind: Some(APIServiceOperator::kind(&()).to_string()),
            name: Some(self.operator_name.clone()),
            ..Default::default()
        }
    }
}

#[async_trait]
impl EventRecorder for KubeEventRecorder {
    async fn warning(&self, reason: &str, message: &str) {
        warn!("{}: {}", reason, message);

        let events: Api<Event> = Api::namespaced(self.client.clone(), &self.namespace);
        let time = chrono::Utc::now();
        let event = Event {
            metadata: ObjectMeta {
                generate_name: Some(format!("{}-event-", self.operator_name)),
                ..Default::default()
            },
            type_: Some("Warning".to_string()),
            reason: Some(reason.to_string()),
            message: Some(message.to_string()),
            involved_object: self.involved_object(),
            first_timestamp: Some(Time(time)),
            last_timestamp: Some(Time(time)),
            count: Some(1),
            reporting_component: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };

        if let Err(e) = events.create(&PostParams::default(), &event).await {
            warn!("Failed to emit {} event: {}", reason, e);
        }
    }
}

/// Endpoints reads straight from the API server
pub struct KubeEndpointsReader {
    client: Client,
}

impl KubeEndpointsReader {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EndpointsReader for KubeEndpointsReader {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Endpoints>> {
        let api: Api<Endpoints> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }
}
