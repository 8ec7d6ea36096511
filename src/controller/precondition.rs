//! Readiness gate for enabled APIServices
//!
//! An APIService pointing at a Service without ready endpoints would be
//! reported unavailable by the aggregator and break discovery for the whole
//! cluster, so enabled registrations are only applied once every backing
//! service has at least one ready address.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Endpoints;
use tracing::debug;

use crate::crd::APIService;
use crate::error::Result;

/// Decides whether it is safe to apply the enabled registrations.
///
/// Implementations only inspect; they never mutate cluster state.
#[async_trait]
pub trait Precondition: Send + Sync {
    async fn check(&self, enabled: &[APIService]) -> Result<bool>;
}

/// Read access to Endpoints objects
#[async_trait]
pub trait EndpointsReader: Send + Sync {
    /// `Ok(None)` when the Endpoints object does not exist
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Endpoints>>;
}

/// Requires a ready endpoint behind every referenced service
pub struct EndpointPrecondition {
    endpoints: Arc<dyn EndpointsReader>,
    /// Used for service references that leave the namespace empty
    namespace: String,
}

impl EndpointPrecondition {
    pub fn new(endpoints: Arc<dyn EndpointsReader>, namespace: impl Into<String>) -> Self {
        Self {
            endpoints,
            namespace: namespace.into(),
        }
    }

    fn backing_services(&self, enabled: &[APIService]) -> BTreeSet<(String, String)> {
        enabled
            .iter()
            .filter_map(|svc| svc.spec.service.as_ref())
            .map(|service| {
                let namespace = if service.namespace.is_empty() {
                    self.namespace.clone()
                } else {
                    service.namespace.clone()
                };
                (namespace, service.name.clone())
            })
            .collect()
    }
}

#[async_trait]
impl Precondition for EndpointPrecondition {
    async fn check(&self, enabled: &[APIService]) -> Result<bool> {
        for (namespace, name) in self.backing_services(enabled) {
            let Some(endpoints) = self.endpoints.get(&namespace, &name).await? else {
                debug!("endpoints {}/{} not found yet", namespace, name);
                return Ok(false);
            };
            if !has_ready_address(&endpoints) {
                debug!("endpoints {}/{} have no ready addresses", namespace, name);
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// True when any subset lists at least one ready address
pub fn has_ready_address(endpoints: &Endpoints) -> bool {
    endpoints
        .subsets
        .as_ref()
        .map(|subsets| {
            subsets
                .iter()
                .any(|s| s.addresses.as_ref().is_some_and(|a| !a.is_empty()))
        })
        .unwrap_or(false)
}
