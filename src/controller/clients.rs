//! Collaborator seams for the APIService controller
//!
//! Every external system the controller talks to sits behind one of these
//! traits so the sync logic can run against in-memory fakes in tests and the
//! kube-rs backed implementations in production.

use async_trait::async_trait;

use crate::crd::{APIService, Condition, GroupVersion, ManagementState};
use crate::error::Result;

/// The registrations this controller owns, split by desired state
#[derive(Clone, Debug, Default)]
pub struct ManagedRegistrations {
    pub enabled: Vec<APIService>,
    pub disabled: Vec<APIService>,
}

/// Supplies the enabled and disabled registrations.
///
/// Both lists together must always contain every registration the controller
/// owns, even when all of them are disabled, so objects created by users are
/// never touched.
#[async_trait]
pub trait RegistrationSource: Send + Sync {
    async fn list_managed(&self) -> Result<ManagedRegistrations>;
}

/// Result of a create-or-update
#[derive(Clone, Debug)]
pub struct Applied {
    /// The object as stored after the apply
    pub object: APIService,
    /// False when the stored object already matched
    pub changed: bool,
}

/// The remote store holding APIService objects
#[async_trait]
pub trait RegistrationStore: Send + Sync {
    /// Look up a registration in the read cache
    fn get_cached(&self, name: &str) -> Option<APIService>;

    /// Delete by name. A missing object is not an error.
    async fn delete(&self, name: &str) -> Result<()>;

    /// Create or update; safe to repeat with identical input
    async fn apply(&self, desired: &APIService) -> Result<Applied>;
}

/// Independent check that a group/version is actually served
#[async_trait]
pub trait DiscoveryProber: Send + Sync {
    /// Returns one message per group/version missing from discovery
    async fn probe_group_versions(&self, group_versions: &[GroupVersion]) -> Vec<String>;
}

/// The operator resource: management state in, conditions out
#[async_trait]
pub trait OperatorStatusStore: Send + Sync {
    async fn read_mode(&self) -> Result<ManagementState>;

    async fn write_conditions(&self, conditions: Vec<Condition>) -> Result<()>;
}

/// Emits user-visible warning events
#[async_trait]
pub trait EventRecorder: Send + Sync {
    async fn warning(&self, reason: &str, message: &str);
}
