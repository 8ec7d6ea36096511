//! Controller module for APIService reconciliation
//! This module contains the sync algorithm, its collaborator seams and
//! their kube-rs implementations, and the controller loop that drives it.

mod apiservice;
pub mod clients;
pub mod conditions;
pub mod kube_clients;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod precondition;
mod reconciler;
pub mod shutdown;
pub mod source;

pub use apiservice::{APIServiceController, APISERVICE_RESOURCE};
pub use clients::{
    Applied, DiscoveryProber, EventRecorder, ManagedRegistrations, OperatorStatusStore,
    RegistrationSource, RegistrationStore,
};
pub use precondition::{EndpointPrecondition, EndpointsReader, Precondition};
pub use reconciler::{
    calculate_backoff, ensure_operator, run_controller, ControllerState, CONTROLLER_NAME,
    wait_for_cache_sync, DEFAULT_RESYNC_PERIOD,
};
pub use shutdown::{shutdown_channel, Shutdown, ShutdownTrigger};
pub use source::{FileRegistrationSource, RegistrationManifest, StaticRegistrationSource};
