//! APIService reconciliation
//!
//! One sync cycle reads the management state, asks the registration source
//! which APIServices should exist, deletes the disabled ones, applies the
//! enabled ones once their backing endpoints are ready, and folds every
//! outcome into the `RegistrationsDegraded` and `RegistrationsAvailable`
//! conditions on the operator resource.
//!
//! Nothing is carried between cycles. A cycle that fails part way is simply
//! redone from scratch by the next trigger.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use kube::ResourceExt;
use tracing::{debug, info, instrument, warn};

use super::clients::{
    DiscoveryProber, EventRecorder, ManagedRegistrations, OperatorStatusStore,
    RegistrationSource, RegistrationStore,
};
use super::conditions::{available_condition, not_degraded_condition};
use super::precondition::Precondition;
use super::shutdown::Shutdown;
use crate::crd::{APIService, Condition, ConditionReason, ConditionStatus, GroupVersion, ManagementState};
use crate::error::{aggregate, Error, Result};

/// Resource prefix used in user-facing messages
pub const APISERVICE_RESOURCE: &str = "apiservices.apiregistration.k8s.io";

/// Reconciles a caller-supplied set of APIServices
pub struct APIServiceController {
    source: Arc<dyn RegistrationSource>,
    precondition: Arc<dyn Precondition>,
    store: Arc<dyn RegistrationStore>,
    discovery: Option<Arc<dyn DiscoveryProber>>,
    status: Arc<dyn OperatorStatusStore>,
    recorder: Arc<dyn EventRecorder>,
    shutdown: Shutdown,
}

impl APIServiceController {
    pub fn new(
        source: Arc<dyn RegistrationSource>,
        precondition: Arc<dyn Precondition>,
        store: Arc<dyn RegistrationStore>,
        status: Arc<dyn OperatorStatusStore>,
        recorder: Arc<dyn EventRecorder>,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            source,
            precondition,
            store,
            discovery: None,
            status,
            recorder,
            shutdown,
        }
    }

    /// Enable the best-effort discovery probe after successful applies
    pub fn with_discovery(mut self, prober: Arc<dyn DiscoveryProber>) -> Self {
        self.discovery = Some(prober);
        self
    }

    /// Run one full sync cycle
    #[instrument(skip(self))]
    pub async fn sync(&self) -> Result<()> {
        let mode = self.status.read_mode().await?;

        match mode {
            ManagementState::Managed => {}
            ManagementState::Unmanaged => {
                debug!("Operator is Unmanaged, skipping APIService sync");
                return Ok(());
            }
            ManagementState::Removed => {
                let managed = self.list_managed().await?;
                let mut all = managed.enabled;
                all.extend(managed.disabled);
                info!("Operator is Removed, deleting {} APIServices", all.len());
                return self.sync_disabled(&all).await;
            }
            ManagementState::Unknown(state) => {
                self.recorder
                    .warning(
                        "ManagementStateUnknown",
                        &format!("Unrecognized operator management state {:?}", state),
                    )
                    .await;
                return Ok(());
            }
        }

        let managed = self.list_managed().await?;

        let disabled_err = self.sync_disabled(&managed.disabled).await.err();

        let (ready, precondition_err) = match self.precondition.check(&managed.enabled).await {
            Ok(ready) => (ready, None),
            Err(e) => (false, Some(e)),
        };

        let enabled_err = if precondition_err.is_none() && ready {
            self.sync_enabled(&managed.enabled).await.err()
        } else {
            debug!("Precondition not met, skipping enabled APIServices");
            None
        };

        self.update_operator_status(disabled_err, precondition_err, ready, enabled_err)
            .await
    }

    /// Fetch the managed lists and settle names that appear in both.
    /// Enabled membership wins.
    async fn list_managed(&self) -> Result<ManagedRegistrations> {
        let ManagedRegistrations { enabled, disabled } = self.source.list_managed().await?;

        let enabled = dedup_by_name(enabled);
        let enabled_names: HashSet<String> = enabled.iter().map(|s| s.name_any()).collect();

        let disabled = dedup_by_name(disabled)
            .into_iter()
            .filter(|svc| {
                let name = svc.name_any();
                if enabled_names.contains(&name) {
                    warn!(
                        "{}/{} is listed as both enabled and disabled, keeping it enabled",
                        APISERVICE_RESOURCE, name
                    );
                    false
                } else {
                    true
                }
            })
            .collect();

        Ok(ManagedRegistrations { enabled, disabled })
    }

    /// Delete every disabled APIService that still exists
    #[instrument(skip_all, fields(count = services.len()))]
    pub async fn sync_disabled(&self, services: &[APIService]) -> Result<()> {
        let mut errs = Vec::new();

        for svc in services {
            let name = svc.name_any();
            let Some(existing) = self.store.get_cached(&name) else {
                continue;
            };
            if existing.metadata.deletion_timestamp.is_some() {
                warn!("{}/{} not yet deleted", APISERVICE_RESOURCE, name);
                continue;
            }

            #[cfg(feature = "metrics")]
            super::metrics::inc_delete();

            match self.store.delete(&name).await {
                Ok(()) => info!("Deleted disabled APIService {}", name),
                Err(e) if e.is_not_found() => {
                    debug!("APIService {} already gone", name);
                }
                Err(e) => {
                    warn!("Failed to delete APIService {}: {}", name, e);
                    errs.push(e);
                }
            }
        }

        aggregate(errs)
    }

    /// Apply every enabled APIService and verify it is being served
    #[instrument(skip_all, fields(count = services.len()))]
    pub async fn sync_enabled(&self, services: &[APIService]) -> Result<()> {
        let mut errs = Vec::new();
        let mut messages = Vec::new();

        for svc in services {
            let desired = svc.with_defaults();
            let applied = match self.store.apply(&desired).await {
                Ok(applied) => applied,
                Err(e) => {
                    warn!("Failed to apply APIService {}: {}", desired.name_any(), e);
                    errs.push(e);
                    continue;
                }
            };

            #[cfg(feature = "metrics")]
            super::metrics::inc_apply(applied.changed);

            let name = applied.object.name_any();
            if applied.changed {
                info!("Applied APIService {}", name);
            }

            if let Some(condition) = applied.object.available_condition() {
                if condition.status != ConditionStatus::True {
                    messages.push(format!(
                        "{}/{}: not available: {}",
                        APISERVICE_RESOURCE, name, condition.message
                    ));
                }
            }
        }

        aggregate(errs)?;
        if !messages.is_empty() {
            return Err(unavailable(messages));
        }

        // The aggregator can report Available before discovery serves the
        // group, so ask discovery directly when a client is wired in.
        if let Some(prober) = &self.discovery {
            let group_versions: Vec<GroupVersion> = services
                .iter()
                .map(APIService::group_version)
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            messages.extend(prober.probe_group_versions(&group_versions).await);
        }

        if messages.is_empty() {
            Ok(())
        } else {
            Err(unavailable(messages))
        }
    }

    /// Fold the cycle's outcomes into the two operator conditions and write them.
    ///
    /// The write always happens unless the process is shutting down, and a
    /// failed write replaces whatever error the cycle produced.
    pub async fn update_operator_status(
        &self,
        disabled_err: Option<Error>,
        precondition_err: Option<Error>,
        precondition_ready: bool,
        enabled_err: Option<Error>,
    ) -> Result<()> {
        let any_err = disabled_err.is_some() || precondition_err.is_some() || enabled_err.is_some();
        if any_err && self.shutdown.is_shutting_down() {
            return Err(shutdown_error(
                disabled_err.as_ref(),
                precondition_err.as_ref(),
                enabled_err.as_ref(),
            ));
        }

        let (degraded, available, result) =
            fold_conditions(disabled_err, precondition_err, precondition_ready, enabled_err);

        #[cfg(feature = "metrics")]
        {
            super::metrics::set_condition_status(&degraded.type_, degraded.status.is_true());
            super::metrics::set_condition_status(&available.type_, available.status.is_true());
        }

        self.status.write_conditions(vec![degraded, available]).await?;
        result
    }
}

/// Compute both conditions and the cycle result from the sync outcomes
fn fold_conditions(
    disabled_err: Option<Error>,
    precondition_err: Option<Error>,
    precondition_ready: bool,
    enabled_err: Option<Error>,
) -> (Condition, Condition, Result<()>) {
    let mut degraded = not_degraded_condition();
    let mut available = available_condition();
    let mut errs = Vec::new();

    if let Some(e) = disabled_err {
        degraded.set(
            ConditionStatus::True,
            ConditionReason::DisabledRegistrationsPresent,
            &e.to_string(),
        );
        errs.push(e);
    }

    if let Some(e) = precondition_err {
        available.set(
            ConditionStatus::False,
            ConditionReason::ErrorCheckingPrecondition,
            &e.to_string(),
        );
        errs.push(e);
    } else if !precondition_ready {
        let reason = ConditionReason::PreconditionNotReady;
        available.set(ConditionStatus::False, reason, reason.as_str());
        return (degraded, available, aggregate(errs));
    }

    if let Some(e) = enabled_err {
        available.set(ConditionStatus::False, ConditionReason::Error, &e.to_string());
        errs.push(e);
    }

    (degraded, available, aggregate(errs))
}

fn shutdown_error(
    disabled_err: Option<&Error>,
    precondition_err: Option<&Error>,
    enabled_err: Option<&Error>,
) -> Error {
    let mut causes = Vec::new();
    if let Some(e) = disabled_err {
        causes.push(format!("failed to delete disabled APIs: {}", e));
    }
    if let Some(e) = precondition_err {
        causes.push(format!("failed to check precondition for enabled APIs: {}", e));
    }
    if let Some(e) = enabled_err {
        causes.push(format!("failed to reconcile enabled APIs: {}", e));
    }

    let joined = match causes.as_slice() {
        [only] => only.clone(),
        _ => format!("[{}]", causes.join(", ")),
    };
    Error::ShuttingDown(format!(
        "the operator is shutting down, skipping updating conditions, err = {}",
        joined
    ))
}

/// Sorted so the condition message is stable across cycles
fn unavailable(mut messages: Vec<String>) -> Error {
    messages.sort();
    Error::Unavailable(messages.join("\n"))
}

fn dedup_by_name(services: Vec<APIService>) -> Vec<APIService> {
    let mut seen = HashSet::new();
    services
        .into_iter()
        .filter(|svc| seen.insert(svc.name_any()))
        .collect()
}
