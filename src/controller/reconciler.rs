//! Controller loop for the APIService operator
//!
//! Implements the controller pattern using kube-rs runtime. The single
//! `APIServiceOperator` object is the reconcile key: every change to an
//! APIService, or to a Service/Endpoints in the operand namespace, maps back
//! to it, so bursts of events collapse into one in-flight sync.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use k8s_openapi::api::core::v1::{Endpoints, Service};
use kube::{
    api::{Api, ListParams, PostParams},
    client::Client,
    runtime::{
        controller::{Action, Controller},
        reflector::{self, ObjectRef, Store},
        watcher, WatchStreamExt,
    },
    ResourceExt,
};
use tracing::{error, info, instrument, warn};

use super::apiservice::APIServiceController;
use super::kube_clients::{
    KubeDiscoveryProber, KubeEndpointsReader, KubeEventRecorder, KubeOperatorStatusStore,
    KubeRegistrationStore,
};
use super::precondition::EndpointPrecondition;
use super::shutdown::Shutdown;
use super::source::FileRegistrationSource;
use crate::crd::{APIService, APIServiceOperator, APIServiceOperatorSpec};
use crate::error::{Error, Result};

/// Name used for metrics and log context
pub const CONTROLLER_NAME: &str = "apiservice";

/// Default period between unconditional syncs
pub const DEFAULT_RESYNC_PERIOD: Duration = Duration::from_secs(10);

/// Shared state for the controller
pub struct ControllerState {
    pub client: Client,
    /// Name of the cluster-scoped APIServiceOperator object
    pub operator_name: String,
    /// Namespace holding the backing Services and Endpoints
    pub operand_namespace: String,
    /// YAML manifest listing the owned APIServices
    pub manifest_path: PathBuf,
    pub resync_period: Duration,
    pub shutdown: Shutdown,
}

/// Per-run reconcile context
struct Context {
    controller: APIServiceController,
    resync_period: Duration,
    consecutive_failures: AtomicU32,
}

/// Main entry point to start the controller
pub async fn run_controller(state: Arc<ControllerState>) -> Result<()> {
    let client = state.client.clone();
    let operators: Api<APIServiceOperator> = Api::all(client.clone());

    info!("Starting APIService controller");

    // Verify CRD exists
    match operators.list(&ListParams::default().limit(1)).await {
        Ok(_) => info!("APIServiceOperator CRD is available"),
        Err(e) => {
            error!(
                "APIServiceOperator CRD not found. Please install the CRD first: {:?}",
                e
            );
            return Err(Error::ConfigError(
                "APIServiceOperator CRD not installed".to_string(),
            ));
        }
    }

    ensure_operator(&client, &state.operator_name).await?;

    // The reflector store doubles as the registration store's read cache.
    // Syncs must not start until it holds the initial list, otherwise every
    // disabled APIService looks already deleted.
    let (apiservice_cache, writer) = reflector::store();
    let reflector_task = tokio::spawn(
        watcher(Api::<APIService>::all(client.clone()), watcher::Config::default())
            .default_backoff()
            .reflect(writer)
            .touched_objects()
            .for_each(|res| async move {
                if let Err(e) = res {
                    warn!("APIService watch error: {}", e);
                }
            }),
    );

    info!("Waiting for the APIService cache to sync");
    tokio::select! {
        res = wait_for_cache_sync(&apiservice_cache) => res?,
        _ = state.shutdown.clone().wait() => {
            reflector_task.abort();
            return Ok(());
        }
    }
    info!("APIService cache synced");

    let endpoints = Arc::new(KubeEndpointsReader::new(client.clone()));
    let controller = APIServiceController::new(
        Arc::new(FileRegistrationSource::new(state.manifest_path.clone())),
        Arc::new(EndpointPrecondition::new(
            endpoints,
            state.operand_namespace.clone(),
        )),
        Arc::new(KubeRegistrationStore::new(client.clone(), apiservice_cache)),
        Arc::new(KubeOperatorStatusStore::new(
            client.clone(),
            state.operator_name.clone(),
        )),
        Arc::new(KubeEventRecorder::new(
            client.clone(),
            state.operator_name.clone(),
            state.operand_namespace.clone(),
        )),
        state.shutdown.clone(),
    )
    .with_discovery(Arc::new(KubeDiscoveryProber::new(client.clone())));

    let ctx = Arc::new(Context {
        controller,
        resync_period: state.resync_period,
        consecutive_failures: AtomicU32::new(0),
    });

    let operator_selector =
        watcher::Config::default().fields(&format!("metadata.name={}", state.operator_name));

    Controller::new(operators, operator_selector)
        .watches(
            Api::<APIService>::all(client.clone()),
            watcher::Config::default(),
            to_operator(&state.operator_name),
        )
        .watches(
            Api::<Service>::namespaced(client.clone(), &state.operand_namespace),
            watcher::Config::default(),
            to_operator(&state.operator_name),
        )
        .watches(
            Api::<Endpoints>::namespaced(client.clone(), &state.operand_namespace),
            watcher::Config::default(),
            to_operator(&state.operator_name),
        )
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|res| async move {
            match res {
                Ok(obj) => info!("Reconciled: {:?}", obj),
                Err(e) => error!("Reconcile error: {:?}", e),
            }
        })
        .await;

    reflector_task.abort();
    Ok(())
}

/// Block until the APIService cache holds a complete initial list
pub async fn wait_for_cache_sync(cache: &Store<APIService>) -> Result<()> {
    cache
        .wait_until_ready()
        .await
        .map_err(|e| Error::ConfigError(format!("APIService cache never synced: {}", e)))
}

/// Map any watched object to the operator reconcile key
fn to_operator<T>(
    name: &str,
) -> impl Fn(T) -> Option<ObjectRef<APIServiceOperator>> + Send + Sync + 'static {
    let key: ObjectRef<APIServiceOperator> = ObjectRef::new(name);
    move |_| Some(key.clone())
}

/// Create the operator object in Managed state if nobody has yet
pub async fn ensure_operator(client: &Client, name: &str) -> Result<()> {
    let api: Api<APIServiceOperator> = Api::all(client.clone());
    if api.get_opt(name).await?.is_some() {
        return Ok(());
    }

    let operator = APIServiceOperator::new(name, APIServiceOperatorSpec::default());
    match api.create(&PostParams::default(), &operator).await {
        Ok(_) => info!("Created APIServiceOperator {} in Managed state", name),
        Err(kube::Error::Api(e)) if e.code == 409 => {}
        Err(e) => return Err(Error::KubeError(e)),
    }
    Ok(())
}

/// The reconciliation function
///
/// This function is called whenever:
/// - The APIServiceOperator object changes
/// - Any APIService, or a Service/Endpoints in the operand namespace, changes
/// - The resync timer expires
#[instrument(skip(obj, ctx), fields(name = %obj.name_any()))]
async fn reconcile(obj: Arc<APIServiceOperator>, ctx: Arc<Context>) -> Result<Action> {
    let start = Instant::now();
    let result = ctx.controller.sync().await;

    #[cfg(feature = "metrics")]
    super::metrics::observe_sync_duration_seconds(CONTROLLER_NAME, start.elapsed().as_secs_f64());
    #[cfg(not(feature = "metrics"))]
    let _ = start;

    result?;
    ctx.consecutive_failures.store(0, Ordering::Relaxed);
    Ok(Action::requeue(ctx.resync_period))
}

/// Error policy determines how to handle reconciliation errors
fn error_policy(obj: Arc<APIServiceOperator>, error: &Error, ctx: Arc<Context>) -> Action {
    #[cfg(feature = "metrics")]
    super::metrics::inc_sync_error(CONTROLLER_NAME, error.kind());

    if let Error::ShuttingDown(msg) = error {
        warn!("{}", msg);
        return Action::await_change();
    }

    error!("APIService sync failed for {}: {}", obj.name_any(), error);

    let attempt = ctx.consecutive_failures.fetch_add(1, Ordering::Relaxed);
    let retry_after = if error.is_retriable() {
        calculate_backoff(attempt, Some(1), Some(60))
    } else {
        calculate_backoff(attempt, Some(15), Some(300))
    };

    Action::requeue(retry_after)
}

/// Exponential backoff: base * 2^attempt, capped at max
pub fn calculate_backoff(
    attempt: u32,
    base_delay_secs: Option<u64>,
    max_delay_secs: Option<u64>,
) -> Duration {
    let base = base_delay_secs.unwrap_or(15);
    let max = max_delay_secs.unwrap_or(300);

    let delay_secs = base.saturating_mul(2_u64.saturating_pow(attempt.min(10)));
    Duration::from_secs(delay_secs.min(max))
}
