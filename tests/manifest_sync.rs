//! Drives the public controller API end to end: a manifest on disk is the
//! registration source, and the cluster is replaced by in-memory stores.

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::{Arc, Mutex};

use apiservice_operator::controller::conditions::{
    find_condition, CONDITION_TYPE_AVAILABLE, CONDITION_TYPE_DEGRADED,
};
use apiservice_operator::controller::{
    shutdown_channel, APIServiceController, Applied, EndpointPrecondition, EndpointsReader,
    EventRecorder, FileRegistrationSource, OperatorStatusStore, RegistrationStore,
};
use apiservice_operator::crd::{APIService, Condition, ConditionStatus, ManagementState};
use apiservice_operator::Result;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{EndpointAddress, EndpointSubset, Endpoints};
use kube::ResourceExt;

const MANIFEST: &str = r#"
apiServices:
  - name: v1beta1.metrics.k8s.io
    spec:
      group: metrics.k8s.io
      version: v1beta1
      groupPriorityMinimum: 100
      versionPriority: 100
      service:
        namespace: monitoring
        name: metrics-server
  - name: v1alpha1.metrics.k8s.io
    enabled: false
    spec:
      group: metrics.k8s.io
      version: v1alpha1
      groupPriorityMinimum: 100
      versionPriority: 50
      service:
        namespace: monitoring
        name: metrics-server
"#;

#[derive(Default)]
struct MemoryStore {
    objects: Mutex<BTreeMap<String, APIService>>,
}

#[async_trait]
impl RegistrationStore for MemoryStore {
    fn get_cached(&self, name: &str) -> Option<APIService> {
        self.objects.lock().unwrap().get(name).cloned()
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.objects.lock().unwrap().remove(name);
        Ok(())
    }

    async fn apply(&self, desired: &APIService) -> Result<Applied> {
        let mut objects = self.objects.lock().unwrap();
        let changed = objects.get(&desired.name_any()) != Some(desired);
        objects.insert(desired.name_any(), desired.clone());
        Ok(Applied {
            object: desired.clone(),
            changed,
        })
    }
}

struct MemoryEndpoints {
    ready: bool,
}

#[async_trait]
impl EndpointsReader for MemoryEndpoints {
    async fn get(&self, _namespace: &str, _name: &str) -> Result<Option<Endpoints>> {
        if !self.ready {
            return Ok(None);
        }
        Ok(Some(Endpoints {
            subsets: Some(vec![EndpointSubset {
                addresses: Some(vec![EndpointAddress {
                    ip: "10.0.0.7".to_string(),
                    ..Default::default()
                }]),
                ..Default::default()
            }]),
            ..Default::default()
        }))
    }
}

struct MemoryStatus {
    mode: Mutex<ManagementState>,
    conditions: Mutex<Vec<Condition>>,
}

#[async_trait]
impl OperatorStatusStore for MemoryStatus {
    async fn read_mode(&self) -> Result<ManagementState> {
        Ok(self.mode.lock().unwrap().clone())
    }

    async fn write_conditions(&self, conditions: Vec<Condition>) -> Result<()> {
        *self.conditions.lock().unwrap() = conditions;
        Ok(())
    }
}

struct NoEvents;

#[async_trait]
impl EventRecorder for NoEvents {
    async fn warning(&self, _reason: &str, _message: &str) {}
}

struct Fixture {
    controller: APIServiceController,
    store: Arc<MemoryStore>,
    status: Arc<MemoryStatus>,
    manifest: tempfile::NamedTempFile,
}

fn fixture(endpoints_ready: bool, existing: &[&str]) -> Fixture {
    let mut manifest = tempfile::NamedTempFile::new().unwrap();
    manifest.write_all(MANIFEST.as_bytes()).unwrap();

    let store = Arc::new(MemoryStore::default());
    for name in existing {
        let svc = APIService::new(name, Default::default());
        store.objects.lock().unwrap().insert(name.to_string(), svc);
    }
    let status = Arc::new(MemoryStatus {
        mode: Mutex::new(ManagementState::Managed),
        conditions: Mutex::new(Vec::new()),
    });
    let (_trigger, shutdown) = shutdown_channel();

    let controller = APIServiceController::new(
        Arc::new(FileRegistrationSource::new(manifest.path())),
        Arc::new(EndpointPrecondition::new(
            Arc::new(MemoryEndpoints {
                ready: endpoints_ready,
            }),
            "monitoring",
        )),
        store.clone(),
        status.clone(),
        Arc::new(NoEvents),
        shutdown,
    );

    Fixture {
        controller,
        store,
        status,
        manifest,
    }
}

fn condition(status: &MemoryStatus, type_: &str) -> Condition {
    let conditions = status.conditions.lock().unwrap();
    find_condition(&conditions, type_).cloned().unwrap()
}

#[tokio::test]
async fn manifest_enabled_entries_are_applied_and_disabled_removed() {
    let f = fixture(true, &["v1alpha1.metrics.k8s.io"]);

    tokio_test::assert_ok!(f.controller.sync().await);

    let objects = f.store.objects.lock().unwrap();
    assert!(objects.contains_key("v1beta1.metrics.k8s.io"));
    assert!(!objects.contains_key("v1alpha1.metrics.k8s.io"));
    drop(objects);

    assert_eq!(
        condition(&f.status, CONDITION_TYPE_AVAILABLE).status,
        ConditionStatus::True
    );
    assert_eq!(
        condition(&f.status, CONDITION_TYPE_DEGRADED).status,
        ConditionStatus::False
    );
}

#[tokio::test]
async fn manifest_waits_for_backing_endpoints() {
    let f = fixture(false, &[]);

    f.controller.sync().await.unwrap();

    assert!(f.store.objects.lock().unwrap().is_empty());
    let available = condition(&f.status, CONDITION_TYPE_AVAILABLE);
    assert_eq!(available.status, ConditionStatus::False);
    assert_eq!(available.reason, "PreconditionNotReady");
}

#[tokio::test]
async fn removed_mode_clears_every_manifest_entry() {
    let f = fixture(true, &[]);
    f.controller.sync().await.unwrap();
    assert_eq!(f.store.objects.lock().unwrap().len(), 1);

    *f.status.mode.lock().unwrap() = ManagementState::Removed;
    f.controller.sync().await.unwrap();

    assert!(f.store.objects.lock().unwrap().is_empty());
}

#[tokio::test]
async fn missing_manifest_fails_the_cycle() {
    let f = fixture(true, &[]);
    let missing = f.manifest.path().with_extension("missing");
    let (_trigger, shutdown) = shutdown_channel();
    let controller = APIServiceController::new(
        Arc::new(FileRegistrationSource::new(missing)),
        Arc::new(EndpointPrecondition::new(
            Arc::new(MemoryEndpoints { ready: true }),
            "monitoring",
        )),
        f.store.clone(),
        f.status.clone(),
        Arc::new(NoEvents),
        shutdown,
    );

    let err = tokio_test::assert_err!(controller.sync().await);

    assert!(err.to_string().starts_with("I/O error"), "{}", err);
    assert!(f.status.conditions.lock().unwrap().is_empty());
}
