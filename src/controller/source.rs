//! Registration sources
//!
//! The manifest file is the operator's declaration of every APIService it
//! owns. It is re-read on each sync so toggling `enabled` takes effect on the
//! next cycle without a restart.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::clients::{ManagedRegistrations, RegistrationSource};
use crate::crd::{APIService, APIServiceSpec};
use crate::error::{Error, Result};

/// Label stamped on every APIService the operator applies
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
pub const MANAGED_BY_VALUE: &str = "apiservice-operator";

/// On-disk manifest listing the owned APIServices
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationManifest {
    #[serde(default)]
    pub api_services: Vec<ManifestEntry>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    pub spec: APIServiceSpec,
}

fn default_enabled() -> bool {
    true
}

impl RegistrationManifest {
    pub fn parse(raw: &str) -> Result<Self> {
        let manifest: RegistrationManifest = serde_yaml::from_str(raw)?;
        for entry in &manifest.api_services {
            if entry.name.is_empty() {
                return Err(Error::ConfigError(
                    "manifest entry is missing a name".to_string(),
                ));
            }
            let expected = format!("{}.{}", entry.spec.version, entry.spec.group);
            if entry.name != expected {
                return Err(Error::ConfigError(format!(
                    "APIService {} must be named {} after its version and group",
                    entry.name, expected
                )));
            }
        }
        Ok(manifest)
    }

    /// Split the entries by their `enabled` flag
    pub fn into_managed(self) -> ManagedRegistrations {
        let mut managed = ManagedRegistrations::default();
        for entry in self.api_services {
            let enabled = entry.enabled;
            let svc = entry.into_api_service();
            if enabled {
                managed.enabled.push(svc);
            } else {
                managed.disabled.push(svc);
            }
        }
        managed
    }
}

impl ManifestEntry {
    fn into_api_service(self) -> APIService {
        let mut svc = APIService::new(&self.name, self.spec);
        let mut labels = self.labels;
        labels.insert(MANAGED_BY_LABEL.to_string(), MANAGED_BY_VALUE.to_string());
        svc.metadata.labels = Some(labels);
        svc
    }
}

/// Reads the manifest from disk on every call
pub struct FileRegistrationSource {
    path: PathBuf,
}

impl FileRegistrationSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RegistrationSource for FileRegistrationSource {
    async fn list_managed(&self) -> Result<ManagedRegistrations> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        let managed = RegistrationManifest::parse(&raw)?.into_managed();
        debug!(
            "Loaded {} enabled and {} disabled APIServices from {}",
            managed.enabled.len(),
            managed.disabled.len(),
            self.path.display()
        );
        Ok(managed)
    }
}

/// Fixed lists, for embedding the controller in another binary
pub struct StaticRegistrationSource {
    managed: ManagedRegistrations,
}

impl StaticRegistrationSource {
    pub fn new(enabled: Vec<APIService>, disabled: Vec<APIService>) -> Self {
        Self {
            managed: ManagedRegistrations { enabled, disabled },
        }
    }
}

#[async_trait]
impl RegistrationSource for StaticRegistrationSource {
    async fn list_managed(&self) -> Result<ManagedRegistrations> {
        Ok(self.managed.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use kube::ResourceExt;

    use super::*;

    const MANIFEST: &str = r#"
apiServices:
  - name: v1beta1.metrics.k8s.io
    spec:
      group: metrics.k8s.io
      version: v1beta1
      groupPriorityMinimum: 100
      versionPriority: 100
      service:
        namespace: metrics
        name: metrics-server
  - name: v1alpha1.metrics.k8s.io
    enabled: false
    labels:
      team: observability
    spec:
      group: metrics.k8s.io
      version: v1alpha1
      groupPriorityMinimum: 100
      versionPriority: 50
      service:
        namespace: metrics
        name: metrics-server
        port: 8443
"#;

    #[test]
    fn test_manifest_splits_by_enabled_flag() {
        let managed = RegistrationManifest::parse(MANIFEST).unwrap().into_managed();

        assert_eq!(managed.enabled.len(), 1);
        assert_eq!(managed.disabled.len(), 1);
        assert_eq!(managed.enabled[0].name_any(), "v1beta1.metrics.k8s.io");
        assert_eq!(managed.disabled[0].name_any(), "v1alpha1.metrics.k8s.io");
    }

    #[test]
    fn test_manifest_labels_objects_as_managed() {
        let managed = RegistrationManifest::parse(MANIFEST).unwrap().into_managed();
        let labels = managed.disabled[0].labels();

        assert_eq!(labels.get(MANAGED_BY_LABEL).unwrap(), MANAGED_BY_VALUE);
        assert_eq!(labels.get("team").unwrap(), "observability");
    }

    #[test]
    fn test_manifest_rejects_mismatched_name() {
        let raw = r#"
apiServices:
  - name: metrics
    spec:
      group: metrics.k8s.io
      version: v1beta1
      groupPriorityMinimum: 100
      versionPriority: 100
"#;
        let err = RegistrationManifest::parse(raw).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[tokio::test]
    async fn test_file_source_reads_on_every_call() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MANIFEST.as_bytes()).unwrap();
        let source = FileRegistrationSource::new(file.path());

        let first = source.list_managed().await.unwrap();
        assert_eq!(first.enabled.len(), 1);

        let toggled = MANIFEST.replace("enabled: false", "enabled: true");
        std::fs::write(file.path(), toggled).unwrap();

        let second = source.list_managed().await.unwrap();
        assert_eq!(second.enabled.len(), 2);
        assert!(second.disabled.is_empty());
    }

    #[tokio::test]
    async fn test_missing_manifest_is_an_error() {
        let source = FileRegistrationSource::new("/nonexistent/apiservices.yaml");
        let err = source.list_managed().await.unwrap_err();
        assert!(matches!(err, Error::IoError(_)));
    }
}
