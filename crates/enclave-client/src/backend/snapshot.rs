//! File-backed orchestrator for offline discovery

use crate::{
    config::PackageConfig,
    error::{Error, Result},
    logs::LogOptions,
    models::{RunResult, ServiceMap},
    orchestrator::Orchestrator,
};
use async_trait::async_trait;
use std::path::Path;
use tracing::info;

/// Orchestrator serving a recorded service listing
///
/// The snapshot is a map of service name to raw service, as JSON or YAML.
/// Entries may omit `name`; the map key is used instead. Lifecycle calls
/// are accepted and logged, nothing is torn down.
pub struct SnapshotOrchestrator {
    enclave_id: String,
    services: ServiceMap,
}

impl SnapshotOrchestrator {
    /// Wrap an in-memory listing
    pub fn new(enclave_id: impl Into<String>, services: ServiceMap) -> Self {
        Self {
            enclave_id: enclave_id.into(),
            services,
        }
    }

    /// Load a listing from file
    pub async fn from_file(enclave_id: impl Into<String>, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = async_fs::read_to_string(path).await?;

        let mut services: ServiceMap = match path.extension().and_then(|s| s.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&contents)?,
            _ => serde_json::from_str(&contents)?,
        };
        for (key, service) in services.iter_mut() {
            if service.name.is_empty() {
                service.name = key.clone();
            }
        }

        info!(
            "Loaded {} services from snapshot {}",
            services.len(),
            path.display()
        );
        Ok(Self::new(enclave_id, services))
    }

    /// The enclave id this snapshot answers for
    pub fn enclave_id(&self) -> &str {
        &self.enclave_id
    }

    fn check_enclave(&self, enclave_id: &str) -> Result<()> {
        if enclave_id == self.enclave_id {
            Ok(())
        } else {
            Err(Error::EnclaveNotFound(enclave_id.to_string()))
        }
    }
}

#[async_trait]
impl Orchestrator for SnapshotOrchestrator {
    async fn run_package(&self, _config: &PackageConfig) -> Result<RunResult> {
        Ok(RunResult {
            enclave_id: self.enclave_id.clone(),
            output: Vec::new(),
        })
    }

    async fn get_services(&self, enclave_id: &str) -> Result<ServiceMap> {
        self.check_enclave(enclave_id)?;
        Ok(self.services.clone())
    }

    async fn stop_enclave(&self, enclave_id: &str) -> Result<()> {
        self.check_enclave(enclave_id)?;
        info!("Snapshot enclave '{}' has nothing to stop", enclave_id);
        Ok(())
    }

    async fn destroy_enclave(&self, enclave_id: &str) -> Result<()> {
        self.check_enclave(enclave_id)?;
        info!("Snapshot enclave '{}' has nothing to destroy", enclave_id);
        Ok(())
    }

    async fn service_logs(
        &self,
        enclave_id: &str,
        service: &str,
        _options: &LogOptions,
    ) -> Result<Vec<String>> {
        self.check_enclave(enclave_id)?;
        if self.services.contains_key(service) {
            Ok(Vec::new())
        } else {
            Err(Error::ServiceNotFound {
                enclave: enclave_id.to_string(),
                service: service.to_string(),
            })
        }
    }
}
