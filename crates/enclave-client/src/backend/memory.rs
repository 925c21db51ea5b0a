//! In-memory orchestrator

use crate::{
    config::PackageConfig,
    error::{Error, Result},
    logs::LogOptions,
    models::{RawService, RunResult, STATUS_STOPPED, ServiceMap},
    orchestrator::Orchestrator,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tracing::debug;

/// Orchestrator that keeps enclaves in memory
///
/// Used by tests: services are seeded directly, every call is counted and
/// failures can be injected per operation.
pub struct MemoryOrchestrator {
    /// Enclave id -> services
    enclaves: RwLock<HashMap<String, ServiceMap>>,
    /// Services every `run_package` call creates
    package_services: RwLock<ServiceMap>,
    /// (enclave, service) -> log lines
    logs: RwLock<HashMap<(String, String), Vec<String>>>,
    /// Injected failures
    get_services_error: RwLock<Option<String>>,
    destroy_error: RwLock<Option<String>>,
    /// Delay inside `destroy_enclave`, to widen race windows
    destroy_delay: RwLock<Option<Duration>>,
    calls: CallCounts,
}

#[derive(Default)]
struct CallCounts {
    run_package: AtomicUsize,
    get_services: AtomicUsize,
    stop: AtomicUsize,
    destroy: AtomicUsize,
}

impl MemoryOrchestrator {
    /// Create an orchestrator with no enclaves
    pub fn new() -> Self {
        Self {
            enclaves: RwLock::new(HashMap::new()),
            package_services: RwLock::new(ServiceMap::new()),
            logs: RwLock::new(HashMap::new()),
            get_services_error: RwLock::new(None),
            destroy_error: RwLock::new(None),
            destroy_delay: RwLock::new(None),
            calls: CallCounts::default(),
        }
    }

    /// Seed an enclave with services
    pub fn insert_enclave(
        &self,
        enclave_id: impl Into<String>,
        services: impl IntoIterator<Item = RawService>,
    ) {
        let services = services
            .into_iter()
            .map(|s| (s.name.clone(), s))
            .collect();
        write(&self.enclaves).insert(enclave_id.into(), services);
    }

    /// Services each `run_package` call creates in its new enclave
    pub fn set_package_services(&self, services: impl IntoIterator<Item = RawService>) {
        *write(&self.package_services) = services
            .into_iter()
            .map(|s| (s.name.clone(), s))
            .collect();
    }

    /// Change the status of one service
    pub fn set_service_status(&self, enclave_id: &str, service: &str, status: &str) -> Result<()> {
        let mut enclaves = write(&self.enclaves);
        let services = enclaves
            .get_mut(enclave_id)
            .ok_or_else(|| Error::EnclaveNotFound(enclave_id.to_string()))?;
        let entry = services.get_mut(service).ok_or_else(|| Error::ServiceNotFound {
            enclave: enclave_id.to_string(),
            service: service.to_string(),
        })?;
        entry.status = status.to_string();
        Ok(())
    }

    /// Seed log lines for one service
    pub fn set_logs(&self, enclave_id: &str, service: &str, lines: Vec<String>) {
        write(&self.logs).insert((enclave_id.to_string(), service.to_string()), lines);
    }

    /// Make `get_services` fail with this message
    pub fn fail_get_services(&self, message: impl Into<String>) {
        *write(&self.get_services_error) = Some(message.into());
    }

    /// Make `destroy_enclave` fail with this message
    pub fn fail_destroy(&self, message: impl Into<String>) {
        *write(&self.destroy_error) = Some(message.into());
    }

    /// Sleep inside `destroy_enclave`
    pub fn set_destroy_delay(&self, delay: Duration) {
        *write(&self.destroy_delay) = Some(delay);
    }

    /// Whether an enclave exists
    pub fn has_enclave(&self, enclave_id: &str) -> bool {
        read(&self.enclaves).contains_key(enclave_id)
    }

    /// Number of `run_package` calls
    pub fn run_package_calls(&self) -> usize {
        self.calls.run_package.load(Ordering::SeqCst)
    }

    /// Number of `get_services` calls
    pub fn get_services_calls(&self) -> usize {
        self.calls.get_services.load(Ordering::SeqCst)
    }

    /// Number of `stop_enclave` calls
    pub fn stop_calls(&self) -> usize {
        self.calls.stop.load(Ordering::SeqCst)
    }

    /// Number of `destroy_enclave` calls
    pub fn destroy_calls(&self) -> usize {
        self.calls.destroy.load(Ordering::SeqCst)
    }
}

impl Default for MemoryOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl Orchestrator for MemoryOrchestrator {
    async fn run_package(&self, config: &PackageConfig) -> Result<RunResult> {
        self.calls.run_package.fetch_add(1, Ordering::SeqCst);
        config.validate()?;

        let enclave_id = config.enclave_name.clone().unwrap_or_else(|| {
            format!("enclave-{}", &uuid::Uuid::new_v4().simple().to_string()[..8])
        });

        let mut enclaves = write(&self.enclaves);
        if enclaves.contains_key(&enclave_id) {
            return Err(Error::orchestrator(format!(
                "enclave '{}' already exists",
                enclave_id
            )));
        }
        enclaves.insert(enclave_id.clone(), read(&self.package_services).clone());
        debug!("Created in-memory enclave '{}'", enclave_id);

        Ok(RunResult {
            enclave_id,
            output: vec![format!("ran {}", config.package_id)],
        })
    }

    async fn get_services(&self, enclave_id: &str) -> Result<ServiceMap> {
        self.calls.get_services.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = read(&self.get_services_error).clone() {
            return Err(Error::Orchestrator(message));
        }

        read(&self.enclaves)
            .get(enclave_id)
            .cloned()
            .ok_or_else(|| Error::EnclaveNotFound(enclave_id.to_string()))
    }

    async fn stop_enclave(&self, enclave_id: &str) -> Result<()> {
        self.calls.stop.fetch_add(1, Ordering::SeqCst);
        let mut enclaves = write(&self.enclaves);
        let services = enclaves
            .get_mut(enclave_id)
            .ok_or_else(|| Error::EnclaveNotFound(enclave_id.to_string()))?;
        for service in services.values_mut() {
            service.status = STATUS_STOPPED.to_string();
        }
        Ok(())
    }

    async fn destroy_enclave(&self, enclave_id: &str) -> Result<()> {
        self.calls.destroy.fetch_add(1, Ordering::SeqCst);

        let delay = *read(&self.destroy_delay);
        if let Some(delay) = delay {
            async_io::Timer::after(delay).await;
        }

        if let Some(message) = read(&self.destroy_error).clone() {
            return Err(Error::Orchestrator(message));
        }

        write(&self.enclaves)
            .remove(enclave_id)
            .map(|_| ())
            .ok_or_else(|| Error::EnclaveNotFound(enclave_id.to_string()))
    }

    async fn service_logs(
        &self,
        enclave_id: &str,
        service: &str,
        _options: &LogOptions,
    ) -> Result<Vec<String>> {
        read(&self.logs)
            .get(&(enclave_id.to_string(), service.to_string()))
            .cloned()
            .ok_or_else(|| Error::ServiceNotFound {
                enclave: enclave_id.to_string(),
                service: service.to_string(),
            })
    }
}
