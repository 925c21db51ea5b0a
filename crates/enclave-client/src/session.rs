//! Explicit orchestrator session
//!
//! A session carries the orchestrator handle and the enclaves created
//! through it. Callers pass it around instead of reaching for global state.

use crate::{
    config::PackageConfig,
    error::Result,
    models::RunResult,
    orchestrator::Orchestrator,
};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{info, warn};

/// Orchestrator handle plus the enclaves it created
#[derive(Clone)]
pub struct EnclaveSession {
    orchestrator: Arc<dyn Orchestrator>,
    enclaves: Arc<Mutex<Vec<String>>>,
}

impl EnclaveSession {
    /// Create a session over an orchestrator
    pub fn new(orchestrator: Arc<dyn Orchestrator>) -> Self {
        Self {
            orchestrator,
            enclaves: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// The orchestrator this session talks to
    pub fn orchestrator(&self) -> Arc<dyn Orchestrator> {
        Arc::clone(&self.orchestrator)
    }

    /// Run a package and remember the enclave it created
    pub async fn run_package(&self, config: &PackageConfig) -> Result<RunResult> {
        let result = self.orchestrator.run_package(config).await?;
        self.track(&result.enclave_id);
        Ok(result)
    }

    /// Remember an enclave created elsewhere
    pub fn track(&self, enclave_id: &str) {
        let mut enclaves = self.enclaves.lock().unwrap_or_else(PoisonError::into_inner);
        if !enclaves.iter().any(|e| e == enclave_id) {
            enclaves.push(enclave_id.to_string());
        }
    }

    /// Forget an enclave, e.g. after it was destroyed by its network
    pub fn forget(&self, enclave_id: &str) {
        let mut enclaves = self.enclaves.lock().unwrap_or_else(PoisonError::into_inner);
        enclaves.retain(|e| e != enclave_id);
    }

    /// Enclaves created in this session that were not destroyed yet
    pub fn enclaves(&self) -> Vec<String> {
        self.enclaves
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Destroy every tracked enclave
    ///
    /// Keeps going after a failure and returns the first error seen.
    pub async fn destroy_all(&self) -> Result<()> {
        let enclaves = self.enclaves();
        let mut first_error = None;

        for enclave_id in enclaves {
            match self.orchestrator.destroy_enclave(&enclave_id).await {
                Ok(()) => {
                    info!("Destroyed enclave '{}'", enclave_id);
                    self.forget(&enclave_id);
                }
                Err(e) => {
                    warn!("Failed to destroy enclave '{}': {}", enclave_id, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
