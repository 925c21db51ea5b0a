//! The orchestrator trait
//!
//! Everything the network model needs from the component that actually
//! creates and destroys enclaves. Implementations decide how they talk to
//! the container runtime; callers only rely on the data shapes in
//! [`crate::models`].

use crate::{
    config::PackageConfig,
    error::Result,
    logs::LogOptions,
    models::{RunResult, ServiceMap},
    wait::{WaitOptions, wait_until_ready},
};
use async_trait::async_trait;
use std::time::Duration;

/// Trait for enclave orchestrators
#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// Run the network package in a new enclave
    async fn run_package(&self, config: &PackageConfig) -> Result<RunResult>;

    /// List all services of an enclave
    async fn get_services(&self, enclave_id: &str) -> Result<ServiceMap>;

    /// Stop all services of an enclave without removing it
    async fn stop_enclave(&self, enclave_id: &str) -> Result<()>;

    /// Remove an enclave and everything in it
    async fn destroy_enclave(&self, enclave_id: &str) -> Result<()>;

    /// Fetch raw log lines of one service
    ///
    /// `since` and `follow` from the options are for the orchestrator to
    /// honour; line filtering is applied by [`Orchestrator::filtered_logs`].
    async fn service_logs(
        &self,
        enclave_id: &str,
        service: &str,
        options: &LogOptions,
    ) -> Result<Vec<String>>;

    /// Block until all named services report running, or the timeout expires
    async fn wait_for_services(
        &self,
        enclave_id: &str,
        names: &[String],
        timeout: Duration,
    ) -> Result<()> {
        wait_until_ready(self, enclave_id, names, WaitOptions::new(timeout)).await
    }

    /// Fetch log lines of one service with the filter options applied
    async fn filtered_logs(
        &self,
        enclave_id: &str,
        service: &str,
        options: &LogOptions,
    ) -> Result<Vec<String>> {
        let filter = options.compile()?;
        let lines = self.service_logs(enclave_id, service, options).await?;
        Ok(filter.apply(lines))
    }
}
