//! The network aggregate handed to test harnesses

use crate::{
    client_type::ClientType,
    clients::{ConsensusClients, ExecutionClients, Validator},
    error::{Error, Result},
    lifecycle::NetworkLifecycle,
    service_type::ServiceType,
};
use enclave_client::{Orchestrator, PortInfo};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Any discovered service, client or not
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    /// Service name
    pub name: String,
    /// Classified type
    pub service_type: ServiceType,
    /// Client implementation, `Unknown` for non-clients
    pub client_type: ClientType,
    /// Orchestrator status string
    pub status: String,
    /// Private IP address
    pub ip_address: String,
    /// Container / service UUID
    pub container_id: String,
    /// Named ports
    pub ports: BTreeMap<String, PortInfo>,
}

impl Service {
    /// Whether the orchestrator reports the service as running
    pub fn is_running(&self) -> bool {
        self.status.eq_ignore_ascii_case(enclave_client::STATUS_RUNNING)
    }
}

/// The HTTP server distributing genesis and network configuration files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApacheConfigServer {
    url: String,
}

impl ApacheConfigServer {
    /// Wrap a base URL. A trailing slash is dropped.
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            url: url.trim_end_matches('/').to_string(),
        }
    }

    /// Base URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// SSZ-encoded genesis state
    pub fn genesis_ssz_url(&self) -> String {
        format!("{}/network-configs/genesis.ssz", self.url)
    }

    /// Consensus layer chain configuration
    pub fn config_yaml_url(&self) -> String {
        format!("{}/network-configs/config.yaml", self.url)
    }

    /// Bootnode ENRs
    pub fn bootnodes_yaml_url(&self) -> String {
        format!("{}/network-configs/boot_enr.yaml", self.url)
    }

    /// Deposit contract deployment block
    pub fn deposit_contract_block_url(&self) -> String {
        format!("{}/network-configs/deposit_contract_block.txt", self.url)
    }
}

/// Parts assembled by the mapper
pub(crate) struct NetworkParts {
    pub name: String,
    pub chain_id: u64,
    pub enclave_name: String,
    pub execution_clients: ExecutionClients,
    pub consensus_clients: ConsensusClients,
    pub validators: Vec<Validator>,
    pub services: Vec<Service>,
    pub apache_config: Option<ApacheConfigServer>,
}

/// A discovered test network
///
/// Populated once when mapped and read-only afterwards. Call
/// [`cleanup`](Self::cleanup) on every exit path; dropping an uncleaned
/// network only starts a best-effort background teardown, and only when
/// [`NetworkOptions::cleanup_on_drop`](crate::NetworkOptions) is set.
pub struct Network {
    name: String,
    chain_id: u64,
    enclave_name: String,
    execution_clients: ExecutionClients,
    consensus_clients: ConsensusClients,
    validators: Vec<Validator>,
    services: Vec<Service>,
    apache_config: Option<ApacheConfigServer>,
    orchestrator: Arc<dyn Orchestrator>,
    lifecycle: Arc<NetworkLifecycle>,
}

impl Network {
    pub(crate) fn new(
        parts: NetworkParts,
        orchestrator: Arc<dyn Orchestrator>,
        lifecycle: Arc<NetworkLifecycle>,
    ) -> Self {
        Self {
            name: parts.name,
            chain_id: parts.chain_id,
            enclave_name: parts.enclave_name,
            execution_clients: parts.execution_clients,
            consensus_clients: parts.consensus_clients,
            validators: parts.validators,
            services: parts.services,
            apache_config: parts.apache_config,
            orchestrator,
            lifecycle,
        }
    }

    /// Network name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Chain id
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Enclave hosting the network
    pub fn enclave_name(&self) -> &str {
        &self.enclave_name
    }

    /// Execution layer clients
    pub fn execution_clients(&self) -> &ExecutionClients {
        &self.execution_clients
    }

    /// Consensus layer clients
    pub fn consensus_clients(&self) -> &ConsensusClients {
        &self.consensus_clients
    }

    /// Validator clients
    pub fn validators(&self) -> &[Validator] {
        &self.validators
    }

    /// Every service in the enclave
    pub fn services(&self) -> &[Service] {
        &self.services
    }

    /// Services of one type
    pub fn services_of_type(&self, service_type: ServiceType) -> impl Iterator<Item = &Service> {
        self.services
            .iter()
            .filter(move |service| service.service_type == service_type)
    }

    /// Look up a service by name
    pub fn service(&self, name: &str) -> Option<&Service> {
        self.services.iter().find(|service| service.name == name)
    }

    /// The configuration file server, if the enclave runs one
    pub fn apache_config(&self) -> Option<&ApacheConfigServer> {
        self.apache_config.as_ref()
    }

    /// Whether cleanup has run
    pub fn is_cleaned(&self) -> bool {
        self.lifecycle.is_cleaned()
    }

    /// Teardown state shared with signal listeners
    pub fn lifecycle(&self) -> &Arc<NetworkLifecycle> {
        &self.lifecycle
    }

    /// Stop the enclave's services without destroying it
    pub async fn stop(&self) -> Result<()> {
        info!("Stopping enclave '{}'", self.enclave_name);
        self.orchestrator
            .stop_enclave(&self.enclave_name)
            .await
            .map_err(Error::Stop)
    }

    /// Destroy the enclave
    ///
    /// Safe to call any number of times from any number of tasks or threads.
    /// The enclave is destroyed once; callers overlapping that teardown share
    /// its outcome and later callers get `Ok(())`.
    pub async fn cleanup(&self) -> Result<()> {
        self.lifecycle.cleanup().await
    }
}

impl Drop for Network {
    fn drop(&mut self) {
        self.lifecycle.reclaim();
    }
}

impl fmt::Debug for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Network")
            .field("name", &self.name)
            .field("chain_id", &self.chain_id)
            .field("enclave_name", &self.enclave_name)
            .field("execution_clients", &self.execution_clients.len())
            .field("consensus_clients", &self.consensus_clients.len())
            .field("validators", &self.validators.len())
            .field("services", &self.services.len())
            .field("apache_config", &self.apache_config)
            .field("lifecycle", &self.lifecycle)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apache_urls() {
        let apache = ApacheConfigServer::new("http://10.0.0.9:80/");
        assert_eq!(apache.url(), "http://10.0.0.9:80");
        assert_eq!(
            apache.genesis_ssz_url(),
            "http://10.0.0.9:80/network-configs/genesis.ssz"
        );
        assert_eq!(
            apache.config_yaml_url(),
            "http://10.0.0.9:80/network-configs/config.yaml"
        );
        assert_eq!(
            apache.bootnodes_yaml_url(),
            "http://10.0.0.9:80/network-configs/boot_enr.yaml"
        );
        assert_eq!(
            apache.deposit_contract_block_url(),
            "http://10.0.0.9:80/network-configs/deposit_contract_block.txt"
        );
    }
}
