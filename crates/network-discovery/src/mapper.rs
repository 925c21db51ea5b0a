//! Turns an enclave's raw service listing into a [`Network`]

use crate::{
    clients::{ConsensusClient, ConsensusClients, ExecutionClient, ExecutionClients, Validator},
    endpoints::{
        extract_consensus_endpoints, extract_execution_endpoints, extract_validator_endpoints,
        port_url,
    },
    error::{Error, Result},
    lifecycle::{CleanupFn, NetworkLifecycle, NetworkOptions},
    metadata::{MetadataParser, ServiceMetadata},
    network::{ApacheConfigServer, Network, NetworkParts, Service},
    service_type::ServiceType,
};
use enclave_client::{Orchestrator, PackageConfig, RawService, ServiceMap, WaitOptions};
use futures::FutureExt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Chain id used when the package configuration names none
///
/// A placeholder for local devnets, not a protocol default. Set
/// `network_params.chain_id` when the real value matters.
pub const DEFAULT_CHAIN_ID: u64 = 3_151_908;

/// Chain id from the package configuration, or [`DEFAULT_CHAIN_ID`]
pub fn resolve_chain_id(config: &PackageConfig) -> u64 {
    config
        .network_params
        .resolved_chain_id()
        .unwrap_or(DEFAULT_CHAIN_ID)
}

/// Maps orchestrator services to a typed network
#[derive(Clone)]
pub struct ServiceMapper {
    orchestrator: Arc<dyn Orchestrator>,
}

impl ServiceMapper {
    /// Create a mapper backed by an orchestrator
    pub fn new(orchestrator: Arc<dyn Orchestrator>) -> Self {
        Self { orchestrator }
    }

    /// List the enclave's services and map them
    ///
    /// Fails only if the listing fails. Services that cannot be classified
    /// or have no usable ports are kept with empty endpoints.
    pub async fn map_to_network(
        &self,
        enclave_id: &str,
        config: &PackageConfig,
        options: NetworkOptions,
    ) -> Result<Network> {
        let services = self
            .orchestrator
            .get_services(enclave_id)
            .await
            .map_err(Error::ListServices)?;
        Ok(self.map_services(enclave_id, config, &services, options))
    }

    /// Map an already fetched listing
    pub fn map_services(
        &self,
        enclave_id: &str,
        config: &PackageConfig,
        services: &ServiceMap,
        options: NetworkOptions,
    ) -> Network {
        let chain_id = resolve_chain_id(config);
        let parser = MetadataParser::new().with_chain_id(chain_id);

        let mut execution_clients = ExecutionClients::default();
        let mut consensus_clients = ConsensusClients::default();
        let mut validators = Vec::new();
        let mut all_services = Vec::with_capacity(services.len());
        let mut apache_config = None;

        for service in services.values() {
            let meta = parser.parse(service);
            debug!(
                "Classified '{}' as {} ({})",
                service.name, meta.service_type, meta.client_type
            );

            match meta.service_type {
                ServiceType::ExecutionClient => {
                    execution_clients.insert(execution_client(service, &meta));
                }
                ServiceType::ConsensusClient => {
                    consensus_clients.insert(consensus_client(service, &meta));
                }
                ServiceType::Validator => validators.push(validator(service, &meta)),
                ServiceType::Apache if apache_config.is_none() => {
                    apache_config = Some(ApacheConfigServer::new(apache_url(service)));
                }
                _ => {}
            }

            all_services.push(Service {
                name: service.name.clone(),
                service_type: meta.service_type,
                client_type: meta.client_type,
                status: service.status.clone(),
                ip_address: service.ip_address.clone(),
                container_id: service.uuid.clone(),
                ports: service.ports.clone(),
            });
        }

        info!(
            "Mapped enclave '{}': {} execution, {} consensus, {} validator clients, {} services",
            enclave_id,
            execution_clients.len(),
            consensus_clients.len(),
            validators.len(),
            all_services.len()
        );

        let parts = NetworkParts {
            name: config
                .enclave_name
                .clone()
                .unwrap_or_else(|| enclave_id.to_string()),
            chain_id,
            enclave_name: enclave_id.to_string(),
            execution_clients,
            consensus_clients,
            validators,
            services: all_services,
            apache_config,
        };

        let lifecycle = NetworkLifecycle::new(
            enclave_id,
            destroy_enclave(self.orchestrator.clone(), enclave_id),
            &options,
        );
        Network::new(parts, self.orchestrator.clone(), lifecycle)
    }
}

/// Run a package, optionally wait for its clients, and map the result
///
/// If anything fails after the enclave was created, the enclave is
/// destroyed before the error is returned, unless the options orphan it.
pub async fn launch(
    orchestrator: Arc<dyn Orchestrator>,
    config: &PackageConfig,
    options: NetworkOptions,
    wait: Option<WaitOptions>,
) -> Result<Network> {
    let run = orchestrator
        .run_package(config)
        .await
        .map_err(Error::RunPackage)?;
    info!("Package running in enclave '{}'", run.enclave_id);

    let orphan = options.orphan_on_exit;
    let mapped = async {
        if let Some(wait) = wait {
            let names = config.expected_client_services();
            enclave_client::wait_until_ready(orchestrator.as_ref(), &run.enclave_id, &names, wait)
                .await
                .map_err(Error::WaitForServices)?;
        }
        ServiceMapper::new(orchestrator.clone())
            .map_to_network(&run.enclave_id, config, options)
            .await
    }
    .await;

    if mapped.is_err() && !orphan {
        warn!("Discovery failed, destroying enclave '{}'", run.enclave_id);
        if let Err(e) = orchestrator.destroy_enclave(&run.enclave_id).await {
            warn!("Failed to destroy enclave '{}': {}", run.enclave_id, e);
        }
    }
    mapped
}

fn destroy_enclave(orchestrator: Arc<dyn Orchestrator>, enclave_id: &str) -> CleanupFn {
    let enclave_id = enclave_id.to_string();
    Box::new(move || {
        let orchestrator = orchestrator.clone();
        let enclave_id = enclave_id.clone();
        async move { orchestrator.destroy_enclave(&enclave_id).await }.boxed()
    })
}

fn execution_client(service: &RawService, meta: &ServiceMetadata) -> ExecutionClient {
    let endpoints = extract_execution_endpoints(service);
    if endpoints.rpc_url.is_empty() {
        warn!("Execution client '{}' has no RPC endpoint", service.name);
    }
    ExecutionClient {
        name: meta.node_name.clone(),
        client_type: meta.client_type,
        version: meta.version.clone(),
        endpoints,
        p2p_port: meta.p2p_port,
        enode: meta.enode.clone(),
        service_name: service.name.clone(),
        container_id: service.uuid.clone(),
        node_index: meta.node_index,
    }
}

fn consensus_client(service: &RawService, meta: &ServiceMetadata) -> ConsensusClient {
    let endpoints = extract_consensus_endpoints(service);
    if endpoints.beacon_url.is_empty() {
        warn!("Consensus client '{}' has no beacon endpoint", service.name);
    }
    ConsensusClient {
        name: meta.node_name.clone(),
        client_type: meta.client_type,
        version: meta.version.clone(),
        endpoints,
        p2p_port: meta.p2p_port,
        enr: meta.enr.clone(),
        peer_id: meta.peer_id.clone(),
        service_name: service.name.clone(),
        container_id: service.uuid.clone(),
        node_index: meta.node_index,
    }
}

fn validator(service: &RawService, meta: &ServiceMetadata) -> Validator {
    Validator {
        name: meta.node_name.clone(),
        client_type: meta.client_type,
        version: meta.version.clone(),
        endpoints: extract_validator_endpoints(service),
        validator_count: meta.validator_count,
        validator_start_index: meta.validator_start_index,
        service_name: service.name.clone(),
        container_id: service.uuid.clone(),
    }
}

/// Base URL of the config server: its first HTTP-like port, else port 80
fn apache_url(service: &RawService) -> String {
    service
        .ports
        .iter()
        .find(|(name, _)| name.to_lowercase().contains("http"))
        .map(|(_, port)| port_url(service, port, "http"))
        .unwrap_or_else(|| {
            let host = if service.ip_address.is_empty() {
                "localhost"
            } else {
                service.ip_address.as_str()
            };
            format!("http://{}:80", host)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client_type::ClientType;
    use enclave_client::{MemoryOrchestrator, NetworkParams, PortInfo};

    fn mapper() -> ServiceMapper {
        ServiceMapper::new(Arc::new(MemoryOrchestrator::new()))
    }

    fn quiet() -> NetworkOptions {
        NetworkOptions::default().without_signals().with_cleanup_on_drop(false)
    }

    #[test]
    fn test_chain_id_resolution() {
        let mut config = PackageConfig::default();
        assert_eq!(resolve_chain_id(&config), DEFAULT_CHAIN_ID);

        config.network_params = NetworkParams {
            network_id: Some("1337".to_string()),
            ..Default::default()
        };
        assert_eq!(resolve_chain_id(&config), 1337);

        config.network_params.chain_id = Some(32382);
        assert_eq!(resolve_chain_id(&config), 32382);
    }

    #[test]
    fn test_apache_without_http_port_uses_port_80() {
        let service = RawService::new("apache").with_ip("10.0.0.9");
        assert_eq!(apache_url(&service), "http://10.0.0.9:80");

        let service = RawService::new("apache")
            .with_ip("10.0.0.9")
            .with_port("http", PortInfo::tcp(8080));
        assert_eq!(apache_url(&service), "http://10.0.0.9:8080");
    }

    #[test]
    fn test_composite_name_maps_to_execution_geth() {
        let mut services = ServiceMap::new();
        let service = RawService::new("el-1-geth-lighthouse")
            .with_ip("10.0.0.2")
            .with_port("rpc", PortInfo::tcp(8545))
            .with_port("engine-rpc", PortInfo::tcp(8551))
            .with_port("http", PortInfo::tcp(4000));
        services.insert(service.name.clone(), service);

        let network = mapper().map_services("devnet", &PackageConfig::default(), &services, quiet());
        assert_eq!(network.execution_clients().len(), 1);
        assert!(network.consensus_clients().is_empty());
        let geth = &network.execution_clients().by_type(ClientType::Geth)[0];
        assert_eq!(geth.rpc_url(), "http://10.0.0.2:8545");
        assert_eq!(geth.engine_url(), "http://10.0.0.2:8551");
        assert_eq!(geth.name, "geth-lighthouse");
        assert_eq!(geth.node_index, 1);
    }
}
