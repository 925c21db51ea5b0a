//! Typed model of the Ethereum test network running in an enclave
//!
//! The orchestrator reports services as loosely typed records: a name, an
//! address and a map of named ports. This crate classifies each service,
//! derives client endpoints from its ports, and assembles a [`Network`]
//! whose execution and consensus clients can be looked up by
//! implementation.
//!
//! Classification never fails. Unrecognized services are `Other`, unknown
//! implementations are `Unknown`, and missing endpoints are empty strings.
//! Only a failed service listing aborts discovery.
//!
//! # Example
//!
//! ```no_run
//! use enclave_client::{MemoryOrchestrator, PackageConfig, PortInfo, RawService};
//! use network_discovery::{ClientType, NetworkOptions, ServiceMapper};
//! use std::sync::Arc;
//!
//! # async fn example() -> network_discovery::Result<()> {
//! let orchestrator = Arc::new(MemoryOrchestrator::new());
//! orchestrator.insert_enclave(
//!     "devnet",
//!     [RawService::new("el-1-geth-lighthouse")
//!         .with_ip("10.0.0.2")
//!         .with_port("rpc", PortInfo::tcp(8545))],
//! );
//!
//! let network = ServiceMapper::new(orchestrator)
//!     .map_to_network("devnet", &PackageConfig::default(), NetworkOptions::default())
//!     .await?;
//!
//! for geth in network.execution_clients().by_type(ClientType::Geth) {
//!     println!("{} -> {}", geth.service_name, geth.rpc_url());
//! }
//!
//! network.cleanup().await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod client_type;
pub mod clients;
pub mod endpoints;
pub mod error;
pub mod lifecycle;
pub mod mapper;
pub mod metadata;
pub mod network;
pub mod service_type;

pub use client_type::{ClientFamily, ClientType};
pub use clients::{
    ClientCollection, ClientRecord, ConsensusClient, ConsensusClients, ExecutionClient,
    ExecutionClients, Validator,
};
pub use endpoints::{
    ConsensusEndpoints, ExecutionEndpoints, ValidatorEndpoints, extract_consensus_endpoints,
    extract_execution_endpoints, extract_validator_endpoints, parse_endpoint_url,
    validate_endpoint,
};
pub use error::{Error, Result};
pub use lifecycle::{
    CleanupFn, NetworkLifecycle, NetworkOptions, SignalCallback, exit_on_signal,
};
pub use mapper::{DEFAULT_CHAIN_ID, ServiceMapper, launch, resolve_chain_id};
pub use metadata::{
    MetadataParser, PortMetadata, ServiceMetadata, parse_node_info, parse_validator_range,
};
pub use network::{ApacheConfigServer, Network, Service};
pub use service_type::ServiceType;
