//! Auxiliary facts extracted from a service and their JSON form

use crate::{
    client_type::{ClientFamily, ClientType},
    error::Result,
    service_type::ServiceType,
};
use enclave_client::RawService;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Version reported until a client API is queried for the real one
pub const UNKNOWN_VERSION: &str = "unknown";

static NODE_INFO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(el|cl)-(\d+)-(.+)$").expect("node info pattern is valid"));

static VALIDATOR_RANGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"validator-(\d+)-(\d+)").expect("validator pattern is valid"));

/// Everything discovery knows about one service
///
/// Identity fields (`enode`, `enr`, `peer_id`) stay empty and `version`
/// stays [`UNKNOWN_VERSION`] until filled from the client's own API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceMetadata {
    /// Service name
    pub name: String,
    /// Classified service type
    pub service_type: ServiceType,
    /// Classified client implementation
    pub client_type: ClientType,
    /// Orchestrator status string
    pub status: String,
    /// Container / service UUID
    pub container_id: String,
    /// Private IP address
    pub ip_address: String,
    /// Named ports
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub ports: BTreeMap<String, PortMetadata>,
    /// Node index from `el-N-…`/`cl-N-…` names, 0 otherwise
    pub node_index: u32,
    /// Name remainder after the node index, or the full name
    pub node_name: String,
    /// Chain the service belongs to
    pub chain_id: u64,
    /// Number of validator keys
    pub validator_count: u32,
    /// Index of the first validator key
    pub validator_start_index: u32,
    /// Client version
    pub version: String,
    /// Peer-to-peer port, 0 if none
    pub p2p_port: u16,
    /// Execution layer node record
    pub enode: String,
    /// Consensus layer node record
    pub enr: String,
    /// libp2p peer id
    pub peer_id: String,
}

/// A port as recorded in [`ServiceMetadata`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortMetadata {
    /// Port number
    pub number: u16,
    /// Transport protocol
    pub protocol: String,
    /// Precomputed URL, empty if none
    pub url: String,
}

/// Builds [`ServiceMetadata`] records for one chain
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataParser {
    chain_id: u64,
}

impl MetadataParser {
    /// Parser for chain id 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp records with a chain id
    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = chain_id;
        self
    }

    /// Extract metadata from a service. Malformed names degrade to zero values.
    pub fn parse(&self, service: &RawService) -> ServiceMetadata {
        let service_type = ServiceType::classify(&service.name, &service.port_names());
        let family = match service_type {
            ServiceType::Validator => Some(ClientFamily::Consensus),
            other => other.family(),
        };
        let client_type = family
            .map(|family| ClientType::classify(&service.name, family))
            .unwrap_or_default();

        let (node_index, node_name) = parse_node_info(&service.name);
        let (validator_count, validator_start_index) = parse_validator_range(&service.name);

        let ports = service
            .ports
            .iter()
            .map(|(name, port)| {
                let meta = PortMetadata {
                    number: port.number,
                    protocol: port.protocol.clone(),
                    url: port.precomputed().unwrap_or_default().to_string(),
                };
                (name.clone(), meta)
            })
            .collect();

        ServiceMetadata {
            name: service.name.clone(),
            service_type,
            client_type,
            status: service.status.clone(),
            container_id: service.uuid.clone(),
            ip_address: service.ip_address.clone(),
            ports,
            node_index,
            node_name,
            chain_id: self.chain_id,
            validator_count,
            validator_start_index,
            version: UNKNOWN_VERSION.to_string(),
            p2p_port: p2p_port(service),
            enode: String::new(),
            enr: String::new(),
            peer_id: String::new(),
        }
    }

    /// Serialize a record to JSON
    pub fn serialize(metadata: &ServiceMetadata) -> Result<String> {
        Ok(serde_json::to_string(metadata)?)
    }

    /// Deserialize a record from JSON
    pub fn deserialize(json: &str) -> Result<ServiceMetadata> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Node index and name from an `el-N-rest` / `cl-N-rest` service name
///
/// Names that do not match, or whose index overflows, give `(0, name)`.
pub fn parse_node_info(name: &str) -> (u32, String) {
    NODE_INFO
        .captures(name)
        .and_then(|caps| {
            let index: u32 = caps[2].parse().ok()?;
            Some((index, caps[3].to_string()))
        })
        .unwrap_or_else(|| (0, name.to_string()))
}

/// Validator count and start index from a `validator-COUNT-START` name
pub fn parse_validator_range(name: &str) -> (u32, u32) {
    VALIDATOR_RANGE
        .captures(name)
        .and_then(|caps| {
            let count: u32 = caps[1].parse().ok()?;
            let start: u32 = caps[2].parse().ok()?;
            Some((count, start))
        })
        .unwrap_or((0, 0))
}

fn p2p_port(service: &RawService) -> u16 {
    let mut candidates = service.ports.iter().filter(|(name, _)| {
        let name = name.to_lowercase();
        name.contains("discovery") || name.contains("p2p")
    });
    let first = candidates.clone().next();
    candidates
        .find(|(_, port)| port.is_tcp())
        .or(first)
        .map(|(_, port)| port.number)
        .unwrap_or(0)
}
