//! Typed client records and the per-family collections holding them

use crate::{
    client_type::ClientType,
    endpoints::{ConsensusEndpoints, ExecutionEndpoints, ValidatorEndpoints},
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Common view over the client record types
pub trait ClientRecord {
    /// Client implementation
    fn client_type(&self) -> ClientType;

    /// Node name (service name without the `el-N-`/`cl-N-` prefix)
    fn name(&self) -> &str;

    /// Full orchestrator service name
    fn service_name(&self) -> &str;
}

/// An execution layer client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionClient {
    /// Node name
    pub name: String,
    /// Client implementation
    pub client_type: ClientType,
    /// Client version
    pub version: String,
    /// Discovered endpoints
    pub endpoints: ExecutionEndpoints,
    /// Peer-to-peer port, 0 if none
    pub p2p_port: u16,
    /// Node record, empty until queried from the client
    pub enode: String,
    /// Orchestrator service name
    pub service_name: String,
    /// Container / service UUID
    pub container_id: String,
    /// Participant index
    pub node_index: u32,
}

impl ExecutionClient {
    /// JSON-RPC URL
    pub fn rpc_url(&self) -> &str {
        &self.endpoints.rpc_url
    }

    /// WebSocket URL
    pub fn ws_url(&self) -> &str {
        &self.endpoints.ws_url
    }

    /// Engine API URL
    pub fn engine_url(&self) -> &str {
        &self.endpoints.engine_url
    }
}

/// A consensus layer (beacon) client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusClient {
    /// Node name
    pub name: String,
    /// Client implementation
    pub client_type: ClientType,
    /// Client version
    pub version: String,
    /// Discovered endpoints
    pub endpoints: ConsensusEndpoints,
    /// Peer-to-peer port, 0 if none
    pub p2p_port: u16,
    /// Node record, empty until queried from the client
    pub enr: String,
    /// libp2p peer id, empty until queried from the client
    pub peer_id: String,
    /// Orchestrator service name
    pub service_name: String,
    /// Container / service UUID
    pub container_id: String,
    /// Participant index
    pub node_index: u32,
}

impl ConsensusClient {
    /// Beacon API URL
    pub fn beacon_url(&self) -> &str {
        &self.endpoints.beacon_url
    }
}

/// A validator client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    /// Node name
    pub name: String,
    /// Consensus client implementation driving the validator
    pub client_type: ClientType,
    /// Client version
    pub version: String,
    /// Discovered endpoints
    pub endpoints: ValidatorEndpoints,
    /// Number of validator keys
    pub validator_count: u32,
    /// Index of the first validator key
    pub validator_start_index: u32,
    /// Orchestrator service name
    pub service_name: String,
    /// Container / service UUID
    pub container_id: String,
}

macro_rules! impl_client_record {
    ($($ty:ty),*) => {
        $(
            impl ClientRecord for $ty {
                fn client_type(&self) -> ClientType {
                    self.client_type
                }

                fn name(&self) -> &str {
                    &self.name
                }

                fn service_name(&self) -> &str {
                    &self.service_name
                }
            }
        )*
    };
}

impl_client_record!(ExecutionClient, ConsensusClient, Validator);

/// Clients of one family, grouped by implementation
///
/// Groups appear in the order their first client was discovered, and each
/// group keeps discovery order. `Unknown` clients form their own group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCollection<C> {
    by_type: IndexMap<ClientType, Vec<C>>,
}

/// Execution clients of a network
pub type ExecutionClients = ClientCollection<ExecutionClient>;

/// Consensus clients of a network
pub type ConsensusClients = ClientCollection<ConsensusClient>;

impl<C> Default for ClientCollection<C> {
    fn default() -> Self {
        Self {
            by_type: IndexMap::new(),
        }
    }
}

impl<C: ClientRecord> ClientCollection<C> {
    pub(crate) fn insert(&mut self, client: C) {
        self.by_type
            .entry(client.client_type())
            .or_default()
            .push(client);
    }

    /// Every client
    pub fn all(&self) -> impl Iterator<Item = &C> {
        self.by_type.values().flatten()
    }

    /// Clients of one implementation
    pub fn by_type(&self, client_type: ClientType) -> &[C] {
        self.by_type
            .get(&client_type)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Look up a client by node name or full service name
    pub fn by_name(&self, name: &str) -> Option<&C> {
        self.all()
            .find(|client| client.name() == name || client.service_name() == name)
    }

    /// Implementations present
    pub fn client_types(&self) -> impl Iterator<Item = ClientType> + '_ {
        self.by_type.keys().copied()
    }

    /// Number of clients
    pub fn len(&self) -> usize {
        self.by_type.values().map(Vec::len).sum()
    }

    /// Whether no client was discovered
    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }
}
