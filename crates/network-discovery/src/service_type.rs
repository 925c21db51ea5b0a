//! Coarse service categories and the name heuristics that assign them

use crate::client_type::ClientFamily;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of a discovered service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    /// Execution layer client
    ExecutionClient,
    /// Consensus layer (beacon) client
    ConsensusClient,
    /// Validator client
    Validator,
    /// Prometheus metrics server
    Prometheus,
    /// Grafana dashboards
    Grafana,
    /// Blockscout explorer
    Blockscout,
    /// Dora beacon explorer
    Dora,
    /// Apache server distributing network configuration
    Apache,
    /// Spamoor transaction spammer
    Spamoor,
    /// Anything else
    #[default]
    Other,
}

/// Auxiliary services matched by substring, in order
const AUXILIARY: &[(&str, ServiceType)] = &[
    ("prometheus", ServiceType::Prometheus),
    ("grafana", ServiceType::Grafana),
    ("blockscout", ServiceType::Blockscout),
    ("dora", ServiceType::Dora),
    ("apache", ServiceType::Apache),
    ("config", ServiceType::Apache),
    ("spamoor", ServiceType::Spamoor),
];

impl ServiceType {
    /// Classify a service by name, using port names as a last resort
    ///
    /// Pass an empty slice when no port names are known. Never fails:
    /// anything unrecognized is `Other`.
    pub fn classify(name: &str, port_names: &[&str]) -> ServiceType {
        let lower = name.to_lowercase();
        let prefix = if lower.starts_with("el-") {
            Some(ClientFamily::Execution)
        } else if lower.starts_with("cl-") {
            Some(ClientFamily::Consensus)
        } else {
            None
        };

        // el-/cl- names belong to clients even when they mention a validator
        if prefix.is_none() && (lower.contains("validator") || lower.starts_with("vc-")) {
            return ServiceType::Validator;
        }

        if let Some((_, service_type)) = AUXILIARY.iter().find(|(kw, _)| lower.contains(kw)) {
            return *service_type;
        }

        // A prefix pins the family: only that family's keywords and port
        // hints are considered.
        if let Some(family) = prefix {
            return if family.find_in(&lower).is_some() || ports_suggest(port_names, family) {
                family.into()
            } else {
                ServiceType::Other
            };
        }

        // Consensus first: composite names embed both layers' keywords
        if ClientFamily::Consensus.find_in(&lower).is_some() {
            return ServiceType::ConsensusClient;
        }
        if ClientFamily::Execution.find_in(&lower).is_some() {
            return ServiceType::ExecutionClient;
        }

        if ports_suggest(port_names, ClientFamily::Execution) {
            ServiceType::ExecutionClient
        } else if ports_suggest(port_names, ClientFamily::Consensus) {
            ServiceType::ConsensusClient
        } else {
            ServiceType::Other
        }
    }

    /// Client family for client service types
    pub fn family(self) -> Option<ClientFamily> {
        match self {
            ServiceType::ExecutionClient => Some(ClientFamily::Execution),
            ServiceType::ConsensusClient => Some(ClientFamily::Consensus),
            _ => None,
        }
    }

    /// Snake-case name
    pub fn as_str(self) -> &'static str {
        match self {
            ServiceType::ExecutionClient => "execution_client",
            ServiceType::ConsensusClient => "consensus_client",
            ServiceType::Validator => "validator",
            ServiceType::Prometheus => "prometheus",
            ServiceType::Grafana => "grafana",
            ServiceType::Blockscout => "blockscout",
            ServiceType::Dora => "dora",
            ServiceType::Apache => "apache",
            ServiceType::Spamoor => "spamoor",
            ServiceType::Other => "other",
        }
    }
}

impl From<ClientFamily> for ServiceType {
    fn from(family: ClientFamily) -> Self {
        match family {
            ClientFamily::Execution => ServiceType::ExecutionClient,
            ClientFamily::Consensus => ServiceType::ConsensusClient,
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether any port name hints at the given family
fn ports_suggest(port_names: &[&str], family: ClientFamily) -> bool {
    let hints: &[&str] = match family {
        ClientFamily::Execution => &["rpc", "engine"],
        ClientFamily::Consensus => &["beacon", "http"],
    };
    port_names.iter().any(|port| {
        let port = port.to_lowercase();
        hints.iter().any(|hint| port.contains(hint))
    })
}
