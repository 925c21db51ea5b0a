//! Client implementations and the keyword search that identifies them

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which half of an Ethereum node a client implements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientFamily {
    /// Execution layer (transactions and state)
    Execution,
    /// Consensus layer (beacon chain)
    Consensus,
}

/// Concrete client implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientType {
    /// go-ethereum
    Geth,
    /// Hyperledger Besu
    Besu,
    /// Nethermind
    Nethermind,
    /// Erigon
    Erigon,
    /// Reth
    Reth,
    /// Lighthouse
    Lighthouse,
    /// Teku
    Teku,
    /// Prysm
    Prysm,
    /// Nimbus
    Nimbus,
    /// Lodestar
    Lodestar,
    /// Grandine
    Grandine,
    /// Not recognized
    #[default]
    Unknown,
}

impl ClientType {
    /// Execution clients, in keyword search order
    pub const EXECUTION: [ClientType; 5] = [
        ClientType::Geth,
        ClientType::Besu,
        ClientType::Nethermind,
        ClientType::Erigon,
        ClientType::Reth,
    ];

    /// Consensus clients, in keyword search order
    pub const CONSENSUS: [ClientType; 6] = [
        ClientType::Lighthouse,
        ClientType::Teku,
        ClientType::Prysm,
        ClientType::Nimbus,
        ClientType::Lodestar,
        ClientType::Grandine,
    ];

    /// Identify the client in a service name, searching one family only
    ///
    /// Searching only the requested family keeps composite names such as
    /// `el-1-geth-lighthouse` from resolving to the other layer's client.
    pub fn classify(name: &str, family: ClientFamily) -> ClientType {
        family.find_in(&name.to_lowercase()).unwrap_or(ClientType::Unknown)
    }

    /// Keyword used in service names
    pub fn as_str(self) -> &'static str {
        match self {
            ClientType::Geth => "geth",
            ClientType::Besu => "besu",
            ClientType::Nethermind => "nethermind",
            ClientType::Erigon => "erigon",
            ClientType::Reth => "reth",
            ClientType::Lighthouse => "lighthouse",
            ClientType::Teku => "teku",
            ClientType::Prysm => "prysm",
            ClientType::Nimbus => "nimbus",
            ClientType::Lodestar => "lodestar",
            ClientType::Grandine => "grandine",
            ClientType::Unknown => "unknown",
        }
    }

    /// Family this client belongs to; `None` for `Unknown`
    pub fn family(self) -> Option<ClientFamily> {
        if Self::EXECUTION.contains(&self) {
            Some(ClientFamily::Execution)
        } else if Self::CONSENSUS.contains(&self) {
            Some(ClientFamily::Consensus)
        } else {
            None
        }
    }
}

impl ClientFamily {
    /// Clients of this family
    pub fn clients(self) -> &'static [ClientType] {
        match self {
            ClientFamily::Execution => &ClientType::EXECUTION,
            ClientFamily::Consensus => &ClientType::CONSENSUS,
        }
    }

    /// First client of this family whose keyword occurs in a lowercase name
    pub(crate) fn find_in(self, lowercase_name: &str) -> Option<ClientType> {
        self.clients()
            .iter()
            .copied()
            .find(|client| lowercase_name.contains(client.as_str()))
    }
}

impl fmt::Display for ClientType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ClientFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientFamily::Execution => f.write_str("execution"),
            ClientFamily::Consensus => f.write_str("consensus"),
        }
    }
}

impl FromStr for ClientType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        ClientType::EXECUTION
            .iter()
            .chain(ClientType::CONSENSUS.iter())
            .copied()
            .find(|client| client.as_str() == lower)
            .ok_or_else(|| Error::UnknownClientType(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_within_family() {
        assert_eq!(
            ClientType::classify("el-1-geth-lighthouse", ClientFamily::Execution),
            ClientType::Geth
        );
        assert_eq!(
            ClientType::classify("el-1-geth-lighthouse", ClientFamily::Consensus),
            ClientType::Lighthouse
        );
        assert_eq!(
            ClientType::classify("CL-2-Teku-Besu", ClientFamily::Consensus),
            ClientType::Teku
        );
        assert_eq!(
            ClientType::classify("el-3-mystery", ClientFamily::Execution),
            ClientType::Unknown
        );
    }

    #[test]
    fn test_every_keyword_resolves_in_its_own_family_only() {
        for client in ClientType::EXECUTION {
            let name = format!("node-{}", client);
            assert_eq!(ClientType::classify(&name, ClientFamily::Execution), client);
            assert_eq!(
                ClientType::classify(&name, ClientFamily::Consensus),
                ClientType::Unknown
            );
        }
        for client in ClientType::CONSENSUS {
            let name = format!("node-{}", client);
            assert_eq!(ClientType::classify(&name, ClientFamily::Consensus), client);
            assert_eq!(
                ClientType::classify(&name, ClientFamily::Execution),
                ClientType::Unknown
            );
        }
    }

    #[test]
    fn test_families_are_disjoint() {
        for client in ClientType::EXECUTION {
            assert!(!ClientType::CONSENSUS.contains(&client));
            assert_eq!(client.family(), Some(ClientFamily::Execution));
        }
        for client in ClientType::CONSENSUS {
            assert_eq!(client.family(), Some(ClientFamily::Consensus));
        }
        assert_eq!(ClientType::Unknown.family(), None);
    }

    #[test]
    fn test_from_str() {
        assert_eq!("Nethermind".parse::<ClientType>().unwrap(), ClientType::Nethermind);
        assert!("unknown".parse::<ClientType>().is_err());
        assert!("parity".parse::<ClientType>().is_err());
    }
}
