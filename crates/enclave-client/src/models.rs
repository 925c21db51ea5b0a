//! Raw data shapes returned by the orchestrator

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Status string the orchestrator reports for a running service
pub const STATUS_RUNNING: &str = "RUNNING";

/// Status string the orchestrator reports for a stopped service
pub const STATUS_STOPPED: &str = "STOPPED";

/// Services of one enclave, keyed by service name
pub type ServiceMap = BTreeMap<String, RawService>;

/// A service as listed by the orchestrator
///
/// Loosely typed on purpose: classification into clients happens in
/// `network-discovery`, not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawService {
    /// Service name (e.g. `el-1-geth-lighthouse`)
    #[serde(default)]
    pub name: String,

    /// Container / service UUID
    #[serde(default)]
    pub uuid: String,

    /// Orchestrator status string
    #[serde(default)]
    pub status: String,

    /// Private IP address inside the enclave network
    #[serde(default)]
    pub ip_address: String,

    /// Named ports
    #[serde(default)]
    pub ports: BTreeMap<String, PortInfo>,
}

/// A single named port of a service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortInfo {
    /// Port number
    pub number: u16,

    /// Transport protocol (`TCP` or `UDP`)
    #[serde(default = "default_protocol")]
    pub protocol: String,

    /// URL computed by the orchestrator. Authoritative when non-empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precomputed_url: Option<String>,
}

fn default_protocol() -> String {
    "TCP".to_string()
}

/// Result of running a package in a fresh enclave
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    /// Identifier of the enclave the package ran in
    pub enclave_id: String,

    /// Output lines of the package run
    #[serde(default)]
    pub output: Vec<String>,
}

impl RawService {
    /// Create a service entry with no ports and no address
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uuid: String::new(),
            status: STATUS_RUNNING.to_string(),
            ip_address: String::new(),
            ports: BTreeMap::new(),
        }
    }

    /// Set the container UUID
    pub fn with_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.uuid = uuid.into();
        self
    }

    /// Set the IP address
    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = ip.into();
        self
    }

    /// Set the status string
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    /// Add or replace a named port
    pub fn with_port(mut self, name: impl Into<String>, port: PortInfo) -> Self {
        self.ports.insert(name.into(), port);
        self
    }

    /// Whether the orchestrator reports this service as running
    pub fn is_running(&self) -> bool {
        self.status.eq_ignore_ascii_case(STATUS_RUNNING)
    }

    /// Names of all ports
    pub fn port_names(&self) -> Vec<&str> {
        self.ports.keys().map(String::as_str).collect()
    }
}

impl PortInfo {
    /// A TCP port
    pub fn tcp(number: u16) -> Self {
        Self {
            number,
            protocol: "TCP".to_string(),
            precomputed_url: None,
        }
    }

    /// A UDP port
    pub fn udp(number: u16) -> Self {
        Self {
            number,
            protocol: "UDP".to_string(),
            precomputed_url: None,
        }
    }

    /// Attach a precomputed URL
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.precomputed_url = Some(url.into());
        self
    }

    /// The precomputed URL, if present and non-empty
    pub fn precomputed(&self) -> Option<&str> {
        self.precomputed_url.as_deref().filter(|url| !url.is_empty())
    }

    /// Whether the port speaks TCP
    pub fn is_tcp(&self) -> bool {
        self.protocol.eq_ignore_ascii_case("tcp")
    }
}
