//! Package configuration passed to `RunPackage`

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Package run when no package id is configured
pub const DEFAULT_PACKAGE_ID: &str = "github.com/ethpandaops/ethereum-package";

/// Configuration of the Ethereum network package
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageConfig {
    /// Package locator handed to the orchestrator
    #[serde(default = "default_package_id")]
    pub package_id: String,

    /// Name for the enclave (generated when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enclave_name: Option<String>,

    /// Client pairs to launch
    #[serde(default)]
    pub participants: Vec<Participant>,

    /// Network-wide parameters
    #[serde(default)]
    pub network_params: NetworkParams,

    /// Auxiliary services (prometheus, grafana, dora, ...)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_services: Vec<String>,
}

/// One execution/consensus client pair, optionally repeated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    /// Execution client implementation (e.g. `geth`)
    pub el_type: String,

    /// Consensus client implementation (e.g. `lighthouse`)
    pub cl_type: String,

    /// Number of nodes with this pairing
    #[serde(default = "default_count")]
    pub count: u32,

    /// Validator keys assigned to each node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validator_count: Option<u32>,
}

/// Network-wide parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkParams {
    /// Explicit chain id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,

    /// Network id as the package expects it (a decimal string)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_id: Option<String>,

    /// Slot duration in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seconds_per_slot: Option<u64>,
}

/// The subset of the configuration the package itself consumes
#[derive(Serialize)]
struct PackageArgs<'a> {
    participants: &'a [Participant],
    network_params: &'a NetworkParams,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    additional_services: &'a [String],
}

fn default_package_id() -> String {
    DEFAULT_PACKAGE_ID.to_string()
}

fn default_count() -> u32 {
    1
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            package_id: default_package_id(),
            enclave_name: None,
            participants: Vec::new(),
            network_params: NetworkParams::default(),
            additional_services: Vec::new(),
        }
    }
}

impl PackageConfig {
    /// Load configuration from file
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = async_fs::read_to_string(path).await?;

        // YAML for .yaml/.yml, JSON otherwise
        let config: Self = match path.extension().and_then(|s| s.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&contents)?,
            _ => serde_json::from_str(&contents)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Add a participant
    pub fn with_participant(mut self, participant: Participant) -> Self {
        self.participants.push(participant);
        self
    }

    /// Set the enclave name
    pub fn with_enclave_name(mut self, name: impl Into<String>) -> Self {
        self.enclave_name = Some(name.into());
        self
    }

    /// Check the configuration for obviously unusable values
    pub fn validate(&self) -> Result<()> {
        if self.package_id.trim().is_empty() {
            return Err(Error::config("package_id cannot be empty"));
        }

        for (idx, participant) in self.participants.iter().enumerate() {
            if participant.el_type.trim().is_empty() || participant.cl_type.trim().is_empty() {
                return Err(Error::config(format!(
                    "participant {} must name both el_type and cl_type",
                    idx
                )));
            }
            if participant.count == 0 {
                return Err(Error::config(format!(
                    "participant {} has count 0",
                    idx
                )));
            }
        }

        if let Some(network_id) = &self.network_params.network_id {
            if network_id.parse::<u64>().is_err() {
                return Err(Error::config(format!(
                    "network_id must be numeric, got '{}'",
                    network_id
                )));
            }
        }

        Ok(())
    }

    /// Serialize the package arguments as YAML
    pub fn to_package_args(&self) -> Result<String> {
        let args = PackageArgs {
            participants: &self.participants,
            network_params: &self.network_params,
            additional_services: &self.additional_services,
        };
        Ok(serde_yaml::to_string(&args)?)
    }

    /// Names of the client services the package is expected to create
    ///
    /// Follows the package convention `el-{n}-{el}-{cl}` / `cl-{n}-{cl}-{el}`
    /// with `n` counted from 1 across all participants.
    pub fn expected_client_services(&self) -> Vec<String> {
        let mut names = Vec::new();
        let mut index = 1;
        for participant in &self.participants {
            for _ in 0..participant.count {
                names.push(format!(
                    "el-{}-{}-{}",
                    index, participant.el_type, participant.cl_type
                ));
                names.push(format!(
                    "cl-{}-{}-{}",
                    index, participant.cl_type, participant.el_type
                ));
                index += 1;
            }
        }
        names
    }
}

impl Participant {
    /// A single node with the given client pairing
    pub fn new(el_type: impl Into<String>, cl_type: impl Into<String>) -> Self {
        Self {
            el_type: el_type.into(),
            cl_type: cl_type.into(),
            count: 1,
            validator_count: None,
        }
    }

    /// Repeat this pairing `count` times
    pub fn with_count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }
}

impl NetworkParams {
    /// Chain id from configuration, if one was given and is non-zero
    ///
    /// `chain_id` wins over a numeric `network_id`.
    pub fn resolved_chain_id(&self) -> Option<u64> {
        self.chain_id.filter(|id| *id != 0).or_else(|| {
            self.network_id
                .as_deref()
                .and_then(|id| id.trim().parse::<u64>().ok())
                .filter(|id| *id != 0)
        })
    }
}
