//! Error types for network discovery

use std::sync::Arc;
use thiserror::Error;

/// Network discovery error type
///
/// Classification misses and missing endpoint data are not errors: they
/// resolve to `Other`/`Unknown` and empty URLs respectively.
#[derive(Error, Debug)]
pub enum Error {
    /// Running the network package failed
    #[error("Failed to run package: {0}")]
    RunPackage(#[source] enclave_client::Error),

    /// Services did not become ready
    #[error("Failed waiting for services: {0}")]
    WaitForServices(#[source] enclave_client::Error),

    /// The orchestrator could not list the enclave's services
    #[error("failed to get services: {0}")]
    ListServices(#[source] enclave_client::Error),

    /// An endpoint string could not be parsed
    #[error("Invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint {
        /// The offending input
        endpoint: String,
        /// Why it was rejected
        reason: String,
    },

    /// An endpoint string was empty
    #[error("Endpoint is empty")]
    EmptyEndpoint,

    /// Destroying the enclave failed
    ///
    /// Shared so every caller of the one-shot cleanup sees the same failure.
    #[error("Failed to clean up enclave: {0}")]
    Cleanup(#[source] Arc<enclave_client::Error>),

    /// Stopping the enclave failed
    #[error("Failed to stop enclave: {0}")]
    Stop(#[source] enclave_client::Error),

    /// A client type name was not recognized
    #[error("Unknown client type: {0}")]
    UnknownClientType(String),

    /// Metadata (de)serialization failed
    #[error("Metadata serialization error: {0}")]
    Metadata(#[from] serde_json::Error),
}

impl Error {
    /// Create an invalid endpoint error
    pub fn invalid_endpoint(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
