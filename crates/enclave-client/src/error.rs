//! Error types for the orchestrator boundary

use std::time::Duration;
use thiserror::Error;

/// Orchestrator client error type
#[derive(Error, Debug)]
pub enum Error {
    /// Enclave not found
    #[error("Enclave not found: {0}")]
    EnclaveNotFound(String),

    /// Service not found inside an enclave
    #[error("Service not found in enclave {enclave}: {service}")]
    ServiceNotFound {
        /// Enclave that was searched
        enclave: String,
        /// Service that was requested
        service: String,
    },

    /// Services did not become ready before the deadline
    #[error("Timed out after {waited:?} waiting for services: {}", pending.join(", "))]
    Timeout {
        /// How long the caller waited
        waited: Duration,
        /// Services that were still not ready
        pending: Vec<String>,
    },

    /// The wait was cancelled by the caller
    #[error("Wait for services was cancelled")]
    Cancelled,

    /// The orchestrator rejected or failed an operation
    #[error("Orchestrator error: {0}")]
    Orchestrator(String),

    /// Invalid package configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization error
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Invalid log filter expression
    #[error("Invalid log filter: {0}")]
    Regex(#[from] regex::Error),
}

impl Error {
    /// Create an orchestrator error
    pub fn orchestrator(message: impl Into<String>) -> Self {
        Self::Orchestrator(message.into())
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
