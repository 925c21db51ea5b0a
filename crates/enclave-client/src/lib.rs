//! Orchestrator boundary for ephemeral Ethereum test enclaves
//!
//! This crate describes what the network model needs from the component
//! that provisions enclaves: the raw service listing it returns, the
//! lifecycle calls it accepts, and the package configuration it runs.
//! Nothing here classifies services; see `network-discovery` for that.
//!
//! # Example
//!
//! ```no_run
//! use enclave_client::{MemoryOrchestrator, Orchestrator, PortInfo, RawService};
//!
//! # async fn example() -> enclave_client::Result<()> {
//! let orchestrator = MemoryOrchestrator::new();
//! orchestrator.insert_enclave(
//!     "devnet",
//!     [RawService::new("el-1-geth-lighthouse")
//!         .with_ip("10.0.0.2")
//!         .with_port("rpc", PortInfo::tcp(8545))],
//! );
//!
//! let services = orchestrator.get_services("devnet").await?;
//! assert_eq!(services.len(), 1);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod backend;
pub mod config;
pub mod error;
pub mod logs;
pub mod models;
pub mod orchestrator;
pub mod session;
pub mod wait;

pub use backend::{MemoryOrchestrator, SnapshotOrchestrator};
pub use config::{NetworkParams, PackageConfig, Participant};
pub use error::{Error, Result};
pub use logs::{LineFilter, LogOptions};
pub use models::*;
pub use orchestrator::Orchestrator;
pub use session::EnclaveSession;
pub use wait::{CancelToken, WaitOptions, wait_until_ready};
