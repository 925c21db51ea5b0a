//! Orchestrator implementations that need no container runtime

pub mod memory;
pub mod snapshot;

pub use memory::MemoryOrchestrator;
pub use snapshot::SnapshotOrchestrator;
