//! Deterministic simulation of a chain served by rotating committees.
//!
//! Every node runs a real [`ChainManager`](anchorlog_chain_manager::ChainManager).
//! Consensus and the ledger are replaced by deterministic mocks, and peer
//! messages travel through a [`SimulatedNetwork`] with latency, loss and
//! partitions. Given the same seed a run is reproducible event for event.

mod consensus;
mod event_queue;
mod ledger;
mod network;
mod runner;

pub use consensus::{round_transaction, MockConsensus, RoundDecision};
pub use event_queue::{Event, EventKey};
pub use ledger::{MockLedger, PublishOutcome};
pub use network::{Delivery, NetworkConfig, SimulatedNetwork};
pub use runner::{SimulationConfig, SimulationRunner, SimulationStats};

/// Index of a simulated node; node `i` runs as `NodeId(i)`.
pub type NodeIndex = u32;
