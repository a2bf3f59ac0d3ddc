//! Core types for committee chain nodes.
//!
//! This crate provides the ledger-facing data model shared by every other
//! crate in the workspace:
//!
//! - **Identifiers**: NodeId, CommitteeId, Address, LogIndex
//! - **Ledger objects**: AnchorOutput, OutputId, Transaction
//! - **Membership**: KeyShare
//!
//! It does not depend on any other workspace crate.

mod anchor;
mod committee;
mod identifiers;
mod transaction;

pub use anchor::{AnchorOutput, OutputId, TransactionId};
pub use committee::KeyShare;
pub use identifiers::{Address, CommitteeId, IdError, LogIndex, NodeId};
pub use transaction::Transaction;

/// Test utilities.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils {
    use super::*;

    /// Create a test address from a seed byte.
    pub fn test_address(seed: u8) -> Address {
        Address([seed; 32])
    }

    /// Create a key share over nodes `0..n` for the committee at `test_address(seed)`.
    pub fn test_key_share(seed: u8, n: u64) -> KeyShare {
        KeyShare::new(test_address(seed), (0..n).map(NodeId).collect())
    }

    /// Create a distinct anchor output controlled by `controller`.
    ///
    /// The output id is derived from `(seed, state_index)`, so equal arguments
    /// give equal anchors.
    pub fn test_anchor(seed: u8, controller: Address, state_index: u32) -> AnchorOutput {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&[seed]);
        hasher.update(&state_index.to_be_bytes());
        let tx_id = TransactionId(*hasher.finalize().as_bytes());
        AnchorOutput::new(OutputId::new(tx_id, 0), controller, state_index)
    }
}
