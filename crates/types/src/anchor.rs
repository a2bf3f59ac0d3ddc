//! Anchor outputs: the single mutable ledger object carrying chain state.

use crate::{Address, CommitteeId};
use std::fmt;

/// Ledger transaction identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransactionId(pub [u8; 32]);

impl TransactionId {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Unique reference of a ledger output: producing transaction plus output index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OutputId {
    pub transaction_id: TransactionId,
    pub index: u16,
}

impl OutputId {
    pub fn new(transaction_id: TransactionId, index: u16) -> Self {
        Self {
            transaction_id,
            index,
        }
    }
}

impl fmt::Display for OutputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}",
            hex::encode(&self.transaction_id.0[..6]),
            self.index
        )
    }
}

/// Anchor ("alias") output.
///
/// Consumed read-only by this layer. Identity is the [`OutputId`]; the state
/// controller names the committee allowed to consume it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AnchorOutput {
    id: OutputId,
    state_controller: Address,
    state_index: u32,
}

impl AnchorOutput {
    pub fn new(id: OutputId, state_controller: Address, state_index: u32) -> Self {
        Self {
            id,
            state_controller,
            state_index,
        }
    }

    /// Reference of this output.
    pub fn id(&self) -> OutputId {
        self.id
    }

    /// Address of the committee controlling this anchor.
    pub fn state_controller(&self) -> &Address {
        &self.state_controller
    }

    /// Committee controlling this anchor.
    pub fn committee_id(&self) -> CommitteeId {
        CommitteeId::from_address(&self.state_controller)
    }

    pub fn state_index(&self) -> u32 {
        self.state_index
    }
}

impl fmt::Display for AnchorOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AO{{id={}, si={}}}", self.id, self.state_index)
    }
}
