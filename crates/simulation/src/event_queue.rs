//! Deterministically ordered simulation events.

use crate::NodeIndex;
use anchorlog_chain_manager::{ChainManagerInput, NeedPublishTx};
use anchorlog_types::Address;
use std::time::Duration;

/// Something that happens at one point of simulated time.
#[derive(Debug, Clone)]
pub enum Event {
    /// Raw committee log payload from `from`, delivered to the key's node.
    Deliver { from: NodeIndex, payload: Vec<u8> },

    /// Local input for the key's node.
    Input(ChainManagerInput),

    /// The key's node hands a transaction to the ledger.
    Publish(NeedPublishTx),

    /// The ledger moves the anchor to another controller outside of consensus.
    Rotate { controller: Address },
}

impl Event {
    /// Ordering class for events scheduled at the same instant.
    ///
    /// Ledger effects first, then local inputs, then network deliveries.
    pub fn priority(&self) -> u8 {
        match self {
            Event::Publish(_) | Event::Rotate { .. } => 0,
            Event::Input(_) => 1,
            Event::Deliver { .. } => 2,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Event::Deliver { .. } => "Deliver",
            Event::Input(input) => input.type_name(),
            Event::Publish(_) => "Publish",
            Event::Rotate { .. } => "Rotate",
        }
    }
}

/// Queue key: events run in `(time, priority, node, sequence)` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct EventKey {
    pub time: Duration,
    pub priority: u8,
    pub node_index: NodeIndex,
    pub sequence: u64,
}

impl EventKey {
    pub fn new(time: Duration, event: &Event, node_index: NodeIndex, sequence: u64) -> Self {
        Self {
            time,
            priority: event.priority(),
            node_index,
            sequence,
        }
    }
}
