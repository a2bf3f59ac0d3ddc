//! Identifier newtypes.

use std::fmt;
use thiserror::Error;

/// Domain tag mixed into committee id derivation.
const DOMAIN_COMMITTEE_ID: &[u8] = b"anchorlog/committee-id/v1";

/// Errors constructing identifiers from raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    #[error("invalid identifier length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

/// Opaque peer identity.
///
/// Stable for the lifetime of a committee membership and used only for
/// message addressing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node-{}", self.0)
    }
}

/// Monotonic per-committee round counter.
///
/// [`LogIndex::NIL`] is the value before any round has been agreed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct LogIndex(pub u32);

impl LogIndex {
    /// The log index before any round.
    pub const NIL: LogIndex = LogIndex(0);

    /// Whether this is the nil log index.
    pub fn is_nil(&self) -> bool {
        self.0 == 0
    }

    /// The successor of this log index.
    pub fn next(&self) -> LogIndex {
        LogIndex(self.0.saturating_add(1))
    }

    /// Raw round number.
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for LogIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_nil() {
            write!(f, "nil")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Controlling address of a committee on the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(pub [u8; 32]);

impl Address {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Committee identity, derived deterministically from the controlling address.
///
/// One committee id corresponds to exactly one key share and to exactly one
/// committee log instance on a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CommitteeId([u8; 32]);

impl CommitteeId {
    /// Length of the encoded identifier.
    pub const LEN: usize = 32;

    /// Derive the committee id for a controlling address.
    pub fn from_address(address: &Address) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(DOMAIN_COMMITTEE_ID);
        hasher.update(address.as_bytes());
        Self(*hasher.finalize().as_bytes())
    }

    /// Parse a committee id from its wire representation.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, IdError> {
        let raw: [u8; Self::LEN] = bytes.try_into().map_err(|_| IdError::InvalidLength {
            expected: Self::LEN,
            actual: bytes.len(),
        })?;
        Ok(Self(raw))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Short hex prefix for log output.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for CommitteeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}
