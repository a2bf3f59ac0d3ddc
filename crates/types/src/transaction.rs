//! Minimal ledger transaction.
//!
//! The transaction format belongs to the ledger; this layer only needs a stable
//! identifier and the opaque bytes to hand to the ledger client.

use crate::TransactionId;
use std::fmt;

/// Opaque state transition produced by a consensus round.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Transaction {
    id: TransactionId,
    essence: Vec<u8>,
}

impl Transaction {
    /// Build a transaction; its id is the BLAKE3 hash of the essence.
    pub fn new(essence: Vec<u8>) -> Self {
        let id = TransactionId(*blake3::hash(&essence).as_bytes());
        Self { id, essence }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn essence(&self) -> &[u8] {
        &self.essence
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id.to_string())
            .field("essence_len", &self.essence.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_id_depends_on_essence() {
        let a = Transaction::new(vec![1, 2, 3]);
        let b = Transaction::new(vec![1, 2, 3]);
        let c = Transaction::new(vec![3, 2, 1]);
        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), c.id());
        assert_eq!(a.essence(), &[1, 2, 3]);
    }
}
