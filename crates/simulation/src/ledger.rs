//! In-memory ledger holding a single anchor chain.

use anchorlog_types::{Address, AnchorOutput, OutputId, TransactionId};
use tracing::{debug, info, warn};

/// Result of handing a transaction to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The produced anchor is now the chain tip.
    Confirmed(AnchorOutput),
    /// The same anchor was confirmed by an earlier submission.
    AlreadyConfirmed,
    /// The transaction does not consume the current tip.
    Rejected,
}

/// Ledger with one anchor output at a time.
///
/// A transaction is accepted only if it consumes the current anchor, keeps its
/// controller and increments the state index by one. Rotations replace the
/// controller without going through any committee.
#[derive(Debug, Default)]
pub struct MockLedger {
    /// Every anchor that was ever current, oldest first.
    history: Vec<AnchorOutput>,
    rejected: u64,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the first anchor of the chain, controlled by `controller`.
    ///
    /// Returns the current anchor unchanged if the chain already exists.
    pub fn genesis(&mut self, controller: Address) -> AnchorOutput {
        if let Some(current) = self.history.last() {
            warn!(current = %current, "Ledger already has a genesis anchor");
            return current.clone();
        }
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"anchorlog/sim/genesis");
        hasher.update(controller.as_bytes());
        let id = OutputId::new(TransactionId(*hasher.finalize().as_bytes()), 0);
        let anchor = AnchorOutput::new(id, controller, 0);
        info!(anchor = %anchor, "Ledger genesis");
        self.history.push(anchor.clone());
        anchor
    }

    /// Current anchor, if the chain exists.
    pub fn current(&self) -> Option<&AnchorOutput> {
        self.history.last()
    }

    pub fn history(&self) -> &[AnchorOutput] {
        &self.history
    }

    /// Number of rejected submissions.
    pub fn rejected_count(&self) -> u64 {
        self.rejected
    }

    pub fn contains(&self, id: &OutputId) -> bool {
        self.history.iter().any(|a| a.id() == *id)
    }

    /// Apply a committee transaction moving the chain from `consumed` to `produced`.
    pub fn publish(&mut self, consumed: &OutputId, produced: &AnchorOutput) -> PublishOutcome {
        if self.contains(&produced.id()) {
            return PublishOutcome::AlreadyConfirmed;
        }
        let Some(current) = self.history.last() else {
            self.rejected += 1;
            return PublishOutcome::Rejected;
        };
        let valid = current.id() == *consumed
            && produced.state_controller() == current.state_controller()
            && produced.state_index() == current.state_index().wrapping_add(1);
        if !valid {
            debug!(
                current = %current,
                consumed = %consumed,
                produced = %produced,
                "Ledger rejected transaction"
            );
            self.rejected += 1;
            return PublishOutcome::Rejected;
        }
        debug!(produced = %produced, "Ledger confirmed anchor");
        self.history.push(produced.clone());
        PublishOutcome::Confirmed(produced.clone())
    }

    /// Hand the chain to `controller` outside of consensus.
    ///
    /// `None` before genesis.
    pub fn rotate(&mut self, controller: Address) -> Option<AnchorOutput> {
        let current = self.history.last()?;
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"anchorlog/sim/rotation");
        hasher.update(current.id().transaction_id.as_bytes());
        hasher.update(&current.id().index.to_be_bytes());
        hasher.update(controller.as_bytes());
        let id = OutputId::new(TransactionId(*hasher.finalize().as_bytes()), 0);
        let anchor = AnchorOutput::new(id, controller, current.state_index().wrapping_add(1));
        info!(
            from = %current,
            to = %anchor,
            committee = %anchor.committee_id().short(),
            "Ledger rotated anchor"
        );
        self.history.push(anchor.clone());
        Some(anchor)
    }
}
