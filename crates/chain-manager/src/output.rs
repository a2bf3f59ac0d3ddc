//! Chain manager output.

use anchorlog_types::{
    AnchorOutput, CommitteeId, KeyShare, LogIndex, OutputId, Transaction, TransactionId,
};

/// Request to run a consensus round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeedConsensus {
    pub committee: CommitteeId,
    pub log_index: LogIndex,
    pub key_share: KeyShare,
    /// Anchor the round must consume.
    pub base: AnchorOutput,
}

/// Transaction produced by a round, still to be published to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeedPublishTx {
    pub committee: CommitteeId,
    pub transaction_id: TransactionId,
    pub transaction: Transaction,
    /// Anchor consumed by the transaction.
    pub consumed: OutputId,
    /// Anchor produced by the transaction.
    pub produced: AnchorOutput,
}

/// Everything the node needs to act on, recomputed after every event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainManagerOutput {
    /// Round of the active committee, if one is requested.
    pub need_consensus: Option<NeedConsensus>,
    /// Pending publications, ordered by transaction id.
    pub need_publish_tx: Vec<NeedPublishTx>,
    /// Latest anchor confirmed by the ledger.
    pub latest_confirmed_anchor: Option<AnchorOutput>,
    /// Anchor this node currently builds on.
    pub latest_active_anchor: Option<AnchorOutput>,
}
