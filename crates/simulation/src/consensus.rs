//! Stand-in for the committee consensus instances.
//!
//! A round `(committee, log_index)` is decided once, by the first member that
//! asks for it, and every member learns the same decision. A decision is
//! either a transaction consuming the requester's base or a timeout.

use anchorlog_chain_manager::{ChainManagerInput, NeedConsensus};
use anchorlog_types::{AnchorOutput, CommitteeId, LogIndex, OutputId, Transaction};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use tracing::debug;

/// Agreed result of one round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundDecision {
    Output {
        consumed: OutputId,
        produced: AnchorOutput,
        transaction: Transaction,
    },
    Timeout,
}

impl RoundDecision {
    /// The chain manager input that reports this decision.
    pub fn to_input(&self, committee: CommitteeId, log_index: LogIndex) -> ChainManagerInput {
        match self {
            RoundDecision::Output {
                consumed,
                produced,
                transaction,
            } => ChainManagerInput::ConsensusOutput {
                committee,
                log_index,
                consumed: *consumed,
                produced: produced.clone(),
                transaction: transaction.clone(),
            },
            RoundDecision::Timeout => ChainManagerInput::ConsensusTimeout {
                committee,
                log_index,
            },
        }
    }
}

/// Deterministic transaction a round produces on `base`.
///
/// The produced anchor keeps the controller and steps the state index.
pub fn round_transaction(
    committee: CommitteeId,
    log_index: LogIndex,
    base: &AnchorOutput,
) -> (Transaction, AnchorOutput) {
    let mut essence = Vec::with_capacity(32 + 4 + 32 + 2);
    essence.extend_from_slice(committee.as_bytes());
    essence.extend_from_slice(&log_index.as_u32().to_be_bytes());
    essence.extend_from_slice(base.id().transaction_id.as_bytes());
    essence.extend_from_slice(&base.id().index.to_be_bytes());
    let transaction = Transaction::new(essence);
    let produced = AnchorOutput::new(
        OutputId::new(transaction.id(), 0),
        *base.state_controller(),
        base.state_index().wrapping_add(1),
    );
    (transaction, produced)
}

/// Decided rounds across all committees.
#[derive(Debug, Default)]
pub struct MockConsensus {
    /// Probability that a fresh round times out instead of producing output.
    timeout_rate: f64,
    decisions: BTreeMap<(CommitteeId, LogIndex), RoundDecision>,
}

impl MockConsensus {
    pub fn new(timeout_rate: f64) -> Self {
        Self {
            timeout_rate: timeout_rate.clamp(0.0, 1.0),
            decisions: BTreeMap::new(),
        }
    }

    /// Decision for the requested round; the flag is true if it was made now.
    pub fn decide(&mut self, request: &NeedConsensus, rng: &mut ChaCha8Rng) -> (RoundDecision, bool) {
        let key = (request.committee, request.log_index);
        if let Some(decision) = self.decisions.get(&key) {
            return (decision.clone(), false);
        }
        let timed_out = self.timeout_rate > 0.0 && rng.gen::<f64>() < self.timeout_rate;
        let decision = if timed_out {
            RoundDecision::Timeout
        } else {
            let (transaction, produced) =
                round_transaction(request.committee, request.log_index, &request.base);
            RoundDecision::Output {
                consumed: request.base.id(),
                produced,
                transaction,
            }
        };
        debug!(
            committee = %request.committee.short(),
            log_index = %request.log_index,
            timed_out,
            "Round decided"
        );
        self.decisions.insert(key, decision.clone());
        (decision, true)
    }

    pub fn decision(&self, committee: CommitteeId, log_index: LogIndex) -> Option<&RoundDecision> {
        self.decisions.get(&(committee, log_index))
    }

    /// Number of decided rounds of `committee`.
    pub fn rounds_decided(&self, committee: CommitteeId) -> usize {
        self.decisions.keys().filter(|(c, _)| *c == committee).count()
    }
}
