//! Chain manager state machine.

use crate::{
    ChainManagerInput, ChainManagerOutput, CmtLogEnvelope, KeyShareRegistry, NeedConsensus,
    NeedPublishTx,
};
use anchorlog_cmt_log::{
    CmtLogConfig, CmtLogError, CmtLogInput, CmtLogMessage, CmtLogState, RoundStateStore,
};
use anchorlog_core::{CodecError, OutMessages, Protocol, WireMessage};
use anchorlog_types::{
    AnchorOutput, CommitteeId, LogIndex, NodeId, OutputId, Transaction, TransactionId,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Reasons a committee log could not be obtained.
#[derive(Debug, Error)]
pub enum ChainManagerError {
    /// This node holds no key share for the committee. Expected, not a fault.
    #[error("Not a member of committee {0}")]
    NotInCommittee(CommitteeId),

    #[error(transparent)]
    CmtLog(#[from] CmtLogError),
}

/// Chain manager for one chain on one node.
pub struct ChainManager {
    /// This node.
    me: NodeId,

    /// Key shares held by this node.
    registry: Arc<dyn KeyShareRegistry>,

    /// Round state shared by all committee logs.
    store: Arc<dyn RoundStateStore>,

    config: CmtLogConfig,

    /// One log per committee this node is a member of.
    cmt_logs: BTreeMap<CommitteeId, CmtLogState>,

    /// Committee of the latest confirmed anchor, if this node belongs to it.
    active_committee: Option<CommitteeId>,

    latest_confirmed_anchor: Option<AnchorOutput>,

    latest_active_anchor: Option<AnchorOutput>,

    /// Transactions awaiting publication.
    need_publish_tx: BTreeMap<TransactionId, NeedPublishTx>,

    /// Recomputed after every input and message.
    output: ChainManagerOutput,
}

impl std::fmt::Debug for ChainManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainManager")
            .field("me", &self.me)
            .field("committees", &self.cmt_logs.len())
            .field("active_committee", &self.active_committee.map(|c| c.short()))
            .field("need_publish_tx", &self.need_publish_tx.len())
            .finish()
    }
}

impl ChainManager {
    pub fn new(
        me: NodeId,
        registry: Arc<dyn KeyShareRegistry>,
        store: Arc<dyn RoundStateStore>,
        config: CmtLogConfig,
    ) -> Self {
        Self {
            me,
            registry,
            store,
            config,
            cmt_logs: BTreeMap::new(),
            active_committee: None,
            latest_confirmed_anchor: None,
            latest_active_anchor: None,
            need_publish_tx: BTreeMap::new(),
            output: ChainManagerOutput::default(),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Accessors
    // ═══════════════════════════════════════════════════════════════════════

    pub fn me(&self) -> NodeId {
        self.me
    }

    /// Committee log of `committee`, if one has been created.
    pub fn cmt_log(&self, committee: &CommitteeId) -> Option<&CmtLogState> {
        self.cmt_logs.get(committee)
    }

    /// Committees with a live log instance.
    pub fn committees(&self) -> impl Iterator<Item = &CommitteeId> + '_ {
        self.cmt_logs.keys()
    }

    pub fn active_committee(&self) -> Option<CommitteeId> {
        self.active_committee
    }

    /// Current output; same value as [`Protocol::output`].
    pub fn current_output(&self) -> &ChainManagerOutput {
        &self.output
    }

    /// Decode a committee log payload, requiring a live instance for its committee.
    pub fn decode_message(&self, bytes: &[u8]) -> Result<CmtLogEnvelope, CodecError> {
        let envelope = CmtLogEnvelope::decode(bytes)?;
        if !self.cmt_logs.contains_key(&envelope.committee) {
            return Err(CodecError::UnknownCommittee(envelope.committee.short()));
        }
        Ok(envelope)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Input handlers
    // ═══════════════════════════════════════════════════════════════════════

    fn on_anchor_confirmed(&mut self, anchor: AnchorOutput) -> OutMessages<CmtLogEnvelope> {
        let committee = anchor.committee_id();
        debug!(node = %self.me, anchor = %anchor, committee = %committee.short(), "Anchor confirmed");
        self.latest_confirmed_anchor = Some(anchor.clone());

        let mut msgs = OutMessages::new();
        match self.ensure_cmt_log(&anchor, &mut msgs) {
            Ok(()) => {
                self.active_committee = Some(committee);
                msgs.extend(self.route(committee, CmtLogInput::AnchorConfirmed(anchor)));
                msgs.extend(self.suspend_all_except(Some(committee)));
            }
            Err(ChainManagerError::NotInCommittee(_)) => {
                debug!(
                    node = %self.me,
                    committee = %committee.short(),
                    "Not in committee of confirmed anchor"
                );
                self.active_committee = None;
                self.latest_active_anchor = Some(anchor);
                msgs.extend(self.suspend_all_except(None));
            }
            Err(e) => {
                warn!(node = %self.me, committee = %committee.short(), error = %e, "Cannot get committee log");
            }
        }
        msgs
    }

    fn on_anchor_rejected(&mut self, anchor: AnchorOutput) -> OutMessages<CmtLogEnvelope> {
        let committee = anchor.committee_id();
        self.with_cmt_log(committee, CmtLogInput::AnchorRejected(anchor))
    }

    fn on_consensus_output(
        &mut self,
        committee: CommitteeId,
        log_index: LogIndex,
        consumed: OutputId,
        produced: AnchorOutput,
        transaction: Transaction,
    ) -> OutMessages<CmtLogEnvelope> {
        let requested = self
            .output
            .need_consensus
            .as_ref()
            .is_some_and(|nc| nc.committee == committee && nc.base.id() == consumed);
        if requested {
            let transaction_id = transaction.id();
            info!(
                node = %self.me,
                committee = %committee.short(),
                %log_index,
                tx = %transaction_id,
                "Scheduling transaction for publication"
            );
            self.need_publish_tx.insert(
                transaction_id,
                NeedPublishTx {
                    committee,
                    transaction_id,
                    transaction,
                    consumed,
                    produced: produced.clone(),
                },
            );
        } else {
            debug!(
                node = %self.me,
                committee = %committee.short(),
                %log_index,
                "Consensus output not for the requested base, not publishing"
            );
        }
        self.with_cmt_log(
            committee,
            CmtLogInput::ConsensusOutput {
                log_index,
                consumed,
                produced,
            },
        )
    }

    fn on_publish_result(
        &mut self,
        transaction_id: TransactionId,
        confirmed: bool,
    ) -> OutMessages<CmtLogEnvelope> {
        let Some(entry) = self.need_publish_tx.remove(&transaction_id) else {
            debug!(node = %self.me, tx = %transaction_id, "Publish result for unknown transaction");
            return OutMessages::new();
        };
        if confirmed {
            // The produced anchor arrives separately as a confirmation.
            return OutMessages::new();
        }
        warn!(
            node = %self.me,
            committee = %entry.committee.short(),
            tx = %transaction_id,
            "Publication failed, rejecting produced anchor"
        );
        self.with_cmt_log(entry.committee, CmtLogInput::AnchorRejected(entry.produced))
    }

    fn on_cmt_log_message(
        &mut self,
        from: NodeId,
        envelope: CmtLogEnvelope,
    ) -> OutMessages<CmtLogEnvelope> {
        let committee = envelope.committee;
        let Some(log) = self.cmt_logs.get_mut(&committee) else {
            warn!(node = %self.me, %from, committee = %committee.short(), "Message for unknown committee");
            return OutMessages::new();
        };
        wrap(committee, log.message(from, envelope.inner))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Committee log management
    // ═══════════════════════════════════════════════════════════════════════

    /// Create the log of the committee controlling `anchor` if needed.
    ///
    /// A new log is started right away; its first messages go to `msgs`.
    fn ensure_cmt_log(
        &mut self,
        anchor: &AnchorOutput,
        msgs: &mut OutMessages<CmtLogEnvelope>,
    ) -> Result<(), ChainManagerError> {
        let committee = anchor.committee_id();
        if self.cmt_logs.contains_key(&committee) {
            return Ok(());
        }
        let key_share = self
            .registry
            .load_key_share(anchor.state_controller())
            .filter(|share| share.contains(self.me))
            .ok_or(ChainManagerError::NotInCommittee(committee))?;

        let mut log = CmtLogState::new(
            self.me,
            key_share,
            Arc::clone(&self.store),
            self.config.clone(),
        )?;
        info!(node = %self.me, committee = %committee.short(), "Created committee log");
        msgs.extend(wrap(committee, log.input(CmtLogInput::Start)));
        self.cmt_logs.insert(committee, log);
        Ok(())
    }

    /// Deliver an input to an existing log, dropping it for unknown committees.
    fn with_cmt_log(
        &mut self,
        committee: CommitteeId,
        input: CmtLogInput,
    ) -> OutMessages<CmtLogEnvelope> {
        if !self.cmt_logs.contains_key(&committee) {
            warn!(
                node = %self.me,
                committee = %committee.short(),
                input = input.type_name(),
                "Cannot find committee log"
            );
            return OutMessages::new();
        }
        self.route(committee, input)
    }

    fn route(&mut self, committee: CommitteeId, input: CmtLogInput) -> OutMessages<CmtLogEnvelope> {
        match self.cmt_logs.get_mut(&committee) {
            Some(log) => wrap(committee, log.input(input)),
            None => OutMessages::new(),
        }
    }

    fn suspend_all_except(&mut self, keep: Option<CommitteeId>) -> OutMessages<CmtLogEnvelope> {
        let mut msgs = OutMessages::new();
        for (committee, log) in self.cmt_logs.iter_mut() {
            if Some(*committee) == keep {
                continue;
            }
            msgs.extend(wrap(*committee, log.input(CmtLogInput::Suspend)));
        }
        msgs
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Output
    // ═══════════════════════════════════════════════════════════════════════

    fn recompute_output(&mut self) {
        let need_consensus = self.active_committee.and_then(|committee| {
            let log = self.cmt_logs.get(&committee)?;
            let out = log.output()?;
            Some(NeedConsensus {
                committee,
                log_index: out.log_index(),
                key_share: log.key_share().clone(),
                base: out.base().clone(),
            })
        });
        if let Some(nc) = &need_consensus {
            self.latest_active_anchor = Some(nc.base.clone());
        }
        if need_consensus != self.output.need_consensus {
            match &need_consensus {
                Some(nc) => debug!(
                    node = %self.me,
                    committee = %nc.committee.short(),
                    log_index = %nc.log_index,
                    base = %nc.base,
                    "NeedConsensus changed"
                ),
                None => debug!(node = %self.me, "NeedConsensus cleared"),
            }
        }
        self.output = ChainManagerOutput {
            need_consensus,
            need_publish_tx: self.need_publish_tx.values().cloned().collect(),
            latest_confirmed_anchor: self.latest_confirmed_anchor.clone(),
            latest_active_anchor: self.latest_active_anchor.clone(),
        };
    }
}

fn wrap(committee: CommitteeId, msgs: OutMessages<CmtLogMessage>) -> OutMessages<CmtLogEnvelope> {
    msgs.map(|inner| CmtLogEnvelope { committee, inner })
}

impl Protocol for ChainManager {
    type Input = ChainManagerInput;
    type Message = CmtLogEnvelope;
    type Output = ChainManagerOutput;

    fn input(&mut self, input: ChainManagerInput) -> OutMessages<CmtLogEnvelope> {
        let msgs = match input {
            ChainManagerInput::AnchorConfirmed(anchor) => self.on_anchor_confirmed(anchor),
            ChainManagerInput::AnchorRejected(anchor) => self.on_anchor_rejected(anchor),
            ChainManagerInput::ConsensusOutput {
                committee,
                log_index,
                consumed,
                produced,
                transaction,
            } => self.on_consensus_output(committee, log_index, consumed, produced, transaction),
            ChainManagerInput::ConsensusTimeout {
                committee,
                log_index,
            } => self.with_cmt_log(committee, CmtLogInput::ConsensusTimeout { log_index }),
            ChainManagerInput::PublishResult {
                transaction_id,
                confirmed,
            } => self.on_publish_result(transaction_id, confirmed),
        };
        self.recompute_output();
        msgs
    }

    fn message(&mut self, from: NodeId, message: CmtLogEnvelope) -> OutMessages<CmtLogEnvelope> {
        let msgs = self.on_cmt_log_message(from, message);
        self.recompute_output();
        msgs
    }

    fn output(&self) -> Option<&ChainManagerOutput> {
        Some(&self.output)
    }

    fn status(&self) -> String {
        let logs: Vec<String> = self.cmt_logs.values().map(|l| l.status()).collect();
        format!(
            "ChainManager{{node={}, confirmed={}, active={}, pending_tx={}, logs=[{}]}}",
            self.me,
            self.latest_confirmed_anchor
                .as_ref()
                .map(|a| a.to_string())
                .unwrap_or_else(|| "none".to_string()),
            self.latest_active_anchor
                .as_ref()
                .map(|a| a.to_string())
                .unwrap_or_else(|| "none".to_string()),
            self.need_publish_tx.len(),
            logs.join(", ")
        )
    }

    /// Payloads for committees without a live log fail to decode and are dropped.
    fn message_bytes(&mut self, from: NodeId, bytes: &[u8]) -> OutMessages<CmtLogEnvelope> {
        match self.decode_message(bytes) {
            Ok(envelope) => self.message(from, envelope),
            Err(error) => {
                warn!(node = %self.me, %from, %error, "Dropping committee log payload");
                OutMessages::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StaticKeyShareRegistry;
    use anchorlog_cmt_log::MemoryRoundStore;
    use anchorlog_types::test_utils::{test_address, test_anchor, test_key_share};
    use anchorlog_types::KeyShare;
    use tracing_test::traced_test;

    const COMMITTEE_A: u8 = 1;
    const COMMITTEE_B: u8 = 2;
    const FOREIGN: u8 = 3;

    fn make_manager(me: u64) -> ChainManager {
        let registry = StaticKeyShareRegistry::with_shares([
            test_key_share(COMMITTEE_A, 4),
            KeyShare::new(
                test_address(COMMITTEE_B),
                vec![NodeId(0), NodeId(1), NodeId(2), NodeId(3)],
            ),
        ]);
        ChainManager::new(
            NodeId(me),
            Arc::new(registry),
            Arc::new(MemoryRoundStore::new()),
            CmtLogConfig::default(),
        )
    }

    fn committee(seed: u8) -> CommitteeId {
        CommitteeId::from_address(&test_address(seed))
    }

    fn anchor(seed: u8, i: u32) -> AnchorOutput {
        test_anchor(seed, test_address(seed), i)
    }

    /// Deliver `li` votes from members 1..=3 of `seed`'s committee.
    fn agree(cm: &mut ChainManager, seed: u8, li: u32) {
        for from in 1..=3 {
            cm.message(
                NodeId(from),
                CmtLogEnvelope {
                    committee: committee(seed),
                    inner: CmtLogMessage::NextLogIndex(LogIndex(li)),
                },
            );
        }
    }

    #[test]
    fn test_first_confirmation_creates_and_starts_log() {
        let mut cm = make_manager(0);
        let msgs = cm.input(ChainManagerInput::AnchorConfirmed(anchor(COMMITTEE_A, 1)));

        assert!(cm.cmt_log(&committee(COMMITTEE_A)).is_some());
        assert_eq!(cm.active_committee(), Some(committee(COMMITTEE_A)));
        assert_eq!(msgs.len(), 4);
        assert!(msgs.iter().all(|m| m.payload.committee == committee(COMMITTEE_A)
            && m.payload.inner == CmtLogMessage::NextLogIndex(LogIndex(1))));

        let out = cm.current_output();
        assert_eq!(out.latest_confirmed_anchor, Some(anchor(COMMITTEE_A, 1)));
        assert!(out.need_consensus.is_none());
    }

    #[traced_test]
    #[test]
    fn test_need_consensus_after_quorum() {
        let mut cm = make_manager(0);
        cm.input(ChainManagerInput::AnchorConfirmed(anchor(COMMITTEE_A, 1)));
        agree(&mut cm, COMMITTEE_A, 1);

        let nc = cm.current_output().need_consensus.clone().unwrap();
        assert_eq!(nc.committee, committee(COMMITTEE_A));
        assert_eq!(nc.log_index, LogIndex(1));
        assert_eq!(nc.base, anchor(COMMITTEE_A, 1));
        assert_eq!(nc.key_share.size(), 4);
        assert_eq!(
            cm.current_output().latest_active_anchor,
            Some(anchor(COMMITTEE_A, 1))
        );
    }

    #[test]
    fn test_not_in_committee_drops_and_suspends_all() {
        let mut cm = make_manager(0);
        cm.input(ChainManagerInput::AnchorConfirmed(anchor(COMMITTEE_A, 1)));
        agree(&mut cm, COMMITTEE_A, 1);

        let foreign = anchor(FOREIGN, 2);
        let msgs = cm.input(ChainManagerInput::AnchorConfirmed(foreign.clone()));
        assert!(msgs.is_empty());
        assert!(cm.cmt_log(&committee(FOREIGN)).is_none());
        assert!(cm.cmt_log(&committee(COMMITTEE_A)).unwrap().is_suspended());

        let out = cm.current_output();
        assert!(out.need_consensus.is_none());
        assert_eq!(out.latest_confirmed_anchor, Some(foreign.clone()));
        assert_eq!(out.latest_active_anchor, Some(foreign));
    }

    #[test]
    fn test_key_share_without_this_node_is_not_membership() {
        let registry = StaticKeyShareRegistry::with_shares([KeyShare::new(
            test_address(COMMITTEE_A),
            vec![NodeId(1), NodeId(2), NodeId(3), NodeId(4)],
        )]);
        let mut cm = ChainManager::new(
            NodeId(0),
            Arc::new(registry),
            Arc::new(MemoryRoundStore::new()),
            CmtLogConfig::default(),
        );
        cm.input(ChainManagerInput::AnchorConfirmed(anchor(COMMITTEE_A, 1)));
        assert_eq!(cm.committees().count(), 0);
    }

    #[traced_test]
    #[test]
    fn test_confirmation_suspends_other_committees() {
        let mut cm = make_manager(0);
        cm.input(ChainManagerInput::AnchorConfirmed(anchor(COMMITTEE_A, 1)));
        agree(&mut cm, COMMITTEE_A, 1);
        assert!(cm.current_output().need_consensus.is_some());

        cm.input(ChainManagerInput::AnchorConfirmed(anchor(COMMITTEE_B, 2)));
        assert!(cm.cmt_log(&committee(COMMITTEE_A)).unwrap().is_suspended());
        assert!(!cm.cmt_log(&committee(COMMITTEE_B)).unwrap().is_suspended());
        assert_eq!(cm.active_committee(), Some(committee(COMMITTEE_B)));
        // A's in-flight round is no longer requested.
        assert!(cm.current_output().need_consensus.is_none());

        agree(&mut cm, COMMITTEE_B, 1);
        let nc = cm.current_output().need_consensus.clone().unwrap();
        assert_eq!(nc.committee, committee(COMMITTEE_B));
        assert_eq!(nc.base, anchor(COMMITTEE_B, 2));
    }

    #[test]
    fn test_consensus_output_schedules_publication_and_pipelines() {
        let mut cm = make_manager(0);
        cm.input(ChainManagerInput::AnchorConfirmed(anchor(COMMITTEE_A, 1)));
        agree(&mut cm, COMMITTEE_A, 1);

        let tx = Transaction::new(b"round-1".to_vec());
        cm.input(ChainManagerInput::ConsensusOutput {
            committee: committee(COMMITTEE_A),
            log_index: LogIndex(1),
            consumed: anchor(COMMITTEE_A, 1).id(),
            produced: anchor(COMMITTEE_A, 2),
            transaction: tx.clone(),
        });

        let out = cm.current_output();
        assert_eq!(out.need_publish_tx.len(), 1);
        assert_eq!(out.need_publish_tx[0].transaction_id, tx.id());
        assert_eq!(out.need_publish_tx[0].produced, anchor(COMMITTEE_A, 2));
        let nc = out.need_consensus.clone().unwrap();
        assert_eq!(nc.log_index, LogIndex(2));
        assert_eq!(nc.base, anchor(COMMITTEE_A, 2));

        // Published and confirmed.
        cm.input(ChainManagerInput::PublishResult {
            transaction_id: tx.id(),
            confirmed: true,
        });
        assert!(cm.current_output().need_publish_tx.is_empty());
    }

    #[test]
    fn test_consensus_output_for_other_base_not_published() {
        let mut cm = make_manager(0);
        cm.input(ChainManagerInput::AnchorConfirmed(anchor(COMMITTEE_A, 1)));
        agree(&mut cm, COMMITTEE_A, 1);

        cm.input(ChainManagerInput::ConsensusOutput {
            committee: committee(COMMITTEE_A),
            log_index: LogIndex(1),
            consumed: anchor(COMMITTEE_A, 7).id(),
            produced: anchor(COMMITTEE_A, 8),
            transaction: Transaction::new(b"other".to_vec()),
        });
        assert!(cm.current_output().need_publish_tx.is_empty());
    }

    #[test]
    fn test_failed_publication_rejects_produced_anchor() {
        let mut cm = make_manager(0);
        cm.input(ChainManagerInput::AnchorConfirmed(anchor(COMMITTEE_A, 1)));
        agree(&mut cm, COMMITTEE_A, 1);

        let tx = Transaction::new(b"round-1".to_vec());
        cm.input(ChainManagerInput::ConsensusOutput {
            committee: committee(COMMITTEE_A),
            log_index: LogIndex(1),
            consumed: anchor(COMMITTEE_A, 1).id(),
            produced: anchor(COMMITTEE_A, 2),
            transaction: tx.clone(),
        });
        let view = cm.cmt_log(&committee(COMMITTEE_A)).unwrap().local_view();
        assert_eq!(view.base(), Some(&anchor(COMMITTEE_A, 2)));

        cm.input(ChainManagerInput::PublishResult {
            transaction_id: tx.id(),
            confirmed: false,
        });
        let out = cm.current_output();
        assert!(out.need_publish_tx.is_empty());
        let view = cm.cmt_log(&committee(COMMITTEE_A)).unwrap().local_view();
        assert_eq!(view.base(), Some(&anchor(COMMITTEE_A, 1)));
    }

    #[traced_test]
    #[test]
    fn test_failed_publication_after_confirmation_keeps_base() {
        let mut cm = make_manager(0);
        cm.input(ChainManagerInput::AnchorConfirmed(anchor(COMMITTEE_A, 1)));
        agree(&mut cm, COMMITTEE_A, 1);

        let tx = Transaction::new(b"round-1".to_vec());
        cm.input(ChainManagerInput::ConsensusOutput {
            committee: committee(COMMITTEE_A),
            log_index: LogIndex(1),
            consumed: anchor(COMMITTEE_A, 1).id(),
            produced: anchor(COMMITTEE_A, 2),
            transaction: tx.clone(),
        });
        // Another member got the same transaction on the ledger first.
        cm.input(ChainManagerInput::AnchorConfirmed(anchor(COMMITTEE_A, 2)));
        cm.input(ChainManagerInput::PublishResult {
            transaction_id: tx.id(),
            confirmed: false,
        });

        let view = cm.cmt_log(&committee(COMMITTEE_A)).unwrap().local_view();
        assert_eq!(view.base(), Some(&anchor(COMMITTEE_A, 2)));
        assert_eq!(view.entries().len(), 1);

        let out = cm.current_output();
        assert!(out.need_publish_tx.is_empty());
        assert_eq!(out.latest_confirmed_anchor, Some(anchor(COMMITTEE_A, 2)));
        let nc = out.need_consensus.clone().unwrap();
        assert_eq!(nc.log_index, LogIndex(2));
        assert_eq!(nc.base, anchor(COMMITTEE_A, 2));
    }

    #[traced_test]
    #[test]
    fn test_confirmation_ahead_of_consensus_output() {
        let mut cm = make_manager(0);
        cm.input(ChainManagerInput::AnchorConfirmed(anchor(COMMITTEE_A, 1)));
        agree(&mut cm, COMMITTEE_A, 1);
        cm.input(ChainManagerInput::ConsensusOutput {
            committee: committee(COMMITTEE_A),
            log_index: LogIndex(1),
            consumed: anchor(COMMITTEE_A, 1).id(),
            produced: anchor(COMMITTEE_A, 2),
            transaction: Transaction::new(b"round-1".to_vec()),
        });
        assert_eq!(
            cm.current_output().need_consensus.as_ref().unwrap().log_index,
            LogIndex(2)
        );

        // Round 2's anchor is confirmed before its output reaches this node.
        cm.input(ChainManagerInput::AnchorConfirmed(anchor(COMMITTEE_A, 3)));
        let view = cm.cmt_log(&committee(COMMITTEE_A)).unwrap().local_view();
        assert_eq!(view.base(), Some(&anchor(COMMITTEE_A, 3)));

        cm.input(ChainManagerInput::ConsensusOutput {
            committee: committee(COMMITTEE_A),
            log_index: LogIndex(2),
            consumed: anchor(COMMITTEE_A, 2).id(),
            produced: anchor(COMMITTEE_A, 3),
            transaction: Transaction::new(b"round-2".to_vec()),
        });

        let log = cm.cmt_log(&committee(COMMITTEE_A)).unwrap();
        assert_eq!(log.local_view().entries().len(), 1);
        assert_eq!(log.local_view().base(), Some(&anchor(COMMITTEE_A, 3)));
        assert_eq!(log.log_index(), LogIndex(3));

        let out = cm.current_output();
        assert_eq!(out.latest_confirmed_anchor, Some(anchor(COMMITTEE_A, 3)));
        let nc = out.need_consensus.clone().unwrap();
        assert_eq!(nc.log_index, LogIndex(3));
        assert_eq!(nc.base, anchor(COMMITTEE_A, 3));
        assert_eq!(out.latest_active_anchor, Some(anchor(COMMITTEE_A, 3)));
    }

    #[test]
    fn test_ledger_rejection_routed_to_owning_committee() {
        let mut cm = make_manager(0);
        cm.input(ChainManagerInput::AnchorConfirmed(anchor(COMMITTEE_A, 1)));
        agree(&mut cm, COMMITTEE_A, 1);
        cm.input(ChainManagerInput::ConsensusOutput {
            committee: committee(COMMITTEE_A),
            log_index: LogIndex(1),
            consumed: anchor(COMMITTEE_A, 1).id(),
            produced: anchor(COMMITTEE_A, 2),
            transaction: Transaction::new(b"round-1".to_vec()),
        });

        cm.input(ChainManagerInput::AnchorRejected(anchor(COMMITTEE_A, 2)));
        let view = cm.cmt_log(&committee(COMMITTEE_A)).unwrap().local_view();
        assert_eq!(view.base(), Some(&anchor(COMMITTEE_A, 1)));
    }

    #[test]
    fn test_events_for_unknown_committee_dropped() {
        let mut cm = make_manager(0);
        let msgs = cm.input(ChainManagerInput::ConsensusTimeout {
            committee: committee(COMMITTEE_B),
            log_index: LogIndex(1),
        });
        assert!(msgs.is_empty());
        assert_eq!(cm.committees().count(), 0);

        agree(&mut cm, COMMITTEE_B, 1);
        assert_eq!(cm.committees().count(), 0);
    }

    #[test]
    fn test_decode_requires_known_committee() {
        let mut cm = make_manager(0);
        let bytes = CmtLogEnvelope {
            committee: committee(COMMITTEE_A),
            inner: CmtLogMessage::NextLogIndex(LogIndex(1)),
        }
        .encode();
        assert!(matches!(
            cm.decode_message(&bytes),
            Err(CodecError::UnknownCommittee(_))
        ));
        assert!(cm.message_bytes(NodeId(1), &bytes).is_empty());

        cm.input(ChainManagerInput::AnchorConfirmed(anchor(COMMITTEE_A, 1)));
        assert!(cm.decode_message(&bytes).is_ok());
    }

    #[test]
    fn test_timeout_routed_and_votes_wrapped() {
        let mut cm = make_manager(0);
        cm.input(ChainManagerInput::AnchorConfirmed(anchor(COMMITTEE_A, 1)));
        agree(&mut cm, COMMITTEE_A, 1);

        let msgs = cm.input(ChainManagerInput::ConsensusTimeout {
            committee: committee(COMMITTEE_A),
            log_index: LogIndex(1),
        });
        assert_eq!(msgs.len(), 4);
        assert!(msgs.iter().all(|m| m.payload
            == CmtLogEnvelope {
                committee: committee(COMMITTEE_A),
                inner: CmtLogMessage::NextLogIndex(LogIndex(2)),
            }));
    }
}
