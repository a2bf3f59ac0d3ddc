//! Committee log state machine.

use crate::{
    CmtLogConfig, CmtLogInput, CmtLogMessage, LocalView, RoundStateStore, StoreError,
};
use anchorlog_core::{OutMessages, Protocol};
use anchorlog_types::{AnchorOutput, CommitteeId, KeyShare, LogIndex, NodeId, OutputId};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Errors constructing a committee log.
#[derive(Debug, Error)]
pub enum CmtLogError {
    #[error("Cannot load round state for committee {committee}: {source}")]
    LoadState {
        committee: CommitteeId,
        #[source]
        source: StoreError,
    },
}

/// Request to run consensus for one round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmtLogOutput {
    log_index: LogIndex,
    base: AnchorOutput,
}

impl CmtLogOutput {
    pub fn log_index(&self) -> LogIndex {
        self.log_index
    }

    /// Anchor the round must consume.
    pub fn base(&self) -> &AnchorOutput {
        &self.base
    }

    pub fn base_ref(&self) -> OutputId {
        self.base.id()
    }
}

/// Committee log instance of one node for one committee.
///
/// Rounds only start once `n - f` members have voted for a log index above the
/// current one, the instance is not suspended, and the local view has a base.
pub struct CmtLogState {
    /// This node.
    me: NodeId,

    /// Committee membership.
    key_share: KeyShare,

    committee_id: CommitteeId,

    config: CmtLogConfig,

    /// Durable round state.
    store: Arc<dyn RoundStateStore>,

    /// Lowest log index this instance may start a round for.
    /// One above whatever was persisted before the last restart.
    min_log_index: LogIndex,

    /// Log index currently agreed on.
    log_index: LogIndex,

    /// Highest log index for which a round was started (or observed finishing).
    consensus_log_index: LogIndex,

    /// Highest log index this node has voted for.
    sent_next_log_index: LogIndex,

    local_view: LocalView,

    /// Latest vote of each member.
    peer_log_indexes: BTreeMap<NodeId, LogIndex>,

    /// Suspended instances never start another round.
    suspended: bool,

    /// Current consensus request.
    output: Option<CmtLogOutput>,
}

impl std::fmt::Debug for CmtLogState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CmtLogState")
            .field("me", &self.me)
            .field("committee", &self.committee_id.short())
            .field("log_index", &self.log_index)
            .field("min_log_index", &self.min_log_index)
            .field("consensus_log_index", &self.consensus_log_index)
            .field("suspended", &self.suspended)
            .field("output", &self.output)
            .finish()
    }
}

impl CmtLogState {
    /// Create an instance, restoring the restart-safety floor from `store`.
    pub fn new(
        me: NodeId,
        key_share: KeyShare,
        store: Arc<dyn RoundStateStore>,
        config: CmtLogConfig,
    ) -> Result<Self, CmtLogError> {
        let committee_id = key_share.committee_id();
        let persisted = store
            .load_round_state(&committee_id)
            .map_err(|source| CmtLogError::LoadState {
                committee: committee_id,
                source,
            })?;
        let log_index = persisted.unwrap_or(LogIndex::NIL);

        info!(
            node = %me,
            committee = %committee_id.short(),
            n = key_share.size(),
            f = config.max_faulty(key_share.size()),
            persisted = %log_index,
            "Committee log created"
        );

        Ok(Self {
            me,
            key_share,
            committee_id,
            config,
            store,
            min_log_index: log_index.next(),
            log_index,
            consensus_log_index: LogIndex::NIL,
            sent_next_log_index: LogIndex::NIL,
            local_view: LocalView::new(),
            peer_log_indexes: BTreeMap::new(),
            suspended: false,
            output: None,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Accessors
    // ═══════════════════════════════════════════════════════════════════════

    pub fn me(&self) -> NodeId {
        self.me
    }

    pub fn committee_id(&self) -> CommitteeId {
        self.committee_id
    }

    pub fn key_share(&self) -> &KeyShare {
        &self.key_share
    }

    pub fn log_index(&self) -> LogIndex {
        self.log_index
    }

    pub fn min_log_index(&self) -> LogIndex {
        self.min_log_index
    }

    pub fn consensus_log_index(&self) -> LogIndex {
        self.consensus_log_index
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    pub fn local_view(&self) -> &LocalView {
        &self.local_view
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Input handlers
    // ═══════════════════════════════════════════════════════════════════════

    fn on_start(&mut self) -> OutMessages<CmtLogMessage> {
        debug!(node = %self.me, committee = %self.committee_id.short(), "Start");
        self.maybe_send_next_log_index(self.min_log_index)
    }

    fn on_anchor_confirmed(&mut self, anchor: AnchorOutput) -> OutMessages<CmtLogMessage> {
        debug!(node = %self.me, anchor = %anchor, "Anchor confirmed");
        self.local_view.confirmed(&anchor);
        self.maybe_start_consensus();
        OutMessages::new()
    }

    fn on_anchor_rejected(&mut self, anchor: AnchorOutput) -> OutMessages<CmtLogMessage> {
        debug!(node = %self.me, anchor = %anchor, "Anchor rejected");
        self.local_view.rejected(&anchor);
        self.maybe_start_consensus();
        OutMessages::new()
    }

    fn on_consensus_output(
        &mut self,
        log_index: LogIndex,
        consumed: OutputId,
        produced: AnchorOutput,
    ) -> OutMessages<CmtLogMessage> {
        if !self.accept_round_result(log_index, "consensus output") {
            return OutMessages::new();
        }
        self.local_view.published(&consumed, &produced);

        // A duplicate output for the same round must not advance twice.
        let next = log_index.next();
        if self.log_index < next {
            self.log_index = next;
        }
        debug!(
            node = %self.me,
            round = %log_index,
            produced = %produced,
            log_index = %self.log_index,
            "Consensus output accepted"
        );
        self.maybe_start_consensus();
        OutMessages::new()
    }

    /// Vote for the next log index after a stalled round.
    ///
    /// A node votes without evidence that the round actually failed. This
    /// trades the pure asynchronous model for liveness.
    fn on_consensus_timeout(&mut self, log_index: LogIndex) -> OutMessages<CmtLogMessage> {
        if !self.accept_round_result(log_index, "consensus timeout") {
            return OutMessages::new();
        }
        info!(
            node = %self.me,
            committee = %self.committee_id.short(),
            round = %log_index,
            "Consensus timed out, voting for next log index"
        );
        self.maybe_send_next_log_index(self.log_index.next())
    }

    fn on_suspend(&mut self) -> OutMessages<CmtLogMessage> {
        if !self.suspended {
            info!(node = %self.me, committee = %self.committee_id.short(), "Suspended");
        }
        self.suspended = true;
        OutMessages::new()
    }

    /// Staleness check shared by round outputs and timeouts.
    ///
    /// Results for rounds newer than the last one started here mean the rest
    /// of the committee is ahead; catch up to them.
    fn accept_round_result(&mut self, log_index: LogIndex, what: &str) -> bool {
        if log_index < self.consensus_log_index {
            warn!(
                node = %self.me,
                round = %log_index,
                consensus_log_index = %self.consensus_log_index,
                "Dropping outdated {}", what
            );
            return false;
        }
        if log_index > self.consensus_log_index {
            warn!(
                node = %self.me,
                round = %log_index,
                consensus_log_index = %self.consensus_log_index,
                "Catching up on {} for a round not started here", what
            );
            self.consensus_log_index = log_index;
            if self.log_index < log_index {
                self.log_index = log_index;
            }
        }
        true
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Voting
    // ═══════════════════════════════════════════════════════════════════════

    fn on_next_log_index(&mut self, from: NodeId, proposed: LogIndex) -> OutMessages<CmtLogMessage> {
        if !self.key_share.contains(from) {
            warn!(node = %self.me, %from, "NextLogIndex from unknown sender");
            return OutMessages::new();
        }
        let previous = self
            .peer_log_indexes
            .get(&from)
            .copied()
            .unwrap_or(LogIndex::NIL);
        if proposed <= previous {
            debug!(node = %self.me, %from, %proposed, %previous, "Ignoring non-increasing vote");
            return OutMessages::new();
        }
        self.peer_log_indexes.insert(from, proposed);

        let n = self.key_share.size();
        let mut msgs = OutMessages::new();

        let supported = self.voted_for(self.config.support_threshold(n));
        if supported > self.log_index {
            msgs.extend(self.maybe_send_next_log_index(supported));
        }

        let agreed = self.voted_for(self.config.adoption_threshold(n));
        if agreed > self.log_index {
            info!(
                node = %self.me,
                committee = %self.committee_id.short(),
                from = %self.log_index,
                to = %agreed,
                "Log index agreed"
            );
            self.log_index = agreed;
            self.maybe_start_consensus();
        }
        msgs
    }

    /// Highest log index that at least `quorum` members' latest votes name
    /// exactly. Returns nil if no index has gathered that many votes.
    fn voted_for(&self, quorum: usize) -> LogIndex {
        if quorum == 0 {
            return LogIndex::NIL;
        }
        let mut counts: BTreeMap<LogIndex, usize> = BTreeMap::new();
        for li in self.peer_log_indexes.values() {
            *counts.entry(*li).or_default() += 1;
        }
        counts
            .into_iter()
            .rev()
            .find(|(_, count)| *count >= quorum)
            .map(|(li, _)| li)
            .unwrap_or(LogIndex::NIL)
    }

    fn maybe_send_next_log_index(&mut self, log_index: LogIndex) -> OutMessages<CmtLogMessage> {
        let mut msgs = OutMessages::new();
        if log_index < self.log_index || self.sent_next_log_index >= log_index {
            return msgs;
        }
        self.sent_next_log_index = log_index;
        debug!(node = %self.me, %log_index, "Voting for next log index");
        msgs.broadcast(
            self.key_share.members().iter().copied(),
            CmtLogMessage::NextLogIndex(log_index),
        );
        msgs
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Round start
    // ═══════════════════════════════════════════════════════════════════════

    fn maybe_start_consensus(&mut self) {
        if matches!(&self.output, Some(out) if out.log_index == self.log_index) {
            return;
        }
        self.output = None;

        if self.log_index < self.min_log_index
            || self.log_index.is_nil()
            || self.consensus_log_index >= self.log_index
            || self.suspended
        {
            return;
        }
        let Some(base) = self.local_view.base().cloned() else {
            return;
        };

        // Persist before exposing: after a crash this round must never be joined again.
        if let Err(e) = self
            .store
            .save_round_state(&self.committee_id, self.log_index)
        {
            error!(
                node = %self.me,
                committee = %self.committee_id.short(),
                log_index = %self.log_index,
                error = %e,
                "Failed to persist log index"
            );
            panic!(
                "SAFETY CRITICAL: cannot persist log index {} for committee {}: {}",
                self.log_index, self.committee_id, e
            );
        }

        self.consensus_log_index = self.log_index;
        info!(
            node = %self.me,
            committee = %self.committee_id.short(),
            log_index = %self.log_index,
            base = %base,
            "Requesting consensus"
        );
        self.output = Some(CmtLogOutput {
            log_index: self.log_index,
            base,
        });
    }
}

impl Protocol for CmtLogState {
    type Input = CmtLogInput;
    type Message = CmtLogMessage;
    type Output = CmtLogOutput;

    fn input(&mut self, input: CmtLogInput) -> OutMessages<CmtLogMessage> {
        match input {
            CmtLogInput::Start => self.on_start(),
            CmtLogInput::AnchorConfirmed(anchor) => self.on_anchor_confirmed(anchor),
            CmtLogInput::AnchorRejected(anchor) => self.on_anchor_rejected(anchor),
            CmtLogInput::ConsensusOutput {
                log_index,
                consumed,
                produced,
            } => self.on_consensus_output(log_index, consumed, produced),
            CmtLogInput::ConsensusTimeout { log_index } => self.on_consensus_timeout(log_index),
            CmtLogInput::Suspend => self.on_suspend(),
        }
    }

    fn message(&mut self, from: NodeId, message: CmtLogMessage) -> OutMessages<CmtLogMessage> {
        match message {
            CmtLogMessage::NextLogIndex(log_index) => self.on_next_log_index(from, log_index),
        }
    }

    fn output(&self) -> Option<&CmtLogOutput> {
        self.output.as_ref()
    }

    fn status(&self) -> String {
        format!(
            "CmtLog{{node={}, committee={}, li={}, min={}, consensus={}, suspended={}, output={}, {}}}",
            self.me,
            self.committee_id.short(),
            self.log_index,
            self.min_log_index,
            self.consensus_log_index,
            self.suspended,
            self.output
                .as_ref()
                .map(|o| format!("{}@{}", o.log_index, o.base))
                .unwrap_or_else(|| "none".to_string()),
            self.local_view.status()
        )
    }
}
