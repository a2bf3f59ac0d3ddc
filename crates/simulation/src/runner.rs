//! Deterministic simulation runner.
//!
//! Each node owns a chain manager, a key share registry and a round store.
//! The runner moves committee log payloads through the simulated network,
//! answers consensus requests from [`MockConsensus`] and publishes
//! transactions to the shared [`MockLedger`].

use crate::consensus::{MockConsensus, RoundDecision};
use crate::event_queue::{Event, EventKey};
use crate::ledger::{MockLedger, PublishOutcome};
use crate::network::{Delivery, NetworkConfig, SimulatedNetwork};
use crate::NodeIndex;
use anchorlog_chain_manager::{
    ChainManager, ChainManagerInput, ChainManagerOutput, CmtLogEnvelope, NeedConsensus,
    NeedPublishTx, StaticKeyShareRegistry,
};
use anchorlog_cmt_log::{CmtLogConfig, MemoryRoundStore};
use anchorlog_core::{OutMessages, Protocol, WireMessage};
use anchorlog_types::{Address, AnchorOutput, CommitteeId, KeyShare, LogIndex, NodeId, TransactionId};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Simulation parameters beyond the network.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub network: NetworkConfig,
    pub cmt_log: CmtLogConfig,
    /// Time from a consensus request to its decision.
    pub consensus_delay: Duration,
    /// Probability that a round times out instead of producing output.
    pub consensus_timeout_rate: f64,
    /// One-way delay between a node and the ledger.
    pub ledger_latency: Duration,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            cmt_log: CmtLogConfig::default(),
            consensus_delay: Duration::from_millis(200),
            consensus_timeout_rate: 0.0,
            ledger_latency: Duration::from_millis(100),
        }
    }
}

/// Statistics collected during simulation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SimulationStats {
    /// Total events processed.
    pub events_processed: u64,
    /// Events addressed to a crashed node.
    pub events_dropped_down: u64,
    /// Messages scheduled for delivery to another node.
    pub messages_sent: u64,
    /// Messages a node addressed to itself.
    pub messages_loopback: u64,
    /// Messages dropped on a cut link.
    pub messages_dropped_partition: u64,
    /// Messages lost at random.
    pub messages_dropped_loss: u64,
    /// Consensus requests made by nodes.
    pub consensus_requests: u64,
    /// Rounds decided with output.
    pub rounds_decided: u64,
    /// Rounds decided as timed out.
    pub rounds_timed_out: u64,
    /// Transactions handed to the ledger.
    pub publications_submitted: u64,
    /// Anchors confirmed by committee transactions.
    pub anchors_confirmed: u64,
    /// Submissions the ledger rejected.
    pub publications_rejected: u64,
    /// Rotations applied by the ledger.
    pub rotations: u64,
    /// Node restarts.
    pub restarts: u64,
}

impl SimulationStats {
    /// Total messages dropped (partition + packet loss).
    pub fn messages_dropped(&self) -> u64 {
        self.messages_dropped_partition + self.messages_dropped_loss
    }

    /// Message delivery rate (sent / (sent + dropped)).
    pub fn delivery_rate(&self) -> f64 {
        let total = self.messages_sent + self.messages_dropped();
        if total == 0 {
            1.0
        } else {
            self.messages_sent as f64 / total as f64
        }
    }
}

/// Per-node bookkeeping kept by the runner, not by the node.
#[derive(Debug, Default)]
struct NodeDriver {
    /// Round most recently handed to consensus.
    requested: Option<(CommitteeId, LogIndex)>,
    /// Every round this node ever requested, in order. Survives restarts.
    request_log: Vec<(CommitteeId, LogIndex)>,
    /// Transactions already handed to the ledger.
    submitted: BTreeSet<TransactionId>,
}

/// Deterministic simulation runner.
///
/// Processes events in deterministic order. Given the same seed and the same
/// sequence of calls, produces identical results every run.
pub struct SimulationRunner {
    config: SimulationConfig,

    /// `None` while a node is crashed.
    nodes: Vec<Option<ChainManager>>,

    /// Key shares per node. Survive restarts.
    registries: Vec<Arc<StaticKeyShareRegistry>>,

    /// Round state per node. Survives restarts.
    stores: Vec<MemoryRoundStore>,

    drivers: Vec<NodeDriver>,

    /// Global event queue, ordered deterministically.
    event_queue: BTreeMap<EventKey, Event>,

    /// Sequence counter for deterministic ordering.
    sequence: u64,

    /// Current simulation time.
    now: Duration,

    network: SimulatedNetwork,

    /// RNG for network conditions and round timeouts.
    rng: ChaCha8Rng,

    consensus: MockConsensus,

    ledger: MockLedger,

    stats: SimulationStats,
}

impl SimulationRunner {
    pub fn new(config: SimulationConfig, seed: u64) -> Self {
        let num_nodes = config.network.num_nodes;
        let registries: Vec<_> = (0..num_nodes)
            .map(|_| Arc::new(StaticKeyShareRegistry::new()))
            .collect();
        let stores: Vec<_> = (0..num_nodes).map(|_| MemoryRoundStore::new()).collect();
        let nodes = (0..num_nodes)
            .map(|i| Some(build_node(i, &registries, &stores, &config.cmt_log)))
            .collect();
        let drivers = (0..num_nodes).map(|_| NodeDriver::default()).collect();

        info!(num_nodes, seed, "Created simulation runner");

        Self {
            nodes,
            registries,
            stores,
            drivers,
            event_queue: BTreeMap::new(),
            sequence: 0,
            now: Duration::ZERO,
            network: SimulatedNetwork::new(config.network.clone()),
            rng: ChaCha8Rng::seed_from_u64(seed),
            consensus: MockConsensus::new(config.consensus_timeout_rate),
            ledger: MockLedger::new(),
            stats: SimulationStats::default(),
            config,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Accessors
    // ═══════════════════════════════════════════════════════════════════════

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Chain manager of a node; `None` if out of range or crashed.
    pub fn node(&self, index: NodeIndex) -> Option<&ChainManager> {
        self.nodes.get(index as usize).and_then(Option::as_ref)
    }

    pub fn is_up(&self, index: NodeIndex) -> bool {
        self.node(index).is_some()
    }

    /// Persisted round state of a node, readable while it is down.
    pub fn round_store(&self, index: NodeIndex) -> Option<&MemoryRoundStore> {
        self.stores.get(index as usize)
    }

    /// Rounds a node has requested, across restarts.
    pub fn consensus_requests(&self, index: NodeIndex) -> &[(CommitteeId, LogIndex)] {
        self.drivers
            .get(index as usize)
            .map(|d| d.request_log.as_slice())
            .unwrap_or(&[])
    }

    pub fn ledger(&self) -> &MockLedger {
        &self.ledger
    }

    pub fn consensus(&self) -> &MockConsensus {
        &self.consensus
    }

    pub fn stats(&self) -> &SimulationStats {
        &self.stats
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn network(&self) -> &SimulatedNetwork {
        &self.network
    }

    /// Network handle for cutting and healing links mid-run.
    pub fn network_mut(&mut self) -> &mut SimulatedNetwork {
        &mut self.network
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Setup and faults
    // ═══════════════════════════════════════════════════════════════════════

    /// Give every member of `share` its key share.
    pub fn register_committee(&mut self, share: KeyShare) {
        for member in share.members() {
            match self.registries.get(member.0 as usize) {
                Some(registry) => registry.insert(share.clone()),
                None => warn!(node = %member, "Committee member outside the simulation"),
            }
        }
        info!(
            committee = %share.committee_id().short(),
            size = share.size(),
            "Registered committee"
        );
    }

    /// Create the chain controlled by `controller` and announce it to every node.
    pub fn start(&mut self, controller: Address) -> AnchorOutput {
        let genesis = self.ledger.genesis(controller);
        self.broadcast_confirmation(self.now, &genesis);
        genesis
    }

    /// Schedule a ledger rotation to `controller` after `delay`.
    pub fn schedule_rotation(&mut self, delay: Duration, controller: Address) {
        let time = self.now + delay;
        self.schedule_event(0, time, Event::Rotate { controller });
    }

    /// Schedule a local input for one node after `delay`.
    pub fn schedule_input(&mut self, node: NodeIndex, delay: Duration, input: ChainManagerInput) {
        let time = self.now + delay;
        self.schedule_event(node, time, Event::Input(input));
    }

    /// Stop a node. Its in-memory state is lost; its round store is kept.
    pub fn crash_node(&mut self, index: NodeIndex) {
        if let Some(slot) = self.nodes.get_mut(index as usize) {
            if slot.take().is_some() {
                info!(node = index, time = ?self.now, "Node crashed");
            }
        }
    }

    /// Start a fresh chain manager on a node's surviving round store.
    ///
    /// The node learns the current ledger tip right away.
    pub fn restart_node(&mut self, index: NodeIndex) {
        let i = index as usize;
        if i >= self.nodes.len() {
            warn!(node = index, "Cannot restart unknown node");
            return;
        }
        self.nodes[i] = Some(build_node(
            index,
            &self.registries,
            &self.stores,
            &self.config.cmt_log,
        ));
        let driver = &mut self.drivers[i];
        driver.requested = None;
        driver.submitted.clear();
        self.stats.restarts += 1;
        info!(node = index, time = ?self.now, "Node restarted");

        if let Some(tip) = self.ledger.current().cloned() {
            self.schedule_event(
                index,
                self.now,
                Event::Input(ChainManagerInput::AnchorConfirmed(tip)),
            );
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Event loop
    // ═══════════════════════════════════════════════════════════════════════

    /// Run until the event queue is empty or the next event is past `end_time`.
    pub fn run_until(&mut self, end_time: Duration) {
        trace!(end_time_secs = end_time.as_secs_f64(), "Running simulation step");

        while let Some((&key, _)) = self.event_queue.first_key_value() {
            if key.time > end_time {
                debug!(remaining_events = self.event_queue.len(), "Time limit reached");
                break;
            }
            let Some((key, event)) = self.event_queue.pop_first() else {
                break;
            };
            self.now = key.time;
            self.stats.events_processed += 1;
            trace!(time = ?self.now, node = key.node_index, event = event.type_name(), "Processing event");
            self.process_event(key.node_index, event);
        }
        if self.now < end_time {
            self.now = end_time;
        }

        trace!(
            events_processed = self.stats.events_processed,
            final_time = ?self.now,
            "Simulation step complete"
        );
    }

    fn process_event(&mut self, node: NodeIndex, event: Event) {
        match event {
            Event::Deliver { from, payload } => {
                self.step_node(node, |manager| manager.message_bytes(node_id(from), &payload));
            }
            Event::Input(input) => {
                self.step_node(node, |manager| manager.input(input));
            }
            Event::Publish(tx) => self.ledger_publish(node, tx),
            Event::Rotate { controller } => {
                if let Some(anchor) = self.ledger.rotate(controller) {
                    self.stats.rotations += 1;
                    self.broadcast_confirmation(self.now + self.config.ledger_latency, &anchor);
                }
            }
        }
    }

    /// Feed one event to a live node and act on what it asks for.
    fn step_node<F>(&mut self, node: NodeIndex, f: F)
    where
        F: FnOnce(&mut ChainManager) -> OutMessages<CmtLogEnvelope>,
    {
        let Some(manager) = self.nodes.get_mut(node as usize).and_then(Option::as_mut) else {
            self.stats.events_dropped_down += 1;
            trace!(node, "Event for crashed node dropped");
            return;
        };
        let messages = f(manager);
        let output = manager.current_output().clone();

        self.send_messages(node, messages);
        self.handle_output(node, output);
    }

    fn send_messages(&mut self, from: NodeIndex, messages: OutMessages<CmtLogEnvelope>) {
        for message in messages {
            let to = message.recipient.0 as NodeIndex;
            let payload = message.payload.encode();
            if to == from {
                self.stats.messages_loopback += 1;
                self.schedule_event(to, self.now, Event::Deliver { from, payload });
                continue;
            }
            if to as usize >= self.nodes.len() {
                warn!(from, recipient = %message.recipient, "Recipient outside the simulation");
                continue;
            }
            self.try_deliver_message(from, to, payload);
        }
    }

    fn try_deliver_message(&mut self, from: NodeIndex, to: NodeIndex, payload: Vec<u8>) {
        match self.network.route(from, to, &mut self.rng) {
            Delivery::After(latency) => {
                self.stats.messages_sent += 1;
                self.schedule_event(to, self.now + latency, Event::Deliver { from, payload });
            }
            Delivery::Cut => {
                self.stats.messages_dropped_partition += 1;
                trace!(from, to, "Message dropped on cut link");
            }
            Delivery::Lost => {
                self.stats.messages_dropped_loss += 1;
                trace!(from, to, "Message lost");
            }
        }
    }

    fn handle_output(&mut self, node: NodeIndex, output: ChainManagerOutput) {
        if let Some(request) = &output.need_consensus {
            let key = (request.committee, request.log_index);
            let driver = &mut self.drivers[node as usize];
            if driver.requested != Some(key) {
                driver.requested = Some(key);
                driver.request_log.push(key);
                self.request_consensus(node, request);
            }
        }

        for tx in output.need_publish_tx {
            if self.drivers[node as usize].submitted.insert(tx.transaction_id) {
                self.stats.publications_submitted += 1;
                let time = self.now + self.config.ledger_latency;
                self.schedule_event(node, time, Event::Publish(tx));
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Consensus and ledger
    // ═══════════════════════════════════════════════════════════════════════

    /// A fresh decision goes to every member; a known one to the requester only.
    fn request_consensus(&mut self, node: NodeIndex, request: &NeedConsensus) {
        self.stats.consensus_requests += 1;
        let (decision, fresh) = self.consensus.decide(request, &mut self.rng);
        let input = decision.to_input(request.committee, request.log_index);
        let time = self.now + self.config.consensus_delay;

        if !fresh {
            self.schedule_event(node, time, Event::Input(input));
            return;
        }
        match decision {
            RoundDecision::Output { .. } => self.stats.rounds_decided += 1,
            RoundDecision::Timeout => self.stats.rounds_timed_out += 1,
        }
        for member in request.key_share.members() {
            let member = member.0 as NodeIndex;
            if (member as usize) < self.nodes.len() {
                self.schedule_event(member, time, Event::Input(input.clone()));
            }
        }
    }

    fn ledger_publish(&mut self, submitter: NodeIndex, tx: NeedPublishTx) {
        let outcome = self.ledger.publish(&tx.consumed, &tx.produced);
        let time = self.now + self.config.ledger_latency;
        let confirmed = match outcome {
            PublishOutcome::Confirmed(anchor) => {
                self.stats.anchors_confirmed += 1;
                self.broadcast_confirmation(time, &anchor);
                true
            }
            PublishOutcome::AlreadyConfirmed => true,
            PublishOutcome::Rejected => {
                self.stats.publications_rejected += 1;
                false
            }
        };
        self.schedule_event(
            submitter,
            time,
            Event::Input(ChainManagerInput::PublishResult {
                transaction_id: tx.transaction_id,
                confirmed,
            }),
        );
    }

    fn broadcast_confirmation(&mut self, time: Duration, anchor: &AnchorOutput) {
        for node in 0..self.nodes.len() as NodeIndex {
            self.schedule_event(
                node,
                time,
                Event::Input(ChainManagerInput::AnchorConfirmed(anchor.clone())),
            );
        }
    }

    fn schedule_event(&mut self, node: NodeIndex, time: Duration, event: Event) -> EventKey {
        self.sequence += 1;
        let key = EventKey::new(time, &event, node, self.sequence);
        self.event_queue.insert(key, event);
        key
    }
}

fn node_id(index: NodeIndex) -> NodeId {
    NodeId(index as u64)
}

fn build_node(
    index: NodeIndex,
    registries: &[Arc<StaticKeyShareRegistry>],
    stores: &[MemoryRoundStore],
    config: &CmtLogConfig,
) -> ChainManager {
    let i = index as usize;
    ChainManager::new(
        node_id(index),
        registries[i].clone(),
        Arc::new(stores[i].clone()),
        config.clone(),
    )
}
