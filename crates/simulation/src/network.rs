//! Links between simulated nodes.
//!
//! A message on an open link arrives after the base latency give or take
//! the configured jitter, unless the loss roll drops it. A cut link drops
//! everything without touching the RNG, so adding a partition does not shift
//! the random sequence seen by the rest of the run.

use crate::NodeIndex;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeSet;
use std::time::Duration;

/// Shape of the simulated network.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Number of nodes; node `i` runs as `NodeId(i)`.
    pub num_nodes: u32,
    /// One-way latency of every link.
    pub latency: Duration,
    /// Latency varies uniformly by up to this fraction either way.
    pub jitter_fraction: f64,
    /// Probability that a message on an open link is lost.
    pub packet_loss_rate: f64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            num_nodes: 4,
            latency: Duration::from_millis(50),
            jitter_fraction: 0.1,
            packet_loss_rate: 0.0,
        }
    }
}

/// What happens to one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Arrives after this delay.
    After(Duration),
    /// The link is cut.
    Cut,
    /// Lost at random.
    Lost,
}

/// Deterministic network between simulated nodes.
///
/// Messages a node sends to itself never pass through here.
#[derive(Debug)]
pub struct SimulatedNetwork {
    config: NetworkConfig,
    /// Directed links that carry nothing.
    cut: BTreeSet<(NodeIndex, NodeIndex)>,
}

impl SimulatedNetwork {
    pub fn new(config: NetworkConfig) -> Self {
        Self {
            config,
            cut: BTreeSet::new(),
        }
    }

    pub fn is_partitioned(&self, from: NodeIndex, to: NodeIndex) -> bool {
        self.cut.contains(&(from, to))
    }

    /// Cut every link between the two sides, in both directions.
    pub fn split(&mut self, side_a: &[NodeIndex], side_b: &[NodeIndex]) {
        for &a in side_a {
            for &b in side_b {
                if a != b {
                    self.cut.insert((a, b));
                    self.cut.insert((b, a));
                }
            }
        }
    }

    pub fn isolate_node(&mut self, node: NodeIndex) {
        let rest: Vec<NodeIndex> = (0..self.config.num_nodes).filter(|n| *n != node).collect();
        self.split(&[node], &rest);
    }

    /// Restore every link.
    pub fn heal(&mut self) {
        self.cut.clear();
    }

    /// Number of cut directed links.
    pub fn partition_count(&self) -> usize {
        self.cut.len()
    }

    /// Decide the fate of one message from `from` to `to`.
    pub fn route(&self, from: NodeIndex, to: NodeIndex, rng: &mut ChaCha8Rng) -> Delivery {
        if self.is_partitioned(from, to) {
            return Delivery::Cut;
        }
        if self.lost(rng) {
            return Delivery::Lost;
        }
        Delivery::After(self.delay(rng))
    }

    /// No roll at all when loss is off.
    fn lost(&self, rng: &mut ChaCha8Rng) -> bool {
        self.config.packet_loss_rate > 0.0 && rng.gen_bool(self.config.packet_loss_rate.min(1.0))
    }

    fn delay(&self, rng: &mut ChaCha8Rng) -> Duration {
        let jitter = self.config.jitter_fraction;
        let factor = if jitter > 0.0 {
            1.0 + jitter * rng.gen_range(-1.0..1.0)
        } else {
            1.0
        };
        self.config
            .latency
            .mul_f64(factor.max(0.0))
            .max(Duration::from_millis(1))
    }
}
