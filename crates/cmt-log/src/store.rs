//! Persistence port for the committee log.
//!
//! Only one value is persisted per committee: the log index of the latest
//! round this node started. It is written before the round is exposed.

use anchorlog_types::{CommitteeId, LogIndex};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors reported by a [`RoundStateStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Corrupt round state for committee {committee}: {reason}")]
    Corrupt { committee: String, reason: String },
}

/// Durable per-committee round state.
///
/// `save_round_state` must not return `Ok` before the value survives a
/// process crash.
pub trait RoundStateStore: Send + Sync {
    /// Last persisted log index, or `None` if this committee never started a round.
    fn load_round_state(&self, committee: &CommitteeId) -> Result<Option<LogIndex>, StoreError>;

    /// Persist the log index of a round about to start.
    fn save_round_state(&self, committee: &CommitteeId, log_index: LogIndex)
        -> Result<(), StoreError>;
}

/// In-memory store.
///
/// Clones share the same map, so a simulated node can be rebuilt from the
/// state its previous incarnation wrote.
#[derive(Debug, Clone, Default)]
pub struct MemoryRoundStore {
    inner: Arc<Mutex<HashMap<CommitteeId, LogIndex>>>,
}

impl MemoryRoundStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committees with persisted state.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl RoundStateStore for MemoryRoundStore {
    fn load_round_state(&self, committee: &CommitteeId) -> Result<Option<LogIndex>, StoreError> {
        Ok(self.inner.lock().get(committee).copied())
    }

    fn save_round_state(
        &self,
        committee: &CommitteeId,
        log_index: LogIndex,
    ) -> Result<(), StoreError> {
        self.inner.lock().insert(*committee, log_index);
        Ok(())
    }
}
