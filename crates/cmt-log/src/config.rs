//! Quorum configuration.

/// How the tolerated number of faulty members is derived from committee size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuorumPolicy {
    /// Classic BFT bound: `f = (n - 1) / 3`.
    #[default]
    Bft,
    /// Fixed number of tolerated faulty members, capped so that `n - f >= 1`.
    MaxFaulty(usize),
}

/// Committee log configuration.
#[derive(Debug, Clone, Default)]
pub struct CmtLogConfig {
    /// Quorum policy used for both vote thresholds.
    pub quorum_policy: QuorumPolicy,
}

impl CmtLogConfig {
    /// Maximum number of faulty members `f` for a committee of `n`.
    pub fn max_faulty(&self, n: usize) -> usize {
        match self.quorum_policy {
            QuorumPolicy::Bft => n.saturating_sub(1) / 3,
            QuorumPolicy::MaxFaulty(f) => f.min(n.saturating_sub(1)),
        }
    }

    /// Votes needed to re-broadcast a proposal (`f + 1`).
    pub fn support_threshold(&self, n: usize) -> usize {
        self.max_faulty(n) + 1
    }

    /// Votes needed to adopt a log index (`n - f`).
    pub fn adoption_threshold(&self, n: usize) -> usize {
        n - self.max_faulty(n)
    }
}
