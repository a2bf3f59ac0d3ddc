//! Committee log protocol.
//!
//! One instance runs per committee on every member node. The instances agree,
//! by quorum voting on a monotonic [`LogIndex`](anchorlog_types::LogIndex), on
//! when the next consensus round may start, and on which anchor output it must
//! build on.
//!
//! # Components
//!
//! - [`CmtLogState`] - The protocol instance, implements [`anchorlog_core::Protocol`]
//! - [`LocalView`] - Tracks confirmed and pending anchors to find the round base
//! - [`RoundStateStore`] - Persistence port for the restart-safety floor
//! - [`CmtLogConfig`] - Quorum policy
//!
//! # Restart safety
//!
//! The log index is persisted before a round is exposed. After a restart the
//! instance refuses every round at or below the persisted index, so a node never
//! re-enters a round it may already have signed in.

mod config;
mod local_view;
mod messages;
mod state;
mod store;

pub use config::{CmtLogConfig, QuorumPolicy};
pub use local_view::{LocalView, LocalViewEntry};
pub use messages::{CmtLogInput, CmtLogMessage, MSG_NEXT_LOG_INDEX};
pub use state::{CmtLogError, CmtLogOutput, CmtLogState};
pub use store::{MemoryRoundStore, RoundStateStore, StoreError};
