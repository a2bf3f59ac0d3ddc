//! Chain manager.
//!
//! Owns one [`CmtLogState`](anchorlog_cmt_log::CmtLogState) per committee this
//! node belongs to, routes ledger and consensus events to them by committee
//! identity, and turns the output of the active committee into a single
//! instruction for the node:
//!
//! - [`NeedConsensus`]: run consensus for committee C, round L, on base A
//! - [`NeedPublishTx`]: publish these transactions to the ledger
//!
//! Only the committee controlling the latest confirmed anchor is active.
//! Every other committee log is suspended as soon as a confirmation is routed.

mod messages;
mod output;
mod registry;
mod state;

pub use messages::{ChainManagerInput, CmtLogEnvelope};
pub use output::{ChainManagerOutput, NeedConsensus, NeedPublishTx};
pub use registry::{KeyShareRegistry, StaticKeyShareRegistry};
pub use state::{ChainManager, ChainManagerError};
