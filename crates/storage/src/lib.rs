//! Durable round state for committee logs.
//!
//! [`RocksDbRoundStore`] implements
//! [`RoundStateStore`](anchorlog_cmt_log::RoundStateStore) on RocksDB.
//!
//! # Layout
//!
//! ```text
//! column family "round_state"
//!   key:   committee id (32 bytes)
//!   value: SBOR-encoded RoundStateRecord
//! ```
//!
//! Writes are synced before returning: a committee log exposes a round only
//! after its log index is on disk.

mod rocksdb_store;

pub use rocksdb_store::{CompressionType, RocksDbConfig, RocksDbRoundStore, CF_ROUND_STATE};
