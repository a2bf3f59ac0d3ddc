use anchorlog_cmt_log::{RoundStateStore, StoreError};
use anchorlog_types::{CommitteeId, LogIndex};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, Options, DB};
use sbor::prelude::*;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Column family holding per-committee round state.
pub const CF_ROUND_STATE: &str = "round_state";

/// Persisted value for one committee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, BasicSbor)]
struct RoundStateRecord {
    /// Log index of the latest round started by this node.
    log_index: u32,
}

/// Compression for on-disk data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionType {
    None,
    #[default]
    Lz4,
}

impl CompressionType {
    fn to_rocksdb(self) -> rocksdb::DBCompressionType {
        match self {
            CompressionType::None => rocksdb::DBCompressionType::None,
            CompressionType::Lz4 => rocksdb::DBCompressionType::Lz4,
        }
    }
}

/// Configuration for the RocksDB store.
#[derive(Debug, Clone)]
pub struct RocksDbConfig {
    /// Maximum number of background compaction and flush jobs
    pub max_background_jobs: i32,
    /// Number of log files to keep
    pub keep_log_file_num: usize,
    /// Compression type
    pub compression: CompressionType,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            max_background_jobs: 2,
            keep_log_file_num: 10,
            compression: CompressionType::Lz4,
        }
    }
}

/// RocksDB-based round state store.
///
/// Cheap to clone; clones share the same database handle.
#[derive(Clone)]
pub struct RocksDbRoundStore {
    db: Arc<DB>,
}

impl std::fmt::Debug for RocksDbRoundStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RocksDbRoundStore")
            .field("path", &self.db.path())
            .finish()
    }
}

impl RocksDbRoundStore {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        Self::open_with_config(path, RocksDbConfig::default())
    }

    /// Open with custom configuration.
    pub fn open_with_config<P: AsRef<Path>>(
        path: P,
        config: RocksDbConfig,
    ) -> Result<Self, StoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_max_background_jobs(config.max_background_jobs);
        opts.set_keep_log_file_num(config.keep_log_file_num);
        opts.set_compression_type(config.compression.to_rocksdb());

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new("default", Options::default()),
            ColumnFamilyDescriptor::new(CF_ROUND_STATE, Options::default()),
        ];
        let db = DB::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }

    fn cf(&self) -> Result<&ColumnFamily, StoreError> {
        self.db
            .cf_handle(CF_ROUND_STATE)
            .ok_or_else(|| StoreError::Backend(format!("Column family {} not found", CF_ROUND_STATE)))
    }
}

impl RoundStateStore for RocksDbRoundStore {
    fn load_round_state(&self, committee: &CommitteeId) -> Result<Option<LogIndex>, StoreError> {
        let cf = self.cf()?;
        let Some(value) = self
            .db
            .get_cf(cf, committee.as_bytes())
            .map_err(|e| StoreError::Backend(e.to_string()))?
        else {
            return Ok(None);
        };
        let record: RoundStateRecord =
            sbor::basic_decode(&value).map_err(|e| StoreError::Corrupt {
                committee: committee.to_string(),
                reason: format!("{:?}", e),
            })?;
        Ok(Some(LogIndex(record.log_index)))
    }

    /// Synced write; returns only once the value is durable.
    fn save_round_state(
        &self,
        committee: &CommitteeId,
        log_index: LogIndex,
    ) -> Result<(), StoreError> {
        let cf = self.cf()?;
        let value = sbor::basic_encode(&RoundStateRecord {
            log_index: log_index.as_u32(),
        })
        .map_err(|e| StoreError::Backend(format!("encode: {:?}", e)))?;

        let mut write_opts = rocksdb::WriteOptions::default();
        write_opts.set_sync(true);
        self.db
            .put_cf_opt(cf, committee.as_bytes(), value, &write_opts)
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        debug!(committee = %committee.short(), %log_index, "Round state persisted");
        Ok(())
    }
}
