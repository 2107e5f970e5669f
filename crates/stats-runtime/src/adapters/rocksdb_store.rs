//! # RocksDB Stats Store
//!
//! Durable implementation of the engine's three store ports.
//!
//! ## Column Families
//!
//! - `days` - `YYYY-MM-DD` -> JSON day bucket
//! - `watermarks` - kind -> big-endian `u64` height
//! - `totals` - `stake` -> JSON stake total
//!
//! Day keys sort lexicographically in date order, so range queries are a
//! single reverse iteration.

use std::path::PathBuf;

use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, Direction, IteratorMode, Options, WriteOptions, DB};
use stats_engine::{
    DailyBucket, DayKey, DayStore, Height, StakeTotal, StakeTotalStore, StoreError,
    WatermarkStore,
};

/// Day buckets.
pub const CF_DAYS: &str = "days";
/// Progress watermarks.
pub const CF_WATERMARKS: &str = "watermarks";
/// Running totals.
pub const CF_TOTALS: &str = "totals";

/// All column families used by the store.
pub const COLUMN_FAMILIES: &[&str] = &[CF_DAYS, CF_WATERMARKS, CF_TOTALS];

const STAKE_TOTAL_KEY: &[u8] = b"stake";

/// RocksDB tuning.
#[derive(Debug, Clone)]
pub struct RocksDbConfig {
    /// Database directory.
    pub path: PathBuf,
    /// Block cache size in bytes (default: 32MB).
    pub block_cache_size: usize,
    /// Write buffer size in bytes (default: 16MB).
    pub write_buffer_size: usize,
    /// fsync after each write (default: true).
    pub sync_writes: bool,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/stats"),
            block_cache_size: 32 * 1024 * 1024,
            write_buffer_size: 16 * 1024 * 1024,
            sync_writes: true,
        }
    }
}

impl RocksDbConfig {
    /// Small buffers, no fsync.
    pub fn for_testing(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            block_cache_size: 1024 * 1024,
            write_buffer_size: 1024 * 1024,
            sync_writes: false,
        }
    }
}

/// RocksDB-backed day, watermark and stake-total store.
pub struct RocksStatsStore {
    db: DB,
    config: RocksDbConfig,
}

impl RocksStatsStore {
    /// Open or create the database.
    pub fn open(config: RocksDbConfig) -> Result<Self, StoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_write_buffer_size(config.write_buffer_size);
        opts.set_compression_type(rocksdb::DBCompressionType::Snappy);

        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        block_opts.set_block_cache(&rocksdb::Cache::new_lru_cache(config.block_cache_size));
        opts.set_block_based_table_factory(&block_opts);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = COLUMN_FAMILIES
            .iter()
            .map(|name| {
                let mut cf_opts = Options::default();
                cf_opts.set_compression_type(rocksdb::DBCompressionType::Snappy);
                ColumnFamilyDescriptor::new(*name, cf_opts)
            })
            .collect();

        let db = DB::open_cf_descriptors(&opts, &config.path, cf_descriptors)
            .map_err(|e| StoreError::Io(format!("Failed to open RocksDB: {}", e)))?;

        Ok(Self { db, config })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily, StoreError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Io(format!("missing column family {}", name)))
    }

    fn write_opts(&self) -> WriteOptions {
        let mut opts = WriteOptions::default();
        opts.set_sync(self.config.sync_writes);
        opts
    }

    fn put(&self, cf_name: &str, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let cf = self.cf(cf_name)?;
        self.db
            .put_cf_opt(cf, key, value, &self.write_opts())
            .map_err(|e| StoreError::Io(format!("RocksDB put failed: {}", e)))
    }

    fn get(&self, cf_name: &str, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let cf = self.cf(cf_name)?;
        self.db
            .get_cf(cf, key)
            .map_err(|e| StoreError::Io(format!("RocksDB get failed: {}", e)))
    }
}

#[async_trait]
impl DayStore for RocksStatsStore {
    async fn get_day(&self, date: DayKey) -> Result<Option<DailyBucket>, StoreError> {
        match self.get(CF_DAYS, date.to_string().as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn upsert_day(&self, bucket: &DailyBucket) -> Result<(), StoreError> {
        let value = serde_json::to_vec(bucket)?;
        self.put(CF_DAYS, bucket.date.to_string().as_bytes(), &value)
    }

    async fn query_range(
        &self,
        from_exclusive: DayKey,
        to_inclusive: DayKey,
    ) -> Result<Vec<DailyBucket>, StoreError> {
        if from_exclusive >= to_inclusive {
            return Ok(Vec::new());
        }

        let cf = self.cf(CF_DAYS)?;
        let from_key = from_exclusive.to_string();
        let to_key = to_inclusive.to_string();

        let mut buckets = Vec::new();
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(to_key.as_bytes(), Direction::Reverse));
        for item in iter {
            let (key, value) =
                item.map_err(|e| StoreError::Io(format!("RocksDB iteration failed: {}", e)))?;
            if key.as_ref() <= from_key.as_bytes() {
                break;
            }
            buckets.push(serde_json::from_slice(&value)?);
        }
        Ok(buckets)
    }
}

#[async_trait]
impl WatermarkStore for RocksStatsStore {
    async fn get_watermark(&self, kind: &str) -> Result<Option<Height>, StoreError> {
        match self.get(CF_WATERMARKS, kind.as_bytes())? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                    StoreError::Codec(format!("watermark {} has {} bytes", kind, bytes.len()))
                })?;
                Ok(Some(u64::from_be_bytes(raw)))
            }
            None => Ok(None),
        }
    }

    async fn set_watermark(&self, kind: &str, height: Height) -> Result<(), StoreError> {
        self.put(CF_WATERMARKS, kind.as_bytes(), &height.to_be_bytes())
    }
}

#[async_trait]
impl StakeTotalStore for RocksStatsStore {
    async fn get_stake_total(&self) -> Result<StakeTotal, StoreError> {
        match self.get(CF_TOTALS, STAKE_TOTAL_KEY)? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(StakeTotal::default()),
        }
    }

    async fn set_stake_total(&self, total: &StakeTotal) -> Result<(), StoreError> {
        let value = serde_json::to_vec(total)?;
        self.put(CF_TOTALS, STAKE_TOTAL_KEY, &value)
    }
}
