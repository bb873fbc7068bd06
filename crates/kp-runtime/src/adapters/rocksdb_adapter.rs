//! # RocksDB Storage Adapter
//!
//! Persistent implementation of the conversation `KeyValueStore`.
//!
//! ## Features
//!
//! - Atomic batch writes (WriteBatch)
//! - Conditional batches: precondition reads and the batch write happen under
//!   one writer lock, so they are atomic with respect to this process
//! - Snappy compression and bloom filters
//! - Blocking calls run on the tokio blocking pool

use kp_01_conversation_store::{BatchOperation, KVStoreError, KeyValueStore, Precondition};
use async_trait::async_trait;
use parking_lot::Mutex;
use rocksdb::{Direction, IteratorMode, Options, WriteBatch, WriteOptions, DB};
use std::path::PathBuf;
use std::sync::Arc;

/// RocksDB configuration
#[derive(Debug, Clone)]
pub struct RocksDbConfig {
    /// Path to the database directory
    pub path: PathBuf,
    /// Block cache size in bytes (default: 64MB)
    pub block_cache_size: usize,
    /// Write buffer size in bytes (default: 32MB)
    pub write_buffer_size: usize,
    /// Enable fsync after each write (default: true for durability)
    pub sync_writes: bool,
}

impl RocksDbConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            block_cache_size: 64 * 1024 * 1024,
            write_buffer_size: 32 * 1024 * 1024,
            sync_writes: true,
        }
    }

    /// Create config for testing (smaller buffers, no sync)
    pub fn for_testing(path: impl Into<PathBuf>) -> Self {
        Self {
            block_cache_size: 4 * 1024 * 1024,
            write_buffer_size: 2 * 1024 * 1024,
            sync_writes: false,
            ..Self::new(path)
        }
    }
}

struct Inner {
    db: DB,
    sync_writes: bool,
    /// Serializes writers so conditional batches observe a stable state.
    writer: Mutex<()>,
}

impl Inner {
    fn write_options(&self) -> WriteOptions {
        let mut opts = WriteOptions::default();
        opts.set_sync(self.sync_writes);
        opts
    }

    fn write(&self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
        let mut batch = WriteBatch::default();
        for op in operations {
            match op {
                BatchOperation::Put { key, value } => batch.put(&key, &value),
                BatchOperation::Delete { key } => batch.delete(&key),
            }
        }
        self.db
            .write_opt(batch, &self.write_options())
            .map_err(|e| io_error("batch write", e))
    }
}

fn io_error(operation: &str, e: rocksdb::Error) -> KVStoreError {
    KVStoreError::IOError {
        message: format!("RocksDB {operation} failed: {e}"),
    }
}

/// RocksDB-backed key-value store
#[derive(Clone)]
pub struct RocksDbStore {
    inner: Arc<Inner>,
}

impl RocksDbStore {
    /// Open or create a RocksDB database
    pub fn open(config: RocksDbConfig) -> Result<Self, KVStoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_write_buffer_size(config.write_buffer_size);
        opts.set_compression_type(rocksdb::DBCompressionType::Snappy);

        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        block_opts.set_block_cache(&rocksdb::Cache::new_lru_cache(config.block_cache_size));
        opts.set_block_based_table_factory(&block_opts);

        let db = DB::open(&opts, &config.path).map_err(|e| KVStoreError::IOError {
            message: format!("Failed to open RocksDB at {}: {e}", config.path.display()),
        })?;

        Ok(Self {
            inner: Arc::new(Inner {
                db,
                sync_writes: config.sync_writes,
                writer: Mutex::new(()),
            }),
        })
    }

    /// Run a closure against the database on the blocking pool.
    async fn blocking<T, F>(&self, f: F) -> Result<T, KVStoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Inner) -> Result<T, KVStoreError> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || f(&inner))
            .await
            .map_err(|e| KVStoreError::IOError {
                message: format!("RocksDB task failed: {e}"),
            })?
    }
}

#[async_trait]
impl KeyValueStore for RocksDbStore {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        let key = key.to_vec();
        self.blocking(move |inner| inner.db.get(&key).map_err(|e| io_error("get", e)))
            .await
    }

    async fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        let operation = BatchOperation::put(key.to_vec(), value.to_vec());
        self.atomic_batch_write(vec![operation]).await
    }

    async fn delete(&self, key: &[u8]) -> Result<(), KVStoreError> {
        let operation = BatchOperation::delete(key.to_vec());
        self.atomic_batch_write(vec![operation]).await
    }

    async fn atomic_batch_write(&self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
        self.blocking(move |inner| {
            let _writer = inner.writer.lock();
            inner.write(operations)
        })
        .await
    }

    async fn conditional_batch_write(
        &self,
        preconditions: Vec<Precondition>,
        operations: Vec<BatchOperation>,
    ) -> Result<(), KVStoreError> {
        self.blocking(move |inner| {
            let _writer = inner.writer.lock();
            for precondition in &preconditions {
                let observed = inner
                    .db
                    .get_pinned(&precondition.key)
                    .map_err(|e| io_error("precondition read", e))?;
                if !precondition.holds(observed.as_deref()) {
                    return Err(KVStoreError::conflict(&precondition.key));
                }
            }
            inner.write(operations)
        })
        .await
    }

    async fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KVStoreError> {
        let prefix = prefix.to_vec();
        self.blocking(move |inner| {
            let mut results = Vec::new();
            let iter = inner
                .db
                .iterator(IteratorMode::From(&prefix, Direction::Forward));
            for item in iter {
                let (key, value) = item.map_err(|e| io_error("scan", e))?;
                if !key.starts_with(&prefix) {
                    break;
                }
                results.push((key.to_vec(), value.to_vec()));
            }
            Ok(results)
        })
        .await
    }
    async fn prefix_scan_page(
        &self,
        prefix: &[u8],
        skip: usize,
        limit: usize,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KVStoreError> {
        let prefix = prefix.to_vec();
        self.blocking(move |inner| {
            let mut results = Vec::with_capacity(limit.min(256));
            let iter = inner
                .db
                .iterator(IteratorMode::From(&prefix, Direction::Forward))
                .skip(skip)
                .take(limit);
            for item in iter {
                let (key, value) = item.map_err(|e| io_error("scan", e))?;
                if !key.starts_with(&prefix) {
                    break;
                }
                results.push((key.to_vec(), value.to_vec()));
            }
            Ok(results)
        })
        .await
    }
}
