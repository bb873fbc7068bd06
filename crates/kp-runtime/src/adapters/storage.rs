//! Store selection.

use crate::config::{StorageConfig, StoreBackend};
use kp_01_conversation_store::{InMemoryKVStore, KVStoreError, KeyValueStore};
use std::sync::Arc;
use tracing::{info, warn};

/// Open the configured key-value store.
pub fn open_store(config: &StorageConfig) -> Result<Arc<dyn KeyValueStore>, KVStoreError> {
    match &config.backend {
        StoreBackend::Memory => {
            warn!("Using the in-memory store; conversation state is lost on restart");
            Ok(Arc::new(InMemoryKVStore::new()))
        }
        #[cfg(feature = "rocksdb")]
        StoreBackend::RocksDb { path } => {
            use super::rocksdb_adapter::{RocksDbConfig, RocksDbStore};

            std::fs::create_dir_all(path).map_err(|e| KVStoreError::IOError {
                message: format!("Failed to create data directory {}: {e}", path.display()),
            })?;
            let store = RocksDbStore::open(RocksDbConfig {
                sync_writes: config.sync_writes,
                ..RocksDbConfig::new(path.clone())
            })?;
            info!(path = %path.display(), "Opened RocksDB store");
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "rocksdb"))]
        StoreBackend::RocksDb { path } => Err(KVStoreError::Unavailable {
            message: format!(
                "RocksDB store at {} requires the `rocksdb` feature",
                path.display()
            ),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_opens() {
        let store = open_store(&StorageConfig::default()).unwrap();
        store.put(b"k", b"v").await.unwrap();
        assert_eq!(store.get(b"k").await.unwrap(), Some(b"v".to_vec()));
    }

    #[cfg(not(feature = "rocksdb"))]
    #[test]
    fn test_rocksdb_without_feature_unavailable() {
        let config = StorageConfig {
            backend: StoreBackend::RocksDb {
                path: "/tmp/kp-never-created".into(),
            },
            sync_writes: false,
        };
        assert!(matches!(
            open_store(&config),
            Err(KVStoreError::Unavailable { .. })
        ));
    }

    #[cfg(feature = "rocksdb")]
    #[tokio::test]
    async fn test_rocksdb_store_opens() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = StorageConfig {
            backend: StoreBackend::RocksDb {
                path: dir.path().join("db"),
            },
            sync_writes: false,
        };
        let store = open_store(&config).unwrap();
        store.put(b"k", b"v").await.unwrap();
        assert!(store.exists(b"k").await.unwrap());
    }
}
