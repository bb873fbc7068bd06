//! Store adapters selected at startup.

#[cfg(feature = "rocksdb")]
pub mod rocksdb_adapter;
pub mod storage;

#[cfg(feature = "rocksdb")]
pub use rocksdb_adapter::{RocksDbConfig, RocksDbStore};
pub use storage::open_store;
