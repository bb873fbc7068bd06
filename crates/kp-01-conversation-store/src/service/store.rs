//! Store access with a bound on every round trip.

use crate::domain::codec::{decode_json, decode_record, decode_u64};
use crate::domain::errors::{ConversationError, KVStoreError};
use crate::ports::outbound::{BatchOperation, KeyValueStore, Precondition};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// `KeyValueStore` handle that fails with `KVStoreError::Timeout` instead of
/// waiting forever.
pub(crate) struct TimedStore<KV> {
    inner: Arc<KV>,
    timeout: Duration,
}

impl<KV> Clone for TimedStore<KV> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            timeout: self.timeout,
        }
    }
}

impl<KV: KeyValueStore> TimedStore<KV> {
    pub(crate) fn new(inner: KV, timeout: Duration) -> Self {
        Self {
            inner: Arc::new(inner),
            timeout,
        }
    }

    pub(crate) fn inner(&self) -> &KV {
        &self.inner
    }

    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> Result<T, KVStoreError>
    where
        F: Future<Output = Result<T, KVStoreError>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                let millis = self.timeout.as_millis() as u64;
                warn!(operation, millis, "[kp-01] store round trip timed out");
                Err(KVStoreError::Timeout { millis })
            }
        }
    }

    pub(crate) async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        self.bounded("get", self.inner.get(key)).await
    }

    pub(crate) async fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        self.bounded("put", self.inner.put(key, value)).await
    }

    pub(crate) async fn delete(&self, key: &[u8]) -> Result<(), KVStoreError> {
        self.bounded("delete", self.inner.delete(key)).await
    }

    pub(crate) async fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError> {
        self.bounded("exists", self.inner.exists(key)).await
    }

    pub(crate) async fn atomic_batch_write(
        &self,
        operations: Vec<BatchOperation>,
    ) -> Result<(), KVStoreError> {
        self.bounded("batch", self.inner.atomic_batch_write(operations))
            .await
    }

    pub(crate) async fn conditional_batch_write(
        &self,
        preconditions: Vec<Precondition>,
        operations: Vec<BatchOperation>,
    ) -> Result<(), KVStoreError> {
        self.bounded(
            "conditional_batch",
            self.inner.conditional_batch_write(preconditions, operations),
        )
        .await
    }

    pub(crate) async fn prefix_scan(
        &self,
        prefix: &[u8],
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KVStoreError> {
        self.bounded("prefix_scan", self.inner.prefix_scan(prefix))
            .await
    }

    pub(crate) async fn prefix_scan_page(
        &self,
        prefix: &[u8],
        skip: usize,
        limit: usize,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KVStoreError> {
        self.bounded(
            "prefix_scan_page",
            self.inner.prefix_scan_page(prefix, skip, limit),
        )
        .await
    }

    pub(crate) async fn delete_prefix(&self, prefix: &[u8]) -> Result<(), KVStoreError> {
        self.bounded("delete_prefix", self.inner.delete_prefix(prefix))
            .await
    }

    /// Read and decode a bincode record.
    pub(crate) async fn get_record<T: DeserializeOwned>(
        &self,
        key: &[u8],
    ) -> Result<Option<T>, ConversationError> {
        self.get(key)
            .await?
            .map(|raw| decode_record(&raw))
            .transpose()
    }

    /// Read and decode a JSON record.
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        key: &[u8],
    ) -> Result<Option<T>, ConversationError> {
        self.get(key).await?.map(|raw| decode_json(&raw)).transpose()
    }

    /// Read a big-endian counter.
    pub(crate) async fn get_u64(&self, key: &[u8]) -> Result<Option<u64>, ConversationError> {
        self.get(key).await?.map(|raw| decode_u64(&raw)).transpose()
    }
}
