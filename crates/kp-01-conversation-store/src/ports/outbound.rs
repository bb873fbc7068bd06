//! # Outbound Ports (Driven Ports)
//!
//! Dependencies the Conversation Store requires from the host application.

use crate::domain::address::ParticipantId;
use crate::domain::entities::Timestamp;
use crate::domain::errors::KVStoreError;
use async_trait::async_trait;
use std::sync::Arc;

/// Abstract interface for key-value database operations.
///
/// Production: `RocksDbStore` (kp-runtime/adapters/rocksdb_adapter.rs)
/// Testing: `InMemoryKVStore` (adapters/memory.rs)
///
/// Implementations are shared between the request path and the history
/// writer, so every method takes `&self`.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Get a value by key.
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError>;

    /// Put a single key-value pair.
    async fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError>;

    /// Delete a key. Deleting a missing key succeeds.
    async fn delete(&self, key: &[u8]) -> Result<(), KVStoreError>;

    /// Execute an atomic batch write.
    ///
    /// Either ALL operations in the batch are applied, in order, or NONE are.
    async fn atomic_batch_write(&self, operations: Vec<BatchOperation>)
        -> Result<(), KVStoreError>;

    /// Atomic batch write applied only if every precondition holds.
    ///
    /// Checking the preconditions and applying the batch is one atomic step.
    /// A failed check applies nothing and returns `KVStoreError::Conflict`.
    async fn conditional_batch_write(
        &self,
        preconditions: Vec<Precondition>,
        operations: Vec<BatchOperation>,
    ) -> Result<(), KVStoreError>;

    /// Check if a key exists.
    async fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError> {
        Ok(self.get(key).await?.is_some())
    }

    /// All pairs whose key starts with `prefix`, in ascending key order.
    async fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KVStoreError>;

    /// At most `limit` pairs under `prefix`, skipping the first `skip`.
    ///
    /// Stores with ordered iterators should override this to stop early.
    async fn prefix_scan_page(
        &self,
        prefix: &[u8],
        skip: usize,
        limit: usize,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KVStoreError> {
        Ok(self
            .prefix_scan(prefix)
            .await?
            .into_iter()
            .skip(skip)
            .take(limit)
            .collect())
    }

    /// Delete every key starting with `prefix`.
    async fn delete_prefix(&self, prefix: &[u8]) -> Result<(), KVStoreError> {
        let operations = self
            .prefix_scan(prefix)
            .await?
            .into_iter()
            .map(|(key, _)| BatchOperation::delete(key))
            .collect();
        self.atomic_batch_write(operations).await
    }
}

#[async_trait]
impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        (**self).get(key).await
    }

    async fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        (**self).put(key, value).await
    }

    async fn delete(&self, key: &[u8]) -> Result<(), KVStoreError> {
        (**self).delete(key).await
    }

    async fn atomic_batch_write(&self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
        (**self).atomic_batch_write(operations).await
    }

    async fn conditional_batch_write(
        &self,
        preconditions: Vec<Precondition>,
        operations: Vec<BatchOperation>,
    ) -> Result<(), KVStoreError> {
        (**self).conditional_batch_write(preconditions, operations).await
    }

    async fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError> {
        (**self).exists(key).await
    }

    async fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KVStoreError> {
        (**self).prefix_scan(prefix).await
    }

    async fn prefix_scan_page(
        &self,
        prefix: &[u8],
        skip: usize,
        limit: usize,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KVStoreError> {
        (**self).prefix_scan_page(prefix, skip, limit).await
    }

    async fn delete_prefix(&self, prefix: &[u8]) -> Result<(), KVStoreError> {
        (**self).delete_prefix(prefix).await
    }
}

/// Batch operation for atomic writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOperation {
    /// Put a key-value pair.
    Put { key: Vec<u8>, value: Vec<u8> },
    /// Delete a key.
    Delete { key: Vec<u8> },
}

impl BatchOperation {
    /// Create a Put operation.
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Create a Delete operation.
    pub fn delete(key: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Delete { key: key.into() }
    }

    pub fn key(&self) -> &[u8] {
        match self {
            BatchOperation::Put { key, .. } | BatchOperation::Delete { key } => key,
        }
    }
}

/// Expected state of one key at commit time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Precondition {
    pub key: Vec<u8>,
    /// `None` requires the key to be absent.
    pub expected: Option<Vec<u8>>,
}

impl Precondition {
    /// Require `key` to hold exactly `value`, or to be absent when `None`.
    pub fn matches(key: impl Into<Vec<u8>>, expected: Option<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            expected,
        }
    }

    /// Require `key` to be absent.
    pub fn absent(key: impl Into<Vec<u8>>) -> Self {
        Self::matches(key, None)
    }

    /// Whether the observed value satisfies this precondition.
    pub fn holds(&self, observed: Option<&[u8]>) -> bool {
        self.expected.as_deref() == observed
    }
}

/// Abstract interface for time operations (for testability).
pub trait TimeSource: Send + Sync {
    /// Current wall-clock time in milliseconds since the Unix epoch.
    fn now_millis(&self) -> Timestamp;
}

impl<T: TimeSource + ?Sized> TimeSource for Arc<T> {
    fn now_millis(&self) -> Timestamp {
        (**self).now_millis()
    }
}

/// Predicate deciding whether a participant set may form a conversation.
#[async_trait]
pub trait GroupAuthorizer: Send + Sync {
    async fn authorize(&self, participants: &[ParticipantId]) -> bool;
}

/// Authorizer that admits every participant set.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

#[async_trait]
impl GroupAuthorizer for AllowAll {
    async fn authorize(&self, _participants: &[ParticipantId]) -> bool {
        true
    }
}

/// Authorizer backed by a synchronous closure.
pub struct FnAuthorizer<F>(pub F);

#[async_trait]
impl<F> GroupAuthorizer for FnAuthorizer<F>
where
    F: Fn(&[ParticipantId]) -> bool + Send + Sync,
{
    async fn authorize(&self, participants: &[ParticipantId]) -> bool {
        (self.0)(participants)
    }
}
