//! # Conversation Service
//!
//! The main service implementing the Conversation Store APIs.
//!
//! ## Architecture
//!
//! This service:
//! 1. Implements `EpochApi` (subscribe, unsubscribe, flush)
//! 2. Implements the read side: `HistoryApi`, `ListingApi`, `PresenceApi`, `ProfileApi`
//! 3. Serializes epoch transitions per group and guards them with a
//!    generation compare-and-swap on the directory entry
//! 4. Owns the history writer task

mod epoch;
mod listing;
mod presence;
mod profile;
mod reader;
mod store;
mod writer;

pub use profile::RegisteredParticipants;
pub use writer::WriterStats;

use crate::adapters::KeyedLocks;
use crate::domain::entities::Timestamp;
use crate::domain::errors::ConversationError;
use crate::domain::value_objects::ConversationConfig;
use crate::ports::outbound::{KeyValueStore, TimeSource};
use store::TimedStore;
use tracing::info;
use writer::HistoryWriter;

/// The Conversation Service.
pub struct ConversationService<KV, TS>
where
    KV: KeyValueStore + 'static,
    TS: TimeSource,
{
    /// Key-value store, every call bounded by `config.store_timeout`.
    pub(crate) store: TimedStore<KV>,
    /// Time source for archive stamps, scores and token expiry.
    pub(crate) time_source: TS,
    /// Service configuration.
    pub(crate) config: ConversationConfig,
    /// Per-group critical sections shared with the writer.
    pub(crate) locks: KeyedLocks,
    /// History append pipeline.
    pub(crate) writer: HistoryWriter,
}

/// Dependencies for ConversationService
pub struct ConversationDependencies<KV, TS> {
    pub kv_store: KV,
    pub time_source: TS,
}

impl<KV, TS> ConversationService<KV, TS>
where
    KV: KeyValueStore + 'static,
    TS: TimeSource,
{
    /// Create the service and start its history writer.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(deps: ConversationDependencies<KV, TS>, config: ConversationConfig) -> Self {
        let store = TimedStore::new(deps.kv_store, config.store_timeout);
        let locks = KeyedLocks::new();
        let writer = HistoryWriter::spawn(store.clone(), locks.clone(), config.clone());

        Self {
            store,
            time_source: deps.time_source,
            config,
            locks,
            writer,
        }
    }

    /// Clear presence left over from a previous run.
    pub async fn start(&self) -> Result<(), ConversationError> {
        self.clear_presence().await?;
        info!("[kp-01] conversation store started, presence cleared");
        Ok(())
    }

    /// Clear presence and drain the history writer.
    ///
    /// `flush` fails with `WriterClosed` afterwards.
    pub async fn close(&self) -> Result<(), ConversationError> {
        let cleared = self.clear_presence().await;
        self.writer.close().await;
        self.locks.prune();
        let stats = self.writer.stats();
        info!(
            appended = stats.appended,
            dropped = stats.dropped,
            "[kp-01] conversation store closed"
        );
        cleared
    }

    /// Wait until every message flushed so far has been written or dropped.
    pub async fn settle(&self) -> Result<(), ConversationError> {
        self.writer.settle().await
    }

    pub fn writer_stats(&self) -> WriterStats {
        self.writer.stats()
    }

    pub fn config(&self) -> &ConversationConfig {
        &self.config
    }

    /// The underlying store.
    pub fn kv_store(&self) -> &KV {
        self.store.inner()
    }

    pub(crate) fn now(&self) -> Timestamp {
        self.time_source.now_millis()
    }
}
