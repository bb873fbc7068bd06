//! # History Writer
//!
//! Single-consumer append pipeline. `flush` enqueues and returns; one worker
//! appends FIFO, each append together with the timeline scores of the
//! epoch's members and their rank entries in one conditional batch.
//!
//! Failed appends are retried with exponential backoff. A job that still
//! fails is logged with its shadow and counted as dropped. Closing the
//! writer drains everything already enqueued.

use super::store::TimedStore;
use crate::adapters::KeyedLocks;
use crate::domain::address::{GroupIdentity, LineageName, ParticipantId};
use crate::domain::codec::{decode_record, decode_u64, encode_u64};
use crate::domain::entities::{DirectoryEntry, ShadowId, Timestamp};
use crate::domain::errors::ConversationError;
use crate::domain::keys::KeyPrefix;
use crate::domain::value_objects::ConversationConfig;
use crate::ports::outbound::{BatchOperation, KeyValueStore, Precondition};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// One message bound for a shadow's log.
#[derive(Debug, Clone)]
pub(crate) struct FlushJob {
    pub group: GroupIdentity,
    pub shadow: ShadowId,
    /// Directory generation the shadow was current in.
    pub generation: u64,
    pub lineage: LineageName,
    pub members: Vec<ParticipantId>,
    pub payload: Vec<u8>,
    pub flushed_at: Timestamp,
}

pub(crate) enum WriterCommand {
    Append(FlushJob),
    /// Answered once every earlier command has been handled.
    Barrier(oneshot::Sender<()>),
}

#[derive(Debug, Default)]
struct WriterCounters {
    appended: AtomicU64,
    dropped: AtomicU64,
}

/// Counters of the history writer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    pub appended: u64,
    pub dropped: u64,
}

pub(crate) struct HistoryWriter {
    sender: Mutex<Option<mpsc::UnboundedSender<WriterCommand>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    counters: Arc<WriterCounters>,
}

impl HistoryWriter {
    /// Start the worker task.
    ///
    /// Must be called from within a Tokio runtime.
    pub(crate) fn spawn<KV>(store: TimedStore<KV>, locks: KeyedLocks, config: ConversationConfig) -> Self
    where
        KV: KeyValueStore + 'static,
    {
        let (sender, receiver) = mpsc::unbounded_channel();
        let counters = Arc::new(WriterCounters::default());
        let worker = WriterWorker {
            store,
            locks,
            config,
            counters: Arc::clone(&counters),
        };
        let handle = tokio::spawn(worker.run(receiver));

        Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(handle)),
            counters,
        }
    }

    fn send(&self, command: WriterCommand) -> Result<(), ConversationError> {
        let sender = self.sender.lock();
        let sender = sender.as_ref().ok_or(ConversationError::WriterClosed)?;
        sender
            .send(command)
            .map_err(|_| ConversationError::WriterClosed)
    }

    pub(crate) fn enqueue(&self, job: FlushJob) -> Result<(), ConversationError> {
        self.send(WriterCommand::Append(job))
    }

    /// Wait until every job enqueued before this call has been handled.
    pub(crate) async fn settle(&self) -> Result<(), ConversationError> {
        let (tx, rx) = oneshot::channel();
        self.send(WriterCommand::Barrier(tx))?;
        rx.await.map_err(|_| ConversationError::WriterClosed)
    }

    /// Stop accepting jobs and wait for the queue to drain.
    pub(crate) async fn close(&self) {
        drop(self.sender.lock().take());
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(error = %e, "[kp-01] history writer task failed");
            }
        }
    }

    pub(crate) fn stats(&self) -> WriterStats {
        WriterStats {
            appended: self.counters.appended.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
        }
    }
}

struct WriterWorker<KV> {
    store: TimedStore<KV>,
    locks: KeyedLocks,
    config: ConversationConfig,
    counters: Arc<WriterCounters>,
}

impl<KV: KeyValueStore + 'static> WriterWorker<KV> {
    async fn run(self, mut receiver: mpsc::UnboundedReceiver<WriterCommand>) {
        debug!("[kp-01] history writer started");
        while let Some(command) = receiver.recv().await {
            match command {
                WriterCommand::Append(job) => self.append_with_retry(job).await,
                WriterCommand::Barrier(done) => {
                    let _ = done.send(());
                }
            }
        }
        info!(
            appended = self.counters.appended.load(Ordering::Relaxed),
            dropped = self.counters.dropped.load(Ordering::Relaxed),
            "[kp-01] history writer drained"
        );
    }

    async fn append_with_retry(&self, job: FlushJob) {
        let max_attempts = self.config.flush_max_attempts.max(1);
        // Sequence numbers earlier attempts wrote to; a timed-out write may still land.
        let mut attempted = Vec::new();
        for attempt in 1..=max_attempts {
            match self.append(&job, &mut attempted).await {
                Ok(seq) => {
                    self.counters.appended.fetch_add(1, Ordering::Relaxed);
                    debug!(shadow = %job.shadow, seq, "[kp-01] message appended");
                    return;
                }
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let backoff = self.config.flush_backoff_for(attempt);
                    warn!(
                        shadow = %job.shadow,
                        attempt,
                        error = %e,
                        "[kp-01] history append failed, retrying in {:?}",
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => {
                    self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                    error!(
                        shadow = %job.shadow,
                        group = %job.group,
                        attempts = attempt,
                        error = %e,
                        "[kp-01] dropping history write"
                    );
                    return;
                }
            }
        }
    }

    /// Append one message, returning its sequence number.
    ///
    /// `attempted` holds the sequence numbers of earlier attempts for the
    /// same job. If one of them already holds the payload, that attempt
    /// committed after its caller gave up and nothing is written again.
    async fn append(&self, job: &FlushJob, attempted: &mut Vec<u64>) -> Result<u64, ConversationError> {
        let _guard = self.locks.lock(job.group.as_str()).await;

        let length_key = KeyPrefix::log_length_key(&job.shadow);
        let length_raw = self.store.get(&length_key).await?;
        let seq = length_raw.as_deref().map(decode_u64).transpose()?.unwrap_or(0);

        for &earlier in attempted.iter().filter(|&&earlier| earlier < seq) {
            let entry = self.store.get(&KeyPrefix::log_entry_key(&job.shadow, earlier)).await?;
            if entry.as_deref() == Some(job.payload.as_slice()) {
                debug!(shadow = %job.shadow, seq = earlier, "[kp-01] earlier attempt committed late");
                return Ok(earlier);
            }
        }
        if !attempted.contains(&seq) {
            attempted.push(seq);
        }

        let mut preconditions = vec![Precondition::matches(length_key.clone(), length_raw)];
        let mut operations = vec![
            BatchOperation::put(KeyPrefix::log_entry_key(&job.shadow, seq), job.payload.clone()),
            BatchOperation::put(length_key, encode_u64(seq + 1)),
        ];

        // Scores only follow the epoch while it is still current.
        let directory_key = KeyPrefix::directory_key(&job.group);
        let directory_raw = self.store.get(&directory_key).await?;
        let directory = directory_raw
            .as_deref()
            .map(decode_record::<DirectoryEntry>)
            .transpose()?;
        let still_current = directory.is_some_and(|d| {
            d.generation == job.generation && d.shadow.as_ref() == Some(&job.shadow)
        });

        if still_current {
            preconditions.push(Precondition::matches(directory_key, directory_raw));
            let score = encode_u64(job.flushed_at);
            for member in &job.members {
                let timeline_key = KeyPrefix::timeline_key(member, &job.lineage);
                let previous_raw = self.store.get(&timeline_key).await?;
                if let Some(previous) = previous_raw.as_deref().map(decode_u64).transpose()? {
                    operations.push(BatchOperation::delete(KeyPrefix::timeline_rank_key(
                        member,
                        previous,
                        &job.lineage,
                    )));
                }
                operations.push(BatchOperation::put(
                    KeyPrefix::timeline_rank_key(member, job.flushed_at, &job.lineage),
                    Vec::new(),
                ));
                operations.push(BatchOperation::put(timeline_key.clone(), score.clone()));
                preconditions.push(Precondition::matches(timeline_key, previous_raw));
            }
        } else {
            debug!(shadow = %job.shadow, "[kp-01] epoch moved on, skipping timeline update");
        }

        self.store
            .conditional_batch_write(preconditions, operations)
            .await?;
        Ok(seq)
    }
}
