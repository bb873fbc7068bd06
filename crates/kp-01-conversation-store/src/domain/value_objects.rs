//! # Value Objects
//!
//! Configuration for the Conversation Store.

use std::time::Duration;

/// Configuration for the conversation service.
///
/// All values have defaults suitable for a single-node deployment.
#[derive(Debug, Clone)]
pub struct ConversationConfig {
    /// Highest accepted delivery QoS (default: 2).
    pub max_qos: u8,

    /// Upper bound on every store round trip (default: 2s).
    pub store_timeout: Duration,

    /// Optimistic attempts for one epoch transition before giving up (default: 5).
    pub max_epoch_retries: u32,

    /// Attempts per history append before the write is dropped (default: 3).
    pub flush_max_attempts: u32,

    /// Base delay between append attempts; doubles each retry (default: 50ms).
    pub flush_retry_backoff: Duration,

    /// Largest page a single scan may return (default: 200).
    pub max_scan_count: usize,

    /// Lifetime of a chat token issued on session bootstrap (default: 1 hour).
    pub chat_token_ttl_secs: u64,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_qos: 2,
            store_timeout: Duration::from_secs(2),
            max_epoch_retries: 5,
            flush_max_attempts: 3,
            flush_retry_backoff: Duration::from_millis(50),
            max_scan_count: 200,
            chat_token_ttl_secs: 3600,
        }
    }
}

impl ConversationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the store round-trip bound.
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Set the append retry policy.
    pub fn with_flush_retries(mut self, attempts: u32, backoff: Duration) -> Self {
        self.flush_max_attempts = attempts.max(1);
        self.flush_retry_backoff = backoff;
        self
    }

    pub fn with_max_epoch_retries(mut self, retries: u32) -> Self {
        self.max_epoch_retries = retries.max(1);
        self
    }

    pub fn with_chat_token_ttl(mut self, secs: u64) -> Self {
        self.chat_token_ttl_secs = secs;
        self
    }

    /// Backoff before retry number `attempt` (1-based).
    pub fn flush_backoff_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(10);
        self.flush_retry_backoff.saturating_mul(1 << shift)
    }
}
