//! # Domain Errors
//!
//! Error types for the Conversation Store subsystem.
//!
//! ## Design Principles
//!
//! - Address and authorization failures surface to the caller immediately
//! - Missing directory or history entries are NOT errors; reads degrade to empty
//! - Store errors carry a transient/permanent distinction so callers can retry

use thiserror::Error;

/// Errors produced while resolving a raw client address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// Fewer than two participants named.
    #[error("address names {found} participant(s), at least 2 required")]
    TooFewParticipants { found: usize },

    /// A token between two separators is empty.
    #[error("address contains an empty participant id")]
    EmptyParticipant,

    /// A participant id uses a reserved character.
    #[error("participant id {participant:?} contains reserved character {reserved:?}")]
    ReservedCharacter { participant: String, reserved: char },

    /// The same participant appears more than once.
    #[error("participant {participant:?} appears more than once")]
    DuplicateParticipant { participant: String },

    /// Archival suffix is not `<millis>-<generation>`.
    #[error("malformed archival suffix {suffix:?}")]
    MalformedArchiveSuffix { suffix: String },
}

/// Key-value store errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KVStoreError {
    /// I/O error during read/write.
    #[error("KV store I/O error: {message}")]
    IOError { message: String },

    /// Data corruption in the store.
    #[error("KV store corruption: {message}")]
    CorruptionError { message: String },

    /// A round trip exceeded the configured bound.
    #[error("KV store operation timed out after {millis}ms")]
    Timeout { millis: u64 },

    /// A conditional write found a different value than expected.
    #[error("KV store precondition failed on key {key}")]
    Conflict { key: String },

    /// Backend temporarily unreachable.
    #[error("KV store unavailable: {message}")]
    Unavailable { message: String },
}

impl KVStoreError {
    /// Whether repeating the same operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            KVStoreError::Timeout { .. }
                | KVStoreError::Conflict { .. }
                | KVStoreError::Unavailable { .. }
        )
    }

    /// Build a `Conflict` for a raw key, rendering it printable.
    pub fn conflict(key: &[u8]) -> Self {
        KVStoreError::Conflict {
            key: String::from_utf8_lossy(key).replace('\0', "/"),
        }
    }
}

/// Errors that can occur during conversation operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversationError {
    /// Address could not be resolved.
    #[error("invalid address: {0}")]
    Address(#[from] AddressError),

    /// The authorize predicate rejected the participant set.
    #[error("unauthorized chat group: {group}")]
    UnauthorizedGroup { group: String },

    /// Requested QoS exceeds the supported maximum.
    #[error("invalid qos {requested}: maximum supported is {maximum}")]
    InvalidQos { requested: u8, maximum: u8 },

    /// The group has no current epoch to write into.
    #[error("no active epoch for group {group}")]
    NoActiveEpoch { group: String },

    /// A directly requested record does not exist.
    #[error("not found: {what}")]
    NotFound { what: String },

    /// Backing store failure.
    #[error("store error: {0}")]
    Store(#[from] KVStoreError),

    /// Record encoding/decoding failure.
    #[error("serialization error: {message}")]
    Serialization { message: String },

    /// Optimistic epoch transition lost every race.
    #[error("epoch contention on {group}: gave up after {attempts} attempts")]
    EpochContention { group: String, attempts: u32 },

    /// The history writer has been shut down.
    #[error("history writer is closed")]
    WriterClosed,
}

impl ConversationError {
    /// Whether the caller may retry the same request.
    pub fn is_retryable(&self) -> bool {
        match self {
            ConversationError::Store(err) => err.is_transient(),
            ConversationError::EpochContention { .. } => true,
            _ => false,
        }
    }

    pub(crate) fn serialization(err: impl std::fmt::Display) -> Self {
        ConversationError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<bincode::Error> for ConversationError {
    fn from(err: bincode::Error) -> Self {
        ConversationError::serialization(err)
    }
}

impl From<serde_json::Error> for ConversationError {
    fn from(err: serde_json::Error) -> Self {
        ConversationError::serialization(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(KVStoreError::Timeout { millis: 10 }.is_transient());
        assert!(KVStoreError::conflict(b"ns\0a|b").is_transient());
        assert!(!KVStoreError::IOError {
            message: "disk".into()
        }
        .is_transient());
    }

    #[test]
    fn test_retryable_propagates_from_store() {
        let err: ConversationError = KVStoreError::Unavailable {
            message: "down".into(),
        }
        .into();
        assert!(err.is_retryable());

        let err: ConversationError = AddressError::EmptyParticipant.into();
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_conflict_key_is_printable() {
        match KVStoreError::conflict(b"ns\0a|b") {
            KVStoreError::Conflict { key } => assert_eq!(key, "ns/a|b"),
            other => panic!("Expected Conflict, got {other:?}"),
        }
    }
}
