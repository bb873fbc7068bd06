//! # Conversation Store (kp-01)
//!
//! Multi-party conversation semantics on top of a publish/subscribe broker.
//! A client-chosen address (`"bob|alice"`) resolves to a canonical group
//! identity; each group has a current **epoch** bound to one append-only
//! history log (its **shadow**) and one membership snapshot. Membership
//! changes archive the epoch under a stamped name and start a new one, so
//! every participant keeps reading exactly the history they took part in.
//!
//! ## Architecture
//!
//! ```text
//! Broker hooks ──subscribe/unsubscribe──→ Epoch Controller ──→ one conditional batch
//!              ──flush──────────────────→ History Writer (queue) ──→ log + timeline
//! HTTP gateway ──scan / listings / presence / profiles──→ read side
//! ```
//!
//! ## Domain Invariants
//!
//! | ID | Invariant | Description |
//! |----|-----------|-------------|
//! | 1 | Canonical Identity | Any permutation of an address resolves to the same group |
//! | 2 | Single Current Epoch | At most one shadow is current per group |
//! | 3 | Pointer Honesty | A history pointer names a shadow whose members included the user when written |
//! | 4 | Atomic Transitions | Create, split and archive land entirely or not at all |
//! | 5 | Immutable Logs | Renames never touch stored messages |
//! | 6 | Score Carry-Over | Archiving keeps each member's timeline score |
//! | 7 | Bounded Round Trips | Every store call fails with a transient error after the timeout |
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - Pure domain logic (address resolution, epoch planning, records)
//! - `ports/` - Port traits (inbound API, outbound SPI)
//! - `adapters/` - In-memory store, time sources, keyed locks
//! - `service/` - Application service implementing the APIs
//!
//! ## Usage
//!
//! ```ignore
//! use kp_01_conversation_store::*;
//!
//! let service = ConversationService::new(
//!     ConversationDependencies {
//!         kv_store: InMemoryKVStore::new(),
//!         time_source: SystemTimeSource,
//!     },
//!     ConversationConfig::default(),
//! );
//!
//! let shadow = service.subscribe("bob|alice", "alice", 1, &AllowAll).await?;
//! service.flush("alice|bob", Message::new("alice", "alice|bob", "hi", now)).await?;
//! let history = service.scan("bob", "alice|bob", 0, 25).await?;
//! ```

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

// Re-export key types for convenience
pub use adapters::{InMemoryKVStore, KeyedLocks, ManualTimeSource, SystemTimeSource};
pub use domain::address::{
    resolve, ArchiveStamp, GroupIdentity, LineageName, ParticipantId, ResolvedAddress,
    PARTICIPANT_SEPARATOR,
};
pub use domain::entities::{
    ChatInfo, ChatListEntry, ChatTokenRecord, DirectoryEntry, GroupIndexEntry, Member,
    Membership, Message, MessageKind, ProfileBasics, Qos, ShadowId, Timestamp, UserProfile,
};
pub use domain::errors::{AddressError, ConversationError, KVStoreError};
pub use domain::keys::KeyPrefix;
pub use domain::value_objects::ConversationConfig;
pub use ports::inbound::{ChatQueries, EpochApi, HistoryApi, ListingApi, PresenceApi, ProfileApi};
pub use ports::outbound::{
    AllowAll, BatchOperation, FnAuthorizer, GroupAuthorizer, KeyValueStore, Precondition,
    TimeSource,
};
pub use service::{
    ConversationDependencies, ConversationService, RegisteredParticipants, WriterStats,
};
