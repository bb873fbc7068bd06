//! # Inbound Ports (Driving Ports)
//!
//! The APIs the Conversation Store exposes. The broker hooks drive
//! `EpochApi` and `PresenceApi`; the HTTP gateway drives the read side
//! through [`ChatQueries`].

use crate::domain::entities::{
    ChatListEntry, ChatTokenRecord, Message, ProfileBasics, ShadowId, UserProfile,
};
use crate::domain::errors::ConversationError;
use crate::ports::outbound::GroupAuthorizer;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Epoch lifecycle and history writes.
#[async_trait]
pub trait EpochApi: Send + Sync {
    /// Resolve `raw_address` and return the current shadow, creating or
    /// splitting an epoch when membership requires it.
    async fn subscribe(
        &self,
        raw_address: &str,
        user: &str,
        qos: u8,
        authorizer: &dyn GroupAuthorizer,
    ) -> Result<ShadowId, ConversationError>;

    /// Remove `user` from the group's current epoch, archiving it.
    async fn unsubscribe(&self, raw_address: &str, user: &str) -> Result<(), ConversationError>;

    /// Enqueue `message` for the group's current shadow without waiting
    /// for storage.
    async fn flush(&self, raw_address: &str, message: Message) -> Result<(), ConversationError>;
}

/// History reads.
#[async_trait]
pub trait HistoryApi: Send + Sync {
    /// Messages `[offset, offset + count)` of the lineage, newest first, as
    /// seen through `user`'s own history pointer.
    async fn scan(
        &self,
        user: &str,
        lineage: &str,
        offset: usize,
        count: usize,
    ) -> Result<Vec<Message>, ConversationError>;
}

/// Conversation listings.
#[async_trait]
pub trait ListingApi: Send + Sync {
    /// Lineages ranked `[from, to)` by recency score, with member names.
    async fn timeline(
        &self,
        user: &str,
        from: usize,
        to: usize,
    ) -> Result<Vec<ChatListEntry>, ConversationError>;

    /// Every lineage the user holds a subscription for, most recent first,
    /// never-flushed ones last.
    async fn chat_rooms(
        &self,
        user: &str,
        offset: usize,
        count: usize,
    ) -> Result<Vec<ChatListEntry>, ConversationError>;
}

/// Online presence.
#[async_trait]
pub trait PresenceApi: Send + Sync {
    async fn add_online(&self, user: &str) -> Result<(), ConversationError>;

    async fn remove_online(&self, user: &str) -> Result<(), ConversationError>;

    async fn is_online(&self, user: &str) -> Result<bool, ConversationError>;

    /// Online one-to-one counterparts of `user`; never includes `user`.
    async fn buddies_online(&self, user: &str) -> Result<Vec<ProfileBasics>, ConversationError>;
}

/// Profiles, chat tokens and address checks.
#[async_trait]
pub trait ProfileApi: Send + Sync {
    /// Store the profile and a chat token that expires after the configured TTL.
    async fn bootstrap_session(
        &self,
        profile: UserProfile,
        chat_token: String,
    ) -> Result<ChatTokenRecord, ConversationError>;

    /// The user's chat token while it is unexpired.
    async fn chat_token(&self, user: &str) -> Result<Option<String>, ConversationError>;

    async fn basic_profile(&self, user: &str) -> Result<ProfileBasics, ConversationError>;

    async fn full_profile(&self, user: &str) -> Result<UserProfile, ConversationError>;

    /// Whether the address names at least two distinct, registered participants.
    async fn validate_address(&self, raw_address: &str) -> Result<bool, ConversationError>;

    /// Client label -> QoS for every subscription the user holds.
    async fn client_subscriptions(
        &self,
        user: &str,
    ) -> Result<BTreeMap<String, u8>, ConversationError>;

    /// Basic profiles of the current epoch's members.
    async fn conversation_members(
        &self,
        raw_address: &str,
    ) -> Result<Vec<ProfileBasics>, ConversationError>;
}

/// Read side consumed by the HTTP gateway.
pub trait ChatQueries: HistoryApi + ListingApi + PresenceApi + ProfileApi {}

impl<T> ChatQueries for T where T: HistoryApi + ListingApi + PresenceApi + ProfileApi {}
