//! Profile cache, chat tokens, address checks and subscription listings.

use super::ConversationService;
use crate::domain::address::{check_participant, resolve, LineageName, ParticipantId};
use crate::domain::codec::{decode_record, encode_json, encode_record};
use crate::domain::entities::{
    ChatTokenRecord, DirectoryEntry, GroupIndexEntry, Membership, ProfileBasics, UserProfile,
};
use crate::domain::errors::ConversationError;
use crate::domain::keys::KeyPrefix;
use crate::ports::inbound::ProfileApi;
use crate::ports::outbound::{BatchOperation, GroupAuthorizer, KeyValueStore, TimeSource};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Profiles looked up during one call.
///
/// A failed lookup is remembered as `None`; callers fall back to the bare id.
#[derive(Default)]
pub(crate) struct ProfileCache {
    entries: HashMap<ParticipantId, Option<ProfileBasics>>,
}

impl ProfileCache {
    pub(crate) async fn basics<KV, TS>(
        &mut self,
        service: &ConversationService<KV, TS>,
        user: &str,
    ) -> Option<ProfileBasics>
    where
        KV: KeyValueStore + 'static,
        TS: TimeSource,
    {
        if let Some(cached) = self.entries.get(user) {
            return cached.clone();
        }
        let loaded = match service.load_profile(user).await {
            Ok(profile) => profile.map(|p| p.basics),
            Err(e) => {
                warn!(user, error = %e, "[kp-01] profile lookup failed");
                None
            }
        };
        self.entries.insert(user.to_string(), loaded.clone());
        loaded
    }

    /// Basic profile, or one carrying only the id.
    pub(crate) async fn basics_or_id<KV, TS>(
        &mut self,
        service: &ConversationService<KV, TS>,
        user: &str,
    ) -> ProfileBasics
    where
        KV: KeyValueStore + 'static,
        TS: TimeSource,
    {
        self.basics(service, user)
            .await
            .unwrap_or_else(|| ProfileBasics::anonymous(user))
    }
}

impl<KV, TS> ConversationService<KV, TS>
where
    KV: KeyValueStore + 'static,
    TS: TimeSource,
{
    pub(crate) async fn load_profile(
        &self,
        user: &str,
    ) -> Result<Option<UserProfile>, ConversationError> {
        self.store.get_json(&KeyPrefix::profile_key(user)).await
    }

    /// Whether every participant has a stored profile.
    pub(crate) async fn participants_registered(
        &self,
        participants: &[ParticipantId],
    ) -> Result<bool, ConversationError> {
        for participant in participants {
            if !self.store.exists(&KeyPrefix::profile_key(participant)).await? {
                debug!(%participant, "[kp-01] participant has no profile");
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Members of the group's current epoch; empty when it has none.
    pub(crate) async fn current_members(
        &self,
        raw_address: &str,
    ) -> Result<Membership, ConversationError> {
        let address = resolve(raw_address)?;
        let directory: Option<DirectoryEntry> = self
            .store
            .get_record(&KeyPrefix::directory_key(&address.group))
            .await?;
        if !directory.is_some_and(|d| d.shadow.is_some()) {
            return Ok(Membership::new());
        }
        let lineage = LineageName::canonical(&address.group);
        Ok(self
            .store
            .get_record(&KeyPrefix::membership_key(&lineage))
            .await?
            .unwrap_or_default())
    }

    /// The user's Group Index entries, keyed by lineage.
    pub(crate) async fn group_index(
        &self,
        user: &str,
    ) -> Result<Vec<(LineageName, GroupIndexEntry)>, ConversationError> {
        let rows = self
            .store
            .prefix_scan(&KeyPrefix::GroupIndex.owner_prefix(user))
            .await?;
        let mut entries = Vec::with_capacity(rows.len());
        for (key, raw) in rows {
            let Some(lineage) = KeyPrefix::GroupIndex.lineage_of(user, &key) else {
                continue;
            };
            match decode_record::<GroupIndexEntry>(&raw) {
                Ok(entry) => entries.push((lineage, entry)),
                Err(e) => warn!(user, %lineage, error = %e, "[kp-01] unreadable group index entry"),
            }
        }
        Ok(entries)
    }
}

#[async_trait]
impl<KV, TS> ProfileApi for ConversationService<KV, TS>
where
    KV: KeyValueStore + 'static,
    TS: TimeSource,
{
    async fn bootstrap_session(
        &self,
        profile: UserProfile,
        chat_token: String,
    ) -> Result<ChatTokenRecord, ConversationError> {
        let user = profile.basics.id.clone();
        check_participant(&user)?;

        let record = ChatTokenRecord {
            token: chat_token,
            expires_at: self
                .now()
                .saturating_add(self.config.chat_token_ttl_secs.saturating_mul(1000)),
        };
        self.store
            .atomic_batch_write(vec![
                BatchOperation::put(KeyPrefix::profile_key(&user), encode_json(&profile)?),
                BatchOperation::put(KeyPrefix::chat_token_key(&user), encode_record(&record)?),
            ])
            .await?;

        info!(%user, expires_at = record.expires_at, "[kp-01] session bootstrapped");
        Ok(record)
    }

    async fn chat_token(&self, user: &str) -> Result<Option<String>, ConversationError> {
        let record: Option<ChatTokenRecord> = self
            .store
            .get_record(&KeyPrefix::chat_token_key(user))
            .await?;
        let now = self.now();
        Ok(record.filter(|r| r.is_live(now)).map(|r| r.token))
    }

    async fn basic_profile(&self, user: &str) -> Result<ProfileBasics, ConversationError> {
        self.full_profile(user).await.map(|p| p.basics)
    }

    async fn full_profile(&self, user: &str) -> Result<UserProfile, ConversationError> {
        self.load_profile(user)
            .await?
            .ok_or_else(|| ConversationError::NotFound {
                what: format!("profile of {user}"),
            })
    }

    async fn validate_address(&self, raw_address: &str) -> Result<bool, ConversationError> {
        let address = match resolve(raw_address) {
            Ok(address) => address,
            Err(e) => {
                debug!(raw_address, error = %e, "[kp-01] address rejected");
                return Ok(false);
            }
        };
        if address.require_distinct().is_err() {
            return Ok(false);
        }
        self.participants_registered(&address.participants).await
    }

    async fn client_subscriptions(
        &self,
        user: &str,
    ) -> Result<BTreeMap<String, u8>, ConversationError> {
        Ok(self
            .group_index(user)
            .await?
            .into_iter()
            .map(|(_, entry)| (entry.label, entry.qos.level()))
            .collect())
    }

    async fn conversation_members(
        &self,
        raw_address: &str,
    ) -> Result<Vec<ProfileBasics>, ConversationError> {
        let membership = self.current_members(raw_address).await?;
        let mut cache = ProfileCache::default();
        let mut profiles = Vec::with_capacity(membership.len());
        for member in membership.iter() {
            profiles.push(cache.basics_or_id(self, member).await);
        }
        Ok(profiles)
    }
}

/// Authorizer admitting participant sets whose members all have a profile.
pub struct RegisteredParticipants<KV, TS>
where
    KV: KeyValueStore + 'static,
    TS: TimeSource,
{
    service: Arc<ConversationService<KV, TS>>,
}

impl<KV, TS> RegisteredParticipants<KV, TS>
where
    KV: KeyValueStore + 'static,
    TS: TimeSource,
{
    pub fn new(service: Arc<ConversationService<KV, TS>>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<KV, TS> GroupAuthorizer for RegisteredParticipants<KV, TS>
where
    KV: KeyValueStore + 'static,
    TS: TimeSource,
{
    async fn authorize(&self, participants: &[ParticipantId]) -> bool {
        match self.service.participants_registered(participants).await {
            Ok(registered) => registered,
            Err(e) => {
                warn!(error = %e, "[kp-01] authorization lookup failed");
                false
            }
        }
    }
}
