//! Presence Tracker.

use super::profile::ProfileCache;
use super::ConversationService;
use crate::domain::entities::{Membership, ProfileBasics};
use crate::domain::errors::ConversationError;
use crate::domain::keys::KeyPrefix;
use crate::ports::inbound::PresenceApi;
use crate::ports::outbound::{KeyValueStore, TimeSource};
use async_trait::async_trait;
use std::collections::BTreeSet;
use tracing::debug;

impl<KV, TS> ConversationService<KV, TS>
where
    KV: KeyValueStore + 'static,
    TS: TimeSource,
{
    /// Forget every online participant.
    pub(crate) async fn clear_presence(&self) -> Result<(), ConversationError> {
        self.store
            .delete_prefix(KeyPrefix::Presence.as_bytes())
            .await?;
        Ok(())
    }
}

#[async_trait]
impl<KV, TS> PresenceApi for ConversationService<KV, TS>
where
    KV: KeyValueStore + 'static,
    TS: TimeSource,
{
    async fn add_online(&self, user: &str) -> Result<(), ConversationError> {
        self.store.put(&KeyPrefix::presence_key(user), &[]).await?;
        debug!(user, "[kp-01] online");
        Ok(())
    }

    async fn remove_online(&self, user: &str) -> Result<(), ConversationError> {
        self.store.delete(&KeyPrefix::presence_key(user)).await?;
        debug!(user, "[kp-01] offline");
        Ok(())
    }

    async fn is_online(&self, user: &str) -> Result<bool, ConversationError> {
        Ok(self.store.exists(&KeyPrefix::presence_key(user)).await?)
    }

    async fn buddies_online(&self, user: &str) -> Result<Vec<ProfileBasics>, ConversationError> {
        let mut counterparts = BTreeSet::new();
        for (lineage, entry) in self.group_index(user).await? {
            if entry.label_participants() != 2 {
                continue;
            }
            let membership: Membership = self
                .store
                .get_record(&KeyPrefix::membership_key(&lineage))
                .await?
                .unwrap_or_default();
            counterparts.extend(membership.iter().filter(|m| m.as_str() != user).cloned());
        }

        let mut profiles = ProfileCache::default();
        let mut online = Vec::new();
        for buddy in &counterparts {
            if self.is_online(buddy).await? {
                online.push(profiles.basics_or_id(self, buddy).await);
            }
        }
        Ok(online)
    }
}
