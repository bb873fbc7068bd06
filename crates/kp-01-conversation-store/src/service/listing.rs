//! Conversation listing and timeline.

use super::profile::ProfileCache;
use super::ConversationService;
use crate::domain::address::LineageName;
use crate::domain::codec::decode_u64;
use crate::domain::entities::{ChatInfo, ChatListEntry, Member, Membership};
use crate::domain::errors::ConversationError;
use crate::domain::keys::KeyPrefix;
use crate::ports::inbound::ListingApi;
use crate::ports::outbound::{KeyValueStore, TimeSource};
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::warn;

impl<KV, TS> ConversationService<KV, TS>
where
    KV: KeyValueStore + 'static,
    TS: TimeSource,
{
    /// The user's whole timeline with scores, highest first. Ties break by name.
    pub(crate) async fn ranked_timeline(
        &self,
        user: &str,
    ) -> Result<Vec<(LineageName, u64)>, ConversationError> {
        let rows = self
            .store
            .prefix_scan(&KeyPrefix::Timeline.owner_prefix(user))
            .await?;

        let mut ranked = Vec::with_capacity(rows.len());
        for (key, raw) in rows {
            let Some(lineage) = KeyPrefix::Timeline.lineage_of(user, &key) else {
                continue;
            };
            match decode_u64(&raw) {
                Ok(score) => ranked.push((lineage, score)),
                Err(e) => warn!(user, %lineage, error = %e, "[kp-01] unreadable timeline score"),
            }
        }
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(ranked)
    }

    /// Attach member ids and display names to each lineage.
    async fn describe(
        &self,
        lineages: Vec<LineageName>,
    ) -> Result<Vec<ChatListEntry>, ConversationError> {
        let mut profiles = ProfileCache::default();
        let mut listing = Vec::with_capacity(lineages.len());

        for lineage in lineages {
            let membership: Membership = self
                .store
                .get_record(&KeyPrefix::membership_key(&lineage))
                .await?
                .unwrap_or_default();

            let mut members = Vec::with_capacity(membership.len());
            for id in membership.iter() {
                let name = profiles
                    .basics(self, id)
                    .await
                    .map(|p| p.display_name())
                    .filter(|n| !n.is_empty());
                members.push(Member {
                    id: id.clone(),
                    name,
                });
            }

            listing.push(ChatListEntry {
                key: lineage.as_str().to_string(),
                info: ChatInfo { members },
            });
        }
        Ok(listing)
    }
}

#[async_trait]
impl<KV, TS> ListingApi for ConversationService<KV, TS>
where
    KV: KeyValueStore + 'static,
    TS: TimeSource,
{
    async fn timeline(
        &self,
        user: &str,
        from: usize,
        to: usize,
    ) -> Result<Vec<ChatListEntry>, ConversationError> {
        let page = to.saturating_sub(from).min(self.config.max_scan_count);
        if page == 0 {
            return Ok(Vec::new());
        }
        let lineages = self
            .store
            .prefix_scan_page(&KeyPrefix::TimelineRank.owner_prefix(user), from, page)
            .await?
            .into_iter()
            .filter_map(|(key, _)| KeyPrefix::ranked_lineage_of(user, &key))
            .collect();
        self.describe(lineages).await
    }

    async fn chat_rooms(
        &self,
        user: &str,
        offset: usize,
        count: usize,
    ) -> Result<Vec<ChatListEntry>, ConversationError> {
        let scores: HashMap<LineageName, u64> =
            self.ranked_timeline(user).await?.into_iter().collect();

        let mut rooms: Vec<(Option<u64>, LineageName)> = self
            .group_index(user)
            .await?
            .into_iter()
            .map(|(lineage, _)| (scores.get(&lineage).copied(), lineage))
            .collect();
        // None sorts below every score, so never-flushed rooms come last.
        rooms.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

        let lineages = rooms
            .into_iter()
            .skip(offset)
            .take(count.min(self.config.max_scan_count))
            .map(|(_, lineage)| lineage)
            .collect();
        self.describe(lineages).await
    }
}
