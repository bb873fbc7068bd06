//! History Reader.

use super::profile::ProfileCache;
use super::ConversationService;
use crate::domain::address::LineageName;
use crate::domain::codec::decode_json;
use crate::domain::entities::{Message, ShadowId};
use crate::domain::errors::ConversationError;
use crate::domain::keys::KeyPrefix;
use crate::ports::inbound::HistoryApi;
use crate::ports::outbound::{KeyValueStore, TimeSource};
use async_trait::async_trait;
use tracing::{debug, warn};

#[async_trait]
impl<KV, TS> HistoryApi for ConversationService<KV, TS>
where
    KV: KeyValueStore + 'static,
    TS: TimeSource,
{
    async fn scan(
        &self,
        user: &str,
        lineage: &str,
        offset: usize,
        count: usize,
    ) -> Result<Vec<Message>, ConversationError> {
        let (_, lineage) = LineageName::parse(lineage)?;
        let count = count.min(self.config.max_scan_count) as u64;
        if count == 0 {
            return Ok(Vec::new());
        }

        // The user's own pointer decides which epoch they see.
        let pointer: Option<ShadowId> = self
            .store
            .get_record(&KeyPrefix::history_pointer_key(user, &lineage))
            .await?;
        let Some(shadow) = pointer else {
            debug!(user, %lineage, "[kp-01] no history pointer");
            return Ok(Vec::new());
        };

        let length = self
            .store
            .get_u64(&KeyPrefix::log_length_key(&shadow))
            .await?
            .unwrap_or(0);
        let offset = offset as u64;
        if offset >= length {
            return Ok(Vec::new());
        }

        let newest = length - 1 - offset;
        let available = count.min(newest + 1);
        let mut profiles = ProfileCache::default();
        let mut messages = Vec::with_capacity(available as usize);

        for i in 0..available {
            let seq = newest - i;
            let Some(raw) = self
                .store
                .get(&KeyPrefix::log_entry_key(&shadow, seq))
                .await?
            else {
                warn!(%shadow, seq, "[kp-01] log entry missing below log length");
                continue;
            };
            let mut message: Message = match decode_json(&raw) {
                Ok(message) => message,
                Err(e) => {
                    warn!(%shadow, seq, error = %e, "[kp-01] undecodable log entry skipped");
                    continue;
                }
            };
            if let Some(sender) = profiles.basics(self, &message.sender).await {
                let name = sender.display_name();
                message.sender_name = (!name.is_empty()).then_some(name);
                message.sender_image = sender.image;
            }
            messages.push(message);
        }

        Ok(messages)
    }
}
