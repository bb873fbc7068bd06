//! Epoch Controller and the enqueue half of the History Writer.

use super::writer::FlushJob;
use super::ConversationService;
use crate::domain::address::{resolve, GroupIdentity, LineageName};
use crate::domain::codec::{decode_record, decode_u64, encode_json, encode_record};
use crate::domain::entities::{DirectoryEntry, GroupIndexEntry, Membership, Message, Qos, ShadowId};
use crate::domain::epoch::{
    plan_subscribe, plan_unsubscribe, EpochSnapshot, EpochTransition, ParticipantEntries,
    SubscribePlan, UnsubscribePlan,
};
use crate::domain::errors::{ConversationError, KVStoreError};
use crate::domain::keys::KeyPrefix;
use crate::ports::inbound::EpochApi;
use crate::ports::outbound::{
    BatchOperation, GroupAuthorizer, KeyValueStore, Precondition, TimeSource,
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

impl<KV, TS> ConversationService<KV, TS>
where
    KV: KeyValueStore + 'static,
    TS: TimeSource,
{
    /// Read everything a transition of `group` is planned from.
    pub(crate) async fn load_snapshot(
        &self,
        group: &GroupIdentity,
    ) -> Result<EpochSnapshot, ConversationError> {
        let lineage = LineageName::canonical(group);
        let directory_raw = self.store.get(&KeyPrefix::directory_key(group)).await?;
        let directory: Option<DirectoryEntry> = directory_raw
            .as_deref()
            .map(decode_record)
            .transpose()?;

        let has_current = directory.as_ref().is_some_and(|d| d.shadow.is_some());
        let membership: Membership = if has_current {
            self.store
                .get_record(&KeyPrefix::membership_key(&lineage))
                .await?
                .unwrap_or_default()
        } else {
            Membership::new()
        };

        let mut entries = BTreeMap::new();
        for member in membership.iter() {
            let member_entries = ParticipantEntries {
                history_pointer: self
                    .store
                    .get(&KeyPrefix::history_pointer_key(member, &lineage))
                    .await?,
                group_index: self
                    .store
                    .get_record(&KeyPrefix::group_index_key(member, &lineage))
                    .await?,
                timeline: self
                    .store
                    .get(&KeyPrefix::timeline_key(member, &lineage))
                    .await?,
            };
            entries.insert(member.clone(), member_entries);
        }

        Ok(EpochSnapshot {
            group: group.clone(),
            directory,
            directory_raw,
            membership,
            entries,
        })
    }

    /// Apply a transition as one conditional batch.
    async fn commit(&self, transition: &EpochTransition) -> Result<(), ConversationError> {
        let (preconditions, operations) = render_transition(transition)?;
        self.store
            .conditional_batch_write(preconditions, operations)
            .await?;
        Ok(())
    }
}

/// Turn a transition into its precondition and ordered batch.
///
/// Deletes of canonical keys precede the successor's puts to the same keys.
pub(crate) fn render_transition(
    transition: &EpochTransition,
) -> Result<(Vec<Precondition>, Vec<BatchOperation>), ConversationError> {
    let canonical = LineageName::canonical(&transition.group);
    let preconditions = vec![Precondition::matches(
        KeyPrefix::directory_key(&transition.group),
        transition.expected_directory.clone(),
    )];
    let mut ops = Vec::new();

    if let Some(archive) = &transition.archive {
        ops.push(BatchOperation::delete(KeyPrefix::membership_key(&canonical)));
        ops.push(BatchOperation::put(
            KeyPrefix::membership_key(&archive.to),
            encode_record(&archive.membership)?,
        ));

        for (user, entries) in &archive.carried {
            if let Some(pointer) = &entries.history_pointer {
                ops.push(BatchOperation::delete(KeyPrefix::history_pointer_key(user, &canonical)));
                ops.push(BatchOperation::put(
                    KeyPrefix::history_pointer_key(user, &archive.to),
                    pointer.clone(),
                ));
            }
            if let Some(index) = &entries.group_index {
                ops.push(BatchOperation::delete(KeyPrefix::group_index_key(user, &canonical)));
                if archive.dropped_group_index.as_deref() != Some(user.as_str()) {
                    ops.push(BatchOperation::put(
                        KeyPrefix::group_index_key(user, &archive.to),
                        encode_record(index)?,
                    ));
                }
            }
            if let Some(score) = &entries.timeline {
                let rank = decode_u64(score)?;
                ops.push(BatchOperation::delete(KeyPrefix::timeline_key(user, &canonical)));
                ops.push(BatchOperation::delete(KeyPrefix::timeline_rank_key(
                    user, rank, &canonical,
                )));
                ops.push(BatchOperation::put(
                    KeyPrefix::timeline_key(user, &archive.to),
                    score.clone(),
                ));
                ops.push(BatchOperation::put(
                    KeyPrefix::timeline_rank_key(user, rank, &archive.to),
                    Vec::new(),
                ));
            }
        }
    }

    ops.push(BatchOperation::put(
        KeyPrefix::directory_key(&transition.group),
        encode_record(&transition.next_directory)?,
    ));

    if let Some(successor) = &transition.successor {
        ops.push(BatchOperation::put(
            KeyPrefix::membership_key(&canonical),
            encode_record(&successor.membership)?,
        ));
        let pointer = encode_record(&successor.shadow)?;
        for (user, index) in &successor.entries {
            ops.push(BatchOperation::put(
                KeyPrefix::history_pointer_key(user, &canonical),
                pointer.clone(),
            ));
            ops.push(BatchOperation::put(
                KeyPrefix::group_index_key(user, &canonical),
                encode_record(index)?,
            ));
        }
    }

    Ok((preconditions, ops))
}

fn is_conflict(err: &ConversationError) -> bool {
    matches!(err, ConversationError::Store(KVStoreError::Conflict { .. }))
}

#[async_trait]
impl<KV, TS> EpochApi for ConversationService<KV, TS>
where
    KV: KeyValueStore + 'static,
    TS: TimeSource,
{
    async fn subscribe(
        &self,
        raw_address: &str,
        user: &str,
        qos: u8,
        authorizer: &dyn GroupAuthorizer,
    ) -> Result<ShadowId, ConversationError> {
        let qos = Qos::try_new(qos, self.config.max_qos)?;
        let address = resolve(raw_address)?;
        address.require_distinct()?;

        if !authorizer.authorize(&address.participants).await {
            warn!(group = %address.group, user, "[kp-01] subscription rejected by authorizer");
            return Err(ConversationError::UnauthorizedGroup {
                group: address.group.to_string(),
            });
        }

        let requested = GroupIndexEntry {
            qos,
            label: raw_address.to_string(),
        };

        let _guard = self.locks.lock(address.group.as_str()).await;
        let attempts = self.config.max_epoch_retries.max(1);
        for attempt in 1..=attempts {
            let snapshot = self.load_snapshot(&address.group).await?;
            let plan = plan_subscribe(snapshot, &address, user, requested.clone(), self.now())?;

            let transition = match plan {
                SubscribePlan::Reuse(shadow) => {
                    debug!(group = %address.group, user, %shadow, "[kp-01] subscribe reuses current epoch");
                    return Ok(shadow);
                }
                SubscribePlan::Transition(transition) => transition,
            };

            match self.commit(&transition).await {
                Ok(()) => {
                    let shadow = transition.current_shadow().cloned().ok_or_else(|| {
                        ConversationError::NoActiveEpoch {
                            group: address.group.to_string(),
                        }
                    })?;
                    info!(
                        group = %address.group,
                        user,
                        kind = ?transition.kind(),
                        generation = transition.next_directory.generation,
                        %shadow,
                        "[kp-01] epoch transition committed"
                    );
                    return Ok(shadow);
                }
                Err(e) if is_conflict(&e) => {
                    warn!(group = %address.group, attempt, "[kp-01] directory moved during subscribe, retrying");
                }
                Err(e) => return Err(e),
            }
        }

        Err(ConversationError::EpochContention {
            group: address.group.to_string(),
            attempts,
        })
    }

    async fn unsubscribe(&self, raw_address: &str, user: &str) -> Result<(), ConversationError> {
        let address = resolve(raw_address)?;

        let _guard = self.locks.lock(address.group.as_str()).await;
        let attempts = self.config.max_epoch_retries.max(1);
        for attempt in 1..=attempts {
            let snapshot = self.load_snapshot(&address.group).await?;
            let transition = match plan_unsubscribe(snapshot, user, self.now()) {
                UnsubscribePlan::Noop => {
                    debug!(group = %address.group, user, "[kp-01] unsubscribe of non-member ignored");
                    return Ok(());
                }
                UnsubscribePlan::Transition(transition) => transition,
            };

            match self.commit(&transition).await {
                Ok(()) => {
                    info!(
                        group = %address.group,
                        user,
                        kind = ?transition.kind(),
                        archived_as = %transition.archive.as_ref().map(|a| a.to.as_str()).unwrap_or_default(),
                        "[kp-01] epoch archived"
                    );
                    return Ok(());
                }
                Err(e) if is_conflict(&e) => {
                    warn!(group = %address.group, attempt, "[kp-01] directory moved during unsubscribe, retrying");
                }
                Err(e) => return Err(e),
            }
        }

        Err(ConversationError::EpochContention {
            group: address.group.to_string(),
            attempts,
        })
    }

    async fn flush(&self, raw_address: &str, message: Message) -> Result<(), ConversationError> {
        let address = resolve(raw_address)?;
        let directory: Option<DirectoryEntry> = self
            .store
            .get_record(&KeyPrefix::directory_key(&address.group))
            .await?;

        let Some(DirectoryEntry {
            generation,
            shadow: Some(shadow),
        }) = directory
        else {
            return Err(ConversationError::NoActiveEpoch {
                group: address.group.to_string(),
            });
        };

        let lineage = LineageName::canonical(&address.group);
        let membership: Membership = self
            .store
            .get_record(&KeyPrefix::membership_key(&lineage))
            .await?
            .unwrap_or_default();

        let job = FlushJob {
            group: address.group,
            shadow,
            generation,
            lineage,
            members: membership.iter().cloned().collect(),
            payload: encode_json(&message)?,
            flushed_at: self.now(),
        };
        self.writer.enqueue(job)
    }
}
