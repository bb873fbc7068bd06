//! # Epoch Planning
//!
//! Pure decision logic for Subscribe and Unsubscribe. The service loads an
//! [`EpochSnapshot`], asks for a plan, and applies an [`EpochTransition`] as
//! one conditional batch guarded by the directory bytes it was planned from.
//!
//! ```text
//!   no current shadow ───────────────────────────→ Create
//!   |members| == |participants| or requester in ─→ Reuse
//!   otherwise ───────────────────────────────────→ Split   (archive + successor)
//!
//!   leaver not a member ─────────────────────────→ Noop
//!   remaining >= 2 ──────────────────────────────→ Archive + successor
//!   remaining <= 1 ──────────────────────────────→ Archive + retire
//! ```

use super::address::{ArchiveStamp, GroupIdentity, LineageName, ParticipantId, ResolvedAddress};
use super::entities::{DirectoryEntry, GroupIndexEntry, Membership, ShadowId, Timestamp};
use super::errors::ConversationError;
use std::collections::BTreeMap;

/// One participant's per-user records under the canonical lineage.
///
/// Pointer and timeline bytes are carried verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParticipantEntries {
    pub history_pointer: Option<Vec<u8>>,
    pub group_index: Option<GroupIndexEntry>,
    pub timeline: Option<Vec<u8>>,
}

/// Everything a transition for one group needs to read first.
#[derive(Debug, Clone)]
pub struct EpochSnapshot {
    pub group: GroupIdentity,
    pub directory: Option<DirectoryEntry>,
    /// Bytes the directory key held when read; the transition's precondition.
    pub directory_raw: Option<Vec<u8>>,
    pub membership: Membership,
    /// Entries of every current member.
    pub entries: BTreeMap<ParticipantId, ParticipantEntries>,
}

impl EpochSnapshot {
    pub fn current_shadow(&self) -> Option<&ShadowId> {
        self.directory.as_ref().and_then(|d| d.shadow.as_ref())
    }

    pub fn generation(&self) -> u64 {
        self.directory.as_ref().map_or(0, |d| d.generation)
    }

    fn archive_name(&self, now: Timestamp) -> LineageName {
        LineageName::archival(
            &self.group,
            ArchiveStamp {
                archived_at: now,
                generation: self.generation(),
            },
        )
    }

    fn carried_entry(&self, member: &str) -> GroupIndexEntry {
        self.entries
            .get(member)
            .and_then(|e| e.group_index.clone())
            .unwrap_or_else(|| GroupIndexEntry::implicit(&self.group))
    }
}

/// Rename of the current epoch to an archival name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivePlan {
    pub to: LineageName,
    /// Membership stored under the archival name.
    pub membership: Membership,
    /// Records moved from the canonical name to the archival name.
    pub carried: BTreeMap<ParticipantId, ParticipantEntries>,
    /// Participant whose Group Index entry is dropped instead of moved.
    pub dropped_group_index: Option<ParticipantId>,
}

/// New current epoch under the canonical name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuccessorPlan {
    pub shadow: ShadowId,
    pub membership: Membership,
    pub entries: BTreeMap<ParticipantId, GroupIndexEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    Create,
    Split,
    Recreate,
    Retire,
}

/// A complete epoch transition, applied atomically or not at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpochTransition {
    pub group: GroupIdentity,
    pub expected_directory: Option<Vec<u8>>,
    pub next_directory: DirectoryEntry,
    pub archive: Option<ArchivePlan>,
    pub successor: Option<SuccessorPlan>,
}

impl EpochTransition {
    pub fn kind(&self) -> TransitionKind {
        match (&self.archive, &self.successor) {
            (None, _) => TransitionKind::Create,
            (Some(a), Some(_)) if a.dropped_group_index.is_none() => TransitionKind::Split,
            (Some(_), Some(_)) => TransitionKind::Recreate,
            (Some(_), None) => TransitionKind::Retire,
        }
    }

    /// Shadow that is current once the transition lands.
    pub fn current_shadow(&self) -> Option<&ShadowId> {
        self.next_directory.shadow.as_ref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscribePlan {
    /// Nothing to write; the existing shadow stands.
    Reuse(ShadowId),
    Transition(EpochTransition),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnsubscribePlan {
    Noop,
    Transition(EpochTransition),
}

fn successor(
    group: &GroupIdentity,
    generation: u64,
    entries: BTreeMap<ParticipantId, GroupIndexEntry>,
) -> SuccessorPlan {
    let membership: Membership = entries.keys().cloned().collect();
    SuccessorPlan {
        shadow: ShadowId::derive(group, generation, &membership),
        membership,
        entries,
    }
}

/// Decide what a Subscribe by `requester` does to the group's epochs.
///
/// `requested` is the requester's Group Index entry; on Create every
/// participant receives it.
pub fn plan_subscribe(
    snapshot: EpochSnapshot,
    address: &ResolvedAddress,
    requester: &str,
    requested: GroupIndexEntry,
    now: Timestamp,
) -> Result<SubscribePlan, ConversationError> {
    if !address.contains(requester) {
        return Err(ConversationError::UnauthorizedGroup {
            group: address.group.to_string(),
        });
    }

    let next_generation = snapshot.generation() + 1;

    let Some(current) = snapshot.current_shadow().cloned() else {
        let entries = address
            .participants
            .iter()
            .map(|p| (p.clone(), requested.clone()))
            .collect();
        return Ok(SubscribePlan::Transition(with_successor_shadow(
            EpochTransition {
                next_directory: DirectoryEntry {
                    generation: next_generation,
                    shadow: None,
                },
                successor: Some(successor(&snapshot.group, next_generation, entries)),
                group: snapshot.group,
                expected_directory: snapshot.directory_raw,
                archive: None,
            },
        )));
    };

    if snapshot.membership.len() == address.participants.len()
        || snapshot.membership.contains(requester)
    {
        return Ok(SubscribePlan::Reuse(current));
    }

    let mut entries: BTreeMap<ParticipantId, GroupIndexEntry> = snapshot
        .membership
        .iter()
        .map(|m| (m.clone(), snapshot.carried_entry(m)))
        .collect();
    entries.insert(requester.to_string(), requested);

    let archive = ArchivePlan {
        to: snapshot.archive_name(now),
        membership: snapshot.membership.clone(),
        carried: snapshot.entries.clone(),
        dropped_group_index: None,
    };

    Ok(SubscribePlan::Transition(with_successor_shadow(
        EpochTransition {
            next_directory: DirectoryEntry {
                generation: next_generation,
                shadow: None,
            },
            successor: Some(successor(&snapshot.group, next_generation, entries)),
            archive: Some(archive),
            group: snapshot.group,
            expected_directory: snapshot.directory_raw,
        },
    )))
}

/// Decide what an Unsubscribe by `leaver` does to the group's epochs.
pub fn plan_unsubscribe(snapshot: EpochSnapshot, leaver: &str, now: Timestamp) -> UnsubscribePlan {
    if snapshot.current_shadow().is_none() || !snapshot.membership.contains(leaver) {
        return UnsubscribePlan::Noop;
    }

    let next_generation = snapshot.generation() + 1;

    let mut remaining = snapshot.membership.clone();
    remaining.remove(leaver);

    let successor_plan = (remaining.len() > 1).then(|| {
        let entries = remaining
            .iter()
            .map(|m| (m.clone(), snapshot.carried_entry(m)))
            .collect();
        successor(&snapshot.group, next_generation, entries)
    });

    let archive = ArchivePlan {
        to: snapshot.archive_name(now),
        membership: remaining,
        carried: snapshot.entries.clone(),
        dropped_group_index: Some(leaver.to_string()),
    };

    UnsubscribePlan::Transition(with_successor_shadow(EpochTransition {
        next_directory: DirectoryEntry {
            generation: next_generation,
            shadow: None,
        },
        successor: successor_plan,
        archive: Some(archive),
        group: snapshot.group,
        expected_directory: snapshot.directory_raw,
    }))
}

fn with_successor_shadow(mut transition: EpochTransition) -> EpochTransition {
    transition.next_directory.shadow = transition.successor.as_ref().map(|s| s.shadow.clone());
    transition
}
