//! # Key Layout
//!
//! Every record family lives under its own prefix. Composite keys join their
//! parts with NUL, which participant ids and lineage names may not contain,
//! so a per-user prefix scan never bleeds into another user's keys.

use super::address::{GroupIdentity, LineageName};
use super::entities::ShadowId;

const PART_SEPARATOR: u8 = 0;
const RANK_WIDTH: usize = std::mem::size_of::<u64>();

/// Key prefixes for the key-value store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPrefix {
    /// Shadow Directory: `ns:{group}` -> DirectoryEntry
    Directory,
    /// Membership: `bl:{lineage}` -> Membership
    Membership,
    /// Group Index: `ug:{user}\0{lineage}` -> GroupIndexEntry
    GroupIndex,
    /// History Pointer: `uh:{user}\0{lineage}` -> ShadowId
    HistoryPointer,
    /// Timeline: `tl:{user}\0{lineage}` -> score (u64 BE)
    Timeline,
    /// Timeline rank: `tr:{user}\0{!score BE}\0{lineage}` -> empty
    ///
    /// Mirrors `Timeline` so a page of the timeline is a bounded scan.
    TimelineRank,
    /// Presence: `on:{user}` -> empty
    Presence,
    /// Profile: `up:{user}` -> UserProfile (JSON)
    Profile,
    /// Chat token: `ct:{user}` -> ChatTokenRecord
    ChatToken,
    /// Log length: `cl:{shadow}` -> u64 BE
    LogLength,
    /// Log entry: `ch:{shadow}\0{seq BE}` -> Message (JSON)
    LogEntry,
}

impl KeyPrefix {
    /// Get the byte prefix for this key type.
    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            KeyPrefix::Directory => b"ns:",
            KeyPrefix::Membership => b"bl:",
            KeyPrefix::GroupIndex => b"ug:",
            KeyPrefix::HistoryPointer => b"uh:",
            KeyPrefix::Timeline => b"tl:",
            KeyPrefix::TimelineRank => b"tr:",
            KeyPrefix::Presence => b"on:",
            KeyPrefix::Profile => b"up:",
            KeyPrefix::ChatToken => b"ct:",
            KeyPrefix::LogLength => b"cl:",
            KeyPrefix::LogEntry => b"ch:",
        }
    }

    /// Build a full key from its parts.
    pub fn key(&self, parts: &[&[u8]]) -> Vec<u8> {
        let mut key = self.as_bytes().to_vec();
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                key.push(PART_SEPARATOR);
            }
            key.extend_from_slice(part);
        }
        key
    }

    /// Prefix covering every key owned by `owner` in a per-user family.
    pub fn owner_prefix(&self, owner: &str) -> Vec<u8> {
        let mut key = self.key(&[owner.as_bytes()]);
        key.push(PART_SEPARATOR);
        key
    }

    /// Recover the lineage part of a per-user key.
    pub fn lineage_of(&self, owner: &str, key: &[u8]) -> Option<LineageName> {
        let prefix = self.owner_prefix(owner);
        let rest = key.strip_prefix(prefix.as_slice())?;
        let raw = std::str::from_utf8(rest).ok()?;
        Some(LineageName::from_stored(raw.to_string()))
    }

    /// Recover the lineage from a `TimelineRank` key, skipping the score.
    pub fn ranked_lineage_of(owner: &str, key: &[u8]) -> Option<LineageName> {
        let prefix = KeyPrefix::TimelineRank.owner_prefix(owner);
        let rest = key.strip_prefix(prefix.as_slice())?;
        let rest = rest.get(RANK_WIDTH..)?.strip_prefix(&[PART_SEPARATOR])?;
        let raw = std::str::from_utf8(rest).ok()?;
        Some(LineageName::from_stored(raw.to_string()))
    }

    pub fn directory_key(group: &GroupIdentity) -> Vec<u8> {
        KeyPrefix::Directory.key(&[group.as_str().as_bytes()])
    }

    pub fn membership_key(lineage: &LineageName) -> Vec<u8> {
        KeyPrefix::Membership.key(&[lineage.as_str().as_bytes()])
    }

    pub fn group_index_key(user: &str, lineage: &LineageName) -> Vec<u8> {
        KeyPrefix::GroupIndex.key(&[user.as_bytes(), lineage.as_str().as_bytes()])
    }

    pub fn history_pointer_key(user: &str, lineage: &LineageName) -> Vec<u8> {
        KeyPrefix::HistoryPointer.key(&[user.as_bytes(), lineage.as_str().as_bytes()])
    }

    pub fn timeline_key(user: &str, lineage: &LineageName) -> Vec<u8> {
        KeyPrefix::Timeline.key(&[user.as_bytes(), lineage.as_str().as_bytes()])
    }

    /// Inverted score first, so ascending key order is highest score first
    /// with ties broken by lineage name.
    pub fn timeline_rank_key(user: &str, score: u64, lineage: &LineageName) -> Vec<u8> {
        KeyPrefix::TimelineRank.key(&[
            user.as_bytes(),
            &(!score).to_be_bytes(),
            lineage.as_str().as_bytes(),
        ])
    }

    pub fn presence_key(user: &str) -> Vec<u8> {
        KeyPrefix::Presence.key(&[user.as_bytes()])
    }

    pub fn profile_key(user: &str) -> Vec<u8> {
        KeyPrefix::Profile.key(&[user.as_bytes()])
    }

    pub fn chat_token_key(user: &str) -> Vec<u8> {
        KeyPrefix::ChatToken.key(&[user.as_bytes()])
    }

    pub fn log_length_key(shadow: &ShadowId) -> Vec<u8> {
        KeyPrefix::LogLength.key(&[shadow.as_str().as_bytes()])
    }

    pub fn log_entry_key(shadow: &ShadowId, seq: u64) -> Vec<u8> {
        KeyPrefix::LogEntry.key(&[shadow.as_str().as_bytes(), &seq.to_be_bytes()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::address::resolve;

    #[test]
    fn test_owner_prefix_is_exclusive() {
        let lineage = LineageName::canonical(&resolve("a|b").unwrap().group);
        let alice = KeyPrefix::timeline_key("al", &lineage);
        let prefix = KeyPrefix::Timeline.owner_prefix("a");

        assert!(!alice.starts_with(&prefix));
        assert!(KeyPrefix::timeline_key("a", &lineage).starts_with(&prefix));
    }

    #[test]
    fn test_lineage_recovered_from_key() {
        let group = resolve("b|a").unwrap().group;
        let lineage = LineageName::canonical(&group);
        let key = KeyPrefix::group_index_key("a", &lineage);

        assert_eq!(KeyPrefix::GroupIndex.lineage_of("a", &key), Some(lineage));
        assert_eq!(KeyPrefix::GroupIndex.lineage_of("b", &key), None);
    }

    #[test]
    fn test_log_entries_sort_by_sequence() {
        let shadow = ShadowId::derive(
            &resolve("a|b").unwrap().group,
            1,
            &["a".to_string(), "b".to_string()].into_iter().collect(),
        );
        assert!(KeyPrefix::log_entry_key(&shadow, 255) < KeyPrefix::log_entry_key(&shadow, 256));
    }

    #[test]
    fn test_rank_keys_sort_by_score_then_name() {
        let bob = LineageName::canonical(&resolve("a|bob").unwrap().group);
        let carol = LineageName::canonical(&resolve("a|carol").unwrap().group);

        let mut keys = vec![
            KeyPrefix::timeline_rank_key("a", 100, &carol),
            KeyPrefix::timeline_rank_key("a", 300, &carol),
            KeyPrefix::timeline_rank_key("a", 100, &bob),
            KeyPrefix::timeline_rank_key("a", 256, &bob),
        ];
        keys.sort();

        let order: Vec<_> = keys
            .iter()
            .map(|k| KeyPrefix::ranked_lineage_of("a", k).unwrap())
            .collect();
        assert_eq!(order, vec![carol.clone(), bob.clone(), bob.clone(), carol]);
        assert_eq!(KeyPrefix::ranked_lineage_of("al", &keys[0]), None);
    }
}
