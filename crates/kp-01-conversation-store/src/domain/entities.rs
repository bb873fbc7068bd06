//! # Domain Entities
//!
//! Records persisted by the Conversation Store and the views assembled from them.

use super::address::{GroupIdentity, ParticipantId, PARTICIPANT_SEPARATOR};
use super::errors::ConversationError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fmt;

/// Unix timestamp in milliseconds.
pub type Timestamp = u64;

/// Identifier of one append-only history log.
///
/// Derived from the group, the directory generation that created it, and
/// the founding members. Generations only grow, so an id is never reissued.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShadowId(String);

impl ShadowId {
    pub fn derive(group: &GroupIdentity, generation: u64, members: &Membership) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(group.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(generation.to_be_bytes());
        for member in members.iter() {
            hasher.update([0u8]);
            hasher.update(member.as_bytes());
        }
        let digest = hasher.finalize();
        Self(hex::encode(&digest[..16]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShadowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Shadow Directory record for one group identity.
///
/// `shadow == None` means the group was retired: it has history but no
/// current epoch. The generation survives retirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub generation: u64,
    pub shadow: Option<ShadowId>,
}

/// Active participant set of one lineage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership(BTreeSet<ParticipantId>);

impl Membership {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, user: &str) -> bool {
        self.0.contains(user)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn insert(&mut self, user: ParticipantId) -> bool {
        self.0.insert(user)
    }

    pub fn remove(&mut self, user: &str) -> bool {
        self.0.remove(user)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParticipantId> {
        self.0.iter()
    }
}

impl FromIterator<ParticipantId> for Membership {
    fn from_iter<I: IntoIterator<Item = ParticipantId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Delivery quality-of-service level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Qos(u8);

impl Qos {
    /// Level assigned when no prior subscription is known.
    pub const AT_LEAST_ONCE: Qos = Qos(1);

    pub fn try_new(level: u8, maximum: u8) -> Result<Self, ConversationError> {
        if level > maximum {
            return Err(ConversationError::InvalidQos {
                requested: level,
                maximum,
            });
        }
        Ok(Self(level))
    }

    pub fn level(&self) -> u8 {
        self.0
    }
}

/// One participant's subscription details for a lineage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupIndexEntry {
    pub qos: Qos,
    /// Address exactly as the client used it.
    pub label: String,
}

impl GroupIndexEntry {
    /// Entry for a member that was never subscribed under its own label.
    pub fn implicit(group: &GroupIdentity) -> Self {
        Self {
            qos: Qos::AT_LEAST_ONCE,
            label: group.as_str().to_string(),
        }
    }

    /// Number of participants the label names.
    pub fn label_participants(&self) -> usize {
        self.label.split(PARTICIPANT_SEPARATOR).count()
    }
}

/// Type tag carried by a message.
///
/// Tags 0-9 are reserved for user messages and 10-19 for system
/// notifications; each range decodes to its variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum MessageKind {
    UserMessage,
    SystemNotification,
}

impl From<MessageKind> for u8 {
    fn from(kind: MessageKind) -> u8 {
        match kind {
            MessageKind::UserMessage => 0,
            MessageKind::SystemNotification => 10,
        }
    }
}

impl TryFrom<u8> for MessageKind {
    type Error = String;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            0..=9 => Ok(MessageKind::UserMessage),
            10..=19 => Ok(MessageKind::SystemNotification),
            other => Err(format!("unknown message type tag {other}")),
        }
    }
}

/// A chat message as stored in a history log.
///
/// Sender name and image are never trusted from storage; the reader patches
/// them from the profile cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "id")]
    pub sender: ParticipantId,
    #[serde(rename = "who", default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    #[serde(rename = "image", default, skip_serializing_if = "Option::is_none")]
    pub sender_image: Option<String>,
    #[serde(rename = "when")]
    pub sent_at: Timestamp,
    #[serde(rename = "what")]
    pub payload: String,
    /// Address the message was published to.
    #[serde(rename = "topic", default)]
    pub address: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<MessageKind>,
}

impl Message {
    pub fn new(
        sender: impl Into<ParticipantId>,
        address: impl Into<String>,
        payload: impl Into<String>,
        sent_at: Timestamp,
    ) -> Self {
        Self {
            sender: sender.into(),
            sender_name: None,
            sender_image: None,
            sent_at,
            payload: payload.into(),
            address: address.into(),
            kind: None,
        }
    }

    pub fn with_kind(mut self, kind: MessageKind) -> Self {
        self.kind = Some(kind);
        self
    }
}

/// Display attributes shown next to a participant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileBasics {
    #[serde(rename = "usr_id")]
    pub id: ParticipantId,
    #[serde(rename = "usr_first_name", default)]
    pub first_name: String,
    #[serde(rename = "usr_last_name", default)]
    pub last_name: String,
    #[serde(rename = "usr_image", default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl ProfileBasics {
    /// Profile that carries only the id, used when enrichment fails.
    pub fn anonymous(id: impl Into<ParticipantId>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// "First Last", or whichever half is present.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Full participant profile written on session bootstrap.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(flatten)]
    pub basics: ProfileBasics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Member of a listed conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: ParticipantId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatInfo {
    #[serde(default)]
    pub members: Vec<Member>,
}

/// One row of a conversation listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatListEntry {
    /// Lineage name; pass it back to `scan` to read the conversation.
    pub key: String,
    pub info: ChatInfo,
}

/// Chat token issued on session bootstrap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTokenRecord {
    pub token: String,
    pub expires_at: Timestamp,
}

impl ChatTokenRecord {
    pub fn is_live(&self, now: Timestamp) -> bool {
        now < self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::address::resolve;

    fn members(ids: &[&str]) -> Membership {
        ids.iter().map(|id| id.to_string()).collect()
    }

    #[test]
    fn test_shadow_changes_with_generation() {
        let group = resolve("a|b").unwrap().group;
        let m = members(&["a", "b"]);
        let first = ShadowId::derive(&group, 1, &m);
        let second = ShadowId::derive(&group, 2, &m);

        assert_ne!(first, second);
        assert_eq!(first, ShadowId::derive(&group, 1, &m));
        assert_eq!(first.as_str().len(), 32);
    }

    #[test]
    fn test_qos_bounds() {
        assert_eq!(Qos::try_new(2, 2).unwrap().level(), 2);
        assert_eq!(
            Qos::try_new(3, 2),
            Err(ConversationError::InvalidQos {
                requested: 3,
                maximum: 2
            })
        );
    }

    #[test]
    fn test_message_kind_ranges() {
        assert_eq!(MessageKind::try_from(7), Ok(MessageKind::UserMessage));
        assert_eq!(
            MessageKind::try_from(12),
            Ok(MessageKind::SystemNotification)
        );
        assert!(MessageKind::try_from(20).is_err());
    }

    #[test]
    fn test_message_wire_names() {
        let msg = Message::new("alice", "bob|alice", "hi", 5)
            .with_kind(MessageKind::SystemNotification);
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["id"], "alice");
        assert_eq!(json["what"], "hi");
        assert_eq!(json["type"], 10);
        assert!(json.get("who").is_none());
    }

    #[test]
    fn test_profile_flattens_basics() {
        let profile = UserProfile {
            basics: ProfileBasics {
                id: "u1".into(),
                first_name: "Ada".into(),
                last_name: "".into(),
                image: None,
            },
            email: Some("ada@example.com".into()),
        };
        let json = serde_json::to_value(&profile).unwrap();

        assert_eq!(json["usr_id"], "u1");
        assert_eq!(json["email"], "ada@example.com");
        assert_eq!(profile.basics.display_name(), "Ada");
    }

    #[test]
    fn test_chat_token_expiry() {
        let record = ChatTokenRecord {
            token: "t".into(),
            expires_at: 100,
        };
        assert!(record.is_live(99));
        assert!(!record.is_live(100));
    }
}
