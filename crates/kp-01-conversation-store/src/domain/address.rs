//! # Identity Resolver
//!
//! Turns a client-chosen raw address (`"bob|alice|carol"`) into the canonical
//! group identity (`"alice|bob|carol"`) and parses lineage names, which are
//! either a group identity or an archival name `"<group>#<millis>-<generation>"`.
//!
//! Everything here is pure: no I/O, no clock.

use super::errors::AddressError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator between participant ids in raw addresses and group identities.
pub const PARTICIPANT_SEPARATOR: char = '|';

/// Marks the start of an archival suffix in a lineage name.
pub const ARCHIVE_MARKER: char = '#';

/// Characters a participant id may never contain.
const RESERVED: [char; 2] = [ARCHIVE_MARKER, '\0'];

/// Opaque participant id.
pub type ParticipantId = String;

/// Canonical, order-independent name for a set of participants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupIdentity(String);

impl GroupIdentity {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of participant slots named by the identity.
    pub fn participant_count(&self) -> usize {
        self.0.split(PARTICIPANT_SEPARATOR).count()
    }
}

impl fmt::Display for GroupIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of resolving a raw address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAddress {
    /// Participants sorted ascending. Duplicates are kept.
    pub participants: Vec<ParticipantId>,
    /// Sorted participants rejoined with the separator.
    pub group: GroupIdentity,
}

impl ResolvedAddress {
    /// Whether `user` is one of the named participants.
    pub fn contains(&self, user: &str) -> bool {
        self.participants.iter().any(|p| p == user)
    }

    /// Fail if any participant is named twice.
    ///
    /// Participants are sorted, so duplicates are adjacent.
    pub fn require_distinct(&self) -> Result<(), AddressError> {
        match self.participants.windows(2).find(|pair| pair[0] == pair[1]) {
            Some(pair) => Err(AddressError::DuplicateParticipant {
                participant: pair[0].clone(),
            }),
            None => Ok(()),
        }
    }
}

/// Validate a single participant id.
pub fn check_participant(participant: &str) -> Result<(), AddressError> {
    if participant.is_empty() {
        return Err(AddressError::EmptyParticipant);
    }
    if let Some(reserved) = participant.chars().find(|c| RESERVED.contains(c)) {
        return Err(AddressError::ReservedCharacter {
            participant: participant.to_string(),
            reserved,
        });
    }
    if participant.contains(PARTICIPANT_SEPARATOR) {
        return Err(AddressError::ReservedCharacter {
            participant: participant.to_string(),
            reserved: PARTICIPANT_SEPARATOR,
        });
    }
    Ok(())
}

/// Resolve a raw address into sorted participants and its group identity.
pub fn resolve(raw: &str) -> Result<ResolvedAddress, AddressError> {
    let mut participants: Vec<ParticipantId> = raw
        .split(PARTICIPANT_SEPARATOR)
        .map(str::to_string)
        .collect();

    if participants.len() < 2 {
        return Err(AddressError::TooFewParticipants {
            found: participants.len(),
        });
    }

    for participant in &participants {
        check_participant(participant)?;
    }

    participants.sort();
    let group = GroupIdentity(participants.join(&PARTICIPANT_SEPARATOR.to_string()));

    Ok(ResolvedAddress {
        participants,
        group,
    })
}

/// Suffix that makes an archival lineage name unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveStamp {
    /// Wall-clock millis at which the epoch was archived.
    pub archived_at: u64,
    /// Generation of the archived epoch; unique per group.
    pub generation: u64,
}

impl ArchiveStamp {
    fn parse(suffix: &str) -> Result<Self, AddressError> {
        let malformed = || AddressError::MalformedArchiveSuffix {
            suffix: suffix.to_string(),
        };
        let (at, generation) = suffix.split_once('-').ok_or_else(malformed)?;
        Ok(Self {
            archived_at: at.parse().map_err(|_| malformed())?,
            generation: generation.parse().map_err(|_| malformed())?,
        })
    }
}

impl fmt::Display for ArchiveStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.archived_at, self.generation)
    }
}

/// Name of one lineage: the canonical group identity or an archival name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LineageName(String);

impl LineageName {
    /// The lineage currently bound to the group identity.
    pub fn canonical(group: &GroupIdentity) -> Self {
        Self(group.0.clone())
    }

    /// Name under which a superseded epoch is retained.
    pub fn archival(group: &GroupIdentity, stamp: ArchiveStamp) -> Self {
        Self(format!("{}{}{}", group.0, ARCHIVE_MARKER, stamp))
    }

    /// Parse a client-supplied lineage name.
    ///
    /// The group part is resolved canonically, so `"b|a#17-2"` and
    /// `"a|b#17-2"` name the same archived epoch.
    pub fn parse(raw: &str) -> Result<(ResolvedAddress, LineageName), AddressError> {
        match raw.rsplit_once(ARCHIVE_MARKER) {
            Some((group_part, suffix)) => {
                let stamp = ArchiveStamp::parse(suffix)?;
                let address = resolve(group_part)?;
                let lineage = Self::archival(&address.group, stamp);
                Ok((address, lineage))
            }
            None => {
                let address = resolve(raw)?;
                let lineage = Self::canonical(&address.group);
                Ok((address, lineage))
            }
        }
    }

    /// Rebuild a lineage name read back from a store key.
    pub(crate) fn from_stored(raw: String) -> Self {
        Self(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_archival(&self) -> bool {
        self.0.contains(ARCHIVE_MARKER)
    }
}

impl fmt::Display for LineageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permutations_share_identity() {
        let orders = [
            "carol|alice|bob",
            "alice|bob|carol",
            "bob|carol|alice",
            "carol|bob|alice",
        ];
        let groups: Vec<_> = orders.iter().map(|raw| resolve(raw).unwrap().group).collect();

        assert!(groups.iter().all(|g| g.as_str() == "alice|bob|carol"));
    }

    #[test]
    fn test_participants_sorted() {
        let resolved = resolve("zed|amy").unwrap();
        assert_eq!(resolved.participants, vec!["amy", "zed"]);
        assert_eq!(resolved.group.participant_count(), 2);
    }

    #[test]
    fn test_single_participant_rejected() {
        assert_eq!(
            resolve("alice"),
            Err(AddressError::TooFewParticipants { found: 1 })
        );
    }

    #[test]
    fn test_empty_token_rejected() {
        assert_eq!(resolve("alice|"), Err(AddressError::EmptyParticipant));
        assert_eq!(resolve("a||b"), Err(AddressError::EmptyParticipant));
    }

    #[test]
    fn test_reserved_character_rejected() {
        assert!(matches!(
            resolve("al#ice|bob"),
            Err(AddressError::ReservedCharacter { reserved: '#', .. })
        ));
    }

    #[test]
    fn test_duplicates_kept_by_resolver_but_detectable() {
        let resolved = resolve("bob|alice|bob").unwrap();
        assert_eq!(resolved.group.as_str(), "alice|bob|bob");
        assert_eq!(resolved, resolve("bob|bob|alice").unwrap());
        assert_eq!(
            resolved.require_distinct(),
            Err(AddressError::DuplicateParticipant {
                participant: "bob".into()
            })
        );
        assert!(resolve("bob|alice").unwrap().require_distinct().is_ok());
    }

    #[test]
    fn test_lineage_parse_canonical() {
        let (address, lineage) = LineageName::parse("bob|alice").unwrap();
        assert_eq!(lineage.as_str(), "alice|bob");
        assert!(!lineage.is_archival());
        assert_eq!(address.participants.len(), 2);
    }

    #[test]
    fn test_lineage_parse_archival_canonicalizes_group() {
        let (_, lineage) = LineageName::parse("bob|alice#1700000000000-3").unwrap();
        assert_eq!(lineage.as_str(), "alice|bob#1700000000000-3");
        assert!(lineage.is_archival());
    }

    #[test]
    fn test_lineage_parse_rejects_bad_suffix() {
        assert!(matches!(
            LineageName::parse("alice|bob#yesterday"),
            Err(AddressError::MalformedArchiveSuffix { .. })
        ));
    }

    #[test]
    fn test_archival_round_trips_through_parse() {
        let group = resolve("a|b").unwrap().group;
        let stamp = ArchiveStamp {
            archived_at: 42,
            generation: 7,
        };
        let archived = LineageName::archival(&group, stamp);
        let (_, parsed) = LineageName::parse(archived.as_str()).unwrap();
        assert_eq!(parsed, archived);
    }
}
