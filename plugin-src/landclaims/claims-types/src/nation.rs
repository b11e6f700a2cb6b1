//! Nation and diplomacy model.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NationRole {
    Member,
    Officer,
    Leader,
}

impl fmt::Display for NationRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Member => "Member",
            Self::Officer => "Officer",
            Self::Leader => "Leader",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NationMember {
    pub uuid: Uuid,
    pub role: NationRole,
    pub joined_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nation {
    pub id: Uuid,
    pub name: String,
    pub leader: Uuid,
    pub members: BTreeMap<Uuid, NationMember>,
    /// Claim ids contributed by members.
    pub claims: BTreeSet<Uuid>,
    /// Players invited but not yet joined.
    pub invites: BTreeSet<Uuid>,
    pub created_at: u64,
}

impl Nation {
    #[must_use]
    pub fn new(name: String, leader: Uuid, created_at: u64) -> Self {
        let mut members = BTreeMap::new();
        members.insert(
            leader,
            NationMember {
                uuid: leader,
                role: NationRole::Leader,
                joined_at: created_at,
            },
        );
        Self {
            id: Uuid::new_v4(),
            name,
            leader,
            members,
            claims: BTreeSet::new(),
            invites: BTreeSet::new(),
            created_at,
        }
    }

    #[must_use]
    pub fn role_of(&self, player: &Uuid) -> Option<NationRole> {
        self.members.get(player).map(|m| m.role)
    }

    #[must_use]
    pub fn is_member(&self, player: &Uuid) -> bool {
        self.members.contains_key(player)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    Ally,
    Neutral,
    Enemy,
    AtWar,
}

impl RelationKind {
    #[must_use]
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "ally" => Some(Self::Ally),
            "neutral" => Some(Self::Neutral),
            "enemy" => Some(Self::Enemy),
            "at_war" | "war" => Some(Self::AtWar),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ally => "ally",
            Self::Neutral => "neutral",
            Self::Enemy => "enemy",
            Self::AtWar => "at_war",
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ally => "Ally",
            Self::Neutral => "Neutral",
            Self::Enemy => "Enemy",
            Self::AtWar => "At War",
        })
    }
}

/// Relation between two nations. The pair is unordered; `a < b` always.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NationRelation {
    pub a: Uuid,
    pub b: Uuid,
    pub kind: RelationKind,
    pub since: u64,
}

impl NationRelation {
    #[must_use]
    pub fn new(x: Uuid, y: Uuid, kind: RelationKind, since: u64) -> Self {
        let (a, b) = Self::key(x, y);
        Self { a, b, kind, since }
    }

    /// Normalised map key for a pair of nations.
    #[must_use]
    pub fn key(x: Uuid, y: Uuid) -> (Uuid, Uuid) {
        if x <= y { (x, y) } else { (y, x) }
    }

    #[must_use]
    pub fn involves(&self, nation: &Uuid) -> bool {
        self.a == *nation || self.b == *nation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relation_key_is_order_independent() {
        let x = Uuid::new_v4();
        let y = Uuid::new_v4();
        assert_eq!(NationRelation::key(x, y), NationRelation::key(y, x));
        let r = NationRelation::new(y, x, RelationKind::Enemy, 5);
        assert!(r.a <= r.b);
        assert!(r.involves(&x) && r.involves(&y));
    }

    #[test]
    fn new_nation_has_leader_member() {
        let leader = Uuid::new_v4();
        let n = Nation::new("Avalon".into(), leader, 10);
        assert_eq!(n.role_of(&leader), Some(NationRole::Leader));
        assert!(NationRole::Leader > NationRole::Officer);
        assert!(NationRole::Officer > NationRole::Member);
    }
}
