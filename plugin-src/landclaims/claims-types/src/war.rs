//! War, tribute and shield model.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// War lifecycle. `Ended` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarState {
    Declared,
    Active,
    Ceasefire,
    Ended,
}

impl WarState {
    #[must_use]
    pub const fn is_open(self) -> bool {
        !matches!(self, Self::Ended)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Declared => "declared",
            Self::Active => "active",
            Self::Ceasefire => "ceasefire",
            Self::Ended => "ended",
        }
    }

    #[must_use]
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "declared" => Some(Self::Declared),
            "active" => Some(Self::Active),
            "ceasefire" => Some(Self::Ceasefire),
            "ended" => Some(Self::Ended),
            _ => None,
        }
    }
}

impl fmt::Display for WarState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Declared => "Declared",
            Self::Active => "Active",
            Self::Ceasefire => "Ceasefire",
            Self::Ended => "Ended",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct War {
    pub id: Uuid,
    pub attacker: Uuid,
    pub defender: Uuid,
    pub state: WarState,
    pub reason: String,
    pub declared_at: u64,
    pub started_at: Option<u64>,
    /// When the current ceasefire began.
    pub ceasefire_at: Option<u64>,
    pub ended_at: Option<u64>,
    pub winner: Option<Uuid>,
}

impl War {
    #[must_use]
    pub fn new(attacker: Uuid, defender: Uuid, reason: String, declared_at: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            attacker,
            defender,
            state: WarState::Declared,
            reason,
            declared_at,
            started_at: None,
            ceasefire_at: None,
            ended_at: None,
            winner: None,
        }
    }

    #[must_use]
    pub fn involves(&self, nation: &Uuid) -> bool {
        self.attacker == *nation || self.defender == *nation
    }

    /// The other side of the war, if `nation` takes part in it.
    #[must_use]
    pub fn opponent(&self, nation: &Uuid) -> Option<Uuid> {
        if self.attacker == *nation {
            Some(self.defender)
        } else if self.defender == *nation {
            Some(self.attacker)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TributeStatus {
    Pending,
    Accepted,
    Rejected,
}

impl TributeStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }

    #[must_use]
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// Chunk credits offered to end a war.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarTribute {
    pub id: Uuid,
    pub war_id: Uuid,
    pub from_nation: Uuid,
    pub to_nation: Uuid,
    pub amount: u32,
    pub status: TributeStatus,
    pub offered_at: u64,
}

/// Protection from new war declarations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarShield {
    pub nation: Uuid,
    pub expires_at: u64,
}

impl WarShield {
    #[must_use]
    pub const fn is_active(&self, now: u64) -> bool {
        now < self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opponent_of_participants() {
        let a = Uuid::new_v4();
        let d = Uuid::new_v4();
        let w = War::new(a, d, "border".into(), 0);
        assert_eq!(w.opponent(&a), Some(d));
        assert_eq!(w.opponent(&d), Some(a));
        assert_eq!(w.opponent(&Uuid::new_v4()), None);
        assert!(w.state.is_open());
    }

    #[test]
    fn state_names_round_trip() {
        for s in [WarState::Declared, WarState::Active, WarState::Ceasefire, WarState::Ended] {
            assert_eq!(WarState::from_str_loose(s.as_str()), Some(s));
        }
    }

    #[test]
    fn shield_expires() {
        let s = WarShield { nation: Uuid::nil(), expires_at: 100 };
        assert!(s.is_active(99));
        assert!(!s.is_active(100));
    }
}
