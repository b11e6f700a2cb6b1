//! Claim model: chunks, capacity, membership and settings.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use uuid::Uuid;

/// A 16x16 block column, addressed in chunk coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    #[must_use]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Chunk containing the given block column.
    #[must_use]
    pub const fn from_block(block_x: i32, block_z: i32) -> Self {
        Self {
            x: block_x.div_euclid(16),
            z: block_z.div_euclid(16),
        }
    }

    /// Chunk containing a floating point world position.
    #[must_use]
    pub fn from_world(x: f64, z: f64) -> Self {
        Self::from_block(x.floor() as i32, z.floor() as i32)
    }

    /// The four orthogonal neighbours (north, south, west, east).
    #[must_use]
    pub const fn neighbors(self) -> [Self; 4] {
        [
            Self::new(self.x, self.z - 1),
            Self::new(self.x, self.z + 1),
            Self::new(self.x - 1, self.z),
            Self::new(self.x + 1, self.z),
        ]
    }

    /// Lowest block x/z inside this chunk.
    #[must_use]
    pub const fn min_block(self) -> (i32, i32) {
        (self.x * 16, self.z * 16)
    }
}

impl fmt::Display for ChunkPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.x, self.z)
    }
}

/// Actions a claim can grant to non-owners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimPermission {
    Build,
    Break,
    Interact,
    Containers,
    /// Trust, ban and edit settings.
    Manage,
}

impl ClaimPermission {
    pub const ALL: [Self; 5] = [
        Self::Build,
        Self::Break,
        Self::Interact,
        Self::Containers,
        Self::Manage,
    ];
}

/// Named permission set that members are assigned to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimGroup {
    pub name: String,
    pub permissions: BTreeSet<ClaimPermission>,
}

impl ClaimGroup {
    #[must_use]
    pub fn new(name: &str, permissions: &[ClaimPermission]) -> Self {
        Self {
            name: name.to_owned(),
            permissions: permissions.iter().copied().collect(),
        }
    }

    /// Groups every new claim starts with.
    #[must_use]
    pub fn defaults() -> BTreeMap<String, Self> {
        use ClaimPermission::{Break, Build, Containers, Interact};
        [
            Self::new("visitor", &[Interact]),
            Self::new("member", &[Build, Break, Interact, Containers]),
            Self::new("manager", &ClaimPermission::ALL),
        ]
        .into_iter()
        .map(|g| (g.name.clone(), g))
        .collect()
    }
}

/// Toggleable claim rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimSettings {
    pub pvp: bool,
    pub fire_spread: bool,
    pub explosions: bool,
    pub mob_spawning: bool,
    pub public_interact: bool,
}

impl Default for ClaimSettings {
    fn default() -> Self {
        Self {
            pvp: false,
            fire_spread: false,
            explosions: false,
            mob_spawning: true,
            public_interact: false,
        }
    }
}

/// Setting names as typed in `/claim set`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKey {
    Pvp,
    FireSpread,
    Explosions,
    MobSpawning,
    PublicInteract,
}

impl SettingKey {
    pub const ALL: [Self; 5] = [
        Self::Pvp,
        Self::FireSpread,
        Self::Explosions,
        Self::MobSpawning,
        Self::PublicInteract,
    ];

    #[must_use]
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "pvp" => Some(Self::Pvp),
            "fire-spread" | "fire" => Some(Self::FireSpread),
            "explosions" | "tnt" => Some(Self::Explosions),
            "mob-spawning" | "mobs" => Some(Self::MobSpawning),
            "public-interact" | "public" => Some(Self::PublicInteract),
            _ => None,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pvp => "pvp",
            Self::FireSpread => "fire-spread",
            Self::Explosions => "explosions",
            Self::MobSpawning => "mob-spawning",
            Self::PublicInteract => "public-interact",
        }
    }
}

impl ClaimSettings {
    #[must_use]
    pub const fn get(&self, key: SettingKey) -> bool {
        match key {
            SettingKey::Pvp => self.pvp,
            SettingKey::FireSpread => self.fire_spread,
            SettingKey::Explosions => self.explosions,
            SettingKey::MobSpawning => self.mob_spawning,
            SettingKey::PublicInteract => self.public_interact,
        }
    }

    pub fn set(&mut self, key: SettingKey, value: bool) {
        match key {
            SettingKey::Pvp => self.pvp = value,
            SettingKey::FireSpread => self.fire_spread = value,
            SettingKey::Explosions => self.explosions = value,
            SettingKey::MobSpawning => self.mob_spawning = value,
            SettingKey::PublicInteract => self.public_interact = value,
        }
    }
}

/// A player-owned set of chunks in one world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub id: Uuid,
    pub name: String,
    pub owner: Uuid,
    pub world: String,
    pub chunks: BTreeSet<ChunkPos>,
    /// Capacity: how many chunks the claim may hold.
    pub total_chunks: u32,
    /// Part of `total_chunks` paid for with pool credits.
    pub purchased_chunks: u32,
    pub groups: BTreeMap<String, ClaimGroup>,
    /// Member uuid → group name.
    pub members: BTreeMap<Uuid, String>,
    pub trusted: BTreeSet<Uuid>,
    pub banned: BTreeSet<Uuid>,
    pub settings: ClaimSettings,
    pub created_at: u64,
}

impl Claim {
    #[must_use]
    pub fn new(owner: Uuid, name: String, world: String, capacity: u32, created_at: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            owner,
            world,
            chunks: BTreeSet::new(),
            total_chunks: capacity,
            purchased_chunks: 0,
            groups: ClaimGroup::defaults(),
            members: BTreeMap::new(),
            trusted: BTreeSet::new(),
            banned: BTreeSet::new(),
            settings: ClaimSettings::default(),
            created_at,
        }
    }

    #[must_use]
    pub fn chunk_count(&self) -> u32 {
        u32::try_from(self.chunks.len()).unwrap_or(u32::MAX)
    }

    /// Free capacity, zero when the claim is full or over capacity.
    #[must_use]
    pub fn remaining_chunks(&self) -> u32 {
        self.total_chunks.saturating_sub(self.chunk_count())
    }

    /// How many chunks the claim holds beyond its capacity.
    #[must_use]
    pub fn deficit(&self) -> u32 {
        self.chunk_count().saturating_sub(self.total_chunks)
    }

    #[must_use]
    pub fn contains(&self, chunk: ChunkPos) -> bool {
        self.chunks.contains(&chunk)
    }

    /// Resolve whether `player` may perform `permission` inside this claim.
    #[must_use]
    pub fn can(&self, player: &Uuid, permission: ClaimPermission) -> bool {
        if *player == self.owner {
            return true;
        }
        if self.banned.contains(player) {
            return false;
        }
        if self.trusted.contains(player) {
            return permission != ClaimPermission::Manage;
        }
        if let Some(group) = self.members.get(player).and_then(|g| self.groups.get(g)) {
            return group.permissions.contains(&permission);
        }
        permission == ClaimPermission::Interact && self.settings.public_interact
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claim() -> Claim {
        Claim::new(Uuid::new_v4(), "home".into(), "0".into(), 4, 0)
    }

    #[test]
    fn chunk_from_negative_block_rounds_down() {
        assert_eq!(ChunkPos::from_block(-1, -16), ChunkPos::new(-1, -1));
        assert_eq!(ChunkPos::from_block(-17, 15), ChunkPos::new(-2, 0));
        assert_eq!(ChunkPos::from_world(31.9, -0.1), ChunkPos::new(1, -1));
    }

    #[test]
    fn deficit_and_remaining() {
        let mut c = claim();
        for x in 0..6 {
            c.chunks.insert(ChunkPos::new(x, 0));
        }
        assert_eq!(c.remaining_chunks(), 0);
        assert_eq!(c.deficit(), 2);
        c.total_chunks = 10;
        assert_eq!(c.remaining_chunks(), 4);
        assert_eq!(c.deficit(), 0);
    }

    #[test]
    fn access_resolution_order() {
        let mut c = claim();
        let trusted = Uuid::new_v4();
        let member = Uuid::new_v4();
        let banned = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        c.trusted.insert(trusted);
        c.members.insert(member, "visitor".into());
        c.members.insert(banned, "manager".into());
        c.banned.insert(banned);

        assert!(c.can(&c.owner.clone(), ClaimPermission::Manage));
        assert!(c.can(&trusted, ClaimPermission::Build));
        assert!(!c.can(&trusted, ClaimPermission::Manage));
        assert!(c.can(&member, ClaimPermission::Interact));
        assert!(!c.can(&member, ClaimPermission::Break));
        assert!(!c.can(&banned, ClaimPermission::Interact));
        assert!(!c.can(&stranger, ClaimPermission::Interact));

        c.settings.public_interact = true;
        assert!(c.can(&stranger, ClaimPermission::Interact));
        assert!(!c.can(&stranger, ClaimPermission::Build));
    }

    #[test]
    fn setting_names_parse_loosely() {
        assert_eq!(SettingKey::from_str_loose("Fire_Spread"), Some(SettingKey::FireSpread));
        assert_eq!(SettingKey::from_str_loose("PVP"), Some(SettingKey::Pvp));
        assert_eq!(SettingKey::from_str_loose("weather"), None);

        let mut s = ClaimSettings::default();
        s.set(SettingKey::Explosions, true);
        assert!(s.get(SettingKey::Explosions));
    }

    #[test]
    fn claim_serializes_with_chunk_set() {
        let mut c = claim();
        c.chunks.insert(ChunkPos::new(3, -2));
        let json = serde_json::to_string(&c).unwrap();
        let back: Claim = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);
    }
}
