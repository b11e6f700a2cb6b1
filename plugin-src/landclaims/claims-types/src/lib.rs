//! Shared types for the LandClaims plugins.
//!
//! No server or database dependencies.

mod claim;
mod nation;
mod pool;
mod war;

pub use claim::{ChunkPos, Claim, ClaimGroup, ClaimPermission, ClaimSettings, SettingKey};
pub use nation::{Nation, NationMember, NationRelation, NationRole, RelationKind};
pub use pool::PlayerChunkPool;
pub use war::{TributeStatus, War, WarShield, WarState, WarTribute};

use std::time::{SystemTime, UNIX_EPOCH};

/// Current time as unix seconds. Every timestamp in this crate uses this unit.
#[must_use]
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}
