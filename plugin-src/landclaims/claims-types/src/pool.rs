//! Per-player chunk credit pool.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Aggregate purchase record for one player.
///
/// Credits are spent by moving them into a claim's `purchased_chunks`; the
/// pool itself only records how many the player owns in total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerChunkPool {
    pub owner: Uuid,
    /// Credits the player bought.
    pub purchased_chunks: u32,
    /// Credits granted by admins or won through tributes.
    pub bonus_chunks: u32,
}

impl PlayerChunkPool {
    #[must_use]
    pub const fn new(owner: Uuid) -> Self {
        Self {
            owner,
            purchased_chunks: 0,
            bonus_chunks: 0,
        }
    }

    /// Every credit the player may spend across their claims.
    #[must_use]
    pub const fn total_credits(&self) -> u32 {
        self.purchased_chunks.saturating_add(self.bonus_chunks)
    }
}
