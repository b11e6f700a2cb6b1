//! Claim service, exposed to other plugins via Pumpkin's service registry.

use crate::protection;
use crate::state::PluginState;
use claims_types::{ChunkPos, Claim, ClaimPermission, Nation, PlayerChunkPool, RelationKind};
use uuid::Uuid;

pub struct ClaimService {
    state: PluginState,
}

impl ClaimService {
    #[must_use]
    pub fn new(state: &PluginState) -> Self {
        Self {
            state: state.clone(),
        }
    }

    /// Claim covering a block column, if any.
    pub async fn claim_at(&self, world: &str, block_x: i32, block_z: i32) -> Option<Claim> {
        let claims = self.state.claims.read().await;
        claims
            .claim_at(world, ChunkPos::from_block(block_x, block_z))
            .cloned()
    }

    pub async fn claims_of(&self, owner: &Uuid) -> Vec<Claim> {
        let claims = self.state.claims.read().await;
        claims.claims_of(owner).into_iter().cloned().collect()
    }

    pub async fn pool_of(&self, player: &Uuid) -> PlayerChunkPool {
        self.state.claims.read().await.pool(player)
    }

    pub async fn can(
        &self,
        player: &Uuid,
        world: &str,
        block_x: i32,
        block_z: i32,
        permission: ClaimPermission,
    ) -> bool {
        protection::can_act(
            &self.state,
            player,
            world,
            ChunkPos::from_block(block_x, block_z),
            permission,
        )
        .await
    }

    pub async fn nation_of(&self, player: &Uuid) -> Option<Nation> {
        self.state.nations.read().await.nation_of(player).cloned()
    }

    pub async fn relation(&self, a: &Uuid, b: &Uuid) -> RelationKind {
        self.state.nations.read().await.relation(a, b)
    }

    /// Whether `attacker` may hurt `victim` standing at the given block.
    pub async fn pvp_allowed(
        &self,
        attacker: &Uuid,
        victim: &Uuid,
        world: &str,
        block_x: i32,
        block_z: i32,
    ) -> bool {
        protection::pvp_allowed(
            &self.state,
            attacker,
            victim,
            world,
            ChunkPos::from_block(block_x, block_z),
        )
        .await
    }
}

impl pumpkin::plugin::api::Payload for ClaimService {
    fn get_name_static() -> &'static str {
        "landclaims::ClaimService"
    }
    fn get_name(&self) -> &'static str {
        Self::get_name_static()
    }
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}
