//! Access and PvP decisions shared by event handlers and the service.

use crate::state::PluginState;
use claims_types::{ChunkPos, ClaimPermission};
use pumpkin::entity::player::Player;
use pumpkin::server::Server;
use pumpkin_util::permission::PermissionLvl;
use std::sync::Arc;
use uuid::Uuid;

pub const ADMIN_PERMISSION: &str = "landclaims:admin";

/// Claims are keyed by dimension id.
#[must_use]
pub fn world_key(player: &Player) -> String {
    player.living_entity.entity.world.load().dimension.id.to_string()
}

#[must_use]
pub fn player_chunk(player: &Player) -> (String, ChunkPos) {
    let pos = player.position();
    (world_key(player), ChunkPos::from_world(pos.x, pos.z))
}

/// Admins bypass claim protection.
pub async fn has_bypass(server: &Arc<Server>, uuid: Uuid) -> bool {
    let perm = server.permission_manager.read().await;
    let lvl = server
        .get_player_by_uuid(uuid)
        .map_or(PermissionLvl::Zero, |p| p.permission_lvl.load());
    perm.has_permission(&uuid, ADMIN_PERMISSION, lvl).await
}

pub async fn can_act(
    state: &PluginState,
    player: &Uuid,
    world: &str,
    chunk: ChunkPos,
    permission: ClaimPermission,
) -> bool {
    state.claims.read().await.can(player, world, chunk, permission)
}

/// An active war between the players' nations always allows PvP. Otherwise
/// the claim the victim stands in decides, and the wilderness default
/// applies outside claims.
#[must_use]
pub const fn pvp_rule(war_active: bool, claim_pvp: Option<bool>, wilderness_pvp: bool) -> bool {
    if war_active {
        return true;
    }
    match claim_pvp {
        Some(allowed) => allowed,
        None => wilderness_pvp,
    }
}

pub async fn pvp_allowed(
    state: &PluginState,
    attacker: &Uuid,
    victim: &Uuid,
    world: &str,
    victim_chunk: ChunkPos,
) -> bool {
    let claim_pvp = {
        let claims = state.claims.read().await;
        claims.claim_at(world, victim_chunk).map(|c| c.settings.pvp)
    };
    let war_active = {
        let nations = state.nations.read().await;
        let a = nations.nation_of(attacker).map(|n| n.id);
        let v = nations.nation_of(victim).map(|n| n.id);
        drop(nations);
        match (a, v) {
            (Some(a), Some(v)) => state.wars.read().await.pvp_allowed(&a, &v),
            _ => false,
        }
    };
    pvp_rule(war_active, claim_pvp, state.config.claims.wilderness_pvp)
}

#[cfg(test)]
mod tests {
    use super::pvp_rule;

    #[test]
    fn war_overrides_claim_setting() {
        assert!(pvp_rule(true, Some(false), false));
        assert!(!pvp_rule(false, Some(false), true));
        assert!(pvp_rule(false, Some(true), false));
        assert!(!pvp_rule(false, None, false));
        assert!(pvp_rule(false, None, true));
    }
}
