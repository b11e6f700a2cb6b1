//! Event handlers: pool setup on join, claim enter/leave titles, block
//! protection.

use crate::protection::{self, has_bypass, player_chunk};
use crate::state::{PluginState, Record};
use claims_types::{ChunkPos, ClaimPermission};
use pumpkin::entity::player::TitleMode;
use pumpkin::plugin::api::events::block::block_break::BlockBreakEvent;
use pumpkin::plugin::api::events::player::player_interact_event::PlayerInteractEvent;
use pumpkin::plugin::api::events::player::player_join::PlayerJoinEvent;
use pumpkin::plugin::api::events::player::player_leave::PlayerLeaveEvent;
use pumpkin::plugin::api::events::player::player_move::PlayerMoveEvent;
use pumpkin::plugin::{Cancellable, EventHandler};
use pumpkin::server::Server;
use pumpkin_util::text::TextComponent;
use pumpkin_util::text::color::NamedColor;
use std::pin::Pin;
use std::sync::Arc;

// ───────────────────────────── Player Join ─────────────────────────────

pub struct ClaimJoinHandler {
    pub state: PluginState,
}

impl EventHandler<PlayerJoinEvent> for ClaimJoinHandler {
    fn handle<'a>(
        &'a self,
        _server: &'a Arc<Server>,
        event: &'a PlayerJoinEvent,
    ) -> Pin<Box<dyn std::future::Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            let player = &event.player;
            let uuid = player.gameprofile.id;
            let (world, chunk) = player_chunk(player);

            let (created, current) = {
                let mut claims = self.state.claims.write().await;
                let created = claims.ensure_pool(uuid);
                let current = claims.claim_at(&world, chunk).map(|c| (c.id, c.name.clone()));
                (created, current)
            };
            if let Some(pool) = created {
                let _ = self.state.save(vec![Record::Pool(pool)]).await;
                log::info!("landclaims: created chunk pool for {}", player.gameprofile.name);
            }

            self.state.set_player_claim(uuid, current.as_ref().map(|(id, _)| *id));
            if let Some((_, name)) = current {
                player
                    .show_title(
                        &TextComponent::text(format!("Claim: {name}")).color_named(NamedColor::Aqua),
                        &TitleMode::ActionBar,
                    )
                    .await;
            }
        })
    }
}

// ───────────────────────────── Player Leave ─────────────────────────────

pub struct ClaimLeaveHandler {
    pub state: PluginState,
}

impl EventHandler<PlayerLeaveEvent> for ClaimLeaveHandler {
    fn handle<'a>(
        &'a self,
        _server: &'a Arc<Server>,
        event: &'a PlayerLeaveEvent,
    ) -> Pin<Box<dyn std::future::Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            self.state.remove_player(&event.player.gameprofile.id);
        })
    }
}

// ───────────────────────────── Player Move ─────────────────────────────

pub struct ClaimMoveHandler {
    pub state: PluginState,
}

impl EventHandler<PlayerMoveEvent> for ClaimMoveHandler {
    fn handle_blocking<'a>(
        &'a self,
        server: &'a Arc<Server>,
        event: &'a mut PlayerMoveEvent,
    ) -> Pin<Box<dyn std::future::Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            let from = ChunkPos::from_world(event.from.x, event.from.z);
            let to = ChunkPos::from_world(event.to.x, event.to.z);
            if from == to {
                return;
            }
            let player = Arc::clone(&event.player);
            let uuid = player.gameprofile.id;
            let world = protection::world_key(&player);

            let entered = {
                let claims = self.state.claims.read().await;
                claims.claim_at(&world, to).map(|c| {
                    (c.id, c.name.clone(), c.owner, c.banned.contains(&uuid))
                })
            };

            if let Some((_, name, _, true)) = &entered {
                if !has_bypass(server, uuid).await {
                    event.set_cancelled(true);
                    player
                        .show_title(
                            &TextComponent::text(format!("You are banned from {name}"))
                                .color_named(NamedColor::Red),
                            &TitleMode::ActionBar,
                        )
                        .await;
                    return;
                }
            }

            let new_id = entered.as_ref().map(|(id, ..)| *id);
            let previous = self.state.set_player_claim(uuid, new_id).flatten();
            if previous == new_id {
                return;
            }

            match entered {
                Some((claim_id, name, owner, _)) => {
                    let owner_name = server
                        .get_player_by_uuid(owner)
                        .map_or_else(|| "an offline player".to_owned(), |p| p.gameprofile.name.clone());
                    let nation = self
                        .state
                        .nations
                        .read()
                        .await
                        .nation_of_claim(&claim_id)
                        .map(|n| n.name.clone());
                    player
                        .show_title(
                            &TextComponent::text(format!("Entering {name}")).color_named(NamedColor::Aqua),
                            &TitleMode::Title,
                        )
                        .await;
                    let subtitle = nation.map_or_else(
                        || format!("Owned by {owner_name}"),
                        |n| format!("Owned by {owner_name} of {n}"),
                    );
                    player
                        .show_title(
                            &TextComponent::text(subtitle).color_named(NamedColor::Gray),
                            &TitleMode::SubTitle,
                        )
                        .await;
                    player.send_title_animation(10, 40, 10).await;
                }
                None => {
                    player
                        .show_title(
                            &TextComponent::text("Wilderness").color_named(NamedColor::Green),
                            &TitleMode::ActionBar,
                        )
                        .await;
                }
            }
        })
    }
}

// ───────────────────────────── Protection ─────────────────────────────

pub struct ClaimBreakHandler {
    pub state: PluginState,
}

impl EventHandler<BlockBreakEvent> for ClaimBreakHandler {
    fn handle_blocking<'a>(
        &'a self,
        server: &'a Arc<Server>,
        event: &'a mut BlockBreakEvent,
    ) -> Pin<Box<dyn std::future::Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            let Some(player) = event.player.clone() else {
                return;
            };
            let uuid = player.gameprofile.id;
            let world = protection::world_key(&player);
            let pos = event.block_position.0;
            let chunk = ChunkPos::from_block(pos.x, pos.z);

            if protection::can_act(&self.state, &uuid, &world, chunk, ClaimPermission::Break).await
                || has_bypass(server, uuid).await
            {
                return;
            }
            event.set_cancelled(true);
            player
                .show_title(
                    &TextComponent::text("You cannot break blocks in this claim")
                        .color_named(NamedColor::Red),
                    &TitleMode::ActionBar,
                )
                .await;
        })
    }
}

pub struct ClaimInteractHandler {
    pub state: PluginState,
}

impl EventHandler<PlayerInteractEvent> for ClaimInteractHandler {
    fn handle_blocking<'a>(
        &'a self,
        server: &'a Arc<Server>,
        event: &'a mut PlayerInteractEvent,
    ) -> Pin<Box<dyn std::future::Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            if !event.action.is_right_click() {
                return;
            }
            let Some(clicked) = event.clicked_pos else {
                return;
            };
            let player = Arc::clone(&event.player);
            let uuid = player.gameprofile.id;
            let world = protection::world_key(&player);
            let chunk = ChunkPos::from_block(clicked.0.x, clicked.0.z);

            if protection::can_act(&self.state, &uuid, &world, chunk, ClaimPermission::Interact).await
                || has_bypass(server, uuid).await
            {
                return;
            }
            event.set_cancelled(true);
            player
                .show_title(
                    &TextComponent::text("You cannot interact here").color_named(NamedColor::Red),
                    &TitleMode::ActionBar,
                )
                .await;
        })
    }
}

