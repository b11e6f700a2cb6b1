//! Handler for PlayerAttackEvent: claim PvP settings and active wars.

use crate::protection::{self, player_chunk};
use crate::state::PluginState;
use pumpkin::entity::player::TitleMode;
use pumpkin::plugin::api::events::player::player_attack::PlayerAttackEvent;
use pumpkin::plugin::{Cancellable, EventHandler};
use pumpkin::server::Server;
use pumpkin_util::text::TextComponent;
use pumpkin_util::text::color::NamedColor;
use std::pin::Pin;
use std::sync::Arc;

pub struct ClaimPvpHandler {
    pub state: PluginState,
}

impl EventHandler<PlayerAttackEvent> for ClaimPvpHandler {
    fn handle_blocking<'a>(
        &'a self,
        _server: &'a Arc<Server>,
        event: &'a mut PlayerAttackEvent,
    ) -> Pin<Box<dyn std::future::Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            let attacker = event.attacker.gameprofile.id;
            let victim = event.victim.gameprofile.id;
            let (world, chunk) = player_chunk(&event.victim);

            if protection::pvp_allowed(&self.state, &attacker, &victim, &world, chunk).await {
                return;
            }
            event.set_cancelled(true);
            event
                .attacker
                .show_title(
                    &TextComponent::text("PvP is disabled here").color_named(NamedColor::Red),
                    &TitleMode::ActionBar,
                )
                .await;
            log::debug!(
                "landclaims: blocked PvP {} -> {} at {chunk}",
                event.attacker.gameprofile.name,
                event.victim.gameprofile.name
            );
        })
    }
}
