//! Temporary particle outline of a claim, shown with `/claim show`.

use crate::state::PluginState;
use claims_engine::{ChatColor, border_points, rainbow};
use claims_types::Claim;
use pumpkin::entity::player::{Player, TitleMode};
use pumpkin_data::particle::Particle;
use pumpkin_util::math::vector3::Vector3;
use pumpkin_util::text::TextComponent;
use pumpkin_util::text::color::NamedColor;
use std::sync::Arc;
use std::time::Duration;

/// Redraw every 5 game ticks.
const FRAME_TICKS: u64 = 5;
/// Only points this close to the player are drawn.
const VIEW_DISTANCE: f64 = 64.0;

#[must_use]
pub const fn named(color: ChatColor) -> NamedColor {
    match color {
        ChatColor::Black => NamedColor::Black,
        ChatColor::DarkBlue => NamedColor::DarkBlue,
        ChatColor::DarkGreen => NamedColor::DarkGreen,
        ChatColor::DarkAqua => NamedColor::DarkAqua,
        ChatColor::DarkRed => NamedColor::DarkRed,
        ChatColor::DarkPurple => NamedColor::DarkPurple,
        ChatColor::Gold => NamedColor::Gold,
        ChatColor::Gray => NamedColor::Gray,
        ChatColor::DarkGray => NamedColor::DarkGray,
        ChatColor::Blue => NamedColor::Blue,
        ChatColor::Green => NamedColor::Green,
        ChatColor::Aqua => NamedColor::Aqua,
        ChatColor::Red => NamedColor::Red,
        ChatColor::LightPurple => NamedColor::LightPurple,
        ChatColor::Yellow => NamedColor::Yellow,
        ChatColor::White => NamedColor::White,
    }
}

/// Particles carry no color on the wire, so the nearest chat color picks
/// a particle of a similar hue.
const fn particle_for(color: ChatColor) -> Particle {
    match color {
        ChatColor::Blue | ChatColor::DarkBlue | ChatColor::Aqua | ChatColor::DarkAqua => {
            Particle::SoulFireFlame
        }
        ChatColor::Green | ChatColor::DarkGreen => Particle::HappyVillager,
        ChatColor::White | ChatColor::Gray | ChatColor::LightPurple => Particle::EndRod,
        _ => Particle::Flame,
    }
}

/// Start drawing a claim's border for one player, replacing any border
/// already shown to them.
pub fn show(state: &PluginState, player: Arc<Player>, claim: &Claim) {
    let border = state.config.border.clone();
    let effect = border.effect();
    let points = border_points(&claim.chunks, border.spacing);
    let name = claim.name.clone();
    let uuid = player.gameprofile.id;
    let tasks = state.clone();

    let handle = state.runtime.spawn(async move {
        let frames = border.duration_secs * 20 / FRAME_TICKS;
        let mut interval = tokio::time::interval(Duration::from_millis(FRAME_TICKS * 50));
        for frame in 0..frames {
            interval.tick().await;
            let tick = frame * FRAME_TICKS;
            let rgb = if border.rainbow {
                rainbow(tick, effect.period_ticks)
            } else {
                effect.color_at(tick)
            };
            let color = rgb.nearest_named();

            let pos = player.position();
            let y = pos.y + 1.0;
            for &(x, z) in &points {
                let (dx, dz) = (x - pos.x, z - pos.z);
                if dx * dx + dz * dz > VIEW_DISTANCE * VIEW_DISTANCE {
                    continue;
                }
                player
                    .spawn_particle(
                        Vector3::new(x, y, z),
                        Vector3::new(0.0, effect.size * 0.5, 0.0),
                        0.0,
                        1,
                        particle_for(color),
                    )
                    .await;
            }
            if frame % 4 == 0 {
                player
                    .show_title(
                        &TextComponent::text(format!("Claim border: {name}")).color_named(named(color)),
                        &TitleMode::ActionBar,
                    )
                    .await;
            }
        }
        tasks.finish_border(&uuid, tokio::task::id());
    });
    state.set_border_task(uuid, handle.abort_handle());
}
