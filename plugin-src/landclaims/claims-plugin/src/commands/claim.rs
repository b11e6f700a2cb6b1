//! `/claim ...` player commands.

use super::{
    ARG_GROUP, ARG_NAME, ARG_NEW_NAME, ARG_SETTING, ARG_VALUE, Failure, Handled, Outcome,
    amount_arg, display_name, player_arg, require_player, respond, simple_arg,
};
use crate::border;
use crate::protection::player_chunk;
use crate::state::{PluginState, Record};
use claims_engine::{ClaimError, ClaimRegistry};
use claims_types::{ChunkPos, SettingKey, unix_now};
use pumpkin::command::args::ConsumedArgs;
use pumpkin::command::{CommandExecutor, CommandResult, CommandSender};
use pumpkin::entity::player::Player;
use pumpkin::server::Server;
use std::fmt::Write as _;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy)]
pub enum ClaimAction {
    Create,
    Delete,
    List,
    Info,
    Add,
    Remove,
    AddChunks,
    RemoveChunks,
    Pool,
    Trust,
    Untrust,
    Ban,
    Unban,
    Member,
    Set,
    Rename,
    Transfer,
    Show,
}

pub struct ClaimExecutor {
    state: PluginState,
    action: ClaimAction,
}

impl ClaimExecutor {
    pub fn new(state: &PluginState, action: ClaimAction) -> Self {
        Self {
            state: state.clone(),
            action,
        }
    }
}

impl CommandExecutor for ClaimExecutor {
    fn execute<'a>(
        &'a self,
        sender: &'a CommandSender,
        server: &'a Server,
        args: &'a ConsumedArgs<'a>,
    ) -> CommandResult<'a> {
        Box::pin(async move {
            let result = match require_player(sender) {
                Ok(player) => self.run(&player, server, args).await,
                Err(e) => Err(e),
            };
            Ok(respond(&self.state, sender, result).await)
        })
    }
}

/// A claim the actor names: their own claim of that name, or the claim they
/// stand in when it carries that name (for managers of someone else's claim).
pub(super) fn resolve(
    claims: &ClaimRegistry,
    actor: &Uuid,
    name: &str,
    world: &str,
    chunk: ChunkPos,
) -> Result<Uuid, ClaimError> {
    if let Some(own) = claims.find_by_name(actor, name) {
        return Ok(own.id);
    }
    claims
        .claim_at(world, chunk)
        .filter(|c| c.name.eq_ignore_ascii_case(name))
        .map(|c| c.id)
        .ok_or_else(|| ClaimError::NotFound(name.to_owned()))
}

fn parse_toggle(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "on" | "true" | "yes" | "allow" => Some(true),
        "off" | "false" | "no" | "deny" => Some(false),
        _ => None,
    }
}

impl ClaimExecutor {
    async fn run(&self, player: &Arc<Player>, server: &Server, args: &ConsumedArgs<'_>) -> Handled {
        let uuid = player.gameprofile.id;
        let (world, chunk) = player_chunk(player);

        match self.action {
            ClaimAction::Create => {
                let name = simple_arg(args, ARG_NAME)?;
                let claim = self
                    .state
                    .claims
                    .write()
                    .await
                    .create_claim(uuid, name, &world, chunk, unix_now())?;
                log::info!("landclaims: {} created claim '{}' at {chunk}", player.gameprofile.name, claim.name);
                Ok(Outcome::done(
                    format!("Claim '{}' created at chunk {chunk} ({} chunks capacity)", claim.name, claim.total_chunks),
                    vec![Record::Claim(claim)],
                ))
            }

            ClaimAction::Delete => {
                let name = simple_arg(args, ARG_NAME)?;
                let claim = self.state.claims.write().await.delete_claim(&uuid, name)?;
                let mut records = vec![Record::ClaimDeleted(claim.id)];
                if let Some(nation) = self.state.nations.write().await.forget_claim(&claim.id) {
                    records.push(Record::Nation(nation));
                }
                log::info!("landclaims: {} deleted claim '{}'", player.gameprofile.name, claim.name);
                Ok(Outcome::done(
                    format!(
                        "Claim '{}' deleted; {} purchased chunks returned to your pool",
                        claim.name, claim.purchased_chunks
                    ),
                    records,
                ))
            }

            ClaimAction::List => {
                let claims = self.state.claims.read().await;
                let owned = claims.claims_of(&uuid);
                if owned.is_empty() {
                    return Ok(Outcome::info("You have no claims. Use /claim create <name>"));
                }
                let mut msg = format!("--- Your claims ({}) ---", owned.len());
                for c in owned {
                    let _ = write!(
                        msg,
                        "\n{}: {}/{} chunks in world {}",
                        c.name,
                        c.chunk_count(),
                        c.total_chunks,
                        c.world
                    );
                }
                Ok(Outcome::info(msg))
            }

            ClaimAction::Info => {
                let claims = self.state.claims.read().await;
                let Some(c) = claims.claim_at(&world, chunk) else {
                    return Ok(Outcome::info(format!("Chunk {chunk} is wilderness")));
                };
                let nation = self
                    .state
                    .nations
                    .read()
                    .await
                    .nation_of_claim(&c.id)
                    .map_or_else(|| "none".to_owned(), |n| n.name.clone());
                let settings = SettingKey::ALL
                    .iter()
                    .map(|k| format!("{}={}", k.label(), if c.settings.get(*k) { "on" } else { "off" }))
                    .collect::<Vec<_>>()
                    .join(", ");
                let members = c
                    .members
                    .iter()
                    .map(|(m, g)| format!("{} ({g})", display_name(server, *m)))
                    .collect::<Vec<_>>()
                    .join(", ");
                Ok(Outcome::info(format!(
                    "--- Claim {} ---\n\
                     Owner: {}\n\
                     Nation: {nation}\n\
                     Chunks: {}/{} ({} purchased)\n\
                     Trusted: {}  Banned: {}\n\
                     Members: {}\n\
                     Settings: {settings}",
                    c.name,
                    display_name(server, c.owner),
                    c.chunk_count(),
                    c.total_chunks,
                    c.purchased_chunks,
                    c.trusted.len(),
                    c.banned.len(),
                    if members.is_empty() { "none".to_owned() } else { members },
                )))
            }

            ClaimAction::Add => {
                let name = simple_arg(args, ARG_NAME)?;
                let added = self.state.claims.write().await.claim_chunk(&uuid, name, &world, chunk)?;
                let mut msg = format!(
                    "Chunk {chunk} added to '{}' ({}/{})",
                    added.claim.name,
                    added.claim.chunk_count(),
                    added.claim.total_chunks
                );
                if added.drew_credit {
                    msg.push_str("; 1 chunk taken from your pool");
                }
                Ok(Outcome::done(msg, vec![Record::Claim(added.claim)]))
            }

            ClaimAction::Remove => {
                let claim = self.state.claims.write().await.unclaim_chunk(&uuid, &world, chunk)?;
                Ok(Outcome::done(
                    format!("Chunk {chunk} removed from '{}'", claim.name),
                    vec![Record::Claim(claim)],
                ))
            }

            ClaimAction::AddChunks => {
                let name = simple_arg(args, ARG_NAME)?;
                let amount = amount_arg(args)?;
                let claim = self.state.claims.write().await.allocate(&uuid, name, amount)?;
                Ok(Outcome::done(
                    format!("'{}' can now hold {} chunks", claim.name, claim.total_chunks),
                    vec![Record::Claim(claim)],
                ))
            }

            ClaimAction::RemoveChunks => {
                let name = simple_arg(args, ARG_NAME)?;
                let amount = amount_arg(args)?;
                let claim = self.state.claims.write().await.deallocate(&uuid, name, amount)?;
                Ok(Outcome::done(
                    format!("{amount} chunks returned to your pool; '{}' holds {}", claim.name, claim.total_chunks),
                    vec![Record::Claim(claim)],
                ))
            }

            ClaimAction::Pool => {
                let claims = self.state.claims.read().await;
                let pool = claims.pool(&uuid);
                Ok(Outcome::info(format!(
                    "--- Chunk pool ---\n\
                     Purchased: {}\n\
                     Bonus: {}\n\
                     Unallocated: {}\n\
                     Free per claim: {}",
                    pool.purchased_chunks,
                    pool.bonus_chunks,
                    claims.unallocated(&uuid),
                    claims.rules().starting_chunks_per_claim,
                )))
            }

            ClaimAction::Trust | ClaimAction::Untrust | ClaimAction::Ban | ClaimAction::Unban => {
                let name = simple_arg(args, ARG_NAME)?;
                let target = player_arg(args)?;
                let target_id = target.gameprofile.id;
                let mut claims = self.state.claims.write().await;
                let id = resolve(&claims, &uuid, name, &world, chunk)?;
                let (claim, verb) = match self.action {
                    ClaimAction::Trust => (claims.trust(&uuid, &id, target_id)?, "trusted in"),
                    ClaimAction::Untrust => (claims.untrust(&uuid, &id, &target_id)?, "no longer trusted in"),
                    ClaimAction::Ban => (claims.ban(&uuid, &id, target_id)?, "banned from"),
                    _ => (claims.unban(&uuid, &id, &target_id)?, "unbanned from"),
                };
                Ok(Outcome::done(
                    format!("{} is now {verb} '{}'", target.gameprofile.name, claim.name),
                    vec![Record::Claim(claim)],
                ))
            }

            ClaimAction::Member => {
                let name = simple_arg(args, ARG_NAME)?;
                let group = simple_arg(args, ARG_GROUP)?;
                let target = player_arg(args)?;
                let target_id = target.gameprofile.id;
                let mut claims = self.state.claims.write().await;
                let id = resolve(&claims, &uuid, name, &world, chunk)?;
                let claim = if group.eq_ignore_ascii_case("none") {
                    claims.remove_member(&uuid, &id, &target_id)?
                } else {
                    claims.set_member(&uuid, &id, target_id, group)?
                };
                let group = claim
                    .members
                    .get(&target_id)
                    .map_or_else(|| "no group".to_owned(), |g| format!("group '{g}'"));
                Ok(Outcome::done(
                    format!("{} is in {group} of '{}'", target.gameprofile.name, claim.name),
                    vec![Record::Claim(claim)],
                ))
            }

            ClaimAction::Set => {
                let name = simple_arg(args, ARG_NAME)?;
                let setting = simple_arg(args, ARG_SETTING)?;
                let key = SettingKey::from_str_loose(setting).ok_or_else(|| {
                    let known: Vec<&str> = SettingKey::ALL.iter().map(|k| k.label()).collect();
                    Failure::new(format!("Unknown setting '{setting}'. Use: {}", known.join(", ")))
                })?;
                let value = parse_toggle(simple_arg(args, ARG_VALUE)?)
                    .ok_or_else(|| Failure::new("Value must be on or off"))?;
                let mut claims = self.state.claims.write().await;
                let id = resolve(&claims, &uuid, name, &world, chunk)?;
                let claim = claims.set_setting(&uuid, &id, key, value)?;
                Ok(Outcome::done(
                    format!("{} is now {} in '{}'", key.label(), if value { "on" } else { "off" }, claim.name),
                    vec![Record::Claim(claim)],
                ))
            }

            ClaimAction::Rename => {
                let name = simple_arg(args, ARG_NAME)?;
                let new_name = simple_arg(args, ARG_NEW_NAME)?;
                let claim = self.state.claims.write().await.rename(&uuid, name, new_name)?;
                Ok(Outcome::done(format!("Claim renamed to '{}'", claim.name), vec![Record::Claim(claim)]))
            }

            ClaimAction::Transfer => {
                let name = simple_arg(args, ARG_NAME)?;
                let target = player_arg(args)?;
                let (claim, old_pool, new_pool) =
                    self.state.claims.write().await.transfer(&uuid, name, target.gameprofile.id)?;
                let mut records = vec![
                    Record::Claim(claim.clone()),
                    Record::Pool(old_pool),
                    Record::Pool(new_pool),
                ];
                let mut nations = self.state.nations.write().await;
                let new_owner_nation = nations.nation_of(&target.gameprofile.id).map(|n| n.id);
                if nations
                    .nation_of_claim(&claim.id)
                    .is_some_and(|n| Some(n.id) != new_owner_nation)
                {
                    if let Some(n) = nations.forget_claim(&claim.id) {
                        records.push(Record::Nation(n));
                    }
                }
                drop(nations);
                log::info!(
                    "landclaims: {} transferred claim '{}' to {}",
                    player.gameprofile.name,
                    claim.name,
                    target.gameprofile.name
                );
                Ok(Outcome::done(
                    format!("Claim '{}' now belongs to {}", claim.name, target.gameprofile.name),
                    records,
                ))
            }

            ClaimAction::Show => {
                let claims = self.state.claims.read().await;
                let claim = match simple_arg(args, ARG_NAME) {
                    Ok(name) => claims
                        .find_by_name(&uuid, name)
                        .ok_or_else(|| ClaimError::NotFound(name.to_owned()))?,
                    Err(_) => claims
                        .claim_at(&world, chunk)
                        .ok_or(ClaimError::NotClaimed(chunk))?,
                };
                border::show(&self.state, Arc::clone(player), claim);
                Ok(Outcome::info(format!(
                    "Showing the border of '{}' for {} seconds",
                    claim.name, self.state.config.border.duration_secs
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claims_engine::ClaimRules;

    #[test]
    fn toggles() {
        assert_eq!(parse_toggle("ON"), Some(true));
        assert_eq!(parse_toggle("deny"), Some(false));
        assert_eq!(parse_toggle("maybe"), None);
    }

    #[test]
    fn resolve_prefers_own_claim_then_location() {
        let mut reg = ClaimRegistry::new(ClaimRules::default());
        let owner = Uuid::new_v4();
        let manager = Uuid::new_v4();
        reg.create_claim(owner, "farm", "0", ChunkPos::new(0, 0), 0).unwrap();
        let own = reg.create_claim(manager, "home", "0", ChunkPos::new(5, 5), 0).unwrap();

        assert_eq!(resolve(&reg, &manager, "home", "0", ChunkPos::new(0, 0)), Ok(own.id));
        let farm = reg.claim_at("0", ChunkPos::new(0, 0)).map(|c| c.id);
        assert_eq!(resolve(&reg, &manager, "FARM", "0", ChunkPos::new(0, 0)).ok(), farm);
        assert!(resolve(&reg, &manager, "farm", "0", ChunkPos::new(9, 9)).is_err());
    }
}
