//! `/nation ...` commands.

use super::claim::resolve;
use super::{
    ARG_NAME, ARG_NATION, Handled, Outcome, display_name, notify_members, player_arg, require_player, respond,
    simple_arg,
};
use crate::protection::player_chunk;
use crate::state::{PluginState, Record};
use claims_engine::{AllianceOutcome, NationError};
use claims_types::{Nation, NationRole, unix_now};
use pumpkin::command::args::ConsumedArgs;
use pumpkin::command::{CommandExecutor, CommandResult, CommandSender};
use pumpkin::entity::player::Player;
use pumpkin::server::Server;
use pumpkin_util::text::color::NamedColor;
use std::fmt::Write as _;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy)]
pub enum NationAction {
    Create,
    Disband,
    Invite,
    Join,
    Leave,
    Kick,
    Promote,
    Demote,
    AddClaim,
    RemoveClaim,
    Ally,
    Enemy,
    Neutral,
    Info,
    List,
}

pub struct NationExecutor {
    state: PluginState,
    action: NationAction,
}

impl NationExecutor {
    pub fn new(state: &PluginState, action: NationAction) -> Self {
        Self {
            state: state.clone(),
            action,
        }
    }
}

impl CommandExecutor for NationExecutor {
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

fn member_ids(nation: &Nation) -> Vec<Uuid> {
    nation.members.keys().copied().collect()
}

/// Officers and the leader, who can answer diplomacy.
fn officer_ids(nation: &Nation) -> Vec<Uuid> {
    nation
        .members
        .values()
        .filter(|m| m.role >= NationRole::Officer)
        .map(|m| m.uuid)
        .collect()
}

impl NationExecutor {
    async fn owned_claims(&self, player: &Uuid) -> Vec<Uuid> {
        self.state
            .claims
            .read()
            .await
            .claims_of(player)
            .iter()
            .map(|c| c.id)
            .collect()
    }

    /// Remove a nation that no longer exists and end its wars.
    async fn dissolve(&self, nation_id: Uuid) -> Vec<Record> {
        let mut records = vec![Record::NationDeleted(nation_id)];
        let outcomes = self.state.wars.write().await.nation_disbanded(&nation_id, unix_now());
        for outcome in &outcomes {
            log::info!("landclaims: war {} ended because a nation disbanded", outcome.war.id);
            records.extend(Record::from_outcome(outcome));
        }
        records
    }

    async fn run(&self, player: &Arc<Player>, server: &Server, args: &ConsumedArgs<'_>) -> Handled {
        let uuid = player.gameprofile.id;
        let now = unix_now();

        match self.action {
            NationAction::Create => {
                let name = simple_arg(args, ARG_NATION)?;
                let nation = self.state.nations.write().await.create(name, uuid, now)?;
                log::info!("landclaims: {} founded nation '{}'", player.gameprofile.name, nation.name);
                Ok(Outcome::done(
                    format!("Nation '{}' founded. Invite members with /nation invite <player>", nation.name),
                    vec![Record::Nation(nation)],
                ))
            }

            NationAction::Disband => {
                let disbanded = self.state.nations.write().await.disband(&uuid)?;
                let nation = disbanded.nation;
                let records = self.dissolve(nation.id).await;
                log::info!(
                    "landclaims: nation '{}' disbanded ({} relations dropped)",
                    nation.name,
                    disbanded.relations.len()
                );
                let members: Vec<Uuid> = member_ids(&nation).into_iter().filter(|m| *m != uuid).collect();
                notify_members(
                    server,
                    &members,
                    &format!("Your nation '{}' has been disbanded", nation.name),
                    NamedColor::Gold,
                )
                .await;
                Ok(Outcome::done(format!("Nation '{}' disbanded", nation.name), records))
            }

            NationAction::Invite => {
                let target = player_arg(args)?;
                let nation = self.state.nations.write().await.invite(&uuid, target.gameprofile.id)?;
                notify_members(
                    server,
                    &[target.gameprofile.id],
                    &format!(
                        "You have been invited to '{}'. Use /nation join {}",
                        nation.name, nation.name
                    ),
                    NamedColor::Aqua,
                )
                .await;
                Ok(Outcome::done(
                    format!("Invited {} to '{}'", target.gameprofile.name, nation.name),
                    vec![Record::Nation(nation)],
                ))
            }

            NationAction::Join => {
                let name = simple_arg(args, ARG_NATION)?;
                let nation = self.state.nations.write().await.join(uuid, name, now)?;
                let others: Vec<Uuid> = member_ids(&nation).into_iter().filter(|m| *m != uuid).collect();
                notify_members(
                    server,
                    &others,
                    &format!("{} joined the nation", player.gameprofile.name),
                    NamedColor::Aqua,
                )
                .await;
                Ok(Outcome::done(format!("You joined '{}'", nation.name), vec![Record::Nation(nation)]))
            }

            NationAction::Leave => {
                let owned = self.owned_claims(&uuid).await;
                let mut nations = self.state.nations.write().await;
                let nation = nations.leave(&uuid, &owned)?;
                let dissolved = nations.get(&nation.id).is_none();
                drop(nations);
                if dissolved {
                    let records = self.dissolve(nation.id).await;
                    log::info!("landclaims: nation '{}' dissolved as its last member left", nation.name);
                    return Ok(Outcome::done(
                        format!("You left '{}'; the nation has been dissolved", nation.name),
                        records,
                    ));
                }
                notify_members(
                    server,
                    &member_ids(&nation),
                    &format!("{} left the nation", player.gameprofile.name),
                    NamedColor::Gray,
                )
                .await;
                Ok(Outcome::done(format!("You left '{}'", nation.name), vec![Record::Nation(nation)]))
            }

            NationAction::Kick => {
                let target = player_arg(args)?;
                let target_id = target.gameprofile.id;
                let owned = self.owned_claims(&target_id).await;
                let nation = self.state.nations.write().await.kick(&uuid, &target_id, &owned)?;
                notify_members(
                    server,
                    &[target_id],
                    &format!("You were removed from '{}'", nation.name),
                    NamedColor::Red,
                )
                .await;
                Ok(Outcome::done(
                    format!("{} was removed from the nation", target.gameprofile.name),
                    vec![Record::Nation(nation)],
                ))
            }

            NationAction::Promote | NationAction::Demote => {
                let target = player_arg(args)?;
                let target_id = target.gameprofile.id;
                let mut nations = self.state.nations.write().await;
                let nation = if matches!(self.action, NationAction::Promote) {
                    nations.promote(&uuid, &target_id)?
                } else {
                    nations.demote(&uuid, &target_id)?
                };
                drop(nations);
                let role = nation.role_of(&target_id).unwrap_or(NationRole::Member);
                Ok(Outcome::done(
                    format!("{} is now {role}", target.gameprofile.name),
                    vec![Record::Nation(nation)],
                ))
            }

            NationAction::AddClaim => {
                let name = simple_arg(args, ARG_NAME)?;
                let (world, chunk) = player_chunk(player);
                let claims = self.state.claims.read().await;
                let claim = resolve(&claims, &uuid, name, &world, chunk)
                    .ok()
                    .and_then(|id| claims.get(&id))
                    .ok_or(NationError::ClaimNotOwnedByMember)?;
                let nation = self.state.nations.write().await.add_claim(&uuid, claim)?;
                Ok(Outcome::done(
                    format!("Claim '{}' now belongs to '{}'", claim.name, nation.name),
                    vec![Record::Nation(nation)],
                ))
            }

            NationAction::RemoveClaim => {
                let name = simple_arg(args, ARG_NAME)?;
                let (world, chunk) = player_chunk(player);
                let claims = self.state.claims.read().await;
                let (claim_id, claim_name) = resolve(&claims, &uuid, name, &world, chunk)
                    .ok()
                    .and_then(|id| claims.get(&id))
                    .map(|c| (c.id, c.name.clone()))
                    .ok_or(NationError::ClaimNotInNation)?;
                let nation = self.state.nations.write().await.remove_claim(&uuid, &claim_id)?;
                Ok(Outcome::done(
                    format!("Claim '{claim_name}' withdrawn from '{}'", nation.name),
                    vec![Record::Nation(nation)],
                ))
            }

            NationAction::Ally => {
                let name = simple_arg(args, ARG_NATION)?;
                let mut nations = self.state.nations.write().await;
                let outcome = nations.request_alliance(&uuid, name, now)?;
                let own = nations.nation_of(&uuid).map(|n| n.name.clone()).unwrap_or_default();
                let target = nations.find_by_name(name).cloned();
                drop(nations);
                let Some(target) = target else {
                    return Err(NationError::NotFound(name.to_owned()).into());
                };
                match outcome {
                    AllianceOutcome::Requested => {
                        notify_members(
                            server,
                            &officer_ids(&target),
                            &format!("'{own}' requests an alliance. Use /nation ally {own} to accept"),
                            NamedColor::Aqua,
                        )
                        .await;
                        Ok(Outcome::info(format!("Alliance request sent to '{}'", target.name)))
                    }
                    AllianceOutcome::Formed(relation) => {
                        log::info!("landclaims: '{own}' and '{}' are now allied", target.name);
                        notify_members(
                            server,
                            &member_ids(&target),
                            &format!("Your nation is now allied with '{own}'"),
                            NamedColor::Green,
                        )
                        .await;
                        Ok(Outcome::done(
                            format!("You are now allied with '{}'", target.name),
                            vec![Record::Relation(relation)],
                        ))
                    }
                }
            }

            NationAction::Enemy => {
                let name = simple_arg(args, ARG_NATION)?;
                let relation = self.state.nations.write().await.set_enemy(&uuid, name, now)?;
                Ok(Outcome::done(format!("'{name}' is now your enemy"), vec![Record::Relation(relation)]))
            }

            NationAction::Neutral => {
                let name = simple_arg(args, ARG_NATION)?;
                let (a, b) = self.state.nations.write().await.set_neutral(&uuid, name)?;
                Ok(Outcome::done(
                    format!("Relations with '{name}' are now neutral"),
                    vec![Record::RelationCleared(a, b)],
                ))
            }

            NationAction::Info => {
                let nations = self.state.nations.read().await;
                let nation = match simple_arg(args, ARG_NATION) {
                    Ok(name) => nations
                        .find_by_name(name)
                        .ok_or_else(|| NationError::NotFound(name.to_owned()))?,
                    Err(_) => nations.nation_of(&uuid).ok_or(NationError::NotInNation)?,
                };
                let mut msg = format!(
                    "--- {} ---\n\
                     Leader: {}\n\
                     Members: {}\n\
                     Claims: {}",
                    nation.name,
                    display_name(server, nation.leader),
                    nation.members.len(),
                    nation.claims.len()
                );
                let officers: Vec<String> = nation
                    .members
                    .values()
                    .filter(|m| m.role == NationRole::Officer)
                    .map(|m| display_name(server, m.uuid))
                    .collect();
                if !officers.is_empty() {
                    let _ = write!(msg, "\nOfficers: {}", officers.join(", "));
                }
                for r in nations.relations_of(&nation.id) {
                    let other = if r.a == nation.id { r.b } else { r.a };
                    if let Some(o) = nations.get(&other) {
                        let _ = write!(msg, "\n{}: {}", r.kind, o.name);
                    }
                }
                let wars = self.state.wars.read().await;
                for w in wars.wars_of(&nation.id) {
                    let other = w
                        .opponent(&nation.id)
                        .and_then(|o| nations.get(&o))
                        .map_or("?", |o| o.name.as_str());
                    let _ = write!(msg, "\nWar with {other}: {}", w.state);
                }
                if let Some(shield) = wars.shield_of(&nation.id, now) {
                    let _ = write!(
                        msg,
                        "\nWar shield: {} minutes left",
                        (shield.expires_at - now).div_ceil(60)
                    );
                }
                Ok(Outcome::info(msg))
            }

            NationAction::List => {
                let nations = self.state.nations.read().await;
                let all = nations.all();
                if all.is_empty() {
                    return Ok(Outcome::info("No nations yet. Found one with /nation create <name>"));
                }
                let mut msg = format!("--- Nations ({}) ---", all.len());
                for n in all {
                    let _ = write!(
                        msg,
                        "\n{}: {} members, {} claims",
                        n.name,
                        n.members.len(),
                        n.claims.len()
                    );
                }
                Ok(Outcome::info(msg))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn officers_include_leader() {
        let leader = Uuid::new_v4();
        let mut nation = Nation::new("north".into(), leader, 0);
        let member = Uuid::new_v4();
        nation.members.insert(
            member,
            claims_types::NationMember {
                uuid: member,
                role: NationRole::Member,
                joined_at: 1,
            },
        );
        assert_eq!(officer_ids(&nation), vec![leader]);
        assert_eq!(member_ids(&nation).len(), 2);
    }
}
