//! `/war ...` commands. Every subcommand naming a nation acts on the open
//! war between the sender's nation and that nation.

use super::{
    ARG_NATION, ARG_REASON, Failure, Handled, Outcome, amount_arg, notify_members, require_player, respond,
    simple_arg,
};
use crate::state::{PluginState, Record};
use claims_engine::{NationError, NationRegistry, WarError, WarRegistry, WarRules};
use claims_types::{NationRole, War, WarState, unix_now};
use pumpkin::command::args::ConsumedArgs;
use pumpkin::command::{CommandExecutor, CommandResult, CommandSender};
use pumpkin::entity::player::Player;
use pumpkin::server::Server;
use pumpkin_util::text::color::NamedColor;
use std::fmt::Write as _;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy)]
pub enum WarAction {
    Declare,
    Status,
    List,
    Ceasefire,
    Resume,
    Surrender,
    TributeOffer,
    TributeAccept,
    TributeReject,
}

pub struct WarExecutor {
    state: PluginState,
    action: WarAction,
}

impl WarExecutor {
    pub fn new(state: &PluginState, action: WarAction) -> Self {
        Self {
            state: state.clone(),
            action,
        }
    }
}

impl CommandExecutor for WarExecutor {
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

/// Seconds until the war's next timed transition.
fn next_transition(war: &War, rules: &WarRules, now: u64) -> Option<u64> {
    let at = match war.state {
        WarState::Declared => war.declared_at + rules.preparation_secs,
        WarState::Active => war.started_at? + rules.max_duration_secs,
        WarState::Ceasefire => war.ceasefire_at? + rules.ceasefire_secs,
        WarState::Ended => return None,
    };
    Some(at.saturating_sub(now))
}

fn format_duration(secs: u64) -> String {
    match secs {
        0..60 => format!("{secs}s"),
        60..3600 => format!("{}m", secs.div_ceil(60)),
        _ => format!("{}h {}m", secs / 3600, (secs % 3600) / 60),
    }
}

/// Online members of both sides of a war.
fn participants(nations: &NationRegistry, war: &War) -> Vec<Uuid> {
    [war.attacker, war.defender]
        .iter()
        .filter_map(|id| nations.get(id))
        .flat_map(|n| n.members.keys().copied())
        .collect()
}

fn nation_name(nations: &NationRegistry, id: &Uuid) -> String {
    nations.get(id).map_or_else(|| "?".to_owned(), |n| n.name.clone())
}

/// The sender's nation (at least `min` rank) and the open war with `target`.
fn own_war(
    nations: &NationRegistry,
    wars: &WarRegistry,
    player: &Uuid,
    min: NationRole,
    target: &str,
) -> Result<(Uuid, Uuid), Failure> {
    let own = nations.authorize(player, min)?;
    let other = nations
        .find_by_name(target)
        .map(|n| n.id)
        .ok_or_else(|| NationError::NotFound(target.to_owned()))?;
    let war = wars.war_between(&own, &other).ok_or(WarError::NotFound)?;
    Ok((own, war.id))
}

impl WarExecutor {
    async fn run(&self, player: &Arc<Player>, server: &Server, args: &ConsumedArgs<'_>) -> Handled {
        let uuid = player.gameprofile.id;
        let now = unix_now();

        match self.action {
            WarAction::Declare => {
                let target = simple_arg(args, ARG_NATION)?;
                let reason = simple_arg(args, ARG_REASON).unwrap_or("No reason given").to_owned();
                let mut nations = self.state.nations.write().await;
                let own = nations.authorize(&uuid, NationRole::Officer)?;
                let other = nations
                    .find_by_name(target)
                    .map(|n| n.id)
                    .ok_or_else(|| NationError::NotFound(target.to_owned()))?;
                let declared = self.state.wars.write().await.declare(&mut nations, own, other, reason, now)?;
                let notified = participants(&nations, &declared.war);
                let (attacker, defender) = (nation_name(&nations, &own), nation_name(&nations, &other));
                drop(nations);

                let mut records = vec![Record::War(declared.war.clone()), Record::Relation(declared.relation)];
                if let Some(shield) = declared.dropped_shield {
                    records.push(Record::ShieldDropped(shield.nation));
                }
                log::info!(
                    "landclaims: '{attacker}' declared war on '{defender}' ({})",
                    declared.war.reason
                );
                let prep = format_duration(self.state.config.wars.preparation_secs);
                notify_members(
                    server,
                    &notified,
                    &format!(
                        "'{attacker}' has declared war on '{defender}': {}. Fighting starts in {prep}",
                        declared.war.reason
                    ),
                    NamedColor::DarkRed,
                )
                .await;
                Ok(Outcome::done(format!("War declared on '{defender}'"), records))
            }

            WarAction::Status => {
                let nations = self.state.nations.read().await;
                let own = nations
                    .nation_of(&uuid)
                    .map(|n| n.id)
                    .ok_or(NationError::NotInNation)?;
                let wars = self.state.wars.read().await;
                let open = wars.wars_of(&own);
                let mut msg = format!("--- Wars of {} ---", nation_name(&nations, &own));
                if open.is_empty() {
                    msg.push_str("\nAt peace");
                }
                for w in open {
                    let other = w.opponent(&own).map(|o| nation_name(&nations, &o)).unwrap_or_default();
                    let _ = write!(msg, "\n{other}: {} ({})", w.state, w.reason);
                    if let Some(left) = next_transition(w, wars.rules(), now) {
                        let next = match w.state {
                            WarState::Declared => "fighting starts",
                            _ => "ends",
                        };
                        let _ = write!(msg, ", {next} in {}", format_duration(left));
                    }
                    for t in wars.pending_tributes(&w.id) {
                        let _ = write!(
                            msg,
                            "\n  tribute of {} chunks offered by {}",
                            t.amount,
                            nation_name(&nations, &t.from_nation)
                        );
                    }
                }
                if let Some(shield) = wars.shield_of(&own, now) {
                    let _ = write!(
                        msg,
                        "\nWar shield: {}",
                        format_duration(shield.expires_at.saturating_sub(now))
                    );
                }
                Ok(Outcome::info(msg))
            }

            WarAction::List => {
                let nations = self.state.nations.read().await;
                let wars = self.state.wars.read().await;
                let open = wars.open_wars();
                if open.is_empty() {
                    return Ok(Outcome::info("There are no wars"));
                }
                let mut msg = format!("--- Wars ({}) ---", open.len());
                for w in open {
                    let _ = write!(
                        msg,
                        "\n{} vs {}: {}",
                        nation_name(&nations, &w.attacker),
                        nation_name(&nations, &w.defender),
                        w.state
                    );
                }
                Ok(Outcome::info(msg))
            }

            WarAction::Ceasefire | WarAction::Resume => {
                let target = simple_arg(args, ARG_NATION)?;
                let nations = self.state.nations.read().await;
                let mut wars = self.state.wars.write().await;
                let (own, war_id) = own_war(&nations, &wars, &uuid, NationRole::Officer, target)?;
                let (war, text) = if matches!(self.action, WarAction::Ceasefire) {
                    let left = format_duration(wars.rules().ceasefire_secs);
                    (
                        wars.ceasefire(&war_id, &own, now)?,
                        format!("A ceasefire has been called; the war ends in {left} unless resumed"),
                    )
                } else {
                    (wars.resume(&war_id, &own)?, "The war has resumed".to_owned())
                };
                drop(wars);
                let notified = participants(&nations, &war);
                drop(nations);
                notify_members(server, &notified, &text, NamedColor::Gold).await;
                Ok(Outcome::done(format!("War with '{target}' is now {}", war.state), vec![Record::War(war)]))
            }

            WarAction::Surrender => {
                let target = simple_arg(args, ARG_NATION)?;
                let mut nations = self.state.nations.write().await;
                let mut wars = self.state.wars.write().await;
                let (own, war_id) = own_war(&nations, &wars, &uuid, NationRole::Leader, target)?;
                let outcome = wars.surrender(&mut nations, &war_id, &own, now)?;
                drop(wars);
                let loser = nation_name(&nations, &own);
                let notified = participants(&nations, &outcome.war);
                drop(nations);
                log::info!("landclaims: '{loser}' surrendered to '{target}'");
                notify_members(
                    server,
                    &notified,
                    &format!("'{loser}' has surrendered; the war is over"),
                    NamedColor::Gold,
                )
                .await;
                Ok(Outcome::done(
                    format!("You surrendered to '{target}'"),
                    Record::from_outcome(&outcome),
                ))
            }

            WarAction::TributeOffer => {
                let target = simple_arg(args, ARG_NATION)?;
                let amount = amount_arg(args)?;
                let claims = self.state.claims.read().await;
                let nations = self.state.nations.read().await;
                let mut wars = self.state.wars.write().await;
                let (own, war_id) = own_war(&nations, &wars, &uuid, NationRole::Officer, target)?;
                let payer = nations.get(&own).map(|n| n.leader).ok_or(NationError::NotInNation)?;
                let available = claims.unallocated(&payer);
                if i64::from(amount) > available {
                    return Err(Failure::new(format!(
                        "Your leader has only {available} unallocated chunks to offer"
                    )));
                }
                let tribute = wars.offer_tribute(&war_id, own, amount, now)?;
                drop(wars);
                drop(claims);
                let receivers: Vec<Uuid> = nations
                    .get(&tribute.to_nation)
                    .map(|n| n.members.keys().copied().collect())
                    .unwrap_or_default();
                let from = nation_name(&nations, &own);
                drop(nations);
                notify_members(
                    server,
                    &receivers,
                    &format!("'{from}' offers a tribute of {amount} chunks. Use /war tribute accept {from}"),
                    NamedColor::Aqua,
                )
                .await;
                Ok(Outcome::done(
                    format!("Offered {amount} chunks to '{target}'"),
                    vec![Record::Tribute(tribute)],
                ))
            }

            WarAction::TributeAccept => {
                let target = simple_arg(args, ARG_NATION)?;
                let mut claims = self.state.claims.write().await;
                let mut nations = self.state.nations.write().await;
                let mut wars = self.state.wars.write().await;
                let (own, war_id) = own_war(&nations, &wars, &uuid, NationRole::Officer, target)?;
                let (from, amount) = wars
                    .pending_tributes(&war_id)
                    .iter()
                    .find(|t| t.to_nation == own)
                    .map(|t| (t.from_nation, t.amount))
                    .ok_or(WarError::NoPendingTribute)?;
                let payer = nations.get(&from).map(|n| n.leader).ok_or(WarError::NotParticipant)?;
                let receiver = nations.get(&own).map(|n| n.leader).ok_or(NationError::NotInNation)?;
                if i64::from(amount) > claims.unallocated(&payer) {
                    return Err(Failure::new(format!(
                        "'{target}' can no longer pay {amount} chunks; reject the tribute instead"
                    )));
                }
                let accepted = wars.accept_tribute(&mut nations, &war_id, &own, now)?;
                let (payer_pool, receiver_pool) = claims.transfer_credits(payer, receiver, amount)?;
                drop(wars);
                drop(claims);
                let notified = participants(&nations, &accepted.outcome.war);
                let winner = nation_name(&nations, &own);
                drop(nations);

                let mut records = Record::from_outcome(&accepted.outcome);
                records.push(Record::Tribute(accepted.tribute));
                records.push(Record::Pool(payer_pool));
                records.push(Record::Pool(receiver_pool));
                log::info!("landclaims: '{winner}' accepted a tribute of {amount} chunks from '{target}'");
                notify_members(
                    server,
                    &notified,
                    &format!("'{winner}' accepted a tribute of {amount} chunks; the war is over"),
                    NamedColor::Gold,
                )
                .await;
                Ok(Outcome::done(format!("Tribute of {amount} chunks accepted"), records))
            }

            WarAction::TributeReject => {
                let target = simple_arg(args, ARG_NATION)?;
                let nations = self.state.nations.read().await;
                let mut wars = self.state.wars.write().await;
                let (own, war_id) = own_war(&nations, &wars, &uuid, NationRole::Officer, target)?;
                let tribute = wars.reject_tribute(&war_id, &own)?;
                drop(wars);
                let payers: Vec<Uuid> = nations
                    .get(&tribute.from_nation)
                    .map(|n| n.members.keys().copied().collect())
                    .unwrap_or_default();
                let by = nation_name(&nations, &own);
                drop(nations);
                notify_members(
                    server,
                    &payers,
                    &format!("'{by}' rejected your tribute"),
                    NamedColor::Red,
                )
                .await;
                Ok(Outcome::done(format!("Tribute from '{target}' rejected"), vec![Record::Tribute(tribute)]))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_countdown_per_state() {
        let rules = WarRules::default();
        let mut war = War::new(Uuid::new_v4(), Uuid::new_v4(), "x".into(), 100);
        assert_eq!(next_transition(&war, &rules, 160), Some(rules.preparation_secs - 60));

        war.state = WarState::Active;
        assert_eq!(next_transition(&war, &rules, 160), None);
        war.started_at = Some(700);
        assert_eq!(next_transition(&war, &rules, 700), Some(rules.max_duration_secs));

        war.state = WarState::Ceasefire;
        war.ceasefire_at = Some(1000);
        assert_eq!(next_transition(&war, &rules, 5000), Some(0));

        war.state = WarState::Ended;
        assert_eq!(next_transition(&war, &rules, 5000), None);
    }

    #[test]
    fn durations_read_naturally() {
        assert_eq!(format_duration(42), "42s");
        assert_eq!(format_duration(61), "2m");
        assert_eq!(format_duration(3 * 3600 + 120), "3h 2m");
    }
}
