//! `/claimadmin ...` commands.

use super::{ARG_NATION, Failure, Handled, Outcome, amount_arg, notify_members, player_arg, respond, simple_arg};
use crate::state::{PluginState, Record};
use claims_engine::{Migration, NationError};
use claims_types::unix_now;
use pumpkin::command::args::ConsumedArgs;
use pumpkin::command::{CommandExecutor, CommandResult, CommandSender};
use pumpkin::server::Server;
use pumpkin_util::text::color::NamedColor;
use std::fmt::Write as _;

#[derive(Debug, Clone, Copy)]
pub enum AdminAction {
    Migrate,
    MigrateAll,
    GiveChunks,
    SetPurchased,
    Repair,
    Inspect,
    EndWar,
}

pub struct AdminExecutor {
    state: PluginState,
    action: AdminAction,
}

impl AdminExecutor {
    pub fn new(state: &PluginState, action: AdminAction) -> Self {
        Self {
            state: state.clone(),
            action,
        }
    }
}

impl CommandExecutor for AdminExecutor {
    fn execute<'a>(
        &'a self,
        sender: &'a CommandSender,
        server: &'a Server,
        args: &'a ConsumedArgs<'a>,
    ) -> CommandResult<'a> {
        Box::pin(async move {
            let result = self.run(server, args).await;
            Ok(respond(&self.state, sender, result).await)
        })
    }
}

fn migration_records(m: &Migration) -> Vec<Record> {
    let mut records: Vec<Record> = m.claims.iter().cloned().map(Record::Claim).collect();
    records.push(Record::Pool(m.pool.clone()));
    records
}

fn log_migration(m: &Migration) {
    let r = &m.report;
    if !r.drift_tolerated() {
        log::warn!(
            "landclaims: migration of {} drifted by {} credits across {} claims",
            m.player,
            r.rounding_drift,
            r.allocations.len()
        );
    }
    if r.pool_corrected() {
        log::warn!(
            "landclaims: purchased credits of {} raised from {} to {} to cover claimed chunks",
            m.player,
            r.purchased_before,
            r.purchased_after
        );
    }
    log::info!(
        "landclaims: migrated {} ({} claims, {} purchased, {} repaired)",
        m.player,
        r.allocations.len(),
        r.purchased_after,
        r.repaired
    );
}

impl AdminExecutor {
    async fn run(&self, server: &Server, args: &ConsumedArgs<'_>) -> Handled {
        match self.action {
            AdminAction::Migrate => {
                let target = player_arg(args)?;
                let m = self.state.claims.write().await.migrate(&target.gameprofile.id);
                log_migration(&m);
                Ok(Outcome::done(
                    format!(
                        "Migrated {}: {} purchased chunks over {} claims (drift {}, repaired {})",
                        target.gameprofile.name,
                        m.report.purchased_after,
                        m.claims.len(),
                        m.report.rounding_drift,
                        m.report.repaired
                    ),
                    migration_records(&m),
                ))
            }

            AdminAction::MigrateAll => {
                let migrations = self.state.claims.write().await.migrate_all();
                let mut records = Vec::new();
                let mut drifted = 0;
                for m in &migrations {
                    log_migration(m);
                    if !m.report.drift_tolerated() {
                        drifted += 1;
                    }
                    records.extend(migration_records(m));
                }
                Ok(Outcome::done(
                    format!("Migrated {} players ({drifted} with unexpected drift)", migrations.len()),
                    records,
                ))
            }

            AdminAction::GiveChunks => {
                let target = player_arg(args)?;
                let amount = amount_arg(args)?;
                let pool = self.state.claims.write().await.grant(target.gameprofile.id, amount, false);
                log::info!("landclaims: granted {amount} bonus chunks to {}", target.gameprofile.name);
                Ok(Outcome::done(
                    format!(
                        "Gave {amount} bonus chunks to {} (total {})",
                        target.gameprofile.name,
                        pool.total_credits()
                    ),
                    vec![Record::Pool(pool)],
                ))
            }

            AdminAction::SetPurchased => {
                let target = player_arg(args)?;
                let amount = amount_arg(args)?;
                let pool = self.state.claims.write().await.set_purchased(target.gameprofile.id, amount);
                log::info!("landclaims: purchased chunks of {} set to {amount}", target.gameprofile.name);
                Ok(Outcome::done(
                    format!(
                        "Purchased chunks of {} set to {amount}; run /claimadmin migrate to redistribute",
                        target.gameprofile.name
                    ),
                    vec![Record::Pool(pool)],
                ))
            }

            AdminAction::Repair => {
                let target = player_arg(args)?;
                let repairs = self.state.claims.write().await.repair_player(&target.gameprofile.id);
                if repairs.is_empty() {
                    return Ok(Outcome::info(format!("No claim of {} is over capacity", target.gameprofile.name)));
                }
                let mut msg = format!("Repaired {} claims of {}:", repairs.len(), target.gameprofile.name);
                for r in &repairs {
                    let _ = write!(msg, "\n{}: +{} chunks", r.claim.name, r.covered);
                    if r.uncovered > 0 {
                        let _ = write!(msg, " ({} still over capacity)", r.uncovered);
                        log::warn!(
                            "landclaims: claim {} of {} remains {} chunks over capacity",
                            r.claim.id,
                            target.gameprofile.name,
                            r.uncovered
                        );
                    }
                }
                let records = repairs.into_iter().map(|r| Record::Claim(r.claim)).collect();
                Ok(Outcome::done(msg, records))
            }

            AdminAction::Inspect => {
                let target = player_arg(args)?;
                let uuid = target.gameprofile.id;
                let claims = self.state.claims.read().await;
                let pool = claims.pool(&uuid);
                let mut msg = format!(
                    "--- {} ---\n\
                     Purchased: {}  Bonus: {}  Unallocated: {}",
                    target.gameprofile.name,
                    pool.purchased_chunks,
                    pool.bonus_chunks,
                    claims.unallocated(&uuid)
                );
                for c in claims.claims_of(&uuid) {
                    let _ = write!(
                        msg,
                        "\n{} [{}]: {}/{} chunks, {} purchased",
                        c.name,
                        c.world,
                        c.chunk_count(),
                        c.total_chunks,
                        c.purchased_chunks
                    );
                    if c.deficit() > 0 {
                        let _ = write!(msg, ", {} over capacity", c.deficit());
                    }
                }
                if let Some(nation) = self.state.nations.read().await.nation_of(&uuid) {
                    let _ = write!(msg, "\nNation: {}", nation.name);
                }
                if let Some(err) = self.state.last_error() {
                    let _ = write!(msg, "\nLast save error: {err}");
                }
                Ok(Outcome::info(msg))
            }

            AdminAction::EndWar => {
                let name = simple_arg(args, ARG_NATION)?;
                let now = unix_now();
                let mut nations = self.state.nations.write().await;
                let nation = nations
                    .find_by_name(name)
                    .map(|n| n.id)
                    .ok_or_else(|| NationError::NotFound(name.to_owned()))?;
                let mut wars = self.state.wars.write().await;
                let ids: Vec<_> = wars.wars_of(&nation).iter().map(|w| w.id).collect();
                if ids.is_empty() {
                    return Err(Failure::new(format!("{name} is not at war")));
                }
                let mut records = Vec::new();
                let mut notified = Vec::new();
                for id in ids {
                    let outcome = wars.end(&mut nations, &id, None, now)?;
                    log::info!("landclaims: war {} ended by an administrator", outcome.war.id);
                    for side in [outcome.war.attacker, outcome.war.defender] {
                        if let Some(n) = nations.get(&side) {
                            notified.extend(n.members.keys().copied());
                        }
                    }
                    records.extend(Record::from_outcome(&outcome));
                }
                drop(wars);
                drop(nations);
                notified.sort_unstable();
                notified.dedup();
                notify_members(server, &notified, "An administrator has ended your war", NamedColor::Gold).await;
                Ok(Outcome::done(format!("Ended every open war of {name}"), records))
            }
        }
    }
}
