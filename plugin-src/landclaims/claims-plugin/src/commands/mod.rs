//! Chat commands.
//!
//! Player commands (landclaims:use):
//!   /claim create|delete|list|info|add|remove|addchunks|removechunks|pool
//!   /claim trust|untrust|ban|unban|member|set|rename|transfer|show
//!
//! Admin commands (landclaims:admin):
//!   /claimadmin migrate|migrateall|givechunks|setpurchased|repair|inspect|endwar
//!
//! Nation commands (landclaims:nation), war commands (landclaims:war):
//!   /nation ..., /war ...

mod admin;
mod claim;
mod nation;
mod war;

use crate::state::{PluginState, Record};
use claims_engine::{ClaimError, NationError, WarError};
use pumpkin::command::args::bounded_num::BoundedNumArgumentConsumer;
use pumpkin::command::args::players::PlayersArgumentConsumer;
use pumpkin::command::args::simple::SimpleArgConsumer;
use pumpkin::command::args::{Arg, ConsumedArgs, FindArg};
use pumpkin::command::tree::CommandTree;
use pumpkin::command::tree::builder::{argument, literal};
use pumpkin::command::CommandSender;
use pumpkin::entity::player::Player;
use pumpkin::server::Server;
use pumpkin_util::text::TextComponent;
use pumpkin_util::text::color::NamedColor;
use std::sync::Arc;
use uuid::Uuid;

use admin::{AdminAction, AdminExecutor};
use claim::{ClaimAction, ClaimExecutor};
use nation::{NationAction, NationExecutor};
use war::{WarAction, WarExecutor};

const ARG_NAME: &str = "name";
const ARG_NEW_NAME: &str = "new_name";
const ARG_PLAYER: &str = "player";
const ARG_AMOUNT: &str = "amount";
const ARG_GROUP: &str = "group";
const ARG_SETTING: &str = "setting";
const ARG_VALUE: &str = "value";
const ARG_NATION: &str = "nation";
const ARG_REASON: &str = "reason";

/// Result of a command that ran: a chat line plus records to persist.
pub(crate) struct Outcome {
    message: String,
    color: NamedColor,
    records: Vec<Record>,
}

impl Outcome {
    pub(crate) fn done(message: impl Into<String>, records: Vec<Record>) -> Self {
        Self {
            message: message.into(),
            color: NamedColor::Green,
            records,
        }
    }

    pub(crate) fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            color: NamedColor::Aqua,
            records: Vec::new(),
        }
    }
}

/// A refused command; the text goes to the sender in red.
pub(crate) struct Failure(String);

impl Failure {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<ClaimError> for Failure {
    fn from(e: ClaimError) -> Self {
        Self(e.to_string())
    }
}

impl From<NationError> for Failure {
    fn from(e: NationError) -> Self {
        Self(e.to_string())
    }
}

impl From<WarError> for Failure {
    fn from(e: WarError) -> Self {
        Self(e.to_string())
    }
}

pub(crate) type Handled = Result<Outcome, Failure>;

/// Send the outcome to the sender, persisting its records first.
pub(crate) async fn respond(state: &PluginState, sender: &CommandSender, result: Handled) -> i32 {
    match result {
        Ok(outcome) => {
            let saved = state.save(outcome.records).await;
            sender
                .send_message(TextComponent::text(outcome.message).color_named(outcome.color))
                .await;
            if saved.is_err() {
                sender
                    .send_message(
                        TextComponent::text("The change could not be saved; check the server logs")
                            .color_named(NamedColor::Red),
                    )
                    .await;
                return 0;
            }
            1
        }
        Err(Failure(message)) => {
            sender
                .send_message(TextComponent::text(message).color_named(NamedColor::Red))
                .await;
            0
        }
    }
}

pub(crate) fn require_player(sender: &CommandSender) -> Result<Arc<Player>, Failure> {
    sender
        .as_player()
        .ok_or_else(|| Failure::new("Only players can use this command"))
}

pub(crate) fn simple_arg<'a>(args: &'a ConsumedArgs<'a>, name: &str) -> Result<&'a str, Failure> {
    match args.get(name) {
        Some(Arg::Simple(s)) => Ok(*s),
        _ => Err(Failure::new(format!("Missing <{name}>"))),
    }
}

pub(crate) fn amount_arg(args: &ConsumedArgs<'_>) -> Result<u32, Failure> {
    match BoundedNumArgumentConsumer::<i32>::find_arg(args, ARG_AMOUNT) {
        Ok(Ok(v)) => u32::try_from(v).map_err(|_| Failure::new("Amount must not be negative")),
        _ => Err(Failure::new("Amount must be a whole number")),
    }
}

pub(crate) fn player_arg(args: &ConsumedArgs<'_>) -> Result<Arc<Player>, Failure> {
    match PlayersArgumentConsumer::find_arg(args, ARG_PLAYER) {
        Ok(players) => players
            .first()
            .cloned()
            .ok_or_else(|| Failure::new("No matching player online")),
        Err(_) => Err(Failure::new("No matching player online")),
    }
}

/// Online player name, or a shortened uuid.
pub(crate) fn display_name(server: &Server, uuid: Uuid) -> String {
    server.get_player_by_uuid(uuid).map_or_else(
        || uuid.to_string().chars().take(8).collect(),
        |p| p.gameprofile.name.clone(),
    )
}

/// Message every online member of a nation.
pub(crate) async fn notify_members(server: &Server, members: &[Uuid], message: &str, color: NamedColor) {
    for uuid in members {
        if let Some(player) = server.get_player_by_uuid(*uuid) {
            player
                .send_system_message(&TextComponent::text(message.to_owned()).color_named(color))
                .await;
        }
    }
}

fn amount_consumer() -> BoundedNumArgumentConsumer<i32> {
    BoundedNumArgumentConsumer::<i32>::new().min(0).name(ARG_AMOUNT)
}

/// Build the player command tree (`/claim`).
pub fn build_claim_tree(state: &PluginState) -> CommandTree {
    let exec = |action| ClaimExecutor::new(state, action);
    let on_claim_player = |name: &'static str, action| {
        literal(name).then(
            argument(ARG_NAME, SimpleArgConsumer)
                .then(argument(ARG_PLAYER, PlayersArgumentConsumer).execute(exec(action))),
        )
    };
    let on_claim_amount = |name: &'static str, action| {
        literal(name).then(
            argument(ARG_NAME, SimpleArgConsumer)
                .then(argument(ARG_AMOUNT, amount_consumer()).execute(exec(action))),
        )
    };

    CommandTree::new(["claim"], "Land claims")
        .then(
            literal("create")
                .then(argument(ARG_NAME, SimpleArgConsumer).execute(exec(ClaimAction::Create))),
        )
        .then(
            literal("delete")
                .then(argument(ARG_NAME, SimpleArgConsumer).execute(exec(ClaimAction::Delete))),
        )
        .then(literal("list").execute(exec(ClaimAction::List)))
        .then(literal("info").execute(exec(ClaimAction::Info)))
        .then(
            literal("add")
                .then(argument(ARG_NAME, SimpleArgConsumer).execute(exec(ClaimAction::Add))),
        )
        .then(literal("remove").execute(exec(ClaimAction::Remove)))
        .then(on_claim_amount("addchunks", ClaimAction::AddChunks))
        .then(on_claim_amount("removechunks", ClaimAction::RemoveChunks))
        .then(literal("pool").execute(exec(ClaimAction::Pool)))
        .then(on_claim_player("trust", ClaimAction::Trust))
        .then(on_claim_player("untrust", ClaimAction::Untrust))
        .then(on_claim_player("ban", ClaimAction::Ban))
        .then(on_claim_player("unban", ClaimAction::Unban))
        .then(on_claim_player("transfer", ClaimAction::Transfer))
        .then(
            literal("member").then(
                argument(ARG_NAME, SimpleArgConsumer).then(
                    argument(ARG_PLAYER, PlayersArgumentConsumer).then(
                        argument(ARG_GROUP, SimpleArgConsumer).execute(exec(ClaimAction::Member)),
                    ),
                ),
            ),
        )
        .then(
            literal("set").then(
                argument(ARG_NAME, SimpleArgConsumer).then(
                    argument(ARG_SETTING, SimpleArgConsumer).then(
                        argument(ARG_VALUE, SimpleArgConsumer).execute(exec(ClaimAction::Set)),
                    ),
                ),
            ),
        )
        .then(
            literal("rename").then(
                argument(ARG_NAME, SimpleArgConsumer).then(
                    argument(ARG_NEW_NAME, SimpleArgConsumer).execute(exec(ClaimAction::Rename)),
                ),
            ),
        )
        .then(
            literal("show")
                .execute(exec(ClaimAction::Show))
                .then(argument(ARG_NAME, SimpleArgConsumer).execute(exec(ClaimAction::Show))),
        )
}

/// Build the admin command tree (`/claimadmin`).
pub fn build_admin_tree(state: &PluginState) -> CommandTree {
    let exec = |action| AdminExecutor::new(state, action);
    let on_player_amount = |name: &'static str, action| {
        literal(name).then(
            argument(ARG_PLAYER, PlayersArgumentConsumer)
                .then(argument(ARG_AMOUNT, amount_consumer()).execute(exec(action))),
        )
    };

    CommandTree::new(["claimadmin"], "Land claim administration")
        .then(
            literal("migrate")
                .then(argument(ARG_PLAYER, PlayersArgumentConsumer).execute(exec(AdminAction::Migrate))),
        )
        .then(literal("migrateall").execute(exec(AdminAction::MigrateAll)))
        .then(on_player_amount("givechunks", AdminAction::GiveChunks))
        .then(on_player_amount("setpurchased", AdminAction::SetPurchased))
        .then(
            literal("repair")
                .then(argument(ARG_PLAYER, PlayersArgumentConsumer).execute(exec(AdminAction::Repair))),
        )
        .then(
            literal("inspect")
                .then(argument(ARG_PLAYER, PlayersArgumentConsumer).execute(exec(AdminAction::Inspect))),
        )
        .then(
            literal("endwar")
                .then(argument(ARG_NATION, SimpleArgConsumer).execute(exec(AdminAction::EndWar))),
        )
}

/// Build the nation command tree (`/nation`).
pub fn build_nation_tree(state: &PluginState) -> CommandTree {
    let exec = |action| NationExecutor::new(state, action);
    let on_nation = |name: &'static str, action| {
        literal(name).then(argument(ARG_NATION, SimpleArgConsumer).execute(exec(action)))
    };
    let on_player = |name: &'static str, action| {
        literal(name).then(argument(ARG_PLAYER, PlayersArgumentConsumer).execute(exec(action)))
    };
    let on_claim = |name: &'static str, action| {
        literal(name).then(argument(ARG_NAME, SimpleArgConsumer).execute(exec(action)))
    };

    CommandTree::new(["nation"], "Nations and diplomacy")
        .then(on_nation("create", NationAction::Create))
        .then(literal("disband").execute(exec(NationAction::Disband)))
        .then(on_player("invite", NationAction::Invite))
        .then(on_nation("join", NationAction::Join))
        .then(literal("leave").execute(exec(NationAction::Leave)))
        .then(on_player("kick", NationAction::Kick))
        .then(on_player("promote", NationAction::Promote))
        .then(on_player("demote", NationAction::Demote))
        .then(on_claim("claim", NationAction::AddClaim))
        .then(on_claim("unclaim", NationAction::RemoveClaim))
        .then(on_nation("ally", NationAction::Ally))
        .then(on_nation("enemy", NationAction::Enemy))
        .then(on_nation("neutral", NationAction::Neutral))
        .then(
            literal("info")
                .execute(exec(NationAction::Info))
                .then(argument(ARG_NATION, SimpleArgConsumer).execute(exec(NationAction::Info))),
        )
        .then(literal("list").execute(exec(NationAction::List)))
}

/// Build the war command tree (`/war`).
pub fn build_war_tree(state: &PluginState) -> CommandTree {
    let exec = |action| WarExecutor::new(state, action);
    let on_nation = |name: &'static str, action| {
        literal(name).then(argument(ARG_NATION, SimpleArgConsumer).execute(exec(action)))
    };

    CommandTree::new(["war"], "Wars between nations")
        .then(
            literal("declare").then(
                argument(ARG_NATION, SimpleArgConsumer)
                    .execute(exec(WarAction::Declare))
                    .then(argument(ARG_REASON, SimpleArgConsumer).execute(exec(WarAction::Declare))),
            ),
        )
        .then(literal("status").execute(exec(WarAction::Status)))
        .then(literal("list").execute(exec(WarAction::List)))
        .then(on_nation("ceasefire", WarAction::Ceasefire))
        .then(on_nation("resume", WarAction::Resume))
        .then(on_nation("surrender", WarAction::Surrender))
        .then(
            literal("tribute")
                .then(
                    literal("offer").then(
                        argument(ARG_NATION, SimpleArgConsumer).then(
                            argument(ARG_AMOUNT, amount_consumer()).execute(exec(WarAction::TributeOffer)),
                        ),
                    ),
                )
                .then(on_nation("accept", WarAction::TributeAccept))
                .then(on_nation("reject", WarAction::TributeReject)),
        )
}
