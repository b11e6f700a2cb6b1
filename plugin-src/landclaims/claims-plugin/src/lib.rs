//! LandClaims plugin for Pumpkin
//!
//! - Chunk claims with per-claim capacity funded from a player credit pool
//! - Trust, bans, member groups and protection settings per claim
//! - Nations with ranks, shared claims and diplomacy
//! - Wars with preparation, ceasefire, tributes and post-war shields
//! - Particle outlines of claim borders
//!
//! State lives in memory and is written through to PostgreSQL after every
//! change.

#![allow(improper_ctypes_definitions)]

mod border;
mod commands;
mod config;
mod events;
mod events_pvp;
mod protection;
mod service;
mod state;

use pumpkin::plugin::api::events::block::block_break::BlockBreakEvent;
use pumpkin::plugin::api::events::player::player_attack::PlayerAttackEvent;
use pumpkin::plugin::api::events::player::player_interact_event::PlayerInteractEvent;
use pumpkin::plugin::api::events::player::player_join::PlayerJoinEvent;
use pumpkin::plugin::api::events::player::player_leave::PlayerLeaveEvent;
use pumpkin::plugin::api::events::player::player_move::PlayerMoveEvent;
use pumpkin::plugin::api::{Context, EventPriority};
use pumpkin::plugin::{Plugin, PluginMetadata};
use pumpkin::server::Server;
use pumpkin_util::permission::{Permission, PermissionDefault, PermissionLvl};
use pumpkin_util::text::color::NamedColor;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use std::{future::Future, pin::Pin};
use tokio::sync::RwLock;
use tokio::task::AbortHandle;

use claims_engine::{ClaimRegistry, NationRegistry, WarRegistry};
use claims_types::{WarState, unix_now};
use config::LandClaimsConfig;
use state::{PluginState, Record};

// ---------------------------------------------------------------------------
// Plugin exports required by Pumpkin native loader
// ---------------------------------------------------------------------------

#[unsafe(no_mangle)]
pub static PUMPKIN_API_VERSION: u32 = pumpkin::plugin::PLUGIN_API_VERSION;

#[unsafe(no_mangle)]
pub static METADATA: PluginMetadata<'static> = PluginMetadata {
    name: "landclaims",
    version: env!("CARGO_PKG_VERSION"),
    authors: "LandClaims",
    description: "Chunk land claims with nations and wars",
};

#[unsafe(no_mangle)]
pub extern "C" fn plugin() -> Box<dyn Plugin> {
    Box::new(LandClaimsPlugin::new())
}

// ---------------------------------------------------------------------------
// Plugin struct
// ---------------------------------------------------------------------------

pub struct LandClaimsPlugin {
    runtime: Arc<tokio::runtime::Runtime>,
    state: Option<PluginState>,
    war_ticker: Option<AbortHandle>,
}

impl LandClaimsPlugin {
    fn new() -> Self {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .thread_name("landclaims-rt")
            .build()
            .expect("landclaims: failed to create tokio runtime");

        Self {
            runtime: Arc::new(runtime),
            state: None,
            war_ticker: None,
        }
    }
}

/// Everything persisted, loaded into the three registries.
async fn load_registries(
    pool: &sqlx::PgPool,
    config: &LandClaimsConfig,
) -> Result<(ClaimRegistry, NationRegistry, WarRegistry), String> {
    let claims = claims_db::claims::load_claims(pool).await?;
    let pools = claims_db::claims::load_pools(pool).await?;
    let nations = claims_db::nations::load_nations(pool).await?;
    let relations = claims_db::nations::load_relations(pool).await?;
    let wars = claims_db::nations::load_wars(pool).await?;
    let tributes = claims_db::nations::load_tributes(pool).await?;
    let shields = claims_db::nations::load_shields(pool).await?;

    let (pool_count, nation_count, war_count) = (pools.len(), nations.len(), wars.len());
    let claims = ClaimRegistry::load(config.claim_rules(), claims, pools);
    log::info!(
        "landclaims: Loaded {} claims over {} chunks, {} pools, {} nations, {} wars",
        claims.claim_count(),
        claims.chunk_count(),
        pool_count,
        nation_count,
        war_count
    );
    Ok((
        claims,
        NationRegistry::load(config.nation_rules(), nations, relations),
        WarRegistry::load(config.war_rules(), wars, tributes, shields),
    ))
}

/// Advance war timers every `wars.tick_secs` and announce what changed.
fn spawn_war_ticker(state: PluginState, server: Arc<Server>) -> AbortHandle {
    let period = Duration::from_secs(state.config.wars.tick_secs);
    let runtime = Arc::clone(&state.runtime);
    runtime
        .spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let mut announcements = Vec::new();
                let mut records = Vec::new();
                {
                    let mut nations = state.nations.write().await;
                    let outcomes = state.wars.write().await.advance(&mut nations, unix_now());
                    for outcome in &outcomes {
                        let war = &outcome.war;
                        let name = |id| nations.get(id).map_or("?", |n| n.name.as_str()).to_owned();
                        let (attacker, defender) = (name(&war.attacker), name(&war.defender));
                        let message = if war.state == WarState::Active {
                            format!("The war between '{attacker}' and '{defender}' has begun")
                        } else {
                            format!("The war between '{attacker}' and '{defender}' is over")
                        };
                        log::info!("landclaims: war {} {} -> {}", war.id, outcome.from, war.state);
                        let members: Vec<_> = [war.attacker, war.defender]
                            .iter()
                            .filter_map(|id| nations.get(id))
                            .flat_map(|n| n.members.keys().copied())
                            .collect();
                        announcements.push((members, message));
                        records.extend(Record::from_outcome(outcome));
                    }
                }
                // Failures are logged and kept for /claimadmin inspect.
                let _ = state.save(records).await;
                for (members, message) in announcements {
                    commands::notify_members(&server, &members, &message, NamedColor::DarkRed).await;
                }
            }
        })
        .abort_handle()
}

impl Plugin for LandClaimsPlugin {
    fn on_load(
        &mut self,
        context: Arc<Context>,
    ) -> Pin<Box<dyn Future<Output = Result<(), String>> + Send + '_>> {
        // Load config
        let data_folder = context.get_data_folder();
        let config_path = data_folder.join("config.toml");
        let config = match LandClaimsConfig::load(&config_path) {
            Ok(c) => c,
            Err(e) => {
                log::error!("landclaims: Failed to load config: {e}");
                return Box::pin(async move { Err(e) });
            }
        };

        // Connect to DB
        let pool = match self.runtime.block_on(claims_db::connect(&config.database.url)) {
            Ok(p) => p,
            Err(e) => {
                log::error!("landclaims: DB connect failed: {e}");
                return Box::pin(async move { Err(e) });
            }
        };

        if let Err(e) = self.runtime.block_on(claims_db::migrate(&pool)) {
            log::error!("landclaims: Migration failed: {e}");
            return Box::pin(async move { Err(e) });
        }

        let (claims, nations, wars) = match self.runtime.block_on(load_registries(&pool, &config)) {
            Ok(r) => r,
            Err(e) => {
                log::error!("landclaims: Failed to load state from DB: {e}");
                return Box::pin(async move { Err(e) });
            }
        };

        let plugin_state = PluginState {
            runtime: Arc::clone(&self.runtime),
            db_pool: Arc::new(std::sync::RwLock::new(Some(pool))),
            config: Arc::new(config),
            claims: Arc::new(RwLock::new(claims)),
            nations: Arc::new(RwLock::new(nations)),
            wars: Arc::new(RwLock::new(wars)),
            player_claims: Arc::new(Mutex::new(HashMap::new())),
            border_tasks: Arc::new(Mutex::new(HashMap::new())),
            last_error: Arc::new(Mutex::new(None)),
        };
        self.state = Some(plugin_state.clone());
        self.war_ticker = Some(spawn_war_ticker(plugin_state.clone(), Arc::clone(&context.server)));

        Box::pin(async move {
            // Register permissions
            for (node, description, default) in [
                ("landclaims:use", "Claim commands", PermissionDefault::Allow),
                (
                    protection::ADMIN_PERMISSION,
                    "Claim administration and protection bypass",
                    PermissionDefault::Op(PermissionLvl::Four),
                ),
                ("landclaims:nation", "Nation commands", PermissionDefault::Allow),
                ("landclaims:war", "War commands", PermissionDefault::Allow),
            ] {
                context
                    .register_permission(Permission::new(node, description, default))
                    .await
                    .ok();
            }

            // Register commands: /claim, /claimadmin, /nation, /war
            context
                .register_command(commands::build_claim_tree(&plugin_state), "landclaims:use")
                .await;
            context
                .register_command(commands::build_admin_tree(&plugin_state), protection::ADMIN_PERMISSION)
                .await;
            context
                .register_command(commands::build_nation_tree(&plugin_state), "landclaims:nation")
                .await;
            context
                .register_command(commands::build_war_tree(&plugin_state), "landclaims:war")
                .await;

            // Register event handlers
            context
                .register_event::<PlayerJoinEvent, _>(
                    Arc::new(events::ClaimJoinHandler {
                        state: plugin_state.clone(),
                    }),
                    EventPriority::Normal,
                    false,
                )
                .await;
            context
                .register_event::<PlayerLeaveEvent, _>(
                    Arc::new(events::ClaimLeaveHandler {
                        state: plugin_state.clone(),
                    }),
                    EventPriority::Normal,
                    false,
                )
                .await;
            context
                .register_event::<PlayerMoveEvent, _>(
                    Arc::new(events::ClaimMoveHandler {
                        state: plugin_state.clone(),
                    }),
                    EventPriority::Normal,
                    true,
                )
                .await;
            context
                .register_event::<BlockBreakEvent, _>(
                    Arc::new(events::ClaimBreakHandler {
                        state: plugin_state.clone(),
                    }),
                    EventPriority::Normal,
                    true,
                )
                .await;
            context
                .register_event::<PlayerInteractEvent, _>(
                    Arc::new(events::ClaimInteractHandler {
                        state: plugin_state.clone(),
                    }),
                    EventPriority::Normal,
                    true,
                )
                .await;
            context
                .register_event::<PlayerAttackEvent, _>(
                    Arc::new(events_pvp::ClaimPvpHandler {
                        state: plugin_state.clone(),
                    }),
                    EventPriority::High,
                    true,
                )
                .await;

            // Register claim service for other plugins
            context
                .register_service(
                    "landclaims_service",
                    Arc::new(service::ClaimService::new(&plugin_state)),
                )
                .await;

            log::info!("landclaims: Loaded successfully");
            Ok(())
        })
    }

    fn on_unload(
        &mut self,
        _context: Arc<Context>,
    ) -> Pin<Box<dyn Future<Output = Result<(), String>> + Send + '_>> {
        Box::pin(async move {
            if let Some(ticker) = self.war_ticker.take() {
                ticker.abort();
            }
            if let Some(state) = self.state.take() {
                state.stop_all_borders();
                let pool = state.db_pool.write().ok().and_then(|mut p| p.take());
                if let Some(pool) = pool {
                    if let Err(e) = state.runtime.spawn(async move { pool.close().await }).await {
                        log::warn!("landclaims: closing the database pool failed: {e}");
                    } else {
                        log::info!("landclaims: Database connection closed");
                    }
                }
                if let Ok(mut map) = state.player_claims.lock() {
                    map.clear();
                }
            }
            log::info!("landclaims: Unloaded");
            Ok(())
        })
    }
}
