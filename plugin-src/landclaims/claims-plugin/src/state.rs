//! Shared plugin state and write-through persistence.

use crate::config::LandClaimsConfig;
use claims_db::{claims, nations};
use claims_engine::{ClaimRegistry, NationRegistry, WarOutcome, WarRegistry};
use claims_types::{Claim, Nation, NationRelation, PlayerChunkPool, War, WarShield, WarTribute};
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;
use tokio::task::AbortHandle;
use uuid::Uuid;

/// One record to write back after a registry change.
#[derive(Debug, Clone)]
pub enum Record {
    Claim(Claim),
    ClaimDeleted(Uuid),
    Pool(PlayerChunkPool),
    Nation(Nation),
    NationDeleted(Uuid),
    Relation(NationRelation),
    RelationCleared(Uuid, Uuid),
    War(War),
    Tribute(WarTribute),
    Shield(WarShield),
    ShieldDropped(Uuid),
}

impl Record {
    async fn write(&self, pool: &PgPool) -> Result<(), String> {
        match self {
            Self::Claim(c) => claims::save_claim(pool, c).await,
            Self::ClaimDeleted(id) => claims::delete_claim(pool, *id).await,
            Self::Pool(p) => claims::save_pool(pool, p).await,
            Self::Nation(n) => nations::save_nation(pool, n).await,
            Self::NationDeleted(id) => nations::delete_nation(pool, *id).await,
            Self::Relation(r) => nations::save_relation(pool, r).await,
            Self::RelationCleared(a, b) => nations::delete_relation(pool, *a, *b).await,
            Self::War(w) => nations::save_war(pool, w).await,
            Self::Tribute(t) => nations::save_tribute(pool, t).await,
            Self::Shield(s) => nations::save_shield(pool, s).await,
            Self::ShieldDropped(n) => nations::delete_shield(pool, *n).await,
        }
    }

    /// Everything a war state change touches.
    #[must_use]
    pub fn from_outcome(outcome: &WarOutcome) -> Vec<Self> {
        let mut out = vec![Self::War(outcome.war.clone())];
        out.extend(outcome.relation.iter().cloned().map(Self::Relation));
        out.extend(outcome.shields.iter().cloned().map(Self::Shield));
        out.extend(outcome.closed_tributes.iter().cloned().map(Self::Tribute));
        out
    }
}

/// Shared state passed to event handlers, command executors and tasks.
///
/// Lock order when more than one registry is held: claims, nations, wars.
#[derive(Clone)]
pub struct PluginState {
    pub runtime: Arc<tokio::runtime::Runtime>,
    pub db_pool: Arc<std::sync::RwLock<Option<PgPool>>>,
    pub config: Arc<LandClaimsConfig>,
    pub claims: Arc<RwLock<ClaimRegistry>>,
    pub nations: Arc<RwLock<NationRegistry>>,
    pub wars: Arc<RwLock<WarRegistry>>,
    /// Claim each online player currently stands in.
    pub player_claims: Arc<Mutex<HashMap<Uuid, Option<Uuid>>>>,
    /// Running border display per player.
    pub border_tasks: Arc<Mutex<HashMap<Uuid, AbortHandle>>>,
    /// Most recent persistence failure, shown by `/claimadmin inspect`.
    pub last_error: Arc<Mutex<Option<String>>>,
}

impl PluginState {
    #[must_use]
    pub fn pool(&self) -> Option<PgPool> {
        self.db_pool.read().ok()?.as_ref().cloned()
    }

    /// Write records in order on the plugin runtime. Failures are logged
    /// and kept as the last error; the in-memory state stays authoritative.
    pub async fn save(&self, records: Vec<Record>) -> Result<(), String> {
        if records.is_empty() {
            return Ok(());
        }
        let Some(pool) = self.pool() else {
            return self.fail("database not connected".to_owned());
        };
        let result = self
            .runtime
            .spawn(async move {
                for record in &records {
                    record.write(&pool).await?;
                }
                Ok::<(), String>(())
            })
            .await
            .map_err(|e| format!("persistence task: {e}"))
            .and_then(|r| r);
        match result {
            Ok(()) => Ok(()),
            Err(e) => self.fail(e),
        }
    }

    fn fail(&self, error: String) -> Result<(), String> {
        log::error!("landclaims: persistence failed: {error}");
        if let Ok(mut last) = self.last_error.lock() {
            *last = Some(error.clone());
        }
        Err(error)
    }

    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().ok()?.clone()
    }

    /// Record which claim a player stands in; returns the previous one.
    pub fn set_player_claim(&self, player: Uuid, claim: Option<Uuid>) -> Option<Option<Uuid>> {
        self.player_claims.lock().ok()?.insert(player, claim)
    }

    pub fn remove_player(&self, player: &Uuid) {
        if let Ok(mut map) = self.player_claims.lock() {
            map.remove(player);
        }
        self.stop_border(player);
    }

    /// Replace any running border display of a player.
    pub fn set_border_task(&self, player: Uuid, handle: AbortHandle) {
        if let Ok(mut tasks) = self.border_tasks.lock() {
            if let Some(old) = tasks.insert(player, handle) {
                old.abort();
            }
        }
    }

    /// Drop the handle of a border display that ran to completion, unless a
    /// newer display has already replaced it.
    pub fn finish_border(&self, player: &Uuid, task: tokio::task::Id) {
        if let Ok(mut tasks) = self.border_tasks.lock() {
            if tasks.get(player).is_some_and(|h| h.id() == task) {
                tasks.remove(player);
            }
        }
    }

    pub fn stop_border(&self, player: &Uuid) {
        if let Ok(mut tasks) = self.border_tasks.lock() {
            if let Some(handle) = tasks.remove(player) {
                handle.abort();
            }
        }
    }

    pub fn stop_all_borders(&self) {
        if let Ok(mut tasks) = self.border_tasks.lock() {
            for (_, handle) in tasks.drain() {
                handle.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claims_engine::ClaimRules;

    fn state() -> PluginState {
        let config = LandClaimsConfig::parse(include_str!("../config.toml")).unwrap();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        PluginState {
            runtime: Arc::new(runtime),
            db_pool: Arc::new(std::sync::RwLock::new(None)),
            claims: Arc::new(RwLock::new(ClaimRegistry::new(ClaimRules::default()))),
            nations: Arc::new(RwLock::new(NationRegistry::new(config.nation_rules()))),
            wars: Arc::new(RwLock::new(WarRegistry::new(config.war_rules()))),
            config: Arc::new(config),
            player_claims: Arc::new(Mutex::new(HashMap::new())),
            border_tasks: Arc::new(Mutex::new(HashMap::new())),
            last_error: Arc::new(Mutex::new(None)),
        }
    }

    fn border_task(
        state: &PluginState,
        player: Uuid,
    ) -> (tokio::task::JoinHandle<()>, tokio::sync::oneshot::Sender<()>) {
        let (done, wait) = tokio::sync::oneshot::channel::<()>();
        let tasks = state.clone();
        let handle = state.runtime.spawn(async move {
            let _ = wait.await;
            tasks.finish_border(&player, tokio::task::id());
        });
        state.set_border_task(player, handle.abort_handle());
        (handle, done)
    }

    #[test]
    fn finished_border_task_is_forgotten() {
        let state = state();
        let player = Uuid::new_v4();
        let (handle, done) = border_task(&state, player);
        assert_eq!(state.border_tasks.lock().unwrap().len(), 1);
        done.send(()).unwrap();
        state.runtime.block_on(handle).unwrap();
        assert!(state.border_tasks.lock().unwrap().is_empty());
    }

    #[test]
    fn replaced_border_task_keeps_the_newer_entry() {
        let state = state();
        let player = Uuid::new_v4();
        let (first, first_done) = border_task(&state, player);
        let (_second, _second_done) = border_task(&state, player);
        assert!(state.runtime.block_on(first).unwrap_err().is_cancelled());
        drop(first_done);
        assert_eq!(state.border_tasks.lock().unwrap().len(), 1);
        state.stop_all_borders();
        assert!(state.border_tasks.lock().unwrap().is_empty());
    }
}
