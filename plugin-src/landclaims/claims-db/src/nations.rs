//! Nation, relation, war, tribute and shield records.

use crate::{from_json, to_i32, to_i64, to_json, to_u32, to_u64};
use claims_types::{
    Nation, NationRelation, RelationKind, TributeStatus, War, WarShield, WarState, WarTribute,
};
use sqlx::PgPool;
use uuid::Uuid;

type NationRow = (
    Uuid,
    String,
    Uuid,
    serde_json::Value,
    serde_json::Value,
    serde_json::Value,
    i64,
);

pub async fn load_nations(pool: &PgPool) -> Result<Vec<Nation>, String> {
    let rows = sqlx::query_as::<_, NationRow>(
        "SELECT id, name, leader, members, claims, invites, created_at \
         FROM landclaims_nations ORDER BY name",
    )
    .fetch_all(pool)
    .await
    .map_err(|e| format!("load nations: {e}"))?;

    Ok(rows
        .into_iter()
        .map(|(id, name, leader, members, claims, invites, created_at)| Nation {
            id,
            name,
            leader,
            members: from_json(members, "nation members"),
            claims: from_json(claims, "nation claims"),
            invites: from_json(invites, "nation invites"),
            created_at: to_u64(created_at),
        })
        .collect())
}

pub async fn save_nation(pool: &PgPool, nation: &Nation) -> Result<(), String> {
    sqlx::query(
        "INSERT INTO landclaims_nations (id, name, leader, members, claims, invites, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         ON CONFLICT (id) DO UPDATE SET name = $2, leader = $3, members = $4, claims = $5, invites = $6",
    )
    .bind(nation.id)
    .bind(&nation.name)
    .bind(nation.leader)
    .bind(to_json(&nation.members)?)
    .bind(to_json(&nation.claims)?)
    .bind(to_json(&nation.invites)?)
    .bind(to_i64(nation.created_at))
    .execute(pool)
    .await
    .map_err(|e| format!("save nation '{}': {e}", nation.name))?;
    Ok(())
}

/// Delete a nation together with its relations and shield.
pub async fn delete_nation(pool: &PgPool, nation_id: Uuid) -> Result<(), String> {
    let mut tx = pool.begin().await.map_err(|e| format!("delete nation: {e}"))?;
    for sql in [
        "DELETE FROM landclaims_relations WHERE a = $1 OR b = $1",
        "DELETE FROM landclaims_shields WHERE nation = $1",
        "DELETE FROM landclaims_nations WHERE id = $1",
    ] {
        sqlx::query(sql)
            .bind(nation_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| format!("delete nation: {e}"))?;
    }
    tx.commit().await.map_err(|e| format!("delete nation: {e}"))
}

// ── Relations ──

pub async fn load_relations(pool: &PgPool) -> Result<Vec<NationRelation>, String> {
    let rows = sqlx::query_as::<_, (Uuid, Uuid, String, i64)>(
        "SELECT a, b, kind, since FROM landclaims_relations",
    )
    .fetch_all(pool)
    .await
    .map_err(|e| format!("load relations: {e}"))?;

    let mut out = Vec::with_capacity(rows.len());
    for (a, b, kind, since) in rows {
        let Some(kind) = RelationKind::from_str_loose(&kind) else {
            log::warn!("landclaims: unknown relation kind '{kind}' between {a} and {b}; skipped");
            continue;
        };
        out.push(NationRelation::new(a, b, kind, to_u64(since)));
    }
    Ok(out)
}

pub async fn save_relation(pool: &PgPool, relation: &NationRelation) -> Result<(), String> {
    sqlx::query(
        "INSERT INTO landclaims_relations (a, b, kind, since) VALUES ($1, $2, $3, $4) \
         ON CONFLICT (a, b) DO UPDATE SET kind = $3, since = $4",
    )
    .bind(relation.a)
    .bind(relation.b)
    .bind(relation.kind.as_str())
    .bind(to_i64(relation.since))
    .execute(pool)
    .await
    .map_err(|e| format!("save relation: {e}"))?;
    Ok(())
}

/// Remove a relation; `a`/`b` must already be in key order.
pub async fn delete_relation(pool: &PgPool, a: Uuid, b: Uuid) -> Result<(), String> {
    sqlx::query("DELETE FROM landclaims_relations WHERE a = $1 AND b = $2")
        .bind(a)
        .bind(b)
        .execute(pool)
        .await
        .map_err(|e| format!("delete relation: {e}"))?;
    Ok(())
}

// ── Wars ──

type WarRow = (
    Uuid,         // id
    Uuid,         // attacker
    Uuid,         // defender
    String,       // state
    String,       // reason
    i64,          // declared_at
    Option<i64>,  // started_at
    Option<i64>,  // ceasefire_at
    Option<i64>,  // ended_at
    Option<Uuid>, // winner
);

pub async fn load_wars(pool: &PgPool) -> Result<Vec<War>, String> {
    let rows = sqlx::query_as::<_, WarRow>(
        "SELECT id, attacker, defender, state, reason, declared_at, started_at, ceasefire_at, ended_at, winner \
         FROM landclaims_wars ORDER BY declared_at",
    )
    .fetch_all(pool)
    .await
    .map_err(|e| format!("load wars: {e}"))?;

    let mut out = Vec::with_capacity(rows.len());
    for (id, attacker, defender, state, reason, declared_at, started_at, ceasefire_at, ended_at, winner) in rows {
        let Some(state) = WarState::from_str_loose(&state) else {
            log::warn!("landclaims: war {id} has unknown state '{state}'; skipped");
            continue;
        };
        out.push(War {
            id,
            attacker,
            defender,
            state,
            reason,
            declared_at: to_u64(declared_at),
            started_at: started_at.map(to_u64),
            ceasefire_at: ceasefire_at.map(to_u64),
            ended_at: ended_at.map(to_u64),
            winner,
        });
    }
    Ok(out)
}

pub async fn save_war(pool: &PgPool, war: &War) -> Result<(), String> {
    sqlx::query(
        "INSERT INTO landclaims_wars \
         (id, attacker, defender, state, reason, declared_at, started_at, ceasefire_at, ended_at, winner) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
         ON CONFLICT (id) DO UPDATE SET state = $4, started_at = $7, ceasefire_at = $8, ended_at = $9, winner = $10",
    )
    .bind(war.id)
    .bind(war.attacker)
    .bind(war.defender)
    .bind(war.state.as_str())
    .bind(&war.reason)
    .bind(to_i64(war.declared_at))
    .bind(war.started_at.map(to_i64))
    .bind(war.ceasefire_at.map(to_i64))
    .bind(war.ended_at.map(to_i64))
    .bind(war.winner)
    .execute(pool)
    .await
    .map_err(|e| format!("save war: {e}"))?;
    Ok(())
}

// ── Tributes ──

type TributeRow = (Uuid, Uuid, Uuid, Uuid, i32, String, i64);

pub async fn load_tributes(pool: &PgPool) -> Result<Vec<WarTribute>, String> {
    let rows = sqlx::query_as::<_, TributeRow>(
        "SELECT id, war_id, from_nation, to_nation, amount, status, offered_at FROM landclaims_tributes",
    )
    .fetch_all(pool)
    .await
    .map_err(|e| format!("load tributes: {e}"))?;

    Ok(rows
        .into_iter()
        .filter_map(|(id, war_id, from_nation, to_nation, amount, status, offered_at)| {
            Some(WarTribute {
                id,
                war_id,
                from_nation,
                to_nation,
                amount: to_u32(amount),
                status: TributeStatus::from_str_loose(&status)?,
                offered_at: to_u64(offered_at),
            })
        })
        .collect())
}

pub async fn save_tribute(pool: &PgPool, tribute: &WarTribute) -> Result<(), String> {
    sqlx::query(
        "INSERT INTO landclaims_tributes (id, war_id, from_nation, to_nation, amount, status, offered_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         ON CONFLICT (id) DO UPDATE SET status = $6",
    )
    .bind(tribute.id)
    .bind(tribute.war_id)
    .bind(tribute.from_nation)
    .bind(tribute.to_nation)
    .bind(to_i32(tribute.amount))
    .bind(tribute.status.as_str())
    .bind(to_i64(tribute.offered_at))
    .execute(pool)
    .await
    .map_err(|e| format!("save tribute: {e}"))?;
    Ok(())
}

// ── Shields ──

pub async fn load_shields(pool: &PgPool) -> Result<Vec<WarShield>, String> {
    let rows = sqlx::query_as::<_, (Uuid, i64)>("SELECT nation, expires_at FROM landclaims_shields")
        .fetch_all(pool)
        .await
        .map_err(|e| format!("load shields: {e}"))?;
    Ok(rows
        .into_iter()
        .map(|(nation, expires_at)| WarShield {
            nation,
            expires_at: to_u64(expires_at),
        })
        .collect())
}

pub async fn save_shield(pool: &PgPool, shield: &WarShield) -> Result<(), String> {
    sqlx::query(
        "INSERT INTO landclaims_shields (nation, expires_at) VALUES ($1, $2) \
         ON CONFLICT (nation) DO UPDATE SET expires_at = $2",
    )
    .bind(shield.nation)
    .bind(to_i64(shield.expires_at))
    .execute(pool)
    .await
    .map_err(|e| format!("save shield: {e}"))?;
    Ok(())
}

pub async fn delete_shield(pool: &PgPool, nation: Uuid) -> Result<(), String> {
    sqlx::query("DELETE FROM landclaims_shields WHERE nation = $1")
        .bind(nation)
        .execute(pool)
        .await
        .map_err(|e| format!("delete shield: {e}"))?;
    Ok(())
}
