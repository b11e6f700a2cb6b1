//! Claim, chunk and pool records.

use crate::{from_json, to_i32, to_i64, to_json, to_u32, to_u64};
use claims_types::{ChunkPos, Claim, PlayerChunkPool};
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

type ClaimRow = (
    Uuid,              // id
    Uuid,              // owner
    String,            // name
    String,            // world
    i32,               // total_chunks
    i32,               // purchased_chunks
    serde_json::Value, // groups
    serde_json::Value, // members
    serde_json::Value, // trusted
    serde_json::Value, // banned
    serde_json::Value, // settings
    i64,               // created_at
);

/// Load every claim with its chunks.
pub async fn load_claims(pool: &PgPool) -> Result<Vec<Claim>, String> {
    let rows = sqlx::query_as::<_, ClaimRow>(
        "SELECT id, owner, name, world, total_chunks, purchased_chunks, \
         groups, members, trusted, banned, settings, created_at \
         FROM landclaims_claims ORDER BY created_at, id",
    )
    .fetch_all(pool)
    .await
    .map_err(|e| format!("load claims: {e}"))?;

    let chunk_rows = sqlx::query_as::<_, (Uuid, i32, i32)>(
        "SELECT claim_id, x, z FROM landclaims_claim_chunks",
    )
    .fetch_all(pool)
    .await
    .map_err(|e| format!("load claim chunks: {e}"))?;

    let mut chunks: HashMap<Uuid, Vec<ChunkPos>> = HashMap::new();
    for (claim_id, x, z) in chunk_rows {
        chunks.entry(claim_id).or_default().push(ChunkPos::new(x, z));
    }

    let mut claims = Vec::with_capacity(rows.len());
    for (id, owner, name, world, total, purchased, groups, members, trusted, banned, settings, created_at) in rows {
        claims.push(Claim {
            id,
            name,
            owner,
            world,
            chunks: chunks.remove(&id).unwrap_or_default().into_iter().collect(),
            total_chunks: to_u32(total),
            purchased_chunks: to_u32(purchased),
            groups: from_json(groups, "groups"),
            members: from_json(members, "members"),
            trusted: from_json(trusted, "trusted"),
            banned: from_json(banned, "banned"),
            settings: from_json(settings, "settings"),
            created_at: to_u64(created_at),
        });
    }
    Ok(claims)
}

/// Upsert a claim and replace its chunk rows in one transaction.
pub async fn save_claim(pool: &PgPool, claim: &Claim) -> Result<(), String> {
    let mut tx = pool.begin().await.map_err(|e| format!("save claim: {e}"))?;

    sqlx::query(
        "INSERT INTO landclaims_claims \
         (id, owner, name, world, total_chunks, purchased_chunks, groups, members, trusted, banned, settings, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
         ON CONFLICT (id) DO UPDATE SET owner = $2, name = $3, world = $4, total_chunks = $5, \
         purchased_chunks = $6, groups = $7, members = $8, trusted = $9, banned = $10, settings = $11",
    )
    .bind(claim.id)
    .bind(claim.owner)
    .bind(&claim.name)
    .bind(&claim.world)
    .bind(to_i32(claim.total_chunks))
    .bind(to_i32(claim.purchased_chunks))
    .bind(to_json(&claim.groups)?)
    .bind(to_json(&claim.members)?)
    .bind(to_json(&claim.trusted)?)
    .bind(to_json(&claim.banned)?)
    .bind(to_json(&claim.settings)?)
    .bind(to_i64(claim.created_at))
    .execute(&mut *tx)
    .await
    .map_err(|e| format!("save claim '{}': {e}", claim.name))?;

    sqlx::query("DELETE FROM landclaims_claim_chunks WHERE claim_id = $1")
        .bind(claim.id)
        .execute(&mut *tx)
        .await
        .map_err(|e| format!("clear chunks of '{}': {e}", claim.name))?;

    if !claim.chunks.is_empty() {
        let xs: Vec<i32> = claim.chunks.iter().map(|c| c.x).collect();
        let zs: Vec<i32> = claim.chunks.iter().map(|c| c.z).collect();
        sqlx::query(
            "INSERT INTO landclaims_claim_chunks (world, x, z, claim_id) \
             SELECT $1, x, z, $2 FROM UNNEST($3::int[], $4::int[]) AS t(x, z) \
             ON CONFLICT (world, x, z) DO UPDATE SET claim_id = EXCLUDED.claim_id",
        )
        .bind(&claim.world)
        .bind(claim.id)
        .bind(&xs)
        .bind(&zs)
        .execute(&mut *tx)
        .await
        .map_err(|e| format!("save chunks of '{}': {e}", claim.name))?;
    }

    tx.commit().await.map_err(|e| format!("save claim: {e}"))
}

/// Delete a claim; its chunk rows cascade.
pub async fn delete_claim(pool: &PgPool, claim_id: Uuid) -> Result<(), String> {
    sqlx::query("DELETE FROM landclaims_claims WHERE id = $1")
        .bind(claim_id)
        .execute(pool)
        .await
        .map_err(|e| format!("delete claim: {e}"))?;
    Ok(())
}

pub async fn load_pools(pool: &PgPool) -> Result<Vec<PlayerChunkPool>, String> {
    let rows = sqlx::query_as::<_, (Uuid, i32, i32)>(
        "SELECT owner, purchased_chunks, bonus_chunks FROM landclaims_pools",
    )
    .fetch_all(pool)
    .await
    .map_err(|e| format!("load pools: {e}"))?;

    Ok(rows
        .into_iter()
        .map(|(owner, purchased, bonus)| PlayerChunkPool {
            owner,
            purchased_chunks: to_u32(purchased),
            bonus_chunks: to_u32(bonus),
        })
        .collect())
}

pub async fn save_pool(pool: &PgPool, record: &PlayerChunkPool) -> Result<(), String> {
    sqlx::query(
        "INSERT INTO landclaims_pools (owner, purchased_chunks, bonus_chunks) VALUES ($1, $2, $3) \
         ON CONFLICT (owner) DO UPDATE SET purchased_chunks = $2, bonus_chunks = $3",
    )
    .bind(record.owner)
    .bind(to_i32(record.purchased_chunks))
    .bind(to_i32(record.bonus_chunks))
    .execute(pool)
    .await
    .map_err(|e| format!("save pool: {e}"))?;
    Ok(())
}
