//! Claim registry: claims, the chunk index and per-player credit pools.
//!
//! Every mutating call returns clones of the records it changed so the
//! caller can write them through to storage after releasing its lock.

use crate::error::ClaimError;
use crate::rebalance::{self, ClaimUsage, RebalanceReport};
use claims_types::{ChunkPos, Claim, ClaimPermission, PlayerChunkPool, SettingKey};
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

/// Global claim rules, loaded from `[claims]` in the plugin config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimRules {
    /// Free capacity every new claim starts with.
    pub starting_chunks_per_claim: u32,
    pub max_claims_per_player: u32,
    /// New chunks must touch an existing chunk of the claim.
    pub require_adjacent: bool,
    pub max_name_len: usize,
}

impl Default for ClaimRules {
    fn default() -> Self {
        Self {
            starting_chunks_per_claim: 4,
            max_claims_per_player: 3,
            require_adjacent: true,
            max_name_len: 32,
        }
    }
}

/// Result of adding a chunk to a claim.
#[derive(Debug, Clone)]
pub struct ChunkClaimed {
    pub claim: Claim,
    /// Set when a pool credit was spent to grow the claim's capacity.
    pub drew_credit: bool,
}

/// Result of migrating one player's allocations.
#[derive(Debug, Clone)]
pub struct Migration {
    pub player: Uuid,
    pub report: RebalanceReport,
    pub claims: Vec<Claim>,
    pub pool: PlayerChunkPool,
}

/// Result of deficit repair on one claim.
#[derive(Debug, Clone)]
pub struct DeficitRepair {
    pub claim: Claim,
    pub covered: u32,
    pub uncovered: u32,
}

#[derive(Debug, Default)]
pub struct ClaimRegistry {
    rules: ClaimRules,
    claims: HashMap<Uuid, Claim>,
    chunk_index: HashMap<(String, ChunkPos), Uuid>,
    pools: HashMap<Uuid, PlayerChunkPool>,
}

fn valid_name(name: &str, max_len: usize) -> bool {
    !name.is_empty()
        && name.len() <= max_len
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

impl ClaimRegistry {
    #[must_use]
    pub fn new(rules: ClaimRules) -> Self {
        Self {
            rules,
            ..Default::default()
        }
    }

    /// Build the registry from stored records. Chunks claimed twice keep
    /// their first owner; the duplicate is dropped from the later claim.
    #[must_use]
    pub fn load(rules: ClaimRules, claims: Vec<Claim>, pools: Vec<PlayerChunkPool>) -> Self {
        let mut registry = Self::new(rules);
        let mut claims = claims;
        claims.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        for mut claim in claims {
            let mut duplicates = Vec::new();
            for chunk in &claim.chunks {
                let key = (claim.world.clone(), *chunk);
                if registry.chunk_index.contains_key(&key) {
                    duplicates.push(*chunk);
                } else {
                    registry.chunk_index.insert(key, claim.id);
                }
            }
            for chunk in duplicates {
                log::warn!(
                    "landclaims: chunk {chunk} in '{}' claimed twice; dropped from claim '{}'",
                    claim.world,
                    claim.name
                );
                claim.chunks.remove(&chunk);
            }
            registry.claims.insert(claim.id, claim);
        }
        for pool in pools {
            registry.pools.insert(pool.owner, pool);
        }
        registry
    }

    #[must_use]
    pub const fn rules(&self) -> &ClaimRules {
        &self.rules
    }

    // ── Queries ──

    #[must_use]
    pub fn get(&self, claim_id: &Uuid) -> Option<&Claim> {
        self.claims.get(claim_id)
    }

    #[must_use]
    pub fn claim_at(&self, world: &str, chunk: ChunkPos) -> Option<&Claim> {
        self.chunk_index
            .get(&(world.to_owned(), chunk))
            .and_then(|id| self.claims.get(id))
    }

    /// Claims of one owner, oldest first.
    #[must_use]
    pub fn claims_of(&self, owner: &Uuid) -> Vec<&Claim> {
        let mut out: Vec<&Claim> = self.claims.values().filter(|c| c.owner == *owner).collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        out
    }

    #[must_use]
    pub fn find_by_name(&self, owner: &Uuid, name: &str) -> Option<&Claim> {
        self.claims
            .values()
            .find(|c| c.owner == *owner && c.name.eq_ignore_ascii_case(name))
    }

    #[must_use]
    pub fn claim_count(&self) -> usize {
        self.claims.len()
    }

    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.chunk_index.len()
    }

    /// Pool of a player, or an empty one if they never bought credits.
    #[must_use]
    pub fn pool(&self, player: &Uuid) -> PlayerChunkPool {
        self.pools
            .get(player)
            .cloned()
            .unwrap_or_else(|| PlayerChunkPool::new(*player))
    }

    /// Credits the player owns but has not put into a claim. Negative when
    /// claims hold more purchased capacity than the pool records.
    #[must_use]
    pub fn unallocated(&self, player: &Uuid) -> i64 {
        let allocated: i64 = self
            .claims
            .values()
            .filter(|c| c.owner == *player)
            .map(|c| i64::from(c.purchased_chunks))
            .sum();
        i64::from(self.pool(player).total_credits()) - allocated
    }

    /// Whether `player` may do `permission` at a chunk. Unclaimed land is open.
    #[must_use]
    pub fn can(&self, player: &Uuid, world: &str, chunk: ChunkPos, permission: ClaimPermission) -> bool {
        self.claim_at(world, chunk)
            .is_none_or(|claim| claim.can(player, permission))
    }

    /// Every player that owns a claim or a pool.
    #[must_use]
    pub fn players(&self) -> BTreeSet<Uuid> {
        self.claims
            .values()
            .map(|c| c.owner)
            .chain(self.pools.keys().copied())
            .collect()
    }

    fn id_by_name(&self, owner: &Uuid, name: &str) -> Result<Uuid, ClaimError> {
        self.find_by_name(owner, name)
            .map(|c| c.id)
            .ok_or_else(|| ClaimError::NotFound(name.to_owned()))
    }

    fn managed_mut(&mut self, actor: &Uuid, claim_id: &Uuid) -> Result<&mut Claim, ClaimError> {
        let claim = self
            .claims
            .get_mut(claim_id)
            .ok_or_else(|| ClaimError::NotFound(claim_id.to_string()))?;
        if !claim.can(actor, ClaimPermission::Manage) {
            return Err(ClaimError::NoPermission);
        }
        Ok(claim)
    }

    fn pool_mut(&mut self, player: Uuid) -> &mut PlayerChunkPool {
        self.pools
            .entry(player)
            .or_insert_with(|| PlayerChunkPool::new(player))
    }

    /// Create an empty pool for a player seen for the first time. Returns
    /// the new pool, or `None` if one already existed.
    pub fn ensure_pool(&mut self, player: Uuid) -> Option<PlayerChunkPool> {
        if self.pools.contains_key(&player) {
            return None;
        }
        Some(self.pool_mut(player).clone())
    }

    // ── Claim lifecycle ──

    pub fn create_claim(
        &mut self,
        owner: Uuid,
        name: &str,
        world: &str,
        chunk: ChunkPos,
        now: u64,
    ) -> Result<Claim, ClaimError> {
        if !valid_name(name, self.rules.max_name_len) {
            return Err(ClaimError::InvalidName(self.rules.max_name_len));
        }
        if self.find_by_name(&owner, name).is_some() {
            return Err(ClaimError::DuplicateName(name.to_owned()));
        }
        let owned = self.claims.values().filter(|c| c.owner == owner).count();
        if owned >= self.rules.max_claims_per_player as usize {
            return Err(ClaimError::TooManyClaims(self.rules.max_claims_per_player));
        }
        if let Some(existing) = self.claim_at(world, chunk) {
            return Err(ClaimError::ChunkTaken {
                chunk,
                claim: existing.name.clone(),
            });
        }

        let mut claim = Claim::new(
            owner,
            name.to_owned(),
            world.to_owned(),
            self.rules.starting_chunks_per_claim,
            now,
        );
        claim.chunks.insert(chunk);
        self.chunk_index.insert((world.to_owned(), chunk), claim.id);
        self.claims.insert(claim.id, claim.clone());
        Ok(claim)
    }

    /// Remove a claim. Its purchased credits fall back into the owner's pool.
    pub fn delete_claim(&mut self, owner: &Uuid, name: &str) -> Result<Claim, ClaimError> {
        let id = self.id_by_name(owner, name)?;
        self.remove_claim(&id)
            .ok_or_else(|| ClaimError::NotFound(name.to_owned()))
    }

    /// Remove a claim by id, regardless of owner.
    pub fn remove_claim(&mut self, claim_id: &Uuid) -> Option<Claim> {
        let claim = self.claims.remove(claim_id)?;
        for chunk in &claim.chunks {
            self.chunk_index.remove(&(claim.world.clone(), *chunk));
        }
        Some(claim)
    }

    /// Add `chunk` to the owner's claim `name`, spending a pool credit when
    /// the claim is already full.
    pub fn claim_chunk(
        &mut self,
        owner: &Uuid,
        name: &str,
        world: &str,
        chunk: ChunkPos,
    ) -> Result<ChunkClaimed, ClaimError> {
        let id = self.id_by_name(owner, name)?;
        if let Some(existing) = self.claim_at(world, chunk) {
            return Err(ClaimError::ChunkTaken {
                chunk,
                claim: existing.name.clone(),
            });
        }
        let unallocated = self.unallocated(owner);
        let rules = self.rules;
        let claim = self
            .claims
            .get_mut(&id)
            .ok_or_else(|| ClaimError::NotFound(name.to_owned()))?;
        if claim.world != world {
            return Err(ClaimError::WrongWorld(claim.name.clone()));
        }
        if rules.require_adjacent && !chunk.neighbors().iter().any(|n| claim.chunks.contains(n)) {
            return Err(ClaimError::NotAdjacent(chunk));
        }

        let mut drew_credit = false;
        if claim.remaining_chunks() == 0 {
            if unallocated < 1 || claim.deficit() > 0 {
                return Err(ClaimError::NoChunksLeft(claim.name.clone()));
            }
            claim.purchased_chunks += 1;
            claim.total_chunks += 1;
            drew_credit = true;
        }
        claim.chunks.insert(chunk);
        let claim = claim.clone();
        self.chunk_index.insert((world.to_owned(), chunk), id);
        Ok(ChunkClaimed { claim, drew_credit })
    }

    /// Remove one chunk from whichever claim holds it. The actor needs
    /// manage rights on that claim.
    pub fn unclaim_chunk(
        &mut self,
        actor: &Uuid,
        world: &str,
        chunk: ChunkPos,
    ) -> Result<Claim, ClaimError> {
        let key = (world.to_owned(), chunk);
        let id = *self
            .chunk_index
            .get(&key)
            .ok_or(ClaimError::NotClaimed(chunk))?;
        let claim = self.managed_mut(actor, &id)?;
        if claim.chunks.len() <= 1 {
            return Err(ClaimError::LastChunk);
        }
        claim.chunks.remove(&chunk);
        let claim = claim.clone();
        self.chunk_index.remove(&key);
        Ok(claim)
    }

    // ── Credits ──

    /// Move `amount` unallocated credits into a claim's capacity.
    pub fn allocate(&mut self, owner: &Uuid, name: &str, amount: u32) -> Result<Claim, ClaimError> {
        if amount == 0 {
            return Err(ClaimError::InvalidAmount);
        }
        let id = self.id_by_name(owner, name)?;
        let available = self.unallocated(owner);
        if i64::from(amount) > available {
            return Err(ClaimError::NotEnoughCredits {
                requested: amount,
                available,
            });
        }
        let claim = self
            .claims
            .get_mut(&id)
            .ok_or_else(|| ClaimError::NotFound(name.to_owned()))?;
        claim.purchased_chunks += amount;
        claim.total_chunks += amount;
        Ok(claim.clone())
    }

    /// Return unused purchased capacity of a claim to the pool.
    pub fn deallocate(&mut self, owner: &Uuid, name: &str, amount: u32) -> Result<Claim, ClaimError> {
        if amount == 0 {
            return Err(ClaimError::InvalidAmount);
        }
        let id = self.id_by_name(owner, name)?;
        let claim = self
            .claims
            .get_mut(&id)
            .ok_or_else(|| ClaimError::NotFound(name.to_owned()))?;
        let free = claim.remaining_chunks().min(claim.purchased_chunks);
        if amount > free {
            return Err(ClaimError::CapacityInUse { free });
        }
        claim.purchased_chunks -= amount;
        claim.total_chunks -= amount;
        Ok(claim.clone())
    }

    /// Give a player credits, either as purchases or as a bonus.
    pub fn grant(&mut self, player: Uuid, amount: u32, purchased: bool) -> PlayerChunkPool {
        let pool = self.pool_mut(player);
        if purchased {
            pool.purchased_chunks = pool.purchased_chunks.saturating_add(amount);
        } else {
            pool.bonus_chunks = pool.bonus_chunks.saturating_add(amount);
        }
        pool.clone()
    }

    /// Overwrite a player's purchased total.
    pub fn set_purchased(&mut self, player: Uuid, amount: u32) -> PlayerChunkPool {
        let pool = self.pool_mut(player);
        pool.purchased_chunks = amount;
        pool.clone()
    }

    /// Move unallocated credits between players. Bonus credits are spent
    /// before purchased ones; the receiver gets them as bonus.
    pub fn transfer_credits(
        &mut self,
        from: Uuid,
        to: Uuid,
        amount: u32,
    ) -> Result<(PlayerChunkPool, PlayerChunkPool), ClaimError> {
        if amount == 0 {
            return Err(ClaimError::InvalidAmount);
        }
        let available = self.unallocated(&from);
        if i64::from(amount) > available {
            return Err(ClaimError::NotEnoughCredits {
                requested: amount,
                available,
            });
        }
        let payer = self.pool_mut(from);
        let from_bonus = amount.min(payer.bonus_chunks);
        payer.bonus_chunks -= from_bonus;
        payer.purchased_chunks -= amount - from_bonus;
        let payer = payer.clone();
        let receiver = self.pool_mut(to);
        receiver.bonus_chunks = receiver.bonus_chunks.saturating_add(amount);
        Ok((payer, receiver.clone()))
    }

    /// Cover a claim's deficit with unallocated pool credits, as far as the
    /// pool allows.
    pub fn repair_deficit(&mut self, claim_id: &Uuid) -> Result<DeficitRepair, ClaimError> {
        let (owner, deficit) = {
            let claim = self
                .claims
                .get(claim_id)
                .ok_or_else(|| ClaimError::NotFound(claim_id.to_string()))?;
            (claim.owner, claim.deficit())
        };
        let available = u32::try_from(self.unallocated(&owner).max(0)).unwrap_or(u32::MAX);
        let covered = deficit.min(available);
        let claim = self
            .claims
            .get_mut(claim_id)
            .ok_or_else(|| ClaimError::NotFound(claim_id.to_string()))?;
        claim.purchased_chunks += covered;
        claim.total_chunks += covered;
        Ok(DeficitRepair {
            claim: claim.clone(),
            covered,
            uncovered: deficit - covered,
        })
    }

    /// Repair every claim of a player that is over capacity.
    pub fn repair_player(&mut self, player: &Uuid) -> Vec<DeficitRepair> {
        let ids: Vec<Uuid> = self
            .claims_of(player)
            .into_iter()
            .filter(|c| c.deficit() > 0)
            .map(|c| c.id)
            .collect();
        ids.iter()
            .filter_map(|id| self.repair_deficit(id).ok())
            .collect()
    }

    /// Redistribute a player's purchased credits across their claims.
    ///
    /// Bonus credits are not distributed, but usage they already pay for
    /// does not raise the purchased total.
    pub fn migrate(&mut self, player: &Uuid) -> Migration {
        let starting = self.rules.starting_chunks_per_claim;
        let usage: Vec<ClaimUsage> = self
            .claims_of(player)
            .into_iter()
            .map(|c| ClaimUsage {
                claim_id: c.id,
                chunks_claimed: c.chunk_count(),
            })
            .collect();
        let current = self.pool(player);
        let report = rebalance::rebalance(&usage, starting, current.purchased_chunks, current.bonus_chunks);

        let pool = {
            let pool = self.pool_mut(*player);
            pool.purchased_chunks = report.purchased_after;
            pool.clone()
        };
        let mut claims = Vec::with_capacity(report.allocations.len());
        for alloc in &report.allocations {
            if let Some(claim) = self.claims.get_mut(&alloc.claim_id) {
                claim.purchased_chunks = alloc.purchased;
                claim.total_chunks = starting + alloc.purchased;
                claims.push(claim.clone());
            }
        }

        Migration {
            player: *player,
            report,
            claims,
            pool,
        }
    }

    /// Migrate every player known to the registry.
    pub fn migrate_all(&mut self) -> Vec<Migration> {
        self.players().iter().map(|p| self.migrate(p)).collect()
    }

    // ── Membership & settings ──

    pub fn trust(&mut self, actor: &Uuid, claim_id: &Uuid, target: Uuid) -> Result<Claim, ClaimError> {
        let claim = self.managed_mut(actor, claim_id)?;
        if target == claim.owner {
            return Err(ClaimError::CannotTargetOwner);
        }
        claim.banned.remove(&target);
        claim.trusted.insert(target);
        Ok(claim.clone())
    }

    pub fn untrust(&mut self, actor: &Uuid, claim_id: &Uuid, target: &Uuid) -> Result<Claim, ClaimError> {
        let claim = self.managed_mut(actor, claim_id)?;
        claim.trusted.remove(target);
        Ok(claim.clone())
    }

    /// Ban a player; this also revokes trust and membership.
    pub fn ban(&mut self, actor: &Uuid, claim_id: &Uuid, target: Uuid) -> Result<Claim, ClaimError> {
        let claim = self.managed_mut(actor, claim_id)?;
        if target == claim.owner {
            return Err(ClaimError::CannotTargetOwner);
        }
        claim.trusted.remove(&target);
        claim.members.remove(&target);
        claim.banned.insert(target);
        Ok(claim.clone())
    }

    pub fn unban(&mut self, actor: &Uuid, claim_id: &Uuid, target: &Uuid) -> Result<Claim, ClaimError> {
        let claim = self.managed_mut(actor, claim_id)?;
        claim.banned.remove(target);
        Ok(claim.clone())
    }

    pub fn set_member(
        &mut self,
        actor: &Uuid,
        claim_id: &Uuid,
        target: Uuid,
        group: &str,
    ) -> Result<Claim, ClaimError> {
        let claim = self.managed_mut(actor, claim_id)?;
        if target == claim.owner {
            return Err(ClaimError::CannotTargetOwner);
        }
        let group = group.to_lowercase();
        if !claim.groups.contains_key(&group) {
            return Err(ClaimError::UnknownGroup(group));
        }
        claim.banned.remove(&target);
        claim.members.insert(target, group);
        Ok(claim.clone())
    }

    pub fn remove_member(&mut self, actor: &Uuid, claim_id: &Uuid, target: &Uuid) -> Result<Claim, ClaimError> {
        let claim = self.managed_mut(actor, claim_id)?;
        claim.members.remove(target);
        Ok(claim.clone())
    }

    pub fn set_setting(
        &mut self,
        actor: &Uuid,
        claim_id: &Uuid,
        key: SettingKey,
        value: bool,
    ) -> Result<Claim, ClaimError> {
        let claim = self.managed_mut(actor, claim_id)?;
        claim.settings.set(key, value);
        Ok(claim.clone())
    }

    pub fn rename(&mut self, owner: &Uuid, name: &str, new_name: &str) -> Result<Claim, ClaimError> {
        if !valid_name(new_name, self.rules.max_name_len) {
            return Err(ClaimError::InvalidName(self.rules.max_name_len));
        }
        let id = self.id_by_name(owner, name)?;
        if self
            .find_by_name(owner, new_name)
            .is_some_and(|c| c.id != id)
        {
            return Err(ClaimError::DuplicateName(new_name.to_owned()));
        }
        let claim = self
            .claims
            .get_mut(&id)
            .ok_or_else(|| ClaimError::NotFound(name.to_owned()))?;
        new_name.clone_into(&mut claim.name);
        Ok(claim.clone())
    }

    /// Hand a claim to another player. The claim's purchased credits move
    /// with it, from the old owner's pool into the new owner's.
    pub fn transfer(
        &mut self,
        owner: &Uuid,
        name: &str,
        new_owner: Uuid,
    ) -> Result<(Claim, PlayerChunkPool, PlayerChunkPool), ClaimError> {
        let id = self.id_by_name(owner, name)?;
        if new_owner == *owner {
            return Err(ClaimError::CannotTargetOwner);
        }
        let owned = self.claims.values().filter(|c| c.owner == new_owner).count();
        if owned >= self.rules.max_claims_per_player as usize {
            return Err(ClaimError::TooManyClaims(self.rules.max_claims_per_player));
        }
        if let Some(clash) = self.find_by_name(&new_owner, name) {
            return Err(ClaimError::DuplicateName(clash.name.clone()));
        }

        let credits = self.claims.get(&id).map_or(0, |c| c.purchased_chunks);
        let old_pool = {
            let pool = self.pool_mut(*owner);
            let from_purchased = credits.min(pool.purchased_chunks);
            pool.purchased_chunks -= from_purchased;
            pool.bonus_chunks = pool.bonus_chunks.saturating_sub(credits - from_purchased);
            pool.clone()
        };
        let new_pool = {
            let pool = self.pool_mut(new_owner);
            pool.purchased_chunks = pool.purchased_chunks.saturating_add(credits);
            pool.clone()
        };
        let claim = self
            .claims
            .get_mut(&id)
            .ok_or_else(|| ClaimError::NotFound(name.to_owned()))?;
        claim.owner = new_owner;
        claim.members.remove(&new_owner);
        claim.trusted.remove(&new_owner);
        claim.banned.remove(&new_owner);
        Ok((claim.clone(), old_pool, new_pool))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WORLD: &str = "0";

    fn registry() -> ClaimRegistry {
        ClaimRegistry::new(ClaimRules::default())
    }

    #[test]
    fn ensure_pool_only_creates_once() {
        let mut reg = registry();
        let p = Uuid::new_v4();
        assert!(reg.ensure_pool(p).is_some());
        assert!(reg.ensure_pool(p).is_none());
        assert!(reg.players().contains(&p));
    }

    fn claim_line(reg: &mut ClaimRegistry, owner: Uuid, name: &str, z: i32, len: i32) -> Claim {
        let created_at = u64::try_from(z).unwrap_or(0);
        reg.create_claim(owner, name, WORLD, ChunkPos::new(0, z), created_at).unwrap();
        for x in 1..len {
            reg.claim_chunk(&owner, name, WORLD, ChunkPos::new(x, z)).unwrap();
        }
        reg.find_by_name(&owner, name).unwrap().clone()
    }

    #[test]
    fn create_validates_name_limit_and_overlap() {
        let mut reg = registry();
        let owner = Uuid::new_v4();
        assert_eq!(
            reg.create_claim(owner, "bad name", WORLD, ChunkPos::new(0, 0), 0),
            Err(ClaimError::InvalidName(32))
        );
        reg.create_claim(owner, "home", WORLD, ChunkPos::new(0, 0), 0).unwrap();
        assert_eq!(
            reg.create_claim(owner, "HOME", WORLD, ChunkPos::new(5, 5), 0),
            Err(ClaimError::DuplicateName("HOME".into()))
        );
        let other = Uuid::new_v4();
        assert!(matches!(
            reg.create_claim(other, "x", WORLD, ChunkPos::new(0, 0), 0),
            Err(ClaimError::ChunkTaken { .. })
        ));
        // Same coordinates in another world are free.
        reg.create_claim(other, "x", "1", ChunkPos::new(0, 0), 0).unwrap();

        reg.create_claim(owner, "b", WORLD, ChunkPos::new(10, 0), 0).unwrap();
        reg.create_claim(owner, "c", WORLD, ChunkPos::new(20, 0), 0).unwrap();
        assert_eq!(
            reg.create_claim(owner, "d", WORLD, ChunkPos::new(30, 0), 0),
            Err(ClaimError::TooManyClaims(3))
        );
    }

    #[test]
    fn claiming_draws_pool_credit_when_full() {
        let mut reg = registry();
        let owner = Uuid::new_v4();
        let claim = claim_line(&mut reg, owner, "home", 0, 4);
        assert_eq!(claim.remaining_chunks(), 0);

        assert_eq!(
            reg.claim_chunk(&owner, "home", WORLD, ChunkPos::new(4, 0)).unwrap_err(),
            ClaimError::NoChunksLeft("home".into())
        );

        reg.grant(owner, 2, true);
        let out = reg.claim_chunk(&owner, "home", WORLD, ChunkPos::new(4, 0)).unwrap();
        assert!(out.drew_credit);
        assert_eq!(out.claim.total_chunks, 5);
        assert_eq!(out.claim.purchased_chunks, 1);
        assert_eq!(reg.unallocated(&owner), 1);
    }

    #[test]
    fn adjacency_is_enforced() {
        let mut reg = registry();
        let owner = Uuid::new_v4();
        reg.create_claim(owner, "home", WORLD, ChunkPos::new(0, 0), 0).unwrap();
        assert_eq!(
            reg.claim_chunk(&owner, "home", WORLD, ChunkPos::new(1, 1)).unwrap_err(),
            ClaimError::NotAdjacent(ChunkPos::new(1, 1))
        );
        assert_eq!(
            reg.claim_chunk(&owner, "home", "1", ChunkPos::new(1, 0)).unwrap_err(),
            ClaimError::WrongWorld("home".into())
        );
    }

    #[test]
    fn unclaim_keeps_last_chunk_and_checks_rights() {
        let mut reg = registry();
        let owner = Uuid::new_v4();
        claim_line(&mut reg, owner, "home", 0, 2);
        let stranger = Uuid::new_v4();
        assert_eq!(
            reg.unclaim_chunk(&stranger, WORLD, ChunkPos::new(1, 0)).unwrap_err(),
            ClaimError::NoPermission
        );
        reg.unclaim_chunk(&owner, WORLD, ChunkPos::new(1, 0)).unwrap();
        assert!(reg.claim_at(WORLD, ChunkPos::new(1, 0)).is_none());
        assert_eq!(
            reg.unclaim_chunk(&owner, WORLD, ChunkPos::new(0, 0)).unwrap_err(),
            ClaimError::LastChunk
        );
    }

    #[test]
    fn allocate_and_deallocate_credits() {
        let mut reg = registry();
        let owner = Uuid::new_v4();
        claim_line(&mut reg, owner, "home", 0, 3);
        assert!(matches!(
            reg.allocate(&owner, "home", 1),
            Err(ClaimError::NotEnoughCredits { requested: 1, available: 0 })
        ));
        reg.grant(owner, 5, false);
        let c = reg.allocate(&owner, "home", 4).unwrap();
        assert_eq!((c.total_chunks, c.purchased_chunks), (8, 4));
        assert_eq!(reg.unallocated(&owner), 1);

        assert_eq!(
            reg.deallocate(&owner, "home", 5).unwrap_err(),
            ClaimError::CapacityInUse { free: 4 }
        );
        let c = reg.deallocate(&owner, "home", 3).unwrap();
        assert_eq!((c.total_chunks, c.purchased_chunks), (5, 1));
        assert_eq!(reg.unallocated(&owner), 4);
    }

    #[test]
    fn delete_returns_credits_and_frees_chunks() {
        let mut reg = registry();
        let owner = Uuid::new_v4();
        reg.grant(owner, 3, true);
        claim_line(&mut reg, owner, "home", 0, 6);
        assert_eq!(reg.unallocated(&owner), 1);
        reg.delete_claim(&owner, "home").unwrap();
        assert_eq!(reg.unallocated(&owner), 3);
        assert_eq!(reg.chunk_count(), 0);
    }

    #[test]
    fn migrate_redistributes_and_fixes_capacity() {
        let mut reg = registry();
        let owner = Uuid::new_v4();
        reg.grant(owner, 20, true);
        let a = claim_line(&mut reg, owner, "a", 0, 6);
        let b = claim_line(&mut reg, owner, "b", 2, 8);
        let c = claim_line(&mut reg, owner, "c", 4, 10);
        // Simulate legacy data: capacities out of sync with the pool.
        for id in [a.id, b.id, c.id] {
            let claim = reg.claims.get_mut(&id).unwrap();
            claim.purchased_chunks = 0;
            claim.total_chunks = 4;
        }

        let m = reg.migrate(&owner);
        assert!(!m.report.pool_corrected());
        let caps: Vec<(u32, u32)> = m.claims.iter().map(|c| (c.purchased_chunks, c.total_chunks)).collect();
        assert_eq!(caps, vec![(3, 7), (7, 11), (10, 14)]);
        assert!(m.claims.iter().all(|c| c.deficit() == 0));
        assert_eq!(reg.unallocated(&owner), 0);

        let again = reg.migrate(&owner);
        assert_eq!(again.report.allocations, m.report.allocations);
    }

    #[test]
    fn migrate_raises_pool_when_usage_is_higher() {
        let mut reg = registry();
        let owner = Uuid::new_v4();
        reg.grant(owner, 10, true);
        claim_line(&mut reg, owner, "a", 0, 10);
        reg.set_purchased(owner, 2);
        let m = reg.migrate(&owner);
        assert!(m.report.pool_corrected());
        assert_eq!(m.pool.purchased_chunks, 6);
        assert_eq!(m.claims[0].total_chunks, 10);
    }

    #[test]
    fn migrate_all_covers_pool_only_players() {
        let mut reg = registry();
        let with_claim = Uuid::new_v4();
        let pool_only = Uuid::new_v4();
        claim_line(&mut reg, with_claim, "a", 0, 2);
        reg.grant(pool_only, 5, true);
        let all = reg.migrate_all();
        assert_eq!(all.len(), 2);
        let m = all.iter().find(|m| m.player == pool_only).unwrap();
        assert!(m.claims.is_empty());
        assert_eq!(m.pool.purchased_chunks, 5);
    }

    #[test]
    fn repair_covers_deficit_from_pool() {
        let mut reg = registry();
        let owner = Uuid::new_v4();
        let claim = claim_line(&mut reg, owner, "a", 0, 4);
        for x in 4..7 {
            let c = reg.claims.get_mut(&claim.id).unwrap();
            c.chunks.insert(ChunkPos::new(x, 0));
        }
        reg.grant(owner, 2, true);
        let out = reg.repair_player(&owner);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].covered, 2);
        assert_eq!(out[0].uncovered, 1);
        assert_eq!(out[0].claim.deficit(), 1);
    }

    #[test]
    fn trust_ban_and_settings_need_manage_rights() {
        let mut reg = registry();
        let owner = Uuid::new_v4();
        let friend = Uuid::new_v4();
        let griefer = Uuid::new_v4();
        let claim = claim_line(&mut reg, owner, "a", 0, 1);

        reg.trust(&owner, &claim.id, friend).unwrap();
        assert_eq!(
            reg.set_setting(&friend, &claim.id, SettingKey::Pvp, true).unwrap_err(),
            ClaimError::NoPermission
        );
        reg.set_member(&owner, &claim.id, friend, "Manager").unwrap();
        reg.untrust(&owner, &claim.id, &friend).unwrap();
        let c = reg.set_setting(&friend, &claim.id, SettingKey::Pvp, true).unwrap();
        assert!(c.settings.pvp);

        reg.trust(&owner, &claim.id, griefer).unwrap();
        let c = reg.ban(&friend, &claim.id, griefer).unwrap();
        assert!(!c.trusted.contains(&griefer));
        assert!(!reg.can(&griefer, WORLD, ChunkPos::new(0, 0), ClaimPermission::Interact));
        assert!(reg.can(&griefer, WORLD, ChunkPos::new(9, 9), ClaimPermission::Build));
        assert_eq!(reg.ban(&owner, &claim.id, owner).unwrap_err(), ClaimError::CannotTargetOwner);
        assert_eq!(
            reg.set_member(&owner, &claim.id, friend, "king").unwrap_err(),
            ClaimError::UnknownGroup("king".into())
        );
    }

    #[test]
    fn transfer_moves_credits_with_claim() {
        let mut reg = registry();
        let owner = Uuid::new_v4();
        let buyer = Uuid::new_v4();
        reg.grant(owner, 3, true);
        claim_line(&mut reg, owner, "farm", 0, 6);
        let (claim, old, new) = reg.transfer(&owner, "farm", buyer).unwrap();
        assert_eq!(claim.owner, buyer);
        assert_eq!(old.purchased_chunks, 1);
        assert_eq!(new.purchased_chunks, 2);
        assert_eq!(reg.unallocated(&buyer), 0);
        assert_eq!(reg.unallocated(&owner), 1);
    }

    #[test]
    fn transfer_credits_spends_bonus_first() {
        let mut reg = registry();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        reg.grant(a, 2, true);
        reg.grant(a, 3, false);
        let (payer, receiver) = reg.transfer_credits(a, b, 4).unwrap();
        assert_eq!((payer.purchased_chunks, payer.bonus_chunks), (1, 0));
        assert_eq!(receiver.bonus_chunks, 4);
        assert!(reg.transfer_credits(a, b, 2).is_err());
    }

    #[test]
    fn migrate_keeps_credits_paid_with_bonus() {
        let mut reg = registry();
        let owner = Uuid::new_v4();
        reg.grant(owner, 5, false);
        claim_line(&mut reg, owner, "home", 0, 1);
        reg.allocate(&owner, "home", 4).unwrap();
        for x in 1..8 {
            reg.claim_chunk(&owner, "home", WORLD, ChunkPos::new(x, 0)).unwrap();
        }
        let before = reg.pool(&owner).total_credits();
        assert_eq!(reg.unallocated(&owner), 1);

        let m = reg.migrate(&owner);
        assert!(!m.report.pool_corrected());
        assert_eq!(reg.pool(&owner).total_credits(), before);
        assert_eq!(reg.unallocated(&owner), 1);
        assert_eq!(m.claims[0].deficit(), 0);
    }

    #[test]
    fn paid_tribute_is_not_restored_by_migration() {
        let mut reg = registry();
        let payer = Uuid::new_v4();
        let winner = Uuid::new_v4();
        reg.grant(payer, 2, true);
        reg.grant(payer, 3, false);
        claim_line(&mut reg, payer, "home", 0, 8);
        reg.transfer_credits(payer, winner, 1).unwrap();
        assert_eq!(reg.pool(&payer).total_credits(), 4);

        let all = reg.migrate_all();
        assert!(all.iter().all(|m| !m.report.pool_corrected()));
        assert_eq!(reg.pool(&payer).total_credits(), 4);
        assert_eq!(reg.pool(&winner).total_credits(), 1);
    }

    #[test]
    fn random_operations_conserve_credits() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(0xc1a1);
        for _ in 0..200 {
            let mut reg = registry();
            let players: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
            for (i, p) in players.iter().enumerate() {
                let z = i32::try_from(i).unwrap() * 4;
                reg.create_claim(*p, "home", WORLD, ChunkPos::new(0, z), 0).unwrap();
            }
            let mut expected: u64 = 0;

            for _ in 0..60 {
                let i = rng.gen_range(0..players.len());
                let p = players[i];
                match rng.gen_range(0..6) {
                    0 => {
                        let n = rng.gen_range(1..5);
                        reg.grant(p, n, rng.gen_bool(0.5));
                        expected += u64::from(n);
                    }
                    1 => {
                        let _ = reg.allocate(&p, "home", rng.gen_range(1..4));
                    }
                    2 => {
                        let _ = reg.deallocate(&p, "home", rng.gen_range(1..4));
                    }
                    3 => {
                        let len = reg.find_by_name(&p, "home").unwrap().chunk_count();
                        let x = i32::try_from(len).unwrap();
                        let z = i32::try_from(i).unwrap() * 4;
                        let _ = reg.claim_chunk(&p, "home", WORLD, ChunkPos::new(x, z));
                    }
                    4 => {
                        let to = players[(i + 1) % players.len()];
                        let _ = reg.transfer_credits(p, to, rng.gen_range(1..4));
                    }
                    _ => {
                        let m = reg.migrate(&p);
                        expected += u64::from(m.report.purchased_after - m.report.purchased_before);
                    }
                }

                let total: u64 = players
                    .iter()
                    .map(|p| u64::from(reg.pool(p).total_credits()))
                    .sum();
                assert_eq!(total, expected);
                for p in &players {
                    assert!(reg.unallocated(p) >= 0);
                }
            }
        }
    }

    #[test]
    fn load_drops_double_claimed_chunks() {
        let owner = Uuid::new_v4();
        let mut first = Claim::new(owner, "a".into(), WORLD.into(), 4, 1);
        first.chunks.insert(ChunkPos::new(0, 0));
        let mut second = Claim::new(owner, "b".into(), WORLD.into(), 4, 2);
        second.chunks.insert(ChunkPos::new(0, 0));
        second.chunks.insert(ChunkPos::new(0, 1));
        let reg = ClaimRegistry::load(ClaimRules::default(), vec![second.clone(), first.clone()], vec![]);
        assert_eq!(reg.claim_at(WORLD, ChunkPos::new(0, 0)).unwrap().id, first.id);
        assert_eq!(reg.get(&second.id).unwrap().chunks.len(), 1);
    }

    #[test]
    fn rename_checks_duplicates() {
        let mut reg = registry();
        let owner = Uuid::new_v4();
        claim_line(&mut reg, owner, "a", 0, 1);
        claim_line(&mut reg, owner, "b", 2, 1);
        assert!(matches!(reg.rename(&owner, "a", "B"), Err(ClaimError::DuplicateName(_))));
        assert_eq!(reg.rename(&owner, "a", "A").unwrap().name, "A");
    }
}
