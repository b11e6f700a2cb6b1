//! Nation registry: membership, roles, nation claims and relations.

use crate::error::NationError;
use claims_types::{Claim, Nation, NationMember, NationRelation, NationRole, RelationKind};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Loaded from `[nations]` in the plugin config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NationRules {
    pub max_members: usize,
    pub max_name_len: usize,
}

impl Default for NationRules {
    fn default() -> Self {
        Self {
            max_members: 50,
            max_name_len: 24,
        }
    }
}

/// What an alliance request led to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllianceOutcome {
    /// Waiting for the other nation to request as well.
    Requested,
    Formed(NationRelation),
}

/// A nation that was disbanded, and the relations that went with it.
#[derive(Debug, Clone)]
pub struct Disbanded {
    pub nation: Nation,
    pub relations: Vec<NationRelation>,
}

#[derive(Debug, Default)]
pub struct NationRegistry {
    rules: NationRules,
    nations: HashMap<Uuid, Nation>,
    /// Player → nation.
    members: HashMap<Uuid, Uuid>,
    relations: HashMap<(Uuid, Uuid), NationRelation>,
    /// (requesting nation, target nation). Not persisted.
    ally_requests: HashSet<(Uuid, Uuid)>,
}

impl NationRegistry {
    #[must_use]
    pub fn new(rules: NationRules) -> Self {
        Self {
            rules,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn load(rules: NationRules, nations: Vec<Nation>, relations: Vec<NationRelation>) -> Self {
        let mut registry = Self::new(rules);
        for nation in nations {
            for member in nation.members.keys() {
                registry.members.insert(*member, nation.id);
            }
            registry.nations.insert(nation.id, nation);
        }
        for relation in relations {
            if registry.nations.contains_key(&relation.a) && registry.nations.contains_key(&relation.b) {
                registry
                    .relations
                    .insert(NationRelation::key(relation.a, relation.b), relation);
            }
        }
        registry
    }

    // ── Queries ──

    #[must_use]
    pub fn get(&self, id: &Uuid) -> Option<&Nation> {
        self.nations.get(id)
    }

    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<&Nation> {
        self.nations
            .values()
            .find(|n| n.name.eq_ignore_ascii_case(name))
    }

    #[must_use]
    pub fn nation_of(&self, player: &Uuid) -> Option<&Nation> {
        self.members.get(player).and_then(|id| self.nations.get(id))
    }

    /// Nation owning a claim, if the claim was contributed to one.
    #[must_use]
    pub fn nation_of_claim(&self, claim_id: &Uuid) -> Option<&Nation> {
        self.nations.values().find(|n| n.claims.contains(claim_id))
    }

    /// All nations, sorted by name.
    #[must_use]
    pub fn all(&self) -> Vec<&Nation> {
        let mut out: Vec<&Nation> = self.nations.values().collect();
        out.sort_by_key(|n| n.name.to_lowercase());
        out
    }

    #[must_use]
    pub fn relation(&self, a: &Uuid, b: &Uuid) -> RelationKind {
        if a == b {
            return RelationKind::Ally;
        }
        self.relations
            .get(&NationRelation::key(*a, *b))
            .map_or(RelationKind::Neutral, |r| r.kind)
    }

    #[must_use]
    pub fn relations_of(&self, nation: &Uuid) -> Vec<&NationRelation> {
        self.relations.values().filter(|r| r.involves(nation)).collect()
    }

    #[must_use]
    pub fn has_ally_request(&self, from: &Uuid, to: &Uuid) -> bool {
        self.ally_requests.contains(&(*from, *to))
    }

    fn nation_id_of(&self, player: &Uuid) -> Result<Uuid, NationError> {
        self.members.get(player).copied().ok_or(NationError::NotInNation)
    }

    /// The player's nation id, if their role is at least `min`.
    pub fn authorize(&self, player: &Uuid, min: NationRole) -> Result<Uuid, NationError> {
        let id = self.nation_id_of(player)?;
        let role = self
            .nations
            .get(&id)
            .and_then(|n| n.role_of(player))
            .ok_or(NationError::NotInNation)?;
        if role < min {
            return Err(NationError::NoPermission(match min {
                NationRole::Leader => "leader",
                NationRole::Officer => "officer",
                NationRole::Member => "member",
            }));
        }
        Ok(id)
    }

    fn target_id(&self, name: &str) -> Result<Uuid, NationError> {
        self.find_by_name(name)
            .map(|n| n.id)
            .ok_or_else(|| NationError::NotFound(name.to_owned()))
    }

    fn nation_mut(&mut self, id: &Uuid) -> Result<&mut Nation, NationError> {
        self.nations
            .get_mut(id)
            .ok_or_else(|| NationError::NotFound(id.to_string()))
    }

    // ── Lifecycle & membership ──

    pub fn create(&mut self, name: &str, leader: Uuid, now: u64) -> Result<Nation, NationError> {
        let len_ok = (3..=self.rules.max_name_len).contains(&name.len());
        if !len_ok
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(NationError::InvalidName(self.rules.max_name_len));
        }
        if self.members.contains_key(&leader) {
            return Err(NationError::AlreadyInNation);
        }
        if self.find_by_name(name).is_some() {
            return Err(NationError::NameTaken(name.to_owned()));
        }
        let nation = Nation::new(name.to_owned(), leader, now);
        self.members.insert(leader, nation.id);
        self.nations.insert(nation.id, nation.clone());
        Ok(nation)
    }

    pub fn disband(&mut self, actor: &Uuid) -> Result<Disbanded, NationError> {
        let id = self.authorize(actor, NationRole::Leader)?;
        let nation = self
            .nations
            .remove(&id)
            .ok_or_else(|| NationError::NotFound(id.to_string()))?;
        self.members.retain(|_, n| *n != id);
        self.ally_requests.retain(|(a, b)| *a != id && *b != id);
        let keys: Vec<(Uuid, Uuid)> = self
            .relations
            .iter()
            .filter(|(_, r)| r.involves(&id))
            .map(|(k, _)| *k)
            .collect();
        let relations = keys
            .iter()
            .filter_map(|k| self.relations.remove(k))
            .collect();
        Ok(Disbanded { nation, relations })
    }

    pub fn invite(&mut self, actor: &Uuid, target: Uuid) -> Result<Nation, NationError> {
        let id = self.authorize(actor, NationRole::Officer)?;
        if *actor == target {
            return Err(NationError::CannotTargetSelf);
        }
        if self.members.contains_key(&target) {
            return Err(NationError::TargetInNation);
        }
        let nation = self.nation_mut(&id)?;
        if !nation.invites.insert(target) {
            return Err(NationError::AlreadyInvited);
        }
        Ok(nation.clone())
    }

    pub fn join(&mut self, player: Uuid, nation_name: &str, now: u64) -> Result<Nation, NationError> {
        if self.members.contains_key(&player) {
            return Err(NationError::AlreadyInNation);
        }
        let id = self.target_id(nation_name)?;
        let max = self.rules.max_members;
        let nation = self.nation_mut(&id)?;
        if !nation.invites.contains(&player) {
            return Err(NationError::NotInvited(nation.name.clone()));
        }
        if nation.members.len() >= max {
            return Err(NationError::Full(max));
        }
        nation.invites.remove(&player);
        nation.members.insert(
            player,
            NationMember {
                uuid: player,
                role: NationRole::Member,
                joined_at: now,
            },
        );
        let nation = nation.clone();
        self.members.insert(player, id);
        Ok(nation)
    }

    /// Leave the nation. `owned_claims` are the leaving player's claims;
    /// they are withdrawn from the nation.
    pub fn leave(&mut self, player: &Uuid, owned_claims: &[Uuid]) -> Result<Nation, NationError> {
        let id = self.nation_id_of(player)?;
        let nation = self.nation_mut(&id)?;
        if nation.leader == *player && nation.members.len() > 1 {
            return Err(NationError::LeaderCannotLeave);
        }
        if nation.leader == *player {
            // Sole member: leaving dissolves the nation.
            return self.disband(player).map(|d| d.nation);
        }
        nation.members.remove(player);
        for claim in owned_claims {
            nation.claims.remove(claim);
        }
        let nation = nation.clone();
        self.members.remove(player);
        Ok(nation)
    }

    pub fn kick(&mut self, actor: &Uuid, target: &Uuid, owned_claims: &[Uuid]) -> Result<Nation, NationError> {
        let id = self.authorize(actor, NationRole::Officer)?;
        if actor == target {
            return Err(NationError::CannotTargetSelf);
        }
        let nation = self.nation_mut(&id)?;
        let actor_role = nation.role_of(actor).ok_or(NationError::NotInNation)?;
        let target_role = nation.role_of(target).ok_or(NationError::TargetNotMember)?;
        if target_role >= actor_role {
            return Err(NationError::Outranked);
        }
        nation.members.remove(target);
        for claim in owned_claims {
            nation.claims.remove(claim);
        }
        let nation = nation.clone();
        self.members.remove(target);
        Ok(nation)
    }

    pub fn promote(&mut self, actor: &Uuid, target: &Uuid) -> Result<Nation, NationError> {
        let id = self.authorize(actor, NationRole::Leader)?;
        let nation = self.nation_mut(&id)?;
        let member = nation.members.get_mut(target).ok_or(NationError::TargetNotMember)?;
        if member.role != NationRole::Member {
            return Err(NationError::CannotPromote(member.role.to_string()));
        }
        member.role = NationRole::Officer;
        Ok(nation.clone())
    }

    pub fn demote(&mut self, actor: &Uuid, target: &Uuid) -> Result<Nation, NationError> {
        let id = self.authorize(actor, NationRole::Leader)?;
        let nation = self.nation_mut(&id)?;
        let member = nation.members.get_mut(target).ok_or(NationError::TargetNotMember)?;
        if member.role != NationRole::Officer {
            return Err(NationError::CannotDemote(member.role.to_string()));
        }
        member.role = NationRole::Member;
        Ok(nation.clone())
    }

    // ── Claims ──

    pub fn add_claim(&mut self, actor: &Uuid, claim: &Claim) -> Result<Nation, NationError> {
        let id = self.authorize(actor, NationRole::Officer)?;
        if self.nation_of_claim(&claim.id).is_some() {
            return Err(NationError::ClaimAlreadyInNation);
        }
        let nation = self.nation_mut(&id)?;
        if !nation.is_member(&claim.owner) {
            return Err(NationError::ClaimNotOwnedByMember);
        }
        nation.claims.insert(claim.id);
        Ok(nation.clone())
    }

    pub fn remove_claim(&mut self, actor: &Uuid, claim_id: &Uuid) -> Result<Nation, NationError> {
        let id = self.authorize(actor, NationRole::Officer)?;
        let nation = self.nation_mut(&id)?;
        if !nation.claims.remove(claim_id) {
            return Err(NationError::ClaimNotInNation);
        }
        Ok(nation.clone())
    }

    /// Drop a deleted claim from whichever nation held it.
    pub fn forget_claim(&mut self, claim_id: &Uuid) -> Option<Nation> {
        let nation = self.nations.values_mut().find(|n| n.claims.contains(claim_id))?;
        nation.claims.remove(claim_id);
        Some(nation.clone())
    }

    // ── Relations ──

    fn relation_target(&self, actor: &Uuid, target_name: &str) -> Result<(Uuid, Uuid), NationError> {
        let own = self.authorize(actor, NationRole::Officer)?;
        let other = self.target_id(target_name)?;
        if own == other {
            return Err(NationError::SameNation);
        }
        if self.relation(&own, &other) == RelationKind::AtWar {
            return Err(NationError::AtWar);
        }
        Ok((own, other))
    }

    /// Ask for an alliance; it forms once both sides have asked.
    pub fn request_alliance(
        &mut self,
        actor: &Uuid,
        target_name: &str,
        now: u64,
    ) -> Result<AllianceOutcome, NationError> {
        let (own, other) = self.relation_target(actor, target_name)?;
        if self.relation(&own, &other) == RelationKind::Ally {
            return Err(NationError::AlreadyRelated(RelationKind::Ally));
        }
        if self.ally_requests.remove(&(other, own)) {
            self.ally_requests.remove(&(own, other));
            let relation = NationRelation::new(own, other, RelationKind::Ally, now);
            self.relations
                .insert(NationRelation::key(own, other), relation.clone());
            return Ok(AllianceOutcome::Formed(relation));
        }
        self.ally_requests.insert((own, other));
        Ok(AllianceOutcome::Requested)
    }

    pub fn set_enemy(&mut self, actor: &Uuid, target_name: &str, now: u64) -> Result<NationRelation, NationError> {
        let (own, other) = self.relation_target(actor, target_name)?;
        if self.relation(&own, &other) == RelationKind::Enemy {
            return Err(NationError::AlreadyRelated(RelationKind::Enemy));
        }
        self.ally_requests.remove(&(own, other));
        self.ally_requests.remove(&(other, own));
        let relation = NationRelation::new(own, other, RelationKind::Enemy, now);
        self.relations
            .insert(NationRelation::key(own, other), relation.clone());
        Ok(relation)
    }

    /// Reset to neutral. Returns the pair key that was cleared.
    pub fn set_neutral(&mut self, actor: &Uuid, target_name: &str) -> Result<(Uuid, Uuid), NationError> {
        let (own, other) = self.relation_target(actor, target_name)?;
        let key = NationRelation::key(own, other);
        if self.relations.remove(&key).is_none() {
            return Err(NationError::AlreadyRelated(RelationKind::Neutral));
        }
        self.ally_requests.remove(&(own, other));
        Ok(key)
    }

    /// Set a relation without permission checks. Used by the war engine.
    pub fn force_relation(&mut self, a: Uuid, b: Uuid, kind: RelationKind, now: u64) -> NationRelation {
        self.ally_requests.remove(&(a, b));
        self.ally_requests.remove(&(b, a));
        let relation = NationRelation::new(a, b, kind, now);
        self.relations
            .insert(NationRelation::key(a, b), relation.clone());
        relation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct World {
        reg: NationRegistry,
        leader: Uuid,
        officer: Uuid,
        member: Uuid,
        nation: Uuid,
    }

    fn world() -> World {
        let mut reg = NationRegistry::new(NationRules::default());
        let leader = Uuid::new_v4();
        let officer = Uuid::new_v4();
        let member = Uuid::new_v4();
        let nation = reg.create("Avalon", leader, 0).unwrap().id;
        for p in [officer, member] {
            reg.invite(&leader, p).unwrap();
            reg.join(p, "avalon", 1).unwrap();
        }
        reg.promote(&leader, &officer).unwrap();
        World { reg, leader, officer, member, nation }
    }

    #[test]
    fn create_rejects_duplicates_and_members() {
        let mut w = world();
        assert_eq!(
            w.reg.create("AVALON", Uuid::new_v4(), 0).unwrap_err(),
            NationError::NameTaken("AVALON".into())
        );
        assert_eq!(w.reg.create("Other", w.member, 0).unwrap_err(), NationError::AlreadyInNation);
        assert_eq!(w.reg.create("x", Uuid::new_v4(), 0).unwrap_err(), NationError::InvalidName(24));
    }

    #[test]
    fn join_requires_invite_and_space() {
        let mut w = world();
        let outsider = Uuid::new_v4();
        assert_eq!(
            w.reg.join(outsider, "Avalon", 2).unwrap_err(),
            NationError::NotInvited("Avalon".into())
        );
        assert_eq!(
            w.reg.invite(&w.member, outsider).unwrap_err(),
            NationError::NoPermission("officer")
        );
        w.reg.invite(&w.officer, outsider).unwrap();
        assert_eq!(w.reg.invite(&w.officer, outsider).unwrap_err(), NationError::AlreadyInvited);

        let mut small = NationRegistry::new(NationRules { max_members: 1, max_name_len: 24 });
        let l = Uuid::new_v4();
        let p = Uuid::new_v4();
        small.create("Tiny", l, 0).unwrap();
        small.invite(&l, p).unwrap();
        assert_eq!(small.join(p, "Tiny", 0).unwrap_err(), NationError::Full(1));
    }

    #[test]
    fn kick_respects_rank() {
        let mut w = world();
        assert_eq!(w.reg.kick(&w.officer, &w.leader, &[]).unwrap_err(), NationError::Outranked);
        let n = w.reg.kick(&w.officer, &w.member, &[]).unwrap();
        assert!(!n.is_member(&w.member));
        assert!(w.reg.nation_of(&w.member).is_none());
    }

    #[test]
    fn leader_leaving_alone_disbands() {
        let mut w = world();
        assert_eq!(w.reg.leave(&w.leader, &[]).unwrap_err(), NationError::LeaderCannotLeave);
        w.reg.leave(&w.member, &[]).unwrap();
        w.reg.leave(&w.officer, &[]).unwrap();
        w.reg.leave(&w.leader, &[]).unwrap();
        assert!(w.reg.get(&w.nation).is_none());
        assert!(w.reg.nation_of(&w.leader).is_none());
    }

    #[test]
    fn promote_and_demote_are_leader_only() {
        let mut w = world();
        assert_eq!(
            w.reg.promote(&w.officer, &w.member).unwrap_err(),
            NationError::NoPermission("leader")
        );
        assert!(matches!(w.reg.promote(&w.leader, &w.officer), Err(NationError::CannotPromote(_))));
        let n = w.reg.demote(&w.leader, &w.officer).unwrap();
        assert_eq!(n.role_of(&w.officer), Some(NationRole::Member));
    }

    #[test]
    fn claims_must_belong_to_members() {
        let mut w = world();
        let own = Claim::new(w.member, "farm".into(), "0".into(), 4, 0);
        let foreign = Claim::new(Uuid::new_v4(), "x".into(), "0".into(), 4, 0);
        assert_eq!(
            w.reg.add_claim(&w.officer, &foreign).unwrap_err(),
            NationError::ClaimNotOwnedByMember
        );
        w.reg.add_claim(&w.officer, &own).unwrap();
        assert_eq!(w.reg.nation_of_claim(&own.id).map(|n| n.id), Some(w.nation));
        assert_eq!(
            w.reg.add_claim(&w.leader, &own).unwrap_err(),
            NationError::ClaimAlreadyInNation
        );
        let n = w.reg.leave(&w.member, &[own.id]).unwrap();
        assert!(!n.claims.contains(&own.id));
    }

    #[test]
    fn alliance_needs_both_sides() {
        let mut w = world();
        let other_leader = Uuid::new_v4();
        let other = w.reg.create("Brittany", other_leader, 0).unwrap().id;

        assert_eq!(
            w.reg.request_alliance(&w.officer, "Brittany", 5).unwrap(),
            AllianceOutcome::Requested
        );
        assert_eq!(w.reg.relation(&w.nation, &other), RelationKind::Neutral);
        let formed = w.reg.request_alliance(&other_leader, "Avalon", 6).unwrap();
        assert!(matches!(formed, AllianceOutcome::Formed(_)));
        assert_eq!(w.reg.relation(&other, &w.nation), RelationKind::Ally);

        w.reg.set_enemy(&w.leader, "Brittany", 7).unwrap();
        assert_eq!(w.reg.relation(&w.nation, &other), RelationKind::Enemy);
        w.reg.set_neutral(&w.leader, "Brittany").unwrap();
        assert_eq!(w.reg.relation(&w.nation, &other), RelationKind::Neutral);
        assert_eq!(
            w.reg.set_neutral(&w.leader, "Brittany").unwrap_err(),
            NationError::AlreadyRelated(RelationKind::Neutral)
        );
    }

    #[test]
    fn war_locks_relations_and_disband_clears_them() {
        let mut w = world();
        let other_leader = Uuid::new_v4();
        let other = w.reg.create("Brittany", other_leader, 0).unwrap().id;
        w.reg.force_relation(w.nation, other, RelationKind::AtWar, 1);
        assert_eq!(w.reg.set_enemy(&w.leader, "Brittany", 2).unwrap_err(), NationError::AtWar);
        assert_eq!(w.reg.request_alliance(&w.leader, "Avalon", 2).unwrap_err(), NationError::SameNation);

        let d = w.reg.disband(&other_leader).unwrap();
        assert_eq!(d.relations.len(), 1);
        assert!(w.reg.relations_of(&w.nation).is_empty());
    }

    #[test]
    fn load_rebuilds_member_index() {
        let w = world();
        let nations: Vec<Nation> = w.reg.all().into_iter().cloned().collect();
        let reg = NationRegistry::load(NationRules::default(), nations, vec![]);
        assert_eq!(reg.nation_of(&w.member).map(|n| n.id), Some(w.nation));
    }
}
