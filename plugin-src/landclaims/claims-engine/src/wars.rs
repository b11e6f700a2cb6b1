//! War state machine.
//!
//! ```text
//! Declared ──prep──▶ Active ◀──resume── Ceasefire
//!     │                │  └──ceasefire──▶   │
//!     └────────────────┴──────▶ Ended ◀─────┘
//! ```
//!
//! Any open war can end by surrender, accepted tribute or admin action.
//! Timeouts end it without a winner. Ending a war leaves the two nations
//! enemies and shields both from new declarations for a while.

use crate::error::WarError;
use crate::nations::NationRegistry;
use claims_types::{NationRelation, RelationKind, TributeStatus, War, WarShield, WarState, WarTribute};
use std::collections::HashMap;
use uuid::Uuid;

/// Loaded from `[wars]` in the plugin config. All durations in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WarRules {
    pub preparation_secs: u64,
    pub ceasefire_secs: u64,
    pub max_duration_secs: u64,
    pub shield_secs: u64,
}

impl Default for WarRules {
    fn default() -> Self {
        Self {
            preparation_secs: 600,
            ceasefire_secs: 1800,
            max_duration_secs: 3 * 86_400,
            shield_secs: 86_400,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Declaration {
    pub war: War,
    pub relation: NationRelation,
    /// The attacker's own shield, removed by declaring.
    pub dropped_shield: Option<WarShield>,
}

/// One state change, with everything that has to be persisted alongside it.
#[derive(Debug, Clone)]
pub struct WarOutcome {
    pub war: War,
    pub from: WarState,
    pub relation: Option<NationRelation>,
    pub shields: Vec<WarShield>,
    /// Pending tributes closed because the war ended.
    pub closed_tributes: Vec<WarTribute>,
}

impl WarOutcome {
    #[must_use]
    pub const fn ended(&self) -> bool {
        matches!(self.war.state, WarState::Ended)
    }
}

#[derive(Debug, Clone)]
pub struct AcceptedTribute {
    pub tribute: WarTribute,
    pub outcome: WarOutcome,
}

#[derive(Debug, Default)]
pub struct WarRegistry {
    rules: WarRules,
    wars: HashMap<Uuid, War>,
    tributes: HashMap<Uuid, WarTribute>,
    shields: HashMap<Uuid, WarShield>,
}

impl WarRegistry {
    #[must_use]
    pub fn new(rules: WarRules) -> Self {
        Self {
            rules,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn load(rules: WarRules, wars: Vec<War>, tributes: Vec<WarTribute>, shields: Vec<WarShield>) -> Self {
        Self {
            rules,
            wars: wars.into_iter().map(|w| (w.id, w)).collect(),
            tributes: tributes.into_iter().map(|t| (t.id, t)).collect(),
            shields: shields.into_iter().map(|s| (s.nation, s)).collect(),
        }
    }

    #[must_use]
    pub const fn rules(&self) -> &WarRules {
        &self.rules
    }

    // ── Queries ──

    #[must_use]
    pub fn get(&self, id: &Uuid) -> Option<&War> {
        self.wars.get(id)
    }

    /// The open war between two nations, in either direction.
    #[must_use]
    pub fn war_between(&self, a: &Uuid, b: &Uuid) -> Option<&War> {
        self.wars
            .values()
            .find(|w| w.state.is_open() && w.involves(a) && w.involves(b))
    }

    /// Open wars a nation takes part in, oldest first.
    #[must_use]
    pub fn wars_of(&self, nation: &Uuid) -> Vec<&War> {
        let mut out: Vec<&War> = self
            .wars
            .values()
            .filter(|w| w.state.is_open() && w.involves(nation))
            .collect();
        out.sort_by_key(|w| w.declared_at);
        out
    }

    #[must_use]
    pub fn open_wars(&self) -> Vec<&War> {
        let mut out: Vec<&War> = self.wars.values().filter(|w| w.state.is_open()).collect();
        out.sort_by_key(|w| w.declared_at);
        out
    }

    #[must_use]
    pub fn shield_of(&self, nation: &Uuid, now: u64) -> Option<&WarShield> {
        self.shields.get(nation).filter(|s| s.is_active(now))
    }

    #[must_use]
    pub fn pending_tributes(&self, war_id: &Uuid) -> Vec<&WarTribute> {
        self.tributes
            .values()
            .filter(|t| t.war_id == *war_id && t.status == TributeStatus::Pending)
            .collect()
    }

    /// Members of two nations may fight only while their war is active.
    #[must_use]
    pub fn pvp_allowed(&self, a: &Uuid, b: &Uuid) -> bool {
        a != b
            && self
                .war_between(a, b)
                .is_some_and(|w| w.state == WarState::Active)
    }

    fn war_mut(&mut self, id: &Uuid) -> Result<&mut War, WarError> {
        self.wars.get_mut(id).ok_or(WarError::NotFound)
    }

    fn participant(&self, war_id: &Uuid, nation: &Uuid) -> Result<&War, WarError> {
        let war = self.wars.get(war_id).ok_or(WarError::NotFound)?;
        if !war.involves(nation) {
            return Err(WarError::NotParticipant);
        }
        Ok(war)
    }

    // ── Transitions ──

    pub fn declare(
        &mut self,
        nations: &mut NationRegistry,
        attacker: Uuid,
        defender: Uuid,
        reason: String,
        now: u64,
    ) -> Result<Declaration, WarError> {
        if attacker == defender {
            return Err(WarError::SameNation);
        }
        if nations.relation(&attacker, &defender) == RelationKind::Ally {
            return Err(WarError::Allied);
        }
        if self.war_between(&attacker, &defender).is_some() {
            return Err(WarError::AlreadyAtWar);
        }
        if let Some(shield) = self.shield_of(&defender, now) {
            return Err(WarError::Shielded((shield.expires_at - now).div_ceil(60)));
        }

        let dropped_shield = self.shields.remove(&attacker);
        let war = War::new(attacker, defender, reason, now);
        self.wars.insert(war.id, war.clone());
        let relation = nations.force_relation(attacker, defender, RelationKind::AtWar, now);
        Ok(Declaration {
            war,
            relation,
            dropped_shield,
        })
    }

    /// Apply timed transitions. Returns one outcome per war that changed.
    pub fn advance(&mut self, nations: &mut NationRegistry, now: u64) -> Vec<WarOutcome> {
        let rules = self.rules;
        let mut due: Vec<(Uuid, WarState)> = self
            .wars
            .values()
            .filter_map(|w| match w.state {
                WarState::Declared if now >= w.declared_at + rules.preparation_secs => {
                    Some((w.id, WarState::Active))
                }
                WarState::Ceasefire
                    if w.ceasefire_at.is_some_and(|t| now >= t + rules.ceasefire_secs) =>
                {
                    Some((w.id, WarState::Ended))
                }
                WarState::Active
                    if w
                        .started_at
                        .is_some_and(|t| now >= t + rules.max_duration_secs) =>
                {
                    Some((w.id, WarState::Ended))
                }
                _ => None,
            })
            .collect();
        due.sort_by_key(|(id, _)| *id);

        let mut out = Vec::with_capacity(due.len());
        for (id, next) in due {
            let Some(war) = self.wars.get_mut(&id) else {
                continue;
            };
            let from = war.state;
            if next == WarState::Active {
                war.state = WarState::Active;
                war.started_at = Some(now);
                out.push(WarOutcome {
                    war: war.clone(),
                    from,
                    relation: None,
                    shields: Vec::new(),
                    closed_tributes: Vec::new(),
                });
            } else if let Ok(outcome) = self.finish(nations, &id, None, now) {
                out.push(outcome);
            }
        }
        out
    }

    pub fn ceasefire(&mut self, war_id: &Uuid, nation: &Uuid, now: u64) -> Result<War, WarError> {
        self.participant(war_id, nation)?;
        let war = self.war_mut(war_id)?;
        if war.state != WarState::Active {
            return Err(WarError::InvalidTransition {
                from: war.state,
                action: "call a ceasefire in",
            });
        }
        war.state = WarState::Ceasefire;
        war.ceasefire_at = Some(now);
        Ok(war.clone())
    }

    pub fn resume(&mut self, war_id: &Uuid, nation: &Uuid) -> Result<War, WarError> {
        self.participant(war_id, nation)?;
        let war = self.war_mut(war_id)?;
        if war.state != WarState::Ceasefire {
            return Err(WarError::InvalidTransition {
                from: war.state,
                action: "resume",
            });
        }
        war.state = WarState::Active;
        war.ceasefire_at = None;
        Ok(war.clone())
    }

    pub fn surrender(
        &mut self,
        nations: &mut NationRegistry,
        war_id: &Uuid,
        nation: &Uuid,
        now: u64,
    ) -> Result<WarOutcome, WarError> {
        let winner = self
            .participant(war_id, nation)?
            .opponent(nation)
            .ok_or(WarError::NotParticipant)?;
        self.finish(nations, war_id, Some(winner), now)
    }

    /// Administrative end. `winner` must take part in the war when given.
    pub fn end(
        &mut self,
        nations: &mut NationRegistry,
        war_id: &Uuid,
        winner: Option<Uuid>,
        now: u64,
    ) -> Result<WarOutcome, WarError> {
        if let Some(w) = winner {
            self.participant(war_id, &w)?;
        }
        self.finish(nations, war_id, winner, now)
    }

    fn finish(
        &mut self,
        nations: &mut NationRegistry,
        war_id: &Uuid,
        winner: Option<Uuid>,
        now: u64,
    ) -> Result<WarOutcome, WarError> {
        let shield_secs = self.rules.shield_secs;
        let war = self.war_mut(war_id)?;
        if !war.state.is_open() {
            return Err(WarError::InvalidTransition {
                from: war.state,
                action: "end",
            });
        }
        let from = war.state;
        war.state = WarState::Ended;
        war.ended_at = Some(now);
        war.winner = winner;
        let war = war.clone();

        let relation = nations.force_relation(war.attacker, war.defender, RelationKind::Enemy, now);
        let shields: Vec<WarShield> = [war.attacker, war.defender]
            .into_iter()
            .map(|nation| WarShield {
                nation,
                expires_at: now + shield_secs,
            })
            .collect();
        for s in &shields {
            self.shields.insert(s.nation, s.clone());
        }
        let closed_tributes = self.close_tributes(&war.id);

        Ok(WarOutcome {
            war,
            from,
            relation: Some(relation),
            shields,
            closed_tributes,
        })
    }

    fn close_tributes(&mut self, war_id: &Uuid) -> Vec<WarTribute> {
        self.tributes
            .values_mut()
            .filter(|t| t.war_id == *war_id && t.status == TributeStatus::Pending)
            .map(|t| {
                t.status = TributeStatus::Rejected;
                t.clone()
            })
            .collect()
    }

    /// A nation was disbanded: its open wars end without a winner or shields.
    pub fn nation_disbanded(&mut self, nation: &Uuid, now: u64) -> Vec<WarOutcome> {
        let ids: Vec<Uuid> = self.wars_of(nation).iter().map(|w| w.id).collect();
        self.shields.remove(nation);
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(war) = self.wars.get_mut(&id) else {
                continue;
            };
            let from = war.state;
            war.state = WarState::Ended;
            war.ended_at = Some(now);
            let war = war.clone();
            out.push(WarOutcome {
                war,
                from,
                relation: None,
                shields: Vec::new(),
                closed_tributes: self.close_tributes(&id),
            });
        }
        out
    }

    // ── Tributes ──

    pub fn offer_tribute(
        &mut self,
        war_id: &Uuid,
        from: Uuid,
        amount: u32,
        now: u64,
    ) -> Result<WarTribute, WarError> {
        if amount == 0 {
            return Err(WarError::InvalidAmount);
        }
        let war = self.participant(war_id, &from)?;
        if !war.state.is_open() {
            return Err(WarError::InvalidTransition {
                from: war.state,
                action: "offer tribute in",
            });
        }
        let to = war.opponent(&from).ok_or(WarError::NotParticipant)?;
        if self
            .pending_tributes(war_id)
            .iter()
            .any(|t| t.from_nation == from)
        {
            return Err(WarError::TributePending);
        }
        let tribute = WarTribute {
            id: Uuid::new_v4(),
            war_id: *war_id,
            from_nation: from,
            to_nation: to,
            amount,
            status: TributeStatus::Pending,
            offered_at: now,
        };
        self.tributes.insert(tribute.id, tribute.clone());
        Ok(tribute)
    }

    fn pending_for(&self, war_id: &Uuid, receiver: &Uuid) -> Result<Uuid, WarError> {
        self.participant(war_id, receiver)?;
        self.pending_tributes(war_id)
            .into_iter()
            .find(|t| t.to_nation == *receiver)
            .map(|t| t.id)
            .ok_or(WarError::NoPendingTribute)
    }

    /// Accepting ends the war with the receiver as winner. The caller moves
    /// `tribute.amount` credits between the two nations.
    pub fn accept_tribute(
        &mut self,
        nations: &mut NationRegistry,
        war_id: &Uuid,
        by: &Uuid,
        now: u64,
    ) -> Result<AcceptedTribute, WarError> {
        let id = self.pending_for(war_id, by)?;
        if let Some(t) = self.tributes.get_mut(&id) {
            t.status = TributeStatus::Accepted;
        }
        let outcome = self.finish(nations, war_id, Some(*by), now)?;
        let tribute = self.tributes.get(&id).cloned().ok_or(WarError::NoPendingTribute)?;
        Ok(AcceptedTribute { tribute, outcome })
    }

    pub fn reject_tribute(&mut self, war_id: &Uuid, by: &Uuid) -> Result<WarTribute, WarError> {
        let id = self.pending_for(war_id, by)?;
        let tribute = self.tributes.get_mut(&id).ok_or(WarError::NoPendingTribute)?;
        tribute.status = TributeStatus::Rejected;
        Ok(tribute.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nations::NationRules;

    struct Setup {
        nations: NationRegistry,
        wars: WarRegistry,
        red: Uuid,
        blue: Uuid,
        red_leader: Uuid,
    }

    fn setup() -> Setup {
        let mut nations = NationRegistry::new(NationRules::default());
        let red_leader = Uuid::new_v4();
        let red = nations.create("Red", red_leader, 0).unwrap().id;
        let blue = nations.create("Blue", Uuid::new_v4(), 0).unwrap().id;
        Setup {
            nations,
            wars: WarRegistry::new(WarRules::default()),
            red,
            blue,
            red_leader,
        }
    }

    fn declared(s: &mut Setup, now: u64) -> Uuid {
        s.wars
            .declare(&mut s.nations, s.red, s.blue, "land".into(), now)
            .unwrap()
            .war
            .id
    }

    #[test]
    fn declare_sets_at_war_and_rejects_duplicates() {
        let mut s = setup();
        declared(&mut s, 0);
        assert_eq!(s.nations.relation(&s.red, &s.blue), RelationKind::AtWar);
        let again = s.wars.declare(&mut s.nations, s.blue, s.red, String::new(), 1);
        assert_eq!(again.unwrap_err(), WarError::AlreadyAtWar);
        let own = s.wars.declare(&mut s.nations, s.red, s.red, String::new(), 1);
        assert_eq!(own.unwrap_err(), WarError::SameNation);
    }

    #[test]
    fn allies_cannot_declare() {
        let mut s = setup();
        s.nations.force_relation(s.red, s.blue, RelationKind::Ally, 0);
        let r = s.wars.declare(&mut s.nations, s.red, s.blue, String::new(), 0);
        assert_eq!(r.unwrap_err(), WarError::Allied);
    }

    #[test]
    fn timed_transitions() {
        let mut s = setup();
        let id = declared(&mut s, 0);
        let rules = *s.wars.rules();

        assert!(s.wars.advance(&mut s.nations, rules.preparation_secs - 1).is_empty());
        assert!(!s.wars.pvp_allowed(&s.red, &s.blue));

        let out = s.wars.advance(&mut s.nations, rules.preparation_secs);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].war.state, WarState::Active);
        assert!(s.wars.pvp_allowed(&s.blue, &s.red));

        let start = rules.preparation_secs;
        let out = s.wars.advance(&mut s.nations, start + rules.max_duration_secs);
        assert!(out[0].ended());
        assert_eq!(out[0].war.winner, None);
        assert_eq!(s.wars.get(&id).map(|w| w.state), Some(WarState::Ended));
        assert_eq!(s.nations.relation(&s.red, &s.blue), RelationKind::Enemy);
    }

    #[test]
    fn ceasefire_times_out_and_resume_restores() {
        let mut s = setup();
        let id = declared(&mut s, 0);
        assert!(matches!(
            s.wars.ceasefire(&id, &s.red, 1),
            Err(WarError::InvalidTransition { from: WarState::Declared, .. })
        ));
        s.wars.advance(&mut s.nations, 600);
        s.wars.ceasefire(&id, &s.blue, 700).unwrap();
        assert!(!s.wars.pvp_allowed(&s.red, &s.blue));
        s.wars.resume(&id, &s.red).unwrap();
        assert!(s.wars.pvp_allowed(&s.red, &s.blue));

        s.wars.ceasefire(&id, &s.red, 800).unwrap();
        let out = s.wars.advance(&mut s.nations, 800 + 1800);
        assert!(out[0].ended());
        assert_eq!(out[0].from, WarState::Ceasefire);
    }

    #[test]
    fn surrender_gives_other_side_the_win_and_shields() {
        let mut s = setup();
        let id = declared(&mut s, 0);
        let outcome = s.wars.surrender(&mut s.nations, &id, &s.blue, 50).unwrap();
        assert_eq!(outcome.war.winner, Some(s.red));
        assert_eq!(outcome.shields.len(), 2);
        let again = s.wars.declare(&mut s.nations, s.red, s.blue, String::new(), 60);
        assert_eq!(again.unwrap_err(), WarError::Shielded(1440));
        assert!(s.wars.surrender(&mut s.nations, &id, &s.blue, 70).is_err());
    }

    #[test]
    fn declaring_drops_attackers_shield() {
        let mut s = setup();
        let id = declared(&mut s, 0);
        s.wars.end(&mut s.nations, &id, None, 10).unwrap();
        let green = s.nations.create("Green", Uuid::new_v4(), 0).unwrap().id;
        let d = s.wars.declare(&mut s.nations, s.red, green, String::new(), 20).unwrap();
        assert!(d.dropped_shield.is_some());
        assert!(s.wars.shield_of(&s.red, 20).is_none());
        assert!(s.wars.shield_of(&s.blue, 20).is_some());
    }

    #[test]
    fn tribute_flow() {
        let mut s = setup();
        let id = declared(&mut s, 0);
        assert_eq!(s.wars.offer_tribute(&id, s.blue, 0, 1).unwrap_err(), WarError::InvalidAmount);
        s.wars.offer_tribute(&id, s.blue, 8, 1).unwrap();
        assert_eq!(s.wars.offer_tribute(&id, s.blue, 3, 2).unwrap_err(), WarError::TributePending);
        assert_eq!(s.wars.reject_tribute(&id, &s.blue).unwrap_err(), WarError::NoPendingTribute);

        s.wars.reject_tribute(&id, &s.red).unwrap();
        s.wars.offer_tribute(&id, s.blue, 12, 3).unwrap();
        let accepted = s.wars.accept_tribute(&mut s.nations, &id, &s.red, 4).unwrap();
        assert_eq!(accepted.tribute.amount, 12);
        assert_eq!(accepted.tribute.status, TributeStatus::Accepted);
        assert_eq!(accepted.outcome.war.winner, Some(s.red));
        assert!(s.wars.war_between(&s.red, &s.blue).is_none());
    }

    #[test]
    fn ending_closes_pending_tributes() {
        let mut s = setup();
        let id = declared(&mut s, 0);
        s.wars.offer_tribute(&id, s.red, 5, 1).unwrap();
        let outcome = s.wars.end(&mut s.nations, &id, Some(s.blue), 2).unwrap();
        assert_eq!(outcome.closed_tributes.len(), 1);
        assert!(s.wars.pending_tributes(&id).is_empty());
        assert!(s.wars.end(&mut s.nations, &id, Some(Uuid::new_v4()), 3).is_err());
    }

    #[test]
    fn disbanding_ends_wars() {
        let mut s = setup();
        declared(&mut s, 0);
        s.nations.disband(&s.red_leader).unwrap();
        let ended = s.wars.nation_disbanded(&s.red, 5);
        assert_eq!(ended.len(), 1);
        assert!(s.wars.wars_of(&s.blue).is_empty());
    }
}
