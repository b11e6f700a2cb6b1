//! Proportional redistribution of a player's purchased chunk credits across
//! their claims.
//!
//! Claims created under per-claim purchasing and the global pool can drift
//! apart. The rebalancer gives every claim a share of the player's purchased
//! credits proportional to how far it has grown past the starting size:
//!
//! 1. `above[i] = max(0, chunks[i] - starting)` and `T = Σ above`.
//! 2. `P = max(purchased, T)`. When `T` exceeds what the player owns in
//!    purchased and bonus credits together, purchased is raised by the
//!    shortfall and the caller persists it.
//! 3. `alloc[i] = round(above[i] * P / T)`, the last claim taking
//!    `P - Σ previous` so the total is conserved exactly.
//! 4. `T == 0` gives every claim nothing.
//!
//! When earlier claims round up far enough that the remainder left for the
//! last claim is negative, credits are moved back from claims holding more
//! than they use until it reaches zero. A non-negative remainder below the
//! last claim's usage is left as a deficit.

use uuid::Uuid;

/// Input row: one claim and how many chunks it holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimUsage {
    pub claim_id: Uuid,
    pub chunks_claimed: u32,
}

/// Output row: purchased credits assigned to one claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    pub claim_id: Uuid,
    pub claimed_above_starting: u32,
    pub purchased: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebalanceReport {
    /// Same order as the input.
    pub allocations: Vec<Allocation>,
    pub purchased_before: u32,
    /// Equals `purchased_before` unless usage exceeded purchased plus bonus.
    pub purchased_after: u32,
    /// Credits handed out across the claims, `max(purchased_before, T)`.
    pub distributed: u32,
    /// `P - Σ round(above[i] * P / T)` over every claim, before the last
    /// claim absorbs the remainder.
    pub rounding_drift: i64,
    /// Credits moved between claims to cover a negative last allocation.
    pub repaired: u32,
}

impl RebalanceReport {
    /// Whether the stored purchased total was lower than actual usage.
    #[must_use]
    pub const fn pool_corrected(&self) -> bool {
        self.purchased_after != self.purchased_before
    }

    /// Off-by-one drift is expected from rounding; anything larger points
    /// at inconsistent input data.
    #[must_use]
    pub const fn drift_tolerated(&self) -> bool {
        self.rounding_drift.abs() <= 1
    }

    #[must_use]
    pub fn allocated(&self) -> u64 {
        self.allocations.iter().map(|a| u64::from(a.purchased)).sum()
    }
}

/// Round-half-up of `above * p / total` in integer arithmetic.
fn proportional_share(above: u64, p: u64, total: u64) -> u64 {
    (2 * above * p + total) / (2 * total)
}

/// Distribute `purchased` credits across `claims`. `bonus` credits already
/// owned by the player count against the pool correction but are not
/// distributed themselves.
#[must_use]
pub fn rebalance(
    claims: &[ClaimUsage],
    starting_chunks: u32,
    purchased: u32,
    bonus: u32,
) -> RebalanceReport {
    let above: Vec<u64> = claims
        .iter()
        .map(|c| u64::from(c.chunks_claimed.saturating_sub(starting_chunks)))
        .collect();
    let total: u64 = above.iter().sum();
    let owned = u64::from(purchased) + u64::from(bonus);
    let purchased_after = u64::from(purchased) + total.saturating_sub(owned);
    let p = u64::from(purchased).max(total);

    let mut alloc: Vec<i64> = vec![0; claims.len()];
    let mut drift = 0_i64;
    let mut repaired = 0_u64;

    if total > 0 {
        let rounded: Vec<u64> = above
            .iter()
            .map(|&a| proportional_share(a, p, total))
            .collect();
        drift = p as i64 - rounded.iter().sum::<u64>() as i64;

        let last = claims.len() - 1;
        let mut assigned = 0_i64;
        for (i, share) in rounded.iter().enumerate().take(last) {
            alloc[i] = *share as i64;
            assigned += *share as i64;
        }
        alloc[last] = p as i64 - assigned;

        if alloc[last] < 0 {
            repaired = repair_negative_allocations(&mut alloc, &above);
        }
    }

    let allocations = claims
        .iter()
        .zip(above.iter().zip(alloc.iter()))
        .map(|(c, (&a, &x))| Allocation {
            claim_id: c.claim_id,
            claimed_above_starting: u32::try_from(a).unwrap_or(u32::MAX),
            purchased: u32::try_from(x.max(0)).unwrap_or(u32::MAX),
        })
        .collect();

    RebalanceReport {
        allocations,
        purchased_before: purchased,
        purchased_after: u32::try_from(purchased_after).unwrap_or(u32::MAX),
        distributed: u32::try_from(p).unwrap_or(u32::MAX),
        rounding_drift: drift,
        repaired: u32::try_from(repaired).unwrap_or(u32::MAX),
    }
}

/// Lift negative allocations to zero with credits from claims holding more
/// than they use. Requires `Σ alloc >= Σ above`. Donors are drained largest
/// surplus first, lower index first on ties.
fn repair_negative_allocations(alloc: &mut [i64], above: &[u64]) -> u64 {
    let mut moved = 0_u64;
    for i in 0..alloc.len() {
        let mut need = -alloc[i];
        while need > 0 {
            let donor = (0..alloc.len())
                .filter(|&j| j != i)
                .map(|j| (j, alloc[j] - above[j] as i64))
                .filter(|&(_, surplus)| surplus > 0)
                .max_by(|x, y| x.1.cmp(&y.1).then(y.0.cmp(&x.0)));
            let Some((j, surplus)) = donor else {
                break;
            };
            let take = surplus.min(need);
            alloc[j] -= take;
            alloc[i] += take;
            need -= take;
            moved += take as u64;
        }
    }
    moved
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn usages(counts: &[u32]) -> Vec<ClaimUsage> {
        counts
            .iter()
            .map(|&c| ClaimUsage {
                claim_id: Uuid::new_v4(),
                chunks_claimed: c,
            })
            .collect()
    }

    fn purchased(report: &RebalanceReport) -> Vec<u32> {
        report.allocations.iter().map(|a| a.purchased).collect()
    }

    #[test]
    fn proportional_split_with_last_absorbing_remainder() {
        // above = [2, 4, 6], T = 12, P = 20
        // round(2*20/12)=3, round(4*20/12)=7, last = 20 - 10 = 10
        let r = rebalance(&usages(&[6, 8, 10]), 4, 20, 0);
        assert_eq!(purchased(&r), vec![3, 7, 10]);
        assert_eq!(r.allocated(), 20);
        assert!(!r.pool_corrected());
        assert_eq!(r.repaired, 0);
    }

    #[test]
    fn pool_raised_when_usage_exceeds_purchases() {
        let r = rebalance(&usages(&[10, 5]), 4, 3, 0);
        assert!(r.pool_corrected());
        assert_eq!(r.purchased_before, 3);
        assert_eq!(r.purchased_after, 7);
        assert_eq!(purchased(&r), vec![6, 1]);
    }

    #[test]
    fn bonus_credits_cover_usage_before_the_pool_is_raised() {
        // T = 7 against 3 purchased and 2 bonus: only the missing 2 are added.
        let r = rebalance(&usages(&[10, 5]), 4, 3, 2);
        assert_eq!(r.purchased_after, 5);
        assert_eq!(r.distributed, 7);
        assert_eq!(purchased(&r), vec![6, 1]);

        let covered = rebalance(&usages(&[10, 5]), 4, 3, 4);
        assert!(!covered.pool_corrected());
        assert_eq!(covered.purchased_after, 3);
        assert_eq!(covered.allocated(), 7);
    }

    #[test]
    fn zero_usage_gives_nothing() {
        let r = rebalance(&usages(&[1, 4, 0]), 4, 15, 0);
        assert_eq!(purchased(&r), vec![0, 0, 0]);
        assert_eq!(r.purchased_after, 15);
        assert_eq!(r.rounding_drift, 0);
    }

    #[test]
    fn no_claims_is_empty() {
        let r = rebalance(&[], 4, 9, 0);
        assert!(r.allocations.is_empty());
        assert_eq!(r.purchased_after, 9);
    }

    #[test]
    fn half_rounds_up() {
        // above = [1, 1], P = 3: 1.5 rounds to 2, last gets 1.
        let r = rebalance(&usages(&[5, 5]), 4, 3, 0);
        assert_eq!(purchased(&r), vec![2, 1]);
        assert_eq!(r.rounding_drift, -1);
        assert!(r.drift_tolerated());
    }

    #[test]
    fn last_claim_keeps_a_zero_remainder() {
        // above = [1, 1, 1, 1], P = 6: three shares of 1.5 round to 2 and the
        // last claim is left with 0, below its usage but not negative.
        let r = rebalance(&usages(&[5, 5, 5, 5]), 4, 6, 0);
        assert_eq!(purchased(&r), vec![2, 2, 2, 0]);
        assert_eq!(r.repaired, 0);
        assert_eq!(r.rounding_drift, -2);
    }

    #[test]
    fn negative_last_claim_is_lifted_to_zero() {
        // Six claims one chunk over, P = 9: each of the first five rounds
        // 1.5 up to 2, leaving -1 for the last one.
        let r = rebalance(&usages(&[5, 5, 5, 5, 5, 5]), 4, 9, 0);
        assert_eq!(purchased(&r), vec![1, 2, 2, 2, 2, 0]);
        assert_eq!(r.allocated(), 9);
        assert_eq!(r.rounding_drift, -3);
        assert!(!r.drift_tolerated());
        assert_eq!(r.repaired, 1);
    }

    #[test]
    fn rerun_on_same_input_is_stable() {
        let input = usages(&[12, 4, 7, 30, 9]);
        let first = rebalance(&input, 4, 41, 0);
        let second = rebalance(&input, 4, first.purchased_after, 0);
        assert_eq!(first.allocations, second.allocations);
    }

    #[test]
    fn random_inputs_conserve_and_stay_funded() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for _ in 0..2_000 {
            let n = rng.gen_range(1..8);
            let starting = rng.gen_range(0..10);
            let counts: Vec<u32> = (0..n).map(|_| rng.gen_range(0..60)).collect();
            let input = usages(&counts);
            let total: u32 = counts.iter().map(|c| c.saturating_sub(starting)).sum();
            let p = rng.gen_range(0..total + 100);
            let bonus = rng.gen_range(0..50);

            let r = rebalance(&input, starting, p, bonus);
            assert_eq!(r.distributed, p.max(total));
            assert!(r.purchased_after >= p);
            assert_eq!(r.purchased_after - p, total.saturating_sub(p + bonus));
            if total > 0 {
                // Conservation also rules out clamped negative allocations.
                assert_eq!(r.allocated(), u64::from(r.distributed), "counts={counts:?} p={p}");
            } else {
                assert_eq!(r.allocated(), 0);
            }
            assert!(r.allocated() <= u64::from(r.purchased_after + bonus), "counts={counts:?} p={p}");
            assert_eq!(rebalance(&input, starting, p, bonus), r);
        }
    }
}
