// crates/furrow-economics/src/ledger.rs
//
// Position ledger: one snapshot per (pool, position).
//
// A position never stores a running reward. It stores the reward growth
// inside its range as of its last settlement; pending reward is
// `liquidity * (growth_inside_now - growth_inside_last)`. Settled but
// unclaimed reward accumulates in `reward_owed` until harvested.

use std::collections::BTreeMap;

use primitive_types::U256;
use serde::{Deserialize, Serialize};

use furrow_core::{AccountKey, FurrowError, PoolId, PositionId};

use crate::fixed_point::{reward_for, wrapping_sub};
use crate::token::Amount;

/// Reward state of a single liquidity position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub pool_id: PoolId,
    pub position_id: PositionId,
    pub owner: AccountKey,
    /// Account approved to harvest on the owner's behalf.
    pub operator: Option<AccountKey>,
    pub liquidity: u128,
    pub tick_lower: i32,
    pub tick_upper: i32,
    /// Growth inside `[tick_lower, tick_upper)` at the last settlement (reward debt).
    pub reward_growth_inside_last: U256,
    /// Settled reward not yet harvested, in base units.
    pub reward_owed: Amount,
    /// Whether the range contained the pool's current tick at the last update.
    pub in_range: bool,
}

impl PositionSnapshot {
    pub fn new(
        pool_id: PoolId,
        position_id: PositionId,
        owner: AccountKey,
        tick_lower: i32,
        tick_upper: i32,
    ) -> Self {
        Self {
            pool_id,
            position_id,
            owner,
            operator: None,
            liquidity: 0,
            tick_lower,
            tick_upper,
            reward_growth_inside_last: U256::zero(),
            reward_owed: 0,
            in_range: false,
        }
    }

    /// Reward accrued since the last settlement given the current growth inside.
    pub fn accrued_since_last(&self, growth_inside: U256) -> Result<Amount, FurrowError> {
        reward_for(
            wrapping_sub(growth_inside, self.reward_growth_inside_last),
            self.liquidity,
        )
    }

    /// Owed plus accrued, without mutating.
    pub fn pending(&self, growth_inside: U256) -> Result<Amount, FurrowError> {
        self.reward_owed
            .checked_add(self.accrued_since_last(growth_inside)?)
            .ok_or_else(|| FurrowError::overflow("position reward owed"))
    }

    /// Move accrued reward into `reward_owed` and roll the debt forward.
    pub fn settle(&mut self, growth_inside: U256) -> Result<Amount, FurrowError> {
        let owed = self.pending(growth_inside)?;
        self.reward_owed = owed;
        self.reward_growth_inside_last = growth_inside;
        Ok(owed)
    }

    /// Whether `caller` may harvest this position.
    pub fn is_authorized(&self, caller: &AccountKey) -> bool {
        self.owner == *caller || self.operator.as_ref() == Some(caller)
    }

    pub fn is_in_range(&self, current_tick: i32) -> bool {
        self.tick_lower <= current_tick && current_tick < self.tick_upper
    }

    /// A position with no liquidity and nothing owed carries no state worth keeping.
    pub fn is_empty(&self) -> bool {
        self.liquidity == 0 && self.reward_owed == 0
    }
}

/// All position snapshots, keyed by (pool, position).
///
/// Pools and positions are independent records joined by id; the ledger
/// never walks a pool's positions to distribute rewards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PositionLedger {
    positions: BTreeMap<(PoolId, PositionId), PositionSnapshot>,
}

impl PositionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, pool_id: PoolId, position_id: PositionId) -> Option<&PositionSnapshot> {
        self.positions.get(&(pool_id, position_id))
    }

    /// Fetch a position or fail with `PositionNotFound`.
    pub fn require(
        &self,
        pool_id: PoolId,
        position_id: PositionId,
    ) -> Result<&PositionSnapshot, FurrowError> {
        self.get(pool_id, position_id)
            .ok_or(FurrowError::PositionNotFound {
                pool: pool_id,
                position: position_id,
            })
    }

    /// Insert or replace a snapshot.
    pub fn put(&mut self, snapshot: PositionSnapshot) {
        self.positions
            .insert((snapshot.pool_id, snapshot.position_id), snapshot);
    }

    pub fn remove(&mut self, pool_id: PoolId, position_id: PositionId) -> Option<PositionSnapshot> {
        self.positions.remove(&(pool_id, position_id))
    }

    /// Every snapshot in the pool, ascending by position id.
    pub fn in_pool(&self, pool_id: PoolId) -> impl Iterator<Item = &PositionSnapshot> {
        self.positions
            .range((pool_id, PositionId(0))..=(pool_id, PositionId(u64::MAX)))
            .map(|(_, p)| p)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PositionSnapshot> {
        self.positions.values()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

impl FromIterator<PositionSnapshot> for PositionLedger {
    fn from_iter<I: IntoIterator<Item = PositionSnapshot>>(iter: I) -> Self {
        let mut ledger = PositionLedger::new();
        for snapshot in iter {
            ledger.put(snapshot);
        }
        ledger
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed_point::growth_for;

    fn position(liquidity: u128) -> PositionSnapshot {
        let mut p = PositionSnapshot::new(
            PoolId(1),
            PositionId(7),
            AccountKey::from_label("alice"),
            -60,
            60,
        );
        p.liquidity = liquidity;
        p
    }

    #[test]
    fn test_settle_moves_accrual_into_owed() {
        let liquidity = 1u128 << 40;
        let mut p = position(liquidity);
        let growth = growth_for(1_000, liquidity);
        assert_eq!(p.pending(growth).unwrap(), 1_000);
        assert_eq!(p.settle(growth).unwrap(), 1_000);
        assert_eq!(p.reward_owed, 1_000);
        // Settling again at the same growth adds nothing.
        assert_eq!(p.settle(growth).unwrap(), 1_000);
        assert_eq!(p.accrued_since_last(growth).unwrap(), 0);
    }

    #[test]
    fn test_zero_liquidity_accrues_nothing() {
        let mut p = position(0);
        p.reward_growth_inside_last = U256::from(99u64);
        assert_eq!(p.pending(U256::zero()).unwrap(), 0);
    }

    #[test]
    fn test_authorization() {
        let mut p = position(1);
        let alice = AccountKey::from_label("alice");
        let bob = AccountKey::from_label("bob");
        assert!(p.is_authorized(&alice));
        assert!(!p.is_authorized(&bob));
        p.operator = Some(bob);
        assert!(p.is_authorized(&bob));
    }

    #[test]
    fn test_in_range_is_half_open() {
        let p = position(1);
        assert!(p.is_in_range(-60));
        assert!(p.is_in_range(59));
        assert!(!p.is_in_range(60));
        assert!(!p.is_in_range(-61));
    }

    #[test]
    fn test_ledger_require_and_pool_iteration() {
        let mut ledger = PositionLedger::new();
        ledger.put(position(1));
        let mut other = position(2);
        other.pool_id = PoolId(2);
        ledger.put(other);

        assert!(ledger.require(PoolId(1), PositionId(7)).is_ok());
        assert!(matches!(
            ledger.require(PoolId(1), PositionId(8)),
            Err(FurrowError::PositionNotFound { .. })
        ));
        assert_eq!(ledger.in_pool(PoolId(1)).count(), 1);
        assert_eq!(ledger.len(), 2);
        ledger.remove(PoolId(2), PositionId(7));
        assert_eq!(ledger.in_pool(PoolId(2)).count(), 0);
    }
}
