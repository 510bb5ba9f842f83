// crates/furrow-economics/src/snapshot.rs
//
// Serializable engine state and the storage seam.
//
// The persisted layout is one emission config record (written once at
// genesis), one engine meta record, one record per pool holding its
// allocation entry and accumulator, and one record per (pool, position).

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use furrow_core::{FurrowError, PoolId};

use crate::access::AccessControl;
use crate::accumulator::PoolAccumulator;
use crate::allocation::AllocationEntry;
use crate::emission::EmissionConfig;
use crate::ledger::PositionSnapshot;
use crate::token::Amount;
use crate::vault::RewardVault;

/// Engine-wide mutable state that is not per pool or per position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineMeta {
    pub access: AccessControl,
    pub vault: RewardVault,
    pub last_block: u64,
    pub total_emitted: Amount,
}

/// Everything the engine knows about one pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolRecord {
    pub allocation: AllocationEntry,
    pub accumulator: PoolAccumulator,
}

/// A complete, self-consistent copy of the engine state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub config: EmissionConfig,
    pub meta: EngineMeta,
    pub pools: Vec<PoolRecord>,
    pub positions: Vec<PositionSnapshot>,
}

impl EngineSnapshot {
    /// Check the records agree with each other.
    ///
    /// # Errors
    /// Returns `FurrowError::InvalidState` when:
    /// - a pool record's ids or activity disagree, or a pool appears twice;
    /// - a pool was checkpointed after the engine's last processed block;
    /// - a pool has paid out more than it accrued;
    /// - a position references an unknown pool;
    /// - a pool's tick table or in-range liquidity does not match its positions.
    pub fn validate(&self) -> Result<(), FurrowError> {
        let mut seen = BTreeSet::new();
        for record in &self.pools {
            let pool_id = record.allocation.pool_id;
            if record.accumulator.pool_id != pool_id {
                return Err(FurrowError::InvalidState(format!(
                    "pool record for {} holds accumulator of {}",
                    pool_id, record.accumulator.pool_id
                )));
            }
            if record.accumulator.is_active() != record.allocation.active {
                return Err(FurrowError::InvalidState(format!(
                    "{} is {} in the registry but its accumulator is {:?}",
                    pool_id,
                    if record.allocation.active { "active" } else { "inactive" },
                    record.accumulator.state
                )));
            }
            if record.accumulator.last_checkpoint_block > self.meta.last_block {
                return Err(FurrowError::InvalidState(format!(
                    "{} was checkpointed at block {} after the last processed block {}",
                    pool_id, record.accumulator.last_checkpoint_block, self.meta.last_block
                )));
            }
            if record.accumulator.total_paid > record.accumulator.total_accrued {
                return Err(FurrowError::InvalidState(format!(
                    "{} paid {} but accrued only {}",
                    pool_id, record.accumulator.total_paid, record.accumulator.total_accrued
                )));
            }
            if !seen.insert(pool_id) {
                return Err(FurrowError::InvalidState(format!(
                    "{} appears more than once",
                    pool_id
                )));
            }
        }

        for position in &self.positions {
            if !seen.contains(&position.pool_id) {
                return Err(FurrowError::InvalidState(format!(
                    "{} references unknown {}",
                    position.position_id, position.pool_id
                )));
            }
        }

        for record in &self.pools {
            let pool_id = record.allocation.pool_id;
            let expected = self.tick_table_of(pool_id)?;
            let stored: BTreeMap<i32, (u128, i128)> = record
                .accumulator
                .ticks()
                .map(|(tick, info)| (*tick, (info.liquidity_gross, info.liquidity_net)))
                .collect();
            if let Some((tick, found)) = expected.iter().find(|&(tick, v)| stored.get(tick) != Some(v)) {
                return Err(FurrowError::InvalidState(format!(
                    "{} tick {} should hold (gross, net) {:?} but holds {:?}",
                    pool_id,
                    tick,
                    found,
                    stored.get(tick)
                )));
            }
            if let Some(tick) = stored.keys().find(|tick| !expected.contains_key(*tick)) {
                return Err(FurrowError::InvalidState(format!(
                    "{} tick {} is initialized but no position uses it",
                    pool_id, tick
                )));
            }

            let in_range = self.in_range_liquidity_of(pool_id, record.accumulator.current_tick);
            if in_range != Some(record.accumulator.in_range_liquidity) {
                return Err(FurrowError::InvalidState(format!(
                    "{} tracks {} in-range liquidity but its positions hold {:?}",
                    pool_id, record.accumulator.in_range_liquidity, in_range
                )));
            }
        }
        Ok(())
    }

    /// (liquidity_gross, liquidity_net) per boundary tick implied by the pool's positions.
    fn tick_table_of(&self, pool_id: PoolId) -> Result<BTreeMap<i32, (u128, i128)>, FurrowError> {
        let overflow = || FurrowError::InvalidState(format!("{} tick liquidity overflows", pool_id));
        let mut table: BTreeMap<i32, (u128, i128)> = BTreeMap::new();
        for position in self
            .positions
            .iter()
            .filter(|p| p.pool_id == pool_id && p.liquidity > 0)
        {
            let signed = i128::try_from(position.liquidity).map_err(|_| overflow())?;
            for (tick, net) in [(position.tick_lower, signed), (position.tick_upper, -signed)] {
                let entry = table.entry(tick).or_default();
                entry.0 = entry.0.checked_add(position.liquidity).ok_or_else(overflow)?;
                entry.1 = entry.1.checked_add(net).ok_or_else(overflow)?;
            }
        }
        Ok(table)
    }

    fn in_range_liquidity_of(&self, pool_id: PoolId, current_tick: i32) -> Option<u128> {
        self.positions
            .iter()
            .filter(|p| p.pool_id == pool_id && p.is_in_range(current_tick))
            .try_fold(0u128, |total, p| total.checked_add(p.liquidity))
    }
}

/// Storage backend for engine snapshots.
pub trait SnapshotStore {
    /// Persist `snapshot`, replacing whatever was stored before.
    fn save_snapshot(&self, snapshot: &EngineSnapshot) -> Result<(), FurrowError>;

    /// Load the stored snapshot, or `None` if nothing has been saved yet.
    fn load_snapshot(&self) -> Result<Option<EngineSnapshot>, FurrowError>;
}
