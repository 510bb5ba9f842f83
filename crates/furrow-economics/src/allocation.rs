// crates/furrow-economics/src/allocation.rs
//
// Allocation registry: listed pools and their emission weights.
//
// A pool's effective reward rate is `global_rate * weight / total_weight`
// while it is active and `total_weight > 0`, zero otherwise. `total_weight`
// only sums active entries. Entries are never deleted; delisting keeps the
// weight so a later relist can reuse it.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use furrow_core::{FurrowError, PoolId};

use crate::fixed_point::mul_div_floor;
use crate::token::Amount;

/// Denominator for allocation shares expressed in basis points.
pub const ALLOCATION_PRECISION: u128 = 10_000;

/// Per-pool allocation record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationEntry {
    pub pool_id: PoolId,
    /// Allocation points. Retained across delist/relist.
    pub weight: u64,
    pub active: bool,
}

/// A pool's weight relative to the registry total at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolShare {
    pub weight: u64,
    pub total_weight: u128,
}

impl PoolShare {
    /// The pool's cut of `global_rate`, truncated. Zero when `total_weight == 0`.
    pub fn rate_of(&self, global_rate: Amount) -> Amount {
        mul_div_floor(global_rate, self.weight as u128, self.total_weight)
    }
}

/// Registry of every pool ever listed and its weight.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllocationRegistry {
    entries: BTreeMap<PoolId, AllocationEntry>,
    total_weight: u128,
}

impl AllocationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a registry from persisted entries, recomputing `total_weight`.
    pub fn from_entries(entries: impl IntoIterator<Item = AllocationEntry>) -> Self {
        let entries: BTreeMap<PoolId, AllocationEntry> =
            entries.into_iter().map(|e| (e.pool_id, e)).collect();
        let total_weight = entries
            .values()
            .filter(|e| e.active)
            .map(|e| e.weight as u128)
            .sum();
        Self {
            entries,
            total_weight,
        }
    }

    /// Ensure an inactive, zero-weight entry exists for `pool_id`.
    pub fn register(&mut self, pool_id: PoolId) {
        self.entries.entry(pool_id).or_insert(AllocationEntry {
            pool_id,
            weight: 0,
            active: false,
        });
    }

    /// Mark `pool_id` active, inserting it with weight 0 if new.
    ///
    /// A relisted pool's retained weight re-enters `total_weight`.
    ///
    /// # Errors
    /// Returns `FurrowError::AlreadyListed` if the pool is already active.
    pub fn list(&mut self, pool_id: PoolId) -> Result<(), FurrowError> {
        let entry = self.entries.entry(pool_id).or_insert(AllocationEntry {
            pool_id,
            weight: 0,
            active: false,
        });
        if entry.active {
            return Err(FurrowError::AlreadyListed(pool_id));
        }
        entry.active = true;
        self.total_weight += entry.weight as u128;
        Ok(())
    }

    /// Mark `pool_id` inactive and drop its weight from `total_weight`.
    ///
    /// # Errors
    /// Returns `FurrowError::NotListed` if the pool is unknown or inactive.
    pub fn delist(&mut self, pool_id: PoolId) -> Result<(), FurrowError> {
        let entry = self
            .entries
            .get_mut(&pool_id)
            .filter(|e| e.active)
            .ok_or(FurrowError::NotListed(pool_id))?;
        entry.active = false;
        self.total_weight -= entry.weight as u128;
        Ok(())
    }

    /// Validate an allocation batch without touching the registry.
    ///
    /// `total_weight` is a `u128` sum of `u64` weights, so no batch can
    /// overflow it.
    ///
    /// # Errors
    /// - `FurrowError::InvalidAllocation` for an empty batch or a pool that
    ///   appears twice.
    /// - `FurrowError::PoolNotFound` for a pool with no entry.
    pub fn plan_allocation(&self, batch: &[(PoolId, u64)]) -> Result<(), FurrowError> {
        if batch.is_empty() {
            return Err(FurrowError::InvalidAllocation(
                "allocation batch is empty".to_string(),
            ));
        }
        let mut seen = BTreeSet::new();
        for (pool_id, _) in batch {
            if !seen.insert(*pool_id) {
                return Err(FurrowError::InvalidAllocation(format!(
                    "{} appears more than once in the batch",
                    pool_id
                )));
            }
            if !self.entries.contains_key(pool_id) {
                return Err(FurrowError::PoolNotFound(*pool_id));
            }
        }
        Ok(())
    }

    /// Set new weights for every pool in `batch`, all or nothing.
    ///
    /// Inactive pools keep their new weight for a later relist but do not
    /// contribute to `total_weight`.
    pub fn allocate(&mut self, batch: &[(PoolId, u64)]) -> Result<(), FurrowError> {
        self.plan_allocation(batch)?;
        for (pool_id, weight) in batch {
            if let Some(entry) = self.entries.get_mut(pool_id) {
                if entry.active {
                    self.total_weight = self.total_weight - entry.weight as u128 + *weight as u128;
                }
                entry.weight = *weight;
            }
        }
        Ok(())
    }

    /// The pool's share of emission, or `None` if it is inactive or unknown.
    pub fn share_of(&self, pool_id: PoolId) -> Option<PoolShare> {
        self.entries
            .get(&pool_id)
            .filter(|e| e.active)
            .map(|e| PoolShare {
                weight: e.weight,
                total_weight: self.total_weight,
            })
    }

    /// Raw weight of the pool (retained while delisted). Zero if unknown.
    pub fn weight_of(&self, pool_id: PoolId) -> u64 {
        self.entries.get(&pool_id).map(|e| e.weight).unwrap_or(0)
    }

    /// Effective share of emission in basis points, truncated.
    pub fn allocation_share_bps(&self, pool_id: PoolId) -> u128 {
        self.share_of(pool_id)
            .map(|share| mul_div_floor(ALLOCATION_PRECISION, share.weight as u128, share.total_weight))
            .unwrap_or(0)
    }

    pub fn is_active(&self, pool_id: PoolId) -> bool {
        self.entries.get(&pool_id).map(|e| e.active).unwrap_or(false)
    }

    pub fn entry(&self, pool_id: PoolId) -> Option<&AllocationEntry> {
        self.entries.get(&pool_id)
    }

    pub fn entries(&self) -> impl Iterator<Item = &AllocationEntry> {
        self.entries.values()
    }

    /// Ids of every active pool, ascending.
    pub fn active_pools(&self) -> Vec<PoolId> {
        self.entries
            .values()
            .filter(|e| e.active)
            .map(|e| e.pool_id)
            .collect()
    }

    pub fn total_weight(&self) -> u128 {
        self.total_weight
    }
}
