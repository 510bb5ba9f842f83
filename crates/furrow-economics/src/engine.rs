// crates/furrow-economics/src/engine.rs
//
// MiningEngine: the settlement layer that ties emission, allocation,
// per-pool accumulators, the position ledger, and the reward vault together.
//
// Every handler takes the current block height from the caller. Handlers
// run in two phases: everything that can fail is computed first against
// the current state, then the results are committed. A rejected call
// therefore leaves the engine exactly as it was.
//
// Checkpoint discipline:
// - A handler that touches one pool checkpoints that pool before mutating
//   its liquidity.
// - A handler that changes `total_weight` (list, delist, allocate)
//   checkpoints every pool at the change block first, so the elapsed span is
//   always priced with the weights that were in force during it.

use std::collections::BTreeMap;

use tracing::{debug, info};

use furrow_core::{
    tick_in_bounds, AccountKey, FurrowError, LiquidityChange, PoolId, PositionId, TickCrossing,
};

use crate::access::AccessControl;
use crate::accumulator::{apply_delta, Checkpoint, PoolAccumulator};
use crate::allocation::{AllocationRegistry, PoolShare};
use crate::emission::{EmissionConfig, EmissionSchedule};
use crate::fixed_point::wrapping_add;
use crate::ledger::{PositionLedger, PositionSnapshot};
use crate::snapshot::{EngineMeta, EngineSnapshot, PoolRecord};
use crate::token::{floor_to_dust, Amount};
use crate::vault::RewardVault;

/// The liquidity-mining reward engine.
#[derive(Debug, Clone)]
pub struct MiningEngine {
    schedule: EmissionSchedule,
    registry: AllocationRegistry,
    pools: BTreeMap<PoolId, PoolAccumulator>,
    ledger: PositionLedger,
    vault: RewardVault,
    access: AccessControl,
    last_block: u64,
    total_emitted: Amount,
}

impl MiningEngine {
    /// Create an engine at genesis with the vault funded to the supply cap.
    ///
    /// # Errors
    /// Returns `FurrowError::Config` if the emission parameters are invalid.
    pub fn new(config: EmissionConfig, admin: AccountKey) -> Result<Self, FurrowError> {
        let vault = RewardVault::with_balance(config.total_supply_cap);
        let schedule = EmissionSchedule::new(config)?;
        Ok(Self {
            schedule,
            registry: AllocationRegistry::new(),
            pools: BTreeMap::new(),
            ledger: PositionLedger::new(),
            vault,
            access: AccessControl::new(admin),
            last_block: 0,
            total_emitted: 0,
        })
    }

    fn ensure_fresh(&self, block: u64) -> Result<(), FurrowError> {
        if block < self.last_block {
            return Err(FurrowError::StaleBlock {
                block,
                last: self.last_block,
            });
        }
        Ok(())
    }

    fn require_pool(&self, pool_id: PoolId) -> Result<&PoolAccumulator, FurrowError> {
        self.pools
            .get(&pool_id)
            .ok_or(FurrowError::PoolNotFound(pool_id))
    }

    fn plan_pool_checkpoint(&self, pool: &PoolAccumulator, block: u64) -> Result<Checkpoint, FurrowError> {
        pool.plan_checkpoint(block, &self.schedule, self.registry.share_of(pool.pool_id))
    }

    fn plan_all_checkpoints(&self, block: u64) -> Result<Vec<(PoolId, Checkpoint)>, FurrowError> {
        self.pools
            .values()
            .map(|pool| Ok((pool.pool_id, self.plan_pool_checkpoint(pool, block)?)))
            .collect()
    }

    fn commit_checkpoint(&mut self, pool_id: PoolId, checkpoint: Checkpoint) {
        if let Some(pool) = self.pools.get_mut(&pool_id) {
            pool.apply_checkpoint(checkpoint);
            self.total_emitted = self.total_emitted.saturating_add(checkpoint.accrued);
        }
    }

    fn commit_all_checkpoints(&mut self, checkpoints: Vec<(PoolId, Checkpoint)>) {
        for (pool_id, checkpoint) in checkpoints {
            self.commit_checkpoint(pool_id, checkpoint);
        }
    }

    // ---------------------------------------------------------------
    // AMM layer
    // ---------------------------------------------------------------

    /// Start tracking a pool created by the AMM. The pool is inactive until listed.
    ///
    /// # Errors
    /// - `FurrowError::StaleBlock` for an old block.
    /// - `FurrowError::InvalidState` if the pool is already registered or the
    ///   tick is out of bounds.
    pub fn register_pool(
        &mut self,
        pool_id: PoolId,
        current_tick: i32,
        block: u64,
    ) -> Result<(), FurrowError> {
        self.ensure_fresh(block)?;
        if self.pools.contains_key(&pool_id) {
            return Err(FurrowError::InvalidState(format!(
                "{} is already registered",
                pool_id
            )));
        }
        if !tick_in_bounds(current_tick) {
            return Err(FurrowError::InvalidState(format!(
                "tick {} is out of bounds",
                current_tick
            )));
        }
        self.pools
            .insert(pool_id, PoolAccumulator::new(pool_id, current_tick, block));
        self.registry.register(pool_id);
        self.last_block = block;
        debug!(target: "furrow::engine", pool = %pool_id, tick = current_tick, block, "pool registered");
        Ok(())
    }

    /// Apply a liquidity mutation reported by the AMM.
    ///
    /// The pool is checkpointed first, then the position's accrued reward is
    /// settled into its owed balance, then the liquidity changes. Returns the
    /// position's owed balance after settlement.
    ///
    /// # Errors
    /// - `FurrowError::PoolNotFound` if the pool was never registered.
    /// - `FurrowError::PositionNotFound` when removing from an unknown position.
    /// - `FurrowError::InvalidState` for a bad tick range, a range that
    ///   differs from the existing position's, or removal of more liquidity
    ///   than the position holds.
    pub fn on_liquidity_change(
        &mut self,
        change: &LiquidityChange,
        block: u64,
    ) -> Result<Amount, FurrowError> {
        self.ensure_fresh(block)?;
        validate_range(change)?;
        let pool = self.require_pool(change.pool)?;

        let mut position = match self.ledger.get(change.pool, change.position) {
            Some(existing) => {
                if existing.tick_lower != change.tick_lower || existing.tick_upper != change.tick_upper {
                    return Err(FurrowError::InvalidState(format!(
                        "{} in {} spans [{}, {}), not [{}, {})",
                        change.position,
                        change.pool,
                        existing.tick_lower,
                        existing.tick_upper,
                        change.tick_lower,
                        change.tick_upper
                    )));
                }
                existing.clone()
            }
            None if change.liquidity_delta < 0 => {
                return Err(FurrowError::PositionNotFound {
                    pool: change.pool,
                    position: change.position,
                })
            }
            None if change.liquidity_delta == 0 => {
                return Err(FurrowError::InvalidState(format!(
                    "{} in {} cannot be opened with zero liquidity",
                    change.position, change.pool
                )))
            }
            None => PositionSnapshot::new(
                change.pool,
                change.position,
                change.owner,
                change.tick_lower,
                change.tick_upper,
            ),
        };

        let checkpoint = self.plan_pool_checkpoint(pool, block)?;
        let global = wrapping_add(pool.reward_growth_global, checkpoint.growth_delta);
        let update = pool.plan_liquidity(
            change.tick_lower,
            change.tick_upper,
            change.liquidity_delta,
            change.current_tick,
            global,
        )?;

        let owed = position.settle(update.growth_inside)?;
        position.liquidity = apply_delta(position.liquidity, change.liquidity_delta).ok_or_else(|| {
            FurrowError::InvalidState(format!(
                "{} in {} holds {} liquidity and cannot absorb delta {}",
                change.position, change.pool, position.liquidity, change.liquidity_delta
            ))
        })?;
        position.in_range = position.is_in_range(change.current_tick);

        self.commit_checkpoint(change.pool, checkpoint);
        if let Some(pool) = self.pools.get_mut(&change.pool) {
            pool.apply_liquidity(update);
        }
        debug!(
            target: "furrow::engine",
            pool = %change.pool,
            position = %change.position,
            delta = change.liquidity_delta,
            liquidity = position.liquidity,
            owed,
            block,
            "liquidity changed"
        );
        if position.is_empty() {
            self.ledger.remove(change.pool, change.position);
        } else {
            self.ledger.put(position);
        }
        self.last_block = block;
        Ok(owed)
    }

    /// Apply a tick crossing reported by the AMM.
    ///
    /// The pool is checkpointed with the pre-crossing in-range liquidity
    /// before the crossing's liquidity delta takes effect.
    ///
    /// # Errors
    /// - `FurrowError::PoolNotFound` if the pool was never registered.
    /// - `FurrowError::InvalidState` if the crossing is inconsistent with the
    ///   pool's tick table.
    pub fn on_tick_cross(&mut self, crossing: &TickCrossing, block: u64) -> Result<(), FurrowError> {
        self.ensure_fresh(block)?;
        if !tick_in_bounds(crossing.tick) {
            return Err(FurrowError::InvalidState(format!(
                "tick {} is out of bounds",
                crossing.tick
            )));
        }
        let pool = self.require_pool(crossing.pool)?;
        let checkpoint = self.plan_pool_checkpoint(pool, block)?;
        let global = wrapping_add(pool.reward_growth_global, checkpoint.growth_delta);
        let update = pool.plan_crossing(crossing, global)?;

        self.commit_checkpoint(crossing.pool, checkpoint);
        if let Some(pool) = self.pools.get_mut(&crossing.pool) {
            pool.apply_crossing(update);
        }
        self.last_block = block;
        Ok(())
    }

    // ---------------------------------------------------------------
    // Orchestration layer
    // ---------------------------------------------------------------

    /// List a pool for liquidity mining. A new entry starts at weight 0; a
    /// relisted pool resumes with its retained weight from `block` onwards.
    ///
    /// # Errors
    /// - `FurrowError::Unauthorized` unless `caller` is the admin or an executor.
    /// - `FurrowError::PoolNotFound` if the AMM never registered the pool.
    /// - `FurrowError::AlreadyListed` if the pool is active.
    pub fn list(&mut self, caller: &AccountKey, pool_id: PoolId, block: u64) -> Result<(), FurrowError> {
        self.access.ensure_manager(caller)?;
        self.ensure_fresh(block)?;
        self.require_pool(pool_id)?;

        let checkpoints = self.plan_all_checkpoints(block)?;
        let mut registry = self.registry.clone();
        registry.list(pool_id)?;

        self.commit_all_checkpoints(checkpoints);
        self.registry = registry;
        if let Some(pool) = self.pools.get_mut(&pool_id) {
            pool.activate();
        }
        self.last_block = block;
        info!(
            target: "furrow::allocation",
            pool = %pool_id,
            weight = self.registry.weight_of(pool_id),
            total_weight = self.registry.total_weight(),
            block,
            "pool listed"
        );
        Ok(())
    }

    /// Delist a pool. Its accumulator freezes at `block` and its weight
    /// leaves `total_weight`, raising every other active pool's share from
    /// `block` onwards.
    ///
    /// # Errors
    /// - `FurrowError::Unauthorized` unless `caller` is the admin or an executor.
    /// - `FurrowError::NotListed` if the pool is not active.
    pub fn delist(&mut self, caller: &AccountKey, pool_id: PoolId, block: u64) -> Result<(), FurrowError> {
        self.access.ensure_manager(caller)?;
        self.ensure_fresh(block)?;

        let checkpoints = self.plan_all_checkpoints(block)?;
        let mut registry = self.registry.clone();
        registry.delist(pool_id)?;

        self.commit_all_checkpoints(checkpoints);
        self.registry = registry;
        if let Some(pool) = self.pools.get_mut(&pool_id) {
            pool.deactivate();
        }
        self.last_block = block;
        info!(
            target: "furrow::allocation",
            pool = %pool_id,
            total_weight = self.registry.total_weight(),
            block,
            "pool delisted"
        );
        Ok(())
    }

    /// Set weights for a batch of pools in one transition.
    ///
    /// # Errors
    /// - `FurrowError::Unauthorized` unless `caller` is the admin or an executor.
    /// - `FurrowError::InvalidAllocation` for an empty or duplicated batch.
    /// - `FurrowError::PoolNotFound` for a pool that was never registered.
    pub fn allocate(
        &mut self,
        caller: &AccountKey,
        batch: &[(PoolId, u64)],
        block: u64,
    ) -> Result<(), FurrowError> {
        self.access.ensure_manager(caller)?;
        self.ensure_fresh(block)?;

        let checkpoints = self.plan_all_checkpoints(block)?;
        let mut registry = self.registry.clone();
        registry.allocate(batch)?;

        self.commit_all_checkpoints(checkpoints);
        self.registry = registry;
        self.last_block = block;
        info!(
            target: "furrow::allocation",
            pools = batch.len(),
            total_weight = self.registry.total_weight(),
            block,
            "allocation updated"
        );
        Ok(())
    }

    /// Appoint an executor. Admin only.
    pub fn add_executor(&mut self, caller: &AccountKey, executor: AccountKey) -> Result<bool, FurrowError> {
        self.access.add_executor(caller, executor)
    }

    /// Revoke an executor. Admin only.
    pub fn remove_executor(&mut self, caller: &AccountKey, executor: &AccountKey) -> Result<bool, FurrowError> {
        self.access.remove_executor(caller, executor)
    }

    /// Approve `operator` to harvest a position on the owner's behalf, or
    /// clear the approval with `None`.
    ///
    /// # Errors
    /// - `FurrowError::PositionNotFound` for an unknown position.
    /// - `FurrowError::Unauthorized` unless `caller` owns the position.
    pub fn approve(
        &mut self,
        caller: &AccountKey,
        pool_id: PoolId,
        position_id: PositionId,
        operator: Option<AccountKey>,
        block: u64,
    ) -> Result<(), FurrowError> {
        self.ensure_fresh(block)?;
        let mut position = self.ledger.require(pool_id, position_id)?.clone();
        if position.owner != *caller {
            return Err(FurrowError::Unauthorized(format!(
                "{} does not own {} in {}",
                caller, position_id, pool_id
            )));
        }
        position.operator = operator;
        self.ledger.put(position);
        self.last_block = block;
        Ok(())
    }

    /// Reward a harvest at `block` would pay, without mutating anything.
    ///
    /// # Errors
    /// - `FurrowError::StaleBlock` for a block before the last processed one.
    /// - `FurrowError::PositionNotFound` / `FurrowError::PoolNotFound` for unknown ids.
    pub fn pending_reward(
        &self,
        pool_id: PoolId,
        position_id: PositionId,
        block: u64,
    ) -> Result<Amount, FurrowError> {
        self.ensure_fresh(block)?;
        let position = self.ledger.require(pool_id, position_id)?;
        let pool = self.require_pool(pool_id)?;
        let checkpoint = self.plan_pool_checkpoint(pool, block)?;
        let global = wrapping_add(pool.reward_growth_global, checkpoint.growth_delta);
        let inside = pool.growth_inside(position.tick_lower, position.tick_upper, global);
        let owed = position.pending(inside)?;
        Ok(floor_to_dust(owed.min(pool.unpaid_after(&checkpoint))))
    }

    /// Pay a position's reward to its owner, floored to the dust unit.
    ///
    /// A pool never pays out more than it has accrued, so the payout is also
    /// limited to the pool's unpaid accrual.
    ///
    /// The remainder below the dust unit stays owed, unless the position
    /// holds no liquidity, in which case its record is removed and the
    /// remainder is forfeited. Calling twice at the same block pays zero the
    /// second time.
    ///
    /// # Errors
    /// - `FurrowError::PositionNotFound` for an unknown position.
    /// - `FurrowError::Unauthorized` unless `caller` is the owner or the approved operator.
    /// - `FurrowError::InvalidState` if the vault cannot cover the payout.
    pub fn harvest(
        &mut self,
        caller: &AccountKey,
        pool_id: PoolId,
        position_id: PositionId,
        block: u64,
    ) -> Result<Amount, FurrowError> {
        self.ensure_fresh(block)?;
        let mut position = self.ledger.require(pool_id, position_id)?.clone();
        if !position.is_authorized(caller) {
            return Err(FurrowError::Unauthorized(format!(
                "{} may not harvest {} in {}",
                caller, position_id, pool_id
            )));
        }
        let pool = self.require_pool(pool_id)?;
        let checkpoint = self.plan_pool_checkpoint(pool, block)?;
        let global = wrapping_add(pool.reward_growth_global, checkpoint.growth_delta);
        let inside = pool.growth_inside(position.tick_lower, position.tick_upper, global);
        let current_tick = pool.current_tick;

        let owed = position.settle(inside)?;
        let payout = floor_to_dust(owed.min(pool.unpaid_after(&checkpoint)));
        self.vault.pay(position.owner, payout)?;

        self.commit_checkpoint(pool_id, checkpoint);
        if let Some(pool) = self.pools.get_mut(&pool_id) {
            pool.record_payout(payout);
        }
        position.reward_owed = owed - payout;
        position.in_range = position.is_in_range(current_tick);
        if position.liquidity == 0 {
            self.ledger.remove(pool_id, position_id);
        } else {
            self.ledger.put(position);
        }
        self.last_block = block;
        info!(
            target: "furrow::settlement",
            pool = %pool_id,
            position = %position_id,
            payout,
            block,
            "harvested"
        );
        Ok(payout)
    }

    // ---------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------

    /// Scheduled reward per block during halving period `period`.
    pub fn reward_per_block_of(&self, period: u32) -> Amount {
        self.schedule.reward_per_block_of(period)
    }

    /// The pool's effective reward per block at `block`; zero unless listed.
    pub fn current_reward_per_block(&self, pool_id: PoolId, block: u64) -> Amount {
        self.registry
            .share_of(pool_id)
            .map(|share: PoolShare| share.rate_of(self.schedule.reward_per_block(block)))
            .unwrap_or(0)
    }

    pub fn halving_boundaries(&self) -> Vec<u64> {
        self.schedule.halving_boundaries()
    }

    /// Raw allocation weight of the pool, retained while delisted.
    pub fn allocation_of(&self, pool_id: PoolId) -> u64 {
        self.registry.weight_of(pool_id)
    }

    pub fn allocation_share_bps(&self, pool_id: PoolId) -> u128 {
        self.registry.allocation_share_bps(pool_id)
    }

    pub fn total_weight(&self) -> u128 {
        self.registry.total_weight()
    }

    pub fn position(&self, pool_id: PoolId, position_id: PositionId) -> Option<&PositionSnapshot> {
        self.ledger.get(pool_id, position_id)
    }

    pub fn positions(&self) -> impl Iterator<Item = &PositionSnapshot> {
        self.ledger.iter()
    }

    pub fn pool(&self, pool_id: PoolId) -> Option<&PoolAccumulator> {
        self.pools.get(&pool_id)
    }

    pub fn pools(&self) -> impl Iterator<Item = &PoolAccumulator> {
        self.pools.values()
    }

    /// Whether the position's range contains its pool's current tick.
    pub fn position_in_range(&self, pool_id: PoolId, position_id: PositionId) -> Result<bool, FurrowError> {
        let position = self.ledger.require(pool_id, position_id)?;
        let pool = self.require_pool(pool_id)?;
        Ok(position.is_in_range(pool.current_tick))
    }

    pub fn paid_to(&self, account: &AccountKey) -> Amount {
        self.vault.paid_to(account)
    }

    /// Emission attributed to in-range liquidity across all pools so far.
    pub fn total_emitted(&self) -> Amount {
        self.total_emitted
    }

    pub fn total_paid(&self) -> Amount {
        self.vault.total_paid()
    }

    pub fn vault_balance(&self) -> Amount {
        self.vault.balance()
    }

    pub fn last_block(&self) -> u64 {
        self.last_block
    }

    pub fn schedule(&self) -> &EmissionSchedule {
        &self.schedule
    }

    pub fn registry(&self) -> &AllocationRegistry {
        &self.registry
    }

    pub fn access(&self) -> &AccessControl {
        &self.access
    }

    // ---------------------------------------------------------------
    // Persistence
    // ---------------------------------------------------------------

    /// Capture the full engine state.
    pub fn snapshot(&self) -> EngineSnapshot {
        let pools = self
            .pools
            .values()
            .filter_map(|accumulator| {
                self.registry
                    .entry(accumulator.pool_id)
                    .map(|allocation| PoolRecord {
                        allocation: allocation.clone(),
                        accumulator: accumulator.clone(),
                    })
            })
            .collect();
        EngineSnapshot {
            config: self.schedule.config().clone(),
            meta: EngineMeta {
                access: self.access.clone(),
                vault: self.vault.clone(),
                last_block: self.last_block,
                total_emitted: self.total_emitted,
            },
            pools,
            positions: self.ledger.iter().cloned().collect(),
        }
    }

    /// Rebuild an engine from a snapshot.
    ///
    /// # Errors
    /// - `FurrowError::Config` if the emission parameters are invalid.
    /// - `FurrowError::InvalidState` if the records contradict each other.
    pub fn restore(snapshot: EngineSnapshot) -> Result<Self, FurrowError> {
        snapshot.validate()?;
        let schedule = EmissionSchedule::new(snapshot.config)?;
        let mut pools = BTreeMap::new();
        let mut entries = Vec::with_capacity(snapshot.pools.len());
        for record in snapshot.pools {
            pools.insert(record.accumulator.pool_id, record.accumulator);
            entries.push(record.allocation);
        }
        Ok(Self {
            schedule,
            registry: AllocationRegistry::from_entries(entries),
            pools,
            ledger: snapshot.positions.into_iter().collect(),
            vault: snapshot.meta.vault,
            access: snapshot.meta.access,
            last_block: snapshot.meta.last_block,
            total_emitted: snapshot.meta.total_emitted,
        })
    }
}

fn validate_range(change: &LiquidityChange) -> Result<(), FurrowError> {
    if change.tick_lower >= change.tick_upper {
        return Err(FurrowError::InvalidState(format!(
            "tick_lower {} must be below tick_upper {}",
            change.tick_lower, change.tick_upper
        )));
    }
    for tick in [change.tick_lower, change.tick_upper, change.current_tick] {
        if !tick_in_bounds(tick) {
            return Err(FurrowError::InvalidState(format!(
                "tick {} is out of bounds",
                tick
            )));
        }
    }
    Ok(())
}
