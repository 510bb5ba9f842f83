// crates/furrow-economics/src/accumulator.rs
//
// Per-pool reward accumulator.
//
// `reward_growth_global` is the running reward-per-unit-of-in-range-liquidity
// (Q128) for the pool. Each tick used as a position boundary records
// `reward_growth_outside`, the growth accrued on the side of the tick away
// from the current price. From those two values the growth inside any
// `[tick_lower, tick_upper)` range is a couple of wrapping subtractions, so
// an out-of-range position only earns for the blocks it was actually in
// range.
//
// Every mutation is split into a fallible `plan_*` step that reads the
// state and an infallible `apply_*` step that commits the plan, so a
// rejected event never leaves a half-updated accumulator behind.

use std::collections::BTreeMap;

use primitive_types::U256;
use serde::{Deserialize, Serialize};
use tracing::debug;

use furrow_core::{CrossDirection, FurrowError, PoolId, TickCrossing};

use crate::allocation::PoolShare;
use crate::emission::EmissionSchedule;
use crate::fixed_point::{growth_for, wrapping_add, wrapping_sub};
use crate::token::Amount;

/// Accrual state of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccumulatorState {
    /// Listed: accrues whenever in-range liquidity is non-zero.
    Active,
    /// Delisted or never listed: frozen.
    Inactive,
}

/// Reward bookkeeping for one initialized tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardTick {
    /// Total liquidity of positions using this tick as a boundary.
    pub liquidity_gross: u128,
    /// Liquidity added to the in-range set when the price crosses this tick upwards.
    pub liquidity_net: i128,
    /// Growth on the far side of this tick relative to the current price.
    pub reward_growth_outside: U256,
}

/// Result of planning a checkpoint; committed by [`PoolAccumulator::apply_checkpoint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    pub block: u64,
    pub growth_delta: U256,
    /// Pool emission attributed to in-range liquidity over the span.
    pub accrued: Amount,
}

/// Planned effect of a liquidity change on the tick table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiquidityUpdate {
    tick_lower: i32,
    lower: RewardTick,
    tick_upper: i32,
    upper: RewardTick,
    current_tick: i32,
    in_range_liquidity: u128,
    /// Growth inside the position's range after the update.
    pub growth_inside: U256,
}

/// Planned effect of a tick crossing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrossingUpdate {
    tick: i32,
    flipped_outside: Option<U256>,
    current_tick: i32,
    in_range_liquidity: u128,
}

/// Reward accumulator for a single pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolAccumulator {
    pub pool_id: PoolId,
    pub state: AccumulatorState,
    pub reward_growth_global: U256,
    pub last_checkpoint_block: u64,
    /// Liquidity whose range contains `current_tick`.
    pub in_range_liquidity: u128,
    /// Last price tick reported by the AMM.
    pub current_tick: i32,
    /// Lifetime emission attributed to in-range liquidity of this pool.
    pub total_accrued: Amount,
    /// Lifetime harvest payouts from this pool. Never exceeds `total_accrued`.
    #[serde(default)]
    pub total_paid: Amount,
    ticks: BTreeMap<i32, RewardTick>,
}

impl PoolAccumulator {
    /// A fresh, inactive accumulator.
    pub fn new(pool_id: PoolId, current_tick: i32, block: u64) -> Self {
        Self {
            pool_id,
            state: AccumulatorState::Inactive,
            reward_growth_global: U256::zero(),
            last_checkpoint_block: block,
            in_range_liquidity: 0,
            current_tick,
            total_accrued: 0,
            total_paid: 0,
            ticks: BTreeMap::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == AccumulatorState::Active
    }

    pub fn activate(&mut self) {
        self.state = AccumulatorState::Active;
    }

    pub fn deactivate(&mut self) {
        self.state = AccumulatorState::Inactive;
    }

    pub fn tick(&self, tick: i32) -> Option<&RewardTick> {
        self.ticks.get(&tick)
    }

    /// Initialized ticks, ascending.
    pub fn ticks(&self) -> impl Iterator<Item = (&i32, &RewardTick)> {
        self.ticks.iter()
    }

    /// Compute the accrual over `[last_checkpoint_block, at)` without committing it.
    ///
    /// Nothing accrues while the pool is inactive, has no share, or has no
    /// in-range liquidity. The span is split at every rate change of the
    /// schedule and each uniform-rate piece is priced separately.
    ///
    /// # Errors
    /// - `FurrowError::StaleBlock` if `at` precedes the last checkpoint.
    /// - `FurrowError::Overflow` if a segment's emission does not fit in `u128`.
    pub fn plan_checkpoint(
        &self,
        at: u64,
        schedule: &EmissionSchedule,
        share: Option<PoolShare>,
    ) -> Result<Checkpoint, FurrowError> {
        if at < self.last_checkpoint_block {
            return Err(FurrowError::StaleBlock {
                block: at,
                last: self.last_checkpoint_block,
            });
        }
        let mut checkpoint = Checkpoint {
            block: at,
            growth_delta: U256::zero(),
            accrued: 0,
        };
        let share = match share {
            Some(share) if self.is_active() && self.in_range_liquidity > 0 => share,
            _ => return Ok(checkpoint),
        };

        for segment in schedule.rate_segments(self.last_checkpoint_block, at) {
            let rate = share.rate_of(segment.reward_per_block);
            let emission = rate
                .checked_mul(segment.len() as u128)
                .ok_or_else(|| FurrowError::overflow("segment emission"))?;
            checkpoint.growth_delta = wrapping_add(
                checkpoint.growth_delta,
                growth_for(emission, self.in_range_liquidity),
            );
            checkpoint.accrued = checkpoint
                .accrued
                .checked_add(emission)
                .ok_or_else(|| FurrowError::overflow("checkpoint accrual"))?;
        }
        Ok(checkpoint)
    }

    /// Commit a planned checkpoint.
    pub fn apply_checkpoint(&mut self, checkpoint: Checkpoint) {
        if !checkpoint.growth_delta.is_zero() {
            debug!(
                target: "furrow::accumulator",
                pool = %self.pool_id,
                from = self.last_checkpoint_block,
                to = checkpoint.block,
                accrued = checkpoint.accrued,
                "checkpoint"
            );
        }
        self.reward_growth_global = wrapping_add(self.reward_growth_global, checkpoint.growth_delta);
        self.total_accrued = self.total_accrued.saturating_add(checkpoint.accrued);
        self.last_checkpoint_block = checkpoint.block;
    }

    /// Emission accrued but not yet paid out, including a pending checkpoint.
    pub fn unpaid_after(&self, checkpoint: &Checkpoint) -> Amount {
        self.total_accrued
            .saturating_add(checkpoint.accrued)
            .saturating_sub(self.total_paid)
    }

    /// Record a harvest payout against the pool.
    pub fn record_payout(&mut self, amount: Amount) {
        self.total_paid = self.total_paid.saturating_add(amount);
    }

    /// Plan and apply a checkpoint in one step.
    pub fn checkpoint(
        &mut self,
        at: u64,
        schedule: &EmissionSchedule,
        share: Option<PoolShare>,
    ) -> Result<(), FurrowError> {
        let checkpoint = self.plan_checkpoint(at, schedule, share)?;
        self.apply_checkpoint(checkpoint);
        Ok(())
    }

    fn outside_of(&self, tick: i32) -> U256 {
        self.ticks
            .get(&tick)
            .map(|t| t.reward_growth_outside)
            .unwrap_or_else(U256::zero)
    }

    /// Growth inside `[tick_lower, tick_upper)` given global growth `global`.
    pub fn growth_inside(&self, tick_lower: i32, tick_upper: i32, global: U256) -> U256 {
        growth_inside_with(
            self.current_tick,
            tick_lower,
            self.outside_of(tick_lower),
            tick_upper,
            self.outside_of(tick_upper),
            global,
        )
    }

    /// Whether `[tick_lower, tick_upper)` contains the current tick.
    pub fn in_range(&self, tick_lower: i32, tick_upper: i32) -> bool {
        tick_lower <= self.current_tick && self.current_tick < tick_upper
    }

    /// First initialized tick `t` with `low < t <= high`: the ticks a price
    /// move from `low` to `high` would cross.
    fn first_tick_between(&self, low: i32, high: i32) -> Option<i32> {
        if low >= high {
            return None;
        }
        self.ticks.range(low + 1..=high).next().map(|(&t, _)| t)
    }

    /// Reject a reported price move that jumps over an initialized tick.
    ///
    /// # Errors
    /// Returns `FurrowError::InvalidState` naming the first skipped tick.
    pub fn check_tick_move(&self, new_tick: i32) -> Result<(), FurrowError> {
        if new_tick == self.current_tick {
            return Ok(());
        }
        let (low, high) = if new_tick > self.current_tick {
            (self.current_tick, new_tick)
        } else {
            (new_tick, self.current_tick)
        };
        if let Some(skipped) = self.first_tick_between(low, high) {
            return Err(FurrowError::InvalidState(format!(
                "{}: price moved from tick {} to {} across initialized tick {} without a crossing",
                self.pool_id, self.current_tick, new_tick, skipped
            )));
        }
        Ok(())
    }

    /// Plan a liquidity change of `delta` on `[tick_lower, tick_upper)`.
    ///
    /// `global` must already include the checkpoint taken for this event.
    ///
    /// # Errors
    /// - `FurrowError::InvalidState` if the reported tick skips an
    ///   initialized tick, or liquidity would go negative.
    /// - `FurrowError::Overflow` if liquidity exceeds its integer range.
    pub fn plan_liquidity(
        &self,
        tick_lower: i32,
        tick_upper: i32,
        delta: i128,
        current_tick: i32,
        global: U256,
    ) -> Result<LiquidityUpdate, FurrowError> {
        self.check_tick_move(current_tick)?;

        let lower = self.updated_tick(tick_lower, delta, false, current_tick, global)?;
        let upper = self.updated_tick(tick_upper, delta, true, current_tick, global)?;

        let in_range_liquidity = if tick_lower <= current_tick && current_tick < tick_upper {
            apply_delta(self.in_range_liquidity, delta).ok_or_else(|| {
                FurrowError::InvalidState(format!(
                    "{}: in-range liquidity {} cannot absorb delta {}",
                    self.pool_id, self.in_range_liquidity, delta
                ))
            })?
        } else {
            self.in_range_liquidity
        };

        let growth_inside = growth_inside_with(
            current_tick,
            tick_lower,
            lower.reward_growth_outside,
            tick_upper,
            upper.reward_growth_outside,
            global,
        );

        Ok(LiquidityUpdate {
            tick_lower,
            lower,
            tick_upper,
            upper,
            current_tick,
            in_range_liquidity,
            growth_inside,
        })
    }

    fn updated_tick(
        &self,
        tick: i32,
        delta: i128,
        upper: bool,
        current_tick: i32,
        global: U256,
    ) -> Result<RewardTick, FurrowError> {
        let mut info = self.ticks.get(&tick).cloned().unwrap_or_default();
        if info.liquidity_gross == 0 {
            // Growth before initialization is assumed to have happened below the tick.
            info.reward_growth_outside = if tick <= current_tick {
                global
            } else {
                U256::zero()
            };
        }
        info.liquidity_gross = apply_delta(info.liquidity_gross, delta).ok_or_else(|| {
            FurrowError::InvalidState(format!(
                "{}: liquidity at tick {} cannot absorb delta {}",
                self.pool_id, tick, delta
            ))
        })?;
        let signed = if upper { delta.checked_neg() } else { Some(delta) };
        info.liquidity_net = signed
            .and_then(|d| info.liquidity_net.checked_add(d))
            .ok_or_else(|| FurrowError::overflow("tick liquidity_net"))?;
        Ok(info)
    }

    /// Commit a planned liquidity change. Ticks left with no liquidity are cleared.
    pub fn apply_liquidity(&mut self, update: LiquidityUpdate) {
        self.current_tick = update.current_tick;
        self.in_range_liquidity = update.in_range_liquidity;
        for (tick, info) in [
            (update.tick_lower, update.lower),
            (update.tick_upper, update.upper),
        ] {
            if info.liquidity_gross == 0 {
                self.ticks.remove(&tick);
            } else {
                self.ticks.insert(tick, info);
            }
        }
    }

    /// Plan a crossing of `crossing.tick`.
    ///
    /// `global` must already include the checkpoint taken at the crossing
    /// block, so the elapsed span is priced with the pre-crossing liquidity.
    ///
    /// # Errors
    /// Returns `FurrowError::InvalidState` if the crossing direction does not
    /// match the current tick, another initialized tick lies in between, or
    /// the notified liquidity delta disagrees with the tick table.
    pub fn plan_crossing(
        &self,
        crossing: &TickCrossing,
        global: U256,
    ) -> Result<CrossingUpdate, FurrowError> {
        let tick = crossing.tick;
        let (valid, between) = match crossing.direction {
            CrossDirection::Up => (tick > self.current_tick, (self.current_tick, tick - 1)),
            CrossDirection::Down => (tick <= self.current_tick, (tick, self.current_tick)),
        };
        if !valid {
            return Err(FurrowError::InvalidState(format!(
                "{}: cannot cross tick {} {:?} from current tick {}",
                self.pool_id, tick, crossing.direction, self.current_tick
            )));
        }
        if let Some(skipped) = self.first_tick_between(between.0, between.1) {
            return Err(FurrowError::InvalidState(format!(
                "{}: crossing tick {} skips initialized tick {}",
                self.pool_id, tick, skipped
            )));
        }

        let info = self.ticks.get(&tick);
        let net = info.map(|t| t.liquidity_net).unwrap_or(0);
        let expected = match crossing.direction {
            CrossDirection::Up => Some(net),
            CrossDirection::Down => net.checked_neg(),
        }
        .ok_or_else(|| FurrowError::overflow("tick liquidity_net"))?;
        if expected != crossing.liquidity_delta {
            return Err(FurrowError::InvalidState(format!(
                "{}: crossing tick {} reports liquidity delta {} but the tick table expects {}",
                self.pool_id, tick, crossing.liquidity_delta, expected
            )));
        }
        let in_range_liquidity = apply_delta(self.in_range_liquidity, expected).ok_or_else(|| {
            FurrowError::InvalidState(format!(
                "{}: in-range liquidity {} cannot absorb crossing delta {}",
                self.pool_id, self.in_range_liquidity, expected
            ))
        })?;

        Ok(CrossingUpdate {
            tick,
            flipped_outside: info.map(|t| wrapping_sub(global, t.reward_growth_outside)),
            current_tick: crossing.tick_after(),
            in_range_liquidity,
        })
    }

    /// Commit a planned crossing.
    pub fn apply_crossing(&mut self, update: CrossingUpdate) {
        if let (Some(outside), Some(info)) = (update.flipped_outside, self.ticks.get_mut(&update.tick)) {
            info.reward_growth_outside = outside;
        }
        debug!(
            target: "furrow::accumulator",
            pool = %self.pool_id,
            tick = update.tick,
            from = self.current_tick,
            to = update.current_tick,
            in_range_liquidity = update.in_range_liquidity,
            "tick crossed"
        );
        self.current_tick = update.current_tick;
        self.in_range_liquidity = update.in_range_liquidity;
    }
}

fn growth_inside_with(
    current_tick: i32,
    tick_lower: i32,
    lower_outside: U256,
    tick_upper: i32,
    upper_outside: U256,
    global: U256,
) -> U256 {
    let below = if current_tick >= tick_lower {
        lower_outside
    } else {
        wrapping_sub(global, lower_outside)
    };
    let above = if current_tick < tick_upper {
        upper_outside
    } else {
        wrapping_sub(global, upper_outside)
    };
    wrapping_sub(wrapping_sub(global, below), above)
}

/// `liquidity + delta`, or `None` if the result is negative or overflows.
pub(crate) fn apply_delta(liquidity: u128, delta: i128) -> Option<u128> {
    if delta >= 0 {
        liquidity.checked_add(delta as u128)
    } else {
        liquidity.checked_sub(delta.unsigned_abs())
    }
}
