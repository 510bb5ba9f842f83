// crates/furrow-core/src/events.rs
//
// Events the AMM layer emits into the reward engine.
//
// The engine never polls AMM state. Every liquidity mutation and every
// crossing of an initialized tick arrives as one of these records, together
// with the block height supplied by the execution environment.

use serde::{Deserialize, Serialize};

use crate::ids::{AccountKey, PoolId, PositionId};

/// Direction the AMM price moved when it crossed a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossDirection {
    /// Price moved up (one-for-zero swap): the current tick becomes the crossed tick.
    Up,
    /// Price moved down (zero-for-one swap): the current tick becomes `crossed - 1`.
    Down,
}

/// A position's liquidity changed (mint, increase, decrease, or a zero-delta poke).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidityChange {
    pub pool: PoolId,
    pub position: PositionId,
    /// Owner of the position; only consulted when the position is first created.
    pub owner: AccountKey,
    pub tick_lower: i32,
    pub tick_upper: i32,
    /// Signed liquidity delta. Negative removes liquidity.
    pub liquidity_delta: i128,
    /// The AMM's current tick at the time of the change.
    pub current_tick: i32,
}

/// The AMM price crossed an initialized tick during a swap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickCrossing {
    pub pool: PoolId,
    pub tick: i32,
    pub direction: CrossDirection,
    /// Net change in active liquidity as applied by the AMM, already signed
    /// for the direction of travel.
    pub liquidity_delta: i128,
}

impl TickCrossing {
    /// The current tick after the crossing completes.
    pub fn tick_after(&self) -> i32 {
        match self.direction {
            CrossDirection::Up => self.tick,
            CrossDirection::Down => self.tick - 1,
        }
    }
}
