// crates/furrow-economics/src/fixed_point.rs
//
// Q128 fixed-point helpers for reward-per-liquidity accumulators.
//
// Accumulator values are U256 numbers scaled by 2^128 and are compared with
// wrapping subtraction, so only differences between two readings carry
// meaning.

use primitive_types::{U256, U512};

use furrow_core::FurrowError;

/// Number of fractional bits in a Q128 value.
pub const Q128_BITS: usize = 128;

/// 1.0 in Q128.
pub fn q128() -> U256 {
    U256::one() << Q128_BITS
}

/// Reward-per-liquidity growth produced by distributing `emission` over
/// `liquidity` units, truncated toward zero.
///
/// Returns zero when `liquidity` is zero: nobody was in range, so nothing
/// is distributed.
pub fn growth_for(emission: u128, liquidity: u128) -> U256 {
    if liquidity == 0 || emission == 0 {
        return U256::zero();
    }
    (U256::from(emission) << Q128_BITS) / U256::from(liquidity)
}

/// Reward owed to `liquidity` units for an accumulator difference of `growth`,
/// rounded to the nearest base unit.
///
/// `growth` was built from floored quotients, so `growth * liquidity` falls
/// short of the distributed emission by less than `liquidity / 2^128` per
/// checkpoint. Rounding to nearest recovers the exact share whenever that
/// share is a whole number of base units. Any sub-unit excess this can
/// produce is bounded by the pool's payout limit in the engine.
///
/// # Errors
/// Returns `FurrowError::Overflow` when the result does not fit in `u128`.
pub fn reward_for(growth: U256, liquidity: u128) -> Result<u128, FurrowError> {
    if liquidity == 0 || growth.is_zero() {
        return Ok(0);
    }
    let product: U512 = growth.full_mul(U256::from(liquidity));
    let shifted = (product + (U512::one() << (Q128_BITS - 1))) >> Q128_BITS;
    if shifted > U512::from(u128::MAX) {
        return Err(FurrowError::overflow("position reward"));
    }
    Ok(shifted.low_u128())
}

/// `a - b` modulo 2^256.
pub fn wrapping_sub(a: U256, b: U256) -> U256 {
    a.overflowing_sub(b).0
}

/// `a + b` modulo 2^256.
pub fn wrapping_add(a: U256, b: U256) -> U256 {
    a.overflowing_add(b).0
}

/// `floor(amount * numerator / denominator)` without intermediate overflow.
///
/// Callers guarantee `numerator <= denominator`, so the result never exceeds
/// `amount`. A zero denominator yields zero.
pub fn mul_div_floor(amount: u128, numerator: u128, denominator: u128) -> u128 {
    if denominator == 0 || numerator == 0 {
        return 0;
    }
    let scaled = U256::from(amount).full_mul(U256::from(numerator)) / U512::from(denominator);
    if scaled > U512::from(u128::MAX) {
        u128::MAX
    } else {
        scaled.low_u128()
    }
}
