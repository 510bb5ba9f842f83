// crates/furrow-economics/src/emission.rs
//
// Block reward emission schedule with halving and a hard supply cap.
//
// The schedule follows a fixed halving curve:
// - Before the genesis block nothing is emitted.
// - Period p (p = 0, 1, ...) spans `halving_interval_blocks` blocks and emits
//   `initial_reward_per_block >> p` per block.
// - After `halving_count` periods the rate is zero permanently.
// - Cumulative emission never exceeds `total_supply_cap`: the block at which
//   the cap is reached emits only the remainder, and every later block emits
//   zero.
//
// The accumulator must never assume a constant rate across a span that
// crosses one of these breakpoints; `rate_segments` splits spans for it.

use serde::{Deserialize, Serialize};

use furrow_core::FurrowError;

use crate::token::{tokens, Amount};

/// Genesis block of the reference deployment.
pub const DEFAULT_GENESIS_BLOCK: u64 = 1_001;

/// Blocks per halving period in the reference deployment (~1 day at 3s/block).
pub const DEFAULT_HALVING_INTERVAL: u64 = 28_800;

/// Number of emitting periods in the reference deployment.
pub const DEFAULT_HALVING_COUNT: u32 = 5;

/// Shifts at or beyond this many bits always produce zero.
const MAX_HALVINGS: u32 = 128;

/// Immutable emission parameters, written once at genesis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmissionConfig {
    pub genesis_block: u64,
    pub halving_interval_blocks: u64,
    pub halving_count: u32,
    /// Reward per block during period 0, in base units.
    pub initial_reward_per_block: Amount,
    /// Hard cap on cumulative emission, in base units.
    pub total_supply_cap: Amount,
}

impl Default for EmissionConfig {
    fn default() -> Self {
        Self {
            genesis_block: DEFAULT_GENESIS_BLOCK,
            halving_interval_blocks: DEFAULT_HALVING_INTERVAL,
            halving_count: DEFAULT_HALVING_COUNT,
            initial_reward_per_block: tokens(300_000),
            total_supply_cap: tokens(9_550_000_000),
        }
    }
}

impl EmissionConfig {
    /// Check the parameters describe a well-formed, strictly halving curve.
    ///
    /// # Errors
    /// Returns `FurrowError::Config` if the interval or count is zero, the
    /// count is 128 or more, the initial reward would halve to zero before the
    /// last emitting period, the cap is zero, or the final halving block does
    /// not fit in `u64`.
    pub fn validate(&self) -> Result<(), FurrowError> {
        if self.halving_interval_blocks == 0 {
            return Err(FurrowError::Config(
                "halving_interval_blocks must be greater than zero".to_string(),
            ));
        }
        if self.halving_count == 0 || self.halving_count >= MAX_HALVINGS {
            return Err(FurrowError::Config(format!(
                "halving_count must be in 1..{}, got {}",
                MAX_HALVINGS, self.halving_count
            )));
        }
        if self.initial_reward_per_block >> (self.halving_count - 1) == 0 {
            return Err(FurrowError::Config(format!(
                "initial_reward_per_block {} halves to zero before period {}",
                self.initial_reward_per_block,
                self.halving_count - 1
            )));
        }
        if self.total_supply_cap == 0 {
            return Err(FurrowError::Config(
                "total_supply_cap must be greater than zero".to_string(),
            ));
        }
        self.halving_interval_blocks
            .checked_mul(self.halving_count as u64)
            .and_then(|span| span.checked_add(self.genesis_block))
            .ok_or_else(|| FurrowError::Config("final halving block overflows u64".to_string()))?;
        Ok(())
    }
}

/// The point at which cumulative emission reaches the supply cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapExhaustion {
    /// First block whose scheduled reward is cut short.
    pub block: u64,
    /// Amount actually emitted at `block` (may be zero).
    pub partial_reward: Amount,
}

/// A maximal run of blocks `[start, end)` emitting the same reward per block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateSegment {
    pub start: u64,
    pub end: u64,
    pub reward_per_block: Amount,
}

impl RateSegment {
    /// Number of blocks in the segment.
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

/// Pure, deterministic function of block height to per-block emission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmissionSchedule {
    config: EmissionConfig,
    exhaustion: Option<CapExhaustion>,
}

impl EmissionSchedule {
    /// Build a schedule from validated parameters.
    ///
    /// # Errors
    /// Returns `FurrowError::Config` if `config` fails validation.
    pub fn new(config: EmissionConfig) -> Result<Self, FurrowError> {
        config.validate()?;
        let exhaustion = find_cap_exhaustion(&config);
        Ok(Self { config, exhaustion })
    }

    pub fn config(&self) -> &EmissionConfig {
        &self.config
    }

    /// Where the supply cap cuts the curve short, if it binds at all.
    pub fn cap_exhaustion(&self) -> Option<CapExhaustion> {
        self.exhaustion
    }

    /// Scheduled reward per block during halving period `period`.
    ///
    /// `reward_per_block_of(0) == initial`, `reward_per_block_of(1) == initial / 2`,
    /// and so on; zero from `halving_count` onwards. Ignores the supply cap.
    pub fn reward_per_block_of(&self, period: u32) -> Amount {
        if period >= self.config.halving_count {
            return 0;
        }
        // Repeated integer halving; identical to compounding `/ 2` per period.
        self.config.initial_reward_per_block >> period
    }

    /// Halving period containing `block`, or `None` before genesis.
    ///
    /// Periods at or beyond `halving_count` are clamped to `halving_count`.
    pub fn period_of(&self, block: u64) -> Option<u32> {
        if block < self.config.genesis_block {
            return None;
        }
        let period = (block - self.config.genesis_block) / self.config.halving_interval_blocks;
        Some(period.min(self.config.halving_count as u64) as u32)
    }

    /// Reward per block at `block` according to the halving curve alone.
    pub fn scheduled_reward(&self, block: u64) -> Amount {
        match self.period_of(block) {
            Some(period) => self.reward_per_block_of(period),
            None => 0,
        }
    }

    /// Amount actually emitted at `block`, honouring the supply cap.
    pub fn reward_per_block(&self, block: u64) -> Amount {
        match self.exhaustion {
            Some(ex) if block > ex.block => 0,
            Some(ex) if block == ex.block => ex.partial_reward,
            _ => self.scheduled_reward(block),
        }
    }

    /// First block of halving period `period` (saturating).
    pub fn period_start(&self, period: u32) -> u64 {
        self.config
            .genesis_block
            .saturating_add(self.config.halving_interval_blocks.saturating_mul(period as u64))
    }

    /// Blocks at which the curve halves: `genesis + k * interval` for
    /// `k = 1..=halving_count`. The last one is where emission stops.
    pub fn halving_blocks(&self) -> Vec<u64> {
        (1..=self.config.halving_count)
            .map(|k| self.period_start(k))
            .collect()
    }

    /// The next halving block strictly after `block`, if any remain.
    pub fn next_halving_block(&self, block: u64) -> Option<u64> {
        self.halving_blocks().into_iter().find(|&b| b > block)
    }

    /// Every block at which `reward_per_block` changes value, ascending.
    ///
    /// Includes genesis (zero to initial), each halving block up to the point
    /// emission ends, and the cap exhaustion block(s) when the cap binds.
    pub fn halving_boundaries(&self) -> Vec<u64> {
        let mut boundaries = vec![self.config.genesis_block];
        boundaries.extend(self.halving_blocks());
        if let Some(ex) = self.exhaustion {
            boundaries.retain(|&b| b < ex.block);
            boundaries.push(ex.block);
            if ex.partial_reward > 0 {
                boundaries.push(ex.block.saturating_add(1));
            }
        }
        boundaries.dedup();
        boundaries
    }

    /// Split `[from, to)` into maximal uniform-rate segments.
    ///
    /// Returns an empty list when `to <= from`.
    pub fn rate_segments(&self, from: u64, to: u64) -> Vec<RateSegment> {
        if to <= from {
            return Vec::new();
        }
        let mut segments = Vec::new();
        let mut cursor = from;
        for boundary in self.halving_boundaries() {
            if boundary <= cursor {
                continue;
            }
            if boundary >= to {
                break;
            }
            segments.push(RateSegment {
                start: cursor,
                end: boundary,
                reward_per_block: self.reward_per_block(cursor),
            });
            cursor = boundary;
        }
        segments.push(RateSegment {
            start: cursor,
            end: to,
            reward_per_block: self.reward_per_block(cursor),
        });
        segments
    }

    /// Total emission over `[genesis, block)`, never more than the cap.
    pub fn cumulative_emission(&self, block: u64) -> Amount {
        self.rate_segments(self.config.genesis_block, block)
            .iter()
            .fold(0u128, |total, seg| {
                total.saturating_add(seg.reward_per_block.saturating_mul(seg.len() as u128))
            })
            .min(self.config.total_supply_cap)
    }

    /// Sum of the halving curve over all periods, ignoring the cap.
    pub fn total_scheduled_emission(&self) -> Amount {
        (0..self.config.halving_count).fold(0u128, |total, period| {
            total.saturating_add(
                self.reward_per_block_of(period)
                    .saturating_mul(self.config.halving_interval_blocks as u128),
            )
        })
    }

    /// Everything that will ever be emitted: the curve clipped to the cap.
    pub fn total_emission(&self) -> Amount {
        self.total_scheduled_emission().min(self.config.total_supply_cap)
    }
}

/// Walk the periods until cumulative scheduled emission would pass the cap.
fn find_cap_exhaustion(config: &EmissionConfig) -> Option<CapExhaustion> {
    let mut emitted: u128 = 0;
    for period in 0..config.halving_count {
        let rate = config.initial_reward_per_block >> period;
        let remaining = config.total_supply_cap - emitted;
        let period_total = rate.checked_mul(config.halving_interval_blocks as u128);
        match period_total {
            Some(total) if total <= remaining => emitted += total,
            _ => {
                // rate > 0 is guaranteed by validation.
                let full_blocks = (remaining / rate) as u64;
                let start = config.genesis_block
                    + config.halving_interval_blocks * period as u64;
                return Some(CapExhaustion {
                    block: start + full_blocks,
                    partial_reward: remaining % rate,
                });
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::UNITS_PER_TOKEN;

    /// A schedule whose cap never binds.
    fn uncapped() -> EmissionSchedule {
        EmissionSchedule::new(EmissionConfig {
            genesis_block: 100,
            halving_interval_blocks: 1_000,
            halving_count: 4,
            initial_reward_per_block: 8 * UNITS_PER_TOKEN,
            total_supply_cap: u128::MAX,
        })
        .unwrap()
    }

    #[test]
    fn test_reward_before_genesis_is_zero() {
        let schedule = uncapped();
        assert_eq!(schedule.reward_per_block(0), 0);
        assert_eq!(schedule.reward_per_block(99), 0);
        assert_eq!(schedule.reward_per_block(100), 8 * UNITS_PER_TOKEN);
    }

    #[test]
    fn test_reward_constant_within_period() {
        let schedule = uncapped();
        assert_eq!(schedule.reward_per_block(100), schedule.reward_per_block(1_099));
        assert_eq!(schedule.reward_per_block(1_100), 4 * UNITS_PER_TOKEN);
        assert_eq!(schedule.reward_per_block(2_100), 2 * UNITS_PER_TOKEN);
        assert_eq!(schedule.reward_per_block(3_100), UNITS_PER_TOKEN);
    }

    #[test]
    fn test_reward_zero_after_last_halving() {
        let schedule = uncapped();
        assert_eq!(schedule.reward_per_block(4_100), 0);
        assert_eq!(schedule.reward_per_block(u64::MAX), 0);
        assert_eq!(schedule.reward_per_block_of(4), 0);
        assert_eq!(schedule.reward_per_block_of(200), 0);
    }

    #[test]
    fn test_halving_rounds_toward_zero() {
        let schedule = EmissionSchedule::new(EmissionConfig {
            genesis_block: 0,
            halving_interval_blocks: 10,
            halving_count: 3,
            initial_reward_per_block: 7,
            total_supply_cap: u128::MAX,
        })
        .unwrap();
        assert_eq!(schedule.reward_per_block_of(0), 7);
        assert_eq!(schedule.reward_per_block_of(1), 3);
        assert_eq!(schedule.reward_per_block_of(2), 1);
    }

    #[test]
    fn test_period_of() {
        let schedule = uncapped();
        assert_eq!(schedule.period_of(99), None);
        assert_eq!(schedule.period_of(100), Some(0));
        assert_eq!(schedule.period_of(1_100), Some(1));
        assert_eq!(schedule.period_of(1_000_000), Some(4));
    }

    #[test]
    fn test_halving_blocks_and_boundaries() {
        let schedule = uncapped();
        assert_eq!(schedule.halving_blocks(), vec![1_100, 2_100, 3_100, 4_100]);
        assert_eq!(
            schedule.halving_boundaries(),
            vec![100, 1_100, 2_100, 3_100, 4_100]
        );
        assert_eq!(schedule.next_halving_block(1_100), Some(2_100));
        assert_eq!(schedule.next_halving_block(4_100), None);
    }

    #[test]
    fn test_rate_segments_split_at_boundaries() {
        let schedule = uncapped();
        let segments = schedule.rate_segments(1_050, 2_150);
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].start, 1_050);
        assert_eq!(segments[0].end, 1_100);
        assert_eq!(segments[0].reward_per_block, 8 * UNITS_PER_TOKEN);
        assert_eq!(segments[1].len(), 1_000);
        assert_eq!(segments[1].reward_per_block, 4 * UNITS_PER_TOKEN);
        assert_eq!(segments[2].start, 2_100);
        assert_eq!(segments[2].end, 2_150);
        assert_eq!(segments[2].reward_per_block, 2 * UNITS_PER_TOKEN);
    }

    #[test]
    fn test_rate_segments_empty_span() {
        let schedule = uncapped();
        assert!(schedule.rate_segments(500, 500).is_empty());
        assert!(schedule.rate_segments(600, 500).is_empty());
    }

    #[test]
    fn test_rate_segments_before_genesis() {
        let schedule = uncapped();
        let segments = schedule.rate_segments(0, 150);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].reward_per_block, 0);
        assert_eq!(segments[1].start, 100);
        assert_eq!(segments[1].len(), 50);
    }

    #[test]
    fn test_cumulative_emission() {
        let schedule = uncapped();
        assert_eq!(schedule.cumulative_emission(100), 0);
        assert_eq!(schedule.cumulative_emission(101), 8 * UNITS_PER_TOKEN);
        assert_eq!(
            schedule.cumulative_emission(1_100),
            1_000 * 8 * UNITS_PER_TOKEN
        );
        assert_eq!(
            schedule.cumulative_emission(1_150),
            1_000 * 8 * UNITS_PER_TOKEN + 50 * 4 * UNITS_PER_TOKEN
        );
        assert_eq!(
            schedule.cumulative_emission(u64::MAX),
            schedule.total_scheduled_emission()
        );
        assert_eq!(
            schedule.total_scheduled_emission(),
            1_000 * (8 + 4 + 2 + 1) * UNITS_PER_TOKEN
        );
    }

    #[test]
    fn test_cap_cuts_schedule_short() {
        // 10 blocks at 10, then 10 blocks at 5; cap lands mid-way through period 1.
        let schedule = EmissionSchedule::new(EmissionConfig {
            genesis_block: 0,
            halving_interval_blocks: 10,
            halving_count: 2,
            initial_reward_per_block: 10,
            total_supply_cap: 127,
        })
        .unwrap();
        let ex = schedule.cap_exhaustion().unwrap();
        // 100 emitted in period 0, 27 remaining at rate 5: 5 full blocks then 2.
        assert_eq!(ex.block, 15);
        assert_eq!(ex.partial_reward, 2);
        assert_eq!(schedule.reward_per_block(14), 5);
        assert_eq!(schedule.reward_per_block(15), 2);
        assert_eq!(schedule.reward_per_block(16), 0);
        assert_eq!(schedule.halving_boundaries(), vec![0, 10, 15, 16]);
        assert_eq!(schedule.cumulative_emission(u64::MAX), 127);
        assert_eq!(schedule.total_emission(), 127);
    }

    #[test]
    fn test_cap_exhausted_exactly_on_block() {
        let schedule = EmissionSchedule::new(EmissionConfig {
            genesis_block: 0,
            halving_interval_blocks: 10,
            halving_count: 2,
            initial_reward_per_block: 10,
            total_supply_cap: 50,
        })
        .unwrap();
        let ex = schedule.cap_exhaustion().unwrap();
        assert_eq!(ex.block, 5);
        assert_eq!(ex.partial_reward, 0);
        assert_eq!(schedule.halving_boundaries(), vec![0, 5]);
        assert_eq!(schedule.cumulative_emission(100), 50);
    }

    #[test]
    fn test_default_config_is_capped_in_second_period() {
        let schedule = EmissionSchedule::new(EmissionConfig::default()).unwrap();
        let ex = schedule.cap_exhaustion().unwrap();
        // 28_800 blocks at 300k emit 8.64B; 0.91B remain at 150k per block.
        assert_eq!(ex.block, DEFAULT_GENESIS_BLOCK + DEFAULT_HALVING_INTERVAL + 6_066);
        assert_eq!(ex.partial_reward, tokens(100_000));
        assert_eq!(schedule.total_emission(), tokens(9_550_000_000));
    }

    #[test]
    fn test_validate_rejects_bad_configs() {
        let base = EmissionConfig::default();
        assert!(base.validate().is_ok());

        let mut cfg = base.clone();
        cfg.halving_interval_blocks = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = base.clone();
        cfg.halving_count = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = base.clone();
        cfg.halving_count = 128;
        assert!(cfg.validate().is_err());

        let mut cfg = base.clone();
        cfg.initial_reward_per_block = 4;
        cfg.halving_count = 4;
        assert!(cfg.validate().is_err());

        let mut cfg = base.clone();
        cfg.total_supply_cap = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = base;
        cfg.genesis_block = u64::MAX;
        assert!(cfg.validate().is_err());
    }
}
