// crates/furrow-economics/src/lib.rs
//
// furrow-economics: halving emission, pool allocation, per-pool reward
// accumulators, the position ledger, and settlement for the Furrow
// liquidity-mining engine.
//
// All monetary values are tracked in base units of an 18-decimal reward
// token. 1 token = 1,000,000,000,000,000,000 base units (10^18).

pub mod access;
pub mod accumulator;
pub mod allocation;
pub mod emission;
pub mod engine;
pub mod fixed_point;
pub mod ledger;
pub mod snapshot;
pub mod token;
pub mod vault;

// Re-export key types for ergonomic access from downstream crates.
pub use access::AccessControl;
pub use accumulator::{AccumulatorState, PoolAccumulator, RewardTick};
pub use allocation::{AllocationEntry, AllocationRegistry, PoolShare, ALLOCATION_PRECISION};
pub use emission::{CapExhaustion, EmissionConfig, EmissionSchedule, RateSegment};
pub use engine::MiningEngine;
pub use ledger::{PositionLedger, PositionSnapshot};
pub use snapshot::{EngineMeta, EngineSnapshot, PoolRecord, SnapshotStore};
pub use token::{
    floor_to_dust, format_token_amount, parse_token_amount, tokens, Amount, DUST_UNIT,
    UNITS_PER_TOKEN,
};
pub use vault::RewardVault;
