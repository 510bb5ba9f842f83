// crates/furrow-core/src/lib.rs
//
// furrow-core: identifiers, AMM event types, and the error taxonomy for the
// Furrow liquidity-mining engine.
//
// This is the leaf crate that all other crates in the workspace depend on.

pub mod error;
pub mod events;
pub mod ids;

pub use error::{ErrorKind, FurrowError};
pub use events::{CrossDirection, LiquidityChange, TickCrossing};
pub use ids::{tick_in_bounds, AccountKey, PoolId, PositionId, MAX_TICK, MIN_TICK};
