use thiserror::Error;

use crate::ids::{PoolId, PositionId};

/// Coarse classification of a [`FurrowError`].
///
/// Callers use this to decide how to surface a failure; the engine itself
/// never retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller lacks the privilege for the operation.
    Authorization,
    /// Operation is not valid in the current state (double list, bad batch, ...).
    State,
    /// A referenced pool or position does not exist.
    NotFound,
    /// An input would overflow fixed-point or integer arithmetic.
    Arithmetic,
    /// Configuration, storage, or serialization failure outside the core.
    Infrastructure,
}

/// Protocol-wide error types for the Furrow reward engine.
#[derive(Debug, Error)]
pub enum FurrowError {
    /// Caller is not the admin, an executor, the position owner, or an approved operator.
    #[error("Caller is unauthorized: {0}")]
    Unauthorized(String),

    /// Pool was never registered with the engine.
    #[error("Pool not found: {0}")]
    PoolNotFound(PoolId),

    /// Position does not exist in the given pool.
    #[error("Position not found: {position} in pool {pool}")]
    PositionNotFound { pool: PoolId, position: PositionId },

    /// Pool is already listed for liquidity mining.
    #[error("Pool already listed: {0}")]
    AlreadyListed(PoolId),

    /// Pool is not currently listed.
    #[error("Pool not listed: {0}")]
    NotListed(PoolId),

    /// Allocation batch is malformed (duplicate pool, empty batch, ...).
    #[error("Invalid allocation: {0}")]
    InvalidAllocation(String),

    /// Invalid state transition or inconsistent event.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Block height is older than the last processed block.
    #[error("Stale block: {block} is older than last processed block {last}")]
    StaleBlock { block: u64, last: u64 },

    /// Arithmetic would overflow the fixed-point accumulator or an amount.
    #[error("Arithmetic overflow: {0}")]
    Overflow(String),

    /// Invalid emission or runtime configuration.
    #[error("Config error: {0}")]
    Config(String),

    /// Storage layer error (RocksDB).
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl FurrowError {
    /// Map this error onto the engine's error taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FurrowError::Unauthorized(_) => ErrorKind::Authorization,
            FurrowError::PoolNotFound(_) | FurrowError::PositionNotFound { .. } => {
                ErrorKind::NotFound
            }
            FurrowError::AlreadyListed(_)
            | FurrowError::NotListed(_)
            | FurrowError::InvalidAllocation(_)
            | FurrowError::InvalidState(_)
            | FurrowError::StaleBlock { .. } => ErrorKind::State,
            FurrowError::Overflow(_) => ErrorKind::Arithmetic,
            FurrowError::Config(_) | FurrowError::Storage(_) | FurrowError::Serialization(_) => {
                ErrorKind::Infrastructure
            }
        }
    }

    /// Shorthand for a [`FurrowError::Overflow`] naming the quantity that overflowed.
    pub fn overflow(what: &str) -> Self {
        FurrowError::Overflow(what.to_string())
    }
}

impl From<serde_json::Error> for FurrowError {
    fn from(e: serde_json::Error) -> Self {
        FurrowError::Serialization(e.to_string())
    }
}
