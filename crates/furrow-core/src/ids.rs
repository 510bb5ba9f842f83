// crates/furrow-core/src/ids.rs
//
// Identifiers shared by every Furrow crate.
//
// Pools and positions are independent records joined by these ids; neither
// owns the other. Accounts are opaque 32-byte keys.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Lowest tick a position boundary may use.
pub const MIN_TICK: i32 = -887_272;

/// Highest tick a position boundary may use.
pub const MAX_TICK: i32 = 887_272;

/// Identifier of an AMM pool that may be listed for liquidity mining.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PoolId(pub u64);

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pool#{}", self.0)
    }
}

/// Identifier of a liquidity position (the position-NFT token id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PositionId(pub u64);

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "position#{}", self.0)
    }
}

/// A 32-byte account key (position owners, operators, admin, executors).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountKey(pub [u8; 32]);

impl AccountKey {
    /// Derive a deterministic key from a human-readable label.
    ///
    /// Used by the CLI and tests so scripts can name accounts ("alice",
    /// "admin") instead of spelling out raw keys.
    pub fn from_label(label: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"furrow:account:");
        hasher.update(label.as_bytes());
        Self(hasher.finalize().into())
    }

    /// Short hex form: the first four bytes.
    pub fn short_hex(&self) -> String {
        self.0[..4].iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl fmt::Display for AccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.short_hex())
    }
}

/// Returns `true` when `tick` lies within the representable tick range.
pub fn tick_in_bounds(tick: i32) -> bool {
    (MIN_TICK..=MAX_TICK).contains(&tick)
}
