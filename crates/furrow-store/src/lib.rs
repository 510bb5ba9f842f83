// crates/furrow-store/src/lib.rs
//
// furrow-store: Storage layer for the Furrow liquidity-mining engine.
//
// Provides a RocksDB-backed implementation of the economics crate's
// `SnapshotStore` trait.

pub mod rocks;

pub use rocks::RocksSnapshotStore;
