// crates/furrow-store/src/rocks.rs
//
// RocksDB-backed persistent storage for engine snapshots.
//
// Key format:
//   - `emission_config`                    -> JSON EmissionConfig (write-once)
//   - `engine:meta`                        -> JSON EngineMeta
//   - `pool:{pool_id}`                     -> JSON PoolRecord
//   - `position:{pool_id}:{position_id}`   -> JSON PositionSnapshot
//
// A save is one atomic WriteBatch. Pool and position keys that are not part
// of the snapshot being saved are deleted in the same batch, so the stored
// state never mixes two snapshots.

use std::collections::BTreeSet;

use rocksdb::{DBWithThreadMode, MultiThreaded, Options, WriteBatch};
use serde::de::DeserializeOwned;
use tracing::debug;

use furrow_core::{FurrowError, PoolId, PositionId};
use furrow_economics::{
    EmissionConfig, EngineMeta, EngineSnapshot, PoolRecord, PositionSnapshot, SnapshotStore,
};

const CONFIG_KEY: &[u8] = b"emission_config";
const META_KEY: &[u8] = b"engine:meta";
const POOL_PREFIX: &str = "pool:";
const POSITION_PREFIX: &str = "position:";

/// RocksDB wrapper implementing the `SnapshotStore` trait.
#[derive(Debug)]
pub struct RocksSnapshotStore {
    db: DBWithThreadMode<MultiThreaded>,
}

impl RocksSnapshotStore {
    /// Open a RocksDB database at the given filesystem path.
    ///
    /// Creates the database directory if it does not exist.
    pub fn open(path: &str) -> Result<Self, FurrowError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);

        let db = DBWithThreadMode::<MultiThreaded>::open(&opts, path)
            .map_err(|e| FurrowError::Storage(format!("Failed to open RocksDB at {}: {}", path, e)))?;

        Ok(Self { db })
    }

    fn pool_key(pool_id: PoolId) -> Vec<u8> {
        format!("{}{}", POOL_PREFIX, pool_id.0).into_bytes()
    }

    fn position_key(pool_id: PoolId, position_id: PositionId) -> Vec<u8> {
        format!("{}{}:{}", POSITION_PREFIX, pool_id.0, position_id.0).into_bytes()
    }

    fn get_raw(&self, key: &[u8]) -> Result<Option<Vec<u8>>, FurrowError> {
        self.db
            .get(key)
            .map_err(|e| FurrowError::Storage(format!("RocksDB get failed: {}", e)))
    }

    fn get_json<T: DeserializeOwned>(&self, key: &[u8]) -> Result<Option<T>, FurrowError> {
        match self.get_raw(key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Every (key, value) pair whose key starts with `prefix`.
    fn scan_prefix(&self, prefix: &str) -> Result<Vec<(Vec<u8>, Vec<u8>)>, FurrowError> {
        let prefix = prefix.as_bytes();
        let mut entries = Vec::new();
        for item in self.db.prefix_iterator(prefix) {
            let (key, value) = item
                .map_err(|e| FurrowError::Storage(format!("RocksDB iteration error: {}", e)))?;
            // No prefix extractor is configured; stop once past the prefix.
            if !key.starts_with(prefix) {
                break;
            }
            entries.push((key.to_vec(), value.to_vec()));
        }
        Ok(entries)
    }

    /// The stored emission config, if the database has been initialized.
    pub fn emission_config(&self) -> Result<Option<EmissionConfig>, FurrowError> {
        self.get_json(CONFIG_KEY)
    }
}

impl SnapshotStore for RocksSnapshotStore {
    fn save_snapshot(&self, snapshot: &EngineSnapshot) -> Result<(), FurrowError> {
        let mut batch = WriteBatch::default();

        match self.emission_config()? {
            Some(stored) if stored != snapshot.config => {
                return Err(FurrowError::Config(
                    "emission config is write-once and differs from the stored config".to_string(),
                ));
            }
            Some(_) => {}
            None => batch.put(CONFIG_KEY, serde_json::to_vec(&snapshot.config)?),
        }

        batch.put(META_KEY, serde_json::to_vec(&snapshot.meta)?);

        let mut live = BTreeSet::new();
        for record in &snapshot.pools {
            let key = Self::pool_key(record.allocation.pool_id);
            batch.put(&key, serde_json::to_vec(record)?);
            live.insert(key);
        }
        for position in &snapshot.positions {
            let key = Self::position_key(position.pool_id, position.position_id);
            batch.put(&key, serde_json::to_vec(position)?);
            live.insert(key);
        }

        let mut removed = 0usize;
        for prefix in [POOL_PREFIX, POSITION_PREFIX] {
            for (key, _) in self.scan_prefix(prefix)? {
                if !live.contains(&key) {
                    batch.delete(&key);
                    removed += 1;
                }
            }
        }

        self.db
            .write(batch)
            .map_err(|e| FurrowError::Storage(format!("RocksDB write failed: {}", e)))?;
        debug!(
            target: "furrow::store",
            pools = snapshot.pools.len(),
            positions = snapshot.positions.len(),
            removed,
            last_block = snapshot.meta.last_block,
            "snapshot saved"
        );
        Ok(())
    }

    fn load_snapshot(&self) -> Result<Option<EngineSnapshot>, FurrowError> {
        let config: EmissionConfig = match self.emission_config()? {
            Some(config) => config,
            None => return Ok(None),
        };
        let meta: EngineMeta = self.get_json(META_KEY)?.ok_or_else(|| {
            FurrowError::Storage("emission_config present but engine:meta missing".to_string())
        })?;

        let pools = self
            .scan_prefix(POOL_PREFIX)?
            .into_iter()
            .map(|(_, value)| serde_json::from_slice::<PoolRecord>(&value).map_err(FurrowError::from))
            .collect::<Result<Vec<_>, _>>()?;
        let positions = self
            .scan_prefix(POSITION_PREFIX)?
            .into_iter()
            .map(|(_, value)| {
                serde_json::from_slice::<PositionSnapshot>(&value).map_err(FurrowError::from)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(EngineSnapshot {
            config,
            meta,
            pools,
            positions,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use furrow_core::{AccountKey, LiquidityChange, MAX_TICK, MIN_TICK};
    use furrow_economics::MiningEngine;
    use uuid::Uuid;

    /// Create a temporary directory path using UUID to avoid conflicts.
    fn temp_db_path(label: &str) -> String {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("furrow_test_{}_{}", label, Uuid::now_v7()));
        path.to_string_lossy().to_string()
    }

    fn admin() -> AccountKey {
        AccountKey::from_label("admin")
    }

    fn mint(position: u64, delta: i128) -> LiquidityChange {
        LiquidityChange {
            pool: PoolId(1),
            position: PositionId(position),
            owner: AccountKey::from_label("alice"),
            tick_lower: MIN_TICK,
            tick_upper: MAX_TICK,
            liquidity_delta: delta,
            current_tick: 0,
        }
    }

    fn engine() -> MiningEngine {
        let mut engine = MiningEngine::new(EmissionConfig::default(), admin()).unwrap();
        engine.register_pool(PoolId(1), 0, 2_000).unwrap();
        engine.list(&admin(), PoolId(1), 2_000).unwrap();
        engine.allocate(&admin(), &[(PoolId(1), 100)], 2_000).unwrap();
        engine.on_liquidity_change(&mint(1, 1 << 60), 2_000).unwrap();
        engine.on_liquidity_change(&mint(2, 1 << 60), 2_004).unwrap();
        engine
    }

    #[test]
    fn test_empty_database_loads_nothing() {
        let path = temp_db_path("empty");
        let store = RocksSnapshotStore::open(&path).unwrap();
        assert!(store.load_snapshot().unwrap().is_none());
        drop(store);
        let _ = std::fs::remove_dir_all(&path);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let path = temp_db_path("roundtrip");
        let store = RocksSnapshotStore::open(&path).unwrap();
        let engine = engine();
        store.save_snapshot(&engine.snapshot()).unwrap();

        let loaded = store.load_snapshot().unwrap().unwrap();
        assert_eq!(loaded, engine.snapshot());
        let restored = MiningEngine::restore(loaded).unwrap();
        assert_eq!(
            restored.pending_reward(PoolId(1), PositionId(1), 2_010).unwrap(),
            engine.pending_reward(PoolId(1), PositionId(1), 2_010).unwrap()
        );
        drop(store);
        let _ = std::fs::remove_dir_all(&path);
    }

    #[test]
    fn test_removed_positions_are_deleted() {
        let path = temp_db_path("removal");
        let store = RocksSnapshotStore::open(&path).unwrap();
        let mut engine = engine();
        store.save_snapshot(&engine.snapshot()).unwrap();

        engine.on_liquidity_change(&mint(2, -(1 << 60)), 2_010).unwrap();
        let alice = AccountKey::from_label("alice");
        engine.harvest(&alice, PoolId(1), PositionId(2), 2_010).unwrap();
        assert!(engine.position(PoolId(1), PositionId(2)).is_none());
        store.save_snapshot(&engine.snapshot()).unwrap();

        let loaded = store.load_snapshot().unwrap().unwrap();
        assert_eq!(loaded.positions.len(), 1);
        assert!(store
            .get_raw(&RocksSnapshotStore::position_key(PoolId(1), PositionId(2)))
            .unwrap()
            .is_none());
        drop(store);
        let _ = std::fs::remove_dir_all(&path);
    }

    #[test]
    fn test_emission_config_is_write_once() {
        let path = temp_db_path("write_once");
        let store = RocksSnapshotStore::open(&path).unwrap();
        let engine = engine();
        store.save_snapshot(&engine.snapshot()).unwrap();

        let mut altered = engine.snapshot();
        altered.config.halving_count = 6;
        altered.meta.last_block = 9_999;
        assert!(matches!(
            store.save_snapshot(&altered),
            Err(FurrowError::Config(_))
        ));
        // Nothing from the rejected save was written.
        let loaded = store.load_snapshot().unwrap().unwrap();
        assert_eq!(loaded.meta.last_block, engine.last_block());
        assert_eq!(store.emission_config().unwrap(), Some(EmissionConfig::default()));
        drop(store);
        let _ = std::fs::remove_dir_all(&path);
    }
}
