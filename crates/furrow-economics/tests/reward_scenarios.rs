// crates/furrow-economics/tests/reward_scenarios.rs
//
// End-to-end reward scenarios against the public MiningEngine API, using
// the reference deployment's emission parameters (genesis 1001, 28,800
// blocks per period, 300,000 tokens per block, 9.55B token cap).
//
// Payout scenarios run over several position sizes, most of which do not
// divide the Q128 scale.

use furrow_core::{
    AccountKey, CrossDirection, ErrorKind, FurrowError, LiquidityChange, PoolId, PositionId,
    TickCrossing, MAX_TICK, MIN_TICK,
};
use furrow_economics::{tokens, EmissionConfig, MiningEngine};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const L: i128 = 100_000_000_000_000_000_007;

const LIQUIDITIES: [i128; 6] = [
    1,
    3,
    1 << 60,
    99_999_999_999_999_999_999,
    100_000_000_000_000_000_007,
    123_456_789_012_345_678_901_234,
];

const GENESIS: u64 = 1_001;
const HALVING: u64 = GENESIS + 28_800;

fn rate() -> u128 {
    tokens(300_000)
}

fn admin() -> AccountKey {
    AccountKey::from_label("admin")
}

fn account(label: &str) -> AccountKey {
    AccountKey::from_label(label)
}

fn engine_with_pools(pools: &[(u64, u64)], block: u64) -> MiningEngine {
    let mut engine = MiningEngine::new(EmissionConfig::default(), admin()).unwrap();
    let mut batch = Vec::new();
    for &(pool, weight) in pools {
        engine.register_pool(PoolId(pool), 0, block).unwrap();
        engine.list(&admin(), PoolId(pool), block).unwrap();
        batch.push((PoolId(pool), weight));
    }
    engine.allocate(&admin(), &batch, block).unwrap();
    engine
}

fn full_range(pool: u64, position: u64, owner: &str, delta: i128) -> LiquidityChange {
    ranged(pool, position, owner, MIN_TICK, MAX_TICK, delta, 0)
}

fn ranged(
    pool: u64,
    position: u64,
    owner: &str,
    tick_lower: i32,
    tick_upper: i32,
    delta: i128,
    current_tick: i32,
) -> LiquidityChange {
    LiquidityChange {
        pool: PoolId(pool),
        position: PositionId(position),
        owner: account(owner),
        tick_lower,
        tick_upper,
        liquidity_delta: delta,
        current_tick,
    }
}

fn crossing(pool: u64, tick: i32, direction: CrossDirection, delta: i128) -> TickCrossing {
    TickCrossing {
        pool: PoolId(pool),
        tick,
        direction,
        liquidity_delta: delta,
    }
}

fn harvest(engine: &mut MiningEngine, owner: &str, pool: u64, position: u64, block: u64) -> u128 {
    engine
        .harvest(&account(owner), PoolId(pool), PositionId(position), block)
        .unwrap()
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn test_single_full_range_position_earns_every_block() {
    for l in LIQUIDITIES {
        let start = 2_000;
        let mut engine = engine_with_pools(&[(1, 10_000)], start);
        engine.on_liquidity_change(&full_range(1, 1, "alice", l), start).unwrap();

        assert_eq!(harvest(&mut engine, "alice", 1, 1, start + 10), 10 * rate());
        assert_eq!(engine.paid_to(&account("alice")), 10 * rate());
    }
}

#[test]
fn test_two_positions_share_after_second_enters() {
    for l in LIQUIDITIES {
        let s1 = 2_000;
        let s2 = 2_007;
        let mut engine = engine_with_pools(&[(1, 10_000)], s1);
        engine.on_liquidity_change(&full_range(1, 1, "alice", l), s1).unwrap();
        engine.on_liquidity_change(&full_range(1, 2, "bob", l), s2).unwrap();

        let first = harvest(&mut engine, "alice", 1, 1, s2 + 10);
        let second = harvest(&mut engine, "bob", 1, 2, s2 + 10);
        assert_eq!(first, (s2 - s1) as u128 * rate() + 10 * rate() / 2);
        assert_eq!(second, 10 * rate() / 2);
    }
}

#[test]
fn test_delist_then_relist_skips_inactive_window() {
    for l in LIQUIDITIES {
        let start = 2_000;
        let mut engine = engine_with_pools(&[(1, 10_000)], start);
        engine.on_liquidity_change(&full_range(1, 1, "alice", l), start).unwrap();

        engine.delist(&admin(), PoolId(1), start + 5).unwrap();
        assert_eq!(engine.current_reward_per_block(PoolId(1), start + 6), 0);
        assert_eq!(
            engine.pending_reward(PoolId(1), PositionId(1), start + 12).unwrap(),
            5 * rate()
        );

        engine.list(&admin(), PoolId(1), start + 15).unwrap();
        assert_eq!(engine.allocation_of(PoolId(1)), 10_000);
        assert_eq!(harvest(&mut engine, "alice", 1, 1, start + 20), 10 * rate());
    }
}

#[test]
fn test_delisting_redistributes_from_next_checkpoint() {
    for l in LIQUIDITIES {
        let start = 2_000;
        let mut engine = engine_with_pools(&[(0, 100), (1, 100), (2, 100), (3, 100)], start);
        for pool in 0..4 {
            engine
                .on_liquidity_change(&full_range(pool, 1, "alice", l), start)
                .unwrap();
        }
        assert_eq!(engine.current_reward_per_block(PoolId(0), start), rate() / 4);

        engine.delist(&admin(), PoolId(3), start + 10).unwrap();
        assert_eq!(engine.current_reward_per_block(PoolId(0), start + 10), rate() / 3);

        // The 10 blocks before the delist stay priced at a quarter share.
        assert_eq!(
            engine.pending_reward(PoolId(0), PositionId(1), start + 10).unwrap(),
            10 * (rate() / 4)
        );
        assert_eq!(
            engine.pending_reward(PoolId(0), PositionId(1), start + 16).unwrap(),
            10 * (rate() / 4) + 6 * (rate() / 3)
        );
        // The delisted pool keeps what it earned and stops there.
        assert_eq!(
            engine.pending_reward(PoolId(3), PositionId(1), start + 16).unwrap(),
            10 * (rate() / 4)
        );
    }
}

#[test]
fn test_allocation_share_after_delisting_one_of_hundred() {
    let pools: Vec<(u64, u64)> = (0..100).map(|i| (i, 100)).collect();
    let mut engine = engine_with_pools(&pools, 2_000);
    assert_eq!(engine.allocation_share_bps(PoolId(0)), 100);

    engine.delist(&admin(), PoolId(99), 2_001).unwrap();
    assert_eq!(engine.allocation_share_bps(PoolId(0)), 101);
    assert_eq!(engine.allocation_of(PoolId(0)), 100);
    assert_eq!(engine.total_weight(), 9_900);
}

#[test]
fn test_allocation_reweights_only_future_blocks() {
    for l in LIQUIDITIES {
        let start = 2_000;
        let mut engine = engine_with_pools(&[(1, 100), (2, 100)], start);
        engine.on_liquidity_change(&full_range(1, 1, "alice", l), start).unwrap();

        engine
            .allocate(&admin(), &[(PoolId(1), 300), (PoolId(2), 100)], start + 8)
            .unwrap();
        assert_eq!(
            harvest(&mut engine, "alice", 1, 1, start + 12),
            8 * (rate() / 2) + 4 * (rate() * 3 / 4)
        );
    }
}

#[test]
fn test_empty_pool_does_not_backfill() {
    for l in LIQUIDITIES {
        let start = 2_000;
        let mut engine = engine_with_pools(&[(1, 10_000)], start);
        engine
            .on_liquidity_change(&full_range(1, 1, "alice", l), start + 10)
            .unwrap();
        assert_eq!(harvest(&mut engine, "alice", 1, 1, start + 20), 10 * rate());
        assert_eq!(engine.total_emitted(), 10 * rate());
    }
}

#[test]
fn test_out_of_range_position_earns_only_while_crossed_in() {
    for l in LIQUIDITIES {
        let start = 2_000;
        let mut engine = engine_with_pools(&[(1, 10_000)], start);
        engine.on_liquidity_change(&full_range(1, 1, "alice", l), start).unwrap();
        engine
            .on_liquidity_change(&ranged(1, 2, "bob", 60, 120, l, 0), start)
            .unwrap();
        assert!(!engine.position_in_range(PoolId(1), PositionId(2)).unwrap());
        assert_eq!(engine.pending_reward(PoolId(1), PositionId(2), start + 10).unwrap(), 0);

        engine
            .on_tick_cross(&crossing(1, 60, CrossDirection::Up, l), start + 10)
            .unwrap();
        assert!(engine.position_in_range(PoolId(1), PositionId(2)).unwrap());
        engine
            .on_tick_cross(&crossing(1, 60, CrossDirection::Down, -l), start + 14)
            .unwrap();
        assert!(!engine.position_in_range(PoolId(1), PositionId(2)).unwrap());

        let bob = harvest(&mut engine, "bob", 1, 2, start + 20);
        let alice = harvest(&mut engine, "alice", 1, 1, start + 20);
        assert_eq!(bob, 4 * rate() / 2);
        assert_eq!(alice, 16 * rate() + 4 * rate() / 2);
        assert_eq!(alice + bob, 20 * rate());
    }
}

#[test]
fn test_crossing_with_wrong_delta_is_rejected_without_effect() {
    let start = 2_000;
    let mut engine = engine_with_pools(&[(1, 10_000)], start);
    engine
        .on_liquidity_change(&ranged(1, 1, "alice", 60, 120, L, 0), start)
        .unwrap();
    let before = engine.pool(PoolId(1)).unwrap().clone();

    let err = engine
        .on_tick_cross(&crossing(1, 60, CrossDirection::Up, L / 2), start + 5)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::State);
    assert_eq!(engine.pool(PoolId(1)).unwrap(), &before);
    assert_eq!(engine.last_block(), start);
}

#[test]
fn test_span_across_halving_is_split() {
    for l in LIQUIDITIES {
        let mut engine = engine_with_pools(&[(1, 1)], HALVING - 5);
        engine
            .on_liquidity_change(&full_range(1, 1, "alice", l), HALVING - 5)
            .unwrap();
        assert_eq!(
            harvest(&mut engine, "alice", 1, 1, HALVING + 5),
            5 * rate() + 5 * rate() / 2
        );
    }
}

#[test]
fn test_supply_cap_stops_emission() {
    let reference = MiningEngine::new(EmissionConfig::default(), admin()).unwrap();
    let exhaustion = reference.schedule().cap_exhaustion().unwrap();
    assert_eq!(exhaustion.block, HALVING + 6_066);

    for l in LIQUIDITIES {
        let start = exhaustion.block - 7;
        let mut engine = engine_with_pools(&[(1, 1)], start);
        engine.on_liquidity_change(&full_range(1, 1, "alice", l), start).unwrap();
        let paid = harvest(&mut engine, "alice", 1, 1, exhaustion.block + 50);
        assert_eq!(paid, 7 * rate() / 2 + tokens(100_000));
        assert_eq!(engine.current_reward_per_block(PoolId(1), exhaustion.block + 1), 0);
        assert_eq!(
            engine.halving_boundaries(),
            vec![GENESIS, HALVING, exhaustion.block, exhaustion.block + 1]
        );
    }
}

#[test]
fn test_harvest_is_idempotent_within_a_block() {
    for l in LIQUIDITIES {
        let start = 2_000;
        let mut engine = engine_with_pools(&[(1, 10_000)], start);
        engine.on_liquidity_change(&full_range(1, 1, "alice", l), start).unwrap();
        assert_eq!(harvest(&mut engine, "alice", 1, 1, start + 3), 3 * rate());
        assert_eq!(harvest(&mut engine, "alice", 1, 1, start + 3), 0);
        assert_eq!(harvest(&mut engine, "alice", 1, 1, start + 4), rate());
    }
}

#[test]
fn test_unauthorized_management_and_harvest() {
    let start = 2_000;
    let mut engine = engine_with_pools(&[(1, 10_000)], start);
    engine.on_liquidity_change(&full_range(1, 1, "alice", L), start).unwrap();

    let mallory = account("mallory");
    for err in [
        engine.delist(&mallory, PoolId(1), start + 1).unwrap_err(),
        engine
            .allocate(&mallory, &[(PoolId(1), 1)], start + 1)
            .unwrap_err(),
        engine
            .harvest(&mallory, PoolId(1), PositionId(1), start + 1)
            .unwrap_err(),
    ] {
        assert_eq!(err.kind(), ErrorKind::Authorization);
        assert!(err.to_string().starts_with("Caller is unauthorized"));
    }
    assert_eq!(engine.allocation_of(PoolId(1)), 10_000);
    assert_eq!(engine.last_block(), start);
    assert_eq!(harvest(&mut engine, "alice", 1, 1, start + 1), rate());
}

#[test]
fn test_malformed_allocation_has_no_partial_effect() {
    let start = 2_000;
    let mut engine = engine_with_pools(&[(1, 100), (2, 100)], start);
    let err = engine
        .allocate(&admin(), &[(PoolId(1), 500), (PoolId(1), 600)], start + 1)
        .unwrap_err();
    assert!(matches!(err, FurrowError::InvalidAllocation(_)));
    assert_eq!(engine.allocation_of(PoolId(1)), 100);
    assert_eq!(engine.pool(PoolId(1)).unwrap().last_checkpoint_block, start);

    assert!(matches!(
        engine.list(&admin(), PoolId(1), start + 1),
        Err(FurrowError::AlreadyListed(PoolId(1)))
    ));
    engine.delist(&admin(), PoolId(2), start + 1).unwrap();
    assert!(matches!(
        engine.delist(&admin(), PoolId(2), start + 2),
        Err(FurrowError::NotListed(PoolId(2)))
    ));
}

#[test]
fn test_payout_never_exceeds_emission() {
    let start = 2_000;
    let mut engine = engine_with_pools(&[(1, 3), (2, 7)], start);
    engine.on_liquidity_change(&full_range(1, 1, "alice", 3), start).unwrap();
    engine.on_liquidity_change(&full_range(1, 2, "bob", 5), start + 1).unwrap();
    engine.on_liquidity_change(&full_range(2, 1, "carol", 11), start + 2).unwrap();
    engine.on_liquidity_change(&full_range(1, 2, "bob", -2), start + 9).unwrap();

    let end = start + 40;
    let paid = harvest(&mut engine, "alice", 1, 1, end)
        + harvest(&mut engine, "bob", 1, 2, end)
        + harvest(&mut engine, "carol", 2, 1, end);
    assert_eq!(paid, engine.total_paid());
    for pool in [1, 2] {
        let pool = engine.pool(PoolId(pool)).unwrap();
        assert!(pool.total_paid <= pool.total_accrued);
    }
    assert!(engine.total_paid() <= engine.total_emitted());
    assert!(engine.total_emitted() <= engine.schedule().cumulative_emission(end));
    assert_eq!(
        engine.vault_balance() + engine.total_paid(),
        EmissionConfig::default().total_supply_cap
    );
}

#[test]
fn test_snapshot_restore_preserves_pending() {
    let start = 2_000;
    let mut engine = engine_with_pools(&[(1, 10_000)], start);
    engine.on_liquidity_change(&full_range(1, 1, "alice", L), start).unwrap();
    engine
        .on_liquidity_change(&ranged(1, 2, "bob", -60, 60, L, 0), start + 2)
        .unwrap();

    let mut restored = MiningEngine::restore(engine.snapshot()).unwrap();
    assert_eq!(
        harvest(&mut restored, "bob", 1, 2, start + 12),
        harvest(&mut engine, "bob", 1, 2, start + 12)
    );
    assert_eq!(restored.snapshot(), engine.snapshot());
}
