// crates/furrow-cli/src/commands/replay.rs
//
// `furrow replay`: drive the engine with a scripted event log.
//
// The script is a TOML file of `[[events]]` tables, each with a `block` and
// an `action`, applied in order. Accounts are written as labels and hashed
// into keys. A rejected event is logged and reported; it never changes the
// engine. With `--db`, replay resumes from the stored state (if any) and
// persists the final state.

use clap::Args;
use serde::{Deserialize, Serialize};
use tabled::Tabled;

use furrow_core::{
    AccountKey, CrossDirection, FurrowError, LiquidityChange, PoolId, PositionId, TickCrossing,
};
use furrow_economics::{format_token_amount, MiningEngine, SnapshotStore};
use furrow_store::RocksSnapshotStore;

use crate::config::FurrowConfig;
use crate::output::{format_table, render, summary_line, OutputFormat};

/// Arguments for `furrow replay`.
#[derive(Debug, Args)]
pub struct ReplayCmd {
    /// Path to the TOML event script.
    #[arg(long)]
    script: String,

    /// RocksDB directory to resume from and persist into.
    #[arg(long)]
    db: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Script {
    #[serde(default)]
    events: Vec<ScriptEvent>,
}

#[derive(Debug, Deserialize)]
struct ScriptEvent {
    block: u64,
    #[serde(flatten)]
    action: Action,
}

#[derive(Debug, Deserialize)]
struct WeightEntry {
    pool: u64,
    weight: u64,
}

/// One scripted action. Liquidity amounts are `i64` in scripts.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum Action {
    RegisterPool {
        pool: u64,
        #[serde(default)]
        tick: i32,
    },
    AddExecutor {
        caller: String,
        executor: String,
    },
    List {
        caller: String,
        pool: u64,
    },
    Delist {
        caller: String,
        pool: u64,
    },
    Allocate {
        caller: String,
        weights: Vec<WeightEntry>,
    },
    Liquidity {
        pool: u64,
        position: u64,
        owner: String,
        tick_lower: i32,
        tick_upper: i32,
        delta: i64,
        current_tick: i32,
    },
    Cross {
        pool: u64,
        tick: i32,
        direction: CrossDirection,
        delta: i64,
    },
    Approve {
        caller: String,
        pool: u64,
        position: u64,
        operator: Option<String>,
    },
    Harvest {
        caller: String,
        pool: u64,
        position: u64,
    },
    Pending {
        pool: u64,
        position: u64,
    },
}

impl Action {
    fn name(&self) -> &'static str {
        match self {
            Action::RegisterPool { .. } => "register_pool",
            Action::AddExecutor { .. } => "add_executor",
            Action::List { .. } => "list",
            Action::Delist { .. } => "delist",
            Action::Allocate { .. } => "allocate",
            Action::Liquidity { .. } => "liquidity",
            Action::Cross { .. } => "cross",
            Action::Approve { .. } => "approve",
            Action::Harvest { .. } => "harvest",
            Action::Pending { .. } => "pending",
        }
    }
}

fn key(label: &str) -> AccountKey {
    AccountKey::from_label(label)
}

/// Apply one action; returns a short human-readable outcome.
fn apply(engine: &mut MiningEngine, block: u64, action: &Action) -> Result<String, FurrowError> {
    match action {
        Action::RegisterPool { pool, tick } => {
            engine.register_pool(PoolId(*pool), *tick, block)?;
            Ok(format!("registered at tick {}", tick))
        }
        Action::AddExecutor { caller, executor } => {
            engine.add_executor(&key(caller), key(executor))?;
            Ok(format!("{} is an executor", executor))
        }
        Action::List { caller, pool } => {
            engine.list(&key(caller), PoolId(*pool), block)?;
            Ok(format!("listed with weight {}", engine.allocation_of(PoolId(*pool))))
        }
        Action::Delist { caller, pool } => {
            engine.delist(&key(caller), PoolId(*pool), block)?;
            Ok(format!("delisted, total weight {}", engine.total_weight()))
        }
        Action::Allocate { caller, weights } => {
            let batch: Vec<(PoolId, u64)> = weights
                .iter()
                .map(|w| (PoolId(w.pool), w.weight))
                .collect();
            engine.allocate(&key(caller), &batch, block)?;
            Ok(format!("total weight {}", engine.total_weight()))
        }
        Action::Liquidity {
            pool,
            position,
            owner,
            tick_lower,
            tick_upper,
            delta,
            current_tick,
        } => {
            let change = LiquidityChange {
                pool: PoolId(*pool),
                position: PositionId(*position),
                owner: key(owner),
                tick_lower: *tick_lower,
                tick_upper: *tick_upper,
                liquidity_delta: *delta as i128,
                current_tick: *current_tick,
            };
            let owed = engine.on_liquidity_change(&change, block)?;
            Ok(format!("owed {}", format_token_amount(owed)))
        }
        Action::Cross {
            pool,
            tick,
            direction,
            delta,
        } => {
            let crossing = TickCrossing {
                pool: PoolId(*pool),
                tick: *tick,
                direction: *direction,
                liquidity_delta: *delta as i128,
            };
            engine.on_tick_cross(&crossing, block)?;
            Ok(format!("current tick {}", crossing.tick_after()))
        }
        Action::Approve {
            caller,
            pool,
            position,
            operator,
        } => {
            engine.approve(
                &key(caller),
                PoolId(*pool),
                PositionId(*position),
                operator.as_deref().map(key),
                block,
            )?;
            Ok(match operator {
                Some(op) => format!("{} approved", op),
                None => "approval cleared".to_string(),
            })
        }
        Action::Harvest {
            caller,
            pool,
            position,
        } => {
            let paid = engine.harvest(&key(caller), PoolId(*pool), PositionId(*position), block)?;
            Ok(format!("paid {}", format_token_amount(paid)))
        }
        Action::Pending { pool, position } => {
            let pending = engine.pending_reward(PoolId(*pool), PositionId(*position), block)?;
            Ok(format!("pending {}", format_token_amount(pending)))
        }
    }
}

/// A row in the event table.
#[derive(Debug, Serialize, Tabled)]
struct EventRow {
    #[tabled(rename = "Block")]
    block: u64,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "OK")]
    ok: bool,
    #[tabled(rename = "Outcome")]
    outcome: String,
}

/// A row in the final position table.
#[derive(Debug, Serialize, Tabled)]
struct PositionRow {
    #[tabled(rename = "Pool")]
    pool: u64,
    #[tabled(rename = "Position")]
    position: u64,
    #[tabled(rename = "Owner")]
    owner: String,
    #[tabled(rename = "Liquidity")]
    liquidity: String,
    #[tabled(rename = "Range")]
    range: String,
    #[tabled(rename = "In Range")]
    in_range: bool,
    #[tabled(rename = "Pending")]
    pending: String,
}

#[derive(Debug, Serialize)]
struct ReplayReport {
    events: Vec<EventRow>,
    positions: Vec<PositionRow>,
    last_block: u64,
    total_emitted: String,
    total_paid: String,
}

fn replay(engine: &mut MiningEngine, script: &Script) -> Vec<EventRow> {
    script
        .events
        .iter()
        .map(|event| {
            let result = apply(engine, event.block, &event.action);
            if let Err(e) = &result {
                tracing::warn!(
                    target: "furrow::cli",
                    block = event.block,
                    action = event.action.name(),
                    error = %e,
                    "event rejected"
                );
            }
            EventRow {
                block: event.block,
                action: event.action.name().to_string(),
                ok: result.is_ok(),
                outcome: result.unwrap_or_else(|e| e.to_string()),
            }
        })
        .collect()
}

fn position_rows(engine: &MiningEngine) -> Vec<PositionRow> {
    let block = engine.last_block();
    engine
        .positions()
        .map(|p| PositionRow {
            pool: p.pool_id.0,
            position: p.position_id.0,
            owner: p.owner.to_string(),
            liquidity: p.liquidity.to_string(),
            range: format!("[{}, {})", p.tick_lower, p.tick_upper),
            in_range: engine
                .position_in_range(p.pool_id, p.position_id)
                .unwrap_or(false),
            pending: engine
                .pending_reward(p.pool_id, p.position_id, block)
                .map(format_token_amount)
                .unwrap_or_else(|e| e.to_string()),
        })
        .collect()
}

/// Build a fresh engine from config, or resume one from `store`.
fn open_engine(
    config: &FurrowConfig,
    store: Option<&RocksSnapshotStore>,
) -> Result<MiningEngine, Box<dyn std::error::Error>> {
    if let Some(snapshot) = store.map(|s| s.load_snapshot()).transpose()?.flatten() {
        tracing::info!(
            "Resuming engine state at block {}",
            snapshot.meta.last_block
        );
        return Ok(MiningEngine::restore(snapshot)?);
    }
    let admin = config.admin_key();
    let mut engine = MiningEngine::new(config.emission_config()?, admin)?;
    for executor in config.executor_keys() {
        engine.add_executor(&admin, executor)?;
    }
    Ok(engine)
}

/// Run the replay command.
pub fn run(
    cmd: &ReplayCmd,
    config: &FurrowConfig,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(&cmd.script)?;
    let script: Script = toml::from_str(&contents)?;

    let store = cmd.db.as_deref().map(RocksSnapshotStore::open).transpose()?;
    let mut engine = open_engine(config, store.as_ref())?;

    let events = replay(&mut engine, &script);
    let rejected = events.iter().filter(|e| !e.ok).count();
    tracing::info!(
        "Replayed {} events ({} rejected) up to block {}",
        events.len(),
        rejected,
        engine.last_block()
    );

    if let Some(store) = &store {
        store.save_snapshot(&engine.snapshot())?;
        tracing::info!("Persisted engine state to {}", cmd.db.as_deref().unwrap_or_default());
    }

    let report = ReplayReport {
        positions: position_rows(&engine),
        events,
        last_block: engine.last_block(),
        total_emitted: format_token_amount(engine.total_emitted()),
        total_paid: format_token_amount(engine.total_paid()),
    };

    let rendered = render(format, &report, |report| {
        format!(
            "{}\n\nPositions at block {}\n{}\n\n{}",
            format_table(&report.events),
            report.last_block,
            format_table(&report.positions),
            summary_line(&[
                ("Emitted to in-range liquidity", report.total_emitted.clone()),
                ("Paid out", report.total_paid.clone()),
            ])
        )
    });
    println!("{}", rendered);

    Ok(())
}
