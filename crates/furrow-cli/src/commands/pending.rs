// crates/furrow-cli/src/commands/pending.rs
//
// `furrow pending`: read a position's pending reward from a persisted engine.

use clap::Args;
use serde::Serialize;

use furrow_core::{FurrowError, PoolId, PositionId};
use furrow_economics::{format_token_amount, MiningEngine, SnapshotStore};
use furrow_store::RocksSnapshotStore;

use crate::output::{render, summary_line, OutputFormat};

/// Arguments for `furrow pending`.
#[derive(Debug, Args)]
pub struct PendingCmd {
    /// RocksDB directory written by `furrow replay --db`.
    #[arg(long)]
    db: String,

    #[arg(long)]
    pool: u64,

    #[arg(long)]
    position: u64,

    /// Block to project to. Defaults to the last processed block.
    #[arg(long)]
    block: Option<u64>,
}

#[derive(Debug, Serialize)]
struct PendingReport {
    pool: u64,
    position: u64,
    block: u64,
    in_range: bool,
    liquidity: String,
    pending: String,
}

/// Run the pending command.
pub fn run(cmd: &PendingCmd, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let store = RocksSnapshotStore::open(&cmd.db)?;
    let snapshot = store.load_snapshot()?.ok_or_else(|| {
        FurrowError::Storage(format!("No engine state found in {}", cmd.db))
    })?;
    let engine = MiningEngine::restore(snapshot)?;

    let pool = PoolId(cmd.pool);
    let position = PositionId(cmd.position);
    let block = cmd.block.unwrap_or_else(|| engine.last_block());
    let pending = engine.pending_reward(pool, position, block)?;
    let snapshot = engine
        .position(pool, position)
        .ok_or(FurrowError::PositionNotFound { pool, position })?;

    let report = PendingReport {
        pool: cmd.pool,
        position: cmd.position,
        block,
        in_range: engine.position_in_range(pool, position)?,
        liquidity: snapshot.liquidity.to_string(),
        pending: format_token_amount(pending),
    };

    let rendered = render(format, &report, |report| {
        format!(
            "{} in {} at block {}\n{}\n{}",
            position,
            pool,
            report.block,
            summary_line(&[
                ("Owner", snapshot.owner.to_string()),
                ("Liquidity", report.liquidity.clone()),
                (
                    "Range",
                    format!(
                        "[{}, {}) ({})",
                        snapshot.tick_lower,
                        snapshot.tick_upper,
                        if report.in_range { "in range" } else { "out of range" }
                    ),
                ),
            ]),
            summary_line(&[("Pending", format!("{} tokens", report.pending))])
        )
    });
    println!("{}", rendered);

    Ok(())
}
