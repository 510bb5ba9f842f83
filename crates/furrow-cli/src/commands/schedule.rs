// crates/furrow-cli/src/commands/schedule.rs
//
// `furrow schedule`: print the halving schedule implied by the config.

use serde::Serialize;
use tabled::Tabled;

use furrow_economics::{format_token_amount, EmissionSchedule};

use crate::config::FurrowConfig;
use crate::output::{format_table, render, summary_line, OutputFormat};

/// A row in the schedule table.
#[derive(Debug, Serialize, Tabled)]
struct PeriodRow {
    #[tabled(rename = "Period")]
    period: u32,
    #[tabled(rename = "Start")]
    start_block: u64,
    #[tabled(rename = "End")]
    end_block: u64,
    #[tabled(rename = "Reward/Block")]
    reward_per_block: String,
    #[tabled(rename = "Emitted")]
    emitted: String,
}

#[derive(Debug, Serialize)]
struct CapReport {
    block: u64,
    partial_reward: String,
}

#[derive(Debug, Serialize)]
struct ScheduleReport {
    periods: Vec<PeriodRow>,
    halving_boundaries: Vec<u64>,
    cap_exhaustion: Option<CapReport>,
    total_emission: String,
}

fn build_report(schedule: &EmissionSchedule) -> ScheduleReport {
    let count = schedule.config().halving_count;
    let periods = (0..count)
        .map(|period| {
            let start = schedule.period_start(period);
            let end = schedule.period_start(period + 1);
            PeriodRow {
                period,
                start_block: start,
                end_block: end,
                reward_per_block: format_token_amount(schedule.reward_per_block_of(period)),
                emitted: format_token_amount(
                    schedule.cumulative_emission(end) - schedule.cumulative_emission(start),
                ),
            }
        })
        .collect();

    ScheduleReport {
        periods,
        halving_boundaries: schedule.halving_boundaries(),
        cap_exhaustion: schedule.cap_exhaustion().map(|ex| CapReport {
            block: ex.block,
            partial_reward: format_token_amount(ex.partial_reward),
        }),
        total_emission: format_token_amount(schedule.total_emission()),
    }
}

/// Run the schedule command.
pub fn run(config: &FurrowConfig, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let schedule = EmissionSchedule::new(config.emission_config()?)?;
    let report = build_report(&schedule);

    let emission = schedule.config();
    let rendered = render(format, &report, |report| {
        let cap_line = match &report.cap_exhaustion {
            Some(cap) => format!(
                "Supply cap reached at block {} (final block emits {} tokens).",
                cap.block, cap.partial_reward
            ),
            None => "Supply cap is never reached.".to_string(),
        };
        format!(
            "{}\n\n{}\n\n{}\nTotal emission: {} tokens",
            summary_line(&[
                ("Genesis", emission.genesis_block.to_string()),
                ("Interval", format!("{} blocks", emission.halving_interval_blocks)),
                ("Cap", format!("{} tokens", format_token_amount(emission.total_supply_cap))),
            ]),
            format_table(&report.periods),
            cap_line,
            report.total_emission
        )
    });
    println!("{}", rendered);

    Ok(())
}
