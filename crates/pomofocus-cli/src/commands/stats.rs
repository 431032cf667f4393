use std::sync::Arc;

use clap::Subcommand;
use pomofocus_core::stats::format_duration;
use pomofocus_core::{Database, StatisticsAggregator, StatsRange, SystemClock};
use serde_json::json;

#[derive(Subcommand)]
pub enum StatsAction {
    /// Completed time and session count
    Totals {
        /// today, week, month or all
        #[arg(long, default_value = "today")]
        range: StatsRange,
    },
    /// Current and longest day streaks
    Streaks,
    /// Minutes per chart bucket
    Chart {
        /// today, week, month or all
        #[arg(long, default_value = "week")]
        range: StatsRange,
    },
    /// Today, this week, all time and streaks at once
    Overview,
    /// Completed sessions, newest first
    History {
        /// today, week, month or all
        #[arg(long, default_value = "today")]
        range: StatsRange,
    },
}

pub fn run(action: StatsAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    let stats = StatisticsAggregator::new(&db, Arc::new(SystemClock));

    match action {
        StatsAction::Totals { range } => {
            let totals = stats.totals_for_range(range)?;
            let out = json!({
                "range": range,
                "total_secs": totals.total_secs,
                "session_count": totals.session_count,
                "formatted": format_duration(totals.total_secs),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        StatsAction::Streaks => {
            println!("{}", serde_json::to_string_pretty(&stats.streaks()?)?);
        }
        StatsAction::Chart { range } => {
            println!("{}", serde_json::to_string_pretty(&stats.chart_data(range)?)?);
        }
        StatsAction::Overview => {
            println!("{}", serde_json::to_string_pretty(&stats.overview()?)?);
        }
        StatsAction::History { range } => {
            println!("{}", serde_json::to_string_pretty(&stats.recent_sessions(range)?)?);
        }
    }
    Ok(())
}
