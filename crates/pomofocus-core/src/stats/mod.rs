//! Statistics over recorded sessions: totals, streaks and chart series.

mod aggregator;
mod calendar;
mod chart;
mod range;
mod streaks;

pub use aggregator::{Overview, RangeTotals, StatisticsAggregator};
pub use chart::ChartBucket;
pub use range::StatsRange;
pub use streaks::Streaks;

/// Human-readable duration, e.g. `1h 5m` or `25m`.
pub fn format_duration(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_hours_and_minutes() {
        assert_eq!(format_duration(0), "0m");
        assert_eq!(format_duration(1500), "25m");
        assert_eq!(format_duration(3900), "1h 5m");
        assert_eq!(format_duration(7200), "2h 0m");
    }
}
