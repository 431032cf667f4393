use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Calendar window a statistic is computed over, in the aggregator's time zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatsRange {
    Today,
    ThisWeek,
    ThisMonth,
    AllTime,
}

impl StatsRange {
    pub const ALL: [StatsRange; 4] = [
        StatsRange::Today,
        StatsRange::ThisWeek,
        StatsRange::ThisMonth,
        StatsRange::AllTime,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            StatsRange::Today => "Today",
            StatsRange::ThisWeek => "Week",
            StatsRange::ThisMonth => "Month",
            StatsRange::AllTime => "All Time",
        }
    }
}

impl fmt::Display for StatsRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for StatsRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "today" | "day" => Ok(StatsRange::Today),
            "week" | "this_week" => Ok(StatsRange::ThisWeek),
            "month" | "this_month" => Ok(StatsRange::ThisMonth),
            "all" | "all_time" => Ok(StatsRange::AllTime),
            other => Err(format!(
                "unknown range '{other}' (expected today, week, month or all)"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_short_and_long_names() {
        assert_eq!("week".parse::<StatsRange>().unwrap(), StatsRange::ThisWeek);
        assert_eq!("this-month".parse::<StatsRange>().unwrap(), StatsRange::ThisMonth);
        assert_eq!("All_Time".parse::<StatsRange>().unwrap(), StatsRange::AllTime);
        assert!("year".parse::<StatsRange>().is_err());
    }
}
