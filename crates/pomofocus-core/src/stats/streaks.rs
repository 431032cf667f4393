use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Consecutive-day runs of completed focus sessions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Streaks {
    /// Run ending at the most recent active day, which need not be today.
    pub current: u32,
    pub longest: u32,
}

impl Streaks {
    /// Compute streaks from the set of local days that had activity.
    pub fn from_days(days: &BTreeSet<NaiveDate>) -> Self {
        let mut longest = 0;
        let mut run = 0;
        let mut previous: Option<NaiveDate> = None;

        for &day in days {
            run = match previous {
                Some(prev) if prev.succ_opt() == Some(day) => run + 1,
                _ => 1,
            };
            longest = longest.max(run);
            previous = Some(day);
        }

        // Ascending iteration leaves `run` at the streak ending on the last day.
        Self { current: run, longest }
    }
}
