//! Chart series: fully populated buckets overlaid with per-record minutes.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

use super::calendar::{local_date, local_instant, month_bucket_index, month_start, start_of_day};
use crate::storage::SessionRecord;

/// One bar of a chart. `value` is whole minutes of recorded time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartBucket {
    pub label: String,
    pub value: f64,
    pub bucket_start: DateTime<Utc>,
}

impl ChartBucket {
    fn empty(label: String, bucket_start: DateTime<Utc>) -> Self {
        Self {
            label,
            value: 0.0,
            bucket_start,
        }
    }
}

fn minutes(record: &SessionRecord) -> f64 {
    record.elapsed_minutes() as f64
}

/// 24 hourly buckets for `day`, labelled `H:00`.
pub(crate) fn hourly<Tz: TimeZone>(tz: &Tz, day: NaiveDate, records: &[SessionRecord]) -> Vec<ChartBucket> {
    let midnight = day.and_time(NaiveTime::MIN);
    let mut buckets: Vec<ChartBucket> = (0..24)
        .map(|h| ChartBucket::empty(format!("{h}:00"), local_instant(tz, midnight + Duration::hours(h))))
        .collect();

    for record in records {
        let local = record.started_at.with_timezone(tz);
        if local.date_naive() != day {
            continue;
        }
        if let Some(bucket) = buckets.get_mut(local.hour() as usize) {
            bucket.value += minutes(record);
        }
    }
    buckets
}

/// One bucket per day starting at `first`, labelled with the short weekday.
pub(crate) fn daily<Tz: TimeZone>(
    tz: &Tz,
    first: NaiveDate,
    days: u32,
    records: &[SessionRecord],
) -> Vec<ChartBucket> {
    let mut buckets: Vec<ChartBucket> = (0..days)
        .map(|i| {
            let date = first + Duration::days(i64::from(i));
            ChartBucket::empty(date.format("%a").to_string(), start_of_day(tz, date))
        })
        .collect();

    for record in records {
        let offset = (local_date(tz, &record.started_at) - first).num_days();
        if let Some(bucket) = usize::try_from(offset).ok().and_then(|i| buckets.get_mut(i)) {
            bucket.value += minutes(record);
        }
    }
    buckets
}

/// Five week-of-month buckets for the month containing `day`.
pub(crate) fn weekly_in_month<Tz: TimeZone>(tz: &Tz, day: NaiveDate, records: &[SessionRecord]) -> Vec<ChartBucket> {
    let first = month_start(day);
    let mut buckets: Vec<ChartBucket> = (0..5)
        .map(|i| {
            let start = first + Duration::days(7 * i);
            ChartBucket::empty(format!("Week {}", i + 1), start_of_day(tz, start))
        })
        .collect();

    for record in records {
        let date = local_date(tz, &record.started_at);
        if date.year() != first.year() || date.month() != first.month() {
            continue;
        }
        buckets[month_bucket_index(date.day())].value += minutes(record);
    }
    buckets
}

/// One bucket per calendar month that has records, oldest first.
pub(crate) fn monthly<Tz: TimeZone>(tz: &Tz, records: &[SessionRecord]) -> Vec<ChartBucket> {
    let mut months: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for record in records {
        let month = month_start(local_date(tz, &record.started_at));
        *months.entry(month).or_default() += minutes(record);
    }

    months
        .into_iter()
        .map(|(month, value)| ChartBucket {
            label: month.format("%b").to_string(),
            value,
            bucket_start: start_of_day(tz, month),
        })
        .collect()
}
