//! Local-calendar boundaries, resolved to UTC instants for store queries.

use chrono::{
    DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, Offset,
    TimeZone, Utc,
};

/// The UTC instant of a local wall-clock time.
///
/// Ambiguous times take the earlier instant. Times skipped by a DST jump
/// are shifted by the offset in force at that moment.
pub(crate) fn local_instant<Tz: TimeZone>(tz: &Tz, local: NaiveDateTime) -> DateTime<Utc> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
        LocalResult::None => {
            let offset = tz.offset_from_utc_datetime(&local).fix();
            let utc = local - Duration::seconds(i64::from(offset.local_minus_utc()));
            Utc.from_utc_datetime(&utc)
        }
    }
}

pub(crate) fn start_of_day<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    local_instant(tz, date.and_time(NaiveTime::MIN))
}

pub(crate) fn local_date<Tz: TimeZone>(tz: &Tz, at: &DateTime<Utc>) -> NaiveDate {
    at.with_timezone(tz).date_naive()
}

/// Monday of the ISO week containing `date`.
pub(crate) fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

pub(crate) fn month_start(date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(date)
}

/// Week-of-month bucket for a day of month; days 29-31 fold into the fifth.
pub(crate) fn month_bucket_index(day_of_month: u32) -> usize {
    (day_of_month.saturating_sub(1) / 7).min(4) as usize
}
