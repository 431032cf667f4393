use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Local, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::calendar::{local_date, month_start, start_of_day, week_start};
use super::chart::{self, ChartBucket};
use super::range::StatsRange;
use super::streaks::Streaks;
use crate::error::DatabaseError;
use crate::storage::{SessionFilter, SessionRecord, SessionStore, SortOrder};
use crate::timer::{Clock, Mode};

/// Days shown by the week chart, ending today.
const WEEK_CHART_DAYS: u32 = 7;

/// Completed time within a range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeTotals {
    pub total_secs: u64,
    pub session_count: u64,
}

impl RangeTotals {
    fn from_records(records: &[SessionRecord]) -> Self {
        Self {
            total_secs: records.iter().map(|r| r.elapsed_secs).sum(),
            session_count: records.len() as u64,
        }
    }
}

/// The statistics screen at a glance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overview {
    pub today: RangeTotals,
    pub this_week: RangeTotals,
    pub all_time: RangeTotals,
    pub streaks: Streaks,
}

/// Read-only statistics over a [`SessionStore`].
///
/// Calendar boundaries follow `tz`, which defaults to the system's local zone.
pub struct StatisticsAggregator<S, Tz: TimeZone = Local> {
    store: S,
    clock: Arc<dyn Clock>,
    tz: Tz,
    cache: Mutex<HashMap<StatsRange, RangeTotals>>,
}

impl<S: SessionStore> StatisticsAggregator<S, Local> {
    pub fn new(store: S, clock: Arc<dyn Clock>) -> Self {
        Self::with_timezone(store, clock, Local)
    }
}

impl<S: SessionStore, Tz: TimeZone> StatisticsAggregator<S, Tz> {
    pub fn with_timezone(store: S, clock: Arc<dyn Clock>, tz: Tz) -> Self {
        Self {
            store,
            clock,
            tz,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn today(&self) -> (DateTime<Utc>, NaiveDate) {
        let now = self.clock.now();
        (now, local_date(&self.tz, &now))
    }

    /// Lower bound of `range`, or `None` for all time.
    fn range_start(&self, range: StatsRange, today: NaiveDate) -> Option<DateTime<Utc>> {
        let first_day = match range {
            StatsRange::Today => today,
            StatsRange::ThisWeek => week_start(today),
            StatsRange::ThisMonth => month_start(today),
            StatsRange::AllTime => return None,
        };
        Some(start_of_day(&self.tz, first_day))
    }

    fn completed_between(
        &self,
        from: Option<DateTime<Utc>>,
        until: DateTime<Utc>,
        order: SortOrder,
    ) -> Result<Vec<SessionRecord>, DatabaseError> {
        let mut filter = SessionFilter::all().completed(true).started_until(until);
        if let Some(from) = from {
            filter = filter.started_from(from);
        }
        self.store.query(&filter, order)
    }

    fn lock_cache(&self) -> MutexGuard<'_, HashMap<StatsRange, RangeTotals>> {
        match self.cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Total completed time and session count for `range`.
    ///
    /// # Errors
    /// Returns the store's [`DatabaseError`]; the cached value for `range`
    /// is dropped so stale totals are never served.
    pub fn totals_for_range(&self, range: StatsRange) -> Result<RangeTotals, DatabaseError> {
        let (now, today) = self.today();
        match self.completed_between(self.range_start(range, today), now, SortOrder::Ascending) {
            Ok(records) => {
                let totals = RangeTotals::from_records(&records);
                self.lock_cache().insert(range, totals);
                debug!(%range, total_secs = totals.total_secs, count = totals.session_count, "totals computed");
                Ok(totals)
            }
            Err(e) => {
                self.lock_cache().remove(&range);
                warn!(%range, "totals query failed: {e}");
                Err(e)
            }
        }
    }

    /// Result of the last successful [`totals_for_range`](Self::totals_for_range).
    pub fn cached_totals(&self, range: StatsRange) -> Option<RangeTotals> {
        self.lock_cache().get(&range).copied()
    }

    /// Current and longest day streaks of completed focus sessions.
    ///
    /// # Errors
    /// Returns the store's [`DatabaseError`].
    pub fn streaks(&self) -> Result<Streaks, DatabaseError> {
        let filter = SessionFilter::all().completed(true).mode(Mode::Focus);
        let days: BTreeSet<NaiveDate> = self
            .store
            .query(&filter, SortOrder::Ascending)?
            .iter()
            .map(|r| local_date(&self.tz, &r.started_at))
            .collect();
        Ok(Streaks::from_days(&days))
    }

    /// Minutes of completed time per bucket for `range`.
    ///
    /// # Errors
    /// Returns the store's [`DatabaseError`].
    pub fn chart_data(&self, range: StatsRange) -> Result<Vec<ChartBucket>, DatabaseError> {
        let (now, today) = self.today();
        let buckets = match range {
            StatsRange::Today => {
                let records = self.completed_between(self.range_start(range, today), now, SortOrder::Ascending)?;
                chart::hourly(&self.tz, today, &records)
            }
            StatsRange::ThisWeek => {
                let first = today - Duration::days(i64::from(WEEK_CHART_DAYS - 1));
                let records =
                    self.completed_between(Some(start_of_day(&self.tz, first)), now, SortOrder::Ascending)?;
                chart::daily(&self.tz, first, WEEK_CHART_DAYS, &records)
            }
            StatsRange::ThisMonth => {
                let records = self.completed_between(self.range_start(range, today), now, SortOrder::Ascending)?;
                chart::weekly_in_month(&self.tz, today, &records)
            }
            StatsRange::AllTime => {
                let records = self.completed_between(None, now, SortOrder::Ascending)?;
                chart::monthly(&self.tz, &records)
            }
        };
        Ok(buckets)
    }

    /// Completed sessions in `range`, newest first.
    ///
    /// # Errors
    /// Returns the store's [`DatabaseError`].
    pub fn recent_sessions(&self, range: StatsRange) -> Result<Vec<SessionRecord>, DatabaseError> {
        let (now, today) = self.today();
        self.completed_between(self.range_start(range, today), now, SortOrder::Descending)
    }

    /// Today, this week and all-time totals plus streaks.
    ///
    /// # Errors
    /// Returns the first [`DatabaseError`] encountered.
    pub fn overview(&self) -> Result<Overview, DatabaseError> {
        Ok(Overview {
            today: self.totals_for_range(StatsRange::Today)?,
            this_week: self.totals_for_range(StatsRange::ThisWeek)?,
            all_time: self.totals_for_range(StatsRange::AllTime)?,
            streaks: self.streaks()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::timer::ManualClock;
    use chrono::FixedOffset;
    use std::sync::atomic::{AtomicBool, Ordering};
    use uuid::Uuid;

    /// Wednesday.
    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 18, 14, 30, 0).unwrap()
    }

    fn record(mode: Mode, completed: bool, started_at: DateTime<Utc>, elapsed_secs: u64) -> SessionRecord {
        let ended_at = started_at + Duration::seconds(elapsed_secs as i64);
        SessionRecord {
            id: Uuid::new_v4(),
            mode,
            started_at,
            ended_at,
            elapsed_secs,
            completed,
            created_at: ended_at,
        }
    }

    fn at(month: u32, day: u32, hour: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, month, day, hour, min, 0).unwrap()
    }

    fn seeded_store() -> MemoryStore {
        let store = MemoryStore::new();
        for r in [
            record(Mode::Focus, true, at(3, 18, 9, 0), 1500),
            record(Mode::ShortBreak, true, at(3, 18, 9, 30), 300),
            record(Mode::Focus, false, at(3, 18, 10, 0), 600),
            record(Mode::Focus, true, at(3, 16, 11, 0), 1500),
            record(Mode::Focus, true, at(3, 2, 8, 0), 1500),
            record(Mode::Focus, true, at(2, 20, 8, 0), 1500),
        ] {
            store.insert(&r).unwrap();
        }
        store
    }

    fn aggregator<S: SessionStore>(store: S) -> StatisticsAggregator<S, Utc> {
        StatisticsAggregator::with_timezone(store, Arc::new(ManualClock::new(now())), Utc)
    }

    #[test]
    fn totals_count_completed_sessions_per_range() {
        let stats = aggregator(seeded_store());
        let expect = |total_secs, session_count| RangeTotals {
            total_secs,
            session_count,
        };
        assert_eq!(stats.totals_for_range(StatsRange::Today).unwrap(), expect(1800, 2));
        assert_eq!(stats.totals_for_range(StatsRange::ThisWeek).unwrap(), expect(3300, 3));
        assert_eq!(stats.totals_for_range(StatsRange::ThisMonth).unwrap(), expect(4800, 4));
        assert_eq!(stats.totals_for_range(StatsRange::AllTime).unwrap(), expect(6300, 5));
    }

    #[test]
    fn today_follows_the_local_calendar() {
        let store = MemoryStore::new();
        store
            .insert(&record(Mode::Focus, true, at(3, 17, 23, 30), 1500))
            .unwrap();
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let local = StatisticsAggregator::with_timezone(&store, Arc::new(ManualClock::new(now())), plus_two);
        assert_eq!(local.totals_for_range(StatsRange::Today).unwrap().session_count, 1);
        assert_eq!(aggregator(&store).totals_for_range(StatsRange::Today).unwrap().session_count, 0);
    }

    #[test]
    fn streaks_use_completed_focus_only() {
        let store = MemoryStore::new();
        store.insert(&record(Mode::Focus, true, at(3, 18, 9, 0), 1500)).unwrap();
        store.insert(&record(Mode::Focus, true, at(3, 17, 9, 0), 1500)).unwrap();
        store.insert(&record(Mode::ShortBreak, true, at(3, 16, 9, 0), 300)).unwrap();
        store.insert(&record(Mode::Focus, false, at(3, 15, 9, 0), 600)).unwrap();
        let streaks = aggregator(store).streaks().unwrap();
        assert_eq!(streaks, Streaks { current: 2, longest: 2 });
    }

    #[test]
    fn week_chart_has_seven_ascending_days() {
        let buckets = aggregator(seeded_store()).chart_data(StatsRange::ThisWeek).unwrap();
        let labels: Vec<&str> = buckets.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, ["Thu", "Fri", "Sat", "Sun", "Mon", "Tue", "Wed"]);
        assert!(buckets.windows(2).all(|w| w[0].bucket_start < w[1].bucket_start));
        assert_eq!(buckets[4].value, 25.0);
        assert_eq!(buckets[6].value, 30.0);
        assert_eq!(buckets[0].value, 0.0);
    }

    #[test]
    fn week_chart_without_data_is_all_zero() {
        let buckets = aggregator(MemoryStore::new()).chart_data(StatsRange::ThisWeek).unwrap();
        assert_eq!(buckets.len(), 7);
        assert!(buckets.iter().all(|b| b.value == 0.0));
        assert_eq!(buckets[6].bucket_start, at(3, 18, 0, 0));
    }

    #[test]
    fn today_chart_has_hourly_buckets() {
        let buckets = aggregator(seeded_store()).chart_data(StatsRange::Today).unwrap();
        assert_eq!(buckets.len(), 24);
        assert_eq!(buckets[0].label, "0:00");
        assert_eq!(buckets[23].label, "23:00");
        assert_eq!(buckets[9].value, 30.0);
        assert_eq!(buckets[9].bucket_start, at(3, 18, 9, 0));
        assert_eq!(buckets.iter().map(|b| b.value).sum::<f64>(), 30.0);
    }

    #[test]
    fn month_chart_has_five_weeks() {
        let buckets = aggregator(seeded_store()).chart_data(StatsRange::ThisMonth).unwrap();
        let labels: Vec<&str> = buckets.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, ["Week 1", "Week 2", "Week 3", "Week 4", "Week 5"]);
        assert_eq!(buckets[0].value, 25.0);
        assert_eq!(buckets[2].value, 55.0);
        assert_eq!(buckets[4].bucket_start, at(3, 29, 0, 0));
    }

    #[test]
    fn all_time_chart_has_one_bucket_per_month() {
        let buckets = aggregator(seeded_store()).chart_data(StatsRange::AllTime).unwrap();
        let labels: Vec<&str> = buckets.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, ["Feb", "Mar"]);
        assert_eq!(buckets[0].value, 25.0);
        assert_eq!(buckets[1].value, 80.0);
        assert!(aggregator(MemoryStore::new()).chart_data(StatsRange::AllTime).unwrap().is_empty());
    }

    #[test]
    fn chart_minutes_truncate_per_record() {
        let store = MemoryStore::new();
        store.insert(&record(Mode::Focus, true, at(3, 18, 8, 0), 119)).unwrap();
        store.insert(&record(Mode::Focus, true, at(3, 18, 8, 10), 119)).unwrap();
        let buckets = aggregator(store).chart_data(StatsRange::Today).unwrap();
        assert_eq!(buckets[8].value, 2.0);
    }

    #[test]
    fn recent_sessions_are_newest_first() {
        let recent = aggregator(seeded_store()).recent_sessions(StatsRange::Today).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].mode, Mode::ShortBreak);
        assert!(recent.iter().all(|r| r.completed));
    }

    #[test]
    fn overview_combines_totals_and_streaks() {
        let overview = aggregator(seeded_store()).overview().unwrap();
        assert_eq!(overview.today.session_count, 2);
        assert_eq!(overview.this_week.total_secs, 3300);
        assert_eq!(overview.all_time.session_count, 5);
        assert_eq!(overview.streaks, Streaks { current: 1, longest: 1 });
    }

    struct FlakyStore {
        inner: MemoryStore,
        failing: AtomicBool,
    }

    impl SessionStore for FlakyStore {
        fn insert(&self, record: &SessionRecord) -> Result<(), DatabaseError> {
            self.inner.insert(record)
        }

        fn query(&self, filter: &SessionFilter, order: SortOrder) -> Result<Vec<SessionRecord>, DatabaseError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(DatabaseError::QueryFailed("disk I/O error".into()));
            }
            self.inner.query(filter, order)
        }
    }

    #[test]
    fn failed_query_drops_cached_totals() {
        let stats = aggregator(FlakyStore {
            inner: seeded_store(),
            failing: AtomicBool::new(false),
        });
        assert!(stats.cached_totals(StatsRange::Today).is_none());
        let totals = stats.totals_for_range(StatsRange::Today).unwrap();
        assert_eq!(stats.cached_totals(StatsRange::Today), Some(totals));

        stats.store().failing.store(true, Ordering::SeqCst);
        assert!(stats.totals_for_range(StatsRange::Today).is_err());
        assert!(stats.cached_totals(StatsRange::Today).is_none());
        assert!(stats.chart_data(StatsRange::ThisWeek).is_err());
    }
}
