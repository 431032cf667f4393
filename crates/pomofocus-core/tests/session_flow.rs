//! End-to-end flow: engine events -> recorder -> SQLite -> statistics.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use pomofocus_core::timer::{ManualClock, TimerCheckpoint};
use pomofocus_core::{
    Database, Event, Mode, SessionFilter, SessionRecorder, SessionStore, SortOrder, StatisticsAggregator,
    StatsRange, TimerEngine, TimerSettings, TimerState,
};

fn morning() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 18, 9, 0, 0).unwrap()
}

/// Tick once per simulated second until the engine leaves Running.
fn tick_until_done(engine: &mut TimerEngine, clock: &ManualClock) -> Vec<Event> {
    let mut events = Vec::new();
    while engine.state() == TimerState::Running {
        clock.advance_secs(1);
        events.extend(engine.tick());
    }
    events
}

#[test]
fn completed_and_skipped_sessions_reach_statistics() {
    let db = Database::open_memory().unwrap();
    let clock = Arc::new(ManualClock::new(morning()));
    let mut engine = TimerEngine::new(TimerSettings::default(), clock.clone());
    let recorder = SessionRecorder::new(&db, clock.clone());

    assert_eq!(engine.start().len(), 1);
    let events = tick_until_done(&mut engine, &clock);
    let completions = events
        .iter()
        .filter(|e| matches!(e, Event::SessionCompleted(_)))
        .count();
    assert_eq!(completions, 1);
    assert_eq!(recorder.handle_all(&events).unwrap().len(), 1);

    clock.advance_secs(3);
    let advanced = engine.tick();
    assert!(matches!(advanced.as_slice(), [Event::ModeChanged { mode: Mode::ShortBreak, .. }]));

    engine.start();
    clock.advance_secs(120);
    let skipped = engine.skip();
    let records = recorder.handle_all(&skipped).unwrap();
    assert_eq!(records.len(), 1);
    assert!(!records[0].completed);
    assert_eq!(records[0].elapsed_secs, 120);
    assert_eq!(engine.mode(), Mode::Focus);
    assert_eq!(engine.state(), TimerState::Idle);

    let stored = db.query(&SessionFilter::all(), SortOrder::Ascending).unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].mode, Mode::Focus);
    assert_eq!(stored[0].elapsed_secs, 1500);
    assert_eq!(stored[0].started_at, morning());
    assert!(stored[0].completed);

    let stats = StatisticsAggregator::with_timezone(&db, clock.clone(), Utc);
    let today = stats.totals_for_range(StatsRange::Today).unwrap();
    assert_eq!(today.total_secs, 1500);
    assert_eq!(today.session_count, 1);
    let chart = stats.chart_data(StatsRange::Today).unwrap();
    assert_eq!(chart[9].value, 25.0);
    assert_eq!(stats.streaks().unwrap().current, 1);
}

#[test]
fn reset_leaves_no_record() {
    let db = Database::open_memory().unwrap();
    let clock = Arc::new(ManualClock::new(morning()));
    let mut engine = TimerEngine::new(TimerSettings::default(), clock.clone());
    let recorder = SessionRecorder::new(&db, clock.clone());

    let mut events = engine.start();
    clock.advance_secs(600);
    events.extend(engine.pause());
    events.extend(engine.reset());
    assert!(recorder.handle_all(&events).unwrap().is_empty());
    assert!(db.query(&SessionFilter::all(), SortOrder::Ascending).unwrap().is_empty());
    assert_eq!(engine.mode(), Mode::Focus);
}

#[test]
fn on_disk_database_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pomofocus.db");
    let clock = Arc::new(ManualClock::new(morning()));

    let recorded = {
        let db = Database::open_at(&path).unwrap();
        let mut engine = TimerEngine::new(TimerSettings::default(), clock.clone());
        engine.start();
        clock.advance_secs(300);
        let events = engine.pause();

        let checkpoint = serde_json::to_string(&engine.checkpoint()).unwrap();
        db.kv_set("timer_state", &checkpoint).unwrap();

        let mut restored_events = events;
        restored_events.extend(engine.skip());
        SessionRecorder::new(&db, clock.clone())
            .handle_all(&restored_events)
            .unwrap()
    };
    assert_eq!(recorded.len(), 1);

    let db = Database::open_at(&path).unwrap();
    let stored = db.query(&SessionFilter::all(), SortOrder::Ascending).unwrap();
    assert_eq!(stored, recorded);

    let raw = db.kv_get("timer_state").unwrap().unwrap();
    let checkpoint: TimerCheckpoint = serde_json::from_str(&raw).unwrap();
    let engine = TimerEngine::restore(checkpoint, TimerSettings::default(), clock.clone());
    assert_eq!(engine.state(), TimerState::Paused);
    assert_eq!(engine.remaining_secs(), 1200);
}
