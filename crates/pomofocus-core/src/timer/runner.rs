//! Async driver for [`TimerEngine`].
//!
//! Owns the 1 Hz tick task and the deferred auto-advance task. All engine
//! access goes through one mutex, so ticks and manual controls coming from
//! different tasks are serialized.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::debug;

use super::engine::{EngineSnapshot, TimerCheckpoint, TimerEngine, TimerState, AUTO_ADVANCE_DELAY_SECS};
use super::mode::TimerSettings;
use crate::events::Event;

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct TimerRunner {
    engine: Arc<Mutex<TimerEngine>>,
    events: broadcast::Sender<Event>,
    ticker: Arc<Mutex<Option<JoinHandle<()>>>>,
    auto_advance: Arc<Mutex<Option<JoinHandle<()>>>>,
    tick_interval: Duration,
}

impl TimerRunner {
    pub fn new(engine: TimerEngine) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            engine: Arc::new(Mutex::new(engine)),
            events,
            ticker: Arc::new(Mutex::new(None)),
            auto_advance: Arc::new(Mutex::new(None)),
            tick_interval: Duration::from_secs(1),
        }
    }

    /// Receive every event the engine produces from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> EngineSnapshot {
        self.engine.lock().await.snapshot()
    }

    pub async fn checkpoint(&self) -> TimerCheckpoint {
        self.engine.lock().await.checkpoint()
    }

    pub async fn apply_settings(&self, settings: TimerSettings) {
        self.engine.lock().await.apply_settings(settings);
    }

    pub async fn start(&self) -> Vec<Event> {
        let events = self.engine.lock().await.start();
        self.publish(&events);
        if !events.is_empty() {
            self.spawn_ticker().await;
        }
        events
    }

    pub async fn pause(&self) -> Vec<Event> {
        let events = self.engine.lock().await.pause();
        if !events.is_empty() {
            self.cancel_ticker().await;
        }
        self.publish(&events);
        events
    }

    pub async fn resume(&self) -> Vec<Event> {
        let events = self.engine.lock().await.resume();
        self.publish(&events);
        if !events.is_empty() {
            self.spawn_ticker().await;
        }
        events
    }

    pub async fn reset(&self) -> Vec<Event> {
        let events = self.engine.lock().await.reset();
        if !events.is_empty() {
            self.cancel_ticker().await;
            self.cancel_auto_advance().await;
        }
        self.publish(&events);
        events
    }

    pub async fn skip(&self) -> Vec<Event> {
        let events = self.engine.lock().await.skip();
        if !events.is_empty() {
            self.cancel_ticker().await;
            self.cancel_auto_advance().await;
        }
        self.publish(&events);
        events
    }

    /// Take over an engine handed in mid-session: restart the tick loop if
    /// it is running, or the pending auto-advance if it already completed.
    pub async fn attach(&self) {
        let state = self.engine.lock().await.state();
        match state {
            TimerState::Running => self.spawn_ticker().await,
            TimerState::Completed => {
                schedule_auto_advance(self.engine.clone(), self.events.clone(), &self.auto_advance).await;
            }
            TimerState::Idle | TimerState::Paused => {}
        }
    }

    /// Stop all background tasks. The engine keeps its state.
    pub async fn shutdown(&self) {
        self.cancel_ticker().await;
        self.cancel_auto_advance().await;
    }

    fn publish(&self, events: &[Event]) {
        publish(&self.events, events);
    }

    async fn spawn_ticker(&self) {
        let mut ticker_guard = self.ticker.lock().await;
        if let Some(handle) = ticker_guard.take() {
            handle.abort();
        }

        let engine = self.engine.clone();
        let events = self.events.clone();
        let auto_advance = self.auto_advance.clone();
        let tick_interval = self.tick_interval;

        let handle = tokio::spawn(async move {
            let mut interval = time::interval(tick_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;

                let (produced, state) = {
                    let mut guard = engine.lock().await;
                    if guard.state() != TimerState::Running {
                        break;
                    }
                    let produced = guard.tick();
                    (produced, guard.state())
                };
                publish(&events, &produced);

                if state == TimerState::Completed {
                    schedule_auto_advance(engine.clone(), events.clone(), &auto_advance).await;
                    break;
                }
            }
        });

        *ticker_guard = Some(handle);
    }

    async fn cancel_ticker(&self) {
        if let Some(handle) = self.ticker.lock().await.take() {
            handle.abort();
        }
    }

    async fn cancel_auto_advance(&self) {
        if let Some(handle) = self.auto_advance.lock().await.take() {
            debug!("pending auto-advance cancelled");
            handle.abort();
        }
    }
}

async fn schedule_auto_advance(
    engine: Arc<Mutex<TimerEngine>>,
    events: broadcast::Sender<Event>,
    slot: &Mutex<Option<JoinHandle<()>>>,
) {
    let mut guard = slot.lock().await;
    if let Some(handle) = guard.take() {
        handle.abort();
    }
    let handle = tokio::spawn(async move {
        time::sleep(Duration::from_secs(AUTO_ADVANCE_DELAY_SECS as u64)).await;
        let produced = engine.lock().await.auto_advance();
        publish(&events, &produced);
    });
    *guard = Some(handle);
}

fn publish(sender: &broadcast::Sender<Event>, events: &[Event]) {
    for event in events {
        // No subscribers is fine; the caller still gets the events back.
        let _ = sender.send(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::clock::Clock;
    use crate::timer::Mode;
    use chrono::{DateTime, TimeZone, Utc};

    /// Clock that follows tokio's (pausable) time.
    struct TokioClock {
        base: DateTime<Utc>,
        origin: time::Instant,
    }

    impl Clock for TokioClock {
        fn now(&self) -> DateTime<Utc> {
            let elapsed = time::Instant::now() - self.origin;
            self.base + chrono::Duration::from_std(elapsed).unwrap_or_default()
        }
    }

    fn engine() -> TimerEngine {
        let clock = Arc::new(TokioClock {
            base: Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap(),
            origin: time::Instant::now(),
        });
        let settings = TimerSettings::new(1, 1, 1, 2).unwrap();
        TimerEngine::new(settings, clock)
    }

    fn runner() -> TimerRunner {
        TimerRunner::new(engine())
    }

    #[tokio::test(start_paused = true)]
    async fn runs_session_to_completion_and_advances() {
        let runner = runner();
        let mut rx = runner.subscribe();
        runner.start().await;

        let mut completed = 0;
        loop {
            match rx.recv().await.unwrap() {
                Event::SessionCompleted(outcome) => {
                    completed += 1;
                    assert_eq!(outcome.elapsed_secs(), 60);
                }
                Event::ModeChanged { mode, .. } => {
                    assert_eq!(mode, Mode::ShortBreak);
                    break;
                }
                _ => {}
            }
        }
        assert_eq!(completed, 1);
        let snap = runner.snapshot().await;
        assert_eq!(snap.state, TimerState::Idle);
        assert_eq!(snap.mode, Mode::ShortBreak);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_stops_the_countdown() {
        let runner = runner();
        runner.start().await;
        time::sleep(Duration::from_millis(10_500)).await;
        runner.pause().await;
        let paused_at = runner.snapshot().await.remaining_secs;

        time::sleep(Duration::from_secs(120)).await;
        let snap = runner.snapshot().await;
        assert_eq!(snap.state, TimerState::Paused);
        assert_eq!(snap.remaining_secs, paused_at);
        assert_eq!(paused_at, 50);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_during_grace_cancels_auto_advance() {
        let runner = runner();
        let mut rx = runner.subscribe();
        runner.start().await;
        loop {
            if let Event::SessionCompleted(_) = rx.recv().await.unwrap() {
                break;
            }
        }
        runner.reset().await;
        time::sleep(Duration::from_secs(10)).await;

        let snap = runner.snapshot().await;
        assert_eq!(snap.state, TimerState::Idle);
        assert_eq!(snap.mode, Mode::Focus);
        runner.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn attach_drives_a_running_engine() {
        let mut engine = engine();
        engine.start();
        let runner = TimerRunner::new(engine);
        let mut rx = runner.subscribe();
        runner.attach().await;

        loop {
            if let Event::ModeChanged { mode, .. } = rx.recv().await.unwrap() {
                assert_eq!(mode, Mode::ShortBreak);
                break;
            }
        }
        assert_eq!(runner.snapshot().await.state, TimerState::Idle);
    }
}
