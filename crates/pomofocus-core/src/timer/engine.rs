//! Timer engine implementation.
//!
//! The timer engine is a clock-driven state machine. It does not own a
//! thread - the caller (or [`super::TimerRunner`]) is responsible for calling
//! `tick()` about once per second.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running <-> Paused
//! Running -> Completed -> (3s grace) -> Idle [next mode]
//! Running | Paused | Completed -> skip  -> Idle [next mode]
//! Running | Paused | Completed -> reset -> Idle [same mode]
//! ```
//!
//! Remaining time is re-derived from the clock on every tick instead of being
//! decremented, so a process that was suspended for a while catches up on
//! the next tick rather than silently losing the gap.
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = TimerEngine::new(TimerSettings::default(), Arc::new(SystemClock));
//! engine.start();
//! // In a loop:
//! for event in engine.tick() { recorder.handle(&event)?; }
//! ```

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::clock::Clock;
use super::mode::{Mode, TimerSettings};
use crate::events::{Event, SessionOutcome};

/// Grace period between a natural completion and the switch to the next mode.
pub const AUTO_ADVANCE_DELAY_SECS: i64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    Idle,
    Running,
    Paused,
    Completed,
}

/// Serializable engine state.
///
/// While running, `remaining_secs` holds the value at `running_since`; the
/// live value is derived from the clock.
///
/// Deserialization rejects combinations the engine can never produce, such
/// as a running session without `running_since`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawCheckpoint")]
pub struct TimerCheckpoint {
    mode: Mode,
    state: TimerState,
    total_secs: u64,
    remaining_secs: u64,
    focus_cycle_count: u32,
    session_started_at: Option<DateTime<Utc>>,
    running_since: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct RawCheckpoint {
    mode: Mode,
    state: TimerState,
    total_secs: u64,
    remaining_secs: u64,
    focus_cycle_count: u32,
    #[serde(default)]
    session_started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    running_since: Option<DateTime<Utc>>,
    #[serde(default)]
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<RawCheckpoint> for TimerCheckpoint {
    type Error = String;

    fn try_from(raw: RawCheckpoint) -> Result<Self, Self::Error> {
        if raw.total_secs == 0 {
            return Err("total_secs must be positive".into());
        }
        if raw.remaining_secs > raw.total_secs {
            return Err(format!(
                "remaining_secs {} exceeds total_secs {}",
                raw.remaining_secs, raw.total_secs
            ));
        }
        let consistent = match raw.state {
            TimerState::Idle => true,
            TimerState::Running => raw.session_started_at.is_some() && raw.running_since.is_some(),
            TimerState::Paused => raw.session_started_at.is_some(),
            TimerState::Completed => raw.completed_at.is_some() && raw.remaining_secs == 0,
        };
        if !consistent {
            return Err(format!("incomplete {:?} checkpoint", raw.state));
        }
        Ok(Self {
            mode: raw.mode,
            state: raw.state,
            total_secs: raw.total_secs,
            remaining_secs: raw.remaining_secs,
            focus_cycle_count: raw.focus_cycle_count,
            session_started_at: raw.session_started_at,
            running_since: raw.running_since,
            completed_at: raw.completed_at,
        })
    }
}

impl TimerCheckpoint {
    fn idle(mode: Mode, focus_cycle_count: u32, settings: &TimerSettings) -> Self {
        let total_secs = settings.duration_secs(mode);
        Self {
            mode,
            state: TimerState::Idle,
            total_secs,
            remaining_secs: total_secs,
            focus_cycle_count,
            session_started_at: None,
            running_since: None,
            completed_at: None,
        }
    }
}

/// Point-in-time view of the engine, ready for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub mode: Mode,
    pub state: TimerState,
    pub remaining_secs: u64,
    pub total_secs: u64,
    pub sessions_completed_in_cycle: u32,
    pub progress: f64,
    pub formatted: String,
    pub at: DateTime<Utc>,
}

/// Core timer engine.
pub struct TimerEngine {
    settings: TimerSettings,
    clock: Arc<dyn Clock>,
    inner: TimerCheckpoint,
}

impl fmt::Debug for TimerEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerEngine")
            .field("settings", &self.settings)
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

impl TimerEngine {
    /// Create an idle engine in Focus mode.
    pub fn new(settings: TimerSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: TimerCheckpoint::idle(Mode::Focus, 0, &settings),
            settings,
            clock,
        }
    }

    /// Rebuild an engine from a checkpoint taken by [`TimerEngine::checkpoint`].
    ///
    /// An idle checkpoint picks up the current settings' duration; a session
    /// in progress keeps the total it was started with.
    pub fn restore(checkpoint: TimerCheckpoint, settings: TimerSettings, clock: Arc<dyn Clock>) -> Self {
        let mut engine = Self {
            settings,
            clock,
            inner: checkpoint,
        };
        if engine.inner.state == TimerState::Idle {
            engine.inner = TimerCheckpoint::idle(engine.inner.mode, engine.inner.focus_cycle_count, &settings);
        }
        engine
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn checkpoint(&self) -> TimerCheckpoint {
        self.inner.clone()
    }

    pub fn settings(&self) -> &TimerSettings {
        &self.settings
    }

    pub fn state(&self) -> TimerState {
        self.inner.state
    }

    pub fn mode(&self) -> Mode {
        self.inner.mode
    }

    pub fn total_secs(&self) -> u64 {
        self.inner.total_secs
    }

    pub fn remaining_secs(&self) -> u64 {
        self.live_remaining(self.clock.now())
    }

    pub fn sessions_completed_in_cycle(&self) -> u32 {
        self.inner.focus_cycle_count
    }

    pub fn session_started_at(&self) -> Option<DateTime<Utc>> {
        self.inner.session_started_at
    }

    /// When the pending auto-advance becomes due, if the engine is Completed.
    pub fn auto_advance_due_at(&self) -> Option<DateTime<Utc>> {
        match self.inner.state {
            TimerState::Completed => self
                .inner
                .completed_at
                .map(|at| at + Duration::seconds(AUTO_ADVANCE_DELAY_SECS)),
            _ => None,
        }
    }

    /// 0.0 .. 1.0 progress within the current session.
    pub fn progress(&self) -> f64 {
        progress(self.remaining_secs(), self.inner.total_secs)
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        let at = self.clock.now();
        let remaining_secs = self.live_remaining(at);
        EngineSnapshot {
            mode: self.inner.mode,
            state: self.inner.state,
            remaining_secs,
            total_secs: self.inner.total_secs,
            sessions_completed_in_cycle: self.inner.focus_cycle_count,
            progress: progress(remaining_secs, self.inner.total_secs),
            formatted: format_clock(remaining_secs),
            at,
        }
    }

    // ── Commands ─────────────────────────────────────────────────────
    //
    // Each command returns the events it produced. An empty vector means the
    // command was not valid from the current state and nothing changed.

    pub fn start(&mut self) -> Vec<Event> {
        if self.inner.state != TimerState::Idle {
            debug!(state = ?self.inner.state, "start ignored");
            return Vec::new();
        }
        let now = self.clock.now();
        let total_secs = self.settings.duration_secs(self.inner.mode);
        self.inner.total_secs = total_secs;
        self.inner.remaining_secs = total_secs;
        self.inner.session_started_at = Some(now);
        self.inner.running_since = Some(now);
        self.inner.state = TimerState::Running;
        debug!(mode = %self.inner.mode, total_secs, "session started");
        vec![Event::TimerStarted {
            mode: self.inner.mode,
            duration_secs: total_secs,
            at: now,
        }]
    }

    pub fn pause(&mut self) -> Vec<Event> {
        if self.inner.state != TimerState::Running {
            debug!(state = ?self.inner.state, "pause ignored");
            return Vec::new();
        }
        let now = self.clock.now();
        self.inner.remaining_secs = self.live_remaining(now);
        self.inner.running_since = None;
        self.inner.state = TimerState::Paused;
        vec![Event::TimerPaused {
            remaining_secs: self.inner.remaining_secs,
            at: now,
        }]
    }

    pub fn resume(&mut self) -> Vec<Event> {
        if self.inner.state != TimerState::Paused {
            debug!(state = ?self.inner.state, "resume ignored");
            return Vec::new();
        }
        let now = self.clock.now();
        self.inner.running_since = Some(now);
        self.inner.state = TimerState::Running;
        vec![Event::TimerResumed {
            remaining_secs: self.inner.remaining_secs,
            at: now,
        }]
    }

    /// Discard the current session without recording it.
    pub fn reset(&mut self) -> Vec<Event> {
        if self.inner.state == TimerState::Idle {
            debug!("reset ignored while idle");
            return Vec::new();
        }
        let now = self.clock.now();
        self.inner = TimerCheckpoint::idle(self.inner.mode, self.inner.focus_cycle_count, &self.settings);
        vec![Event::TimerReset {
            mode: self.inner.mode,
            at: now,
        }]
    }

    /// End the current session early and move on to the next mode.
    ///
    /// From Completed the session has already been recorded, so only the
    /// mode advance happens.
    pub fn skip(&mut self) -> Vec<Event> {
        let now = self.clock.now();
        // A countdown that already reached zero completes rather than skips.
        let mut events = if self.inner.state == TimerState::Running && self.live_remaining(now) == 0 {
            self.tick()
        } else {
            Vec::with_capacity(2)
        };
        match self.inner.state {
            TimerState::Idle => {
                debug!("skip ignored while idle");
                return events;
            }
            TimerState::Running | TimerState::Paused => {
                let outcome = self.outcome(self.live_remaining(now), now);
                info!(
                    mode = %outcome.mode,
                    elapsed_secs = outcome.elapsed_secs(),
                    "session skipped"
                );
                events.push(Event::SessionSkipped(outcome));
            }
            TimerState::Completed => {}
        }
        events.push(self.advance(now));
        events
    }

    /// Advance the countdown. Call about once per second.
    pub fn tick(&mut self) -> Vec<Event> {
        let now = self.clock.now();
        match self.inner.state {
            TimerState::Running => {
                let remaining_secs = self.live_remaining(now);
                let mut events = vec![Event::Tick {
                    remaining_secs,
                    at: now,
                }];
                if remaining_secs == 0 {
                    events.push(self.complete(now));
                }
                events
            }
            TimerState::Completed => match self.auto_advance_due_at() {
                Some(due) if now >= due => self.auto_advance(),
                _ => Vec::new(),
            },
            TimerState::Idle | TimerState::Paused => Vec::new(),
        }
    }

    /// Apply the pending post-completion switch to the next mode.
    pub fn auto_advance(&mut self) -> Vec<Event> {
        if self.inner.state != TimerState::Completed {
            debug!(state = ?self.inner.state, "auto-advance superseded");
            return Vec::new();
        }
        let now = self.clock.now();
        vec![self.advance(now)]
    }

    /// Swap in new durations. They apply from the next session start; an
    /// idle engine shows the new duration right away.
    pub fn apply_settings(&mut self, settings: TimerSettings) {
        self.settings = settings;
        if self.inner.state == TimerState::Idle {
            self.inner = TimerCheckpoint::idle(self.inner.mode, self.inner.focus_cycle_count, &self.settings);
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn live_remaining(&self, now: DateTime<Utc>) -> u64 {
        match (self.inner.state, self.inner.running_since) {
            (TimerState::Running, Some(since)) => {
                let elapsed = (now - since).num_seconds().max(0) as u64;
                self.inner.remaining_secs.saturating_sub(elapsed)
            }
            _ => self.inner.remaining_secs,
        }
    }

    fn outcome(&self, remaining_secs: u64, ended_at: DateTime<Utc>) -> SessionOutcome {
        SessionOutcome {
            mode: self.inner.mode,
            started_at: self.inner.session_started_at.unwrap_or(ended_at),
            ended_at,
            total_secs: self.inner.total_secs,
            remaining_secs,
        }
    }

    fn complete(&mut self, now: DateTime<Utc>) -> Event {
        // The countdown hit zero at a fixed instant even if we tick late.
        let ended_at = self
            .inner
            .running_since
            .map(|since| since + Duration::seconds(self.inner.remaining_secs as i64))
            .map_or(now, |zero_at| zero_at.min(now));
        let outcome = self.outcome(0, ended_at);
        info!(mode = %outcome.mode, elapsed_secs = outcome.elapsed_secs(), "session completed");

        self.inner.remaining_secs = 0;
        self.inner.running_since = None;
        self.inner.completed_at = Some(ended_at);
        self.inner.state = TimerState::Completed;
        Event::SessionCompleted(outcome)
    }

    fn advance(&mut self, now: DateTime<Utc>) -> Event {
        let mut cycle = self.inner.focus_cycle_count;
        if self.inner.mode == Mode::Focus {
            cycle = cycle.saturating_add(1);
        }
        let next = self.settings.next_mode(self.inner.mode, cycle);
        info!(from = %self.inner.mode, to = %next, cycle, "mode changed");
        self.inner = TimerCheckpoint::idle(next, cycle, &self.settings);
        Event::ModeChanged {
            mode: next,
            sessions_completed_in_cycle: cycle,
            at: now,
        }
    }
}

fn progress(remaining_secs: u64, total_secs: u64) -> f64 {
    if total_secs == 0 {
        return 0.0;
    }
    1.0 - (remaining_secs as f64 / total_secs as f64)
}

/// `MM:SS` countdown text; minutes are not wrapped into hours.
pub fn format_clock(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
