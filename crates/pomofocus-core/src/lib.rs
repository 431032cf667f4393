//! # Pomofocus Core Library
//!
//! Core logic for the Pomofocus Pomodoro timer: a clock-driven timer state
//! machine, a recorder that persists finished sessions, and statistics
//! derived from the recorded history. The `pomofocus` CLI is a thin layer
//! over this crate.
//!
//! ## Architecture
//!
//! - **Timer Engine**: A wall-clock-based state machine; the caller invokes
//!   `tick()` (or lets [`TimerRunner`] do it once per second)
//! - **Recorder**: Turns `SessionCompleted`/`SessionSkipped` events into
//!   [`SessionRecord`]s
//! - **Statistics**: Totals, streaks and chart buckets over the local calendar
//! - **Storage**: SQLite-backed [`SessionStore`] and TOML-based configuration
//!
//! ## Key Components
//!
//! - [`TimerEngine`]: Core timer state machine
//! - [`SessionRecorder`]: Event-to-record translation
//! - [`StatisticsAggregator`]: Read-only statistics
//! - [`Database`]: Session persistence
//! - [`Config`]: Application configuration management

pub mod error;
pub mod events;
pub mod recorder;
pub mod stats;
pub mod storage;
pub mod timer;

pub use error::{ConfigError, CoreError, DatabaseError};
pub use events::{Event, SessionOutcome};
pub use recorder::SessionRecorder;
pub use stats::{ChartBucket, Overview, RangeTotals, StatisticsAggregator, StatsRange, Streaks};
pub use storage::{Config, Database, MemoryStore, SessionFilter, SessionRecord, SessionStore, SortOrder};
pub use timer::{Clock, EngineSnapshot, Mode, SystemClock, TimerEngine, TimerRunner, TimerSettings, TimerState};
