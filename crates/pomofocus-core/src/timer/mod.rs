mod clock;
mod engine;
mod mode;
pub mod runner;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{
    format_clock, EngineSnapshot, TimerCheckpoint, TimerEngine, TimerState,
    AUTO_ADVANCE_DELAY_SECS,
};
pub use mode::{Mode, TimerSettings};
pub use runner::TimerRunner;
