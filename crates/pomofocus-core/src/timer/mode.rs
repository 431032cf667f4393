use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// The three kinds of interval a session can run in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Focus,
    ShortBreak,
    LongBreak,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::Focus, Mode::ShortBreak, Mode::LongBreak];

    pub fn display_name(&self) -> &'static str {
        match self {
            Mode::Focus => "Focus",
            Mode::ShortBreak => "Short Break",
            Mode::LongBreak => "Long Break",
        }
    }

    /// Stable token used in storage and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Focus => "focus",
            Mode::ShortBreak => "short_break",
            Mode::LongBreak => "long_break",
        }
    }

    pub fn is_break(&self) -> bool {
        !matches!(self, Mode::Focus)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "focus" => Ok(Mode::Focus),
            "short_break" => Ok(Mode::ShortBreak),
            "long_break" => Ok(Mode::LongBreak),
            other => Err(format!("unknown mode '{other}'")),
        }
    }
}

/// Validated timer durations and long-break cadence.
///
/// Only constructible through [`TimerSettings::new`], so an engine never sees
/// a zero duration or an interval that would make every (or no) break long.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTimerSettings")]
pub struct TimerSettings {
    focus_min: u32,
    short_break_min: u32,
    long_break_min: u32,
    long_break_interval: u32,
}

/// Unchecked wire form; deserialization goes through [`TimerSettings::new`].
#[derive(Deserialize)]
struct RawTimerSettings {
    focus_min: u32,
    short_break_min: u32,
    long_break_min: u32,
    long_break_interval: u32,
}

impl TryFrom<RawTimerSettings> for TimerSettings {
    type Error = ConfigError;

    fn try_from(raw: RawTimerSettings) -> Result<Self, Self::Error> {
        Self::new(
            raw.focus_min,
            raw.short_break_min,
            raw.long_break_min,
            raw.long_break_interval,
        )
    }
}

impl TimerSettings {
    pub const MIN_LONG_BREAK_INTERVAL: u32 = 2;

    /// # Errors
    /// Returns [`ConfigError::InvalidValue`] if any duration is zero or the
    /// long-break interval is below 2.
    pub fn new(
        focus_min: u32,
        short_break_min: u32,
        long_break_min: u32,
        long_break_interval: u32,
    ) -> Result<Self, ConfigError> {
        for (key, value) in [
            ("timer.focus_duration", focus_min),
            ("timer.short_break", short_break_min),
            ("timer.long_break", long_break_min),
        ] {
            if value == 0 {
                return Err(ConfigError::invalid(key, "duration must be at least 1 minute"));
            }
        }
        if long_break_interval < Self::MIN_LONG_BREAK_INTERVAL {
            return Err(ConfigError::invalid(
                "timer.long_break_interval",
                format!(
                    "must be at least {}, got {long_break_interval}",
                    Self::MIN_LONG_BREAK_INTERVAL
                ),
            ));
        }
        Ok(Self {
            focus_min,
            short_break_min,
            long_break_min,
            long_break_interval,
        })
    }

    pub fn duration_min(&self, mode: Mode) -> u32 {
        match mode {
            Mode::Focus => self.focus_min,
            Mode::ShortBreak => self.short_break_min,
            Mode::LongBreak => self.long_break_min,
        }
    }

    pub fn duration_secs(&self, mode: Mode) -> u64 {
        u64::from(self.duration_min(mode)).saturating_mul(60)
    }

    pub fn long_break_interval(&self) -> u32 {
        self.long_break_interval
    }

    /// Mode that follows `current`, given the focus-cycle count *after* any
    /// increment for the session that just ended.
    pub fn next_mode(&self, current: Mode, focus_cycle_count: u32) -> Mode {
        match current {
            Mode::Focus if focus_cycle_count % self.long_break_interval == 0 => Mode::LongBreak,
            Mode::Focus => Mode::ShortBreak,
            Mode::ShortBreak | Mode::LongBreak => Mode::Focus,
        }
    }
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            focus_min: 25,
            short_break_min: 5,
            long_break_min: 15,
            long_break_interval: 4,
        }
    }
}
