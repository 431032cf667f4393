use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::Mode;

/// Everything the recorder needs to persist one finished interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOutcome {
    pub mode: Mode,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub total_secs: u64,
    pub remaining_secs: u64,
}

impl SessionOutcome {
    pub fn elapsed_secs(&self) -> u64 {
        self.total_secs.saturating_sub(self.remaining_secs)
    }
}

/// Every state change of the timer produces an Event.
/// Notification, audio and screen-wake collaborators subscribe to them; the
/// session recorder consumes the two session-ending variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    TimerStarted {
        mode: Mode,
        duration_secs: u64,
        at: DateTime<Utc>,
    },
    TimerPaused {
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    TimerResumed {
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    Tick {
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    SessionCompleted(SessionOutcome),
    SessionSkipped(SessionOutcome),
    ModeChanged {
        mode: Mode,
        sessions_completed_in_cycle: u32,
        at: DateTime<Utc>,
    },
    TimerReset {
        mode: Mode,
        at: DateTime<Utc>,
    },
}

impl Event {
    /// The finished session carried by this event, if it ends one.
    pub fn outcome(&self) -> Option<(&SessionOutcome, bool)> {
        match self {
            Event::SessionCompleted(outcome) => Some((outcome, true)),
            Event::SessionSkipped(outcome) => Some((outcome, false)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn serializes_with_type_tag() {
        let at = Utc.with_ymd_and_hms(2026, 1, 5, 8, 0, 0).unwrap();
        let json = serde_json::to_value(Event::ModeChanged {
            mode: Mode::LongBreak,
            sessions_completed_in_cycle: 4,
            at,
        })
        .unwrap();
        assert_eq!(json["type"], "mode_changed");
        assert_eq!(json["mode"], "long_break");
    }

    #[test]
    fn outcome_flags_completion() {
        let at = Utc.with_ymd_and_hms(2026, 1, 5, 8, 0, 0).unwrap();
        let outcome = SessionOutcome {
            mode: Mode::Focus,
            started_at: at,
            ended_at: at,
            total_secs: 1500,
            remaining_secs: 300,
        };
        assert_eq!(outcome.elapsed_secs(), 1200);
        let skipped = Event::SessionSkipped(outcome.clone());
        assert_eq!(skipped.outcome(), Some((&outcome, false)));
        assert!(Event::TimerReset { mode: Mode::Focus, at }.outcome().is_none());
    }
}
