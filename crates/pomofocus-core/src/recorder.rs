//! Turns session-ending engine events into persisted [`SessionRecord`]s.

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::DatabaseError;
use crate::events::Event;
use crate::storage::{SessionRecord, SessionStore};
use crate::timer::Clock;

/// Writes one record per finished session. Holds no state of its own.
pub struct SessionRecorder<S> {
    store: S,
    clock: Arc<dyn Clock>,
}

impl<S: SessionStore> SessionRecorder<S> {
    pub fn new(store: S, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Persist the session carried by `event`, if any.
    ///
    /// Returns `Ok(None)` for events that do not end a session.
    ///
    /// # Errors
    /// Returns the store's [`DatabaseError`] when the insert fails. Nothing is
    /// retried; the engine is never informed.
    pub fn handle(&self, event: &Event) -> Result<Option<SessionRecord>, DatabaseError> {
        let Some((outcome, completed)) = event.outcome() else {
            return Ok(None);
        };

        let record = SessionRecord::from_outcome(outcome, completed, self.clock.now());
        if let Err(e) = self.store.insert(&record) {
            warn!(mode = %record.mode, completed, "failed to record session: {e}");
            return Err(e);
        }

        info!(
            id = %record.id,
            mode = %record.mode,
            elapsed_secs = record.elapsed_secs,
            completed,
            "session recorded"
        );
        Ok(Some(record))
    }

    /// Handle a batch of events as returned by an engine command.
    ///
    /// Stops at the first failed insert.
    ///
    /// # Errors
    /// See [`SessionRecorder::handle`].
    pub fn handle_all<'a, I>(&self, events: I) -> Result<Vec<SessionRecord>, DatabaseError>
    where
        I: IntoIterator<Item = &'a Event>,
    {
        let mut records = Vec::new();
        for event in events {
            if let Some(record) = self.handle(event)? {
                records.push(record);
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::SessionOutcome;
    use crate::storage::{MemoryStore, SessionFilter, SortOrder};
    use crate::timer::{ManualClock, Mode};
    use chrono::{Duration, TimeZone, Utc};

    struct FailingStore;

    impl SessionStore for FailingStore {
        fn insert(&self, _record: &SessionRecord) -> Result<(), DatabaseError> {
            Err(DatabaseError::Locked)
        }

        fn query(&self, _filter: &SessionFilter, _order: SortOrder) -> Result<Vec<SessionRecord>, DatabaseError> {
            Err(DatabaseError::Locked)
        }
    }

    fn outcome(remaining_secs: u64) -> SessionOutcome {
        let started_at = Utc.with_ymd_and_hms(2026, 2, 3, 9, 0, 0).unwrap();
        SessionOutcome {
            mode: Mode::Focus,
            started_at,
            ended_at: started_at + Duration::seconds((1500 - remaining_secs) as i64),
            total_secs: 1500,
            remaining_secs,
        }
    }

    fn clock() -> Arc<dyn Clock> {
        Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 2, 3, 9, 30, 0).unwrap()))
    }

    #[test]
    fn completion_is_recorded_as_completed() {
        let recorder = SessionRecorder::new(MemoryStore::new(), clock());
        let record = recorder
            .handle(&Event::SessionCompleted(outcome(0)))
            .unwrap()
            .unwrap();
        assert!(record.completed);
        assert_eq!(record.elapsed_secs, 1500);
        assert_eq!(record.created_at, Utc.with_ymd_and_hms(2026, 2, 3, 9, 30, 0).unwrap());
        assert_eq!(recorder.store().len(), 1);
    }

    #[test]
    fn skip_records_partial_elapsed_time() {
        let recorder = SessionRecorder::new(MemoryStore::new(), clock());
        let record = recorder
            .handle(&Event::SessionSkipped(outcome(600)))
            .unwrap()
            .unwrap();
        assert!(!record.completed);
        assert_eq!(record.elapsed_secs, 900);
    }

    #[test]
    fn other_events_are_ignored() {
        let recorder = SessionRecorder::new(MemoryStore::new(), clock());
        let at = Utc::now();
        let events = [
            Event::TimerStarted {
                mode: Mode::Focus,
                duration_secs: 1500,
                at,
            },
            Event::Tick {
                remaining_secs: 1499,
                at,
            },
            Event::TimerReset { mode: Mode::Focus, at },
        ];
        assert!(recorder.handle_all(&events).unwrap().is_empty());
        assert!(recorder.store().is_empty());
    }

    #[test]
    fn store_failure_is_returned() {
        let recorder = SessionRecorder::new(FailingStore, clock());
        let err = recorder.handle(&Event::SessionCompleted(outcome(0))).unwrap_err();
        assert!(matches!(err, DatabaseError::Locked));
    }
}
