//! The session store contract shared by the recorder and the aggregator.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::events::SessionOutcome;
use crate::timer::Mode;

/// One finished interval. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: Uuid,
    pub mode: Mode,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub elapsed_secs: u64,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn from_outcome(outcome: &SessionOutcome, completed: bool, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            mode: outcome.mode,
            started_at: outcome.started_at,
            ended_at: outcome.ended_at,
            elapsed_secs: outcome.elapsed_secs(),
            completed,
            created_at,
        }
    }

    /// Whole minutes; anything under a minute is dropped.
    pub fn elapsed_minutes(&self) -> u64 {
        self.elapsed_secs / 60
    }
}

/// Predicate over stored sessions. Unset fields match everything.
///
/// Both start-time bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionFilter {
    pub completed: Option<bool>,
    pub mode: Option<Mode>,
    pub started_from: Option<DateTime<Utc>>,
    pub started_until: Option<DateTime<Utc>>,
}

impl SessionFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn completed(mut self, completed: bool) -> Self {
        self.completed = Some(completed);
        self
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn started_from(mut self, from: DateTime<Utc>) -> Self {
        self.started_from = Some(from);
        self
    }

    pub fn started_until(mut self, until: DateTime<Utc>) -> Self {
        self.started_until = Some(until);
        self
    }

    pub fn matches(&self, record: &SessionRecord) -> bool {
        self.completed.map_or(true, |c| record.completed == c)
            && self.mode.map_or(true, |m| record.mode == m)
            && self.started_from.map_or(true, |from| record.started_at >= from)
            && self.started_until.map_or(true, |until| record.started_at <= until)
    }
}

/// Ordering by `started_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Append-only session persistence.
pub trait SessionStore {
    /// # Errors
    /// Returns a [`DatabaseError`] if the record could not be written.
    fn insert(&self, record: &SessionRecord) -> Result<(), DatabaseError>;

    /// # Errors
    /// Returns a [`DatabaseError`] if the query failed or a row is unreadable.
    fn query(&self, filter: &SessionFilter, order: SortOrder) -> Result<Vec<SessionRecord>, DatabaseError>;
}

impl<T: SessionStore + ?Sized> SessionStore for &T {
    fn insert(&self, record: &SessionRecord) -> Result<(), DatabaseError> {
        (**self).insert(record)
    }

    fn query(&self, filter: &SessionFilter, order: SortOrder) -> Result<Vec<SessionRecord>, DatabaseError> {
        (**self).query(filter, order)
    }
}

impl<T: SessionStore + ?Sized> SessionStore for Arc<T> {
    fn insert(&self, record: &SessionRecord) -> Result<(), DatabaseError> {
        (**self).insert(record)
    }

    fn query(&self, filter: &SessionFilter, order: SortOrder) -> Result<Vec<SessionRecord>, DatabaseError> {
        (**self).query(filter, order)
    }
}

/// Volatile store, handy for tests and for embedding without SQLite.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<SessionRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().map(|records| records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<SessionRecord>>, DatabaseError> {
        self.records
            .lock()
            .map_err(|_| DatabaseError::QueryFailed("memory store poisoned".into()))
    }
}

impl SessionStore for MemoryStore {
    fn insert(&self, record: &SessionRecord) -> Result<(), DatabaseError> {
        let mut records = self.lock()?;
        if records.iter().any(|r| r.id == record.id) {
            return Err(DatabaseError::QueryFailed(format!(
                "duplicate session id {}",
                record.id
            )));
        }
        records.push(record.clone());
        Ok(())
    }

    fn query(&self, filter: &SessionFilter, order: SortOrder) -> Result<Vec<SessionRecord>, DatabaseError> {
        let records = self.lock()?;
        let mut matched: Vec<SessionRecord> = records.iter().filter(|r| filter.matches(r)).cloned().collect();
        matched.sort_by_key(|r| r.started_at);
        if order == SortOrder::Descending {
            matched.reverse();
        }
        Ok(matched)
    }
}
