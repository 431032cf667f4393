//! SQLite-based session storage.
//!
//! Provides persistent storage for:
//! - Finished sessions (completed and skipped)
//! - Key-value store for application state (the CLI's timer checkpoint)

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};
use tracing::debug;
use uuid::Uuid;

use super::data_dir;
use super::migrations;
use super::store::{SessionFilter, SessionRecord, SessionStore, SortOrder};
use crate::error::DatabaseError;
use crate::timer::Mode;

/// SQLite database for session storage.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `~/.config/pomofocus/pomofocus.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, DatabaseError> {
        let dir = data_dir().map_err(|e| DatabaseError::QueryFailed(format!("data directory unavailable: {e}")))?;
        Self::open_at(&dir.join("pomofocus.db"))
    }

    /// Open (or create) the database file at `path`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_at(path: &Path) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "database opened");
        Self::with_connection(conn)
    }

    /// Open an in-memory database.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub fn open_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, DatabaseError> {
        migrations::migrate(&conn).map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(Self { conn })
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        let mut stmt = self.conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }
}

impl SessionStore for Database {
    fn insert(&self, record: &SessionRecord) -> Result<(), DatabaseError> {
        let elapsed = i64::try_from(record.elapsed_secs).map_err(|_| DatabaseError::Corrupt {
            column: "elapsed_secs".into(),
            message: format!("{} exceeds SQLite INTEGER range", record.elapsed_secs),
        })?;
        self.conn.execute(
            "INSERT INTO sessions (id, mode, started_at, ended_at, elapsed_secs, completed, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.id.to_string(),
                record.mode.as_str(),
                to_db_time(&record.started_at),
                to_db_time(&record.ended_at),
                elapsed,
                record.completed,
                to_db_time(&record.created_at),
            ],
        )?;
        Ok(())
    }

    fn query(&self, filter: &SessionFilter, order: SortOrder) -> Result<Vec<SessionRecord>, DatabaseError> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(completed) = filter.completed {
            clauses.push("completed = ?");
            values.push(Value::Integer(i64::from(completed)));
        }
        if let Some(mode) = filter.mode {
            clauses.push("mode = ?");
            values.push(Value::Text(mode.as_str().to_string()));
        }
        if let Some(from) = filter.started_from {
            clauses.push("started_at >= ?");
            values.push(Value::Text(to_db_time(&from)));
        }
        if let Some(until) = filter.started_until {
            clauses.push("started_at <= ?");
            values.push(Value::Text(to_db_time(&until)));
        }

        let mut sql = String::from(
            "SELECT id, mode, started_at, ended_at, elapsed_secs, completed, created_at FROM sessions",
        );
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(match order {
            SortOrder::Ascending => " ORDER BY started_at ASC",
            SortOrder::Descending => " ORDER BY started_at DESC",
        });

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
            Ok(RawSession {
                id: row.get(0)?,
                mode: row.get(1)?,
                started_at: row.get(2)?,
                ended_at: row.get(3)?,
                elapsed_secs: row.get(4)?,
                completed: row.get(5)?,
                created_at: row.get(6)?,
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?.decode()?);
        }
        Ok(records)
    }
}

struct RawSession {
    id: String,
    mode: String,
    started_at: String,
    ended_at: String,
    elapsed_secs: i64,
    completed: bool,
    created_at: String,
}

impl RawSession {
    fn decode(self) -> Result<SessionRecord, DatabaseError> {
        Ok(SessionRecord {
            id: Uuid::parse_str(&self.id).map_err(|e| corrupt("id", e))?,
            mode: self.mode.parse::<Mode>().map_err(|e| corrupt("mode", e))?,
            started_at: parse_db_time(&self.started_at, "started_at")?,
            ended_at: parse_db_time(&self.ended_at, "ended_at")?,
            elapsed_secs: u64::try_from(self.elapsed_secs)
                .map_err(|_| corrupt("elapsed_secs", format!("negative value {}", self.elapsed_secs)))?,
            completed: self.completed,
            created_at: parse_db_time(&self.created_at, "created_at")?,
        })
    }
}

/// Fixed-width UTC timestamp; lexical order equals chronological order.
fn to_db_time(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_db_time(value: &str, column: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| corrupt(column, e))
}

fn corrupt(column: &str, err: impl std::fmt::Display) -> DatabaseError {
    DatabaseError::Corrupt {
        column: column.to_string(),
        message: err.to_string(),
    }
}
