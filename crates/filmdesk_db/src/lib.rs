//! Unified database layer for FilmDesk
//!
//! Single source of truth for persistence. The CLI, the agent poller and the
//! match engine all go through [`FilmDb`]; nothing else talks to SQLite.
//!
//! # Usage
//!
//! ```rust,ignore
//! use filmdesk_db::{FilmDb, Result};
//!
//! let db = FilmDb::open("~/.filmdesk/filmdesk.sqlite3").await?;
//!
//! // Queue operations
//! let job = db.jobs_claim_next().await?;
//!
//! // Candidate lookups
//! let grants = db.grants_list_open(today).await?;
//! ```

mod error;
mod schema;
mod types;

// Method implementations organized by domain
mod activity;
mod festivals;
mod grants;
mod jobs;
mod production;
mod projects;

pub use error::{DbError, Result};
pub use jobs::{QueueStats, TerminalTransition};
pub use types::*;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// Unified database for all FilmDesk operations.
///
/// Cheap to clone: clones share the connection pool.
#[derive(Clone)]
pub struct FilmDb {
    pool: SqlitePool,
}

impl std::fmt::Debug for FilmDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilmDb")
            .field("connections", &self.pool.size())
            .finish()
    }
}

impl FilmDb {
    /// Open or create a database at the given path.
    ///
    /// Creates all tables if they don't exist.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.ensure_schema().await?;

        info!(path = %path.display(), "Database opened");

        Ok(db)
    }

    /// Open a private in-memory database (tests, dry runs).
    ///
    /// Pinned to a single connection: every pooled connection to `:memory:`
    /// would otherwise see its own empty database.
    pub async fn open_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.ensure_schema().await?;
        Ok(db)
    }

    /// Get the underlying connection pool (escape hatch for complex queries).
    ///
    /// Prefer using the typed methods instead.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection.
    pub async fn close(self) {
        self.pool.close().await;
    }
}

// Timestamp utilities
impl FilmDb {
    /// Current time as milliseconds since Unix epoch.
    pub fn now_millis() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    /// Convert milliseconds to DateTime.
    pub fn millis_to_datetime(millis: i64) -> chrono::DateTime<chrono::Utc> {
        chrono::DateTime::from_timestamp_millis(millis).unwrap_or_default()
    }
}

/// JSON column helpers shared by the domain modules.
pub(crate) mod json {
    use crate::error::Result;
    use serde::de::DeserializeOwned;
    use serde::Serialize;

    pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String> {
        Ok(serde_json::to_string(value)?)
    }

    /// Decode a JSON text column; NULL and empty strings decode to `Default`.
    pub fn decode<T: DeserializeOwned + Default>(raw: Option<String>) -> Result<T> {
        match raw {
            Some(text) if !text.trim().is_empty() => Ok(serde_json::from_str(&text)?),
            _ => Ok(T::default()),
        }
    }
}

/// TEXT column decoding shared by the `row_to_*` mappers.
pub(crate) mod decode {
    use crate::error::{DbError, Result};
    use chrono::NaiveDate;
    use std::fmt::Display;
    use std::str::FromStr;

    const DATE_FORMAT: &str = "%Y-%m-%d";

    /// Parse an ID or string enum column.
    pub fn parse<T>(raw: &str, column: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        raw.parse::<T>()
            .map_err(|e| DbError::Decode(format!("{} = '{}': {}", column, raw, e)))
    }

    pub fn date(raw: &str, column: &str) -> Result<NaiveDate> {
        NaiveDate::parse_from_str(raw, DATE_FORMAT)
            .map_err(|e| DbError::Decode(format!("{} = '{}': {}", column, raw, e)))
    }

    pub fn opt_date(raw: Option<String>, column: &str) -> Result<Option<NaiveDate>> {
        raw.as_deref().map(|s| date(s, column)).transpose()
    }

    pub fn format_date(date: NaiveDate) -> String {
        date.format(DATE_FORMAT).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_open_creates_database() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("nested").join("test.db");

        let db = FilmDb::open(&db_path).await.unwrap();
        assert!(db_path.exists());

        db.close().await;
    }

    #[tokio::test]
    async fn test_open_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("test.db");

        FilmDb::open(&db_path).await.unwrap().close().await;
        let db = FilmDb::open(&db_path).await.unwrap();
        assert_eq!(db.jobs_stats().await.unwrap().total, 0);
    }

    #[test]
    fn test_millis_roundtrip() {
        let dt = FilmDb::millis_to_datetime(1_700_000_000_123);
        assert_eq!(dt.timestamp_millis(), 1_700_000_000_123);
    }
}
