//! SQLite connection, schema and failure classification for the document
//! store.
//!
//! The schema is two tables: `documents` holds each record as a JSON body,
//! and `unique_keys` holds one row per declared unique field under
//! `UNIQUE(collection, field, value)`. That index, not a prior lookup, is
//! what rejects the second of two concurrent registrations.
//!
//! Schema versions live in `PRAGMA user_version`. A file written by a newer
//! build is refused instead of being migrated backwards.

use rusqlite::{ffi, ErrorCode};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory, BUSY_TIMEOUT};

pub type DbResult<T> = Result<T, DbError>;

/// Failure while opening or migrating the store database.
#[derive(Debug)]
pub enum DbError {
    /// Error reported by SQLite itself.
    Sqlite(rusqlite::Error),
    /// The file's `user_version` is past the last embedded migration.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl DbError {
    /// Classifies the underlying SQLite failure, if any.
    pub fn failure_kind(&self) -> Option<SqliteFailureKind> {
        match self {
            Self::Sqlite(err) => Some(SqliteFailureKind::of(err)),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "store schema version {db_version} was written by a newer build \
                 (this build reads up to {latest_supported})"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

/// What a SQLite failure means to the document store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqliteFailureKind {
    /// The busy timeout ran out while another connection held the lock.
    Busy,
    /// A `UNIQUE` or primary key index rejected the row.
    UniqueViolation,
    Other,
}

impl SqliteFailureKind {
    pub fn of(err: &rusqlite::Error) -> Self {
        let rusqlite::Error::SqliteFailure(failure, _) = err else {
            return Self::Other;
        };
        if failure.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
            || failure.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        {
            return Self::UniqueViolation;
        }
        match failure.code {
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => Self::Busy,
            _ => Self::Other,
        }
    }
}
