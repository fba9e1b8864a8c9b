//! Soft-deletion repository over SQLite.
//!
//! # Responsibility
//! - Scope every read to live, deleted or all records.
//! - Cascade relation cleanup when records are soft-deleted.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Multi-statement writes run in one transaction, or join the caller's
//!   open transaction.
//! - Table and column names only come from static `EntityDef` metadata;
//!   caller values are always bound parameters.
//! - Repository APIs return semantic errors (`NotFound`, `UnknownRelation`)
//!   in addition to DB transport errors.

use crate::db::DbError;
use crate::model::entity::RecordId;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};

pub mod cascade;
pub mod query;
mod schema_check;
pub mod soft_delete_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Errors from soft-deletion repository operations.
#[derive(Debug)]
pub enum RepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// No row with this id exists in `table`, in any scope.
    NotFound { table: &'static str, id: RecordId },
    /// The entity declares no relation with this name.
    UnknownRelation {
        table: &'static str,
        relation: String,
    },
    /// Relation leads to `expected` but the caller asked for `actual`.
    RelationTargetMismatch {
        relation: &'static str,
        expected: &'static str,
        actual: &'static str,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Declared metadata or persisted data is inconsistent.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { table, id } => write!(f, "record not found in `{table}`: {id}"),
            Self::UnknownRelation { table, relation } => {
                write!(f, "entity `{table}` declares no relation `{relation}`")
            }
            Self::RelationTargetMismatch {
                relation,
                expected,
                actual,
            } => write!(
                f,
                "relation `{relation}` leads to `{expected}`, not `{actual}`"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "soft-delete repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "soft-delete repository requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid soft-delete data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::NotFound { .. } => None,
            Self::UnknownRelation { .. } => None,
            Self::RelationTargetMismatch { .. } => None,
            Self::MissingRequiredTable(_) => None,
            Self::MissingRequiredColumn { .. } => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX)
        })
}

/// Runs `write` atomically.
///
/// Opens a transaction when the connection is in autocommit mode; otherwise
/// the caller already owns one and the writes join it.
pub(crate) fn with_write_scope<T>(
    conn: &Connection,
    write: impl FnOnce(&Connection) -> RepoResult<T>,
) -> RepoResult<T> {
    if !conn.is_autocommit() {
        return write(conn);
    }

    let tx = conn.unchecked_transaction()?;
    let value = write(&tx)?;
    tx.commit()?;
    Ok(value)
}
