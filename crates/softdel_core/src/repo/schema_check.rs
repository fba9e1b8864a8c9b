//! Verifies that a connection's schema matches declared entities.

use crate::model::entity::EntityDef;
use crate::model::relation::Relation;
use crate::repo::{RepoError, RepoResult};
use rusqlite::Connection;

/// Checks tables and columns referenced by `entity` and its relations.
pub(crate) fn ensure_entity_ready(conn: &Connection, entity: &EntityDef) -> RepoResult<()> {
    for required in [entity.primary_key, entity.deleted_column] {
        if !entity.columns.contains(&required) {
            return Err(RepoError::InvalidData(format!(
                "entity `{}` must select column `{required}`",
                entity.table
            )));
        }
    }

    ensure_table(conn, entity.table)?;
    for column in entity.columns {
        ensure_column(conn, entity.table, *column)?;
    }
    if let Some(updated) = entity.updated_column {
        ensure_column(conn, entity.table, updated)?;
    }

    for relation in entity.relations {
        match relation {
            Relation::OneToOne { column, .. } | Relation::ForeignKey { column, .. } => {
                ensure_column(conn, entity.table, *column)?;
            }
            Relation::ReverseOneToOne {
                related, column, ..
            }
            | Relation::ReverseForeignKey {
                related, column, ..
            } => {
                ensure_table(conn, related.table)?;
                ensure_column(conn, related.table, *column)?;
            }
            Relation::ManyToMany {
                through,
                source_column,
                target_column,
                ..
            }
            | Relation::ReverseManyToMany {
                through,
                source_column,
                target_column,
                ..
            } => {
                ensure_table(conn, *through)?;
                ensure_column(conn, *through, *source_column)?;
                ensure_column(conn, *through, *target_column)?;
            }
        }
    }

    Ok(())
}

fn ensure_table(conn: &Connection, table: &'static str) -> RepoResult<()> {
    if table_exists(conn, table)? {
        Ok(())
    } else {
        Err(RepoError::MissingRequiredTable(table))
    }
}

fn ensure_column(conn: &Connection, table: &'static str, column: &'static str) -> RepoResult<()> {
    if table_has_column(conn, table, column)? {
        Ok(())
    } else {
        Err(RepoError::MissingRequiredColumn { table, column })
    }
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
