//! Relation cascade and deletion timestamp writes.
//!
//! # Responsibility
//! - Walk an entity's declared relations and unlink one record from them.
//! - Write `deleted_at` for one or many records in bulk.
//!
//! # Invariants
//! - Callers run these helpers inside `with_write_scope`.
//! - A missing reverse one-to-one row means there is nothing to unlink.
//! - Every row written here gets its `updated_column` bumped when declared.

use crate::model::entity::{id_value, EntityDef, RecordId};
use crate::model::relation::{MembershipPolicy, Relation};
use crate::repo::RepoResult;
use log::debug;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

// Stays under SQLite's historical 999 bound-parameter limit.
const BULK_UPDATE_CHUNK: usize = 500;

/// Summary of the writes performed by a soft delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeReport {
    /// Records whose `deleted_at` was written.
    pub records: usize,
    /// Owned one-to-one columns set to NULL.
    pub one_to_one_cleared: usize,
    /// Rows of other entities whose link column was set to NULL.
    pub reverse_links_nulled: usize,
    /// Join-table rows removed under `MembershipPolicy::Clear`.
    pub memberships_removed: usize,
}

impl CascadeReport {
    pub(crate) fn absorb(&mut self, other: &CascadeReport) {
        self.records += other.records;
        self.one_to_one_cleared += other.one_to_one_cleared;
        self.reverse_links_nulled += other.reverse_links_nulled;
        self.memberships_removed += other.memberships_removed;
    }
}

/// Result of unlinking one record.
#[derive(Debug, Default)]
pub(crate) struct Unlinked {
    pub report: CascadeReport,
    /// Owned one-to-one fields that were non-null and are now NULL.
    pub cleared_fields: Vec<&'static str>,
}

/// Unlinks record `id` of `entity` from every declared relation.
pub(crate) fn unlink_relations(
    conn: &Connection,
    entity: &EntityDef,
    id: RecordId,
    now: i64,
) -> RepoResult<Unlinked> {
    let mut unlinked = Unlinked::default();
    let id_text = id.to_string();

    for relation in entity.relations {
        match relation {
            Relation::OneToOne { field, column, .. } => {
                let changed = update_column(
                    conn,
                    entity,
                    column,
                    Value::Null,
                    &format!("{} = ? AND {column} IS NOT NULL", entity.primary_key),
                    vec![Value::Text(id_text.clone())],
                    now,
                )?;
                if changed > 0 {
                    unlinked.report.one_to_one_cleared += changed;
                    unlinked.cleared_fields.push(*field);
                }
            }
            Relation::ForeignKey { .. } => {}
            Relation::ManyToMany {
                through,
                source_column,
                target_column,
                target: other,
                on_delete,
                ..
            }
            | Relation::ReverseManyToMany {
                through,
                source_column,
                target_column,
                related: other,
                on_delete,
                ..
            } => {
                if *on_delete == MembershipPolicy::Clear {
                    // Self-referencing join tables hold the record on both sides.
                    let filter = if other.same_table(entity) {
                        format!("{source_column} = ?1 OR {target_column} = ?1")
                    } else {
                        format!("{source_column} = ?1")
                    };
                    let removed = conn.execute(
                        &format!("DELETE FROM {through} WHERE {filter};"),
                        [id_text.as_str()],
                    )?;
                    unlinked.report.memberships_removed += removed;
                }
            }
            Relation::ReverseOneToOne {
                accessor,
                related,
                column,
            } => {
                let related_id: Option<String> = conn
                    .query_row(
                        &format!(
                            "SELECT {} FROM {} WHERE {column} = ?1 LIMIT 1;",
                            related.primary_key, related.table
                        ),
                        [id_text.as_str()],
                        |row| row.get(0),
                    )
                    .optional()?;

                match related_id {
                    Some(related_id) => {
                        unlinked.report.reverse_links_nulled += update_column(
                            conn,
                            related,
                            column,
                            Value::Null,
                            &format!("{} = ?", related.primary_key),
                            vec![Value::Text(related_id)],
                            now,
                        )?;
                    }
                    None => debug!(
                        "event=cascade module=repo status=skip table={} relation={accessor} reason=not_found",
                        entity.table
                    ),
                }
            }
            Relation::ReverseForeignKey {
                related, column, ..
            } => {
                unlinked.report.reverse_links_nulled += update_column(
                    conn,
                    related,
                    column,
                    Value::Null,
                    &format!("{column} = ?"),
                    vec![Value::Text(id_text.clone())],
                    now,
                )?;
            }
        }
    }

    Ok(unlinked)
}

/// Sets `deleted_at = now` on every id, returning the number of rows written.
pub(crate) fn mark_deleted(
    conn: &Connection,
    entity: &EntityDef,
    ids: &[RecordId],
    now: i64,
) -> RepoResult<usize> {
    write_deleted_column(conn, entity, ids, Value::Integer(now), "", now)
}

/// Clears `deleted_at` on every id that is currently deleted.
pub(crate) fn mark_live(
    conn: &Connection,
    entity: &EntityDef,
    ids: &[RecordId],
    now: i64,
) -> RepoResult<usize> {
    let only_deleted = format!(" AND {} IS NOT NULL", entity.deleted_column);
    write_deleted_column(conn, entity, ids, Value::Null, &only_deleted, now)
}

/// Runs `UPDATE entity SET column = value WHERE filter`, bumping the
/// updated column when the entity declares one.
pub(crate) fn update_column(
    conn: &Connection,
    entity: &EntityDef,
    column: &str,
    value: Value,
    filter: &str,
    filter_binds: Vec<Value>,
    now: i64,
) -> RepoResult<usize> {
    let (assignments, mut binds) = assignments(entity, column, value, now);
    binds.extend(filter_binds);
    let changed = conn.execute(
        &format!("UPDATE {} SET {assignments} WHERE {filter};", entity.table),
        params_from_iter(binds),
    )?;
    Ok(changed)
}

fn write_deleted_column(
    conn: &Connection,
    entity: &EntityDef,
    ids: &[RecordId],
    value: Value,
    extra_filter: &str,
    now: i64,
) -> RepoResult<usize> {
    let mut changed = 0;
    for chunk in ids.chunks(BULK_UPDATE_CHUNK) {
        let placeholders = vec!["?"; chunk.len()].join(", ");
        let filter = format!("{} IN ({placeholders}){extra_filter}", entity.primary_key);
        let binds = chunk.iter().copied().map(id_value).collect();
        changed += update_column(
            conn,
            entity,
            entity.deleted_column,
            value.clone(),
            &filter,
            binds,
            now,
        )?;
    }
    Ok(changed)
}

fn assignments(entity: &EntityDef, column: &str, value: Value, now: i64) -> (String, Vec<Value>) {
    match entity.updated_column {
        Some(updated) if updated != column => (
            format!("{column} = ?, {updated} = ?"),
            vec![value, Value::Integer(now)],
        ),
        _ => (format!("{column} = ?"), vec![value]),
    }
}
