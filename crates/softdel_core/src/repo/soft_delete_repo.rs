//! Record-level soft deletion, relation traversal and linking.
//!
//! # Responsibility
//! - Soft-delete one record with its relation cascade, or restore it.
//! - Hand out scoped queries, including queries across declared relations.
//!
//! # Invariants
//! - In-memory records are only mutated after storage writes commit.
//! - `undelete` never writes when the record is already live.
//! - Restoring a record does not restore the links its deletion removed.

use crate::model::entity::{id_value, EntityDef, RecordId, SoftDeleteModel};
use crate::model::relation::Relation;
use crate::model::scope::Scope;
use crate::repo::cascade::{
    mark_deleted, mark_live, unlink_relations, update_column, CascadeReport,
};
use crate::repo::query::Query;
use crate::repo::schema_check::ensure_entity_ready;
use crate::repo::{now_epoch_ms, with_write_scope, RepoError, RepoResult};
use log::{debug, error, info};
use rusqlite::types::Value;
use rusqlite::{params, Connection};
use std::time::Instant;

/// Repository interface for record-level soft deletion and linking.
pub trait SoftDeleteRepository {
    fn delete<M: SoftDeleteModel>(&self, record: &mut M) -> RepoResult<CascadeReport>;
    fn undelete<M: SoftDeleteModel>(&self, record: &mut M) -> RepoResult<bool>;
    fn refresh<M: SoftDeleteModel>(&self, record: &mut M) -> RepoResult<()>;
    fn link<O: SoftDeleteModel>(
        &self,
        owner_id: RecordId,
        name: &str,
        target_id: RecordId,
    ) -> RepoResult<()>;
    fn unlink<O: SoftDeleteModel>(
        &self,
        owner_id: RecordId,
        name: &str,
        target_id: RecordId,
    ) -> RepoResult<bool>;
}

/// SQLite-backed soft-deletion repository.
pub struct SqliteSoftDeleteRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSoftDeleteRepository<'conn> {
    /// Wraps a migrated connection without schema checks.
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Wraps a migrated connection after verifying that every table and
    /// column declared by `entities` and their relations exists.
    pub fn try_new(conn: &'conn Connection, entities: &[&EntityDef]) -> RepoResult<Self> {
        for entity in entities {
            ensure_entity_ready(conn, entity)?;
        }
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &'conn Connection {
        self.conn
    }

    /// Live records of `M`.
    pub fn objects<M: SoftDeleteModel>(&self) -> Query<'conn, M> {
        Query::new(self.conn, Scope::Live)
    }

    /// Soft-deleted records of `M`.
    pub fn deleted<M: SoftDeleteModel>(&self) -> Query<'conn, M> {
        Query::new(self.conn, Scope::Deleted)
    }

    /// Every record of `M`, deleted or not.
    pub fn with_deleted<M: SoftDeleteModel>(&self) -> Query<'conn, M> {
        Query::new(self.conn, Scope::All)
    }

    /// Live records of `T` reached from `owner_id` through `O`'s relation
    /// `name`; re-scope the returned query to see deleted ones.
    ///
    /// # Errors
    /// - `UnknownRelation` when `O` declares no relation `name`.
    /// - `RelationTargetMismatch` when the relation does not lead to `T`.
    pub fn related<O: SoftDeleteModel, T: SoftDeleteModel>(
        &self,
        owner_id: RecordId,
        name: &str,
    ) -> RepoResult<Query<'conn, T>> {
        let owner = O::entity();
        let relation = find_relation(owner, name)?;
        let target = T::entity();
        if !relation.target().same_table(target) {
            return Err(RepoError::RelationTargetMismatch {
                relation: relation.name(),
                expected: relation.target().table,
                actual: target.table,
            });
        }

        let sql = match relation {
            Relation::OneToOne { column, .. } | Relation::ForeignKey { column, .. } => format!(
                "{} IN (SELECT {column} FROM {} WHERE {} = ?)",
                target.primary_key, owner.table, owner.primary_key
            ),
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
            } => format!(
                "{} IN (SELECT {target_column} FROM {through} WHERE {source_column} = ?)",
                target.primary_key
            ),
            Relation::ReverseOneToOne { column, .. }
            | Relation::ReverseForeignKey { column, .. } => format!("{column} = ?"),
        };

        Ok(Query::new(self.conn, Scope::Live).with_clause(sql, vec![id_value(owner_id)]))
    }
}

impl SoftDeleteRepository for SqliteSoftDeleteRepository<'_> {
    /// Soft-deletes `record` and cascades its relations.
    ///
    /// # Side effects
    /// - Nulls owned one-to-one columns and drops them from `record`.
    /// - Removes memberships declared with `MembershipPolicy::Clear`.
    /// - Nulls reverse one-to-one and foreign-key columns on related rows.
    /// - Stamps `deleted_at` and the updated column in storage and on `record`.
    ///
    /// # Errors
    /// - `NotFound` when the record id is not stored; nothing is written.
    fn delete<M: SoftDeleteModel>(&self, record: &mut M) -> RepoResult<CascadeReport> {
        let entity = M::entity();
        let id = record.id();
        let started_at = Instant::now();
        let now = now_epoch_ms();

        let result = with_write_scope(self.conn, |conn| {
            let unlinked = unlink_relations(conn, entity, id, now)?;
            if mark_deleted(conn, entity, &[id], now)? == 0 {
                return Err(RepoError::NotFound {
                    table: entity.table,
                    id,
                });
            }
            Ok(unlinked)
        });

        match result {
            Ok(unlinked) => {
                for field in &unlinked.cleared_fields {
                    record.clear_one_to_one(field);
                }
                record.set_deleted_at(Some(now));
                if entity.updated_column.is_some() {
                    record.set_updated_at(now);
                }

                let mut report = unlinked.report;
                report.records = 1;
                info!(
                    "event=soft_delete module=repo status=ok table={} reverse_links_nulled={} memberships_removed={} duration_ms={}",
                    entity.table,
                    report.reverse_links_nulled,
                    report.memberships_removed,
                    started_at.elapsed().as_millis()
                );
                Ok(report)
            }
            Err(err) => {
                error!(
                    "event=soft_delete module=repo status=error table={} duration_ms={} error={}",
                    entity.table,
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    /// Restores a soft-deleted `record`.
    ///
    /// Returns `false` without touching storage when `record` is already
    /// live. Links removed by the delete stay removed.
    fn undelete<M: SoftDeleteModel>(&self, record: &mut M) -> RepoResult<bool> {
        let entity = M::entity();
        let id = record.id();

        if record.is_live() {
            debug!(
                "event=undelete module=repo status=skip table={} reason=already_live",
                entity.table
            );
            return Ok(false);
        }

        let now = now_epoch_ms();
        let restored = mark_live(self.conn, entity, &[id], now)?;
        if restored == 0 && !self.with_deleted::<M>().filter_id(id).exists()? {
            return Err(RepoError::NotFound {
                table: entity.table,
                id,
            });
        }

        record.set_deleted_at(None);
        if restored > 0 && entity.updated_column.is_some() {
            record.set_updated_at(now);
        }
        info!(
            "event=undelete module=repo status=ok table={} written={}",
            entity.table,
            restored > 0
        );
        Ok(restored > 0)
    }

    /// Reloads `record` from storage, whatever its scope.
    fn refresh<M: SoftDeleteModel>(&self, record: &mut M) -> RepoResult<()> {
        let id = record.id();
        *record = self
            .with_deleted::<M>()
            .get(id)?
            .ok_or(RepoError::NotFound {
                table: M::entity().table,
                id,
            })?;
        Ok(())
    }

    /// Links `target_id` to `owner_id` through `O`'s relation `name`.
    ///
    /// Many-to-many links are idempotent; one-to-one and foreign-key links
    /// overwrite the stored column.
    fn link<O: SoftDeleteModel>(
        &self,
        owner_id: RecordId,
        name: &str,
        target_id: RecordId,
    ) -> RepoResult<()> {
        let owner = O::entity();
        let relation = find_relation(owner, name)?;
        let now = now_epoch_ms();

        match relation {
            Relation::OneToOne { column, .. } | Relation::ForeignKey { column, .. } => {
                set_link_column(self.conn, owner, column, id_value(target_id), owner_id, now)
            }
            Relation::ReverseOneToOne {
                related, column, ..
            }
            | Relation::ReverseForeignKey {
                related, column, ..
            } => set_link_column(self.conn, related, column, id_value(owner_id), target_id, now),
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
                self.conn.execute(
                    &format!(
                        "INSERT OR IGNORE INTO {through} ({source_column}, {target_column}) VALUES (?1, ?2);"
                    ),
                    params![owner_id.to_string(), target_id.to_string()],
                )?;
                Ok(())
            }
        }
    }

    /// Removes the link between `owner_id` and `target_id`.
    ///
    /// Returns whether a link existed.
    fn unlink<O: SoftDeleteModel>(
        &self,
        owner_id: RecordId,
        name: &str,
        target_id: RecordId,
    ) -> RepoResult<bool> {
        let owner = O::entity();
        let relation = find_relation(owner, name)?;
        let now = now_epoch_ms();

        let changed = match relation {
            Relation::OneToOne { column, .. } | Relation::ForeignKey { column, .. } => {
                update_column(
                    self.conn,
                    owner,
                    column,
                    Value::Null,
                    &format!("{} = ? AND {column} = ?", owner.primary_key),
                    vec![id_value(owner_id), id_value(target_id)],
                    now,
                )?
            }
            Relation::ReverseOneToOne {
                related, column, ..
            }
            | Relation::ReverseForeignKey {
                related, column, ..
            } => update_column(
                self.conn,
                related,
                column,
                Value::Null,
                &format!("{} = ? AND {column} = ?", related.primary_key),
                vec![id_value(target_id), id_value(owner_id)],
                now,
            )?,
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
            } => self.conn.execute(
                &format!("DELETE FROM {through} WHERE {source_column} = ?1 AND {target_column} = ?2;"),
                params![owner_id.to_string(), target_id.to_string()],
            )?,
        };

        Ok(changed > 0)
    }
}

fn find_relation(entity: &'static EntityDef, name: &str) -> RepoResult<&'static Relation> {
    entity
        .relation(name)
        .ok_or_else(|| RepoError::UnknownRelation {
            table: entity.table,
            relation: name.to_string(),
        })
}

fn set_link_column(
    conn: &Connection,
    entity: &EntityDef,
    column: &str,
    value: Value,
    row_id: RecordId,
    now: i64,
) -> RepoResult<()> {
    let changed = update_column(
        conn,
        entity,
        column,
        value,
        &format!("{} = ?", entity.primary_key),
        vec![id_value(row_id)],
        now,
    )?;
    if changed == 0 {
        return Err(RepoError::NotFound {
            table: entity.table,
            id: row_id,
        });
    }
    Ok(())
}
