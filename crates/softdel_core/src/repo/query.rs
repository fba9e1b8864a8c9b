//! Composable scoped queries.
//!
//! # Responsibility
//! - Build `SELECT`s over one entity with a visibility scope plus caller
//!   filters.
//! - Provide collection-level soft delete and restore.
//!
//! # Invariants
//! - The scope predicate is always combined with caller filters via `AND`,
//!   each filter in its own parentheses.
//! - Filter columns must be declared by the entity; a query holding an
//!   undeclared column fails at its terminal method with `InvalidData`.
//! - Row order is deterministic: primary key ascending.

use crate::model::entity::{id_value, EntityDef, RecordId, SoftDeleteModel};
use crate::model::scope::Scope;
use crate::repo::cascade::{mark_deleted, mark_live, unlink_relations, CascadeReport};
use crate::repo::{now_epoch_ms, with_write_scope, RepoError, RepoResult};
use log::{error, info};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use std::marker::PhantomData;
use std::time::Instant;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct Clause {
    sql: String,
    binds: Vec<Value>,
}

/// Lazy query over records of `M`.
///
/// Nothing touches the database until a terminal method (`count`, `fetch`,
/// `delete`, ...) runs, so scopes and filters can be chained freely.
pub struct Query<'conn, M> {
    conn: &'conn Connection,
    scope: Scope,
    clauses: Vec<Clause>,
    rejected_column: Option<String>,
    limit: Option<u32>,
    offset: u32,
    _model: PhantomData<fn() -> M>,
}

impl<M> Clone for Query<'_, M> {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn,
            scope: self.scope,
            clauses: self.clauses.clone(),
            rejected_column: self.rejected_column.clone(),
            limit: self.limit,
            offset: self.offset,
            _model: PhantomData,
        }
    }
}

impl<'conn, M: SoftDeleteModel> Query<'conn, M> {
    pub(crate) fn new(conn: &'conn Connection, scope: Scope) -> Self {
        Self {
            conn,
            scope,
            clauses: Vec::new(),
            rejected_column: None,
            limit: None,
            offset: 0,
            _model: PhantomData,
        }
    }

    pub(crate) fn with_clause(mut self, sql: String, binds: Vec<Value>) -> Self {
        self.clauses.push(Clause { sql, binds });
        self
    }

    fn with_column_clause(mut self, column: &str, sql: String, binds: Vec<Value>) -> Self {
        if M::entity().has_column(column) {
            self.clauses.push(Clause { sql, binds });
        } else if self.rejected_column.is_none() {
            self.rejected_column = Some(column.to_string());
        }
        self
    }

    fn ensure_columns_declared(&self) -> RepoResult<()> {
        match &self.rejected_column {
            Some(column) => Err(RepoError::InvalidData(format!(
                "column `{column}` is not declared by entity `{}`",
                M::entity().table
            ))),
            None => Ok(()),
        }
    }

    /// Replaces the visibility scope, keeping filters.
    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn live(self) -> Self {
        self.scope(Scope::Live)
    }

    pub fn deleted(self) -> Self {
        self.scope(Scope::Deleted)
    }

    pub fn with_deleted(self) -> Self {
        self.scope(Scope::All)
    }

    pub fn current_scope(&self) -> Scope {
        self.scope
    }

    /// Keeps rows where `column = value`.
    pub fn filter_eq(self, column: &'static str, value: impl Into<Value>) -> Self {
        let value = value.into();
        self.with_column_clause(column, format!("{column} = ?"), vec![value])
    }

    /// Drops rows where `column = value`; NULL values are kept.
    pub fn exclude_eq(self, column: &'static str, value: impl Into<Value>) -> Self {
        let value = value.into();
        self.with_column_clause(
            column,
            format!("{column} IS NULL OR {column} <> ?"),
            vec![value],
        )
    }

    /// Keeps rows whose id column `column` references `id`.
    pub fn filter_ref(self, column: &'static str, id: RecordId) -> Self {
        self.with_column_clause(column, format!("{column} = ?"), vec![id_value(id)])
    }

    pub fn filter_null(self, column: &'static str) -> Self {
        self.with_column_clause(column, format!("{column} IS NULL"), Vec::new())
    }

    pub fn filter_not_null(self, column: &'static str) -> Self {
        self.with_column_clause(column, format!("{column} IS NOT NULL"), Vec::new())
    }

    /// Keeps the record with this primary key.
    pub fn filter_id(self, id: RecordId) -> Self {
        let column = M::entity().primary_key;
        self.with_clause(format!("{column} = ?"), vec![id_value(id)])
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    /// Number of matching records.
    pub fn count(&self) -> RepoResult<u64> {
        self.ensure_columns_declared()?;
        let (inner, binds) = self.select_sql(M::entity().primary_key);
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM ({inner});"),
            params_from_iter(binds),
            |row| row.get(0),
        )?;
        u64::try_from(count).map_err(|_| RepoError::InvalidData(format!("negative count {count}")))
    }

    pub fn exists(&self) -> RepoResult<bool> {
        Ok(self.clone().limit(1).count()? > 0)
    }

    /// Loads every matching record.
    pub fn fetch(&self) -> RepoResult<Vec<M>> {
        self.ensure_columns_declared()?;
        let entity = M::entity();
        let (sql, binds) = self.select_sql(&entity.columns.join(", "));
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(M::from_row(row)?);
        }
        Ok(records)
    }

    pub fn first(&self) -> RepoResult<Option<M>> {
        Ok(self.clone().limit(1).fetch()?.into_iter().next())
    }

    /// Loads the matching record with this id, if visible in the scope.
    pub fn get(&self, id: RecordId) -> RepoResult<Option<M>> {
        self.clone().filter_id(id).first()
    }

    /// Primary keys of every matching record.
    pub fn ids(&self) -> RepoResult<Vec<RecordId>> {
        self.ensure_columns_declared()?;
        let entity = M::entity();
        let (sql, binds) = self.select_sql(entity.primary_key);
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            let text: String = row.get(0)?;
            let id = Uuid::parse_str(&text).map_err(|_| {
                RepoError::InvalidData(format!(
                    "invalid id value `{text}` in {}.{}",
                    entity.table, entity.primary_key
                ))
            })?;
            ids.push(id);
        }
        Ok(ids)
    }

    /// Soft-deletes every matching record.
    ///
    /// Each record is unlinked from its relations, then a single bulk
    /// `UPDATE` stamps `deleted_at` on the whole set.
    pub fn delete(self) -> RepoResult<CascadeReport> {
        let entity = M::entity();
        let started_at = Instant::now();
        let now = now_epoch_ms();

        let result = with_write_scope(self.conn, |conn| {
            let ids = self.ids()?;
            let mut report = CascadeReport::default();
            for id in &ids {
                report.absorb(&unlink_relations(conn, entity, *id, now)?.report);
            }
            report.records = mark_deleted(conn, entity, &ids, now)?;
            Ok(report)
        });

        let records = result.as_ref().map(|report| report.records);
        log_bulk_result("bulk_soft_delete", entity, started_at, &records);
        result
    }

    /// Restores every matching record that is currently deleted.
    ///
    /// Relations nulled by the delete are not restored.
    pub fn undelete(self) -> RepoResult<usize> {
        let entity = M::entity();
        let started_at = Instant::now();
        let now = now_epoch_ms();

        let result = with_write_scope(self.conn, |conn| {
            let ids = self.ids()?;
            mark_live(conn, entity, &ids, now)
        });

        let records = result.as_ref().copied();
        log_bulk_result("bulk_undelete", entity, started_at, &records);
        result
    }

    fn select_sql(&self, columns: &str) -> (String, Vec<Value>) {
        let entity = M::entity();
        let mut sql = format!("SELECT {columns} FROM {} WHERE 1 = 1", entity.table);
        let mut binds = Vec::new();

        if let Some(predicate) = self.scope.predicate(entity.deleted_column) {
            sql.push_str(" AND ");
            sql.push_str(&predicate);
        }

        for clause in &self.clauses {
            sql.push_str(" AND (");
            sql.push_str(&clause.sql);
            sql.push(')');
            binds.extend(clause.binds.iter().cloned());
        }

        sql.push_str(&format!(" ORDER BY {} ASC", entity.primary_key));

        if let Some(limit) = self.limit {
            sql.push_str(" LIMIT ?");
            binds.push(Value::Integer(i64::from(limit)));
            if self.offset > 0 {
                sql.push_str(" OFFSET ?");
                binds.push(Value::Integer(i64::from(self.offset)));
            }
        } else if self.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            binds.push(Value::Integer(i64::from(self.offset)));
        }

        (sql, binds)
    }
}

fn log_bulk_result(
    event: &str,
    entity: &EntityDef,
    started_at: Instant,
    result: &Result<usize, &RepoError>,
) {
    match result {
        Ok(records) => info!(
            "event={event} module=repo status=ok table={} records={records} duration_ms={}",
            entity.table,
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event={event} module=repo status=error table={} duration_ms={} error={err}",
            entity.table,
            started_at.elapsed().as_millis()
        ),
    }
}
