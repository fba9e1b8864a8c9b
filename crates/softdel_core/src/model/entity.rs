//! Entity descriptors and the record contract.

use crate::model::relation::Relation;
use rusqlite::types::{Type, Value};
use rusqlite::Row;
use uuid::Uuid;

/// Stable identifier of a soft-deletable record, stored as TEXT.
pub type RecordId = Uuid;

/// Static description of one soft-deletable table.
///
/// Declared as a `static` so relations of different entities can point at
/// each other:
///
/// ```
/// use softdel_core::{EntityDef, Relation};
///
/// static NOTE_RELATIONS: [Relation; 0] = [];
/// static NOTE: EntityDef = EntityDef {
///     table: "note",
///     primary_key: "id",
///     deleted_column: "deleted_at",
///     updated_column: None,
///     columns: &["id", "deleted_at"],
///     relations: &NOTE_RELATIONS,
/// };
///
/// assert!(NOTE.relation("missing").is_none());
/// ```
#[derive(Debug)]
pub struct EntityDef {
    /// Table holding the records.
    pub table: &'static str,
    /// TEXT primary key column holding the `RecordId`.
    pub primary_key: &'static str,
    /// Nullable epoch-ms column marking soft deletion.
    pub deleted_column: &'static str,
    /// Optional epoch-ms column bumped on every write made by this crate.
    pub updated_column: Option<&'static str>,
    /// Columns selected when loading records, in `from_row` order.
    pub columns: &'static [&'static str],
    /// Outgoing and incoming relations with their cascade policy.
    pub relations: &'static [Relation],
}

impl EntityDef {
    /// Looks up a relation by field or accessor name.
    pub fn relation(&self, name: &str) -> Option<&'static Relation> {
        self.relations.iter().find(|relation| relation.name() == name)
    }

    /// Whether both descriptors name the same table.
    pub fn same_table(&self, other: &EntityDef) -> bool {
        self.table == other.table
    }

    /// Whether `column` is selected by this entity or stored by one of its
    /// owned one-to-one or foreign-key relations.
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.contains(&column)
            || self.relations.iter().any(|relation| match relation {
                Relation::OneToOne { column: owned, .. }
                | Relation::ForeignKey { column: owned, .. } => *owned == column,
                _ => false,
            })
    }
}

/// Record type that opts into soft deletion.
///
/// Implementations only map rows and expose the few fields the cascade
/// needs; all SQL is generated from [`SoftDeleteModel::entity`].
pub trait SoftDeleteModel: Sized {
    /// Static descriptor for this record type.
    fn entity() -> &'static EntityDef;

    /// Builds a record from a row selected with `entity().columns`.
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    /// Stable id of this record.
    fn id(&self) -> RecordId;

    /// Current in-memory deletion timestamp.
    fn deleted_at(&self) -> Option<i64>;

    /// Overwrites the in-memory deletion timestamp.
    fn set_deleted_at(&mut self, deleted_at: Option<i64>);

    /// Mirrors a write of the entity's `updated_column`; records that do not
    /// carry that column keep the default no-op.
    fn set_updated_at(&mut self, _updated_at: i64) {}

    /// Drops the cached value of the owned one-to-one `field` after the
    /// cascade nulled it in storage.
    fn clear_one_to_one(&mut self, _field: &str) {}

    /// Whether default queries would return this record.
    fn is_live(&self) -> bool {
        self.deleted_at().is_none()
    }
}

/// Reads a `RecordId` stored as TEXT from `column`.
pub fn record_id_from_row(row: &Row<'_>, column: &str) -> rusqlite::Result<RecordId> {
    let text: String = row.get(column)?;
    parse_record_id(row, column, &text)
}

/// Reads a nullable `RecordId` stored as TEXT from `column`.
pub fn optional_record_id_from_row(
    row: &Row<'_>,
    column: &str,
) -> rusqlite::Result<Option<RecordId>> {
    match row.get::<_, Option<String>>(column)? {
        Some(text) => parse_record_id(row, column, &text).map(Some),
        None => Ok(None),
    }
}

pub(crate) fn id_value(id: RecordId) -> Value {
    Value::Text(id.to_string())
}

fn parse_record_id(row: &Row<'_>, column: &str, text: &str) -> rusqlite::Result<RecordId> {
    Uuid::parse_str(text).map_err(|err| {
        let index = row.as_ref().column_index(column).unwrap_or_default();
        rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(err))
    })
}
