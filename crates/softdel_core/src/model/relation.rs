//! Relation descriptors and cascade policy.
//!
//! Each entity lists both the links it stores itself (`OneToOne`,
//! `ForeignKey`, `ManyToMany`) and the links other entities store towards
//! it (`Reverse*`). The cascade walks this list; nothing is discovered at
//! runtime.

use crate::model::entity::EntityDef;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};

/// What happens to join-table rows when one side is soft-deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipPolicy {
    /// Delete every membership row of the deleted record. On a
    /// self-referencing join table both columns are matched.
    Clear,
    /// Keep membership rows; the record only drops out of live views.
    Retain,
}

/// Cardinality of a relation, independent of direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    OneToOne,
    ManyToOne,
    OneToMany,
    ManyToMany,
}

/// One declared relation of an entity.
pub enum Relation {
    /// Nullable one-to-one column on this entity's table.
    OneToOne {
        field: &'static str,
        column: &'static str,
        target: &'static EntityDef,
    },
    /// Nullable many-to-one column on this entity's table. Left untouched
    /// when this record is deleted.
    ForeignKey {
        field: &'static str,
        column: &'static str,
        target: &'static EntityDef,
    },
    /// Join table owned by this entity. `source_column` points at this
    /// entity, `target_column` at `target`.
    ManyToMany {
        field: &'static str,
        through: &'static str,
        source_column: &'static str,
        target_column: &'static str,
        target: &'static EntityDef,
        on_delete: MembershipPolicy,
    },
    /// `related.column` is a one-to-one pointing at this entity.
    ReverseOneToOne {
        accessor: &'static str,
        related: &'static EntityDef,
        column: &'static str,
    },
    /// `related.column` is a foreign key pointing at this entity.
    ReverseForeignKey {
        accessor: &'static str,
        related: &'static EntityDef,
        column: &'static str,
    },
    /// Other side of a join table. `source_column` points at this entity,
    /// `target_column` at `related`.
    ReverseManyToMany {
        accessor: &'static str,
        through: &'static str,
        source_column: &'static str,
        target_column: &'static str,
        related: &'static EntityDef,
        on_delete: MembershipPolicy,
    },
}

impl Relation {
    /// Field name for owned relations, accessor name for reverse ones.
    pub fn name(&self) -> &'static str {
        match self {
            Self::OneToOne { field, .. }
            | Self::ForeignKey { field, .. }
            | Self::ManyToMany { field, .. } => field,
            Self::ReverseOneToOne { accessor, .. }
            | Self::ReverseForeignKey { accessor, .. }
            | Self::ReverseManyToMany { accessor, .. } => accessor,
        }
    }

    pub fn kind(&self) -> RelationKind {
        match self {
            Self::OneToOne { .. } | Self::ReverseOneToOne { .. } => RelationKind::OneToOne,
            Self::ForeignKey { .. } => RelationKind::ManyToOne,
            Self::ReverseForeignKey { .. } => RelationKind::OneToMany,
            Self::ManyToMany { .. } | Self::ReverseManyToMany { .. } => RelationKind::ManyToMany,
        }
    }

    /// Entity reached by following this relation.
    pub fn target(&self) -> &'static EntityDef {
        match self {
            Self::OneToOne { target, .. }
            | Self::ForeignKey { target, .. }
            | Self::ManyToMany { target, .. } => target,
            Self::ReverseOneToOne { related, .. }
            | Self::ReverseForeignKey { related, .. }
            | Self::ReverseManyToMany { related, .. } => related,
        }
    }

    /// Whether the link is stored on another entity's table.
    pub fn is_reverse(&self) -> bool {
        matches!(
            self,
            Self::ReverseOneToOne { .. }
                | Self::ReverseForeignKey { .. }
                | Self::ReverseManyToMany { .. }
        )
    }
}

// Entities reference each other, so print the target table instead of
// recursing into its descriptor.
impl Debug for Relation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relation")
            .field("name", &self.name())
            .field("kind", &self.kind())
            .field("reverse", &self.is_reverse())
            .field("target", &self.target().table)
            .finish()
    }
}
