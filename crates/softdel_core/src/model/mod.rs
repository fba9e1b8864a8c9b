//! Static entity and relation registry.
//!
//! # Responsibility
//! - Describe soft-deletable tables and the relations between them.
//! - Define the contract record types implement to take part in cascades.
//!
//! # Invariants
//! - Every soft-deletable record is identified by a stable `RecordId`.
//! - Deletion is represented by a `deleted_at` timestamp, never a hard delete.
//! - Relation metadata is declared once in `static` items and never mutated.

pub mod entity;
pub mod relation;
pub mod scope;
