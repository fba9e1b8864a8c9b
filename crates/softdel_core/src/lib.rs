//! Soft-deletion layer over SQLite.
//!
//! Records are marked deleted with a `deleted_at` timestamp instead of being
//! removed. Deleting a record cascades over the relations its entity
//! declares in a static registry: one-to-one links are nulled, reverse
//! foreign keys on related rows are nulled, and many-to-many memberships
//! are cleared or hidden according to their policy.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;

pub use db::{open_db, open_db_in_memory, DbError, DbResult, Migration};
pub use logging::{default_log_level, init_logging, logging_status, LogConfig, LogError};
pub use model::entity::{
    optional_record_id_from_row, record_id_from_row, EntityDef, RecordId, SoftDeleteModel,
};
pub use model::relation::{MembershipPolicy, Relation, RelationKind};
pub use model::scope::Scope;
pub use repo::cascade::CascadeReport;
pub use repo::query::Query;
pub use repo::soft_delete_repo::{SoftDeleteRepository, SqliteSoftDeleteRepository};
pub use repo::{now_epoch_ms, RepoError, RepoResult};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
