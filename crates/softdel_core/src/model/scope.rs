//! Visibility scopes over soft-deletable tables.

use serde::{Deserialize, Serialize};

/// Which records a query may return.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// `deleted_at IS NULL`. Default for every entry point.
    #[default]
    Live,
    /// `deleted_at IS NOT NULL`.
    Deleted,
    /// No deletion filter.
    All,
}

impl Scope {
    /// SQL predicate for `column`, or `None` when unfiltered.
    pub(crate) fn predicate(self, column: &str) -> Option<String> {
        match self {
            Self::Live => Some(format!("{column} IS NULL")),
            Self::Deleted => Some(format!("{column} IS NOT NULL")),
            Self::All => None,
        }
    }
}
