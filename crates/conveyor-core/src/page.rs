//! Pagination cursors for version history.

use serde::{Deserialize, Serialize};

use crate::EntityId;

/// A page request over a resource's version history, ordered by
/// `check_order` descending.
///
/// At most one of `since`/`until`/`from`/`to` should be set; when several
/// are, `until` wins over `since`, which wins over `to`, then `from`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Versions strictly older than this row.
    pub since: Option<EntityId>,
    /// Versions strictly newer than this row.
    pub until: Option<EntityId>,
    /// This row and older.
    pub from: Option<EntityId>,
    /// This row and newer.
    pub to: Option<EntityId>,
    pub limit: i64,
}

impl Page {
    /// An unanchored page starting from the newest version.
    pub fn first(limit: i64) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }
}

/// Cursors for the neighboring pages. An absent cursor signals a true
/// boundary of the version history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub previous: Option<Page>,
    pub next: Option<Page>,
}
