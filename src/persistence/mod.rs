//! Persistence adapter contract (spec §6.2, §6.3). Method shapes are
//! cross-checked against `original_source/src/dbops.h`
//! (`duplicate_to_db`, `delete_duplicate_entry`, `unique_to_db`,
//! `is_known_unique`).

mod sqlite;

pub use sqlite::SqliteCatalog;

use anyhow::Result;

/// One published duplicate group.
pub struct DuplicateGroup {
    pub count: usize,
    pub each_size: u64,
    /// Full paths, to be joined with the configured path separator on write.
    pub paths: Vec<String>,
}

/// Three primitives plus transaction control (spec §6.3). A single
/// process-wide write lock serializes writes; the concrete implementation
/// ([`SqliteCatalog`]) holds that lock internally so callers never need to
/// coordinate it themselves.
pub trait CatalogAdapter {
    fn open(&mut self) -> Result<()>;
    fn close(&mut self) -> Result<()>;
    fn begin_transaction(&mut self) -> Result<()>;
    fn commit_transaction(&mut self) -> Result<()>;

    fn insert_duplicate_group(&mut self, group: &DuplicateGroup) -> Result<i64>;
    fn insert_unique(&mut self, path: &str, tag: &str) -> Result<()>;
    fn delete_duplicate_by_id(&mut self, id: i64) -> Result<()>;

    /// Optional fast lookup for "known unique" accounting (spec §4.9).
    fn is_known_unique(&self, path: &str) -> Result<bool>;
}
