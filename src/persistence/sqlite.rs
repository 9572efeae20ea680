//! SQLite-backed catalog. Schema/WAL/open pattern generalized from the
//! teacher's `engine/db_ops/{mod.rs,connection.rs}`; meta/duplicates/uniques
//! tables follow spec §6.2.

use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use rusqlite::Connection;

use super::{CatalogAdapter, DuplicateGroup};
use crate::config::Opts;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS duplicates (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    count INTEGER NOT NULL,
    each_size INTEGER NOT NULL,
    paths TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS uniques (
    path TEXT PRIMARY KEY,
    debug_tag TEXT
);
CREATE TABLE IF NOT EXISTS diskinfo (
    root_path TEXT PRIMARY KEY,
    data TEXT NOT NULL
);
"#;

const WAL_PRAGMAS: &str = r#"
PRAGMA synchronous = NORMAL;
PRAGMA wal_autocheckpoint = 10000;
"#;

/// SQLite catalog. `write_lock` is the single process-wide write lock spec
/// §5/§6.3 requires; every mutating method takes it for its duration.
pub struct SqliteCatalog {
    path: std::path::PathBuf,
    conn: Option<Connection>,
    pathsep: u8,
    write_lock: Mutex<()>,
}

impl SqliteCatalog {
    pub fn new(path: &Path, pathsep: u8) -> Self {
        SqliteCatalog {
            path: path.to_path_buf(),
            conn: None,
            pathsep,
            write_lock: Mutex::new(()),
        }
    }

    fn conn(&self) -> Result<&Connection> {
        self.conn
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("catalog not open"))
    }

    /// Join paths with the configured in-record separator (spec §6.2).
    fn join_paths(&self, paths: &[String]) -> String {
        let sep = self.pathsep as char;
        paths.join(&sep.to_string())
    }

    /// Access to the in-memory-cache-equivalent `diskinfo` table, reused by
    /// `disk_detect::probe` for network-mount performance caching.
    pub fn connection_for_disk_detect(&self) -> Result<&Connection> {
        self.conn()
    }

    fn meta_get(&self, key: &str) -> Result<Option<String>> {
        self.conn()?
            .query_row("SELECT value FROM meta WHERE key = ?1", [key], |row| row.get(0))
            .optional()
            .context("query meta")
    }

    fn meta_set(&self, key: &str, value: &str) -> Result<()> {
        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO meta (key, value) VALUES (?1, ?2)",
                rusqlite::params![key, value],
            )
            .context("write meta")?;
        Ok(())
    }

    /// Write the catalog's meta record once at creation, or validate it
    /// against this run on reopen (spec §6.2): warn on a version mismatch,
    /// refuse a disagreement over hardlink policy outright.
    pub fn init_meta(&mut self, opts: &Opts) -> Result<()> {
        let hardlinks = if opts.hardlink_is_unique { "ignore" } else { "normal" };
        match self.meta_get("version")? {
            None => {
                let created_at = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_millis()
                    .to_string();
                self.meta_set("hidden", &opts.hidden.to_string())?;
                self.meta_set("version", env!("CARGO_PKG_VERSION"))?;
                self.meta_set("created-at", &created_at)?;
                self.meta_set("hardlinks", hardlinks)?;
            }
            Some(existing_version) => {
                if existing_version != env!("CARGO_PKG_VERSION") {
                    log::warn!(
                        "catalog {} was created by dupcat {existing_version}, this is {}",
                        self.path.display(),
                        env!("CARGO_PKG_VERSION")
                    );
                }
                if let Some(existing_hardlinks) = self.meta_get("hardlinks")? {
                    if existing_hardlinks != hardlinks {
                        anyhow::bail!(
                            "catalog {} was built with hardlink policy {existing_hardlinks:?}, this run requests {hardlinks:?}; refusing to mix",
                            self.path.display()
                        );
                    }
                }
            }
        }
        Ok(())
    }
}

impl CatalogAdapter for SqliteCatalog {
    fn open(&mut self) -> Result<()> {
        let conn = Connection::open(&self.path)
            .with_context(|| format!("open catalog at {}", self.path.display()))?;
        conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))
            .context("enable WAL")?;
        conn.execute_batch(WAL_PRAGMAS).context("set WAL pragmas")?;
        conn.execute_batch(SCHEMA).context("create schema")?;
        self.conn = Some(conn);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.conn = None;
        Ok(())
    }

    fn begin_transaction(&mut self) -> Result<()> {
        self.conn()?
            .execute_batch("BEGIN")
            .context("begin transaction")
    }

    fn commit_transaction(&mut self) -> Result<()> {
        self.conn()?
            .execute_batch("COMMIT")
            .context("commit transaction")
    }

    fn insert_duplicate_group(&mut self, group: &DuplicateGroup) -> Result<i64> {
        let _guard = self.write_lock.lock().unwrap();
        let joined = self.join_paths(&group.paths);
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO duplicates (count, each_size, paths) VALUES (?1, ?2, ?3)",
            rusqlite::params![group.count as i64, group.each_size as i64, joined],
        )
        .context("insert duplicate group")?;
        Ok(conn.last_insert_rowid())
    }

    fn insert_unique(&mut self, path: &str, tag: &str) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap();
        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO uniques (path, debug_tag) VALUES (?1, ?2)",
                rusqlite::params![path, tag],
            )
            .context("insert unique")?;
        Ok(())
    }

    fn delete_duplicate_by_id(&mut self, id: i64) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap();
        self.conn()?
            .execute("DELETE FROM duplicates WHERE id = ?1", [id])
            .context("delete duplicate by id")?;
        Ok(())
    }

    fn is_known_unique(&self, path: &str) -> Result<bool> {
        let conn = self.conn()?;
        let exists = conn
            .query_row(
                "SELECT 1 FROM uniques WHERE path = ?1",
                [path],
                |_| Ok(()),
            )
            .optional()
            .context("query uniques")?
            .is_some();
        Ok(exists)
    }
}

use rusqlite::OptionalExtension;
