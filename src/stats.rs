//! Counters and end-of-run diagnostics (spec §5 "Shared resources" counter
//! lock; supplemented from the original's `stats.c`, see SPEC_FULL.md §10).

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};

/// Coarse, infrequently-updated counters, one atomic per field rather than a
/// single mutex-guarded struct — updates are rare relative to I/O so there's
/// no contention to economize on, but each field still needs to be visible
/// across reader/hasher threads without a data race.
#[derive(Default)]
pub struct Counters {
    pub files_seen: AtomicU64,
    pub files_ignored: AtomicU64,
    pub files_errored: AtomicU64,
    pub bytes_read: AtomicU64,
    pub buffers_allocated: AtomicU64,
    pub duplicate_groups: AtomicU64,
    pub duplicate_files: AtomicU64,
    pub uniques_recorded: AtomicU64,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_bytes_read(&self, n: u64) {
        self.bytes_read.fetch_add(n, Ordering::Relaxed);
    }

    pub fn inc_files_seen(&self) {
        self.files_seen.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_files_ignored(&self) {
        self.files_ignored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_files_errored(&self) {
        self.files_errored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_duplicate_group(&self, member_count: u64) {
        self.duplicate_groups.fetch_add(1, Ordering::Relaxed);
        self.duplicate_files.fetch_add(member_count, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            files_seen: self.files_seen.load(Ordering::Relaxed),
            files_ignored: self.files_ignored.load(Ordering::Relaxed),
            files_errored: self.files_errored.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            buffers_allocated: self.buffers_allocated.load(Ordering::Relaxed),
            duplicate_groups: self.duplicate_groups.load(Ordering::Relaxed),
            duplicate_files: self.duplicate_files.load(Ordering::Relaxed),
            uniques_recorded: self.uniques_recorded.load(Ordering::Relaxed),
        }
    }

    /// Write a human-readable dump to `path` (CLI `stats-file` option).
    pub fn dump_to_file(&self, path: &Path) -> Result<()> {
        let snap = self.snapshot();
        let body = format!(
            "files_seen={}\nfiles_ignored={}\nfiles_errored={}\nbytes_read={}\n\
             buffers_allocated={}\nduplicate_groups={}\nduplicate_files={}\nuniques_recorded={}\n",
            snap.files_seen,
            snap.files_ignored,
            snap.files_errored,
            snap.bytes_read,
            snap.buffers_allocated,
            snap.duplicate_groups,
            snap.duplicate_files,
            snap.uniques_recorded,
        );
        std::fs::write(path, body).with_context(|| format!("write stats file {}", path.display()))
    }
}

struct CountersSnapshot {
    files_seen: u64,
    files_ignored: u64,
    files_errored: u64,
    bytes_read: u64,
    buffers_allocated: u64,
    duplicate_groups: u64,
    duplicate_files: u64,
    uniques_recorded: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_group_updates_both_counters() {
        let c = Counters::new();
        c.inc_duplicate_group(3);
        assert_eq!(c.duplicate_groups.load(Ordering::Relaxed), 1);
        assert_eq!(c.duplicate_files.load(Ordering::Relaxed), 3);
    }
}
