//! Application configuration: tunables in one place, plus the immutable
//! `Opts` struct threaded through the engine (spec §9 "Global mutable state").

use std::path::PathBuf;
use std::sync::OnceLock;

use crate::disk_detect::DriveType;
use crate::hashing::HashAlgo;

// ---- Package / paths ----

/// Package-derived paths: built once from `CARGO_PKG_NAME`, then cached.
pub struct PackagePaths {
    pkg_name: &'static str,
    probe_dir_name: String,
}

static PACKAGE_PATHS: OnceLock<PackagePaths> = OnceLock::new();

impl PackagePaths {
    pub fn get() -> &'static PackagePaths {
        PACKAGE_PATHS.get_or_init(|| {
            let pkg = env!("CARGO_PKG_NAME");
            PackagePaths {
                pkg_name: pkg,
                probe_dir_name: format!(".{pkg}_probe"),
            }
        })
    }

    pub fn pkg_name(&self) -> &str {
        self.pkg_name
    }

    pub fn probe_dir_name(&self) -> &str {
        &self.probe_dir_name
    }

    /// Default catalog filename when `--db` is not given.
    pub fn default_catalog_filename(&self) -> String {
        format!(".{}.sqlite", self.pkg_name)
    }
}

// ---- Worker threads ----

#[derive(Clone, Copy, Debug)]
pub struct WorkerThreadLimits {
    pub hdd_max: usize,
    pub floor: usize,
    pub unknown_max: usize,
    pub network_max: usize,
}

impl Default for WorkerThreadLimits {
    fn default() -> Self {
        Self {
            hdd_max: Self::HDD_THREADS,
            floor: Self::FLOOR_THREADS,
            unknown_max: Self::UNKNOWN_MAX_THREADS,
            network_max: Self::NETWORK_MAX_THREADS,
        }
    }
}

impl WorkerThreadLimits {
    pub const HDD_THREADS: usize = 4;
    pub const FLOOR_THREADS: usize = 2;
    pub const UNKNOWN_MAX_THREADS: usize = 8;
    pub const NETWORK_MAX_THREADS: usize = 12;
}

// ---- Hashing / prefix window (defaults from original_source/src/main.c) ----

pub struct HashingConsts;

impl HashingConsts {
    /// Default `first-blocks`: number of first-blocks read in round 1.
    pub const DEFAULT_FIRST_BLOCKS: usize = 16;
    /// Default `first-block-size` on rotational media (bytes).
    pub const DEFAULT_FIRST_BLOCK_SIZE_HDD: u64 = 128 * 1024;
    /// Default `first-block-size` on solid-state media (bytes).
    pub const DEFAULT_FIRST_BLOCK_SIZE_SSD: u64 = 16 * 1024;
    /// Chunked-read block size used by round 2's streaming reader (bytes).
    pub const HASH_BLOCK_SIZE: usize = 8192;
    /// Round-2 working buffer per entry (bytes); see spec §4.6.
    pub const ROUND2_BUFFER_SIZE: usize = 256 * 1024;
    /// Direct byte-compare chunk size (spec §4.7 `filecmp_block_size`).
    pub const FILECMP_BLOCK_SIZE: usize = 131_072;
    /// File size above which round-1/round-2 reads prefer memory-mapped I/O.
    pub const HASH_MMAP_THRESHOLD: u64 = 100 * 1024 * 1024;
    /// At most this many open files across all live round2_info buffers (spec §5).
    pub const MAX_OPEN_FILES: usize = 4;
    /// Number of round-1 hasher threads; fixed regardless of core count
    /// (spec §9 Open Questions: left as a policy choice, not implemented as
    /// CPU-scaled).
    pub const ROUND1_HASHER_COUNT: usize = 2;

    pub fn first_block_size(drive_type: DriveType) -> u64 {
        if drive_type.is_hdd() {
            Self::DEFAULT_FIRST_BLOCK_SIZE_HDD
        } else {
            Self::DEFAULT_FIRST_BLOCK_SIZE_SSD
        }
    }
}

/// `first-block-size * first-blocks`: the most a round-1 read will ever
/// consume from one file (spec GLOSSARY "Prefix window").
pub fn prefix_window(first_block_size: u64, first_blocks: usize) -> u64 {
    first_block_size * first_blocks as u64
}

// ---- Read-list band thresholds (spec §4.4) ----

pub struct ReadListConsts;

impl ReadListConsts {
    /// Sets above this member count are emitted one-set-at-a-time (bands 3/5).
    pub const LARGE_SET_THRESHOLD: usize = 512;
    /// Sets above this member count move from band 4 to band 5.
    pub const LARGE_SET_THRESHOLD_BIG_FILES: usize = 8;
}

/// Extent-ordering fallback threshold (spec I6, §4.4): disable extent
/// ordering once strictly more than 5% of >=100 observed files report a
/// zero physical block. See DESIGN.md Open Question #2 for the boundary
/// choice.
pub fn extent_fallback_triggered(zero_count: usize, total_count: usize) -> bool {
    total_count >= 100 && zero_count * 20 > total_count
}

// ---- Buffer limit (memory ceiling, spec §5) ----

/// Fraction of detected system RAM used as the default memory ceiling.
pub const BUFFER_LIMIT_RAM_FRACTION: f64 = 0.6;
/// Floor for the memory ceiling regardless of detected RAM.
pub const BUFFER_LIMIT_FLOOR: u64 = 4 * 1024 * 1024;

/// Detect total system RAM and apply the default ≈60%-of-RAM / 4 MiB floor
/// rule (spec §5; confirmed against `original_source/src/main.c`).
pub fn default_buffer_limit() -> u64 {
    use sysinfo::System;
    let mut sys = System::new();
    sys.refresh_memory();
    let total_bytes = sys.total_memory();
    let scaled = (total_bytes as f64 * BUFFER_LIMIT_RAM_FRACTION) as u64;
    scaled.max(BUFFER_LIMIT_FLOOR)
}

/// Parse a buffer-limit string with optional `M`/`G` suffix (e.g. `"512M"`,
/// `"2G"`, or a bare byte count).
pub fn parse_buffer_limit(s: &str) -> anyhow::Result<u64> {
    let s = s.trim();
    let (num, mult) = if let Some(prefix) = s.strip_suffix(['G', 'g']) {
        (prefix, 1024 * 1024 * 1024)
    } else if let Some(prefix) = s.strip_suffix(['M', 'm']) {
        (prefix, 1024 * 1024)
    } else {
        (s, 1)
    };
    let value: u64 = num
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid buffer-limit: {s:?}"))?;
    Ok(value * mult)
}

// ---- Minimum size, record separator ----

/// Files smaller than this are skipped entirely (spec §4.2, CLI `minimum-size`).
pub const DEFAULT_MINIMUM_SIZE: u64 = 1;

/// Default in-record path separator byte (spec §6.1 `pathsep`, default U+001C).
pub const DEFAULT_PATHSEP: u8 = 0x1C;

// ---- Report format / sort-by (CLI enums, spec §6.1) ----

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum ReportFormat {
    Text,
    Csv,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum SortBy {
    Inode,
    Block,
    None,
}

// ---- Opts: immutable engine configuration, built once at startup ----

#[derive(Clone, Debug)]
pub struct Opts {
    pub paths: Vec<PathBuf>,
    pub db_path: Option<PathBuf>,
    pub cut_path: Option<PathBuf>,
    pub exclude_path: Vec<PathBuf>,
    pub minimum_size: u64,
    pub hash_function: HashAlgo,
    pub report_format: ReportFormat,
    pub first_block_size: Option<u64>,
    pub first_blocks: usize,
    pub block_size: usize,
    pub file_block_size: usize,
    pub force_ssd: bool,
    pub force_hdd: bool,
    pub nodb: bool,
    pub emit_script: bool,
    pub save_uniques: bool,
    pub no_unique: bool,
    pub skip_two: bool,
    pub skip_three: bool,
    pub hidden: bool,
    pub hardlink_is_unique: bool,
    pub one_file_system: bool,
    pub stats_file: Option<PathBuf>,
    pub buffer_limit: u64,
    pub sort_by: SortBy,
    pub quiet: bool,
    pub verbose: u8,
    pub pathsep: u8,
}

impl Default for Opts {
    fn default() -> Self {
        Opts {
            paths: Vec::new(),
            db_path: None,
            cut_path: None,
            exclude_path: Vec::new(),
            minimum_size: DEFAULT_MINIMUM_SIZE,
            hash_function: HashAlgo::Xxhash,
            report_format: ReportFormat::Text,
            first_block_size: None,
            first_blocks: HashingConsts::DEFAULT_FIRST_BLOCKS,
            block_size: HashingConsts::HASH_BLOCK_SIZE,
            file_block_size: HashingConsts::FILECMP_BLOCK_SIZE,
            force_ssd: false,
            force_hdd: false,
            nodb: false,
            emit_script: false,
            save_uniques: false,
            no_unique: false,
            skip_two: false,
            skip_three: false,
            hidden: false,
            hardlink_is_unique: false,
            one_file_system: false,
            stats_file: None,
            buffer_limit: default_buffer_limit(),
            sort_by: SortBy::Block,
            quiet: false,
            verbose: 0,
            pathsep: DEFAULT_PATHSEP,
        }
    }
}

impl Opts {
    /// Resolve the effective first-block-size: explicit CLI override, else
    /// the drive-type default.
    pub fn effective_first_block_size(&self, drive_type: DriveType) -> u64 {
        self.first_block_size
            .unwrap_or_else(|| HashingConsts::first_block_size(drive_type))
    }

    pub fn prefix_window(&self, drive_type: DriveType) -> u64 {
        prefix_window(self.effective_first_block_size(drive_type), self.first_blocks)
    }

    /// Exclude globs as strings, for the walker's name/path matching.
    pub fn exclude_patterns(&self) -> Vec<String> {
        self.exclude_path
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_buffer_limit_suffixes() {
        assert_eq!(parse_buffer_limit("512M").unwrap(), 512 * 1024 * 1024);
        assert_eq!(parse_buffer_limit("2G").unwrap(), 2 * 1024 * 1024 * 1024);
        assert_eq!(parse_buffer_limit("1024").unwrap(), 1024);
    }

    #[test]
    fn extent_fallback_respects_threshold_boundary() {
        assert!(!extent_fallback_triggered(5, 100)); // exactly 5%, stays on extent order
        assert!(extent_fallback_triggered(6, 100));
        assert!(!extent_fallback_triggered(50, 99)); // below the 100-file minimum
    }
}
