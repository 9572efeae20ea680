//! Command-line surface. Mirrors the teacher's `engine/arg_parser.rs` shape
//! (one flat `#[derive(Parser)]` struct feeding an `Opts`) but with the
//! duplicate-finder's option set instead of the indexer's.

use std::path::PathBuf;

use clap::Parser;

use crate::config::{HashingConsts, Opts, ReportFormat, SortBy};
use crate::hashing::HashAlgo;

#[derive(Parser, Debug)]
#[command(name = "dupcat", about = "Find byte-for-byte duplicate files under one or more directory trees")]
pub struct Cli {
    /// Directory to scan; repeatable.
    #[arg(required = true)]
    pub path: Vec<PathBuf>,

    /// Catalog database file (default: .dupcat.sqlite in the current directory).
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Strip this prefix from reported/stored paths.
    #[arg(long = "cut-path")]
    pub cut_path: Option<PathBuf>,

    /// Glob pattern to exclude by name or full path; repeatable.
    #[arg(long = "exclude-path")]
    pub exclude_path: Vec<PathBuf>,

    /// Skip files smaller than this many bytes.
    #[arg(long = "minimum-size", default_value_t = crate::config::DEFAULT_MINIMUM_SIZE)]
    pub minimum_size: u64,

    /// Digest algorithm used for round 1 and round 2.
    #[arg(long = "hash-function", value_enum, default_value_t = HashAlgo::Xxhash)]
    pub hash_function: HashAlgo,

    /// Output format for the final report.
    #[arg(long = "report-format", value_enum, default_value_t = ReportFormat::Text)]
    pub report_format: ReportFormat,

    /// Override the round-1 prefix block size (bytes); drive-type default otherwise.
    #[arg(long = "first-block-size")]
    pub first_block_size: Option<u64>,

    /// Number of first-blocks read during round 1.
    #[arg(long = "first-blocks", default_value_t = HashingConsts::DEFAULT_FIRST_BLOCKS)]
    pub first_blocks: usize,

    /// Round-2 streaming chunk size (bytes).
    #[arg(long = "block-size", default_value_t = HashingConsts::HASH_BLOCK_SIZE)]
    pub block_size: usize,

    /// Direct byte-compare chunk size (bytes).
    #[arg(long = "file-block-size", default_value_t = HashingConsts::FILECMP_BLOCK_SIZE)]
    pub file_block_size: usize,

    /// Force solid-state I/O ordering regardless of detection.
    #[arg(long)]
    pub ssd: bool,

    /// Force rotational I/O ordering regardless of detection.
    #[arg(long)]
    pub hdd: bool,

    /// Do not open or write a catalog database.
    #[arg(long)]
    pub nodb: bool,

    /// Emit a shell script of `rm` commands for each group's extra members instead of writing to the catalog.
    #[arg(long, alias = "hardlink")]
    pub link: bool,

    /// Record known-unique files in the catalog.
    #[arg(long)]
    pub uniques: bool,

    /// Never record known-unique files, even if previously enabled.
    #[arg(long = "no-unique")]
    pub no_unique: bool,

    /// Disable the 2-file direct-compare fast path.
    #[arg(long = "skip-two")]
    pub skip_two: bool,

    /// Disable the 3-file direct-compare fast path.
    #[arg(long = "skip-three")]
    pub skip_three: bool,

    /// Include dotfiles and dot-directories in the walk.
    #[arg(long)]
    pub hidden: bool,

    /// Treat multiple hardlinks to the same inode as a single candidate.
    #[arg(long = "hardlink-is-unique")]
    pub hardlink_is_unique: bool,

    /// Do not cross filesystem/device boundaries while walking.
    #[arg(long = "one-file-system")]
    pub one_file_system: bool,

    /// Write end-of-run counters to this file.
    #[arg(long = "stats-file")]
    pub stats_file: Option<PathBuf>,

    /// Memory ceiling for outstanding read buffers; accepts `M`/`G` suffixes.
    #[arg(long = "buffer-limit")]
    pub buffer_limit: Option<String>,

    /// Read-list ordering key when extent/inode ordering applies.
    #[arg(long = "sort-by", value_enum, default_value_t = SortBy::Block)]
    pub sort_by: SortBy,

    /// Suppress all but warnings.
    #[arg(short, long)]
    pub quiet: bool,

    /// Increase log verbosity; repeatable (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Set verbosity directly instead of repeating `-v`.
    #[arg(long = "verbose-level")]
    pub verbose_level: Option<u8>,

    /// In-record path separator byte used by the catalog's joined-paths column.
    #[arg(long, default_value_t = crate::config::DEFAULT_PATHSEP)]
    pub pathsep: u8,

    /// Use tiny fixed-size buffers regardless of detected drive type (test-only).
    #[arg(long = "x-small-buffers", hide = true)]
    pub x_small_buffers: bool,

    /// Reserved hook for test harnesses; no production effect.
    #[arg(long = "x-testing", hide = true)]
    pub x_testing: bool,
}

impl Cli {
    /// Build the immutable engine configuration from parsed arguments. The
    /// `.dupcat.toml` file layer (see `utils::config_file`) is applied by
    /// the caller before this, since file-vs-CLI precedence needs the raw
    /// clap matches to know which fields the user actually passed.
    pub fn into_opts(self) -> anyhow::Result<Opts> {
        let mut opts = Opts::default();
        opts.paths = self.path;
        opts.db_path = self.db;
        opts.cut_path = self.cut_path;
        opts.exclude_path = self.exclude_path;
        opts.minimum_size = self.minimum_size;
        opts.hash_function = self.hash_function;
        opts.report_format = self.report_format;
        opts.first_block_size = self.first_block_size;
        opts.first_blocks = self.first_blocks;
        opts.block_size = self.block_size;
        opts.file_block_size = self.file_block_size;
        opts.force_ssd = self.ssd;
        opts.force_hdd = self.hdd;
        opts.nodb = self.nodb;
        opts.emit_script = self.link;
        opts.save_uniques = self.uniques;
        opts.no_unique = self.no_unique;
        opts.skip_two = self.skip_two;
        opts.skip_three = self.skip_three;
        opts.hidden = self.hidden;
        opts.hardlink_is_unique = self.hardlink_is_unique;
        opts.one_file_system = self.one_file_system;
        opts.stats_file = self.stats_file;
        if let Some(raw) = self.buffer_limit {
            opts.buffer_limit = crate::config::parse_buffer_limit(&raw)?;
        }
        opts.sort_by = self.sort_by;
        opts.quiet = self.quiet;
        opts.verbose = self.verbose_level.unwrap_or(self.verbose);
        opts.pathsep = self.pathsep;
        Ok(opts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_invocation_parses() {
        let cli = Cli::parse_from(["dupcat", "/tmp"]);
        assert_eq!(cli.path, vec![PathBuf::from("/tmp")]);
        assert_eq!(cli.hash_function, HashAlgo::Xxhash);
        assert!(!cli.hidden);
    }

    #[test]
    fn repeated_verbose_flag_counts() {
        let cli = Cli::parse_from(["dupcat", "/tmp", "-vv"]);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn buffer_limit_suffix_is_applied_in_into_opts() {
        let cli = Cli::parse_from(["dupcat", "/tmp", "--buffer-limit", "512M"]);
        let opts = cli.into_opts().unwrap();
        assert_eq!(opts.buffer_limit, 512 * 1024 * 1024);
    }

    #[test]
    fn verbose_level_overrides_repeated_flag() {
        let cli = Cli::parse_from(["dupcat", "/tmp", "-v", "--verbose-level", "3"]);
        let opts = cli.into_opts().unwrap();
        assert_eq!(opts.verbose, 3);
    }
}
