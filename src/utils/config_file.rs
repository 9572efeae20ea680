//! Load `.dupcat.toml` from a directory (CLI only; the library entry point
//! takes a fully-built `Opts` and never touches the filesystem for config).
//! Mirrors the teacher's `nefaxer_toml.rs` two-layer precedence: file values
//! fill in defaults, then the CLI's explicitly-passed flags override them.

use serde::Deserialize;
use std::path::Path;

use crate::config::{Opts, ReportFormat, SortBy};
use crate::hashing::HashAlgo;

#[derive(Debug, Default, Deserialize)]
pub struct DupcatToml {
    #[serde(default)]
    settings: SettingsSection,
}

#[derive(Debug, Default, Deserialize)]
struct SettingsSection {
    db: Option<String>,
    minimum_size: Option<u64>,
    hash_function: Option<String>,
    report_format: Option<String>,
    first_block_size: Option<u64>,
    first_blocks: Option<usize>,
    block_size: Option<usize>,
    file_block_size: Option<usize>,
    nodb: Option<bool>,
    uniques: Option<bool>,
    skip_two: Option<bool>,
    skip_three: Option<bool>,
    hidden: Option<bool>,
    hardlink_is_unique: Option<bool>,
    one_file_system: Option<bool>,
    buffer_limit: Option<String>,
    sort_by: Option<String>,
    quiet: Option<bool>,
    verbose: Option<u8>,
}

/// Load `.dupcat.toml` from `dir` if present. Returns `None` if the file is
/// missing or unreadable; a warning is logged on a parse error.
pub fn load_dupcat_toml(dir: &Path) -> Option<DupcatToml> {
    let path = dir.join(".dupcat.toml");
    let s = std::fs::read_to_string(&path).ok()?;
    toml::from_str(&s)
        .map_err(|e| log::warn!("{}: {}", path.display(), e))
        .ok()
}

fn parse_hash_function(s: &str) -> Option<HashAlgo> {
    match s.to_ascii_lowercase().as_str() {
        "xxhash" | "xxh3" => Some(HashAlgo::Xxhash),
        "md5" => Some(HashAlgo::Md5),
        "sha1" => Some(HashAlgo::Sha1),
        "sha512" => Some(HashAlgo::Sha512),
        _ => None,
    }
}

fn parse_report_format(s: &str) -> Option<ReportFormat> {
    match s.to_ascii_lowercase().as_str() {
        "text" => Some(ReportFormat::Text),
        "csv" => Some(ReportFormat::Csv),
        "json" => Some(ReportFormat::Json),
        _ => None,
    }
}

fn parse_sort_by(s: &str) -> Option<SortBy> {
    match s.to_ascii_lowercase().as_str() {
        "inode" => Some(SortBy::Inode),
        "block" => Some(SortBy::Block),
        "none" => Some(SortBy::None),
        _ => None,
    }
}

/// Overwrite `opts` fields from the file layer. Only fields present in the
/// file are touched; the CLI layer is applied by the caller afterward so
/// explicit flags always win.
pub fn apply_file_to_opts(file: &DupcatToml, opts: &mut Opts) {
    let s = &file.settings;
    if let Some(ref p) = s.db {
        opts.db_path = Some(std::path::PathBuf::from(p));
    }
    if let Some(v) = s.minimum_size {
        opts.minimum_size = v;
    }
    if let Some(ref v) = s.hash_function {
        if let Some(algo) = parse_hash_function(v) {
            opts.hash_function = algo;
        } else {
            log::warn!(".dupcat.toml: unknown hash_function {v:?}, ignoring");
        }
    }
    if let Some(ref v) = s.report_format {
        if let Some(fmt) = parse_report_format(v) {
            opts.report_format = fmt;
        } else {
            log::warn!(".dupcat.toml: unknown report_format {v:?}, ignoring");
        }
    }
    if let Some(v) = s.first_block_size {
        opts.first_block_size = Some(v);
    }
    if let Some(v) = s.first_blocks {
        opts.first_blocks = v;
    }
    if let Some(v) = s.block_size {
        opts.block_size = v;
    }
    if let Some(v) = s.file_block_size {
        opts.file_block_size = v;
    }
    if let Some(v) = s.nodb {
        opts.nodb = v;
    }
    if let Some(v) = s.uniques {
        opts.save_uniques = v;
    }
    if let Some(v) = s.skip_two {
        opts.skip_two = v;
    }
    if let Some(v) = s.skip_three {
        opts.skip_three = v;
    }
    if let Some(v) = s.hidden {
        opts.hidden = v;
    }
    if let Some(v) = s.hardlink_is_unique {
        opts.hardlink_is_unique = v;
    }
    if let Some(v) = s.one_file_system {
        opts.one_file_system = v;
    }
    if let Some(ref v) = s.buffer_limit {
        match crate::config::parse_buffer_limit(v) {
            Ok(n) => opts.buffer_limit = n,
            Err(e) => log::warn!(".dupcat.toml: {e}"),
        }
    }
    if let Some(ref v) = s.sort_by {
        if let Some(sb) = parse_sort_by(v) {
            opts.sort_by = sb;
        } else {
            log::warn!(".dupcat.toml: unknown sort_by {v:?}, ignoring");
        }
    }
    if let Some(v) = s.quiet {
        opts.quiet = v;
    }
    if let Some(v) = s.verbose {
        opts.verbose = v;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn loads_and_applies_partial_file() {
        let dir = std::env::temp_dir().join(format!("dupcat-cfgtest-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join(".dupcat.toml"),
            "[settings]\nminimum_size = 4096\nhash_function = \"sha512\"\n",
        )
        .unwrap();

        let file = load_dupcat_toml(&dir).expect("file should parse");
        let mut opts = Opts::default();
        apply_file_to_opts(&file, &mut opts);
        assert_eq!(opts.minimum_size, 4096);
        assert_eq!(opts.hash_function, HashAlgo::Sha512);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_file_returns_none() {
        let dir = std::env::temp_dir().join(format!("dupcat-cfgtest-missing-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        assert!(load_dupcat_toml(&dir).is_none());
        fs::remove_dir_all(&dir).ok();
    }
}
