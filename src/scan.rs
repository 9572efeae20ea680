//! Directory walker (spec §4.1). A single thread maintains an explicit LIFO
//! stack of directories — no recursion, no parallel walk — and sends each
//! regular file it finds across a bounded channel to the size-index worker,
//! which is the arena's sole writer until the scan completes (spec §5,
//! §9 "Global mutable state").
//!
//! Filtering (dotfiles, exclude globs) is generalized from the teacher's
//! `engine/tools.rs::{is_os_hidden_file, should_include_in_walk, glob_match}`.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;

use anyhow::{Context, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, warn};

use crate::config::Opts;
use crate::stats::Counters;

/// One regular file discovered by the walker, not yet arena-allocated.
pub struct ScannedFile {
    /// Path of the containing directory, relative to the scan root.
    pub rel_dir: PathBuf,
    pub filename: Box<str>,
    pub size: u64,
    pub dev_ino: Option<(u64, u64)>,
}

/// How many pending [`ScannedFile`]s the channel holds before the walker
/// blocks. Any correctly-blocking bounded channel suffices here (spec §9
/// Design Notes); this is not a literal port of the original's buffer count.
const SCAN_CHANNEL_CAP: usize = 256;

pub struct ScanStats {
    pub dirs_visited: usize,
    pub files_sent: usize,
}

/// Known OS-junk filenames skipped unconditionally, independent of the
/// dotfile policy (teacher's `is_os_hidden_file`).
fn is_os_junk_file(name: &str) -> bool {
    matches!(
        name,
        "Thumbs.db" | "ehthumbs.db" | "Desktop.ini" | "$RECYCLE.BIN" | ".DS_Store"
            | ".AppleDouble" | ".LSOverride" | ".directory"
    ) || name.starts_with("._")
}

/// Minimal glob: `*` and `?`, same semantics as the teacher's `glob_match`.
fn glob_match(pattern: &str, text: &str) -> bool {
    fn rec(p: &[char], t: &[char]) -> bool {
        match p.first() {
            None => t.is_empty(),
            Some('*') => {
                if p.len() == 1 {
                    return true;
                }
                (0..=t.len()).any(|i| rec(&p[1..], &t[i..]))
            }
            Some('?') => !t.is_empty() && rec(&p[1..], &t[1..]),
            Some(&c) => t.first() == Some(&c) && rec(&p[1..], &t[1..]),
        }
    }
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    rec(&p, &t)
}

fn matches_any_exclude(name: &str, path_str: &str, patterns: &[String]) -> bool {
    patterns
        .iter()
        .any(|pat| glob_match(pat, name) || glob_match(pat, path_str))
}

#[cfg(unix)]
fn dev_ino(meta: &fs::Metadata) -> (u64, (u64, u64)) {
    use std::os::unix::fs::MetadataExt;
    (meta.dev(), (meta.dev(), meta.ino()))
}

#[cfg(not(unix))]
fn dev_ino(_meta: &fs::Metadata) -> (u64, (u64, u64)) {
    (0, (0, 0))
}

struct PendingDir {
    abs: PathBuf,
    rel: PathBuf,
    device: u64,
}

/// Walk one root's subtree, feeding discovered files to `tx`. Directories
/// are pushed onto an explicit stack (`pending`) rather than recursed into,
/// per spec §4.1; a directory is only pushed if `opts.one_file_system` is
/// off or it shares the root's device.
fn walk_root(
    root: &Path,
    opts: &Opts,
    tx: &Sender<ScannedFile>,
    counters: &Counters,
    stats: &mut ScanStats,
) -> Result<()> {
    let root_meta = fs::metadata(root).with_context(|| format!("stat {}", root.display()))?;
    let (root_device, _) = dev_ino(&root_meta);

    // The top node's "relative" path is the whole root path as one opaque
    // component, so `DirTree::materialize` reproduces the real absolute path
    // without the tree needing to know about filesystem roots at all.
    let mut pending = vec![PendingDir {
        abs: root.to_path_buf(),
        rel: root.to_path_buf(),
        device: root_device,
    }];

    while let Some(dir) = pending.pop() {
        stats.dirs_visited += 1;
        let read_dir = match fs::read_dir(&dir.abs) {
            Ok(rd) => rd,
            Err(e) => {
                counters.inc_files_errored();
                warn!("skipping unreadable directory {}: {e}", dir.abs.display());
                continue;
            }
        };

        for entry in read_dir {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    counters.inc_files_errored();
                    warn!("skipping unreadable entry in {}: {e}", dir.abs.display());
                    continue;
                }
            };
            let name = entry.file_name();
            let name_str = match name.to_str() {
                Some(n) => n,
                None => {
                    debug!("skipping non-UTF-8 name in {}", dir.abs.display());
                    continue;
                }
            };

            if !opts.hidden && name_str.starts_with('.') {
                continue;
            }
            if is_os_junk_file(name_str) {
                continue;
            }
            if name_str.as_bytes().contains(&opts.pathsep) {
                warn!(
                    "skipping {}/{name_str}: name contains the configured path separator byte",
                    dir.abs.display()
                );
                continue;
            }

            let abs_path = dir.abs.join(&name);
            let rel_path = dir.rel.join(&name);
            let path_str = abs_path.to_string_lossy();
            if matches_any_exclude(name_str, &path_str, &opts.exclude_patterns()) {
                continue;
            }

            let meta = match entry.metadata() {
                Ok(m) => m,
                Err(e) => {
                    counters.inc_files_errored();
                    warn!("skipping {}: {e}", abs_path.display());
                    continue;
                }
            };

            if meta.is_dir() {
                let (device, _) = dev_ino(&meta);
                if opts.one_file_system && device != dir.device {
                    debug!("skipping {} (different filesystem)", abs_path.display());
                    continue;
                }
                pending.push(PendingDir {
                    abs: abs_path,
                    rel: rel_path,
                    device,
                });
                continue;
            }

            if !meta.is_file() {
                // symlinks (not followed), sockets, devices, fifos: not eligible.
                continue;
            }

            let size = meta.len();
            counters.inc_files_seen();
            if size < opts.minimum_size {
                counters.inc_files_ignored();
                continue;
            }

            let (_, ino_pair) = dev_ino(&meta);
            let file = ScannedFile {
                rel_dir: dir.rel.clone(),
                filename: Box::from(name_str),
                size,
                // Always carried; the orchestrator only acts on it when
                // `hardlink_is_unique` is set (spec I8/P8).
                dev_ino: Some(ino_pair),
            };

            if tx.send(file).is_err() {
                // Receiver (size-index worker) is gone; stop walking.
                return Ok(());
            }
            stats.files_sent += 1;
        }
    }

    Ok(())
}

/// Spawn the walker on its own thread and return the receiving end of its
/// channel plus a join handle yielding per-root scan stats once all roots
/// have been walked.
pub fn spawn_scan_thread(
    opts: Opts,
    counters: std::sync::Arc<Counters>,
) -> (Receiver<ScannedFile>, JoinHandle<Result<Vec<ScanStats>>>) {
    let (tx, rx) = bounded(SCAN_CHANNEL_CAP);
    let handle = std::thread::spawn(move || {
        let mut all_stats = Vec::with_capacity(opts.paths.len());
        for root in &opts.paths {
            let mut stats = ScanStats {
                dirs_visited: 0,
                files_sent: 0,
            };
            walk_root(root, &opts, &tx, &counters, &mut stats)?;
            all_stats.push(stats);
        }
        Ok(all_stats)
    });
    (rx, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn unique_tmp_dir(tag: &str) -> PathBuf {
        static COUNTER: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);
        let n = COUNTER.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let mut p = std::env::temp_dir();
        p.push(format!(
            "dupcat-scan-test-{tag}-{}-{n}",
            std::process::id()
        ));
        p
    }

    #[test]
    fn walks_nested_directories_and_skips_dotfiles() {
        let root = unique_tmp_dir("nested");
        fs::create_dir_all(root.join("a/b")).unwrap();
        fs::write(root.join("top.txt"), b"hello").unwrap();
        fs::write(root.join("a/mid.txt"), b"world!").unwrap();
        fs::write(root.join("a/b/deep.txt"), b"x").unwrap();
        fs::write(root.join(".hidden"), b"nope").unwrap();

        let mut opts = Opts::default();
        opts.paths = vec![root.clone()];
        let counters = Arc::new(Counters::new());
        let (rx, handle) = spawn_scan_thread(opts, counters);

        let mut names: Vec<String> = rx.iter().map(|f| f.filename.to_string()).collect();
        names.sort();
        let stats = handle.join().unwrap().unwrap();

        assert_eq!(names, vec!["deep.txt", "mid.txt", "top.txt"]);
        assert_eq!(stats[0].files_sent, 3);
        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn hidden_flag_includes_dotfiles() {
        let root = unique_tmp_dir("hidden");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join(".secret"), b"shh").unwrap();

        let mut opts = Opts::default();
        opts.paths = vec![root.clone()];
        opts.hidden = true;
        let counters = Arc::new(Counters::new());
        let (rx, handle) = spawn_scan_thread(opts, counters);
        let names: Vec<String> = rx.iter().map(|f| f.filename.to_string()).collect();
        handle.join().unwrap().unwrap();

        assert_eq!(names, vec![".secret"]);
        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn minimum_size_filters_small_files() {
        let root = unique_tmp_dir("minsize");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("tiny"), b"x").unwrap();
        fs::write(root.join("big"), vec![0u8; 100]).unwrap();

        let mut opts = Opts::default();
        opts.paths = vec![root.clone()];
        opts.minimum_size = 10;
        let counters = Arc::new(Counters::new());
        let (rx, handle) = spawn_scan_thread(opts, counters);
        let names: Vec<String> = rx.iter().map(|f| f.filename.to_string()).collect();
        handle.join().unwrap().unwrap();

        assert_eq!(names, vec!["big"]);
        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn exclude_pattern_skips_matching_names() {
        let root = unique_tmp_dir("exclude");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("keep.txt"), b"a").unwrap();
        fs::write(root.join("skip.log"), b"b").unwrap();

        let mut opts = Opts::default();
        opts.paths = vec![root.clone()];
        opts.exclude_path = vec![PathBuf::from("*.log")];
        let counters = Arc::new(Counters::new());
        let (rx, handle) = spawn_scan_thread(opts, counters);
        let names: Vec<String> = rx.iter().map(|f| f.filename.to_string()).collect();
        handle.join().unwrap().unwrap();

        assert_eq!(names, vec!["keep.txt"]);
        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn glob_match_supports_star_and_question_mark() {
        assert!(glob_match("*.log", "error.log"));
        assert!(!glob_match("*.log", "error.txt"));
        assert!(glob_match("file?.txt", "file1.txt"));
        assert!(!glob_match("file?.txt", "file12.txt"));
    }
}
