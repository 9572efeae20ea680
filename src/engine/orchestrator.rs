//! Top-level wiring: walk -> size-index -> round 1 -> round 2 -> persistence
//! (spec §4 end to end). A single sequential pass over the scan channel
//! drives size-index insertion, the same simplification round1/round2
//! already make from a reader/hasher thread pool to one sequential pass
//! (see their module docs and DESIGN.md).

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use log::{debug, info};

use crate::arena::{Arena, Idx};
use crate::config::Opts;
use crate::dirtree::{DirNode, DirTree};
use crate::disk_detect::{self, DriveType};
use crate::pathlist::{PathListEntry, PathListHead};
use crate::persistence::{CatalogAdapter, DuplicateGroup, SqliteCatalog};
use crate::readlist::{self, ScanCandidate};
use crate::round1;
use crate::round2;
use crate::scan;
use crate::sizeindex::{InsertOutcome, SizeIndex};
use crate::sizelist::SizeList;
use crate::stats::Counters;

#[cfg(unix)]
fn inode_of(meta: &std::fs::Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    meta.ino()
}

#[cfg(not(unix))]
fn inode_of(_meta: &std::fs::Metadata) -> u64 {
    0
}

/// One published duplicate group, with paths already materialized.
pub struct DuplicateGroupReport {
    pub each_size: u64,
    pub paths: Vec<PathBuf>,
}

/// Final outcome of one end-to-end run.
pub struct RunOutcome {
    pub duplicate_groups: Vec<DuplicateGroupReport>,
    pub uniques_count: usize,
}

/// Validate that every configured root exists and is a directory, and that
/// no root is an ancestor of another (spec §7: both fatal startup errors).
fn validate_roots(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    if paths.is_empty() {
        bail!("no path root given");
    }
    let mut canon = Vec::with_capacity(paths.len());
    for p in paths {
        let meta = std::fs::metadata(p)
            .with_context(|| format!("path root {} does not exist or is not accessible", p.display()))?;
        if !meta.is_dir() {
            bail!("path root {} is not a directory", p.display());
        }
        canon.push(
            p.canonicalize()
                .with_context(|| format!("canonicalize {}", p.display()))?,
        );
    }
    for i in 0..canon.len() {
        for j in 0..canon.len() {
            if i != j && canon[j].starts_with(&canon[i]) {
                bail!(
                    "overlapping path roots: {} contains {}",
                    canon[i].display(),
                    canon[j].display()
                );
            }
        }
    }
    Ok(canon)
}

/// Bookkeeping threaded through the scan-consumption loop so each new
/// path-list member also gets a read-list candidate and, when
/// `hardlink_is_unique` is set, a chance to collapse into its size class's
/// representative inode (spec I8/P8, S5, B8).
struct IngestState {
    dirtree: DirTree,
    entries: Arena<PathListEntry>,
    heads: Arena<PathListHead>,
    size_list: SizeList,
    size_index: SizeIndex,
    dir_cache: HashMap<(Idx<DirNode>, PathBuf), Idx<DirNode>>,
    candidates: Vec<ScanCandidate>,
    /// `(size, dev, ino)` triples already admitted, when collapsing hardlinks.
    seen_hardlinks: HashSet<(u64, u64, u64)>,
    zero_extent_count: usize,
    extent_sample_count: usize,
}

impl IngestState {
    fn new() -> Self {
        IngestState {
            dirtree: DirTree::new(),
            entries: Arena::new(),
            heads: Arena::new(),
            size_list: SizeList::new(),
            size_index: SizeIndex::new(),
            dir_cache: HashMap::new(),
            candidates: Vec::new(),
            seen_hardlinks: HashSet::new(),
            zero_extent_count: 0,
            extent_sample_count: 0,
        }
    }

    /// Record a read-list candidate for one newly-admitted path-list member,
    /// querying its physical extent (spec §6.4) for I/O-ordering purposes.
    fn record_candidate(
        &mut self,
        head: Idx<PathListHead>,
        entry: Idx<PathListEntry>,
        dir: Idx<DirNode>,
        filename: &str,
        size: u64,
        set_list_size: usize,
    ) {
        let path = self.dirtree.materialize_file(dir, filename);
        let physical_block = crate::extent::first_extent_block(&path);
        self.extent_sample_count += 1;
        if physical_block.is_none() {
            self.zero_extent_count += 1;
        }
        let inode = std::fs::metadata(&path).map(|m| inode_of(&m)).unwrap_or(0);
        self.candidates.push(ScanCandidate {
            head,
            entry,
            size,
            set_list_size,
            physical_block,
            inode,
        });
    }

    /// Admit one scanned file, collapsing it into an existing hardlink
    /// representative when `opts.hardlink_is_unique` is set and a prior
    /// entry of the same size already claims the same `(dev, ino)`.
    fn admit(&mut self, opts: &Opts, counters: &Counters, file: scan::ScannedFile) {
        if opts.hardlink_is_unique {
            if let Some((dev, ino)) = file.dev_ino {
                let key = (file.size, dev, ino);
                if !self.seen_hardlinks.insert(key) {
                    counters.inc_files_ignored();
                    debug!(
                        "collapsing hardlink {}/{} (dev {dev}, ino {ino})",
                        file.rel_dir.display(),
                        file.filename
                    );
                    return;
                }
            }
        }

        let dir_idx = self
            .dirtree
            .get_or_insert_path(&mut self.dir_cache, self.dirtree.root(), &file.rel_dir);

        match self.size_index.insert(
            &mut self.entries,
            &mut self.heads,
            &mut self.size_list,
            file.size,
            dir_idx,
            file.filename.clone(),
            file.dev_ino,
        ) {
            InsertOutcome::StillInline => {}
            InsertOutcome::Promoted {
                head,
                first_entry,
                first_dir,
                first_filename,
                second_entry,
            } => {
                self.record_candidate(head, first_entry, first_dir, &first_filename, file.size, 2);
                self.record_candidate(head, second_entry, dir_idx, &file.filename, file.size, 2);
            }
            InsertOutcome::Appended { head, entry } => {
                let set_list_size = self.heads.get(head).list_size;
                self.record_candidate(head, entry, dir_idx, &file.filename, file.size, set_list_size);
            }
        }
    }
}

/// Open (or skip) the catalog database per `opts.nodb`/`opts.db_path`.
fn open_catalog(opts: &Opts) -> Result<Option<SqliteCatalog>> {
    if opts.nodb {
        return Ok(None);
    }
    let db_path = opts.db_path.clone().unwrap_or_else(|| {
        PathBuf::from(crate::config::PackagePaths::get().default_catalog_filename())
    });
    let mut catalog = SqliteCatalog::new(&db_path, opts.pathsep);
    catalog
        .open()
        .with_context(|| format!("open catalog database {}", db_path.display()))?;
    catalog
        .init_meta(opts)
        .with_context(|| format!("validate catalog meta at {}", db_path.display()))?;
    Ok(Some(catalog))
}

/// Run the full pipeline and return the published duplicate groups and
/// unique count (spec §1's single end-to-end flow).
pub fn run(opts: &Opts) -> Result<RunOutcome> {
    let roots = validate_roots(&opts.paths)?;
    let mut opts = opts.clone();
    opts.paths = roots;

    let drive_type = if opts.force_ssd {
        DriveType::SSD
    } else if opts.force_hdd {
        DriveType::HDD
    } else {
        disk_detect::drive_type_for_path(&opts.paths[0])
    };
    info!("drive type for {}: {drive_type:?}", opts.paths[0].display());

    let mut catalog = open_catalog(&opts)?;

    let counters = std::sync::Arc::new(Counters::new());
    let mut state = IngestState::new();

    // A scan of unknown length (the walker doesn't know its total file count
    // up front) gets a counting bar rather than a percentage one, same shape
    // as the teacher's `create_counter`.
    let scan_bar = (!opts.quiet).then(|| crate::engine::progress::create_counter("scanning"));

    let (rx, handle) = scan::spawn_scan_thread(opts.clone(), std::sync::Arc::clone(&counters));
    for file in rx.iter() {
        state.admit(&opts, &counters, file);
        if let Some(bar) = &scan_bar {
            crate::engine::progress::update_progress_bar(bar, 1);
        }
    }
    if let Some(bar) = &scan_bar {
        crate::engine::progress::refresh_bar(bar);
    }
    let scan_stats = handle
        .join()
        .map_err(|_| anyhow::anyhow!("scan thread panicked"))??;

    let total_dirs: usize = scan_stats.iter().map(|s| s.dirs_visited).sum();
    let total_files: usize = scan_stats.iter().map(|s| s.files_sent).sum();
    debug!(
        "scan complete: {total_dirs} directories walked, {total_files} files admitted, {} size classes promoted",
        state.size_index.len()
    );

    let use_extent_order =
        !crate::config::extent_fallback_triggered(state.zero_extent_count, state.extent_sample_count);
    let prefix_block_size = opts.effective_first_block_size(drive_type);
    let prefix_window = opts.prefix_window(drive_type);
    let read_list = readlist::build_read_list(
        state.candidates,
        prefix_block_size,
        prefix_window,
        use_extent_order,
        opts.sort_by,
    );
    debug!(
        "read list built: {} entries (sort-by {:?}, {})",
        read_list.len(),
        opts.sort_by,
        if use_extent_order { "extent order" } else { "inode order (extent fallback triggered)" }
    );

    let round1_outcome = round1::run(
        &mut state.size_list,
        &mut state.heads,
        &mut state.entries,
        &state.dirtree,
        &opts,
        drive_type,
        &counters,
    )?;

    let round2_outcome = round2::run(
        &mut state.size_list,
        &mut state.heads,
        &mut state.entries,
        &state.dirtree,
        &opts,
        &counters,
    )?;

    let mut duplicate_groups = Vec::new();
    for c in round1_outcome.duplicate_groups {
        duplicate_groups.push(materialize_group(
            &state.dirtree,
            &state.entries,
            c.each_size,
            &c.members,
            opts.cut_path.as_deref(),
        ));
    }
    for c in round2_outcome.duplicate_groups {
        duplicate_groups.push(materialize_group(
            &state.dirtree,
            &state.entries,
            c.each_size,
            &c.members,
            opts.cut_path.as_deref(),
        ));
    }

    let unique_paths: Vec<PathBuf> = round1_outcome
        .uniques
        .iter()
        .chain(round2_outcome.uniques.iter())
        .map(|&idx| {
            let e = state.entries.get(idx);
            let path = state.dirtree.materialize_file(e.dir, &e.filename);
            apply_cut_path(path, opts.cut_path.as_deref())
        })
        .collect();
    let uniques_count = unique_paths.len();

    if let Some(catalog) = catalog.as_mut() {
        catalog.begin_transaction()?;
        for g in &duplicate_groups {
            let paths: Vec<String> = g.paths.iter().map(|p| p.to_string_lossy().into_owned()).collect();
            catalog.insert_duplicate_group(&DuplicateGroup {
                count: paths.len(),
                each_size: g.each_size,
                paths,
            })?;
        }
        if opts.save_uniques && !opts.no_unique {
            for path in &unique_paths {
                catalog.insert_unique(&path.to_string_lossy(), "round1_or_round2_skim")?;
            }
        }
        catalog.commit_transaction()?;
        catalog.close()?;
    }

    if let Some(stats_path) = &opts.stats_file {
        counters.dump_to_file(stats_path)?;
    }

    Ok(RunOutcome {
        duplicate_groups,
        uniques_count,
    })
}

/// Strip `cut_path` from `path`'s front when it's a prefix (spec §6.1
/// "Strip this prefix from reported/stored paths"); otherwise leave the
/// path untouched rather than erroring, since a non-matching prefix just
/// means this particular root wasn't under it.
fn apply_cut_path(path: PathBuf, cut_path: Option<&std::path::Path>) -> PathBuf {
    match cut_path {
        Some(prefix) => path.strip_prefix(prefix).map(PathBuf::from).unwrap_or(path),
        None => path,
    }
}

fn materialize_group(
    dirtree: &DirTree,
    entries: &Arena<PathListEntry>,
    each_size: u64,
    members: &[Idx<PathListEntry>],
    cut_path: Option<&std::path::Path>,
) -> DuplicateGroupReport {
    let paths = members
        .iter()
        .map(|&idx| {
            let e = entries.get(idx);
            let path = dirtree.materialize_file(e.dir, &e.filename);
            apply_cut_path(path, cut_path)
        })
        .collect();
    DuplicateGroupReport { each_size, paths }
}
