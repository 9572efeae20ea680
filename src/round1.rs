//! Round 1: prefix hash with early skim of uniques (spec §4.5).
//!
//! This pass uses the spec's "non-rotational reader" strategy uniformly —
//! read the whole prefix for every entry in a set, then hash the set as one
//! unit — since it runs as a single sequential pass over the size list
//! rather than a literal reader-thread/hasher-thread-pool pair (see
//! DESIGN.md). The state machine and bucket/skim semantics are unchanged;
//! only the threading is simplified.

use std::collections::HashMap;

use anyhow::Result;
use log::debug;

use crate::arena::{Arena, Idx};
use crate::config::Opts;
use crate::dirtree::PathMaterializer;
use crate::disk_detect::DriveType;
use crate::hashing::{self, Digest};
use crate::pathlist::{entry_indices, EntryState, HeadState, PathListEntry, PathListHead};
use crate::sizelist::SizeList;
use crate::stats::Counters;

/// One confirmed (or not-yet-confirmed) set of same-digest files, surfaced
/// for the caller to either publish (if `fully_read`) or hand to round 2.
pub struct Candidate {
    pub head: Idx<PathListHead>,
    pub each_size: u64,
    pub members: Vec<Idx<PathListEntry>>,
}

pub struct Round1Outcome {
    /// Sets whose prefix covered the whole file: real duplicate groups.
    pub duplicate_groups: Vec<Candidate>,
    /// Entries skimmed as unique this round (singleton digest chains).
    pub uniques: Vec<Idx<PathListEntry>>,
    /// Heads that still need round 2 (prefix didn't cover the whole file).
    pub needs_round2: Vec<Idx<PathListHead>>,
}

/// Group entries of one path list by full digest equality, bucketed by the
/// digest's last byte only as a pre-filter (spec §3 "Hash-table").
fn bucket_by_digest(
    entries: &Arena<PathListEntry>,
    members: &[Idx<PathListEntry>],
) -> Vec<Vec<Idx<PathListEntry>>> {
    let mut buckets: HashMap<u8, Vec<(Digest, Vec<Idx<PathListEntry>>)>> = HashMap::new();
    for &idx in members {
        let entry = entries.get(idx);
        let digest = entry
            .round1_digest
            .clone()
            .expect("round1 digest computed before bucketing");
        let chain = buckets.entry(digest.last_byte()).or_default();
        match chain.iter_mut().find(|(d, _)| *d == digest) {
            Some((_, v)) => v.push(idx),
            None => chain.push((digest, vec![idx])),
        }
    }
    buckets
        .into_values()
        .flatten()
        .map(|(_, v)| v)
        .collect()
}

/// Run round 1 over every size-class currently on the size list. Each node
/// is processed once to completion before moving to the next (spec's
/// "within a single candidate set the hasher sees all entries atomically").
pub fn run(
    size_list: &mut SizeList,
    heads: &mut Arena<PathListHead>,
    entries: &mut Arena<PathListEntry>,
    dirtree: &impl PathMaterializer,
    opts: &Opts,
    drive_type: DriveType,
    counters: &Counters,
) -> Result<Round1Outcome> {
    let prefix_window = opts.prefix_window(drive_type);
    let mut outcome = Round1Outcome {
        duplicate_groups: Vec::new(),
        uniques: Vec::new(),
        needs_round2: Vec::new(),
    };

    let node_order: Vec<_> = size_list
        .iter_with_predecessor()
        .into_iter()
        .map(|(_, idx)| idx)
        .collect();

    for node_idx in node_order {
        let head_idx = size_list.get(node_idx).path_list;
        process_one_head(
            head_idx,
            heads,
            entries,
            dirtree,
            opts,
            prefix_window,
            counters,
            &mut outcome,
        )?;
    }

    Ok(outcome)
}

#[allow(clippy::too_many_arguments)]
fn process_one_head(
    head_idx: Idx<PathListHead>,
    heads: &mut Arena<PathListHead>,
    entries: &mut Arena<PathListEntry>,
    dirtree: &impl PathMaterializer,
    opts: &Opts,
    prefix_window: u64,
    counters: &Counters,
    outcome: &mut Round1Outcome,
) -> Result<()> {
    let size = heads.get(head_idx).size;
    let bufsize = size.min(prefix_window);
    let fully_read = size <= prefix_window;
    let members = entry_indices(entries, heads.get(head_idx));

    for &entry_idx in &members {
        let (dir, filename) = {
            let e = entries.get(entry_idx);
            (e.dir, e.filename.clone())
        };
        let path = dirtree.materialize_file(dir, &filename);
        match hashing::file_digest(opts.hash_function, &path, 0, bufsize) {
            Ok((digest, bytes_read)) => {
                counters.add_bytes_read(bytes_read);
                let e = entries.get_mut(entry_idx);
                e.round1_digest = Some(digest);
                e.state = EntryState::R1Done;
            }
            Err(err) => {
                debug!("round 1: invalidating {}: {err}", path.display());
                counters.inc_files_errored();
                let e = entries.get_mut(entry_idx);
                e.finish(EntryState::Invalid);
                let h = heads.get_mut(head_idx);
                h.list_size = h.list_size.saturating_sub(1);
            }
        }
    }

    let live: Vec<Idx<PathListEntry>> = members
        .iter()
        .copied()
        .filter(|&idx| entries.get(idx).state == EntryState::R1Done)
        .collect();

    let chains = bucket_by_digest(entries, &live);

    // Skim: singleton chains are unique.
    let mut survivor_chains = Vec::new();
    for chain in chains {
        if chain.len() == 1 {
            let idx = chain[0];
            entries.get_mut(idx).finish(EntryState::Unique);
            let h = heads.get_mut(head_idx);
            h.list_size = h.list_size.saturating_sub(1);
            outcome.uniques.push(idx);
        } else {
            survivor_chains.push(chain);
        }
    }

    let head = heads.get_mut(head_idx);
    head.fully_read = fully_read;

    if survivor_chains.is_empty() {
        head.state = HeadState::Done;
        return Ok(());
    }

    if fully_read {
        for chain in survivor_chains {
            for &idx in &chain {
                entries.get_mut(idx).finish(EntryState::Done);
            }
            counters.inc_duplicate_group(chain.len() as u64);
            outcome.duplicate_groups.push(Candidate {
                head: head_idx,
                each_size: size,
                members: chain,
            });
        }
        heads.get_mut(head_idx).state = HeadState::Done;
    } else {
        heads.get_mut(head_idx).state = HeadState::R2Needed;
        outcome.needs_round2.push(head_idx);
    }

    Ok(())
}
