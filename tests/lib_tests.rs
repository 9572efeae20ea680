//! End-to-end runs of the full scan -> size-index -> round1 -> round2
//! pipeline against real temporary directory trees.

use dupcat::config::Opts;
use dupcat::engine;
use std::fs;
use std::path::PathBuf;

fn unique_tmp_dir(tag: &str) -> PathBuf {
    static COUNTER: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    let mut p = std::env::temp_dir();
    p.push(format!("dupcat-e2e-{tag}-{}-{n}", std::process::id()));
    p
}

fn opts_for(root: &PathBuf) -> Opts {
    let mut opts = Opts::default();
    opts.paths = vec![root.clone()];
    opts.nodb = true;
    opts.quiet = true;
    opts
}

#[test]
fn two_identical_files_form_one_duplicate_group() {
    let root = unique_tmp_dir("twin");
    fs::create_dir_all(&root).unwrap();
    fs::write(root.join("a.bin"), vec![7u8; 4096]).unwrap();
    fs::write(root.join("b.bin"), vec![7u8; 4096]).unwrap();

    let outcome = engine::run(&opts_for(&root)).unwrap();

    assert_eq!(outcome.duplicate_groups.len(), 1);
    assert_eq!(outcome.duplicate_groups[0].each_size, 4096);
    assert_eq!(outcome.duplicate_groups[0].paths.len(), 2);
    assert_eq!(outcome.uniques_count, 0);

    fs::remove_dir_all(&root).ok();
}

#[test]
fn distinct_content_same_size_is_not_a_duplicate() {
    let root = unique_tmp_dir("sametail");
    fs::create_dir_all(&root).unwrap();
    let mut a = vec![1u8; 4096];
    let mut b = vec![1u8; 4096];
    a[4095] = 0;
    b[4095] = 1;
    fs::write(root.join("a.bin"), &a).unwrap();
    fs::write(root.join("b.bin"), &b).unwrap();

    let outcome = engine::run(&opts_for(&root)).unwrap();

    assert!(outcome.duplicate_groups.is_empty());
    assert_eq!(outcome.uniques_count, 2);

    fs::remove_dir_all(&root).ok();
}

#[test]
fn unique_size_class_never_promotes_to_a_path_list() {
    let root = unique_tmp_dir("singleton");
    fs::create_dir_all(&root).unwrap();
    fs::write(root.join("only.bin"), vec![9u8; 128]).unwrap();
    fs::write(root.join("other.bin"), vec![9u8; 256]).unwrap();

    let outcome = engine::run(&opts_for(&root)).unwrap();

    // Neither file ever gains a same-size sibling, so the size-index keeps
    // both inline (spec §4.2): they never reach a path list and so never
    // get counted as a round1/round2 "unique" outcome either.
    assert!(outcome.duplicate_groups.is_empty());
    assert_eq!(outcome.uniques_count, 0);

    fs::remove_dir_all(&root).ok();
}

#[test]
fn three_identical_files_form_a_single_group() {
    let root = unique_tmp_dir("triplet");
    fs::create_dir_all(&root).unwrap();
    for name in ["x.bin", "y.bin", "z.bin"] {
        fs::write(root.join(name), vec![3u8; 9000]).unwrap();
    }

    let outcome = engine::run(&opts_for(&root)).unwrap();

    assert_eq!(outcome.duplicate_groups.len(), 1);
    assert_eq!(outcome.duplicate_groups[0].paths.len(), 3);

    fs::remove_dir_all(&root).ok();
}

#[test]
fn minimum_size_excludes_small_files_from_every_stage() {
    let root = unique_tmp_dir("minsize");
    fs::create_dir_all(&root).unwrap();
    fs::write(root.join("tiny1"), b"hi").unwrap();
    fs::write(root.join("tiny2"), b"hi").unwrap();

    let mut opts = opts_for(&root);
    opts.minimum_size = 1024;
    let outcome = engine::run(&opts).unwrap();

    assert!(outcome.duplicate_groups.is_empty());
    assert_eq!(outcome.uniques_count, 0);

    fs::remove_dir_all(&root).ok();
}

#[cfg(unix)]
#[test]
fn hardlinked_copies_collapse_to_one_candidate_when_configured() {
    let root = unique_tmp_dir("hardlink");
    fs::create_dir_all(&root).unwrap();
    let original = root.join("original.bin");
    fs::write(&original, vec![5u8; 2048]).unwrap();
    fs::hard_link(&original, root.join("linked.bin")).unwrap();
    fs::write(root.join("distinct.bin"), vec![5u8; 2048]).unwrap();

    let mut opts = opts_for(&root);
    opts.hardlink_is_unique = true;
    let outcome = engine::run(&opts).unwrap();

    // The hardlinked pair collapses to a single candidate, so only
    // `original.bin`/`linked.bin`'s representative and `distinct.bin` remain
    // as same-size members: exactly one duplicate pair, not a 3-way group.
    assert_eq!(outcome.duplicate_groups.len(), 1);
    assert_eq!(outcome.duplicate_groups[0].paths.len(), 2);

    fs::remove_dir_all(&root).ok();
}

#[test]
fn missing_root_is_a_fatal_error() {
    let root = unique_tmp_dir("missing");
    // deliberately not created
    let result = engine::run(&opts_for(&root));
    assert!(result.is_err());
}

#[test]
fn overlapping_roots_are_rejected() {
    let root = unique_tmp_dir("overlap");
    fs::create_dir_all(root.join("child")).unwrap();

    let mut opts = opts_for(&root);
    opts.paths = vec![root.clone(), root.join("child")];
    let result = engine::run(&opts);

    assert!(result.is_err());
    fs::remove_dir_all(&root).ok();
}

#[test]
fn empty_directory_tree_yields_no_groups_and_no_uniques() {
    let root = unique_tmp_dir("empty");
    fs::create_dir_all(&root).unwrap();

    let outcome = engine::run(&opts_for(&root)).unwrap();

    assert!(outcome.duplicate_groups.is_empty());
    assert_eq!(outcome.uniques_count, 0);

    fs::remove_dir_all(&root).ok();
}
