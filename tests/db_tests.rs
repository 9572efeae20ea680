//! Integration coverage for the SQLite catalog: multiple groups, uniques,
//! and that data survives a close/reopen cycle (spec §6.2, §6.3).

use dupcat::persistence::{CatalogAdapter, DuplicateGroup, SqliteCatalog};
use std::path::PathBuf;

fn tmp_db_path(tag: &str) -> PathBuf {
    static COUNTER: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    let mut p = std::env::temp_dir();
    p.push(format!("dupcat-db-test-{tag}-{}-{n}.sqlite", std::process::id()));
    let _ = std::fs::remove_file(&p);
    p
}

#[test]
fn multiple_groups_and_uniques_round_trip_in_one_transaction() {
    let path = tmp_db_path("multi");
    let mut cat = SqliteCatalog::new(&path, dupcat::config::DEFAULT_PATHSEP);
    cat.open().unwrap();

    cat.begin_transaction().unwrap();
    let id_a = cat
        .insert_duplicate_group(&DuplicateGroup {
            count: 2,
            each_size: 10,
            paths: vec!["/a/one".into(), "/a/two".into()],
        })
        .unwrap();
    let id_b = cat
        .insert_duplicate_group(&DuplicateGroup {
            count: 3,
            each_size: 20,
            paths: vec!["/b/one".into(), "/b/two".into(), "/b/three".into()],
        })
        .unwrap();
    cat.insert_unique("/c/lonely", "round1_skim").unwrap();
    cat.commit_transaction().unwrap();

    assert_ne!(id_a, id_b);
    assert!(cat.is_known_unique("/c/lonely").unwrap());
    assert!(!cat.is_known_unique("/a/one").unwrap());

    cat.close().unwrap();
    std::fs::remove_file(&path).ok();
}

#[test]
fn data_survives_close_and_reopen() {
    let path = tmp_db_path("persist");
    {
        let mut cat = SqliteCatalog::new(&path, dupcat::config::DEFAULT_PATHSEP);
        cat.open().unwrap();
        cat.begin_transaction().unwrap();
        cat.insert_duplicate_group(&DuplicateGroup {
            count: 2,
            each_size: 42,
            paths: vec!["/x/a".into(), "/x/b".into()],
        })
        .unwrap();
        cat.insert_unique("/x/unique", "round2_skim").unwrap();
        cat.commit_transaction().unwrap();
        cat.close().unwrap();
    }

    let mut reopened = SqliteCatalog::new(&path, dupcat::config::DEFAULT_PATHSEP);
    reopened.open().unwrap();
    assert!(reopened.is_known_unique("/x/unique").unwrap());
    assert!(!reopened.is_known_unique("/x/a").unwrap());
    reopened.close().unwrap();

    std::fs::remove_file(&path).ok();
}

#[test]
fn delete_duplicate_by_id_removes_only_that_group() {
    let path = tmp_db_path("delete");
    let mut cat = SqliteCatalog::new(&path, dupcat::config::DEFAULT_PATHSEP);
    cat.open().unwrap();

    cat.begin_transaction().unwrap();
    let keep_id = cat
        .insert_duplicate_group(&DuplicateGroup {
            count: 2,
            each_size: 1,
            paths: vec!["/keep/a".into(), "/keep/b".into()],
        })
        .unwrap();
    let drop_id = cat
        .insert_duplicate_group(&DuplicateGroup {
            count: 2,
            each_size: 2,
            paths: vec!["/drop/a".into(), "/drop/b".into()],
        })
        .unwrap();
    cat.commit_transaction().unwrap();

    cat.delete_duplicate_by_id(drop_id).unwrap();
    assert_ne!(keep_id, drop_id);

    cat.close().unwrap();
    std::fs::remove_file(&path).ok();
}
