//! Direct byte-compare fast paths for 2- and 3-file candidate sets (spec
//! §4.7), bypassing hashing entirely. Used by round 2 before the general
//! streaming pipeline.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Outcome of the two-file direct comparison.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TwoWayOutcome {
    Duplicate,
    Differ,
}

/// Compare two equal-size files in `block_size` chunks until EOF or mismatch
/// (spec §4.7; `block_size` is the CLI's `file-block-size` override, see
/// `config::HashingConsts::FILECMP_BLOCK_SIZE` for the default).
pub fn compare_two(a: &Path, b: &Path, block_size: usize) -> Result<TwoWayOutcome> {
    let mut fa = File::open(a).with_context(|| format!("open {}", a.display()))?;
    let mut fb = File::open(b).with_context(|| format!("open {}", b.display()))?;
    let mut buf_a = vec![0u8; block_size];
    let mut buf_b = vec![0u8; block_size];

    loop {
        let na = fa.read(&mut buf_a).context("read during direct compare")?;
        let nb = fb.read(&mut buf_b).context("read during direct compare")?;
        if na != nb {
            return Ok(TwoWayOutcome::Differ); // short-read asymmetry: file shrank mid-compare
        }
        if na == 0 {
            return Ok(TwoWayOutcome::Duplicate);
        }
        if buf_a[..na] != buf_b[..nb] {
            return Ok(TwoWayOutcome::Differ);
        }
    }
}

/// Outcome of the three-file direct comparison (spec §4.7, §9 Open
/// Questions #1: the "discarded" entry is tracked as an explicit variant
/// here rather than a path-string sentinel).
pub enum ThreeWayOutcome {
    /// All three byte-identical.
    AllDuplicate,
    /// All three pairwise different.
    AllUnique,
    /// `differing_index` (0, 1, or 2) is unique; the other two must still be
    /// compared against each other starting from the current read cursor.
    OneDiffers {
        differing_index: usize,
        remaining: (usize, usize),
    },
}

/// Read one block from each of three open files and compare pairwise
/// (spec §4.6's 3-file fast path, first block only — callers fall through
/// to [`compare_two`] on `OneDiffers`).
pub fn compare_three_first_block(paths: [&Path; 3], block_size: usize) -> Result<ThreeWayOutcome> {
    let mut files: Vec<File> = paths
        .iter()
        .map(|p| File::open(p).with_context(|| format!("open {}", p.display())))
        .collect::<Result<_>>()?;
    let mut bufs = [
        vec![0u8; block_size],
        vec![0u8; block_size],
        vec![0u8; block_size],
    ];
    let mut lens = [0usize; 3];
    for i in 0..3 {
        lens[i] = files[i]
            .read(&mut bufs[i])
            .context("read during 3-file direct compare")?;
    }
    drop(files);

    let eq01 = lens[0] == lens[1] && bufs[0][..lens[0]] == bufs[1][..lens[1]];
    let eq02 = lens[0] == lens[2] && bufs[0][..lens[0]] == bufs[2][..lens[2]];
    let eq12 = lens[1] == lens[2] && bufs[1][..lens[1]] == bufs[2][..lens[2]];

    match (eq01, eq02, eq12) {
        (true, true, true) => {
            if lens[0] == 0 {
                Ok(ThreeWayOutcome::AllDuplicate)
            } else {
                // First block matched on all three but none has hit EOF yet;
                // caller must keep reading — represented by falling through
                // to the general pipeline, signalled as "no difference yet".
                Ok(ThreeWayOutcome::OneDiffers {
                    differing_index: usize::MAX,
                    remaining: (0, 1),
                })
            }
        }
        (true, false, false) => Ok(ThreeWayOutcome::OneDiffers {
            differing_index: 2,
            remaining: (0, 1),
        }),
        (false, true, false) => Ok(ThreeWayOutcome::OneDiffers {
            differing_index: 1,
            remaining: (0, 2),
        }),
        (false, false, true) => Ok(ThreeWayOutcome::OneDiffers {
            differing_index: 0,
            remaining: (1, 2),
        }),
        _ => Ok(ThreeWayOutcome::AllUnique),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_tmp(name: &str, contents: &[u8]) -> std::path::PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("dupcat-filecompare-test-{}-{}", std::process::id(), name));
        let mut f = File::create(&p).unwrap();
        f.write_all(contents).unwrap();
        p
    }

    #[test]
    fn identical_files_compare_as_duplicate() {
        let a = write_tmp("a1", b"hello world");
        let b = write_tmp("b1", b"hello world");
        assert_eq!(compare_two(&a, &b, 4).unwrap(), TwoWayOutcome::Duplicate);
        let _ = std::fs::remove_file(a);
        let _ = std::fs::remove_file(b);
    }

    #[test]
    fn last_byte_difference_is_detected() {
        let a = write_tmp("a2", b"hello worlD");
        let b = write_tmp("b2", b"hello world");
        assert_eq!(compare_two(&a, &b, 4).unwrap(), TwoWayOutcome::Differ);
        let _ = std::fs::remove_file(a);
        let _ = std::fs::remove_file(b);
    }

    #[test]
    fn custom_block_size_is_honored_across_multiple_reads() {
        // One-byte blocks force several read() round trips through a
        // mismatch near the end, exercising the caller-supplied size rather
        // than the compile-time default.
        let a = write_tmp("a5", b"aaaaaaaaaX");
        let b = write_tmp("b5", b"aaaaaaaaaY");
        assert_eq!(compare_two(&a, &b, 1).unwrap(), TwoWayOutcome::Differ);
        let _ = std::fs::remove_file(a);
        let _ = std::fs::remove_file(b);
    }

    #[test]
    fn three_file_first_byte_difference_isolates_the_odd_one_out() {
        let a = write_tmp("a3", b"Xbcdef");
        let b = write_tmp("b3", b"abcdef");
        let c = write_tmp("c3", b"abcdef");
        match compare_three_first_block([&a, &b, &c], 4).unwrap() {
            ThreeWayOutcome::OneDiffers {
                differing_index,
                remaining,
            } => {
                assert_eq!(differing_index, 0);
                assert_eq!(remaining, (1, 2));
            }
            _ => panic!("expected OneDiffers"),
        }
        for p in [a, b, c] {
            let _ = std::fs::remove_file(p);
        }
    }

    #[test]
    fn three_all_different_files() {
        let a = write_tmp("a4", b"aaaaaa");
        let b = write_tmp("b4", b"bbbbbb");
        let c = write_tmp("c4", b"cccccc");
        assert!(matches!(
            compare_three_first_block([&a, &b, &c], 4).unwrap(),
            ThreeWayOutcome::AllUnique
        ));
        for p in [a, b, c] {
            let _ = std::fs::remove_file(p);
        }
    }
}
