//! Size-index pre-filter: groups scan candidates by byte length so only
//! sizes that gain a second member are promoted to a path list (spec §4.2).
//!
//! The original (`sizetree.c`) is a hand-rolled BST; insertion order beyond
//! that has no meaning since each size is a single node, so a `BTreeMap` is
//! the idiomatic equivalent the spec's Design Notes already sanction.

use std::collections::BTreeMap;

use crate::arena::{Arena, Idx};
use crate::dirtree::DirNode;
use crate::pathlist::{PathListEntry, PathListHead};
use crate::sizelist::SizeList;

/// What happened as a result of one [`SizeIndex::insert`] call, telling the
/// caller which files now need a read-list candidate recorded (a file
/// inserted while alone at its size needs none yet; the moment a second
/// file of that size appears, *both* files need one).
pub enum InsertOutcome {
    /// Still the only file of this size; nothing to schedule yet.
    StillInline,
    /// Second file of this size arrived: a path list was just created for
    /// both the first (now-materialized) file and this one.
    Promoted {
        head: Idx<PathListHead>,
        first_entry: Idx<PathListEntry>,
        first_dir: Idx<DirNode>,
        first_filename: Box<str>,
        second_entry: Idx<PathListEntry>,
    },
    /// Third-or-later file of this size, appended to an existing path list.
    Appended {
        head: Idx<PathListHead>,
        entry: Idx<PathListEntry>,
    },
}

/// One size-index node. Before promotion it holds the single first-seen
/// file inline; after promotion it only tracks the path-list head.
enum SizeIndexNode {
    Inline {
        dir: Idx<DirNode>,
        filename: Box<str>,
        dev_ino: Option<(u64, u64)>,
    },
    Promoted { head: Idx<PathListHead> },
}

pub struct SizeIndex {
    by_size: BTreeMap<u64, SizeIndexNode>,
}

impl SizeIndex {
    pub fn new() -> Self {
        SizeIndex {
            by_size: BTreeMap::new(),
        }
    }

    /// Insert a scanned file of size `size`. See [`InsertOutcome`] for what
    /// the caller should do with the result.
    #[allow(clippy::too_many_arguments)]
    pub fn insert(
        &mut self,
        entries: &mut Arena<PathListEntry>,
        heads: &mut Arena<PathListHead>,
        size_list: &mut SizeList,
        size: u64,
        dir: Idx<DirNode>,
        filename: Box<str>,
        dev_ino: Option<(u64, u64)>,
    ) -> InsertOutcome {
        match self.by_size.remove(&size) {
            None => {
                self.by_size.insert(
                    size,
                    SizeIndexNode::Inline {
                        dir,
                        filename,
                        dev_ino,
                    },
                );
                InsertOutcome::StillInline
            }
            Some(SizeIndexNode::Inline {
                dir: first_dir,
                filename: first_filename,
                dev_ino: first_dev_ino,
            }) => {
                // Promotion: insert-first-path then insert-end-path (spec §4.2).
                let wanted_bufsize = size; // refined by caller using prefix window
                let first_entry_idx = entries.push(PathListEntry::new(
                    first_dir,
                    first_filename.clone(),
                    first_dev_ino,
                ));
                let mut head = PathListHead::new(size, first_entry_idx, wanted_bufsize);
                let second_entry_idx =
                    entries.push(PathListEntry::new(dir, filename, dev_ino));
                entries.get_mut(first_entry_idx).next = second_entry_idx;
                head.last_entry = second_entry_idx;
                head.list_size = 2;
                let head_idx = heads.push(head);
                let sl_idx = size_list.push(head_idx, size);
                heads.get_mut(head_idx).sizelist_back = Some(sl_idx);
                self.by_size
                    .insert(size, SizeIndexNode::Promoted { head: head_idx });
                InsertOutcome::Promoted {
                    head: head_idx,
                    first_entry: first_entry_idx,
                    first_dir,
                    first_filename,
                    second_entry: second_entry_idx,
                }
            }
            Some(SizeIndexNode::Promoted { head: head_idx }) => {
                let entry_idx = entries.push(PathListEntry::new(dir, filename, dev_ino));
                let head = heads.get_mut(head_idx);
                entries.get_mut(head.last_entry).next = entry_idx;
                head.last_entry = entry_idx;
                head.list_size += 1;
                self.by_size
                    .insert(size, SizeIndexNode::Promoted { head: head_idx });
                InsertOutcome::Appended {
                    head: head_idx,
                    entry: entry_idx,
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.by_size.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_size.is_empty()
    }
}

impl Default for SizeIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_file_of_a_size_stays_inline() {
        let mut idx = SizeIndex::new();
        let mut entries: Arena<PathListEntry> = Arena::new();
        let mut heads: Arena<PathListHead> = Arena::new();
        let mut size_list = SizeList::new();
        let result = idx.insert(
            &mut entries,
            &mut heads,
            &mut size_list,
            100,
            Idx::none(),
            Box::from("a"),
            None,
        );
        assert!(matches!(result, InsertOutcome::StillInline));
        assert_eq!(heads.len(), 0);
    }

    #[test]
    fn second_file_of_a_size_promotes_to_path_list() {
        let mut idx = SizeIndex::new();
        let mut entries: Arena<PathListEntry> = Arena::new();
        let mut heads: Arena<PathListHead> = Arena::new();
        let mut size_list = SizeList::new();
        idx.insert(
            &mut entries,
            &mut heads,
            &mut size_list,
            100,
            Idx::none(),
            Box::from("a"),
            None,
        );
        let result = idx.insert(
            &mut entries,
            &mut heads,
            &mut size_list,
            100,
            Idx::none(),
            Box::from("b"),
            None,
        );
        let head_idx = match result {
            InsertOutcome::Promoted { head, .. } => head,
            _ => panic!("expected promotion on second file"),
        };
        assert_eq!(heads.get(head_idx).list_size, 2);
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn third_file_extends_existing_path_list() {
        let mut idx = SizeIndex::new();
        let mut entries: Arena<PathListEntry> = Arena::new();
        let mut heads: Arena<PathListHead> = Arena::new();
        let mut size_list = SizeList::new();
        idx.insert(&mut entries, &mut heads, &mut size_list, 100, Idx::none(), Box::from("a"), None);
        idx.insert(&mut entries, &mut heads, &mut size_list, 100, Idx::none(), Box::from("b"), None);
        let result = idx.insert(&mut entries, &mut heads, &mut size_list, 100, Idx::none(), Box::from("c"), None);
        let head_idx = match result {
            InsertOutcome::Appended { head, .. } => head,
            _ => panic!("expected append on third file"),
        };
        assert_eq!(heads.get(head_idx).list_size, 3);
        assert_eq!(entries.len(), 3);
    }

    #[test]
    fn distinct_sizes_stay_independent() {
        let mut idx = SizeIndex::new();
        let mut entries: Arena<PathListEntry> = Arena::new();
        let mut heads: Arena<PathListHead> = Arena::new();
        let mut size_list = SizeList::new();
        idx.insert(&mut entries, &mut heads, &mut size_list, 100, Idx::none(), Box::from("a"), None);
        idx.insert(&mut entries, &mut heads, &mut size_list, 200, Idx::none(), Box::from("b"), None);
        assert_eq!(idx.len(), 2);
        assert_eq!(heads.len(), 0);
    }
}
