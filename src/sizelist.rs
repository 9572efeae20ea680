//! Size-list: linked list of all size classes with >=2 members, the unit of
//! work for round 1 and round 2 (spec §3 "Size-list node", §4.6, §5).

use std::sync::Mutex;

use crate::arena::Idx;
use crate::pathlist::PathListHead;

/// One size class on the size list. Inserted in arrival order; removal
/// during round 2 is deferred (spec §4.6): only non-head nodes are
/// unlinked, and unlinking takes the node's lock, then its predecessor's,
/// then its successor's, in that order (spec §5 "Shared resources").
pub struct SizeListNode {
    pub path_list: Idx<PathListHead>,
    pub next: Idx<SizeListNode>,
    pub size: u64,
    pub fully_read: bool,
    pub buffers_filled: usize,
    pub bytes_read: u64,
    pub lock: Mutex<()>,
}

impl SizeListNode {
    pub fn new(path_list: Idx<PathListHead>, size: u64) -> Self {
        SizeListNode {
            path_list,
            next: Idx::none(),
            size,
            fully_read: false,
            buffers_filled: 0,
            bytes_read: 0,
            lock: Mutex::new(()),
        }
    }
}

/// The size list itself: an arena of nodes plus a head index, so nodes can
/// be unlinked by index rewrite without invalidating other indices.
pub struct SizeList {
    nodes: crate::arena::Arena<SizeListNode>,
    head: Idx<SizeListNode>,
    tail: Idx<SizeListNode>,
}

impl SizeList {
    pub fn new() -> Self {
        SizeList {
            nodes: crate::arena::Arena::new(),
            head: Idx::none(),
            tail: Idx::none(),
        }
    }

    /// Append a size class, in arrival order (spec: "Inserted in arrival order").
    pub fn push(&mut self, path_list: Idx<PathListHead>, size: u64) -> Idx<SizeListNode> {
        let idx = self.nodes.push(SizeListNode::new(path_list, size));
        if self.head.is_none() {
            self.head = idx;
        } else {
            self.nodes.get_mut(self.tail).next = idx;
        }
        self.tail = idx;
        idx
    }

    pub fn head(&self) -> Idx<SizeListNode> {
        self.head
    }

    pub fn get(&self, idx: Idx<SizeListNode>) -> &SizeListNode {
        self.nodes.get(idx)
    }

    pub fn get_mut(&mut self, idx: Idx<SizeListNode>) -> &mut SizeListNode {
        self.nodes.get_mut(idx)
    }

    /// Iterate live (idx, predecessor) pairs from head, for round-1/round-2
    /// sweeps and for round-2's compaction pass.
    pub fn iter_with_predecessor(&self) -> Vec<(Option<Idx<SizeListNode>>, Idx<SizeListNode>)> {
        let mut out = Vec::new();
        let mut prev = None;
        let mut cur = self.head;
        while !cur.is_none() {
            out.push((prev, cur));
            prev = Some(cur);
            cur = self.nodes.get(cur).next;
        }
        out
    }

    /// Unlink every node currently in `DONE` path-list state (spec §4.6
    /// round-2 compaction), except the head of the list itself. Lock
    /// ordering: node, predecessor, successor; if the predecessor's lock
    /// can't be taken the unlink is skipped for this pass (deferred, as the
    /// spec allows) rather than blocking.
    pub fn compact_done(
        &mut self,
        heads: &crate::arena::Arena<PathListHead>,
        is_list_head: impl Fn(Idx<SizeListNode>) -> bool,
    ) {
        let pairs = self.iter_with_predecessor();
        for (prev, cur) in pairs {
            if is_list_head(cur) {
                continue; // spec: "the head is kept even if DONE"
            }
            let done = {
                let node = self.nodes.get(cur);
                let path_head = heads.get(node.path_list);
                path_head.state == crate::pathlist::HeadState::Done
            };
            if !done {
                continue;
            }
            let Some(prev_idx) = prev else { continue };
            let node_lock = self.nodes.get(cur).lock.try_lock();
            if node_lock.is_err() {
                continue;
            }
            let prev_lock = self.nodes.get(prev_idx).lock.try_lock();
            if prev_lock.is_err() {
                continue;
            }
            let next = self.nodes.get(cur).next;
            self.nodes.get_mut(prev_idx).next = next;
        }
    }
}

impl Default for SizeList {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pathlist::PathListEntry;

    fn dummy_head(heads: &mut crate::arena::Arena<PathListHead>, size: u64) -> Idx<PathListHead> {
        let mut entries: crate::arena::Arena<PathListEntry> = crate::arena::Arena::new();
        let e = entries.push(PathListEntry::new(Idx::none(), Box::from("f"), None));
        heads.push(PathListHead::new(size, e, size))
    }

    #[test]
    fn push_preserves_arrival_order() {
        let mut heads: crate::arena::Arena<PathListHead> = crate::arena::Arena::new();
        let mut list = SizeList::new();
        let h1 = dummy_head(&mut heads, 10);
        let h2 = dummy_head(&mut heads, 20);
        list.push(h1, 10);
        list.push(h2, 20);
        let order: Vec<u64> = list
            .iter_with_predecessor()
            .into_iter()
            .map(|(_, idx)| list.get(idx).size)
            .collect();
        assert_eq!(order, vec![10, 20]);
    }
}
