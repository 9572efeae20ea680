//! Reverse-linked directory tree: each node holds a parent pointer and its
//! own name segment, so a file stores one parent index + filename instead of
//! a full path string (spec §3 "Directory node").

use crate::arena::{Arena, Idx};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// One directory, arena-allocated. Never mutated after creation.
pub struct DirNode {
    pub parent: Idx<DirNode>,
    pub name: Box<str>,
    /// `parent.cumulative_path_len + 1 + name.len()` (root is 0, no leading separator).
    pub cumulative_path_len: usize,
}

/// Anything that can turn a `(dir, filename)` pair into a real filesystem
/// path. `DirTree` is the only production implementor; tests that need to
/// root paths at a temp directory instead of the tree's own root implement
/// it on a thin wrapper rather than rebuilding a whole tree.
pub trait PathMaterializer {
    fn materialize_file(&self, dir: Idx<DirNode>, filename: &str) -> PathBuf;
}

/// Arena of directory nodes plus the root index, created once by the scanner.
pub struct DirTree {
    nodes: Arena<DirNode>,
    root: Idx<DirNode>,
}

impl DirTree {
    /// Create a tree with a single root node (empty name, no parent).
    pub fn new() -> Self {
        let mut nodes = Arena::new();
        let root = nodes.push(DirNode {
            parent: Idx::none(),
            name: Box::from(""),
            cumulative_path_len: 0,
        });
        DirTree { nodes, root }
    }

    pub fn root(&self) -> Idx<DirNode> {
        self.root
    }

    /// Insert a child directory named `name` under `parent`.
    pub fn insert_child(&mut self, parent: Idx<DirNode>, name: &str) -> Idx<DirNode> {
        let parent_len = self.nodes.get(parent).cumulative_path_len;
        let cumulative_path_len = if parent == self.root {
            name.len()
        } else {
            parent_len + 1 + name.len()
        };
        self.nodes.push(DirNode {
            parent,
            name: Box::from(name),
            cumulative_path_len,
        })
    }

    /// Rebuild the full relative path for `dir` in one reverse walk, using a
    /// single output buffer sized from `cumulative_path_len` (spec §3).
    pub fn materialize(&self, dir: Idx<DirNode>) -> PathBuf {
        let len = self.nodes.get(dir).cumulative_path_len;
        let mut segments = Vec::new();
        let mut cur = dir;
        while cur != self.root {
            let node = self.nodes.get(cur);
            segments.push(node.name.as_ref());
            cur = node.parent;
        }
        segments.reverse();
        let mut out = String::with_capacity(len);
        for (i, seg) in segments.iter().enumerate() {
            if i > 0 {
                out.push('/');
            }
            out.push_str(seg);
        }
        PathBuf::from(out)
    }

    /// Full path to a file given its parent directory and filename.
    pub fn materialize_file(&self, dir: Idx<DirNode>, filename: &str) -> PathBuf {
        let mut p = self.materialize(dir);
        p.push(filename);
        p
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn bytes_allocated(&self) -> usize {
        self.nodes.bytes_allocated()
    }

    /// Find or create the node for `rel_dir`, a path relative to `base`
    /// (itself a node already in the tree — typically one of the scan's
    /// root nodes), creating any missing intermediate components. `cache`
    /// maps already-materialized `(base, relative path)` pairs to their
    /// index so siblings under a shared ancestor don't re-walk it (the
    /// size-index worker calls this once per directory visited, spec §4.1).
    pub fn get_or_insert_path(
        &mut self,
        cache: &mut HashMap<(Idx<DirNode>, PathBuf), Idx<DirNode>>,
        base: Idx<DirNode>,
        rel_dir: &Path,
    ) -> Idx<DirNode> {
        if rel_dir.as_os_str().is_empty() {
            return base;
        }
        let key = (base, rel_dir.to_path_buf());
        if let Some(&idx) = cache.get(&key) {
            return idx;
        }
        let parent_idx = match rel_dir.parent() {
            Some(parent) => self.get_or_insert_path(cache, base, parent),
            None => base,
        };
        let name = rel_dir
            .file_name()
            .expect("non-empty relative path has a file name")
            .to_string_lossy();
        let idx = self.insert_child(parent_idx, &name);
        cache.insert(key, idx);
        idx
    }
}

impl Default for DirTree {
    fn default() -> Self {
        Self::new()
    }
}

impl PathMaterializer for DirTree {
    fn materialize_file(&self, dir: Idx<DirNode>, filename: &str) -> PathBuf {
        DirTree::materialize_file(self, dir, filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn materializes_nested_path() {
        let mut tree = DirTree::new();
        let a = tree.insert_child(tree.root(), "a");
        let b = tree.insert_child(a, "b");
        assert_eq!(tree.materialize(b), PathBuf::from("a/b"));
        assert_eq!(
            tree.materialize_file(b, "x.txt"),
            PathBuf::from("a/b/x.txt")
        );
    }

    #[test]
    fn root_materializes_empty() {
        let tree = DirTree::new();
        assert_eq!(tree.materialize(tree.root()), PathBuf::from(""));
    }

    #[test]
    fn get_or_insert_path_reuses_cached_ancestor() {
        let mut tree = DirTree::new();
        let mut cache = HashMap::new();
        let root = tree.root();
        let a_b1 = tree.get_or_insert_path(&mut cache, root, Path::new("a/b1"));
        let a_b2 = tree.get_or_insert_path(&mut cache, root, Path::new("a/b2"));
        assert_ne!(a_b1, a_b2);
        assert_eq!(tree.materialize(a_b1), PathBuf::from("a/b1"));
        assert_eq!(tree.materialize(a_b2), PathBuf::from("a/b2"));
        let nodes_after_two = tree.node_count();
        let a_b1_again = tree.get_or_insert_path(&mut cache, root, Path::new("a/b1"));
        assert_eq!(a_b1, a_b1_again);
        assert_eq!(tree.node_count(), nodes_after_two);
    }

    #[test]
    fn cumulative_len_matches_joined_path() {
        let mut tree = DirTree::new();
        let a = tree.insert_child(tree.root(), "alpha");
        let b = tree.insert_child(a, "beta");
        let c = tree.insert_child(b, "gamma");
        let materialized = tree.materialize(c);
        assert_eq!(materialized.to_str().unwrap().len(), "alpha/beta/gamma".len());
    }
}
