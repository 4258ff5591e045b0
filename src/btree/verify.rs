/// Structural consistency check over the whole tree.
use std::collections::HashSet;

use crate::btree::node::{Node, NodeType};
use crate::btree::ops::{depth_exceeded, BTree, MAX_BTREE_DEPTH};
use crate::error::{Result, TreeError};
use crate::storage::page::{PageId, NULL_PAGE, PAGE_SIZE};
use crate::storage::page_store::PageStore;

/// Shape of a verified tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeStats {
    /// Number of levels; 0 for an empty tree.
    pub height: usize,
    /// Pages reachable from the root.
    pub pages: usize,
    pub leaves: usize,
    /// User entries, not counting the sentinel.
    pub entries: usize,
    /// Largest serialized node seen.
    pub max_page_bytes: usize,
}

struct Walk {
    visited: HashSet<PageId>,
    leaf_depth: Option<usize>,
    stats: TreeStats,
}

fn corrupt(page_id: PageId, msg: impl std::fmt::Display) -> TreeError {
    TreeError::Corruption(format!("page {}: {}", page_id, msg))
}

impl<S: PageStore> BTree<S> {
    /// Walk every reachable page and check the tree invariants:
    /// every node fits a page, keys ascend strictly within and across
    /// nodes, each separator equals its child's first key, all leaves sit
    /// at the same depth, no page is shared, and the leftmost leaf starts
    /// with the empty sentinel key.
    pub fn verify(&mut self) -> Result<TreeStats> {
        let root = self.root_page_id();
        if root == NULL_PAGE {
            return Ok(TreeStats::default());
        }
        let mut walk = Walk {
            visited: HashSet::new(),
            leaf_depth: None,
            stats: TreeStats::default(),
        };
        self.verify_page(&mut walk, root, None, None, 0, true)?;
        walk.stats.height = walk.leaf_depth.map_or(0, |d| d + 1);
        Ok(walk.stats)
    }

    fn verify_page(
        &mut self,
        walk: &mut Walk,
        page_id: PageId,
        separator: Option<&[u8]>,
        upper: Option<&[u8]>,
        depth: usize,
        leftmost: bool,
    ) -> Result<()> {
        if depth > MAX_BTREE_DEPTH {
            return Err(depth_exceeded());
        }
        if !walk.visited.insert(page_id) {
            return Err(corrupt(page_id, "reachable more than once"));
        }
        let node = Node::read(self.store_mut(), page_id)?;
        let n = node.nkeys();

        walk.stats.pages += 1;
        walk.stats.max_page_bytes = walk.stats.max_page_bytes.max(node.nbytes());
        if node.nbytes() > PAGE_SIZE {
            return Err(corrupt(page_id, format!("{} bytes exceeds page", node.nbytes())));
        }
        if depth == 0 && node.node_type() == NodeType::Internal && n < 2 {
            return Err(corrupt(page_id, format!("internal root with {} children", n)));
        }

        if let Some(expected) = separator {
            if node.key(0) != expected {
                return Err(corrupt(page_id, "first key differs from parent separator"));
            }
        }
        if leftmost != node.key(0).is_empty() {
            return Err(corrupt(
                page_id,
                if leftmost {
                    "leftmost node does not start with the sentinel"
                } else {
                    "empty key outside the leftmost node"
                },
            ));
        }
        for i in 1..n {
            if node.key(i - 1) >= node.key(i) {
                return Err(corrupt(page_id, format!("keys out of order at index {}", i)));
            }
        }
        if let Some(hi) = upper {
            if node.key(n - 1) >= hi {
                return Err(corrupt(page_id, "key beyond the next separator"));
            }
        }

        match node.node_type() {
            NodeType::Leaf => {
                match walk.leaf_depth {
                    None => walk.leaf_depth = Some(depth),
                    Some(d) if d != depth => {
                        return Err(corrupt(
                            page_id,
                            format!("leaf at depth {}, expected {}", depth, d),
                        ))
                    }
                    Some(_) => {}
                }
                walk.stats.leaves += 1;
                walk.stats.entries += n as usize - usize::from(leftmost);
            }
            NodeType::Internal => {
                for i in 0..n {
                    let next = if i + 1 < n { Some(node.key(i + 1)) } else { upper };
                    self.verify_page(
                        walk,
                        node.ptr(i),
                        Some(node.key(i)),
                        next,
                        depth + 1,
                        leftmost && i == 0,
                    )?;
                }
            }
        }
        Ok(())
    }
}
