/// B+tree operations: lookup, insert (with split), delete (with merge).
///
/// The tree is copy-on-write: every insert or delete rebuilds the path from
/// the root to the affected leaf as fresh pages, then frees the pages of the
/// version it replaced. Only the latest version is retained.
use std::collections::HashSet;

use crate::btree::ledger::PageLedger;
use crate::btree::merge::{merge_nodes, should_merge, Merge};
use crate::btree::mutate::{
    leaf_delete, leaf_insert, leaf_update, lookup_floor, replace_2_kid, replace_kid_n,
};
use crate::btree::node::{Node, NodeType};
use crate::btree::options::TreeOptions;
use crate::btree::split::{split3, Split};
use crate::error::{Result, TreeError};
use crate::storage::page::{PageId, NULL_PAGE};
use crate::storage::page_store::PageStore;

/// Maximum B-tree depth to prevent stack overflow on corrupted trees.
/// Every internal node has at least two children on a valid tree, so depth 64
/// is far beyond anything a 64-bit page id space can hold.
pub(crate) const MAX_BTREE_DEPTH: usize = 64;

pub(crate) fn depth_exceeded() -> TreeError {
    TreeError::Corruption("B-tree depth exceeds maximum (possible cycle)".into())
}

/// Result of deleting from one subtree.
#[derive(Debug)]
pub(crate) enum Deletion {
    /// The key is absent; nothing was rebuilt.
    NotFound,
    /// The subtree's new root node, not yet committed. May be undersized.
    Updated(Node),
    /// The subtree lost its last entry and should be dropped by the parent.
    Emptied,
}

/// B-tree handle. Owns the page store and tracks the root page.
pub struct BTree<S: PageStore> {
    root_page_id: PageId,
    store: S,
    options: TreeOptions,
}

impl<S: PageStore> BTree<S> {
    /// Create an empty tree with default options.
    pub fn new(store: S) -> Self {
        BTree {
            root_page_id: NULL_PAGE,
            store,
            options: TreeOptions::default(),
        }
    }

    /// Create an empty tree with custom options.
    pub fn with_options(store: S, options: TreeOptions) -> Result<Self> {
        options.validate()?;
        Ok(BTree {
            root_page_id: NULL_PAGE,
            store,
            options,
        })
    }

    /// Open an existing tree given its root page id (`NULL_PAGE` for empty).
    pub fn open(mut store: S, root_page_id: PageId, options: TreeOptions) -> Result<Self> {
        options.validate()?;
        if root_page_id != NULL_PAGE {
            Node::read(&mut store, root_page_id)?;
        }
        Ok(BTree {
            root_page_id,
            store,
            options,
        })
    }

    pub fn root_page_id(&self) -> PageId {
        self.root_page_id
    }

    pub fn options(&self) -> &TreeOptions {
        &self.options
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// True if the tree holds no entries (no root, or a sentinel-only leaf).
    pub fn is_empty(&mut self) -> Result<bool> {
        if self.root_page_id == NULL_PAGE {
            return Ok(true);
        }
        let root = Node::read(&mut self.store, self.root_page_id)?;
        Ok(root.is_leaf() && root.nkeys() == 1 && root.key(0).is_empty())
    }

    /// Look up a key. Returns the value if found.
    pub fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.options.check_key(key)?;
        let mut page_id = self.root_page_id;
        if page_id == NULL_PAGE {
            return Ok(None);
        }
        for _ in 0..=MAX_BTREE_DEPTH {
            let node = Node::read(&mut self.store, page_id)?;
            let idx = lookup_floor(&node, key);
            match node.node_type() {
                NodeType::Leaf => {
                    return Ok((node.key(idx) == key).then(|| node.value(idx).to_vec()));
                }
                NodeType::Internal => {
                    tracing::trace!(
                        target: "cowtree::search",
                        page = page_id,
                        slot = idx,
                        "descending through internal node"
                    );
                    page_id = node.ptr(idx);
                }
            }
        }
        Err(depth_exceeded())
    }

    /// Insert a key-value pair. If the key exists, its value is replaced.
    pub fn insert(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.options.check_key(key)?;
        self.options.check_value(value)?;

        let mut ledger = PageLedger::default();
        match self.insert_root(&mut ledger, key, value) {
            Ok(new_root) => {
                tracing::trace!(
                    target: "cowtree::root",
                    old = self.root_page_id,
                    new = new_root,
                    "insert committed"
                );
                self.root_page_id = new_root;
                ledger.release(&mut self.store)
            }
            Err(err) => {
                ledger.rollback(&mut self.store);
                Err(err)
            }
        }
    }

    fn insert_root(&mut self, ledger: &mut PageLedger, key: &[u8], value: &[u8]) -> Result<PageId> {
        if self.root_page_id == NULL_PAGE {
            let mut root = Node::new();
            root.set_header(NodeType::Leaf, 2);
            root.append_kv(0, NULL_PAGE, &[], &[]);
            root.append_kv(1, NULL_PAGE, key, value);
            return ledger.commit(&mut self.store, &root);
        }

        let root = Node::read(&mut self.store, self.root_page_id)?;
        let updated = self.tree_insert(ledger, &root, key, value, 0)?;
        ledger.retire(self.root_page_id);
        self.commit_root(ledger, updated)
    }

    /// Commit a rebuilt root, growing the tree by one level if it overflows.
    fn commit_root(&mut self, ledger: &mut PageLedger, updated: Node) -> Result<PageId> {
        let kids = match split3(updated) {
            Split::One(node) => return ledger.commit(&mut self.store, &node),
            split => self.commit_split(ledger, split)?,
        };
        let mut root = Node::new();
        root.set_header(NodeType::Internal, kids.len() as u16);
        for (i, (page_id, node)) in kids.iter().enumerate() {
            root.append_kv(i as u16, *page_id, node.key(0), &[]);
        }
        tracing::debug!(
            target: "cowtree::root",
            pages = kids.len(),
            "root split, tree grows one level"
        );
        ledger.commit(&mut self.store, &root)
    }

    /// Insert into the subtree rooted at `node`; the result may overflow a page.
    fn tree_insert(
        &mut self,
        ledger: &mut PageLedger,
        node: &Node,
        key: &[u8],
        value: &[u8],
        depth: usize,
    ) -> Result<Node> {
        if depth > MAX_BTREE_DEPTH {
            return Err(depth_exceeded());
        }
        let mut new = Node::new();
        let idx = lookup_floor(node, key);
        match node.node_type() {
            NodeType::Leaf => {
                if node.key(idx) == key {
                    leaf_update(&mut new, node, idx, key, value);
                } else {
                    leaf_insert(&mut new, node, idx + 1, key, value);
                }
            }
            NodeType::Internal => {
                let child_id = node.ptr(idx);
                let child = Node::read(&mut self.store, child_id)?;
                let updated = self.tree_insert(ledger, &child, key, value, depth + 1)?;
                ledger.retire(child_id);
                let kids = self.commit_split(ledger, split3(updated))?;
                let slots: Vec<(PageId, &[u8])> =
                    kids.iter().map(|(page_id, kid)| (*page_id, kid.key(0))).collect();
                replace_kid_n(&mut new, node, idx, &slots);
            }
        }
        Ok(new)
    }

    fn commit_split(&mut self, ledger: &mut PageLedger, split: Split) -> Result<Vec<(PageId, Node)>> {
        let mut kids = Vec::with_capacity(split.page_count());
        for node in split {
            let page_id = ledger.commit(&mut self.store, &node)?;
            kids.push((page_id, node));
        }
        Ok(kids)
    }

    /// Delete a key. Returns true if the key was found and deleted.
    pub fn delete(&mut self, key: &[u8]) -> Result<bool> {
        self.options.check_key(key)?;
        if self.root_page_id == NULL_PAGE {
            return Ok(false);
        }

        let mut ledger = PageLedger::default();
        match self.delete_root(&mut ledger, key) {
            Ok(Some(new_root)) => {
                tracing::trace!(
                    target: "cowtree::root",
                    old = self.root_page_id,
                    new = new_root,
                    "delete committed"
                );
                self.root_page_id = new_root;
                ledger.release(&mut self.store)?;
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(err) => {
                ledger.rollback(&mut self.store);
                Err(err)
            }
        }
    }

    fn delete_root(&mut self, ledger: &mut PageLedger, key: &[u8]) -> Result<Option<PageId>> {
        let root = Node::read(&mut self.store, self.root_page_id)?;
        let updated = match self.tree_delete(ledger, &root, key, 0)? {
            Deletion::NotFound => return Ok(None),
            Deletion::Emptied => {
                return Err(TreeError::Corruption(format!(
                    "root page {} has a single emptied subtree",
                    self.root_page_id
                )))
            }
            Deletion::Updated(node) => node,
        };
        ledger.retire(self.root_page_id);

        if updated.node_type() == NodeType::Internal && updated.nkeys() == 1 {
            return self.collapse_root(ledger, &updated).map(Some);
        }
        self.commit_root(ledger, updated).map(Some)
    }

    /// Replace a single-child root by its descendant, skipping every level
    /// that has exactly one child.
    fn collapse_root(&mut self, ledger: &mut PageLedger, root: &Node) -> Result<PageId> {
        assert_eq!(
            root.nkeys(),
            1,
            "collapse_root: root has {} children",
            root.nkeys()
        );
        let mut page_id = root.ptr(0);
        let mut levels = 1;
        loop {
            let node = Node::read(&mut self.store, page_id)?;
            if node.is_leaf() || node.nkeys() > 1 {
                break;
            }
            ledger.retire(page_id);
            page_id = node.ptr(0);
            levels += 1;
            if levels > MAX_BTREE_DEPTH {
                return Err(depth_exceeded());
            }
        }
        tracing::debug!(
            target: "cowtree::root",
            root = page_id,
            levels,
            "root collapsed, tree shrinks"
        );
        Ok(page_id)
    }

    fn tree_delete(
        &mut self,
        ledger: &mut PageLedger,
        node: &Node,
        key: &[u8],
        depth: usize,
    ) -> Result<Deletion> {
        if depth > MAX_BTREE_DEPTH {
            return Err(depth_exceeded());
        }
        let idx = lookup_floor(node, key);
        match node.node_type() {
            NodeType::Leaf => {
                if node.key(idx) != key {
                    return Ok(Deletion::NotFound);
                }
                let mut new = Node::new();
                leaf_delete(&mut new, node, idx);
                Ok(Deletion::Updated(new))
            }
            NodeType::Internal => self.node_delete(ledger, node, idx, key, depth),
        }
    }

    fn node_delete(
        &mut self,
        ledger: &mut PageLedger,
        node: &Node,
        idx: u16,
        key: &[u8],
        depth: usize,
    ) -> Result<Deletion> {
        let child_id = node.ptr(idx);
        let child = Node::read(&mut self.store, child_id)?;
        let updated = match self.tree_delete(ledger, &child, key, depth + 1)? {
            Deletion::NotFound => return Ok(Deletion::NotFound),
            Deletion::Emptied => {
                ledger.retire(child_id);
                return Ok(drop_child(node, idx));
            }
            Deletion::Updated(updated) => updated,
        };
        ledger.retire(child_id);

        let mut new = Node::new();
        match should_merge(
            &mut self.store,
            node,
            idx,
            &updated,
            self.options.merge_threshold,
        )? {
            Some(Merge::Left(sibling)) => {
                let mut merged = Node::new();
                merge_nodes(&mut merged, &sibling, &updated);
                ledger.retire(node.ptr(idx - 1));
                let page_id = ledger.commit(&mut self.store, &merged)?;
                replace_2_kid(&mut new, node, idx - 1, page_id, merged.key(0));
                tracing::debug!(
                    target: "cowtree::merge",
                    page = page_id,
                    keys = merged.nkeys(),
                    "merged child into left sibling"
                );
            }
            Some(Merge::Right(sibling)) => {
                let mut merged = Node::new();
                merge_nodes(&mut merged, &updated, &sibling);
                ledger.retire(node.ptr(idx + 1));
                let page_id = ledger.commit(&mut self.store, &merged)?;
                replace_2_kid(&mut new, node, idx, page_id, merged.key(0));
                tracing::debug!(
                    target: "cowtree::merge",
                    page = page_id,
                    keys = merged.nkeys(),
                    "merged child with right sibling"
                );
            }
            None if updated.nkeys() == 0 => return Ok(drop_child(node, idx)),
            None => {
                // a new first key in the child can lengthen this node's
                // separator, so the child may still need a split
                let kids = self.commit_split(ledger, split3(updated))?;
                let slots: Vec<(PageId, &[u8])> =
                    kids.iter().map(|(page_id, kid)| (*page_id, kid.key(0))).collect();
                replace_kid_n(&mut new, node, idx, &slots);
            }
        }
        Ok(Deletion::Updated(new))
    }

    /// Iterate over all key-value pairs in sorted order.
    /// Calls the callback with (key, value) for each entry.
    pub fn scan<F>(&mut self, mut callback: F) -> Result<()>
    where
        F: FnMut(&[u8], &[u8]) -> Result<bool>, // return false to stop
    {
        if self.root_page_id == NULL_PAGE {
            return Ok(());
        }
        self.scan_page(self.root_page_id, None, &mut callback, 0)?;
        Ok(())
    }

    /// Range scan: iterate over entries where key >= start_key.
    pub fn scan_from<F>(&mut self, start_key: &[u8], mut callback: F) -> Result<()>
    where
        F: FnMut(&[u8], &[u8]) -> Result<bool>,
    {
        if self.root_page_id == NULL_PAGE {
            return Ok(());
        }
        self.scan_page(self.root_page_id, Some(start_key), &mut callback, 0)?;
        Ok(())
    }

    /// Returns false once the callback asked to stop.
    fn scan_page<F>(
        &mut self,
        page_id: PageId,
        start_key: Option<&[u8]>,
        callback: &mut F,
        depth: usize,
    ) -> Result<bool>
    where
        F: FnMut(&[u8], &[u8]) -> Result<bool>,
    {
        if depth > MAX_BTREE_DEPTH {
            return Err(depth_exceeded());
        }
        let node = Node::read(&mut self.store, page_id)?;
        match node.node_type() {
            NodeType::Leaf => {
                for (k, v) in node.entries() {
                    // the sentinel is not a real entry
                    if k.is_empty() || start_key.is_some_and(|start| k < start) {
                        continue;
                    }
                    if !callback(k, v)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            NodeType::Internal => {
                let first = start_key.map_or(0, |start| lookup_floor(&node, start));
                for i in first..node.nkeys() {
                    let bound = if i == first { start_key } else { None };
                    if !self.scan_page(node.ptr(i), bound, callback, depth + 1)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
        }
    }

    /// Number of levels: 0 for an empty tree, 1 for a single leaf.
    pub fn height(&mut self) -> Result<usize> {
        let mut height = 0;
        let mut page_id = self.root_page_id;
        while page_id != NULL_PAGE {
            height += 1;
            if height > MAX_BTREE_DEPTH {
                return Err(depth_exceeded());
            }
            let node = Node::read(&mut self.store, page_id)?;
            page_id = match node.node_type() {
                NodeType::Leaf => NULL_PAGE,
                NodeType::Internal => node.ptr(0),
            };
        }
        Ok(height)
    }

    /// Collect all page IDs in this B-tree.
    pub fn collect_all_pages(&mut self) -> Result<Vec<PageId>> {
        let mut pages = Vec::new();
        if self.root_page_id == NULL_PAGE {
            return Ok(pages);
        }
        let mut visited = HashSet::new();
        self.collect_pages_recursive(self.root_page_id, &mut pages, &mut visited, 0)?;
        Ok(pages)
    }

    fn collect_pages_recursive(
        &mut self,
        page_id: PageId,
        pages: &mut Vec<PageId>,
        visited: &mut HashSet<PageId>,
        depth: usize,
    ) -> Result<()> {
        if depth > MAX_BTREE_DEPTH {
            return Err(depth_exceeded());
        }
        if !visited.insert(page_id) {
            return Err(TreeError::Corruption(format!(
                "B-tree cycle detected: page {} visited twice during collection",
                page_id
            )));
        }
        pages.push(page_id);
        let node = Node::read(&mut self.store, page_id)?;
        if node.node_type() == NodeType::Internal {
            for i in 0..node.nkeys() {
                self.collect_pages_recursive(node.ptr(i), pages, visited, depth + 1)?;
            }
        }
        Ok(())
    }
}

/// Parent `node` without child slot `idx`; a parent left with no children
/// is emptied in turn.
fn drop_child(node: &Node, idx: u16) -> Deletion {
    if node.nkeys() == 1 {
        return Deletion::Emptied;
    }
    let mut new = Node::new();
    replace_kid_n(&mut new, node, idx, &[]);
    Deletion::Updated(new)
}
