/// Merging an undersized child with one of its siblings after a delete.
use crate::btree::node::{Node, HEADER};
use crate::error::Result;
use crate::storage::page::PAGE_SIZE;
use crate::storage::page_store::PageStore;

/// Default size at or below which a shrunken child looks for a sibling.
pub const DEFAULT_MERGE_THRESHOLD: usize = PAGE_SIZE / 4;

/// Which sibling to merge with, carrying that sibling's node.
#[derive(Debug)]
pub enum Merge {
    Left(Node),
    Right(Node),
}

/// Decide whether `updated`, the new version of child `idx` of `parent`,
/// should be merged with a sibling. The left sibling is preferred.
pub fn should_merge<S: PageStore + ?Sized>(
    store: &mut S,
    parent: &Node,
    idx: u16,
    updated: &Node,
    threshold: usize,
) -> Result<Option<Merge>> {
    if updated.nbytes() > threshold {
        return Ok(None);
    }

    if idx > 0 {
        let sibling = Node::read(store, parent.ptr(idx - 1))?;
        if sibling.nbytes() + updated.nbytes() - HEADER <= PAGE_SIZE {
            return Ok(Some(Merge::Left(sibling)));
        }
    }
    if idx + 1 < parent.nkeys() {
        let sibling = Node::read(store, parent.ptr(idx + 1))?;
        if sibling.nbytes() + updated.nbytes() - HEADER <= PAGE_SIZE {
            return Ok(Some(Merge::Right(sibling)));
        }
    }
    Ok(None)
}

/// Concatenate the entries of `left` and then `right` into `new`.
pub fn merge_nodes(new: &mut Node, left: &Node, right: &Node) {
    assert_eq!(
        left.node_type(),
        right.node_type(),
        "merge_nodes: sibling node types differ"
    );
    new.set_header(left.node_type(), left.nkeys() + right.nkeys());
    new.append_range(left, 0, 0, left.nkeys());
    new.append_range(right, left.nkeys(), 0, right.nkeys());
}
