/// Whole-node rebuilds used by the copy-on-write descent.
///
/// Every function here fills a fresh working node from an old one; nothing
/// edits a committed page in place.
use std::cmp::Ordering;

use crate::btree::node::{Node, NodeType};
use crate::storage::page::PageId;

/// Greatest index whose key is <= `key`. Index 0 always qualifies (it is the
/// sentinel in the leftmost node, and the subtree minimum elsewhere).
pub fn lookup_floor(node: &Node, key: &[u8]) -> u16 {
    let mut found = 0;
    for i in 1..node.nkeys() {
        match node.key(i).cmp(key) {
            Ordering::Less => found = i,
            Ordering::Equal => return i,
            Ordering::Greater => break,
        }
    }
    found
}

/// `old` with `(key, val)` inserted at `idx`.
pub fn leaf_insert(new: &mut Node, old: &Node, idx: u16, key: &[u8], val: &[u8]) {
    new.set_header(NodeType::Leaf, old.nkeys() + 1);
    new.append_range(old, 0, 0, idx);
    new.append_kv(idx, 0, key, val);
    new.append_range(old, idx + 1, idx, old.nkeys() - idx);
}

/// `old` with the record at `idx` replaced by `(key, val)`.
pub fn leaf_update(new: &mut Node, old: &Node, idx: u16, key: &[u8], val: &[u8]) {
    new.set_header(NodeType::Leaf, old.nkeys());
    new.append_range(old, 0, 0, idx);
    new.append_kv(idx, 0, key, val);
    new.append_range(old, idx + 1, idx + 1, old.nkeys() - idx - 1);
}

/// `old` without the record at `idx`.
pub fn leaf_delete(new: &mut Node, old: &Node, idx: u16) {
    new.set_header(NodeType::Leaf, old.nkeys() - 1);
    new.append_range(old, 0, 0, idx);
    new.append_range(old, idx, idx + 1, old.nkeys() - idx - 1);
}

/// Internal node `old` with child slot `idx` replaced by `kids`, each given as
/// `(page_id, first key of that page)`. An empty `kids` drops the slot.
pub fn replace_kid_n(new: &mut Node, old: &Node, idx: u16, kids: &[(PageId, &[u8])]) {
    let inc = kids.len() as u16;
    new.set_header(NodeType::Internal, old.nkeys() + inc - 1);
    new.append_range(old, 0, 0, idx);
    for (i, (ptr, key)) in kids.iter().enumerate() {
        new.append_kv(idx + i as u16, *ptr, key, &[]);
    }
    new.append_range(old, idx + inc, idx + 1, old.nkeys() - (idx + 1));
}

/// Internal node `old` with slots `idx` and `idx + 1` collapsed into one
/// slot pointing at `ptr`.
pub fn replace_2_kid(new: &mut Node, old: &Node, idx: u16, ptr: PageId, key: &[u8]) {
    new.set_header(NodeType::Internal, old.nkeys() - 1);
    new.append_range(old, 0, 0, idx);
    new.append_kv(idx, ptr, key, &[]);
    new.append_range(old, idx + 1, idx + 2, old.nkeys() - (idx + 2));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(entries: &[(&[u8], &[u8])]) -> Node {
        let mut node = Node::new();
        node.set_header(NodeType::Leaf, entries.len() as u16);
        for (i, (k, v)) in entries.iter().enumerate() {
            node.append_kv(i as u16, 0, k, v);
        }
        node
    }

    fn internal(kids: &[(PageId, &[u8])]) -> Node {
        let mut node = Node::new();
        node.set_header(NodeType::Internal, kids.len() as u16);
        for (i, (ptr, k)) in kids.iter().enumerate() {
            node.append_kv(i as u16, *ptr, k, &[]);
        }
        node
    }

    fn keys(node: &Node) -> Vec<Vec<u8>> {
        node.entries().map(|(k, _)| k.to_vec()).collect()
    }

    #[test]
    fn test_lookup_floor() {
        let node = leaf(&[(b"", b""), (b"b", b""), (b"d", b""), (b"f", b"")]);
        assert_eq!(lookup_floor(&node, b"a"), 0);
        assert_eq!(lookup_floor(&node, b"b"), 1);
        assert_eq!(lookup_floor(&node, b"c"), 1);
        assert_eq!(lookup_floor(&node, b"d"), 2);
        assert_eq!(lookup_floor(&node, b"e"), 2);
        assert_eq!(lookup_floor(&node, b"z"), 3);
    }

    #[test]
    fn test_lookup_floor_single_entry() {
        let node = leaf(&[(b"", b"")]);
        assert_eq!(lookup_floor(&node, b"anything"), 0);
    }

    #[test]
    fn test_leaf_insert_middle_and_ends() {
        let old = leaf(&[(b"", b""), (b"b", b"2"), (b"d", b"4")]);

        let mut new = Node::new();
        leaf_insert(&mut new, &old, 2, b"c", b"3");
        assert_eq!(new.nkeys(), 4);
        assert_eq!(keys(&new), vec![b"".to_vec(), b"b".to_vec(), b"c".to_vec(), b"d".to_vec()]);
        assert_eq!(new.value(2), b"3");
        assert_eq!(new.value(3), b"4");

        let mut tail = Node::new();
        leaf_insert(&mut tail, &old, 3, b"e", b"5");
        assert_eq!(tail.key(3), b"e");
        assert_eq!(tail.value(3), b"5");

        let mut head = Node::new();
        leaf_insert(&mut head, &old, 1, b"a", b"1");
        assert_eq!(head.key(1), b"a");
        assert_eq!(head.key(2), b"b");
    }

    #[test]
    fn test_leaf_update_keeps_count() {
        let old = leaf(&[(b"", b""), (b"a", b"short"), (b"b", b"2")]);
        let mut new = Node::new();
        leaf_update(&mut new, &old, 1, b"a", b"a much longer value");
        assert_eq!(new.nkeys(), 3);
        assert_eq!(new.value(1), b"a much longer value");
        assert_eq!(new.key(2), b"b");
        assert_eq!(new.value(2), b"2");
        assert_eq!(new.nbytes(), old.nbytes() + 14);
    }

    #[test]
    fn test_leaf_delete() {
        let old = leaf(&[(b"", b""), (b"a", b"1"), (b"b", b"2"), (b"c", b"3")]);

        let mut new = Node::new();
        leaf_delete(&mut new, &old, 2);
        assert_eq!(keys(&new), vec![b"".to_vec(), b"a".to_vec(), b"c".to_vec()]);
        assert_eq!(new.value(2), b"3");

        let mut last = Node::new();
        leaf_delete(&mut last, &old, 3);
        assert_eq!(last.nkeys(), 3);
        assert_eq!(last.key(2), b"b");
    }

    #[test]
    fn test_leaf_delete_to_empty() {
        let old = leaf(&[(b"x", b"1")]);
        let mut new = Node::new();
        leaf_delete(&mut new, &old, 0);
        assert_eq!(new.nkeys(), 0);
        assert_eq!(new.nbytes(), crate::btree::node::HEADER);
    }

    #[test]
    fn test_replace_kid_n_grows_by_two() {
        let old = internal(&[(1, b""), (2, b"m"), (3, b"t")]);
        let mut new = Node::new();
        replace_kid_n(
            &mut new,
            &old,
            1,
            &[(20, b"m".as_slice()), (21, b"o".as_slice()), (22, b"q".as_slice())],
        );
        let kids: Vec<_> = new.children().map(|(k, p)| (k.to_vec(), p)).collect();
        assert_eq!(
            kids,
            vec![
                (b"".to_vec(), 1),
                (b"m".to_vec(), 20),
                (b"o".to_vec(), 21),
                (b"q".to_vec(), 22),
                (b"t".to_vec(), 3),
            ]
        );
    }

    #[test]
    fn test_replace_kid_n_drops_slot() {
        let old = internal(&[(1, b""), (2, b"m"), (3, b"t")]);
        let mut new = Node::new();
        replace_kid_n(&mut new, &old, 2, &[]);
        assert_eq!(new.nkeys(), 2);
        assert_eq!(new.ptr(1), 2);
    }

    #[test]
    fn test_replace_2_kid() {
        let old = internal(&[(1, b""), (2, b"m"), (3, b"t"), (4, b"x")]);
        let mut new = Node::new();
        replace_2_kid(&mut new, &old, 1, 9, b"m");
        let kids: Vec<_> = new.children().map(|(k, p)| (k.to_vec(), p)).collect();
        assert_eq!(
            kids,
            vec![(b"".to_vec(), 1), (b"m".to_vec(), 9), (b"x".to_vec(), 4)]
        );
    }
}
