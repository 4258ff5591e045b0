/// Splitting an overflowing working node into pages that fit.
///
/// A working node is at most two pages large, and a single entry always fits
/// in a page, so one split plus at most one more split of the left half is
/// always enough.
use crate::btree::node::{Node, HEADER};
use crate::storage::page::PAGE_SIZE;

const SLOT_SIZE: usize = 8 + 2;

/// The 1, 2 or 3 pages produced by `split3`, in key order.
#[derive(Debug)]
pub enum Split {
    One(Node),
    Two(Node, Node),
    Three(Node, Node, Node),
}

impl Split {
    pub fn page_count(&self) -> usize {
        match self {
            Split::One(_) => 1,
            Split::Two(..) => 2,
            Split::Three(..) => 3,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        let nodes = match self {
            Split::One(a) => [Some(a), None, None],
            Split::Two(a, b) => [Some(a), Some(b), None],
            Split::Three(a, b, c) => [Some(a), Some(b), Some(c)],
        };
        nodes.into_iter().flatten()
    }
}

impl IntoIterator for Split {
    type Item = Node;
    type IntoIter = std::iter::Flatten<std::array::IntoIter<Option<Node>, 3>>;

    fn into_iter(self) -> Self::IntoIter {
        let nodes = match self {
            Split::One(a) => [Some(a), None, None],
            Split::Two(a, b) => [Some(a), Some(b), None],
            Split::Three(a, b, c) => [Some(a), Some(b), Some(c)],
        };
        nodes.into_iter().flatten()
    }
}

/// Split `old` into `left` and `right`. `right` always fits in a page;
/// `left` may not, if the large records sit at the low end.
pub fn split2(left: &mut Node, right: &mut Node, old: &Node) {
    let n = old.nkeys();
    assert!(n >= 2, "split2: cannot split a node with {} keys", n);

    let left_bytes = |nleft: u16| HEADER + SLOT_SIZE * nleft as usize + old.offset(nleft) as usize;
    let right_bytes = |nleft: u16| old.nbytes() - left_bytes(nleft) + HEADER;

    // Start from the middle, shrink until the left half fits, then grow
    // until the right half fits.
    let mut nleft = n / 2;
    while nleft > 1 && left_bytes(nleft) > PAGE_SIZE {
        nleft -= 1;
    }
    while nleft < n - 1 && right_bytes(nleft) > PAGE_SIZE {
        nleft += 1;
    }
    assert!(
        right_bytes(nleft) <= PAGE_SIZE,
        "split2: right half of {} bytes exceeds page",
        right_bytes(nleft)
    );

    let nright = n - nleft;
    left.set_header(old.node_type(), nleft);
    left.append_range(old, 0, 0, nleft);
    right.set_header(old.node_type(), nright);
    right.append_range(old, 0, nleft, nright);
}

/// Split `old` into as many pages as needed (at most 3) so that each fits.
pub fn split3(old: Node) -> Split {
    if old.nbytes() <= PAGE_SIZE {
        return Split::One(old);
    }

    let mut left = Node::new();
    let mut right = Node::new();
    split2(&mut left, &mut right, &old);
    if left.nbytes() <= PAGE_SIZE {
        tracing::debug!(
            target: "cowtree::split",
            bytes = old.nbytes(),
            left = left.nkeys(),
            right = right.nkeys(),
            "split node in two"
        );
        return Split::Two(left, right);
    }

    let mut leftleft = Node::new();
    let mut middle = Node::new();
    split2(&mut leftleft, &mut middle, &left);
    assert!(
        leftleft.nbytes() <= PAGE_SIZE,
        "split3: left page of {} bytes exceeds page",
        leftleft.nbytes()
    );
    tracing::debug!(
        target: "cowtree::split",
        bytes = old.nbytes(),
        left = leftleft.nkeys(),
        middle = middle.nkeys(),
        right = right.nkeys(),
        "split node in three"
    );
    Split::Three(leftleft, middle, right)
}
