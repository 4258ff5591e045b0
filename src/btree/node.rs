/// B+tree node layout. One node is one page.
///
/// ```text
/// | type: u16 | nkeys: u16 | pointers: nkeys * u64 | offsets: nkeys * u16 | records ... |
/// record: | key_len: u16 | val_len: u16 | key | value |
/// ```
///
/// All integers are little-endian. `offsets[i]` is the byte length of all
/// records before index `i + 1`; the offset of index 0 is implicitly 0 and
/// not stored. Leaves leave their pointer slots zeroed; internal nodes leave
/// their values empty.
///
/// Entry 0 of the leftmost node on every level carries the empty key (the
/// sentinel), so a floor lookup always lands on a valid index.
use std::fmt;

use crate::error::{Result, TreeError};
use crate::storage::page::{PageId, PAGE_SIZE};
use crate::storage::page_store::PageStore;

/// Size of the `type` + `nkeys` header.
pub const HEADER: usize = 4;
pub const MAX_KEY_SIZE: usize = 1000;
pub const MAX_VALUE_SIZE: usize = 3000;

/// Working nodes may overflow a page until they are split.
const WORKING_SIZE: usize = 2 * PAGE_SIZE;

const NODE_TYPE_INTERNAL: u16 = 1;
const NODE_TYPE_LEAF: u16 = 2;

const POINTER_SIZE: usize = 8;
const OFFSET_SIZE: usize = 2;
const RECORD_HEADER_SIZE: usize = 4;

// A node holding a single maximum-size entry must fit in one page.
const _: () = assert!(
    HEADER + POINTER_SIZE + OFFSET_SIZE + RECORD_HEADER_SIZE + MAX_KEY_SIZE + MAX_VALUE_SIZE
        <= PAGE_SIZE
);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Internal,
    Leaf,
}

impl NodeType {
    fn code(self) -> u16 {
        match self {
            NodeType::Internal => NODE_TYPE_INTERNAL,
            NodeType::Leaf => NODE_TYPE_LEAF,
        }
    }

    fn from_code(code: u16) -> Option<Self> {
        match code {
            NODE_TYPE_INTERNAL => Some(NodeType::Internal),
            NODE_TYPE_LEAF => Some(NodeType::Leaf),
            _ => None,
        }
    }
}

/// Bounds-checked view over one encoded node.
///
/// Index arguments are checked against the stored key count; a bad index is
/// a bug in the caller and panics.
#[derive(Clone, PartialEq, Eq)]
pub struct Node {
    data: Vec<u8>,
}

impl Default for Node {
    fn default() -> Self {
        Self::new()
    }
}

impl Node {
    /// A zeroed working buffer, large enough to hold an overflowing node
    /// before it is split. The header must be set before appending.
    pub fn new() -> Self {
        Node {
            data: vec![0u8; WORKING_SIZE],
        }
    }

    /// Wrap the bytes of a committed page, rejecting anything whose header,
    /// offset table or records are inconsistent with its length.
    pub fn from_page(page: Vec<u8>) -> Result<Self> {
        if page.len() < HEADER || page.len() > PAGE_SIZE {
            return Err(TreeError::Corruption(format!(
                "page length {} out of range",
                page.len()
            )));
        }
        let node = Node { data: page };
        let code = node.read_u16(0);
        if NodeType::from_code(code).is_none() {
            return Err(TreeError::Corruption(format!("bad node type {}", code)));
        }

        let n = node.nkeys() as usize;
        if n == 0 {
            return Err(TreeError::Corruption("committed node has no keys".into()));
        }
        let records_start = HEADER + (POINTER_SIZE + OFFSET_SIZE) * n;
        let len = node.data.len();
        if records_start > len {
            return Err(TreeError::Corruption(format!(
                "node with {} keys does not fit in {} bytes",
                n, len
            )));
        }

        let mut offset = 0usize;
        for i in 0..n {
            let pos = records_start + offset;
            if pos + RECORD_HEADER_SIZE > len {
                return Err(TreeError::Corruption(format!(
                    "record {} starts past end of page",
                    i
                )));
            }
            let klen = node.read_u16(pos) as usize;
            let vlen = node.read_u16(pos + 2) as usize;
            let next = offset + RECORD_HEADER_SIZE + klen + vlen;
            let stored = node.read_u16(HEADER + POINTER_SIZE * n + OFFSET_SIZE * i) as usize;
            if records_start + next > len || stored != next {
                return Err(TreeError::Corruption(format!(
                    "record {} offset mismatch (stored {}, computed {})",
                    i, stored, next
                )));
            }
            offset = next;
        }
        Ok(node)
    }

    /// Fetch and validate a committed page.
    pub fn read<S: PageStore + ?Sized>(store: &mut S, page_id: PageId) -> Result<Self> {
        let page = store.get(page_id)?;
        Node::from_page(page).map_err(|err| match err {
            TreeError::Corruption(msg) => TreeError::Corruption(format!("page {}: {}", page_id, msg)),
            other => other,
        })
    }

    /// The encoded page bytes, truncated to `nbytes()`.
    pub fn into_page(mut self) -> Vec<u8> {
        let n = self.nbytes();
        self.data.truncate(n);
        self.data
    }

    pub fn as_page(&self) -> &[u8] {
        &self.data[..self.nbytes()]
    }

    // --- Header ---

    pub fn node_type(&self) -> NodeType {
        let code = self.read_u16(0);
        NodeType::from_code(code).unwrap_or_else(|| panic!("bad node type {}", code))
    }

    pub fn is_leaf(&self) -> bool {
        self.node_type() == NodeType::Leaf
    }

    pub fn nkeys(&self) -> u16 {
        self.read_u16(2)
    }

    pub fn set_header(&mut self, node_type: NodeType, nkeys: u16) {
        self.write_u16(0, node_type.code());
        self.write_u16(2, nkeys);
    }

    // --- Child pointers ---

    pub fn ptr(&self, idx: u16) -> PageId {
        assert!(
            idx < self.nkeys(),
            "ptr: index {} out of bounds (nkeys {})",
            idx,
            self.nkeys()
        );
        let pos = HEADER + POINTER_SIZE * idx as usize;
        let mut buf = [0u8; POINTER_SIZE];
        buf.copy_from_slice(&self.data[pos..pos + POINTER_SIZE]);
        PageId::from_le_bytes(buf)
    }

    pub fn set_ptr(&mut self, idx: u16, ptr: PageId) {
        assert!(
            idx < self.nkeys(),
            "set_ptr: index {} out of bounds (nkeys {})",
            idx,
            self.nkeys()
        );
        let pos = HEADER + POINTER_SIZE * idx as usize;
        self.data[pos..pos + POINTER_SIZE].copy_from_slice(&ptr.to_le_bytes());
    }

    // --- Offset table ---

    fn offset_pos(&self, idx: u16) -> usize {
        let n = self.nkeys();
        assert!(
            1 <= idx && idx <= n,
            "offset: index {} out of bounds (nkeys {})",
            idx,
            n
        );
        HEADER + POINTER_SIZE * n as usize + OFFSET_SIZE * (idx as usize - 1)
    }

    pub fn offset(&self, idx: u16) -> u16 {
        if idx == 0 {
            return 0;
        }
        self.read_u16(self.offset_pos(idx))
    }

    pub fn set_offset(&mut self, idx: u16, offset: u16) {
        let pos = self.offset_pos(idx);
        self.write_u16(pos, offset);
    }

    // --- Records ---

    /// Byte position of record `idx`; `idx == nkeys` is one past the last record.
    pub fn kv_pos(&self, idx: u16) -> usize {
        let n = self.nkeys();
        assert!(idx <= n, "kv_pos: index {} out of bounds (nkeys {})", idx, n);
        HEADER + (POINTER_SIZE + OFFSET_SIZE) * n as usize + self.offset(idx) as usize
    }

    pub fn key(&self, idx: u16) -> &[u8] {
        assert!(
            idx < self.nkeys(),
            "key: index {} out of bounds (nkeys {})",
            idx,
            self.nkeys()
        );
        let pos = self.kv_pos(idx);
        let klen = self.read_u16(pos) as usize;
        let start = pos + RECORD_HEADER_SIZE;
        &self.data[start..start + klen]
    }

    pub fn value(&self, idx: u16) -> &[u8] {
        assert!(
            idx < self.nkeys(),
            "value: index {} out of bounds (nkeys {})",
            idx,
            self.nkeys()
        );
        let pos = self.kv_pos(idx);
        let klen = self.read_u16(pos) as usize;
        let vlen = self.read_u16(pos + 2) as usize;
        let start = pos + RECORD_HEADER_SIZE + klen;
        &self.data[start..start + vlen]
    }

    /// Encoded size of the node.
    pub fn nbytes(&self) -> usize {
        self.kv_pos(self.nkeys())
    }

    /// Write pointer `ptr` and record `(key, val)` at `idx`, and set the
    /// offset of `idx + 1`. Records must be appended in index order.
    pub fn append_kv(&mut self, idx: u16, ptr: PageId, key: &[u8], val: &[u8]) {
        self.set_ptr(idx, ptr);
        let pos = self.kv_pos(idx);
        self.write_u16(pos, key.len() as u16);
        self.write_u16(pos + 2, val.len() as u16);
        let key_start = pos + RECORD_HEADER_SIZE;
        let val_start = key_start + key.len();
        self.data[key_start..val_start].copy_from_slice(key);
        self.data[val_start..val_start + val.len()].copy_from_slice(val);
        let next = self.offset(idx) as usize + RECORD_HEADER_SIZE + key.len() + val.len();
        self.set_offset(idx + 1, next as u16);
    }

    /// Copy `n` entries `src[src_start..]` to `self[dst_start..]`.
    ///
    /// Records are copied as one block; destination offsets are rebased on
    /// the offset already recorded for `dst_start`.
    pub fn append_range(&mut self, src: &Node, dst_start: u16, src_start: u16, n: u16) {
        assert!(
            src_start as usize + n as usize <= src.nkeys() as usize,
            "append_range: source range {}+{} out of bounds (nkeys {})",
            src_start,
            n,
            src.nkeys()
        );
        assert!(
            dst_start as usize + n as usize <= self.nkeys() as usize,
            "append_range: destination range {}+{} out of bounds (nkeys {})",
            dst_start,
            n,
            self.nkeys()
        );
        if n == 0 {
            return;
        }

        for i in 0..n {
            self.set_ptr(dst_start + i, src.ptr(src_start + i));
        }

        let dst_begin = self.offset(dst_start);
        let src_begin = src.offset(src_start);
        for i in 1..=n {
            let offset = dst_begin + (src.offset(src_start + i) - src_begin);
            self.set_offset(dst_start + i, offset);
        }

        let begin = src.kv_pos(src_start);
        let end = src.kv_pos(src_start + n);
        let dst = self.kv_pos(dst_start);
        self.data[dst..dst + (end - begin)].copy_from_slice(&src.data[begin..end]);
    }

    /// `(key, value)` pairs in index order.
    pub fn entries(&self) -> impl Iterator<Item = (&[u8], &[u8])> + '_ {
        (0..self.nkeys()).map(move |i| (self.key(i), self.value(i)))
    }

    /// `(key, child)` pairs in index order.
    pub fn children(&self) -> impl Iterator<Item = (&[u8], PageId)> + '_ {
        (0..self.nkeys()).map(move |i| (self.key(i), self.ptr(i)))
    }

    fn read_u16(&self, pos: usize) -> u16 {
        u16::from_le_bytes([self.data[pos], self.data[pos + 1]])
    }

    fn write_u16(&mut self, pos: usize, value: u16) {
        self.data[pos..pos + 2].copy_from_slice(&value.to_le_bytes());
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let node_type = NodeType::from_code(self.read_u16(0));
        let mut s = f.debug_struct("Node");
        s.field("type", &node_type).field("nkeys", &self.nkeys());
        if node_type.is_some() {
            s.field("nbytes", &self.nbytes());
        }
        s.finish()
    }
}
