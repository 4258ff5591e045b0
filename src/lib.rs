//! cowtree: copy-on-write B+Tree over fixed-size pages
//!
//! An ordered byte-string map stored as a tree of 4 KiB pages:
//! - Nodes are rebuilt, never modified in place; each update installs a new root
//! - Overflowing nodes split into up to three pages
//! - Undersized nodes merge with a sibling after deletes
//! - Storage is pluggable through the `PageStore` trait

pub mod error;
pub mod storage;
pub mod btree;

pub use crate::btree::{BTree, TreeOptions, TreeStats};
pub use crate::error::{Result, TreeError};
pub use crate::storage::cache::CachedPageStore;
pub use crate::storage::memory::MemoryPageStore;
pub use crate::storage::page::{PageId, PAGE_SIZE};
pub use crate::storage::page_store::PageStore;
