use std::collections::HashMap;

use crate::error::{Result, TreeError};
use crate::storage::freelist::FreeList;
use crate::storage::page::{PageId, NULL_PAGE, PAGE_SIZE};
use crate::storage::page_store::PageStore;

/// Heap-backed page store.
///
/// Pages live in a hash map keyed by id. Freed ids go to a free list and are
/// reused before new ids are minted, so ids stay small and dense. Counters for
/// allocations and frees let callers observe page churn.
#[derive(Debug)]
pub struct MemoryPageStore {
    pages: HashMap<PageId, Box<[u8]>>,
    freelist: FreeList,
    next_page_id: PageId,
    allocations: u64,
    frees: u64,
}

impl Default for MemoryPageStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPageStore {
    pub fn new() -> Self {
        MemoryPageStore {
            pages: HashMap::new(),
            freelist: FreeList::new(),
            next_page_id: NULL_PAGE + 1,
            allocations: 0,
            frees: 0,
        }
    }

    /// Number of pages currently allocated.
    pub fn live_pages(&self) -> usize {
        self.pages.len()
    }

    /// Total number of successful `allocate` calls.
    pub fn allocations(&self) -> u64 {
        self.allocations
    }

    /// Total number of successful `free` calls.
    pub fn frees(&self) -> u64 {
        self.frees
    }

    pub fn contains(&self, page_id: PageId) -> bool {
        self.pages.contains_key(&page_id)
    }

    fn next_id(&mut self) -> PageId {
        if let Some(id) = self.freelist.allocate() {
            return id;
        }
        let id = self.next_page_id;
        self.next_page_id += 1;
        id
    }
}

impl PageStore for MemoryPageStore {
    fn get(&mut self, page_id: PageId) -> Result<Vec<u8>> {
        self.pages
            .get(&page_id)
            .map(|page| page.to_vec())
            .ok_or(TreeError::PageNotFound(page_id))
    }

    fn allocate(&mut self, page: &[u8]) -> Result<PageId> {
        if page.len() > PAGE_SIZE {
            return Err(TreeError::PageOverflow {
                len: page.len(),
                max: PAGE_SIZE,
            });
        }
        let id = self.next_id();
        self.pages.insert(id, page.into());
        self.allocations += 1;
        Ok(id)
    }

    fn free(&mut self, page_id: PageId) -> Result<()> {
        if self.pages.remove(&page_id).is_none() {
            return Err(TreeError::PageNotFound(page_id));
        }
        self.freelist.free(page_id);
        self.frees += 1;
        Ok(())
    }
}
