use crate::storage::page::PageId;

/// Recycled page ids, handed out again before any fresh id is minted.
#[derive(Debug, Default)]
pub struct FreeList {
    free_pages: Vec<PageId>,
}

impl FreeList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the most recently freed id. Returns None if nothing is free.
    pub fn allocate(&mut self) -> Option<PageId> {
        self.free_pages.pop()
    }

    /// Return an id to the free list.
    /// Panics in debug mode if the id is already free (double-free).
    /// In release mode, silently ignores the duplicate so the id is never
    /// handed out twice.
    pub fn free(&mut self, page_id: PageId) {
        if self.free_pages.contains(&page_id) {
            debug_assert!(
                false,
                "double-free detected: page {} is already in freelist",
                page_id
            );
            return;
        }
        self.free_pages.push(page_id);
    }

    /// Number of free ids.
    pub fn len(&self) -> usize {
        self.free_pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.free_pages.is_empty()
    }
}
