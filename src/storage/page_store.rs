use crate::error::Result;
use crate::storage::page::PageId;

/// Abstraction over page I/O.
///
/// Implemented by `MemoryPageStore` (heap-backed) and `CachedPageStore`
/// (LRU read cache in front of another store). The B-tree only ever hands
/// fully built pages to `allocate` and never writes a committed page again.
pub trait PageStore {
    /// Return exactly the bytes previously committed under `page_id`.
    fn get(&mut self, page_id: PageId) -> Result<Vec<u8>>;

    /// Persist `page` and return a fresh id (> 0) unique among live pages.
    fn allocate(&mut self, page: &[u8]) -> Result<PageId>;

    /// Release `page_id`. The id may be handed out again by a later `allocate`.
    fn free(&mut self, page_id: PageId) -> Result<()>;
}

impl<S: PageStore + ?Sized> PageStore for &mut S {
    fn get(&mut self, page_id: PageId) -> Result<Vec<u8>> {
        (**self).get(page_id)
    }

    fn allocate(&mut self, page: &[u8]) -> Result<PageId> {
        (**self).allocate(page)
    }

    fn free(&mut self, page_id: PageId) -> Result<()> {
        (**self).free(page_id)
    }
}
