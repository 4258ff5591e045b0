use std::num::NonZeroUsize;

use lru::LruCache;

use crate::error::Result;
use crate::storage::page::PageId;
use crate::storage::page_store::PageStore;

/// Default LRU cache capacity, in pages.
pub const DEFAULT_CACHE_CAPACITY: NonZeroUsize = match NonZeroUsize::new(256) {
    Some(n) => n,
    None => panic!("cache capacity must be non-zero"),
};

/// LRU read cache in front of another page store.
///
/// Committed pages are immutable, so a cached copy stays valid until the id
/// is freed. Allocations are written through and seeded into the cache,
/// since the tree usually reads a freshly committed page on the next call.
pub struct CachedPageStore<S: PageStore> {
    inner: S,
    cache: LruCache<PageId, Vec<u8>>,
    hits: u64,
    misses: u64,
}

impl<S: PageStore> CachedPageStore<S> {
    pub fn new(inner: S, capacity: NonZeroUsize) -> Self {
        CachedPageStore {
            inner,
            cache: LruCache::new(capacity),
            hits: 0,
            misses: 0,
        }
    }

    pub fn with_default_capacity(inner: S) -> Self {
        Self::new(inner, DEFAULT_CACHE_CAPACITY)
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    /// Number of pages currently cached.
    pub fn cached_pages(&self) -> usize {
        self.cache.len()
    }
}

impl<S: PageStore> PageStore for CachedPageStore<S> {
    fn get(&mut self, page_id: PageId) -> Result<Vec<u8>> {
        if let Some(page) = self.cache.get(&page_id) {
            self.hits += 1;
            return Ok(page.clone());
        }
        self.misses += 1;
        let page = self.inner.get(page_id)?;
        self.cache.put(page_id, page.clone());
        Ok(page)
    }

    fn allocate(&mut self, page: &[u8]) -> Result<PageId> {
        let page_id = self.inner.allocate(page)?;
        self.cache.put(page_id, page.to_vec());
        Ok(page_id)
    }

    fn free(&mut self, page_id: PageId) -> Result<()> {
        self.cache.pop(&page_id);
        self.inner.free(page_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TreeError;
    use crate::storage::memory::MemoryPageStore;

    fn small_cache() -> CachedPageStore<MemoryPageStore> {
        CachedPageStore::new(MemoryPageStore::new(), NonZeroUsize::new(2).unwrap())
    }

    #[test]
    fn test_allocated_pages_are_cached() {
        let mut store = small_cache();
        let id = store.allocate(b"page").unwrap();
        assert_eq!(store.get(id).unwrap(), b"page".to_vec());
        assert_eq!(store.hits(), 1);
        assert_eq!(store.misses(), 0);
    }

    #[test]
    fn test_eviction_falls_back_to_inner() {
        let mut store = small_cache();
        let a = store.allocate(b"a").unwrap();
        let _b = store.allocate(b"b").unwrap();
        let _c = store.allocate(b"c").unwrap();
        assert_eq!(store.cached_pages(), 2);

        // `a` was evicted by `c`
        assert_eq!(store.get(a).unwrap(), b"a".to_vec());
        assert_eq!(store.misses(), 1);
        assert_eq!(store.get(a).unwrap(), b"a".to_vec());
        assert_eq!(store.hits(), 1);
    }

    #[test]
    fn test_free_evicts_cached_copy() {
        let mut store = small_cache();
        let id = store.allocate(b"gone").unwrap();
        store.free(id).unwrap();
        assert_eq!(store.cached_pages(), 0);
        assert!(matches!(store.get(id), Err(TreeError::PageNotFound(_))));
        assert_eq!(store.inner().live_pages(), 0);
    }
}
