/// Page geometry shared by the codec and the page stores.
///
/// A committed page is an opaque byte string of at most `PAGE_SIZE` bytes,
/// addressed by a `PageId`. Id 0 never names a live page.

pub const PAGE_SIZE: usize = 4096;

pub type PageId = u64;

/// Page id reserved for "no page" (the root of an empty tree).
pub const NULL_PAGE: PageId = 0;
