pub mod cache;
pub mod freelist;
pub mod memory;
pub mod page;
pub mod page_store;
