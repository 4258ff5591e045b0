use crate::btree::node::Node;
use crate::error::Result;
use crate::storage::page::PageId;
use crate::storage::page_store::PageStore;

/// Pages touched by one insert or delete.
///
/// New pages are allocated as the descent commits them. Pages of the old
/// version are only retired here and freed once the new root is installed,
/// so a failed call can drop everything it allocated and leave the old tree
/// intact.
#[derive(Debug, Default)]
pub(crate) struct PageLedger {
    allocated: Vec<PageId>,
    retired: Vec<PageId>,
}

impl PageLedger {
    pub(crate) fn commit<S: PageStore + ?Sized>(&mut self, store: &mut S, node: &Node) -> Result<PageId> {
        let page_id = store.allocate(node.as_page())?;
        self.allocated.push(page_id);
        Ok(page_id)
    }

    pub(crate) fn retire(&mut self, page_id: PageId) {
        self.retired.push(page_id);
    }

    /// Free the retired pages. Called after the new root is installed; every
    /// page is attempted and the first failure is returned.
    pub(crate) fn release<S: PageStore + ?Sized>(self, store: &mut S) -> Result<()> {
        let mut first_err = None;
        for page_id in self.retired {
            if let Err(err) = store.free(page_id) {
                tracing::warn!(
                    target: "cowtree::ledger",
                    page = page_id,
                    error = %err,
                    "failed to free retired page"
                );
                first_err.get_or_insert(err);
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Undo a failed call: free what it allocated, keep the old version.
    pub(crate) fn rollback<S: PageStore + ?Sized>(self, store: &mut S) {
        tracing::debug!(
            target: "cowtree::ledger",
            allocated = self.allocated.len(),
            "rolling back failed tree update"
        );
        for page_id in self.allocated {
            if let Err(err) = store.free(page_id) {
                tracing::warn!(
                    target: "cowtree::ledger",
                    page = page_id,
                    error = %err,
                    "failed to free page during rollback"
                );
            }
        }
    }
}
