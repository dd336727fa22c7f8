mod history_store;

use crate::models::Transaction;

pub use history_store::HistoryStore;

/// Newest-first retention of recent transactions.
pub trait History: Send + Sync + 'static {
    /// Inserts at the head, evicting the oldest entries beyond capacity.
    fn append(&self, transaction: Transaction);
    /// Returns up to `limit` entries, newest first, without changing the store.
    fn recent(&self, limit: usize) -> Vec<Transaction>;
    fn clear(&self);
    fn len(&self) -> usize;
}
