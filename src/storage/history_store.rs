use std::collections::VecDeque;

use parking_lot::RwLock;

use crate::models::Transaction;
use crate::storage::History;

pub const DEFAULT_CAPACITY: usize = 100;

/// Fixed-capacity ring buffer of the most recent transactions.
pub struct HistoryStore {
    entries: RwLock<VecDeque<Transaction>>,
    capacity: usize
}

impl HistoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::new()),
            capacity
        }
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl History for HistoryStore {
    fn append(&self, transaction: Transaction) {
        let mut entries = self.entries.write();
        entries.push_front(transaction);
        entries.truncate(self.capacity);
    }

    fn recent(&self, limit: usize) -> Vec<Transaction> {
        self.entries.read().iter().take(limit).cloned().collect()
    }

    fn clear(&self) {
        self.entries.write().clear();
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }
}
