use std::cmp::Reverse;
use std::collections::HashSet;

use rust_decimal::Decimal;

use crate::models::Transaction;

pub const DEFAULT_LIST_CAPACITY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stats {
    pub count: usize,
    /// Sum of the credit amounts currently in the list.
    pub credit_total: Decimal
}

/// The viewer's newest-first list, kept current even while nothing renders it.
pub struct RetainedList {
    items: Vec<Transaction>,
    capacity: usize
}

impl RetainedList {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            capacity
        }
    }

    pub fn push(&mut self, transaction: Transaction) {
        self.items.insert(0, transaction);
        self.items.truncate(self.capacity);
    }

    /// Merges a history seed, keeping one entry per id, newest first.
    pub fn merge_seed(&mut self, seed: Vec<Transaction>) {
        let mut seen = HashSet::new();
        let mut merged: Vec<Transaction> = self.items.drain(..)
            .chain(seed)
            .filter(|transaction| seen.insert(transaction.id))
            .collect();

        merged.sort_by_key(|transaction| Reverse((transaction.timestamp, transaction.id)));
        merged.truncate(self.capacity);

        self.items = merged;
    }

    pub fn items(&self) -> &[Transaction] {
        &self.items
    }

    pub fn stats(&self) -> Stats {
        Stats {
            count: self.items.len(),
            credit_total: self.items.iter()
                .filter(|transaction| transaction.is_credit())
                .map(|transaction| transaction.amount)
                .sum()
        }
    }
}

impl Default for RetainedList {
    fn default() -> Self {
        Self::new(DEFAULT_LIST_CAPACITY)
    }
}
