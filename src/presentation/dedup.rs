use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::models::Transaction;

/// The identity a transaction is deduplicated by, whichever transport carried it.
///
/// Without an external reference the key falls back to brand, amount and the
/// normalization time. The relay stamps that time once, so every transport carries the
/// same value for the same event.
pub fn identity_key(transaction: &Transaction) -> String {
    match transaction.external_ref.as_deref().map(str::trim).filter(|reference| !reference.is_empty()) {
        Some(reference) => format!("ref:{reference}"),
        None => format!(
            "{}|{}|{}",
            transaction.origin_brand,
            transaction.amount.normalize(),
            transaction.timestamp.timestamp_millis()
        )
    }
}

/// Time-windowed record of the identities already presented.
pub struct DedupCache {
    marks: HashMap<String, Instant>,
    window: Duration,
    capacity: usize
}

impl DedupCache {
    pub fn new(window: Duration, capacity: usize) -> Self {
        Self {
            marks: HashMap::new(),
            window,
            capacity: capacity.max(1)
        }
    }

    /// Returns true and marks the identity when it was not seen within the window.
    pub fn should_present(&mut self, transaction: &Transaction) -> bool {
        self.should_present_at(transaction, Instant::now())
    }

    pub fn should_present_at(&mut self, transaction: &Transaction, now: Instant) -> bool {
        let key = identity_key(transaction);

        if let Some(marked) = self.marks.get(&key) {
            if now.saturating_duration_since(*marked) <= self.window {
                return false;
            }
        }

        self.mark_key(key, now);

        true
    }

    /// Marks an identity as presented without presenting it.
    pub fn mark(&mut self, transaction: &Transaction) {
        self.mark_key(identity_key(transaction), Instant::now());
    }

    pub fn len(&self) -> usize {
        self.marks.len()
    }

    fn mark_key(&mut self, key: String, now: Instant) {
        self.marks.insert(key, now);

        if self.marks.len() > self.capacity {
            self.evict_oldest_half();
        }
    }

    fn evict_oldest_half(&mut self) {
        let mut by_age: Vec<(Instant, String)> = self.marks.iter()
            .map(|(key, marked)| (*marked, key.clone()))
            .collect();
        by_age.sort();

        let evicted = by_age.len() / 2;

        for (_, key) in by_age.into_iter().take(evicted) {
            self.marks.remove(&key);
        }

        debug!("Evicted [{evicted}] dedup marks");
    }
}
