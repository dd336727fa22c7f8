use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

use crate::types::TransactionId;

/// Hands out time-derived identifiers that never repeat within the process.
///
/// The identifier is the current Unix time in milliseconds unless that would not be
/// larger than the previous one, in which case it is the previous one plus one.
pub struct IdGenerator {
    last: AtomicU64
}

impl IdGenerator {
    pub fn new() -> Self {
        Self {
            last: AtomicU64::new(0)
        }
    }

    pub fn next(&self) -> TransactionId {
        let now = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
        let mut previous = self.last.load(Ordering::Acquire);

        loop {
            let candidate = now.max(previous + 1);

            match self.last.compare_exchange_weak(previous, candidate, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => return candidate,
                Err(actual) => previous = actual
            }
        }
    }
}
