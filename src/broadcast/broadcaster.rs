use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

use crate::broadcast::{BroadcastError, LiveEvent};
use crate::models::Transaction;
use crate::types::SessionId;

/// A live session's handle on the broadcaster. Dropping the receiver closes the session.
pub struct Registration {
    pub session_id: SessionId,
    pub receiver: mpsc::Receiver<LiveEvent>
}

/// Outcome of pushing one transaction to every registered session.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Serialize)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: usize
}

/// Fans new transactions out to every connected live session.
///
/// Delivery is best-effort per session: a full or closed session is logged and
/// counted, never retried, and never stops delivery to the others. Closed sessions
/// are dropped from the registry after the pass.
pub struct Broadcaster {
    sessions: DashMap<SessionId, mpsc::Sender<LiveEvent>>,
    next_session: AtomicU64,
    buffer: usize
}

impl Broadcaster {
    pub fn new(buffer: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            next_session: AtomicU64::new(1),
            buffer: buffer.max(1)
        }
    }

    /// Registers a session and queues `seed` as its first frame when non-empty.
    pub fn register(&self, seed: Vec<Transaction>) -> Registration {
        let session_id = self.next_session.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel(self.buffer);

        if !seed.is_empty() {
            let seeded = seed.len();

            if let Err(error) = deliver(session_id, &sender, LiveEvent::TransactionHistory(seed)) {
                warn!("Could not seed session [{session_id}] with history: {error}");
            } else {
                debug!("Seeded session [{session_id}] with [{seeded}] transactions");
            }
        }

        self.sessions.insert(session_id, sender);
        info!(session = session_id, connected = self.sessions.len(), "Live session registered");

        Registration { session_id, receiver }
    }

    pub fn unregister(&self, session_id: SessionId) {
        if self.sessions.remove(&session_id).is_some() {
            info!(session = session_id, connected = self.sessions.len(), "Live session unregistered");
        }
    }

    pub fn broadcast(&self, transaction: &Transaction) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        let mut closed = Vec::new();

        for session in self.sessions.iter() {
            let session_id = *session.key();

            match deliver(session_id, session.value(), LiveEvent::NewTransaction(transaction.clone())) {
                Ok(()) => report.delivered += 1,
                Err(error) => {
                    warn!("Transaction [{}] missed a session: {error}", transaction.id);
                    report.failed += 1;

                    if matches!(error, BroadcastError::Closed { .. }) {
                        closed.push(session_id);
                    }
                }
            }
        }

        //NOTE: Removing while iterating would deadlock the shard we are holding
        for session_id in closed {
            self.unregister(session_id);
        }

        report
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Drops every session sender so the session loops wind down.
    pub fn close_all(&self) {
        let count = self.sessions.len();
        self.sessions.clear();
        info!("Closed [{count}] live sessions");
    }
}

fn deliver(session_id: SessionId, sender: &mpsc::Sender<LiveEvent>, event: LiveEvent) -> Result<(), BroadcastError> {
    sender.try_send(event).map_err(|error| match error {
        TrySendError::Full(_) => BroadcastError::Full { session_id },
        TrySendError::Closed(_) => BroadcastError::Closed { session_id }
    })
}
