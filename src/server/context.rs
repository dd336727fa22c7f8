use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::broadcast::{BroadcastReport, Broadcaster, LiveEvent, Registration, SessionRequest};
use crate::config::ServerConfig;
use crate::models::Transaction;
use crate::normalizer::Normalizer;
use crate::server::ApiError;
use crate::storage::{History, HistoryStore};
use crate::types::{format_vnd, SessionId};

const REQUESTED_HISTORY: usize = 50;

/// Everything the relay handlers share, built once at startup and handed to the router.
pub struct AppContext {
    config: ServerConfig,
    normalizer: Normalizer,
    history: Arc<dyn History>,
    broadcaster: Broadcaster,
    started_at: Instant,
    last_test: Mutex<Option<Instant>>,
    /// Held while publishing and while seeding a new session, so every transaction
    /// reaches a session either in its seed or as a push.
    publishing: Mutex<()>
}

impl AppContext {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            history: Arc::new(HistoryStore::new(config.history_capacity)),
            broadcaster: Broadcaster::new(config.session_buffer),
            normalizer: Normalizer::new(),
            started_at: Instant::now(),
            last_test: Mutex::new(None),
            publishing: Mutex::new(()),
            config
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Normalizes a webhook payload, records it and pushes it to every live session.
    pub fn receive_webhook(&self, payload: Value) -> (Transaction, BroadcastReport) {
        let transaction = self.normalizer.normalize(payload);
        let report = self.publish(&transaction);

        (transaction, report)
    }

    /// Publishes a synthesized test transaction, at most once per cooldown.
    pub fn trigger_test(&self) -> Result<(Transaction, BroadcastReport), ApiError> {
        let now = Instant::now();

        {
            let mut last_test = self.last_test.lock();

            if let Some(previous) = *last_test {
                let elapsed = now.duration_since(previous);
                let cooldown = self.config.test_cooldown();

                if elapsed < cooldown {
                    return Err(ApiError::RateLimited {
                        retry_after_ms: millis(cooldown - elapsed)
                    });
                }
            }

            *last_test = Some(now);
        }

        let transaction = self.normalizer.test_transaction();
        let report = self.publish(&transaction);

        Ok((transaction, report))
    }

    fn publish(&self, transaction: &Transaction) -> BroadcastReport {
        let report = {
            let _publishing = self.publishing.lock();
            self.history.append(transaction.clone());
            self.broadcaster.broadcast(transaction)
        };

        info!(
            id = transaction.id,
            external_ref = transaction.external_ref.as_deref().unwrap_or(""),
            amount = %format_vnd(transaction.amount),
            direction = ?transaction.direction,
            origin = %transaction.origin_brand,
            delivered = report.delivered,
            failed = report.failed,
            "Transaction relayed"
        );

        report
    }

    pub fn recent(&self, limit: usize) -> Vec<Transaction> {
        self.history.recent(limit)
    }

    pub fn total_transactions(&self) -> usize {
        self.history.len()
    }

    pub fn clear_history(&self) {
        self.history.clear();
        info!("Transaction history cleared");
    }

    /// Registers a live session, seeded with the most recent history.
    pub fn register_session(&self) -> Registration {
        let _publishing = self.publishing.lock();

        self.broadcaster.register(self.history.recent(self.config.seed_size))
    }

    pub fn unregister_session(&self, session_id: SessionId) {
        self.broadcaster.unregister(session_id);
    }

    pub fn session_count(&self) -> usize {
        self.broadcaster.session_count()
    }

    /// Builds the reply to a frame a viewer sent over the live channel.
    pub fn answer(&self, request: SessionRequest) -> LiveEvent {
        debug!("Answering live channel request {request:?}");

        match request {
            SessionRequest::GetHistory => LiveEvent::TransactionHistory(self.history.recent(REQUESTED_HISTORY)),
            SessionRequest::Heartbeat => LiveEvent::HeartbeatResponse { server_time: Utc::now() }
        }
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn shutdown(&self) {
        self.broadcaster.close_all();
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
