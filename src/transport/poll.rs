use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, warn};

use crate::models::{Mode, Transaction, TransactionsPage};
use crate::transport::{Delivery, DeliverySink, Origin, TransactionSource, TransportError};
use crate::types::TransactionId;

const MIN_INTERVAL: Duration = Duration::from_millis(100);

/// Read access to the relay's recent history.
#[async_trait]
pub trait RecentQuery: Send + Sync + 'static {
    async fn recent(&self, limit: usize) -> Result<Vec<Transaction>, TransportError>;
}

/// `GET /api/transactions` against a relay server.
pub struct HttpRecentQuery {
    client: reqwest::Client,
    url: String
}

impl HttpRecentQuery {
    pub fn new(server: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: format!("{}/api/transactions", server.trim_end_matches('/'))
        }
    }
}

#[async_trait]
impl RecentQuery for HttpRecentQuery {
    async fn recent(&self, limit: usize) -> Result<Vec<Transaction>, TransportError> {
        let page: TransactionsPage = self.client.get(&self.url)
            .query(&[("limit", limit)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(page.transactions)
    }
}

/// Whether a polled transaction is recent enough to be news.
pub fn is_fresh(transaction: &Transaction, now: DateTime<Utc>, freshness: Duration) -> bool {
    match now.signed_duration_since(transaction.timestamp).to_std() {
        Ok(age) => age <= freshness,
        //NOTE: A timestamp ahead of our clock is skew, not age
        Err(_) => true
    }
}

/// Pulls the newest transaction on a fixed interval while the viewer is in the background.
///
/// The latest history entry is only delivered when it is fresh and newer than anything
/// the viewer already holds, otherwise an old transaction would be re-announced just
/// because nothing newer has arrived. Relay ids only ever grow.
pub struct PollFallback<Q> {
    query: Q,
    mode: watch::Receiver<Mode>,
    newest_held: watch::Receiver<Option<TransactionId>>,
    interval: Duration,
    freshness: Duration
}

impl<Q: RecentQuery> PollFallback<Q> {
    pub fn new(
        query: Q,
        mode: watch::Receiver<Mode>,
        newest_held: watch::Receiver<Option<TransactionId>>,
        interval: Duration,
        freshness: Duration
    ) -> Self {
        Self {
            query,
            mode,
            newest_held,
            interval: interval.max(MIN_INTERVAL),
            freshness
        }
    }
}

#[async_trait]
impl<Q: RecentQuery> TransactionSource for PollFallback<Q> {
    fn name(&self) -> &'static str {
        "poll"
    }

    async fn run(self: Box<Self>, sink: DeliverySink) -> Result<(), TransportError> {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_delivered: Option<TransactionId> = None;

        loop {
            tokio::select! {
                _ = sink.closed() => return Ok(()),
                _ = ticker.tick() => {}
            }

            if *self.mode.borrow() != Mode::Background {
                continue;
            }

            //NOTE: Awaited inline and bounded by the interval, a slow answer never overlaps the next poll
            let latest = match timeout(self.interval, self.query.recent(1)).await {
                Ok(Ok(transactions)) => transactions.into_iter().next(),
                Ok(Err(error)) => {
                    warn!("Background poll failed: {error}");
                    continue;
                }
                Err(_) => {
                    warn!("{}", TransportError::PollTimeout(self.interval));
                    continue;
                }
            };

            let Some(latest) = latest else {
                continue;
            };

            let newest_held = (*self.newest_held.borrow()).max(last_delivered);

            if newest_held.is_some_and(|held| latest.id <= held) || !is_fresh(&latest, Utc::now(), self.freshness) {
                debug!("Latest transaction [{}] is not news, skipping", latest.id);
                continue;
            }

            last_delivered = Some(latest.id);

            if !sink.deliver(Delivery::Transaction { transaction: latest, origin: Origin::Poll }).await {
                return Ok(());
            }
        }
    }
}
