use super::*;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{sleep, timeout};

use crate::actors::ViewerEvent;
use crate::config::ServerConfig;
use crate::models::{Mode, Transaction};
use crate::normalizer::Normalizer;
use crate::server::{run, AppContext};
use crate::types::TransactionId;

//NOTE: One generator keeps ids increasing across the transactions a test creates
static NORMALIZER: LazyLock<Normalizer> = LazyLock::new(Normalizer::new);

fn create_transaction(reference: &str, amount: i64) -> Transaction {
    NORMALIZER.normalize(json!({ "transaction_id": reference, "amount": amount, "gateway": "VCB" }))
}

async fn next_delivery(receiver: &mut mpsc::Receiver<ViewerEvent>) -> Result<Delivery> {
    match timeout(Duration::from_secs(30), receiver.recv()).await? {
        Some(ViewerEvent::Delivery(delivery)) => Ok(delivery),
        other => Err(anyhow!("Expected a delivery, got {other:?}"))
    }
}

struct FakeRecent {
    latest: Arc<Mutex<Vec<Transaction>>>,
    calls: Arc<AtomicUsize>
}

#[async_trait]
impl RecentQuery for FakeRecent {
    async fn recent(&self, limit: usize) -> Result<Vec<Transaction>, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        Ok(self.latest.lock().iter().take(limit).cloned().collect())
    }
}

fn create_poll(
    mode: watch::Receiver<Mode>,
    newest_held: watch::Receiver<Option<TransactionId>>,
    latest: Vec<Transaction>
) -> (PollFallback<FakeRecent>, Arc<Mutex<Vec<Transaction>>>, Arc<AtomicUsize>) {
    let latest = Arc::new(Mutex::new(latest));
    let calls = Arc::new(AtomicUsize::new(0));
    let query = FakeRecent { latest: latest.clone(), calls: calls.clone() };

    (PollFallback::new(query, mode, newest_held, Duration::from_secs(10), Duration::from_secs(30)), latest, calls)
}

#[test]
fn test_live_url_follows_the_server_scheme() {
    assert_eq!(live_url("http://localhost:3000"), "ws://localhost:3000/ws");
    assert_eq!(live_url("https://relay.example.vn/"), "wss://relay.example.vn/ws");
    assert_eq!(live_url("ws://127.0.0.1:9"), "ws://127.0.0.1:9/ws");
}

#[test]
fn test_reconnect_delay_doubles_up_to_the_cap() {
    let policy = ReconnectPolicy::default();

    assert_eq!(policy.delay(1), Duration::from_secs(1));
    assert_eq!(policy.delay(2), Duration::from_secs(2));
    assert_eq!(policy.delay(5), Duration::from_secs(16));
    assert_eq!(policy.delay(6), Duration::from_secs(30));
    assert_eq!(policy.delay(40), Duration::from_secs(30));
}

#[test]
fn test_freshness_tolerates_clock_skew() {
    let mut transaction = create_transaction("T1", 1000);
    let now = Utc::now();

    transaction.timestamp = now - chrono::Duration::seconds(10);
    assert!(is_fresh(&transaction, now, Duration::from_secs(30)));

    transaction.timestamp = now - chrono::Duration::seconds(31);
    assert!(!is_fresh(&transaction, now, Duration::from_secs(30)));

    transaction.timestamp = now + chrono::Duration::seconds(5);
    assert!(is_fresh(&transaction, now, Duration::from_secs(30)));
}

#[tokio::test(start_paused = true)]
async fn test_poll_delivers_the_latest_transaction_once() -> Result<()> {
    let (_mode_sender, mode) = watch::channel(Mode::Background);
    let (poll, latest, calls) = create_poll(mode, watch::channel(None).1, vec![create_transaction("T1", 1000)]);
    let (sender, mut receiver) = mpsc::channel(8);

    let task = tokio::spawn(Box::new(poll).run(DeliverySink::new(sender)));

    match next_delivery(&mut receiver).await? {
        Delivery::Transaction { transaction, origin } => {
            assert_eq!(transaction.external_ref.as_deref(), Some("T1"));
            assert_eq!(origin, Origin::Poll);
        }
        other => return Err(anyhow!("Unexpected delivery {other:?}"))
    }

    sleep(Duration::from_secs(35)).await;

    assert!(calls.load(Ordering::SeqCst) >= 3);
    assert!(receiver.try_recv().is_err());

    latest.lock().insert(0, create_transaction("T2", 2000));

    match next_delivery(&mut receiver).await? {
        Delivery::Transaction { transaction, .. } => assert_eq!(transaction.external_ref.as_deref(), Some("T2")),
        other => return Err(anyhow!("Unexpected delivery {other:?}"))
    }

    drop(receiver);
    timeout(Duration::from_secs(30), task).await???;

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_poll_skips_stale_transactions() -> Result<()> {
    let mut stale = create_transaction("T1", 1000);
    stale.timestamp = Utc::now() - chrono::Duration::minutes(5);

    let (_mode_sender, mode) = watch::channel(Mode::Background);
    let (poll, _latest, calls) = create_poll(mode, watch::channel(None).1, vec![stale]);
    let (sender, mut receiver) = mpsc::channel(8);

    tokio::spawn(Box::new(poll).run(DeliverySink::new(sender)));
    sleep(Duration::from_secs(25)).await;

    assert!(calls.load(Ordering::SeqCst) >= 2);
    assert!(receiver.try_recv().is_err());

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_poll_only_fetches_in_the_background() -> Result<()> {
    let (mode_sender, mode) = watch::channel(Mode::Foreground);
    let (poll, _latest, calls) = create_poll(mode, watch::channel(None).1, vec![create_transaction("T1", 1000)]);
    let (sender, mut receiver) = mpsc::channel(8);

    tokio::spawn(Box::new(poll).run(DeliverySink::new(sender)));
    sleep(Duration::from_secs(25)).await;

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(receiver.try_recv().is_err());

    mode_sender.send(Mode::Background)?;

    assert!(matches!(next_delivery(&mut receiver).await?, Delivery::Transaction { origin: Origin::Poll, .. }));

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_poll_skips_what_the_viewer_already_holds() -> Result<()> {
    let held = create_transaction("HELD", 1000);
    let (_mode_sender, mode) = watch::channel(Mode::Background);
    let (newest_sender, newest_held) = watch::channel(Some(held.id));
    let (poll, latest, calls) = create_poll(mode, newest_held, vec![held]);
    let (sender, mut receiver) = mpsc::channel(8);

    tokio::spawn(Box::new(poll).run(DeliverySink::new(sender)));
    sleep(Duration::from_secs(25)).await;

    assert!(calls.load(Ordering::SeqCst) >= 2);
    assert!(receiver.try_recv().is_err());

    let newer = create_transaction("NEWER", 2000);
    latest.lock().insert(0, newer.clone());

    match next_delivery(&mut receiver).await? {
        Delivery::Transaction { transaction, .. } => assert_eq!(transaction.id, newer.id),
        other => return Err(anyhow!("Unexpected delivery {other:?}"))
    }

    newest_sender.send(Some(newer.id))?;
    sleep(Duration::from_secs(25)).await;

    assert!(receiver.try_recv().is_err());

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_relay_forwards_only_in_the_background() -> Result<()> {
    let (mode_sender, mode) = watch::channel(Mode::Foreground);
    let (inbox, relay) = RelayedNotice::channel(8, mode);
    let (sender, mut receiver) = mpsc::channel(8);

    tokio::spawn(Box::new(relay).run(DeliverySink::new(sender)));

    let ignored = serde_json::to_string(&RelayMessage::TransactionRelay(create_transaction("T1", 1000)))?;
    assert!(inbox.post(ignored).await);
    sleep(Duration::from_millis(50)).await;

    mode_sender.send(Mode::Background)?;

    assert!(inbox.post("not json".to_string()).await);
    assert!(inbox.post(r#"{"type":"something-else","data":{}}"#.to_string()).await);

    let forwarded = serde_json::to_string(&RelayMessage::TransactionRelay(create_transaction("T2", 2000)))?;
    assert!(forwarded.contains(r#""type":"transaction-relay""#));
    assert!(inbox.post(forwarded).await);

    match next_delivery(&mut receiver).await? {
        Delivery::Transaction { transaction, origin } => {
            assert_eq!(transaction.external_ref.as_deref(), Some("T2"));
            assert_eq!(origin, Origin::Relay);
        }
        other => return Err(anyhow!("Unexpected delivery {other:?}"))
    }

    assert!(receiver.try_recv().is_err());

    Ok(())
}

#[tokio::test]
async fn test_live_channel_seeds_then_streams() -> Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let address = listener.local_addr()?;
    let context = Arc::new(AppContext::new(ServerConfig::default()));
    let (stop, stopped) = oneshot::channel::<()>();

    context.receive_webhook(json!({ "transaction_id": "EARLY", "amount": 5000 }));

    let server = tokio::spawn(run(listener, context.clone(), async move {
        let _ = stopped.await;
    }));

    let live = LiveChannel::new(live_url(&format!("http://{address}")), ReconnectPolicy::default());
    let (sender, mut receiver) = mpsc::channel(8);
    let client = tokio::spawn(Box::new(live).run(DeliverySink::new(sender)));

    match next_delivery(&mut receiver).await? {
        Delivery::Seed(seed) => {
            assert_eq!(seed.len(), 1);
            assert_eq!(seed[0].external_ref.as_deref(), Some("EARLY"));
        }
        other => return Err(anyhow!("Unexpected delivery {other:?}"))
    }

    context.receive_webhook(json!({ "transaction_id": "LIVE", "amount": 7000 }));

    match next_delivery(&mut receiver).await? {
        Delivery::Transaction { transaction, origin } => {
            assert_eq!(transaction.external_ref.as_deref(), Some("LIVE"));
            assert_eq!(origin, Origin::Live);
        }
        other => return Err(anyhow!("Unexpected delivery {other:?}"))
    }

    drop(receiver);
    timeout(Duration::from_secs(5), client).await???;

    let _ = stop.send(());
    timeout(Duration::from_secs(5), server).await???;

    Ok(())
}

#[tokio::test]
async fn test_live_channel_gives_up_after_the_attempt_limit() -> Result<()> {
    let address = TcpListener::bind("127.0.0.1:0").await?.local_addr()?;
    let policy = ReconnectPolicy {
        max_attempts: 2,
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(20)
    };

    let live = LiveChannel::new(format!("ws://{address}/ws"), policy);
    let (sender, _receiver) = mpsc::channel(8);

    let result = timeout(Duration::from_secs(5), Box::new(live).run(DeliverySink::new(sender))).await?;

    assert!(matches!(result, Err(TransportError::ReconnectExhausted { attempts: 2 })));

    Ok(())
}
