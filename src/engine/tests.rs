use super::{parse_control, Control, Multiplexer};

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::{sleep, timeout};

use crate::actors::{ViewerActor, ViewerSummary};
use crate::config::ServerConfig;
use crate::models::{Mode, Transaction};
use crate::normalizer::Normalizer;
use crate::presentation::{
    Channels, DedupCache, Dispatcher, DispatcherConfig, MockAudioCue, MockHaptics, MockListView, MockNotifier, PresentationError, SpeechEngine, Utterance
};
use crate::server::{run, AppContext};
use crate::transport::{
    live_url, Delivery, DeliverySink, HttpRecentQuery, LiveChannel, Origin, PollFallback, ReconnectPolicy, RecentQuery, RelayMessage, RelayedNotice, TransactionSource,
    TransportError
};

struct SilentSpeech;

#[async_trait]
impl SpeechEngine for SilentSpeech {
    async fn speak(&self, _utterance: &Utterance) -> Result<(), PresentationError> {
        Ok(())
    }

    fn cancel(&self) {}
}

struct IdleSource;

#[async_trait]
impl TransactionSource for IdleSource {
    fn name(&self) -> &'static str {
        "idle"
    }

    async fn run(self: Box<Self>, sink: DeliverySink) -> Result<(), TransportError> {
        sink.closed().await;
        Ok(())
    }
}

struct FailingSource;

#[async_trait]
impl TransactionSource for FailingSource {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn run(self: Box<Self>, _sink: DeliverySink) -> Result<(), TransportError> {
        Err(TransportError::ReconnectExhausted { attempts: 1 })
    }
}

struct FixedRecent(Vec<Transaction>);

#[async_trait]
impl RecentQuery for FixedRecent {
    async fn recent(&self, limit: usize) -> Result<Vec<Transaction>, TransportError> {
        Ok(self.0.iter().take(limit).cloned().collect())
    }
}

fn counting_channels(presentations: usize) -> Channels {
    let mut audio = MockAudioCue::new();
    audio.expect_play().times(presentations).returning(|| Ok(()));

    let mut notifier = MockNotifier::new();
    notifier.expect_notify().times(presentations).returning(|_| Ok(()));

    let mut haptics = MockHaptics::new();
    haptics.expect_vibrate().returning(|_| Ok(()));

    let mut view = MockListView::new();
    view.expect_render().returning(|_, _| Ok(()));

    Channels {
        audio: Arc::new(audio),
        speech: Arc::new(SilentSpeech),
        notifier: Arc::new(notifier),
        haptics: Arc::new(haptics),
        view: Arc::new(view)
    }
}

#[test]
fn test_parse_control_lines() {
    assert_eq!(parse_control("f"), Some(Control::Foreground));
    assert_eq!(parse_control(" Background "), Some(Control::Background));
    assert_eq!(parse_control("q"), Some(Control::Quit));
    assert_eq!(parse_control(r#"relay {"type":"transaction-relay"}"#), Some(Control::Relay(r#"{"type":"transaction-relay"}"#.to_string())));
    assert_eq!(parse_control("louder"), None);
    assert_eq!(parse_control(""), None);
}

#[tokio::test]
async fn test_multiplexer_outlives_failing_sources_and_stops_with_the_viewer() -> Result<()> {
    let dispatcher = Dispatcher::new(DispatcherConfig::default(), counting_channels(0), Mode::Foreground);
    let (viewer, summary) = ViewerActor::spawn(DedupCache::new(Duration::from_secs(3), 100), dispatcher, 16);

    let multiplexer = Multiplexer::new()
        .with_source(IdleSource)
        .with_source(FailingSource);

    assert_eq!(multiplexer.len(), 2);

    let sources = tokio::spawn(multiplexer.run(viewer.sink()));
    sleep(Duration::from_millis(50)).await;

    assert!(!sources.is_finished());

    viewer.stop().await;

    assert_eq!(summary.await?, ViewerSummary::default());
    timeout(Duration::from_secs(5), sources).await??;

    Ok(())
}

#[tokio::test]
async fn test_three_transports_converge_on_one_presentation() -> Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let server_url = format!("http://{}", listener.local_addr()?);
    let context = Arc::new(AppContext::new(ServerConfig::default()));
    let (stop, stopped) = oneshot::channel::<()>();

    let server = tokio::spawn(run(listener, context.clone(), async move {
        let _ = stopped.await;
    }));

    let dispatcher = Dispatcher::new(DispatcherConfig::default(), counting_channels(1), Mode::Background);
    let (viewer, summary) = ViewerActor::spawn(DedupCache::new(Duration::from_secs(3), 100), dispatcher, 64);
    let (inbox, relay) = RelayedNotice::channel(8, viewer.subscribe_mode());
    let query = HttpRecentQuery::new(&server_url);
    let poll = PollFallback::new(query, viewer.subscribe_mode(), viewer.subscribe_newest_held(), Duration::from_millis(200), Duration::from_secs(30));

    let multiplexer = Multiplexer::new()
        .with_source(LiveChannel::new(live_url(&server_url), ReconnectPolicy::default()))
        .with_source(relay)
        .with_source(poll);

    let sources = tokio::spawn(multiplexer.run(viewer.sink()));

    timeout(Duration::from_secs(5), async {
        while context.session_count() == 0 {
            sleep(Duration::from_millis(10)).await;
        }
    }).await?;

    let (transaction, report) = context.receive_webhook(json!({ "transaction_id": "T1", "amount": 1000, "gateway": "MBBANK" }));
    assert_eq!(report.delivered, 1);

    assert!(inbox.post(serde_json::to_string(&RelayMessage::TransactionRelay(transaction))?).await);

    sleep(Duration::from_secs(1)).await;

    viewer.stop().await;

    //NOTE: The poll only delivers when it fetched before the live push reached the viewer
    let summary = summary.await?;
    assert_eq!(summary.presented, 1);
    assert!((1..=2).contains(&summary.suppressed));
    timeout(Duration::from_secs(5), sources).await??;

    let _ = stop.send(());
    timeout(Duration::from_secs(5), server).await???;

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_poll_does_not_announce_seeded_history() -> Result<()> {
    let dispatcher = Dispatcher::new(DispatcherConfig::default(), counting_channels(0), Mode::Background);
    let (viewer, summary) = ViewerActor::spawn(DedupCache::new(Duration::from_secs(3), 100), dispatcher, 16);
    let seeded = Normalizer::new().normalize(json!({ "transaction_id": "T1", "amount": 1000 }));

    assert!(viewer.sink().deliver(Delivery::Seed(vec![seeded.clone()])).await);
    sleep(Duration::from_millis(100)).await;

    let poll = PollFallback::new(FixedRecent(vec![seeded]), viewer.subscribe_mode(), viewer.subscribe_newest_held(), Duration::from_secs(10), Duration::from_secs(30));
    let sources = tokio::spawn(Multiplexer::new().with_source(poll).run(viewer.sink()));

    sleep(Duration::from_secs(25)).await;
    viewer.stop().await;

    assert_eq!(summary.await?, ViewerSummary { presented: 0, suppressed: 0, seeded: 1 });
    timeout(Duration::from_secs(5), sources).await??;

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_poll_does_not_repeat_a_live_announcement_after_backgrounding() -> Result<()> {
    let dispatcher = Dispatcher::new(DispatcherConfig::default(), counting_channels(1), Mode::Foreground);
    let (viewer, summary) = ViewerActor::spawn(DedupCache::new(Duration::from_secs(3), 100), dispatcher, 16);
    let transaction = Normalizer::new().normalize(json!({ "transaction_id": "T1", "amount": 1000 }));

    assert!(viewer.sink().deliver(Delivery::Transaction { transaction: transaction.clone(), origin: Origin::Live }).await);
    assert!(viewer.set_mode(Mode::Background).await);
    sleep(Duration::from_millis(100)).await;

    let poll = PollFallback::new(FixedRecent(vec![transaction]), viewer.subscribe_mode(), viewer.subscribe_newest_held(), Duration::from_secs(10), Duration::from_secs(30));
    let sources = tokio::spawn(Multiplexer::new().with_source(poll).run(viewer.sink()));

    sleep(Duration::from_secs(25)).await;
    viewer.stop().await;

    assert_eq!(summary.await?, ViewerSummary { presented: 1, suppressed: 0, seeded: 0 });
    timeout(Duration::from_secs(5), sources).await??;

    Ok(())
}
