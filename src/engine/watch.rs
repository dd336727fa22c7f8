use anyhow::Result;
use tokio::io::{stdin, AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{info, warn};

use crate::actors::ViewerActor;
use crate::config::ViewerConfig;
use crate::engine::Multiplexer;
use crate::models::Mode;
use crate::presentation::{terminal_channels, DedupCache, Dispatcher, DispatcherConfig};
use crate::transport::{live_url, HttpRecentQuery, LiveChannel, PollFallback, ReconnectPolicy, RelayedNotice};

const EVENT_BUFFER: usize = 256;
const RELAY_BUFFER: usize = 16;

/// A line typed on the viewer's stdin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Control {
    Foreground,
    Background,
    /// A raw message, as a host background script would post it.
    Relay(String),
    Quit
}

pub fn parse_control(line: &str) -> Option<Control> {
    let line = line.trim();

    if let Some(message) = line.strip_prefix("relay ") {
        return Some(Control::Relay(message.trim().to_string()));
    }

    match line.to_lowercase().as_str() {
        "f" | "foreground" => Some(Control::Foreground),
        "b" | "background" => Some(Control::Background),
        "q" | "quit" => Some(Control::Quit),
        _ => None
    }
}

/// Connects to a relay server and presents its transactions in this terminal until
/// `q` or Ctrl-C.
pub async fn watch(config: ViewerConfig) -> Result<()> {
    let initial = if config.background { Mode::Background } else { Mode::Foreground };

    let dispatcher = Dispatcher::new(
        DispatcherConfig {
            background_speech: config.background_speech,
            ..DispatcherConfig::default()
        },
        terminal_channels(),
        initial
    );
    let dedup = DedupCache::new(config.dedup_window(), config.dedup_capacity);
    let (viewer, summary) = ViewerActor::spawn(dedup, dispatcher, EVENT_BUFFER);

    let policy = ReconnectPolicy {
        max_attempts: config.max_reconnect_attempts,
        ..ReconnectPolicy::default()
    };
    let (inbox, relay) = RelayedNotice::channel(RELAY_BUFFER, viewer.subscribe_mode());

    let mut multiplexer = Multiplexer::new()
        .with_source(LiveChannel::new(live_url(&config.server), policy))
        .with_source(relay);

    if !config.no_poll {
        let query = HttpRecentQuery::new(&config.server);
        let poll = PollFallback::new(query, viewer.subscribe_mode(), viewer.subscribe_newest_held(), config.poll_interval(), config.freshness());
        multiplexer = multiplexer.with_source(poll);
    }

    info!("Watching [{}] with {} sources in {initial:?} mode, type f, b, relay <json> or q", config.server, multiplexer.len());

    let sources = tokio::spawn(multiplexer.run(viewer.sink()));
    let mut lines = BufReader::new(stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => break,
            line = lines.next_line(), if stdin_open => {
                let Some(line) = line? else {
                    stdin_open = false;
                    continue;
                };

                match parse_control(&line) {
                    Some(Control::Foreground) => { viewer.set_mode(Mode::Foreground).await; }
                    Some(Control::Background) => { viewer.set_mode(Mode::Background).await; }
                    Some(Control::Relay(message)) => { inbox.post(message).await; }
                    Some(Control::Quit) => break,
                    None if line.trim().is_empty() => {}
                    None => warn!("Unknown command [{}], type f, b, relay <json> or q", line.trim())
                }
            }
        }
    }

    viewer.stop().await;

    let summary = summary.await?;
    sources.await?;

    info!("Presented {} transactions, suppressed {} duplicates", summary.presented, summary.suppressed);

    Ok(())
}
