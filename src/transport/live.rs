use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::{interval_at, sleep, Instant};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::broadcast::{LiveEvent, SessionRequest};
use crate::transport::{Delivery, DeliverySink, Origin, TransactionSource, TransportError};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(25);

/// Turns a relay base URL into its live channel URL.
pub fn live_url(server: &str) -> String {
    let base = server.trim_end_matches('/');

    let base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base.to_string()
    };

    format!("{base}/ws")
}

/// Bounded exponential backoff between live channel connection attempts.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration
}

impl ReconnectPolicy {
    /// Delay before the given reconnect attempt, counting from 1.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_delay.saturating_mul(1 << exponent).min(self.max_delay)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30)
        }
    }
}

enum SessionEnd {
    ViewerGone,
    Disconnected
}

/// The persistent push connection to the relay.
///
/// Events pushed while the connection was down are lost; the history seed the server
/// sends on every (re)connect is how the viewer catches up.
pub struct LiveChannel {
    url: String,
    policy: ReconnectPolicy,
    heartbeat: Duration
}

impl LiveChannel {
    pub fn new(url: impl Into<String>, policy: ReconnectPolicy) -> Self {
        Self {
            url: url.into(),
            policy,
            heartbeat: HEARTBEAT_INTERVAL
        }
    }

    async fn pump(&self, socket: WebSocketStream<MaybeTlsStream<TcpStream>>, sink: &DeliverySink) -> SessionEnd {
        let (mut outbound, mut inbound) = socket.split();
        let mut heartbeat = interval_at(Instant::now() + self.heartbeat, self.heartbeat);

        loop {
            tokio::select! {
                _ = sink.closed() => return SessionEnd::ViewerGone,
                _ = heartbeat.tick() => {
                    let frame = match serde_json::to_string(&SessionRequest::Heartbeat) {
                        Ok(frame) => frame,
                        Err(error) => {
                            warn!("Could not encode heartbeat: {error}");
                            continue;
                        }
                    };

                    if let Err(error) = outbound.send(Message::Text(frame)).await {
                        warn!("Live channel heartbeat failed: {error}");
                        return SessionEnd::Disconnected;
                    }
                }
                frame = inbound.next() => {
                    let text = match frame {
                        Some(Ok(Message::Text(text))) => text,
                        Some(Ok(Message::Close(_))) | None => return SessionEnd::Disconnected,
                        Some(Ok(_)) => continue,
                        Some(Err(error)) => {
                            warn!("Live channel read error: {error}");
                            return SessionEnd::Disconnected;
                        }
                    };

                    let delivery = match serde_json::from_str::<LiveEvent>(&text) {
                        Ok(LiveEvent::NewTransaction(transaction)) => Delivery::Transaction { transaction, origin: Origin::Live },
                        Ok(LiveEvent::TransactionHistory(seed)) => Delivery::Seed(seed),
                        Ok(LiveEvent::HeartbeatResponse { server_time }) => {
                            debug!("Heartbeat answered at {server_time}");
                            continue;
                        }
                        Err(error) => {
                            warn!("Live channel sent an unreadable frame: {error}");
                            continue;
                        }
                    };

                    if !sink.deliver(delivery).await {
                        return SessionEnd::ViewerGone;
                    }
                }
            }
        }
    }
}

#[async_trait]
impl TransactionSource for LiveChannel {
    fn name(&self) -> &'static str {
        "live"
    }

    async fn run(self: Box<Self>, sink: DeliverySink) -> Result<(), TransportError> {
        let mut attempt = 0;

        loop {
            let connected = tokio::select! {
                _ = sink.closed() => return Ok(()),
                connected = connect_async(self.url.as_str()) => connected
            };

            match connected {
                Ok((socket, _response)) => {
                    info!("Connected to live channel at [{}]", self.url);
                    attempt = 0;

                    match self.pump(socket, &sink).await {
                        SessionEnd::ViewerGone => return Ok(()),
                        SessionEnd::Disconnected => warn!("Live channel disconnected, pushes until the next seed may be missed")
                    }
                }
                Err(error) => warn!("Live channel connection to [{}] failed: {error}", self.url)
            }

            attempt += 1;

            if attempt > self.policy.max_attempts {
                return Err(TransportError::ReconnectExhausted { attempts: self.policy.max_attempts });
            }

            let delay = self.policy.delay(attempt);
            info!(attempt, ?delay, "Reconnecting live channel");

            tokio::select! {
                _ = sink.closed() => return Ok(()),
                _ = sleep(delay) => {}
            }
        }
    }
}
