use std::sync::Arc;

use anyhow::Result;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tracing::{debug, warn};

use crate::broadcast::{LiveEvent, Registration, SessionRequest};
use crate::server::AppContext;

/// `GET /ws`, the live push channel.
pub async fn live_channel(upgrade: WebSocketUpgrade, State(context): State<Arc<AppContext>>) -> Response {
    upgrade.on_upgrade(move |socket| run_session(socket, context))
}

async fn run_session(socket: WebSocket, context: Arc<AppContext>) {
    let Registration { session_id, mut receiver } = context.register_session();
    let (mut outbound, mut inbound) = socket.split();

    loop {
        tokio::select! {
            event = receiver.recv() => {
                let Some(event) = event else {
                    break;
                };

                if let Err(error) = send_event(&mut outbound, &event).await {
                    debug!("Session [{session_id}] could not be written to: {error}");
                    break;
                }
            }
            frame = inbound.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        let request = match serde_json::from_str::<SessionRequest>(&text) {
                            Ok(request) => request,
                            Err(error) => {
                                debug!("Session [{session_id}] sent an unknown frame: {error}");
                                continue;
                            }
                        };

                        if let Err(error) = send_event(&mut outbound, &context.answer(request)).await {
                            debug!("Session [{session_id}] could not be answered: {error}");
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(error)) => {
                        warn!("Session [{session_id}] read error: {error}");
                        break;
                    }
                }
            }
        }
    }

    context.unregister_session(session_id);
}

async fn send_event(outbound: &mut SplitSink<WebSocket, Message>, event: &LiveEvent) -> Result<()> {
    let text = serde_json::to_string(event)?;
    outbound.send(Message::Text(text)).await?;

    Ok(())
}
