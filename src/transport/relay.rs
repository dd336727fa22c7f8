use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use crate::models::{Mode, Transaction};
use crate::transport::{Delivery, DeliverySink, Origin, TransactionSource, TransportError};

/// Message a host background script forwards to the viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum RelayMessage {
    TransactionRelay(Transaction)
}

/// Where the host's background script posts raw relay messages.
#[derive(Clone)]
pub struct RelayInbox {
    sender: mpsc::Sender<String>
}

impl RelayInbox {
    /// Returns false once the relayed notice source has stopped.
    pub async fn post(&self, message: String) -> bool {
        self.sender.send(message).await.is_ok()
    }
}

/// Notices relayed by a background script that outlives the viewing surface.
///
/// Only forwarded while the viewer is in the background, in the foreground the live
/// channel already delivers the same transaction.
pub struct RelayedNotice {
    inbox: mpsc::Receiver<String>,
    mode: watch::Receiver<Mode>
}

impl RelayedNotice {
    pub fn channel(buffer: usize, mode: watch::Receiver<Mode>) -> (RelayInbox, RelayedNotice) {
        let (sender, inbox) = mpsc::channel(buffer.max(1));

        (RelayInbox { sender }, RelayedNotice { inbox, mode })
    }
}

#[async_trait]
impl TransactionSource for RelayedNotice {
    fn name(&self) -> &'static str {
        "relay"
    }

    async fn run(mut self: Box<Self>, sink: DeliverySink) -> Result<(), TransportError> {
        loop {
            let message = tokio::select! {
                _ = sink.closed() => return Ok(()),
                message = self.inbox.recv() => message
            };

            let Some(message) = message else {
                return Ok(());
            };

            let transaction = match serde_json::from_str::<RelayMessage>(&message) {
                Ok(RelayMessage::TransactionRelay(transaction)) => transaction,
                Err(error) => {
                    warn!("Ignoring unreadable relay message: {error}");
                    continue;
                }
            };

            if *self.mode.borrow() != Mode::Background {
                debug!("Relayed transaction [{}] ignored in the foreground", transaction.id);
                continue;
            }

            if !sink.deliver(Delivery::Transaction { transaction, origin: Origin::Relay }).await {
                return Ok(());
            }
        }
    }
}
