mod errors;
mod live;
mod poll;
mod relay;
#[cfg(test)]
mod tests;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::actors::ViewerEvent;
use crate::models::Transaction;

pub use errors::TransportError;
pub use live::{live_url, LiveChannel, ReconnectPolicy};
pub use poll::{is_fresh, HttpRecentQuery, PollFallback, RecentQuery};
pub use relay::{RelayInbox, RelayMessage, RelayedNotice};

/// Which transport carried a delivery.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Origin {
    Live,
    Poll,
    Relay
}

#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    /// A transaction that may need announcing.
    Transaction {
        transaction: Transaction,
        origin: Origin
    },
    /// Recent history sent by the server when the live channel (re)connects.
    Seed(Vec<Transaction>)
}

/// The single handler every transport feeds into.
#[derive(Clone)]
pub struct DeliverySink {
    sender: mpsc::Sender<ViewerEvent>
}

impl DeliverySink {
    pub fn new(sender: mpsc::Sender<ViewerEvent>) -> Self {
        Self { sender }
    }

    /// Hands a delivery to the viewer. Returns false once the viewer has stopped.
    pub async fn deliver(&self, delivery: Delivery) -> bool {
        self.sender.send(ViewerEvent::Delivery(delivery)).await.is_ok()
    }

    /// Resolves when the viewer has stopped listening.
    pub async fn closed(&self) {
        self.sender.closed().await
    }
}

/// A producer of transaction notices.
///
/// Sources never decide whether something gets presented and never look at what other
/// sources delivered, duplicates are filtered downstream.
#[async_trait]
pub trait TransactionSource: Send + 'static {
    fn name(&self) -> &'static str;

    /// Runs until the sink closes or the source gives up.
    async fn run(self: Box<Self>, sink: DeliverySink) -> Result<(), TransportError>;
}
