use tokio::spawn;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::models::{Mode, Transaction};
use crate::presentation::{DedupCache, Dispatcher};
use crate::transport::{Delivery, DeliverySink};
use crate::types::TransactionId;

#[derive(Debug, Clone, PartialEq)]
pub enum ViewerEvent {
    Delivery(Delivery),
    SwitchMode(Mode),
    Stop
}

/// What a viewer did over its lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewerSummary {
    pub presented: usize,
    pub suppressed: usize,
    pub seeded: usize
}

/// Owns every piece of mutable viewer state. Events are handled one at a time, so the
/// dedup check and its mark are never split by a suspension point.
pub struct ViewerActor;

impl ViewerActor {
    /// Spawns the actor and returns its handle plus the task yielding the final summary.
    pub fn spawn(mut dedup: DedupCache, mut dispatcher: Dispatcher, buffer: usize) -> (ViewerHandle, JoinHandle<ViewerSummary>) {
        let (sender, mut receiver) = mpsc::channel(buffer.max(1));
        let (mode, _) = watch::channel(dispatcher.mode());
        let (newest_held, _) = watch::channel(None);
        let held = newest_held.clone();

        let task = spawn(async move {
            let mut summary = ViewerSummary::default();

            while let Some(event) = receiver.recv().await {
                match event {
                    ViewerEvent::Delivery(Delivery::Transaction { transaction, origin }) => {
                        hold(&held, &transaction);

                        if dedup.should_present(&transaction) {
                            debug!("Presenting transaction [{}] delivered by {origin:?}", transaction.id);
                            dispatcher.present(&transaction);
                            summary.presented += 1;
                        } else {
                            debug!("Suppressed duplicate of transaction [{}] delivered by {origin:?}", transaction.id);
                            summary.suppressed += 1;
                        }
                    }
                    ViewerEvent::Delivery(Delivery::Seed(seed)) => {
                        for transaction in &seed {
                            dedup.mark(transaction);
                            hold(&held, transaction);
                        }

                        summary.seeded += seed.len();
                        dispatcher.seed(seed);
                    }
                    ViewerEvent::SwitchMode(mode) => dispatcher.switch_mode(mode),
                    ViewerEvent::Stop => break
                }
            }

            dispatcher.shutdown();
            info!("Viewer stopped: {summary:?}");

            summary
        });

        (ViewerHandle { events: sender, mode, newest_held }, task)
    }
}

fn hold(newest_held: &watch::Sender<Option<TransactionId>>, transaction: &Transaction) {
    newest_held.send_if_modified(|newest| {
        let advanced = newest.is_none_or(|newest| transaction.id > newest);

        if advanced {
            *newest = Some(transaction.id);
        }

        advanced
    });
}

/// The viewer's inbox plus the state the background-only sources watch: the mode it is
/// in and the newest transaction id it has received.
#[derive(Clone)]
pub struct ViewerHandle {
    events: mpsc::Sender<ViewerEvent>,
    mode: watch::Sender<Mode>,
    newest_held: watch::Sender<Option<TransactionId>>
}

impl ViewerHandle {
    pub fn sink(&self) -> DeliverySink {
        DeliverySink::new(self.events.clone())
    }

    pub fn mode(&self) -> Mode {
        *self.mode.borrow()
    }

    pub fn subscribe_mode(&self) -> watch::Receiver<Mode> {
        self.mode.subscribe()
    }

    pub fn subscribe_newest_held(&self) -> watch::Receiver<Option<TransactionId>> {
        self.newest_held.subscribe()
    }

    /// Returns false once the viewer has stopped.
    pub async fn set_mode(&self, mode: Mode) -> bool {
        self.mode.send_replace(mode);

        self.events.send(ViewerEvent::SwitchMode(mode)).await.is_ok()
    }

    /// Returns false when the viewer had already stopped.
    pub async fn stop(&self) -> bool {
        self.events.send(ViewerEvent::Stop).await.is_ok()
    }
}
