use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::transport::{DeliverySink, TransactionSource};

/// Runs every transaction source side by side, all feeding one sink.
///
/// Sources are never correlated here. Whatever they deliver twice is the viewer's
/// dedup cache's problem.
#[derive(Default)]
pub struct Multiplexer {
    sources: Vec<Box<dyn TransactionSource>>
}

impl Multiplexer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source<S: TransactionSource>(mut self, source: S) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Resolves once every source has stopped.
    pub async fn run(self, sink: DeliverySink) {
        let mut tasks = JoinSet::new();

        for source in self.sources {
            let name = source.name();
            let sink = sink.clone();

            tasks.spawn(async move { (name, source.run(sink).await) });
        }

        drop(sink);

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((name, Ok(()))) => info!("Transaction source [{name}] stopped"),
                Ok((name, Err(error))) => warn!("Transaction source [{name}] failed: {error}"),
                Err(error) => error!("A transaction source task did not finish gracefully: {error:?}")
            }
        }
    }
}
