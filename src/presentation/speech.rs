use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::presentation::{PresentationError, SpeechEngine, Utterance};

/// Bounded retry for speech, the engine is often not ready on the first call.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Pause before each retry. The last entry repeats when attempts outnumber it.
    pub backoff: Vec<Duration>
}

impl RetryPolicy {
    pub fn backoff_before(&self, retry: u32) -> Duration {
        let index = retry.saturating_sub(1) as usize;

        self.backoff.get(index)
            .or(self.backoff.last())
            .copied()
            .unwrap_or(Duration::ZERO)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: vec![Duration::from_millis(250), Duration::from_millis(500)]
        }
    }
}

/// Speaks an utterance, retrying transient failures per the policy.
pub async fn speak_with_retry(engine: &dyn SpeechEngine, utterance: &Utterance, policy: &RetryPolicy) -> Result<(), PresentationError> {
    let mut attempt = 1;

    loop {
        match engine.speak(utterance).await {
            Ok(()) => return Ok(()),
            Err(error) if error.is_transient() && attempt < policy.max_attempts => {
                let delay = policy.backoff_before(attempt);
                debug!("Speech attempt [{attempt}] failed, retrying in {delay:?}: {error}");

                sleep(delay).await;
                attempt += 1;
            }
            Err(error) => return Err(error)
        }
    }
}

#[derive(Default)]
struct Parked {
    /// Bumped by every announcement, only the current one may park.
    generation: u64,
    utterance: Option<Utterance>
}

/// Exclusive owner of the speech engine. Holds at most one utterance in flight,
/// a new announcement cancels the current one.
pub struct SpeechSlot {
    engine: Arc<dyn SpeechEngine>,
    retry: RetryPolicy,
    in_flight: Option<JoinHandle<()>>,
    parked: Arc<Mutex<Parked>>
}

impl SpeechSlot {
    pub fn new(engine: Arc<dyn SpeechEngine>, retry: RetryPolicy) -> Self {
        Self {
            engine,
            retry,
            in_flight: None,
            parked: Arc::new(Mutex::new(Parked::default()))
        }
    }

    /// Replaces whatever is in flight with this utterance, spoken after `delay`.
    ///
    /// With `keep_on_failure` an utterance that could not be spoken is parked and can be
    /// picked up with [`SpeechSlot::take_unspoken`]. Announcing drops any utterance
    /// parked earlier, it is older than this one.
    pub fn announce(&mut self, utterance: Utterance, delay: Duration, keep_on_failure: bool) {
        self.cancel();

        let generation = {
            let mut parked = self.parked.lock();
            parked.generation += 1;
            parked.utterance = None;
            parked.generation
        };

        let engine = self.engine.clone();
        let retry = self.retry.clone();
        let parked = self.parked.clone();

        self.in_flight = Some(tokio::spawn(async move {
            if !delay.is_zero() {
                sleep(delay).await;
            }

            match speak_with_retry(engine.as_ref(), &utterance, &retry).await {
                Ok(()) => debug!("Spoke [{}]", utterance.text),
                Err(error) => {
                    warn!("Speech gave up: {error}");

                    let mut parked = parked.lock();

                    if keep_on_failure && parked.generation == generation {
                        parked.utterance = Some(utterance);
                    }
                }
            }
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            if !in_flight.is_finished() {
                in_flight.abort();
                self.engine.cancel();
            }
        }
    }

    pub fn is_speaking(&self) -> bool {
        self.in_flight.as_ref().is_some_and(|in_flight| !in_flight.is_finished())
    }

    pub fn take_unspoken(&self) -> Option<Utterance> {
        self.parked.lock().utterance.take()
    }

    pub fn forget_unspoken(&self) {
        self.parked.lock().utterance = None;
    }
}

impl Drop for SpeechSlot {
    fn drop(&mut self) {
        self.cancel();
    }
}
