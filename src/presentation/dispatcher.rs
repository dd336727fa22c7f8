use std::time::Duration;

use tracing::{debug, info};

use crate::models::{Mode, Transaction};
use crate::presentation::retained::DEFAULT_LIST_CAPACITY;
use crate::presentation::{Channels, PresentationError, RetainedList, RetryPolicy, SpeechSlot, SystemNotification, Utterance, VIBRATION_PATTERN};

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Gap between the audio cue and the spoken announcement.
    pub stagger: Duration,
    /// Wait after returning to the foreground before a held announcement is spoken.
    pub settle: Duration,
    /// Whether the host lets speech play while in the background.
    pub background_speech: bool,
    pub list_capacity: usize,
    pub sound_enabled: bool,
    pub speech_enabled: bool,
    pub retry: RetryPolicy
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            stagger: Duration::from_millis(500),
            settle: Duration::from_millis(800),
            background_speech: false,
            list_capacity: DEFAULT_LIST_CAPACITY,
            sound_enabled: true,
            speech_enabled: true,
            retry: RetryPolicy::default()
        }
    }
}

/// Sequences every output for a transaction that already passed deduplication.
///
/// Mode transitions:
///
/// | from       | to         | action                                                        |
/// |------------|------------|---------------------------------------------------------------|
/// | Foreground | Background | forget any parked utterance, in-flight speech keeps playing   |
/// | Background | Foreground | render the list, then speak the held announcement once        |
/// | any        | same       | nothing                                                       |
pub struct Dispatcher {
    config: DispatcherConfig,
    channels: Channels,
    mode: Mode,
    list: RetainedList,
    pending: Option<Utterance>,
    speech: SpeechSlot
}

impl Dispatcher {
    pub fn new(config: DispatcherConfig, channels: Channels, mode: Mode) -> Self {
        Self {
            list: RetainedList::new(config.list_capacity),
            speech: SpeechSlot::new(channels.speech.clone(), config.retry.clone()),
            pending: None,
            channels,
            config,
            mode
        }
    }

    pub fn present(&mut self, transaction: &Transaction) {
        if self.config.sound_enabled {
            attempt("audio cue", self.channels.audio.play());
        }

        self.list.push(transaction.clone());

        match self.mode {
            Mode::Foreground => {
                self.speak(Utterance::for_transaction(transaction), self.config.stagger, false);
                self.render();
                attempt("notification", self.channels.notifier.notify(&SystemNotification::for_transaction(transaction)));
                attempt("haptics", self.channels.haptics.vibrate(&VIBRATION_PATTERN));
            }
            Mode::Background => {
                attempt("notification", self.channels.notifier.notify(&SystemNotification::for_transaction(transaction)));

                let utterance = Utterance::for_transaction(transaction);

                if self.config.background_speech {
                    self.speak(utterance, Duration::ZERO, true);
                } else if self.config.speech_enabled {
                    //NOTE: Latest wins, an older held announcement is replaced
                    self.pending = Some(utterance);
                }
            }
        }
    }

    pub fn switch_mode(&mut self, mode: Mode) {
        if self.mode == mode {
            return;
        }

        info!("Viewer switched from {:?} to {:?}", self.mode, mode);
        self.mode = mode;

        match mode {
            Mode::Foreground => {
                self.render();

                if let Some(utterance) = self.pending.take().or_else(|| self.speech.take_unspoken()) {
                    self.speak(utterance, self.config.settle, false);
                }
            }
            Mode::Background => self.speech.forget_unspoken()
        }
    }

    /// Merges a history seed into the list without announcing any of it.
    pub fn seed(&mut self, seed: Vec<Transaction>) {
        self.list.merge_seed(seed);

        if self.mode == Mode::Foreground {
            self.render();
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn list(&self) -> &RetainedList {
        &self.list
    }

    pub fn pending(&self) -> Option<&Utterance> {
        self.pending.as_ref()
    }

    pub fn is_speaking(&self) -> bool {
        self.speech.is_speaking()
    }

    /// Stops any in-flight speech.
    pub fn shutdown(&mut self) {
        self.speech.cancel();
    }

    fn speak(&mut self, utterance: Utterance, delay: Duration, keep_on_failure: bool) {
        if self.config.speech_enabled {
            self.speech.announce(utterance, delay, keep_on_failure);
        }
    }

    fn render(&self) {
        attempt("list view", self.channels.view.render(self.list.items(), &self.list.stats()));
    }
}

fn attempt(channel: &str, result: Result<(), PresentationError>) {
    if let Err(error) = result {
        debug!("Skipping {channel}: {error}");
    }
}
