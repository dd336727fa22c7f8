mod channels;
mod dedup;
mod dispatcher;
mod errors;
mod retained;
mod speech;
mod terminal;

pub use channels::{AudioCue, Channels, Haptics, ListView, Notifier, SpeechEngine, SystemNotification, Utterance, NOTIFICATION_TAG, NOTIFICATION_TITLE, VIBRATION_PATTERN};
pub use dedup::{identity_key, DedupCache};
pub use dispatcher::{Dispatcher, DispatcherConfig};
pub use errors::PresentationError;
pub use retained::{RetainedList, Stats};
pub use speech::{speak_with_retry, RetryPolicy, SpeechSlot};
pub use terminal::terminal_channels;

#[cfg(test)]
pub use channels::{MockAudioCue, MockHaptics, MockListView, MockNotifier, MockSpeechEngine};
