use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::models::Transaction;
use crate::presentation::{AudioCue, Channels, Haptics, ListView, Notifier, PresentationError, SpeechEngine, Stats, SystemNotification, Utterance};
use crate::types::format_vnd;

struct TerminalBell;

impl AudioCue for TerminalBell {
    fn play(&self) -> Result<(), PresentationError> {
        let mut stderr = std::io::stderr().lock();
        stderr.write_all(b"\x07")?;
        stderr.flush()?;

        info!("TING TING");

        Ok(())
    }
}

struct TerminalSpeech;

#[async_trait]
impl SpeechEngine for TerminalSpeech {
    async fn speak(&self, utterance: &Utterance) -> Result<(), PresentationError> {
        debug!(rate = utterance.rate, pitch = utterance.pitch, volume = utterance.volume, "Speaking");

        let mut stdout = tokio::io::stdout();
        stdout.write_all(format!("🔊 [{}] {}\n", utterance.lang, utterance.text).as_bytes()).await?;
        stdout.flush().await?;

        Ok(())
    }

    fn cancel(&self) {}
}

struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn notify(&self, notification: &SystemNotification) -> Result<(), PresentationError> {
        let mut stdout = std::io::stdout().lock();
        let border = "─".repeat(notification.title.chars().count() + 2);

        writeln!(stdout, "┌{border}┐")?;
        writeln!(stdout, "│ {} │", notification.title)?;
        writeln!(stdout, "└{border}┘")?;

        for line in notification.body.lines() {
            writeln!(stdout, "  {line}")?;
        }

        Ok(())
    }
}

struct NoHaptics;

impl Haptics for NoHaptics {
    fn vibrate(&self, _pattern: &[u64]) -> Result<(), PresentationError> {
        Err(PresentationError::Unavailable("vibration"))
    }
}

struct TerminalList;

impl ListView for TerminalList {
    fn render(&self, items: &[Transaction], stats: &Stats) -> Result<(), PresentationError> {
        let latest = items.first().map(|transaction| transaction.memo.as_str()).unwrap_or("-");

        info!("{} transactions, {}đ received, latest: {latest}", stats.count, format_vnd(stats.credit_total));

        Ok(())
    }
}

/// Presentation channels for a viewer running in a terminal.
pub fn terminal_channels() -> Channels {
    Channels {
        audio: Arc::new(TerminalBell),
        speech: Arc::new(TerminalSpeech),
        notifier: Arc::new(TerminalNotifier),
        haptics: Arc::new(NoHaptics),
        view: Arc::new(TerminalList)
    }
}
