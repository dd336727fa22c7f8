use std::sync::Arc;

use async_trait::async_trait;

use crate::models::Transaction;
use crate::presentation::{PresentationError, Stats};
use crate::types::format_vnd;

pub const NOTIFICATION_TITLE: &str = "BANK-TING-TING";
pub const NOTIFICATION_TAG: &str = "bank-transaction";
pub const VIBRATION_PATTERN: [u64; 3] = [200, 100, 200];

/// One spoken announcement.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    pub lang: &'static str,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32
}

impl Utterance {
    pub fn for_transaction(transaction: &Transaction) -> Self {
        Self {
            text: format!("{} nhận được {} đồng. Cám ơn quý Khách.", transaction.origin_brand, format_vnd(transaction.amount)),
            lang: "vi-VN",
            rate: 0.8,
            pitch: 1.0,
            volume: 0.9
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemNotification {
    pub title: &'static str,
    pub body: String,
    pub tag: &'static str
}

impl SystemNotification {
    pub fn for_transaction(transaction: &Transaction) -> Self {
        Self {
            title: NOTIFICATION_TITLE,
            body: format!("{} nhận được +{}đ\n{}", transaction.origin_brand, format_vnd(transaction.amount), transaction.memo),
            tag: NOTIFICATION_TAG
        }
    }
}

/// The short "ting ting" played before anything else.
#[cfg_attr(test, mockall::automock)]
pub trait AudioCue: Send + Sync {
    fn play(&self) -> Result<(), PresentationError>;
}

/// A serial speech resource, it accepts one utterance at a time.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Resolves once the utterance has been spoken in full.
    async fn speak(&self, utterance: &Utterance) -> Result<(), PresentationError>;
    /// Stops whatever is being spoken right now.
    fn cancel(&self);
}

#[cfg_attr(test, mockall::automock)]
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &SystemNotification) -> Result<(), PresentationError>;
}

#[cfg_attr(test, mockall::automock)]
pub trait Haptics: Send + Sync {
    fn vibrate(&self, pattern: &[u64]) -> Result<(), PresentationError>;
}

/// The visible transaction list and its summary line.
#[cfg_attr(test, mockall::automock)]
pub trait ListView: Send + Sync {
    fn render(&self, items: &[Transaction], stats: &Stats) -> Result<(), PresentationError>;
}

/// Every output a viewer can present through. Each one may fail on its own.
#[derive(Clone)]
pub struct Channels {
    pub audio: Arc<dyn AudioCue>,
    pub speech: Arc<dyn SpeechEngine>,
    pub notifier: Arc<dyn Notifier>,
    pub haptics: Arc<dyn Haptics>,
    pub view: Arc<dyn ListView>
}
