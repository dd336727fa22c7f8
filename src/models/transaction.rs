use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::TransactionId;

/// Whether money arrived at or left the watched account.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Credit,
    Debit
}

impl Direction {
    /// Derives the direction from a signed source amount. Zero counts as a credit.
    pub fn from_signed(amount: Decimal) -> Self {
        if amount.is_sign_negative() && !amount.is_zero() {
            Direction::Debit
        } else {
            Direction::Credit
        }
    }
}

/// Canonical record of one bank transfer event.
///
/// Built once by the normalizer and never changed afterwards. Whether a viewer has
/// already announced it is tracked by the viewer's dedup cache, not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Process-local identifier, strictly increasing and derived from the clock.
    pub id: TransactionId,
    /// Correlation key taken from the source payload, when it carried one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_ref: Option<String>,
    /// When the relay normalized the event, not when the bank booked it.
    pub timestamp: DateTime<Utc>,
    /// Magnitude of the transfer. The sign lives in `direction`.
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub direction: Direction,
    pub memo: String,
    #[serde(default)]
    pub counterparty_account: String,
    pub origin_brand: String,
    /// The untouched source payload, kept for auditing.
    #[serde(default)]
    pub raw: Value
}

impl Transaction {
    pub fn is_credit(&self) -> bool {
        self.direction == Direction::Credit
    }
}
