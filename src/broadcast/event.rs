use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Transaction;

/// Frames pushed by the server over the live channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum LiveEvent {
    NewTransaction(Transaction),
    TransactionHistory(Vec<Transaction>),
    HeartbeatResponse {
        server_time: DateTime<Utc>
    }
}

/// Frames a viewer may send over the live channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionRequest {
    GetHistory,
    Heartbeat
}
