use thiserror::Error;

use crate::types::SessionId;

#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("Session [{session_id}] is closed")]
    Closed {
        session_id: SessionId
    },
    #[error("Session [{session_id}] outbound queue is full")]
    Full {
        session_id: SessionId
    }
}
