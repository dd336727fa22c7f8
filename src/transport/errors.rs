use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Transport error: live channel gave up after [{attempts}] reconnect attempts")]
    ReconnectExhausted {
        attempts: u32
    },
    #[error("Transport error: background poll did not answer within {0:?}")]
    PollTimeout(Duration),
    #[error("Transport error: {0}")]
    Http(#[from] reqwest::Error)
}
