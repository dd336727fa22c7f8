mod broadcaster;
mod errors;
mod event;

pub use broadcaster::{BroadcastReport, Broadcaster, Registration};
pub use errors::BroadcastError;
pub use event::{LiveEvent, SessionRequest};
