mod errors;
mod money;

pub use errors::MoneyError;
pub use money::{format_vnd, parse_amount};

pub type TransactionId = u64;
pub type SessionId = u64;
