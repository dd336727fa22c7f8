mod mode;
mod page;
mod transaction;

pub use mode::Mode;
pub use page::TransactionsPage;
pub use transaction::{Direction, Transaction};
