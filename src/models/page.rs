use serde::{Deserialize, Serialize};

use crate::models::Transaction;

/// Body of `GET /api/transactions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionsPage {
    pub success: bool,
    pub transactions: Vec<Transaction>,
    pub total: usize
}
