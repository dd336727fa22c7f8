use chrono::Utc;
use rand::seq::SliceRandom;
use rand::Rng;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tracing::debug;

use crate::models::{Direction, Transaction};
use crate::normalizer::IdGenerator;
use crate::types::parse_amount;

pub const DEFAULT_MEMO: &str = "Giao dịch";
pub const DEFAULT_BRAND: &str = "Unknown";

//NOTE: Candidate keys are probed in order, the upstream gateway names these fields differently per integration
const AMOUNT_KEYS: &[&str] = &["amount", "transferAmount", "money", "value"];
const MEMO_KEYS: &[&str] = &["content", "description", "transferNote", "note", "memo"];
const BRAND_KEYS: &[&str] = &["gateway", "bank_brand", "bankBrand", "bank"];
const ACCOUNT_KEYS: &[&str] = &["account_number", "accountNumber", "subAccount"];
const REFERENCE_KEYS: &[&str] = &["transaction_id", "transactionId", "id", "referenceCode"];

const TEST_MEMOS: &[&str] = &[
    "Test notification - Nhan tien test",
    "Chuyen khoan tu ban be",
    "Thanh toan don hang",
    "Hoan tien mua sam",
    "Thuong tet nang suong",
    "Tien luong thang",
    "Bonus cuoi nam"
];
const TEST_BRANDS: &[&str] = &["MBBANK", "VietinBank", "VCB", "TCB", "ACB", "BIDV"];
const TEST_ACCOUNT: &str = "1234567890";

/// Turns loosely shaped webhook payloads into canonical transactions.
pub struct Normalizer {
    ids: IdGenerator
}

impl Normalizer {
    pub fn new() -> Self {
        Self {
            ids: IdGenerator::new()
        }
    }

    /// Normalizes one webhook payload.
    ///
    /// This never fails: a field that cannot be found falls back to its default
    /// (amount 0, memo "Giao dịch", brand "Unknown"), so even an empty payload yields
    /// a zero-amount credit.
    pub fn normalize(&self, payload: Value) -> Transaction {
        let signed_amount = first_amount(&payload).unwrap_or(Decimal::ZERO);

        let transaction = Transaction {
            id: self.ids.next(),
            external_ref: first_text(&payload, REFERENCE_KEYS),
            timestamp: Utc::now(),
            amount: signed_amount.abs(),
            direction: Direction::from_signed(signed_amount),
            memo: first_text(&payload, MEMO_KEYS).unwrap_or_else(|| DEFAULT_MEMO.to_string()),
            counterparty_account: first_text(&payload, ACCOUNT_KEYS).unwrap_or_default(),
            origin_brand: first_text(&payload, BRAND_KEYS).unwrap_or_else(|| DEFAULT_BRAND.to_string()),
            raw: payload
        };

        debug!("Normalized transaction [{}] with reference [{:?}]", transaction.id, transaction.external_ref);

        transaction
    }

    /// Synthesizes a random credit, used by the test trigger endpoint.
    pub fn test_transaction(&self) -> Transaction {
        let mut rng = rand::thread_rng();
        let id = self.ids.next();
        let amount = Decimal::from(rng.gen_range(100_000i64..1_100_000));
        let memo = TEST_MEMOS.choose(&mut rng).copied().unwrap_or(DEFAULT_MEMO);
        let brand = TEST_BRANDS.choose(&mut rng).copied().unwrap_or(DEFAULT_BRAND);
        let external_ref = format!("TEST_{}", Utc::now().timestamp_millis());

        Transaction {
            id,
            raw: json!({ "test": true, "transaction_id": external_ref }),
            external_ref: Some(external_ref),
            timestamp: Utc::now(),
            amount,
            direction: Direction::Credit,
            memo: memo.to_string(),
            counterparty_account: TEST_ACCOUNT.to_string(),
            origin_brand: brand.to_string()
        }
    }
}

fn first_amount(payload: &Value) -> Option<Decimal> {
    AMOUNT_KEYS.iter()
        .filter_map(|key| payload.get(key))
        .find_map(|value| parse_amount(value).ok())
}

fn first_text(payload: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| payload.get(key))
        .find_map(text_value)
}

fn text_value(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None
    }
}
