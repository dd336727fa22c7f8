use crate::types::errors::MoneyError;
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

const GROUP_SEPARATOR: char = '.';
const DECIMAL_SEPARATOR: char = ',';
const MAX_FRACTION_DIGITS: u32 = 3;

/// Reads a signed amount out of a JSON value.
///
/// Upstream integrations send amounts either as JSON numbers or as numeric strings,
/// both forms are accepted. Anything else is reported as an error so the caller can
/// move on to the next candidate field.
pub fn parse_amount(value: &Value) -> Result<Decimal, MoneyError> {
    match value {
        Value::Number(number) => parse_text(&number.to_string()),
        Value::String(text) => parse_text(text),
        Value::Null => Err(MoneyError::Missing),
        other => Err(MoneyError::InvalidFormat(format!("Unsupported amount value: {other}")))
    }
}

fn parse_text(value: &str) -> Result<Decimal, MoneyError> {
    let value = value.trim();

    if value.is_empty() {
        return Err(MoneyError::InvalidFormat("Value is an empty string".to_string()));
    }

    //NOTE: serde_json renders very large or very small floats in exponent form
    Decimal::from_str(value)
        .or_else(|_| Decimal::from_scientific(value))
        .map_err(MoneyError::from)
}

/// Formats an amount the way vi-VN locales display money: `1.500.000` or `1.234,5`.
pub fn format_vnd(amount: Decimal) -> String {
    let rounded = amount.round_dp(MAX_FRACTION_DIGITS).normalize();
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() { "-" } else { "" };
    let text = rounded.abs().to_string();

    let (integer, fraction) = match text.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (text.as_str(), None)
    };

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);

    for (index, digit) in integer.chars().enumerate() {
        if index > 0 && (integer.len() - index) % 3 == 0 {
            grouped.push(GROUP_SEPARATOR);
        }
        grouped.push(digit);
    }

    match fraction {
        Some(fraction) => format!("{sign}{grouped}{DECIMAL_SEPARATOR}{fraction}"),
        None => format!("{sign}{grouped}")
    }
}
