use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::broadcast::BroadcastReport;
use crate::models::{Direction, Transaction, TransactionsPage};
use crate::server::{ApiError, AppContext};

const DEFAULT_PAGE_SIZE: usize = 20;
const LOG_ENTRIES: usize = 10;
const LOG_MEMO_CHARS: usize = 50;
const SERVICE_NAME: &str = "BANK-TING-TING";

#[derive(Debug, Serialize)]
pub struct PublishResponse {
    success: bool,
    message: &'static str,
    data: Transaction,
    sent_to_devices: usize,
    total_connected: usize
}

impl PublishResponse {
    fn new(message: &'static str, transaction: Transaction, report: BroadcastReport, total_connected: usize) -> Self {
        Self {
            success: true,
            message,
            data: transaction,
            sent_to_devices: report.delivered,
            total_connected
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    limit: Option<String>
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    status: &'static str,
    service: &'static str,
    timestamp: DateTime<Utc>,
    uptime_secs: f64,
    connected_sessions: usize,
    total_transactions: usize,
    memory_rss_bytes: Option<u64>
}

#[derive(Debug, Serialize)]
struct LogEntry {
    time: DateTime<Utc>,
    #[serde(with = "rust_decimal::serde::float")]
    amount: Decimal,
    memo: String,
    origin_brand: String,
    direction: Direction
}

/// `POST /webhook/:provider`. Always answers 200, whatever the body looks like.
pub async fn receive_webhook(
    State(context): State<Arc<AppContext>>,
    Path(provider): Path<String>,
    body: Bytes
) -> Json<PublishResponse> {
    let payload = match serde_json::from_slice::<Value>(&body) {
        Ok(payload) => payload,
        Err(error) => {
            warn!("Webhook from [{provider}] is not valid JSON, using defaults: {error}");
            Value::Null
        }
    };

    debug!(provider = %provider, body = %payload, "Webhook received");

    let (transaction, report) = context.receive_webhook(payload);

    Json(PublishResponse::new("Webhook processed successfully", transaction, report, context.session_count()))
}

/// `POST /test-notification`
pub async fn test_notification(State(context): State<Arc<AppContext>>) -> Result<Json<PublishResponse>, ApiError> {
    let (transaction, report) = context.trigger_test()?;

    info!("Test notification sent to [{}] sessions", report.delivered);

    Ok(Json(PublishResponse::new("Test notification sent successfully!", transaction, report, context.session_count())))
}

/// `GET /api/transactions?limit=N`
pub async fn list_transactions(
    State(context): State<Arc<AppContext>>,
    Query(query): Query<HistoryQuery>
) -> Json<TransactionsPage> {
    let limit = query.limit
        .and_then(|limit| limit.trim().parse::<usize>().ok())
        .filter(|limit| *limit > 0)
        .unwrap_or(DEFAULT_PAGE_SIZE);

    Json(TransactionsPage {
        success: true,
        transactions: context.recent(limit),
        total: context.total_transactions()
    })
}

/// `DELETE /api/transactions`
pub async fn clear_transactions(State(context): State<Arc<AppContext>>) -> Json<Value> {
    context.clear_history();

    Json(json!({ "success": true, "message": "Transaction history cleared" }))
}

/// `GET /api/config`, non-sensitive settings only.
pub async fn config(State(context): State<Arc<AppContext>>) -> Json<Value> {
    let config = context.config();

    Json(json!({
        "webhook_verification": "DISABLED",
        "history_capacity": config.history_capacity,
        "seed_size": config.seed_size,
        "test_cooldown_ms": config.test_cooldown_ms,
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// `GET /api/logs`, a compact view of the latest transactions.
pub async fn logs(State(context): State<Arc<AppContext>>) -> Json<Value> {
    let entries: Vec<LogEntry> = context.recent(LOG_ENTRIES)
        .into_iter()
        .map(|transaction| LogEntry {
            time: transaction.timestamp,
            amount: transaction.amount,
            memo: transaction.memo.chars().take(LOG_MEMO_CHARS).collect(),
            origin_brand: transaction.origin_brand,
            direction: transaction.direction
        })
        .collect();

    Json(json!({
        "recent_transactions": entries,
        "connected_sessions": context.session_count(),
        "server_time": Utc::now()
    }))
}

/// `POST /debug/webhook` echoes what it received and touches nothing.
pub async fn debug_webhook(headers: HeaderMap, body: Bytes) -> Json<Value> {
    let headers: BTreeMap<String, String> = headers.iter()
        .map(|(name, value)| (name.to_string(), String::from_utf8_lossy(value.as_bytes()).into_owned()))
        .collect();

    let body = serde_json::from_slice::<Value>(&body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into_owned()));

    debug!(?headers, %body, "Debug webhook call");

    Json(json!({
        "success": true,
        "message": "Debug webhook received",
        "headers": headers,
        "body": body,
        "timestamp": Utc::now()
    }))
}

/// `GET /health`
pub async fn health(State(context): State<Arc<AppContext>>) -> Json<HealthReport> {
    Json(HealthReport {
        status: "OK",
        service: SERVICE_NAME,
        timestamp: Utc::now(),
        uptime_secs: context.uptime().as_secs_f64(),
        connected_sessions: context.session_count(),
        total_transactions: context.total_transactions(),
        memory_rss_bytes: resident_memory()
    })
}

//NOTE: Only Linux exposes this cheaply, elsewhere the field is reported as null
fn resident_memory() -> Option<u64> {
    const PAGE_SIZE: u64 = 4096;

    let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
    let pages = statm.split_whitespace().nth(1)?.parse::<u64>().ok()?;

    Some(pages * PAGE_SIZE)
}
