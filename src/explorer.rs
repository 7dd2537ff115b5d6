//! Wallet panel extras: recent transactions from an optional explorer API and
//! the NEAR/USD spot price. Both degrade to empty / `None`.

use serde_json::Value;

use crate::config::Config;
use crate::net::get_json;
use crate::types::RecentTransaction;

pub const DEFAULT_TRANSACTION_LIMIT: usize = 5;

pub fn transactions_url(base: &str, account_id: &str, limit: usize) -> String {
    format!(
        "{}/account/{}/transactions?limit={}",
        base.trim_end_matches('/'),
        urlencoding::encode(account_id),
        limit
    )
}

/// First present, non-null, non-empty field among `keys`.
fn first_of<'a>(raw: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().filter_map(|k| raw.get(*k)).find(|v| match v {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    })
}

fn first_str(raw: &Value, keys: &[&str]) -> Option<String> {
    first_of(raw, keys).and_then(|v| v.as_str()).map(str::to_string)
}

/// Explorers disagree on field names; map the common variants.
pub fn normalize_transaction(raw: &Value) -> RecentTransaction {
    RecentTransaction {
        hash: first_str(raw, &["hash", "transaction_hash", "tx_hash"]),
        signer: first_str(raw, &["signer_id", "signer", "predecessor_id"]),
        receiver: first_str(raw, &["receiver_id", "receiver"]),
        block_timestamp: first_of(raw, &["block_timestamp", "block_time", "timestamp"]).cloned(),
        actions: first_of(raw, &["actions", "actions_count"]).cloned(),
        status: first_of(raw, &["status"]).cloned(),
    }
}

/// Accepts a bare array or `{ "transactions": [...] }`.
fn transaction_list(v: Value) -> Vec<Value> {
    match v {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("transactions") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

pub async fn fetch_recent_transactions(cfg: &Config, account_id: &str, limit: usize) -> Vec<RecentTransaction> {
    let Some(base) = cfg.explorer_api_url.as_deref() else {
        log::debug!("[explorer] no explorer configured, skipping transactions");
        return Vec::new();
    };
    let url = transactions_url(base, account_id, limit);
    match get_json(&url, cfg.request_timeout_ms, cfg.request_retries, "explorer transactions").await {
        Ok(v) => transaction_list(v).iter().map(normalize_transaction).collect(),
        Err(e) => {
            log::warn!("[explorer] transactions for {account_id} failed: {e}");
            Vec::new()
        }
    }
}

pub fn parse_near_usd(v: &Value) -> Option<f64> {
    v.get("near")?.get("usd")?.as_f64()
}

pub async fn fetch_near_usd_price(cfg: &Config) -> Option<f64> {
    match get_json(&cfg.price_api_url, cfg.request_timeout_ms, cfg.request_retries, "near price").await {
        Ok(v) => parse_near_usd(&v),
        Err(e) => {
            log::warn!("[explorer] NEAR price lookup failed: {e}");
            None
        }
    }
}
