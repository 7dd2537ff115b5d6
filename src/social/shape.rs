//! The one place that inspects the variable shapes returned by the social API.
//!
//! Index queries come back either as an array of entries or as an object keyed
//! by account (or by position); `get` comes back as a nested object keyed by
//! account. Everything past this module works on [`Shape`] and [`IndexEntry`].

use serde_json::{Map, Value};
use std::collections::HashMap;

#[derive(Clone, Debug, PartialEq)]
pub enum Shape {
    Array(Vec<Value>),
    Keyed(Map<String, Value>),
    Empty,
}

impl Shape {
    pub fn of(v: Value) -> Shape {
        match v {
            Value::Array(items) => Shape::Array(items),
            Value::Object(map) => Shape::Keyed(map),
            _ => Shape::Empty,
        }
    }

    /// Entries as a flat list. Keyed objects contribute their object values.
    pub fn into_items(self) -> Vec<Value> {
        match self {
            Shape::Array(items) => items,
            Shape::Keyed(map) => map.into_iter().map(|(_, v)| v).filter(Value::is_object).collect(),
            Shape::Empty => Vec::new(),
        }
    }

    pub fn into_entries(self) -> Vec<IndexEntry> {
        self.into_items().iter().map(IndexEntry::from_value).collect()
    }

    /// Accounts whose latest entry is an active `positive` action, in first-seen
    /// order. Array entries are read chronologically so a later `unlike`
    /// cancels an earlier `like`; a keyed object lists active accounts directly.
    pub fn active_accounts(&self, positive: &str, negative: &str) -> Vec<String> {
        match self {
            Shape::Array(items) => {
                let mut order: Vec<String> = Vec::new();
                let mut latest: HashMap<String, bool> = HashMap::new();
                for entry in items.iter().map(IndexEntry::from_value) {
                    let Some(account) = entry.account_id.clone() else {
                        continue;
                    };
                    let active = match entry.value_type() {
                        Some(t) if t == negative => false,
                        Some(t) if t == positive => true,
                        None => true,
                        Some(_) => continue,
                    };
                    if !latest.contains_key(&account) {
                        order.push(account.clone());
                    }
                    latest.insert(account, active);
                }
                order
                    .into_iter()
                    .filter(|a| latest.get(a).copied().unwrap_or(false))
                    .collect()
            }
            Shape::Keyed(map) => map
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, _)| k.clone())
                .collect(),
            Shape::Empty => Vec::new(),
        }
    }
}

/// One index record, normalized across `accountId`/`account_id` spellings.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IndexEntry {
    pub account_id: Option<String>,
    pub block_height: Option<u64>,
    pub timestamp_ms: Option<i64>,
    pub value: Value,
}

impl IndexEntry {
    pub fn from_value(v: &Value) -> IndexEntry {
        let account_id = str_field(v, &["accountId", "account_id"])
            .or_else(|| v.get("value").and_then(|inner| str_field(inner, &["accountId"])))
            .filter(|s| !s.is_empty());
        let block_height = u64_field(v, &["blockHeight", "block_height"])
            .or_else(|| v.get("value").and_then(|inner| u64_field(inner, &["blockHeight"])))
            .filter(|h| *h > 0);
        let timestamp_ms = v
            .get("timestamp")
            .or_else(|| v.get("value").and_then(|inner| inner.get("timestamp")))
            .and_then(number_like)
            .and_then(normalize_timestamp_ms);
        IndexEntry {
            account_id,
            block_height,
            timestamp_ms,
            value: v.get("value").cloned().unwrap_or(Value::Null),
        }
    }

    pub fn value_type(&self) -> Option<&str> {
        self.value.get("type").and_then(Value::as_str)
    }
}

/// Walk a `get` response along `path` (e.g. `["alice.near", "profile"]`).
pub fn pluck<'a>(root: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter()
        .try_fold(root, |node, key| node.get(*key))
        .filter(|v| !v.is_null())
}

/// Keys of a keyed object, skipping deleted (null) members.
pub fn live_keys(v: Option<&Value>) -> Vec<String> {
    match v {
        Some(Value::Object(map)) => map
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, _)| k.clone())
            .collect(),
        _ => Vec::new(),
    }
}

fn str_field(v: &Value, names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|n| v.get(*n).and_then(Value::as_str))
        .map(str::to_string)
}

fn u64_field(v: &Value, names: &[&str]) -> Option<u64> {
    names
        .iter()
        .find_map(|n| v.get(*n).and_then(number_like))
        .and_then(|n| u64::try_from(n).ok())
}

fn number_like(v: &Value) -> Option<i64> {
    v.as_i64()
        .or_else(|| v.as_u64().and_then(|n| i64::try_from(n).ok()))
        .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
}

/// Indexers report seconds, milliseconds or nanoseconds depending on the source.
/// Non-positive or overflowing values yield `None`.
fn normalize_timestamp_ms(raw: i64) -> Option<i64> {
    match raw {
        n if n <= 0 => None,
        n if n > 100_000_000_000_000 => n.checked_div(1_000_000),
        n if n < 100_000_000_000 => n.checked_mul(1000),
        n => Some(n),
    }
}
