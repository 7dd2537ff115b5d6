//! In-memory social backend and wallet used by unit tests.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::Notify;

use crate::social::{IndexQuery, SocialBackend};
use crate::types::ItemRef;
use crate::wallet::{Wallet, WalletAction};

#[derive(Default)]
struct State {
    posts: Vec<Value>,
    bodies: HashMap<(String, u64), Value>,
    profiles: HashMap<String, Value>,
    likes: HashMap<String, Vec<Value>>,
    reposts: HashMap<String, Vec<Value>>,
    notify: HashMap<String, Vec<Value>>,
    following: HashMap<String, Vec<String>>,
}

#[derive(Default)]
pub struct MockBackend {
    state: Mutex<State>,
    fail_reads: AtomicBool,
    fail_likes: AtomicBool,
    calls: AtomicUsize,
    widest_index: AtomicUsize,
}

fn item_key(item: &ItemRef) -> String {
    serde_json::to_string(&json!(item)).unwrap()
}

impl MockBackend {
    /// `user{i}.near` at height `1000 - i`, newest first.
    pub fn with_posts(n: usize) -> Self {
        let backend = MockBackend::default();
        for i in 0..n {
            backend.push_post(&format!("user{i}.near"), 1000 - i as u64, &format!("post {i}"));
        }
        backend
    }

    pub fn push_post(&self, account: &str, height: u64, text: &str) {
        self.push_index_entry(json!({
            "accountId": account,
            "blockHeight": height,
            "value": {"type": "md"}
        }));
        self.set_body(account, height, json!(json!({"type": "md", "text": text}).to_string()));
    }

    pub fn push_index_entry(&self, entry: Value) {
        self.state.lock().unwrap().posts.push(entry);
    }

    pub fn set_body(&self, account: &str, height: u64, body: Value) {
        self.state
            .lock()
            .unwrap()
            .bodies
            .insert((account.to_string(), height), body);
    }

    pub fn set_profile(&self, account: &str, profile: Value) {
        self.state
            .lock()
            .unwrap()
            .profiles
            .insert(account.to_string(), profile);
    }

    pub fn set_likes(&self, item: &ItemRef, accounts: &[&str]) {
        let entries = accounts
            .iter()
            .map(|a| json!({"accountId": a, "value": {"type": "like"}}))
            .collect();
        self.state.lock().unwrap().likes.insert(item_key(item), entries);
    }

    pub fn set_reposts(&self, item: &ItemRef, accounts: &[&str]) {
        let entries = accounts
            .iter()
            .map(|a| json!({"accountId": a, "value": {"type": "repost"}}))
            .collect();
        self.state.lock().unwrap().reposts.insert(item_key(item), entries);
    }

    pub fn set_pokes(&self, target: &str, accounts: &[&str]) {
        let entries = accounts
            .iter()
            .map(|a| json!({"accountId": a, "value": {"type": "poke"}}))
            .collect();
        self.state
            .lock()
            .unwrap()
            .notify
            .insert(target.to_string(), entries);
    }

    pub fn set_following(&self, account: &str, targets: &[&str]) {
        self.state.lock().unwrap().following.insert(
            account.to_string(),
            targets.iter().map(|t| t.to_string()).collect(),
        );
    }

    pub fn fail_reads(&self, on: bool) {
        self.fail_reads.store(on, Ordering::SeqCst);
    }

    pub fn fail_likes(&self, on: bool) {
        self.fail_likes.store(on, Ordering::SeqCst);
    }

    /// Largest `limit` any index query has asked for.
    pub fn widest_index(&self) -> usize {
        self.widest_index.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SocialBackend for MockBackend {
    async fn index(&self, query: &IndexQuery) -> Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.widest_index.fetch_max(query.limit, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(anyhow!("indexer unreachable"));
        }
        let state = self.state.lock().unwrap();
        match query.action.as_str() {
            "post" => {
                let mut entries: Vec<Value> = state
                    .posts
                    .iter()
                    .filter(|e| match query.account_id.as_deref() {
                        Some(a) => e["accountId"] == a,
                        None => true,
                    })
                    .filter(|e| match query.from {
                        Some(from) => e["blockHeight"].as_u64().unwrap_or(0) <= from,
                        None => true,
                    })
                    .cloned()
                    .collect();
                entries.sort_by_key(|e| std::cmp::Reverse(e["blockHeight"].as_u64().unwrap_or(0)));
                entries.truncate(query.limit);
                Ok(Value::Array(entries))
            }
            "like" => {
                if self.fail_likes.load(Ordering::SeqCst) {
                    return Err(anyhow!("like index timeout"));
                }
                let key = serde_json::to_string(&query.key)?;
                Ok(json!(state.likes.get(&key).cloned().unwrap_or_default()))
            }
            "repost" => {
                let key = serde_json::to_string(&query.key)?;
                Ok(json!(state.reposts.get(&key).cloned().unwrap_or_default()))
            }
            "notify" => {
                let key = query.key.as_str().unwrap_or_default();
                Ok(json!(state.notify.get(key).cloned().unwrap_or_default()))
            }
            _ => Ok(json!([])),
        }
    }

    async fn get(&self, keys: &[String], block_height: Option<u64>) -> Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(anyhow!("rpc unreachable"));
        }
        let state = self.state.lock().unwrap();
        let mut out = json!({});
        for key in keys {
            let parts: Vec<&str> = key.split('/').collect();
            match parts.as_slice() {
                [account, "post", "main"] => {
                    let body = state
                        .bodies
                        .get(&(account.to_string(), block_height.unwrap_or(0)))
                        .cloned()
                        .unwrap_or(Value::Null);
                    out[*account] = json!({"post": {"main": body}});
                }
                [account, "profile", "**"] => {
                    if let Some(p) = state.profiles.get(*account) {
                        out[*account] = json!({"profile": p});
                    }
                }
                [account, "graph", "follow", "*"] => {
                    let follow: serde_json::Map<String, Value> = state
                        .following
                        .get(*account)
                        .map(|ts| ts.iter().map(|t| (t.clone(), json!(""))).collect())
                        .unwrap_or_default();
                    out[*account] = json!({"graph": {"follow": follow}});
                }
                ["*", "graph", "follow", target] => {
                    for (follower, targets) in &state.following {
                        if targets.iter().any(|t| t == target) {
                            out[follower.as_str()] = json!({"graph": {"follow": {*target: ""}}});
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(out)
    }
}

#[derive(Default)]
pub struct MockWallet {
    account: Option<String>,
    sent: Mutex<Vec<(String, Value)>>,
    reject: Mutex<Option<String>>,
    held: AtomicBool,
    gate: Notify,
}

impl MockWallet {
    pub fn connected(account: &str) -> Self {
        MockWallet {
            account: Some(account.to_string()),
            ..Default::default()
        }
    }

    pub fn disconnected() -> Self {
        MockWallet::default()
    }

    pub fn sent(&self) -> Vec<(String, Value)> {
        self.sent.lock().unwrap().clone()
    }

    /// Method args of every submitted action, in order.
    pub fn sent_data(&self) -> Vec<Value> {
        self.sent()
            .into_iter()
            .map(|(_, action)| action["params"]["args"]["data"].clone())
            .collect()
    }

    pub fn reject_next(&self, message: &str) {
        *self.reject.lock().unwrap() = Some(message.to_string());
    }

    /// Park every signing request until [`MockWallet::release`].
    pub fn hold(&self) {
        self.held.store(true, Ordering::SeqCst);
    }

    pub fn release(&self) {
        self.held.store(false, Ordering::SeqCst);
        self.gate.notify_waiters();
        self.gate.notify_one();
    }
}

#[async_trait]
impl Wallet for MockWallet {
    fn account_id(&self) -> Option<String> {
        self.account.clone()
    }

    async fn sign_and_send_transaction(
        &self,
        receiver_id: &str,
        actions: Vec<WalletAction>,
    ) -> Result<Value> {
        if self.held.load(Ordering::SeqCst) {
            self.gate.notified().await;
        }
        if let Some(msg) = self.reject.lock().unwrap().take() {
            return Err(anyhow!(msg));
        }
        let mut sent = self.sent.lock().unwrap();
        for action in actions {
            sent.push((receiver_id.to_string(), action.to_json()));
        }
        Ok(json!({"status": {"SuccessValue": ""}}))
    }
}
