//! End-to-end flow through the public API: page the feed, like a post while
//! the wallet is pending, and watch the events a UI would render.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use nearcity::{
    rpc_utils::BalanceSource,
    social::IndexQuery,
    wallet::WalletAction,
    Action, AppEvent, Deposit, EventBus, FeedController, InteractionCoordinator, InteractionError,
    Interactions, LoadOutcome, SessionStore, SocialBackend, SocialGateway, Tally, ToastKind, Wallet,
};

/// Posts `acct{i}.near` at heights 500, 499, ...; likes recorded per path.
struct Chain {
    heights: Vec<u64>,
    likers: Mutex<Vec<String>>,
}

impl Chain {
    fn new(n: u64) -> Self {
        Chain {
            heights: (0..n).map(|i| 500 - i).collect(),
            likers: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl SocialBackend for Chain {
    async fn index(&self, q: &IndexQuery) -> Result<Value> {
        match q.action.as_str() {
            "post" => {
                let page: Vec<Value> = self
                    .heights
                    .iter()
                    .filter(|h| q.from.map_or(true, |f| **h <= f))
                    .take(q.limit)
                    .map(|h| json!({"accountId": format!("acct{}.near", 500 - h), "blockHeight": h, "value": {"type": "md"}}))
                    .collect();
                Ok(Value::Array(page))
            }
            "like" if q.key["path"] == "acct0.near/post/main" => Ok(Value::Array(
                self.likers
                    .lock()
                    .unwrap()
                    .iter()
                    .map(|a| json!({"accountId": a, "value": {"type": "like"}}))
                    .collect(),
            )),
            _ => Ok(json!([])),
        }
    }

    async fn get(&self, keys: &[String], block_height: Option<u64>) -> Result<Value> {
        let mut out = json!({});
        for key in keys {
            if let Some(account) = key.strip_suffix("/post/main") {
                let text = format!("hello from {account} at {}", block_height.unwrap_or(0));
                out[account] = json!({"post": {"main": json!({"type": "md", "text": text}).to_string()}});
            }
        }
        Ok(out)
    }
}

struct Signer {
    chain: Arc<Chain>,
    refuse: Mutex<bool>,
}

#[async_trait]
impl Wallet for Signer {
    fn account_id(&self) -> Option<String> {
        Some("viewer.near".into())
    }

    async fn sign_and_send_transaction(&self, receiver_id: &str, actions: Vec<WalletAction>) -> Result<Value> {
        assert_eq!(receiver_id, "social.near");
        if std::mem::take(&mut *self.refuse.lock().unwrap()) {
            return Err(anyhow!("User rejected the request"));
        }
        let call = actions[0].to_json();
        if call["params"]["args"]["data"]["viewer.near"]["index"]["like"].is_string() {
            self.chain.likers.lock().unwrap().push("viewer.near".into());
        }
        Ok(json!({}))
    }
}

struct Flat;

#[async_trait]
impl BalanceSource for Flat {
    async fn balance(&self, _account_id: &str) -> Result<String> {
        Ok("12.50".into())
    }
}

#[tokio::test]
async fn feed_pages_to_the_end_without_duplicates() {
    let chain = Arc::new(Chain::new(23));
    let gateway = Arc::new(SocialGateway::new(chain, "social.near", "https://ipfs.near.social/ipfs"));
    let session = Arc::new(SessionStore::new(Arc::new(Flat), EventBus::default()));
    let feed = FeedController::new(gateway, session, Arc::new(Interactions::new()));

    assert_eq!(feed.load(10, false).await, LoadOutcome::Replaced(10));
    let mut rounds = 0;
    while feed.has_more() {
        rounds += 1;
        assert!(rounds < 10, "pagination did not terminate");
        assert!(matches!(feed.load(10, true).await, LoadOutcome::Appended { .. }));
    }
    assert_eq!(feed.load(10, true).await, LoadOutcome::Exhausted);

    let posts = feed.posts();
    assert_eq!(posts.len(), 23);
    let unique: HashSet<_> = posts.iter().map(|p| &p.id).collect();
    assert_eq!(unique.len(), 23);
    assert!(posts[0].content_text.starts_with("hello from acct0.near"));
}

#[tokio::test]
async fn like_flow_emits_prompt_then_toast_and_survives_rejection() {
    let chain = Arc::new(Chain::new(3));
    let gateway = Arc::new(SocialGateway::new(chain.clone(), "social.near", "https://ipfs.near.social/ipfs"));
    let bus = EventBus::default();
    let mut events = bus.subscribe();
    let session = Arc::new(SessionStore::new(Arc::new(Flat), bus.clone()));
    let interactions = Arc::new(Interactions::new());
    let feed = FeedController::new(gateway.clone(), session.clone(), interactions.clone());
    let wallet = Arc::new(Signer {
        chain: chain.clone(),
        refuse: Mutex::new(true),
    });
    let coord = InteractionCoordinator::new(gateway, wallet.clone(), session.clone(), interactions, bus);

    feed.load(10, false).await;
    let target = feed.posts()[0].clone();

    // No session yet: prompt to connect, nothing changes.
    assert!(matches!(
        coord.request(Action::like(&target)),
        Err(InteractionError::NotConnected)
    ));
    assert_eq!(events.recv().await.unwrap(), AppEvent::ConnectWallet);

    assert_eq!(session.restore(wallet.as_ref()).as_deref(), Some("viewer.near"));
    assert_eq!(session.refresh_balance().await.as_deref(), Some("12.50"));

    // First attempt is rejected inside the wallet and rolled back.
    let c = coord.request(Action::like(&target)).unwrap();
    assert!(coord.confirm(c, Deposit::zero()).await.is_err());
    assert_eq!(feed.view()[0].likes, Tally::new(0, false));

    // Second attempt lands and reconciles against the chain.
    let c = coord.request(Action::like(&target)).unwrap();
    assert_eq!(coord.confirm(c, Deposit::zero()).await.unwrap(), Tally::new(1, true));
    assert_eq!(feed.view()[0].likes, Tally::new(1, true));

    let mut toasts = Vec::new();
    while let Ok(e) = events.try_recv() {
        if let AppEvent::Toast { kind, .. } = e {
            toasts.push(kind);
        }
    }
    assert_eq!(toasts, vec![ToastKind::Error, ToastKind::Success]);
}
