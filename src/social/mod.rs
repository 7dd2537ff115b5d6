//! Social data gateway.
//!
//! Isolates the rest of the crate from the social API: every read goes through
//! [`shape`] for normalization and degrades to empty/`None` on failure, every
//! write is a single `set` call signed by the caller's [`Wallet`].

pub mod client;
pub mod content;
pub mod shape;
pub mod writes;

use anyhow::Result;
use async_trait::async_trait;
use futures::future::join_all;
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;

use crate::types::{post_id, Cursor, ItemRef, Post, PostPage, Profile, SocialStats, Tally};
use crate::wallet::{default_gas, Deposit, FunctionCall, Wallet, WalletAction};
use content::{format_relative_time, parse_post_body, parse_profile, placeholder_avatar, short_name};
use shape::{live_keys, pluck, IndexEntry, Shape};

pub use client::NearSocialClient;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

/// Query against the social index (`index` primitive).
#[derive(Clone, Debug, PartialEq)]
pub struct IndexQuery {
    pub action: String,
    pub key: Value,
    pub limit: usize,
    pub order: Order,
    pub from: Option<u64>,
    pub account_id: Option<String>,
}

impl IndexQuery {
    pub fn new(action: &str, key: Value) -> Self {
        IndexQuery {
            action: action.to_string(),
            key,
            limit: 100,
            order: Order::Asc,
            from: None,
            account_id: None,
        }
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn desc(mut self) -> Self {
        self.order = Order::Desc;
        self
    }

    pub fn from_height(mut self, from: Option<u64>) -> Self {
        self.from = from;
        self
    }

    pub fn account(mut self, account_id: &str) -> Self {
        self.account_id = Some(account_id.to_string());
        self
    }

    /// Request body understood by the social API.
    pub fn to_body(&self) -> Value {
        let mut options = json!({
            "limit": self.limit,
            "order": match self.order { Order::Asc => "asc", Order::Desc => "desc" },
        });
        if let Some(from) = self.from {
            options["from"] = json!(from);
        }
        if let Some(ref account) = self.account_id {
            options["accountId"] = json!(account);
        }
        json!({ "action": self.action, "key": self.key, "options": options })
    }
}

/// The external social-graph SDK.
#[async_trait]
pub trait SocialBackend: Send + Sync {
    async fn index(&self, query: &IndexQuery) -> Result<Value>;
    async fn get(&self, keys: &[String], block_height: Option<u64>) -> Result<Value>;
}

/// Deepest offset served by [`SocialGateway::fetch_posts_at_offset`].
pub const MAX_OFFSET: usize = 10_000;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid account id '{0}'")]
    InvalidAccount(String),
    #[error("transaction failed: {0}")]
    Transaction(anyhow::Error),
}

/// Position in the descending post index: the block height to resume from
/// and how many entries at that height were already handed out, since several
/// posts can share a block. Serialized as `"<height>:<skip>"`; a plain height reads as skip 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct FeedPosition {
    height: u64,
    skip: usize,
}

impl FeedPosition {
    fn parse(s: &str) -> Option<FeedPosition> {
        let (height, skip) = s.split_once(':').unwrap_or((s, "0"));
        Some(FeedPosition {
            height: height.trim().parse().ok()?,
            skip: skip.trim().parse().ok()?,
        })
    }

    /// Position following `page`, which was read starting at `current`.
    fn after(current: Option<FeedPosition>, page: &[IndexEntry]) -> Option<FeedPosition> {
        let lowest = page.iter().filter_map(|e| e.block_height).min()?;
        let at_lowest = page.iter().filter(|e| e.block_height == Some(lowest)).count();
        let carried = match current {
            Some(p) if p.height == lowest => p.skip,
            _ => 0,
        };
        Some(FeedPosition {
            height: lowest,
            skip: carried + at_lowest,
        })
    }
}

impl std::fmt::Display for FeedPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.height, self.skip)
    }
}

pub struct SocialGateway {
    backend: Arc<dyn SocialBackend>,
    contract_id: String,
    ipfs_gateway: String,
}

impl SocialGateway {
    pub fn new(
        backend: Arc<dyn SocialBackend>,
        contract_id: impl Into<String>,
        ipfs_gateway: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            contract_id: contract_id.into(),
            ipfs_gateway: ipfs_gateway.into(),
        }
    }

    pub fn from_config(cfg: &crate::config::Config) -> Self {
        Self::new(
            Arc::new(NearSocialClient::from_config(cfg)),
            cfg.social_contract.clone(),
            cfg.ipfs_gateway_url.clone(),
        )
    }

    pub fn ipfs_gateway(&self) -> &str {
        &self.ipfs_gateway
    }

    pub fn avatar_url(&self, profile: Option<&Profile>, account_id: &str) -> String {
        content::avatar_url(profile, account_id, &self.ipfs_gateway)
    }

    // ----- reads -----

    /// One descending page of posts starting at `cursor`. An unreachable
    /// indexer yields an empty page.
    pub async fn fetch_posts(&self, limit: usize, cursor: Option<&Cursor>) -> PostPage {
        self.try_fetch_posts(limit, cursor).await.unwrap_or_else(|e| {
            log::warn!("[gateway] post page failed: {e}");
            PostPage::default()
        })
    }

    /// Same as [`SocialGateway::fetch_posts`] but reports an indexer failure
    /// instead of degrading. Individual bad posts are still dropped.
    pub async fn try_fetch_posts(&self, limit: usize, cursor: Option<&Cursor>) -> Result<PostPage> {
        let position = cursor.and_then(|c| {
            let parsed = FeedPosition::parse(c.as_str());
            if parsed.is_none() {
                log::warn!("[gateway] ignoring unreadable cursor '{c}'");
            }
            parsed
        });
        let skip = position.map_or(0, |p| p.skip);
        let query = IndexQuery::new("post", json!("main"))
            .limit(limit.saturating_add(skip))
            .desc()
            .from_height(position.map(|p| p.height));
        let raw = Shape::of(self.backend.index(&query).await?).into_entries();
        let full_page = raw.len() >= query.limit;

        // Drop entries at the cursor height that an earlier page already returned.
        let mut seen = 0;
        let entries: Vec<IndexEntry> = raw
            .into_iter()
            .filter(|e| match position {
                Some(p) if seen < p.skip && e.block_height == Some(p.height) => {
                    seen += 1;
                    false
                }
                _ => true,
            })
            .collect();

        let next_cursor = if full_page {
            FeedPosition::after(position, &entries).map(|p| Cursor(p.to_string()))
        } else {
            None
        };

        let (posts, dropped) = self.hydrate_entries(entries).await;
        log::debug!(
            "[gateway] page: {} posts, {} dropped, next={:?}",
            posts.len(),
            dropped,
            next_cursor
        );
        Ok(PostPage {
            posts,
            next_cursor,
            dropped,
        })
    }

    /// Offset pagination: fetch `offset + limit` entries (plus one to see
    /// whether more exist) and slice. Offsets past [`MAX_OFFSET`] are empty.
    pub async fn fetch_posts_at_offset(&self, offset: usize, limit: usize) -> (Vec<Post>, Option<usize>) {
        if offset > MAX_OFFSET {
            log::debug!("[gateway] offset {offset} beyond {MAX_OFFSET}, returning empty page");
            return (Vec::new(), None);
        }
        let end = offset.saturating_add(limit);
        let query = IndexQuery::new("post", json!("main"))
            .limit(end.saturating_add(1))
            .desc();
        let entries = self.index_entries(&query).await;
        let total = entries.len();
        let window: Vec<IndexEntry> = entries.into_iter().skip(offset).take(limit).collect();
        let (posts, _) = self.hydrate_entries(window).await;
        let next = (total > end).then_some(end);
        (posts, next)
    }

    /// Latest posts by a single author.
    pub async fn fetch_account_posts(&self, account_id: &str, limit: usize) -> Vec<Post> {
        let query = IndexQuery::new("post", json!("main"))
            .limit(limit)
            .desc()
            .account(account_id);
        let entries = self.index_entries(&query).await;
        self.hydrate_entries(entries).await.0
    }

    /// `None` on absence or any failure.
    pub async fn fetch_profile(&self, account_id: &str) -> Option<Profile> {
        let keys = vec![format!("{account_id}/profile/**")];
        match self.backend.get(&keys, None).await {
            Ok(v) => pluck(&v, &[account_id, "profile"]).and_then(|raw| parse_profile(account_id, raw)),
            Err(e) => {
                log::warn!("[gateway] profile lookup for {account_id} failed: {e}");
                None
            }
        }
    }

    pub async fn like_state(&self, item: &ItemRef, me: Option<&str>) -> Result<Tally> {
        let query = IndexQuery::new("like", json!(item));
        let likes = Shape::of(self.backend.index(&query).await?);
        Ok(tally_of(likes.active_accounts("like", "unlike"), me))
    }

    pub async fn repost_state(&self, item: &ItemRef, me: Option<&str>) -> Result<Tally> {
        let query = IndexQuery::new("repost", json!(item));
        let reposts = Shape::of(self.backend.index(&query).await?);
        Ok(tally_of(reposts.active_accounts("repost", "unrepost"), me))
    }

    pub async fn poke_state(&self, target: &str, me: Option<&str>) -> Result<Tally> {
        let query = IndexQuery::new("notify", json!(target));
        let entries = Shape::of(self.backend.index(&query).await?).into_entries();
        let pokes: Vec<&IndexEntry> = entries.iter().filter(|e| e.value_type() == Some("poke")).collect();
        let by_me = me.is_some_and(|me| pokes.iter().any(|e| e.account_id.as_deref() == Some(me)));
        Ok(Tally::new(pokes.len() as u64, by_me))
    }

    pub async fn following(&self, account_id: &str) -> Result<Vec<String>> {
        let keys = vec![format!("{account_id}/graph/follow/*")];
        let v = self.backend.get(&keys, None).await?;
        Ok(live_keys(pluck(&v, &[account_id, "graph", "follow"])))
    }

    pub async fn followers(&self, account_id: &str) -> Result<Vec<String>> {
        let keys = vec![format!("*/graph/follow/{account_id}")];
        let v = self.backend.get(&keys, None).await?;
        let mut out = Vec::new();
        if let Shape::Keyed(map) = Shape::of(v) {
            for (follower, data) in map {
                if pluck(&data, &["graph", "follow", account_id]).is_some() {
                    out.push(follower);
                }
            }
        }
        Ok(out)
    }

    pub async fn is_following(&self, me: &str, target: &str) -> Result<bool> {
        Ok(self.following(me).await?.iter().any(|a| a == target))
    }

    /// Follower/following/post counts; each part degrades to zero independently.
    pub async fn social_stats(&self, account_id: &str) -> SocialStats {
        let posts_query = IndexQuery::new("post", json!("main")).limit(1000).account(account_id);
        let (followers, following, posts) = futures::join!(
            self.followers(account_id),
            self.following(account_id),
            self.backend.index(&posts_query),
        );
        let count = |label: &str, r: Result<usize>| {
            r.unwrap_or_else(|e| {
                log::warn!("[gateway] {label} count for {account_id} failed: {e}");
                0
            })
        };
        SocialStats {
            followers: count("followers", followers.map(|v| v.len())),
            following: count("following", following.map(|v| v.len())),
            posts: count("posts", posts.map(|v| Shape::of(v).into_items().len())),
        }
    }

    // ----- writes -----

    pub async fn post_content(
        &self,
        wallet: &dyn Wallet,
        account_id: &str,
        text: &str,
        image_url: Option<&str>,
    ) -> Result<Value, GatewayError> {
        self.set(wallet, account_id, writes::post(text, image_url), Deposit::zero())
            .await
    }

    pub async fn like(
        &self,
        wallet: &dyn Wallet,
        account_id: &str,
        item: &ItemRef,
        author: &str,
        deposit: Deposit,
    ) -> Result<Value, GatewayError> {
        self.set(wallet, account_id, writes::like(item, author, true), deposit)
            .await
    }

    pub async fn unlike(
        &self,
        wallet: &dyn Wallet,
        account_id: &str,
        item: &ItemRef,
        author: &str,
        deposit: Deposit,
    ) -> Result<Value, GatewayError> {
        self.set(wallet, account_id, writes::like(item, author, false), deposit)
            .await
    }

    pub async fn repost(
        &self,
        wallet: &dyn Wallet,
        account_id: &str,
        item: &ItemRef,
        author: &str,
        deposit: Deposit,
    ) -> Result<Value, GatewayError> {
        self.set(wallet, account_id, writes::repost(item, author), deposit)
            .await
    }

    pub async fn follow(
        &self,
        wallet: &dyn Wallet,
        account_id: &str,
        target: &str,
        deposit: Deposit,
    ) -> Result<Value, GatewayError> {
        self.set(wallet, account_id, writes::follow(target, true), deposit)
            .await
    }

    pub async fn unfollow(
        &self,
        wallet: &dyn Wallet,
        account_id: &str,
        target: &str,
        deposit: Deposit,
    ) -> Result<Value, GatewayError> {
        self.set(wallet, account_id, writes::follow(target, false), deposit)
            .await
    }

    pub async fn poke(
        &self,
        wallet: &dyn Wallet,
        account_id: &str,
        target: &str,
        deposit: Deposit,
    ) -> Result<Value, GatewayError> {
        self.set(wallet, account_id, writes::poke(target), deposit)
            .await
    }

    async fn set(
        &self,
        wallet: &dyn Wallet,
        account_id: &str,
        data: Value,
        deposit: Deposit,
    ) -> Result<Value, GatewayError> {
        if account_id.parse::<near_account_id::AccountId>().is_err() {
            return Err(GatewayError::InvalidAccount(account_id.to_string()));
        }
        let action = WalletAction::FunctionCall(FunctionCall {
            method_name: "set".to_string(),
            args: writes::set_args(account_id, data),
            gas: default_gas(),
            deposit,
        });
        log::info!(
            "[gateway] set on {} by {} (deposit {})",
            self.contract_id,
            account_id,
            deposit.label()
        );
        wallet
            .sign_and_send_transaction(&self.contract_id, vec![action])
            .await
            .map_err(|e| {
                log::warn!("[gateway] transaction by {account_id} failed: {e}");
                GatewayError::Transaction(e)
            })
    }

    // ----- helpers -----

    async fn index_entries(&self, query: &IndexQuery) -> Vec<IndexEntry> {
        match self.backend.index(query).await {
            Ok(v) => Shape::of(v).into_entries(),
            Err(e) => {
                log::warn!("[gateway] index {} failed: {e}", query.action);
                Vec::new()
            }
        }
    }

    /// Resolve bodies concurrently, keeping index order. Returns posts and drop count.
    async fn hydrate_entries(&self, entries: Vec<IndexEntry>) -> (Vec<Post>, usize) {
        let total = entries.len();
        let now_ms = chrono::Utc::now().timestamp_millis();
        let with_account: Vec<IndexEntry> = entries
            .into_iter()
            .filter(|e| e.account_id.is_some())
            .collect();
        let missing_account = total - with_account.len();
        if missing_account > 0 {
            log::debug!("[gateway] dropped {missing_account} entries without account id");
        }

        let posts: Vec<Post> = join_all(with_account.iter().map(|e| self.build_post(e, now_ms)))
            .await
            .into_iter()
            .flatten()
            .collect();
        let dropped = total - posts.len();
        (posts, dropped)
    }

    async fn build_post(&self, entry: &IndexEntry, now_ms: i64) -> Option<Post> {
        let author = entry.account_id.as_deref()?;
        let raw = match entry.value.get("main") {
            Some(inline) if !inline.is_null() => inline.clone(),
            _ => match self.post_body(author, entry.block_height).await {
                Ok(v) => v,
                Err(e) => {
                    log::warn!("[gateway] body for {author}@{:?} failed: {e}", entry.block_height);
                    return None;
                }
            },
        };
        let Some(content) = parse_post_body(&raw, &self.ipfs_gateway) else {
            log::warn!("[gateway] dropping {author}@{:?}: unreadable body", entry.block_height);
            return None;
        };
        let time_label = entry
            .timestamp_ms
            .map(|ts| format_relative_time(ts, now_ms))
            .unwrap_or_else(|| "Just now".to_string());
        Some(Post {
            id: post_id(author, entry.block_height),
            block_height: entry.block_height,
            author_account_id: author.to_string(),
            display_name: short_name(author),
            time_label,
            content_text: content.text,
            image_url: content.image_url,
            audio_url: content.audio_url,
            avatar_url: placeholder_avatar(author),
        })
    }

    async fn post_body(&self, author: &str, block_height: Option<u64>) -> Result<Value> {
        let keys = vec![format!("{author}/post/main")];
        let v = self.backend.get(&keys, block_height).await?;
        Ok(pluck(&v, &[author, "post", "main"]).cloned().unwrap_or(Value::Null))
    }
}

fn tally_of(active: Vec<String>, me: Option<&str>) -> Tally {
    let by_me = me.is_some_and(|me| active.iter().any(|a| a == me));
    Tally::new(active.len() as u64, by_me)
}
