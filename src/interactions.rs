//! Optimistic like / repost / follow / poke.
//!
//! Every action goes through the same steps:
//! 1. [`InteractionCoordinator::request`] checks the session and hands back a
//!    [`Confirmation`]; dropping it (or [`InteractionCoordinator::cancel`])
//!    changes nothing.
//! 2. [`InteractionCoordinator::confirm`] applies the optimistic tally before
//!    its first `.await`, then submits the write through the wallet.
//! 3. Success re-reads the authoritative state for that one target; failure
//!    restores the exact previous tally and raises an error toast.
//!
//! Targets are tracked independently, so actions on different posts or
//! accounts can be in flight at the same time.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

use crate::events::{AppEvent, EventBus, ToastKind};
use crate::session::SessionStore;
use crate::social::{GatewayError, SocialGateway};
use crate::types::{ItemRef, Post, PostId, Tally};
use crate::wallet::{Deposit, Wallet};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    Like,
    Repost,
    Follow,
    Poke,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    Like { post: PostId, item: ItemRef, author: String },
    Repost { post: PostId, item: ItemRef, author: String },
    /// Direction (follow or unfollow) is decided on confirmation.
    Follow { target: String },
    Poke { target: String },
}

impl Action {
    pub fn like(post: &Post) -> Self {
        Action::Like {
            post: post.id.clone(),
            item: post.item(),
            author: post.author_account_id.clone(),
        }
    }

    pub fn repost(post: &Post) -> Self {
        Action::Repost {
            post: post.id.clone(),
            item: post.item(),
            author: post.author_account_id.clone(),
        }
    }

    pub fn follow(target: &str) -> Self {
        Action::Follow {
            target: target.to_string(),
        }
    }

    pub fn poke(target: &str) -> Self {
        Action::Poke {
            target: target.to_string(),
        }
    }

    pub fn kind(&self) -> Kind {
        match self {
            Action::Like { .. } => Kind::Like,
            Action::Repost { .. } => Kind::Repost,
            Action::Follow { .. } => Kind::Follow,
            Action::Poke { .. } => Kind::Poke,
        }
    }

    /// Post id or account id the action applies to.
    pub fn target(&self) -> &str {
        match self {
            Action::Like { post, .. } | Action::Repost { post, .. } => post,
            Action::Follow { target } | Action::Poke { target } => target,
        }
    }
}

#[derive(Debug, Error)]
pub enum InteractionError {
    #[error("connect a wallet first")]
    NotConnected,
    #[error("an action on {0} is already in flight")]
    Busy(String),
    #[error("already reposted")]
    AlreadyReposted,
    #[error("cannot target your own account")]
    SelfTarget,
    #[error("deposit {0} is not one of the offered amounts")]
    InvalidDeposit(String),
    #[error(transparent)]
    Commit(#[from] GatewayError),
}

/// Local interaction state shared by the feed (hydration) and the coordinator.
#[derive(Default)]
pub struct Interactions {
    inner: Mutex<InteractionState>,
}

#[derive(Default)]
struct InteractionState {
    likes: HashMap<PostId, Tally>,
    reposts: HashMap<PostId, Tally>,
    pokes: HashMap<String, Tally>,
    /// Follower count of an account plus whether we follow it.
    follows: HashMap<String, Tally>,
    following: HashSet<String>,
    pending_follow: HashMap<String, bool>,
    in_flight: HashSet<(Kind, String)>,
}

impl InteractionState {
    fn map_mut(&mut self, kind: Kind) -> &mut HashMap<String, Tally> {
        match kind {
            Kind::Like => &mut self.likes,
            Kind::Repost => &mut self.reposts,
            Kind::Follow => &mut self.follows,
            Kind::Poke => &mut self.pokes,
        }
    }

    fn get(&self, kind: Kind, id: &str) -> Tally {
        let map = match kind {
            Kind::Like => &self.likes,
            Kind::Repost => &self.reposts,
            Kind::Follow => &self.follows,
            Kind::Poke => &self.pokes,
        };
        match map.get(id).copied() {
            Some(t) => t,
            None if kind == Kind::Follow => Tally::new(0, self.following.contains(id)),
            None => Tally::default(),
        }
    }

    /// Write a tally; follow tallies keep the `following` set in step.
    fn put(&mut self, kind: Kind, id: &str, tally: Tally) {
        self.map_mut(kind).insert(id.to_string(), tally);
        if kind == Kind::Follow {
            if tally.by_me {
                self.following.insert(id.to_string());
            } else {
                self.following.remove(id);
            }
        }
    }
}

impl Interactions {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, InteractionState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn likes(&self, post: &str) -> Tally {
        self.lock().get(Kind::Like, post)
    }

    pub fn reposts(&self, post: &str) -> Tally {
        self.lock().get(Kind::Repost, post)
    }

    pub fn pokes(&self, account: &str) -> Tally {
        self.lock().get(Kind::Poke, account)
    }

    pub fn follow(&self, account: &str) -> Tally {
        self.lock().get(Kind::Follow, account)
    }

    pub fn is_following(&self, account: &str) -> bool {
        self.lock().following.contains(account)
    }

    pub fn following(&self) -> Vec<String> {
        let mut v: Vec<String> = self.lock().following.iter().cloned().collect();
        v.sort();
        v
    }

    /// `Some(true)` while a follow is in flight, `Some(false)` for an unfollow.
    pub fn pending_follow(&self, account: &str) -> Option<bool> {
        self.lock().pending_follow.get(account).copied()
    }

    pub fn is_in_flight(&self, kind: Kind, target: &str) -> bool {
        self.lock().in_flight.contains(&(kind, target.to_string()))
    }

    /// Replace the following set, leaving in-flight targets alone.
    pub fn set_following(&self, accounts: impl IntoIterator<Item = String>) {
        let mut s = self.lock();
        let mut next: HashSet<String> = accounts.into_iter().collect();
        let pinned: Vec<String> = s
            .in_flight
            .iter()
            .filter(|(k, _)| *k == Kind::Follow)
            .map(|(_, id)| id.clone())
            .collect();
        for id in pinned {
            if s.following.contains(&id) {
                next.insert(id);
            } else {
                next.remove(&id);
            }
        }
        for (id, tally) in s.follows.iter_mut() {
            tally.by_me = next.contains(id);
        }
        s.following = next;
    }

    /// Store a fetched tally unless an action on that target is in flight.
    /// Returns whether the value was applied.
    pub fn hydrate(&self, kind: Kind, target: &str, tally: Tally) -> bool {
        let mut s = self.lock();
        if s.in_flight.contains(&(kind, target.to_string())) {
            return false;
        }
        s.put(kind, target, tally);
        true
    }

    pub fn clear(&self) {
        *self.lock() = InteractionState::default();
    }
}

/// In-flight slot for one target. Dropping it unsettled (the confirm future
/// was cancelled) writes `fallback` back and frees the target.
struct InFlight<'a> {
    state: &'a Interactions,
    kind: Kind,
    target: String,
    fallback: Tally,
    settled: bool,
}

impl<'a> InFlight<'a> {
    fn new(state: &'a Interactions, kind: Kind, target: String, fallback: Tally) -> Self {
        Self {
            state,
            kind,
            target,
            fallback,
            settled: false,
        }
    }

    fn release(&self, tally: Tally) {
        let mut s = self.state.lock();
        s.put(self.kind, &self.target, tally);
        s.in_flight.remove(&(self.kind, self.target.clone()));
        s.pending_follow.remove(&self.target);
    }

    fn settle(mut self, tally: Tally) {
        self.release(tally);
        self.settled = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            log::warn!("[interact] {:?} {} abandoned mid-flight", self.kind, self.target);
            self.release(self.fallback);
        }
    }
}

/// Pending action awaiting the user's go-ahead.
#[derive(Debug)]
pub struct Confirmation {
    action: Action,
    account: String,
    deposit_options: Vec<Deposit>,
}

impl Confirmation {
    pub fn action(&self) -> &Action {
        &self.action
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn deposit_options(&self) -> &[Deposit] {
        &self.deposit_options
    }
}

pub struct InteractionCoordinator {
    gateway: Arc<SocialGateway>,
    wallet: Arc<dyn Wallet>,
    session: Arc<SessionStore>,
    state: Arc<Interactions>,
    events: EventBus,
}

impl InteractionCoordinator {
    pub fn new(
        gateway: Arc<SocialGateway>,
        wallet: Arc<dyn Wallet>,
        session: Arc<SessionStore>,
        state: Arc<Interactions>,
        events: EventBus,
    ) -> Self {
        Self {
            gateway,
            wallet,
            session,
            state,
            events,
        }
    }

    pub fn state(&self) -> &Arc<Interactions> {
        &self.state
    }

    /// Gate an action behind confirmation. Without a session nothing is touched.
    pub fn request(&self, action: Action) -> Result<Confirmation, InteractionError> {
        let Some(account) = self.session.active_account() else {
            log::info!("[interact] {:?} on {} needs a wallet", action.kind(), action.target());
            self.events.emit(AppEvent::ConnectWallet);
            return Err(InteractionError::NotConnected);
        };
        if matches!(action, Action::Follow { .. } | Action::Poke { .. }) && action.target() == account {
            return Err(InteractionError::SelfTarget);
        }
        let deposit_options = Deposit::presets();
        self.events.emit(AppEvent::ConfirmationRequested {
            action: action.clone(),
            deposit_options: deposit_options.iter().map(Deposit::label).collect(),
        });
        Ok(Confirmation {
            action,
            account,
            deposit_options,
        })
    }

    pub fn cancel(&self, confirmation: Confirmation) {
        log::debug!(
            "[interact] {:?} on {} cancelled",
            confirmation.action.kind(),
            confirmation.action.target()
        );
    }

    /// Run the optimistic update, commit, then reconcile or roll back.
    /// Returns the tally left in place for the target.
    pub async fn confirm(
        &self,
        confirmation: Confirmation,
        deposit: Deposit,
    ) -> Result<Tally, InteractionError> {
        let Confirmation {
            action,
            account,
            deposit_options,
        } = confirmation;
        if !deposit_options.contains(&deposit) {
            return Err(InteractionError::InvalidDeposit(deposit.label()));
        }
        if self.session.active_account().as_deref() != Some(account.as_str()) {
            self.events.emit(AppEvent::ConnectWallet);
            return Err(InteractionError::NotConnected);
        }

        let kind = action.kind();
        let target = action.target().to_string();

        // Optimistic phase: synchronous, before any await.
        let (mut slot, optimistic) = {
            let mut s = self.state.lock();
            if s.in_flight.contains(&(kind, target.clone())) {
                return Err(InteractionError::Busy(target));
            }
            let previous = s.get(kind, &target);
            let optimistic = match kind {
                Kind::Like | Kind::Follow => previous.toggled(),
                Kind::Repost if previous.by_me => return Err(InteractionError::AlreadyReposted),
                Kind::Repost | Kind::Poke => previous.bumped(),
            };
            if kind == Kind::Follow {
                s.pending_follow.insert(target.clone(), optimistic.by_me);
            }
            s.put(kind, &target, optimistic);
            s.in_flight.insert((kind, target.clone()));
            (InFlight::new(&self.state, kind, target.clone(), previous), optimistic)
        };
        let previous = slot.fallback;
        log::debug!("[interact] {kind:?} {target}: {previous:?} -> {optimistic:?}");

        let committed = self.commit(&action, &account, previous, deposit).await;

        match committed {
            Ok(()) => {
                // The write landed; if we are dropped while reconciling keep the guess.
                slot.fallback = optimistic;
                let authoritative = self.reconcile(&action, &account).await;
                let final_tally = authoritative.unwrap_or(optimistic);
                slot.settle(final_tally);
                self.events
                    .toast(ToastKind::Success, success_message(&action, optimistic));
                Ok(final_tally)
            }
            Err(e) => {
                slot.settle(previous);
                log::warn!("[interact] {kind:?} {target} rolled back: {e}");
                self.events.toast(
                    ToastKind::Error,
                    format!("Failed to {}: {}", verb(&action, optimistic), e),
                );
                Err(InteractionError::Commit(e))
            }
        }
    }

    /// Reload the following set for the active account.
    pub async fn refresh_following(&self) -> bool {
        let Some(me) = self.session.active_account() else {
            self.state.set_following(Vec::new());
            return false;
        };
        match self.gateway.following(&me).await {
            Ok(list) => {
                self.state.set_following(list);
                true
            }
            Err(e) => {
                log::warn!("[interact] following list for {me} failed: {e}");
                false
            }
        }
    }

    async fn commit(
        &self,
        action: &Action,
        account: &str,
        previous: Tally,
        deposit: Deposit,
    ) -> Result<(), GatewayError> {
        let wallet = self.wallet.as_ref();
        let gw = &self.gateway;
        match action {
            Action::Like { item, author, .. } if previous.by_me => {
                gw.unlike(wallet, account, item, author, deposit).await?
            }
            Action::Like { item, author, .. } => gw.like(wallet, account, item, author, deposit).await?,
            Action::Repost { item, author, .. } => gw.repost(wallet, account, item, author, deposit).await?,
            Action::Follow { target } if previous.by_me => gw.unfollow(wallet, account, target, deposit).await?,
            Action::Follow { target } => gw.follow(wallet, account, target, deposit).await?,
            Action::Poke { target } => gw.poke(wallet, account, target, deposit).await?,
        };
        Ok(())
    }

    async fn reconcile(&self, action: &Action, account: &str) -> Option<Tally> {
        let gw = &self.gateway;
        let me = Some(account);
        let fresh = match action {
            Action::Like { item, .. } => gw.like_state(item, me).await,
            Action::Repost { item, .. } => gw.repost_state(item, me).await,
            Action::Poke { target } => gw.poke_state(target, me).await,
            Action::Follow { target } => gw.followers(target).await.map(|followers| {
                let by_me = followers.iter().any(|f| f == account);
                Tally::new(followers.len() as u64, by_me)
            }),
        };
        match fresh {
            Ok(t) => Some(t),
            Err(e) => {
                log::warn!("[interact] reconcile {:?} {} failed: {e}", action.kind(), action.target());
                None
            }
        }
    }
}

fn verb(action: &Action, optimistic: Tally) -> &'static str {
    match action {
        Action::Like { .. } if optimistic.by_me => "like",
        Action::Like { .. } => "unlike",
        Action::Repost { .. } => "repost",
        Action::Follow { .. } if optimistic.by_me => "follow",
        Action::Follow { .. } => "unfollow",
        Action::Poke { .. } => "poke",
    }
}

fn success_message(action: &Action, optimistic: Tally) -> String {
    match action {
        Action::Like { .. } if optimistic.by_me => "Post liked!".to_string(),
        Action::Like { .. } => "Like removed".to_string(),
        Action::Repost { .. } => "Reposted!".to_string(),
        Action::Follow { target } if optimistic.by_me => format!("Following {target}"),
        Action::Follow { target } => format!("Unfollowed {target}"),
        Action::Poke { target } => format!("Poked {target}!"),
    }
}
