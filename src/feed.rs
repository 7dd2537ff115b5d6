//! Paged feed with background hydration of profiles and interaction counts.

use futures::future::join_all;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::interactions::{Interactions, Kind};
use crate::session::SessionStore;
use crate::social::content::display_name;
use crate::social::SocialGateway;
use crate::types::{Cursor, Post, PostId, Profile, Tally};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FeedState {
    Idle,
    Loading,
    Loaded,
    Error(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Refresh applied with this many posts.
    Replaced(usize),
    /// Page appended; duplicates already in the list are skipped.
    Appended { added: usize, skipped: usize },
    /// No cursor left; nothing was requested.
    Exhausted,
    /// Append asked for before a successful first load.
    NotReady,
    /// A newer load started while this one was in flight.
    Superseded,
    Failed(String),
}

/// A post merged with its author's profile and local interaction state.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    #[serde(flatten)]
    pub post: Post,
    pub likes: Tally,
    pub reposts: Tally,
    pub following_author: bool,
}

struct FeedInner {
    state: FeedState,
    loading_more: bool,
    posts: Vec<Post>,
    ids: HashSet<PostId>,
    next_cursor: Option<Cursor>,
    profiles: HashMap<String, Option<Profile>>,
}

pub struct FeedController {
    gateway: Arc<SocialGateway>,
    session: Arc<SessionStore>,
    interactions: Arc<Interactions>,
    inner: Mutex<FeedInner>,
    latest: AtomicU64,
}

impl FeedController {
    pub fn new(
        gateway: Arc<SocialGateway>,
        session: Arc<SessionStore>,
        interactions: Arc<Interactions>,
    ) -> Self {
        Self {
            gateway,
            session,
            interactions,
            inner: Mutex::new(FeedInner {
                state: FeedState::Idle,
                loading_more: false,
                posts: Vec::new(),
                ids: HashSet::new(),
                next_cursor: None,
                profiles: HashMap::new(),
            }),
            latest: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FeedInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> FeedState {
        self.lock().state.clone()
    }

    pub fn is_loading_more(&self) -> bool {
        self.lock().loading_more
    }

    pub fn posts(&self) -> Vec<Post> {
        self.lock().posts.clone()
    }

    pub fn next_cursor(&self) -> Option<Cursor> {
        self.lock().next_cursor.clone()
    }

    /// `false` once the last page has been appended.
    pub fn has_more(&self) -> bool {
        self.lock().next_cursor.is_some()
    }

    /// Load a page. `append = false` replaces the list, `append = true`
    /// continues from the stored cursor.
    pub async fn load(&self, limit: usize, append: bool) -> LoadOutcome {
        let (token, cursor) = {
            let mut s = self.lock();
            let cursor = if append {
                if s.state != FeedState::Loaded {
                    return LoadOutcome::NotReady;
                }
                let Some(cursor) = s.next_cursor.clone() else {
                    return LoadOutcome::Exhausted;
                };
                s.loading_more = true;
                Some(cursor)
            } else {
                s.state = FeedState::Loading;
                None
            };
            (self.latest.fetch_add(1, Ordering::SeqCst) + 1, cursor)
        };
        log::debug!("[feed] load #{token} append={append} cursor={cursor:?}");

        let result = self.gateway.try_fetch_posts(limit, cursor.as_ref()).await;

        let (outcome, fresh) = {
            let mut s = self.lock();
            if self.latest.load(Ordering::SeqCst) != token {
                log::debug!("[feed] load #{token} superseded");
                return LoadOutcome::Superseded;
            }
            s.loading_more = false;
            match result {
                Err(e) => {
                    let msg = e.to_string();
                    log::warn!("[feed] load #{token} failed: {msg}");
                    if !append {
                        s.state = FeedState::Error(msg.clone());
                    }
                    return LoadOutcome::Failed(msg);
                }
                Ok(page) => {
                    if !append {
                        s.posts.clear();
                        s.ids.clear();
                    }
                    let mut fresh = Vec::with_capacity(page.posts.len());
                    let mut skipped = 0;
                    for post in page.posts {
                        if s.ids.insert(post.id.clone()) {
                            fresh.push(post.clone());
                            s.posts.push(post);
                        } else {
                            skipped += 1;
                        }
                    }
                    s.next_cursor = page.next_cursor;
                    s.state = FeedState::Loaded;
                    let outcome = if append {
                        LoadOutcome::Appended {
                            added: fresh.len(),
                            skipped,
                        }
                    } else {
                        LoadOutcome::Replaced(fresh.len())
                    };
                    (outcome, fresh)
                }
            }
        };

        self.hydrate(&fresh).await;
        log::info!("[feed] load #{token}: {outcome:?}");
        outcome
    }

    /// Re-read interaction state for every loaded post, e.g. after the
    /// account changed.
    pub async fn rehydrate(&self) {
        let posts = self.posts();
        self.hydrate(&posts).await;
    }

    /// Profiles (one request per unique author) and like/repost tallies (per
    /// post), all concurrently. Failures keep last-known values.
    async fn hydrate(&self, posts: &[Post]) {
        if posts.is_empty() {
            return;
        }
        let me = self.session.active_account();
        let mut seen = HashSet::new();
        let authors: Vec<String> = posts
            .iter()
            .map(|p| p.author_account_id.clone())
            .filter(|a| seen.insert(a.clone()))
            .collect();

        let gateway = &self.gateway;
        let profiles = join_all(authors.into_iter().map(|author| async move {
            let profile = gateway.fetch_profile(&author).await;
            (author, profile)
        }));
        let tallies = join_all(posts.iter().filter(|p| p.block_height.is_some()).map(|post| {
            let me = me.as_deref();
            async move {
                let item = post.item();
                let (likes, reposts) =
                    futures::join!(gateway.like_state(&item, me), gateway.repost_state(&item, me));
                (post.id.clone(), likes, reposts)
            }
        }));
        let following = async {
            match me.as_deref() {
                Some(me) => Some(gateway.following(me).await),
                None => None,
            }
        };
        let (profiles, tallies, following) = futures::join!(profiles, tallies, following);

        match following {
            Some(Ok(list)) => self.interactions.set_following(list),
            Some(Err(e)) => log::warn!("[feed] following list unavailable: {e}"),
            None => {}
        }

        {
            let mut s = self.lock();
            for (author, profile) in profiles {
                match profile {
                    Some(p) => {
                        s.profiles.insert(author, Some(p));
                    }
                    None => {
                        s.profiles.entry(author).or_insert(None);
                    }
                }
            }
        }
        let mut failed = 0usize;
        for (id, likes, reposts) in tallies {
            match likes {
                Ok(t) => {
                    self.interactions.hydrate(Kind::Like, &id, t);
                }
                Err(_) => failed += 1,
            }
            match reposts {
                Ok(t) => {
                    self.interactions.hydrate(Kind::Repost, &id, t);
                }
                Err(_) => failed += 1,
            }
        }
        if failed > 0 {
            log::warn!("[feed] {failed} interaction lookups failed during hydration");
        }
    }

    /// Posts merged with profile name/avatar and current tallies.
    pub fn view(&self) -> Vec<PostView> {
        let s = self.lock();
        s.posts
            .iter()
            .map(|post| {
                let profile = s.profiles.get(&post.author_account_id).and_then(Option::as_ref);
                let mut post = post.clone();
                post.display_name = display_name(profile, &post.author_account_id);
                post.avatar_url = self.gateway.avatar_url(profile, &post.author_account_id);
                PostView {
                    likes: self.interactions.likes(&post.id),
                    reposts: self.interactions.reposts(&post.id),
                    following_author: self.interactions.is_following(&post.author_account_id),
                    post,
                }
            })
            .collect()
    }
}
