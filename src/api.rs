//! Read-only HTTP query API over the social gateway.
//!
//! ## Endpoints
//! - GET /health - Health check
//! - GET /api/posts?limit=N&offset=M - Offset-paged posts, newest first
//! - GET /api/profiles/:account_id - Profile or `null`
//!
//! Upstream failures never surface as HTTP errors: posts degrade to an empty
//! list and profiles to `null`.

use axum::{
    extract::{Path, Query, State},
    http::Method,
    response::Json,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::social::SocialGateway;
use crate::types::{Post, Profile};

pub const MAX_PAGE: usize = 100;

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<SocialGateway>,
}

#[derive(Debug, Deserialize)]
pub struct PostsQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    20
}

#[derive(Debug, Serialize)]
pub struct PostsResponse {
    pub posts: Vec<Post>,
    /// Offset of the following page; `null` at the end.
    pub next: Option<usize>,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/posts", get(get_posts))
        .route("/api/profiles/:account_id", get(get_profile))
        .layer(cors)
        .with_state(state)
}

pub async fn health() -> &'static str {
    "OK"
}

pub async fn get_posts(
    State(state): State<AppState>,
    Query(q): Query<PostsQuery>,
) -> Json<PostsResponse> {
    let limit = q.limit.clamp(1, MAX_PAGE);
    let (posts, next) = state.gateway.fetch_posts_at_offset(q.offset, limit).await;
    log::debug!("[api] posts offset={} limit={} -> {}", q.offset, limit, posts.len());
    Json(PostsResponse { posts, next })
}

pub async fn get_profile(
    State(state): State<AppState>,
    Path(account_id): Path<String>,
) -> Json<Option<Profile>> {
    if account_id.parse::<near_account_id::AccountId>().is_err() {
        log::debug!("[api] rejecting invalid account id '{account_id}'");
        return Json(None);
    }
    Json(state.gateway.fetch_profile(&account_id).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockBackend;
    use serde_json::json;

    fn state(backend: Arc<MockBackend>) -> AppState {
        AppState {
            gateway: Arc::new(SocialGateway::new(backend, "social.near", "https://ipfs.near.social/ipfs")),
        }
    }

    #[tokio::test]
    async fn posts_page_by_offset() {
        let s = state(Arc::new(MockBackend::with_posts(30)));
        let Json(first) = get_posts(State(s.clone()), Query(PostsQuery { limit: 20, offset: 0 })).await;
        assert_eq!(first.posts.len(), 20);
        assert_eq!(first.next, Some(20));

        let Json(rest) = get_posts(State(s), Query(PostsQuery { limit: 20, offset: 20 })).await;
        assert_eq!(rest.posts.len(), 10);
        assert!(rest.next.is_none());
        let body = serde_json::to_value(&rest).unwrap();
        assert!(body["next"].is_null());
    }

    #[tokio::test]
    async fn huge_offset_is_an_empty_last_page() {
        let backend = Arc::new(MockBackend::with_posts(5));
        let s = state(backend.clone());
        let Json(resp) = get_posts(State(s), Query(PostsQuery { limit: 500, offset: usize::MAX })).await;
        assert_eq!(serde_json::to_value(&resp).unwrap(), json!({"posts": [], "next": null}));
        assert_eq!(backend.widest_index(), 0);
    }

    #[tokio::test]
    async fn posts_degrade_to_empty_on_upstream_failure() {
        let backend = Arc::new(MockBackend::with_posts(5));
        backend.fail_reads(true);
        let Json(resp) = get_posts(State(state(backend)), Query(PostsQuery { limit: 10, offset: 0 })).await;
        assert_eq!(serde_json::to_value(&resp).unwrap(), json!({"posts": [], "next": null}));
    }

    #[tokio::test]
    async fn profile_or_null() {
        let backend = Arc::new(MockBackend::default());
        backend.set_profile("alice.near", json!({"name": "Alice"}));
        let s = state(backend);

        let Json(found) = get_profile(State(s.clone()), Path("alice.near".into())).await;
        assert_eq!(found.unwrap().display_name.as_deref(), Some("Alice"));

        let Json(missing) = get_profile(State(s.clone()), Path("nobody.near".into())).await;
        assert!(missing.is_none());

        let Json(invalid) = get_profile(State(s), Path("Not Valid!".into())).await;
        assert!(invalid.is_none());
    }

    #[tokio::test]
    async fn health_is_ok() {
        assert_eq!(health().await, "OK");
    }
}
