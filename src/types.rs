use serde::{Deserialize, Serialize};

/// Post identity: `"{author}/{block_height}"`.
pub type PostId = String;

pub fn post_id(author: &str, block_height: Option<u64>) -> PostId {
    format!("{}/{}", author, block_height.unwrap_or(0))
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: PostId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_height: Option<u64>,
    pub author_account_id: String,
    pub display_name: String,
    pub time_label: String,
    pub content_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    pub avatar_url: String,
}

impl Post {
    /// The social item this post is addressed by in like/repost indexes.
    pub fn item(&self) -> ItemRef {
        ItemRef::post(&self.author_account_id, self.block_height.unwrap_or(0))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileLinks {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twitter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telegram: Option<String>,
}

impl ProfileLinks {
    pub fn is_empty(&self) -> bool {
        self.twitter.is_none()
            && self.github.is_none()
            && self.website.is_none()
            && self.telegram.is_none()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub account_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_source_cid: Option<String>,
    /// Plain image URL for profiles that do not use IPFS.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url_override: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<ProfileLinks>,
}

/// Opaque pagination token. Callers hand it back verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(pub String);

impl Cursor {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, Default)]
pub struct PostPage {
    pub posts: Vec<Post>,
    pub next_cursor: Option<Cursor>,
    /// Entries dropped for data-quality reasons (no account, bad body, failed fetch).
    pub dropped: usize,
}

/// Address of a likeable/repostable social item.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRef {
    #[serde(rename = "type")]
    pub kind: String,
    pub path: String,
    pub block_height: u64,
}

impl ItemRef {
    pub fn post(author: &str, block_height: u64) -> Self {
        ItemRef {
            kind: "social".to_string(),
            path: format!("{author}/post/main"),
            block_height,
        }
    }
}

/// Count plus "by me" flag for one interaction target. The two always move together.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tally {
    pub count: u64,
    pub by_me: bool,
}

impl Tally {
    pub fn new(count: u64, by_me: bool) -> Self {
        Tally { count, by_me }
    }

    /// Flip the flag and move the count with it. Never goes below zero.
    pub fn toggled(self) -> Self {
        if self.by_me {
            Tally::new(self.count.saturating_sub(1), false)
        } else {
            Tally::new(self.count.saturating_add(1), true)
        }
    }

    pub fn bumped(self) -> Self {
        Tally::new(self.count.saturating_add(1), true)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialStats {
    pub followers: usize,
    pub following: usize,
    pub posts: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub is_connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<String>,
}

/// Explorer transaction normalized from several indexer shapes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentTransaction {
    pub hash: Option<String>,
    pub signer: Option<String>,
    pub receiver: Option<String>,
    pub block_timestamp: Option<serde_json::Value>,
    pub actions: Option<serde_json::Value>,
    pub status: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_moves_count_and_flag_together() {
        let t = Tally::new(3, false).toggled();
        assert_eq!(t, Tally::new(4, true));
        assert_eq!(t.toggled(), Tally::new(3, false));
    }

    #[test]
    fn toggle_clamps_at_zero() {
        assert_eq!(Tally::new(0, true).toggled(), Tally::new(0, false));
    }

    #[test]
    fn post_item_points_at_main_post() {
        let item = ItemRef::post("alice.near", 42);
        assert_eq!(item.path, "alice.near/post/main");
        assert_eq!(item.block_height, 42);
        let v = serde_json::to_value(&item).unwrap();
        assert_eq!(v["type"], "social");
        assert_eq!(v["blockHeight"], 42);
    }

    #[test]
    fn post_serializes_camel_case() {
        let post = Post {
            id: post_id("bob.near", Some(7)),
            block_height: Some(7),
            author_account_id: "bob.near".into(),
            display_name: "bob".into(),
            time_label: "Just now".into(),
            content_text: "hi".into(),
            image_url: None,
            audio_url: None,
            avatar_url: "https://a".into(),
        };
        let v = serde_json::to_value(&post).unwrap();
        assert_eq!(v["id"], "bob.near/7");
        assert_eq!(v["authorAccountId"], "bob.near");
        assert!(v.get("imageUrl").is_none());
    }
}
