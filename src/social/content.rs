//! Post bodies, profiles, avatars and time labels.

use serde_json::Value;

use crate::types::{Profile, ProfileLinks};

pub const PLACEHOLDER_AVATAR_BASE: &str = "https://i.pravatar.cc/150";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PostContent {
    pub text: String,
    pub image_url: Option<String>,
    pub audio_url: Option<String>,
}

impl PostContent {
    fn plain(text: impl Into<String>) -> Self {
        PostContent {
            text: text.into(),
            image_url: None,
            audio_url: None,
        }
    }
}

/// Parse a stored `post/main` body.
///
/// Returns `None` for a missing body or one that looks like JSON but does not
/// parse; those posts are dropped by the caller.
pub fn parse_post_body(raw: &Value, ipfs_gateway: &str) -> Option<PostContent> {
    match raw {
        Value::String(s) => {
            let trimmed = s.trim_start();
            if trimmed.starts_with('{') || trimmed.starts_with('[') {
                let parsed: Value = serde_json::from_str(s).ok()?;
                Some(markdown_content(&parsed, ipfs_gateway).unwrap_or_else(|| PostContent::plain(s.as_str())))
            } else {
                Some(PostContent::plain(s.as_str()))
            }
        }
        Value::Object(_) => Some(
            markdown_content(raw, ipfs_gateway).unwrap_or_else(|| PostContent::plain(raw.to_string())),
        ),
        _ => None,
    }
}

/// `{"type":"md","text":..., "image": {...}, "audio": ...}`
fn markdown_content(v: &Value, ipfs_gateway: &str) -> Option<PostContent> {
    let obj = v.as_object()?;
    let text = obj.get("text").and_then(Value::as_str);
    let is_md = obj.get("type").and_then(Value::as_str) == Some("md");
    if !is_md && text.is_none() {
        return None;
    }
    Some(PostContent {
        text: text.unwrap_or_default().to_string(),
        image_url: obj.get("image").and_then(|i| media_url(i, ipfs_gateway)),
        audio_url: obj.get("audio").and_then(|a| media_url(a, ipfs_gateway)),
    })
}

/// Media may be a bare URL, `{ "url": ... }` or `{ "ipfs_cid": ... }`.
fn media_url(v: &Value, ipfs_gateway: &str) -> Option<String> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Object(map) => non_empty(map.get("url"))
            .or_else(|| non_empty(map.get("ipfs_cid")).map(|cid| ipfs_url(ipfs_gateway, &cid))),
        _ => None,
    }
}

pub fn ipfs_url(gateway: &str, cid: &str) -> String {
    format!("{}/{}", gateway.trim_end_matches('/'), cid)
}

/// Same account always maps to the same placeholder.
pub fn placeholder_avatar(account_id: &str) -> String {
    format!(
        "{}?u={}",
        PLACEHOLDER_AVATAR_BASE,
        urlencoding::encode(account_id)
    )
}

pub fn avatar_url(profile: Option<&Profile>, account_id: &str, ipfs_gateway: &str) -> String {
    if let Some(p) = profile {
        if let Some(cid) = p.avatar_source_cid.as_deref() {
            return ipfs_url(ipfs_gateway, cid);
        }
        if let Some(url) = p.avatar_url_override.as_deref() {
            return url.to_string();
        }
    }
    placeholder_avatar(account_id)
}

/// "alice" for "alice.near".
pub fn short_name(account_id: &str) -> String {
    account_id
        .split('.')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or(account_id)
        .to_string()
}

pub fn display_name(profile: Option<&Profile>, account_id: &str) -> String {
    profile
        .and_then(|p| p.display_name.clone())
        .unwrap_or_else(|| short_name(account_id))
}

/// Normalize the raw `profile` object of a `get` response.
pub fn parse_profile(account_id: &str, raw: &Value) -> Option<Profile> {
    let obj = raw.as_object()?;
    let image = obj.get("image");
    let links = obj.get("linktree").map(|l| ProfileLinks {
        twitter: non_empty(l.get("twitter")),
        github: non_empty(l.get("github")),
        website: non_empty(l.get("website")),
        telegram: non_empty(l.get("telegram")),
    });
    Some(Profile {
        account_id: account_id.to_string(),
        display_name: non_empty(obj.get("name")),
        description: non_empty(obj.get("description")),
        avatar_source_cid: image.and_then(|i| non_empty(i.get("ipfs_cid"))),
        avatar_url_override: image.and_then(|i| non_empty(i.get("url"))),
        links: links.filter(|l| !l.is_empty()),
    })
}

fn non_empty(v: Option<&Value>) -> Option<String> {
    v.and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// "3d ago", "5hrs ago", "12mins ago" or "Just now".
pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let seconds = now_ms.saturating_sub(timestamp_ms).max(0) / 1000;
    let minutes = seconds / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    if days > 0 {
        format!("{days}d ago")
    } else if hours > 0 {
        format!("{hours}hrs ago")
    } else if minutes > 0 {
        format!("{minutes}mins ago")
    } else {
        "Just now".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const GW: &str = "https://ipfs.near.social/ipfs";

    #[test]
    fn markdown_body_yields_text_and_media() {
        let raw = json!(r#"{"type":"md","text":"gm","image":{"ipfs_cid":"bafy1"},"audio":"https://a/x.webm"}"#);
        let c = parse_post_body(&raw, GW).unwrap();
        assert_eq!(c.text, "gm");
        assert_eq!(c.image_url.as_deref(), Some("https://ipfs.near.social/ipfs/bafy1"));
        assert_eq!(c.audio_url.as_deref(), Some("https://a/x.webm"));
    }

    #[test]
    fn image_url_form_is_kept_verbatim() {
        let raw = json!({"type": "md", "text": "pic", "image": {"url": "https://img/1.png"}});
        let c = parse_post_body(&raw, GW).unwrap();
        assert_eq!(c.image_url.as_deref(), Some("https://img/1.png"));
    }

    #[test]
    fn plain_string_is_plain_text() {
        let c = parse_post_body(&json!("hello world"), GW).unwrap();
        assert_eq!(c, PostContent::plain("hello world"));
    }

    #[test]
    fn json_without_markdown_shape_keeps_raw_string() {
        let c = parse_post_body(&json!(r#"{"foo":1}"#), GW).unwrap();
        assert_eq!(c.text, r#"{"foo":1}"#);
    }

    #[test]
    fn malformed_or_missing_bodies_are_rejected() {
        assert!(parse_post_body(&json!(r#"{"type":"md","text":"#), GW).is_none());
        assert!(parse_post_body(&Value::Null, GW).is_none());
        assert!(parse_post_body(&json!(12), GW).is_none());
    }

    #[test]
    fn avatar_prefers_cid_then_url_then_placeholder() {
        let mut p = Profile {
            account_id: "a.near".into(),
            avatar_source_cid: Some("cid9".into()),
            avatar_url_override: Some("https://x/y.png".into()),
            ..Default::default()
        };
        assert_eq!(avatar_url(Some(&p), "a.near", GW), format!("{GW}/cid9"));
        p.avatar_source_cid = None;
        assert_eq!(avatar_url(Some(&p), "a.near", GW), "https://x/y.png");
        assert_eq!(avatar_url(None, "a.near", GW), "https://i.pravatar.cc/150?u=a.near");
    }

    #[test]
    fn placeholder_is_deterministic() {
        assert_eq!(placeholder_avatar("z.near"), placeholder_avatar("z.near"));
        assert_ne!(placeholder_avatar("z.near"), placeholder_avatar("y.near"));
    }

    #[test]
    fn profile_parsing_drops_empty_fields() {
        let raw = json!({
            "name": "Alice",
            "description": "",
            "image": {"ipfs_cid": "bafyA"},
            "linktree": {"github": "alice", "twitter": ""}
        });
        let p = parse_profile("alice.near", &raw).unwrap();
        assert_eq!(p.display_name.as_deref(), Some("Alice"));
        assert!(p.description.is_none());
        assert_eq!(p.avatar_source_cid.as_deref(), Some("bafyA"));
        let links = p.links.unwrap();
        assert_eq!(links.github.as_deref(), Some("alice"));
        assert!(links.twitter.is_none());

        assert!(parse_profile("alice.near", &json!("nope")).is_none());
    }

    #[test]
    fn names_fall_back_to_account_prefix() {
        assert_eq!(display_name(None, "hamadex.near"), "hamadex");
        assert_eq!(short_name("plain"), "plain");
    }

    #[test]
    fn relative_time_buckets() {
        let now = 10 * 24 * 3_600_000;
        assert_eq!(format_relative_time(now, now), "Just now");
        assert_eq!(format_relative_time(now - 59_000, now), "Just now");
        assert_eq!(format_relative_time(now - 5 * 60_000, now), "5mins ago");
        assert_eq!(format_relative_time(now - 3 * 3_600_000, now), "3hrs ago");
        assert_eq!(format_relative_time(now - 2 * 86_400_000, now), "2d ago");
        assert_eq!(format_relative_time(now + 5000, now), "Just now");
        assert_eq!(format_relative_time(i64::MIN, i64::MAX), format!("{}d ago", i64::MAX / 1000 / 86_400));
        assert_eq!(format_relative_time(i64::MAX, i64::MIN), "Just now");
    }
}
