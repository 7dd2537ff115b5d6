//! Key/value payloads for the social contract's `set` method.
//!
//! Index and notify values are stored as JSON-encoded strings, the same way
//! every NEAR Social client writes them.

use serde_json::{json, Value};

use crate::types::ItemRef;

fn encoded(v: Value) -> String {
    v.to_string()
}

/// Wrap per-account data into the `set` argument object.
pub fn set_args(account_id: &str, data: Value) -> Value {
    json!({ "data": { account_id: data } })
}

pub fn post(text: &str, image_url: Option<&str>) -> Value {
    let mut body = json!({ "type": "md", "text": text });
    if let Some(url) = image_url {
        body["image"] = json!({ "url": url });
    }
    json!({
        "post": { "main": encoded(body) },
        "index": {
            "post": encoded(json!({ "key": "main", "value": { "type": "md" } }))
        }
    })
}

pub fn like(item: &ItemRef, author: &str, liked: bool) -> Value {
    let kind = if liked { "like" } else { "unlike" };
    let mut index = json!({
        "like": encoded(json!({ "key": item, "value": { "type": kind } }))
    });
    if liked {
        index["notify"] = json!(encoded(json!({
            "key": author,
            "value": { "type": "like", "item": item }
        })));
    }
    json!({ "index": index })
}

pub fn repost(item: &ItemRef, author: &str) -> Value {
    json!({
        "index": {
            "repost": encoded(json!([
                { "key": "main", "value": { "type": "repost", "item": item } },
                { "key": item, "value": { "type": "repost" } }
            ])),
            "notify": encoded(json!({
                "key": author,
                "value": { "type": "repost", "item": item }
            }))
        }
    })
}

pub fn follow(target: &str, follow: bool) -> Value {
    let kind = if follow { "follow" } else { "unfollow" };
    let edge = if follow { json!("") } else { Value::Null };
    json!({
        "graph": { "follow": { target: edge } },
        "index": {
            "graph": encoded(json!({
                "key": "follow",
                "value": { "type": kind, "accountId": target }
            })),
            "notify": encoded(json!({ "key": target, "value": { "type": kind } }))
        }
    })
}

pub fn poke(target: &str) -> Value {
    json!({
        "index": {
            "graph": encoded(json!({
                "key": "poke",
                "value": { "accountId": target }
            })),
            "notify": encoded(json!({ "key": target, "value": { "type": "poke" } }))
        }
    })
}
