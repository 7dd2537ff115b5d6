//! HTTP implementation of [`SocialBackend`] against the NEAR Social API.
//!
//! `get` falls back to a direct `call_function` on the social contract when
//! the API is unreachable; `index` has no on-chain equivalent.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};

use super::{IndexQuery, SocialBackend};
use crate::config::Config;
use crate::net::post_json;
use crate::rpc_utils::view_function;

pub struct NearSocialClient {
    api_url: String,
    rpc_url: String,
    contract_id: String,
    timeout_ms: u64,
    retries: u8,
}

impl NearSocialClient {
    pub fn new(
        api_url: impl Into<String>,
        rpc_url: impl Into<String>,
        contract_id: impl Into<String>,
        timeout_ms: u64,
        retries: u8,
    ) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            rpc_url: rpc_url.into(),
            contract_id: contract_id.into(),
            timeout_ms,
            retries,
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(
            cfg.social_api_url.clone(),
            cfg.rpc_url.clone(),
            cfg.social_contract.clone(),
            cfg.request_timeout_ms,
            cfg.request_retries,
        )
    }
}

pub(crate) fn get_body(keys: &[String], block_height: Option<u64>) -> Value {
    let mut body = json!({ "keys": keys });
    if let Some(h) = block_height {
        body["blockHeight"] = json!(h);
    }
    body
}

#[async_trait]
impl SocialBackend for NearSocialClient {
    async fn index(&self, query: &IndexQuery) -> Result<Value> {
        log::debug!("[social] index {} {}", query.action, query.key);
        post_json(
            &format!("{}/index", self.api_url),
            &query.to_body(),
            self.timeout_ms,
            self.retries,
            "social index",
        )
        .await
    }

    async fn get(&self, keys: &[String], block_height: Option<u64>) -> Result<Value> {
        log::debug!("[social] get {keys:?} at {block_height:?}");
        let api = post_json(
            &format!("{}/get", self.api_url),
            &get_body(keys, block_height),
            self.timeout_ms,
            self.retries,
            "social get",
        )
        .await;
        match api {
            Ok(v) => Ok(v),
            Err(e) if block_height.is_none() => {
                log::info!("[social] API get failed ({e}), trying {} via RPC", self.contract_id);
                view_function(
                    &self.rpc_url,
                    &self.contract_id,
                    "get",
                    &json!({ "keys": keys }),
                    self.timeout_ms,
                    self.retries,
                )
                .await
            }
            Err(e) => Err(e),
        }
    }
}
