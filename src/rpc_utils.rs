use anyhow::{anyhow, Result};
use async_trait::async_trait;
use near_token::NearToken;
use serde_json::{json, Value};

use crate::net::post_json;

/// JSON-RPC call. Unwraps `result` and turns `error` into an `Err`.
pub async fn rpc_post(url: &str, body: &Value, timeout_ms: u64, retries: u8) -> Result<Value> {
    let v = post_json(url, body, timeout_ms, retries, "rpc").await?;
    if let Some(err) = v.get("error") {
        let code = err.get("code").and_then(|c| c.as_i64()).unwrap_or_default();
        let msg = err
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("rpc error");
        return Err(anyhow!("rpc {code} {msg}"));
    }
    v.get("result")
        .cloned()
        .ok_or_else(|| anyhow!("invalid rpc payload (no result)"))
}

pub async fn view_account(url: &str, account_id: &str, t: u64, retries: u8) -> Result<Value> {
    rpc_post(
        url,
        &json!({
            "jsonrpc": "2.0",
            "id": "nearcity",
            "method": "query",
            "params": {
                "request_type": "view_account",
                "finality": "final",
                "account_id": account_id,
            }
        }),
        t,
        retries,
    )
    .await
}

/// Call a view method and decode its JSON return value.
pub async fn view_function(
    url: &str,
    contract_id: &str,
    method_name: &str,
    args: &Value,
    t: u64,
    retries: u8,
) -> Result<Value> {
    use base64::{engine::general_purpose, Engine as _};
    let args_base64 = general_purpose::STANDARD.encode(serde_json::to_vec(args)?);
    let result = rpc_post(
        url,
        &json!({
            "jsonrpc": "2.0",
            "id": "nearcity",
            "method": "query",
            "params": {
                "request_type": "call_function",
                "finality": "final",
                "account_id": contract_id,
                "method_name": method_name,
                "args_base64": args_base64,
            }
        }),
        t,
        retries,
    )
    .await?;
    decode_call_result(&result)
}

/// `call_function` returns the value as an array of bytes.
fn decode_call_result(result: &Value) -> Result<Value> {
    let bytes: Vec<u8> = result["result"]
        .as_array()
        .ok_or_else(|| anyhow!("call_function result is not a byte array"))?
        .iter()
        .map(|b| b.as_u64().and_then(|n| u8::try_from(n).ok()))
        .collect::<Option<_>>()
        .ok_or_else(|| anyhow!("call_function result has non-byte entries"))?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Format a yoctoNEAR amount as NEAR with two truncated decimals ("12.34").
pub fn format_balance(yocto: u128) -> String {
    let token = NearToken::from_yoctonear(yocto);
    let cents = token.as_millinear() % 1000 / 10;
    format!("{}.{cents:02}", token.as_near())
}

/// Source of account balances, formatted by [`format_balance`].
#[async_trait]
pub trait BalanceSource: Send + Sync {
    async fn balance(&self, account_id: &str) -> Result<String>;
}

/// Balance lookups through `view_account` on a NEAR RPC node.
pub struct RpcBalanceSource {
    rpc_url: String,
    timeout_ms: u64,
    retries: u8,
}

impl RpcBalanceSource {
    pub fn new(rpc_url: impl Into<String>, timeout_ms: u64, retries: u8) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            timeout_ms,
            retries,
        }
    }

    pub fn from_config(cfg: &crate::config::Config) -> Self {
        Self::new(cfg.rpc_url.clone(), cfg.request_timeout_ms, cfg.request_retries)
    }
}

#[async_trait]
impl BalanceSource for RpcBalanceSource {
    async fn balance(&self, account_id: &str) -> Result<String> {
        let account = view_account(&self.rpc_url, account_id, self.timeout_ms, self.retries).await?;
        let yocto = account["amount"]
            .as_str()
            .and_then(|s| s.parse::<u128>().ok())
            .ok_or_else(|| anyhow!("view_account for {account_id} has no amount"))?;
        Ok(format_balance(yocto))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_whole_and_fractional_near() {
        assert_eq!(format_balance(0), "0.00");
        assert_eq!(format_balance(NearToken::from_near(1).as_yoctonear()), "1.00");
        assert_eq!(format_balance(NearToken::from_millinear(12_250).as_yoctonear()), "12.25");
    }

    #[test]
    fn decodes_call_function_bytes() {
        let payload = br#"{"alice.near":{"profile":{"name":"Alice"}}}"#;
        let result = json!({ "result": payload.to_vec(), "logs": [] });
        let v = decode_call_result(&result).unwrap();
        assert_eq!(v["alice.near"]["profile"]["name"], "Alice");

        assert!(decode_call_result(&json!({ "result": "nope" })).is_err());
    }

    #[test]
    fn truncates_instead_of_rounding() {
        assert_eq!(format_balance(NearToken::from_millinear(999).as_yoctonear()), "0.99");
        assert_eq!(format_balance(NearToken::from_yoctonear(1).as_yoctonear()), "0.00");
    }
}
