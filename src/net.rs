//! Small helpers for rate-limit friendly networking.

use anyhow::{anyhow, Result};
use rand::{thread_rng, Rng};
use serde_json::Value;
use std::sync::OnceLock;
use std::time::Duration;

static HTTP: OnceLock<reqwest::Client> = OnceLock::new();

pub fn http_client() -> &'static reqwest::Client {
    HTTP.get_or_init(|| {
        reqwest::Client::builder()
            .pool_max_idle_per_host(8)
            .tcp_nodelay(true)
            .build()
            .unwrap_or_else(|e| {
                log::warn!("[net] falling back to default http client: {e}");
                reqwest::Client::new()
            })
    })
}

fn is_transient(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Send a request, retrying 429/5xx and transport errors with jittered backoff.
pub async fn send_with_backoff(
    rb: reqwest::RequestBuilder,
    label: &str,
    max_retries: u8,
) -> Result<reqwest::Response> {
    let mut attempt = 0u8;
    loop {
        let req = rb
            .try_clone()
            .ok_or_else(|| anyhow!("{label}: request body is not cloneable"))?;
        match req.send().await {
            Ok(r) => {
                if is_transient(r.status().as_u16()) && attempt < max_retries {
                    attempt += 1;
                    let back_ms = backoff_delay_ms(attempt);
                    log::debug!(
                        "[net] {} {} retry={} backoff={}ms",
                        r.status().as_u16(),
                        label,
                        attempt,
                        back_ms
                    );
                    tokio::time::sleep(Duration::from_millis(back_ms)).await;
                    continue;
                }
                return Ok(r);
            }
            Err(e) => {
                if attempt < max_retries {
                    attempt += 1;
                    let back_ms = backoff_delay_ms(attempt);
                    log::debug!(
                        "[net] err {} retry={} backoff={}ms : {}",
                        label,
                        attempt,
                        back_ms,
                        e
                    );
                    tokio::time::sleep(Duration::from_millis(back_ms)).await;
                    continue;
                }
                return Err(anyhow!("{label}: {e}"));
            }
        }
    }
}

/// POST a JSON body and decode a JSON reply. Non-2xx statuses become errors.
pub async fn post_json(
    url: &str,
    body: &Value,
    timeout_ms: u64,
    max_retries: u8,
    label: &str,
) -> Result<Value> {
    let rb = http_client()
        .post(url)
        .json(body)
        .timeout(Duration::from_millis(timeout_ms));
    let res = send_with_backoff(rb, label, max_retries).await?;
    if !res.status().is_success() {
        return Err(anyhow!("{label}: http {}", res.status()));
    }
    res.json()
        .await
        .map_err(|e| anyhow!("{label}: invalid json: {e}"))
}

pub async fn get_json(url: &str, timeout_ms: u64, max_retries: u8, label: &str) -> Result<Value> {
    let rb = http_client()
        .get(url)
        .timeout(Duration::from_millis(timeout_ms));
    let res = send_with_backoff(rb, label, max_retries).await?;
    if !res.status().is_success() {
        return Err(anyhow!("{label}: http {}", res.status()));
    }
    res.json()
        .await
        .map_err(|e| anyhow!("{label}: invalid json: {e}"))
}

fn backoff_delay_ms(attempt: u8) -> u64 {
    let base = 300u64.saturating_mul(1u64 << (attempt.clamp(1, 5) - 1)); // 300,600,1200,2400,4800
    let jitter: u64 = thread_rng().gen_range(0..=250);
    base + jitter
}
