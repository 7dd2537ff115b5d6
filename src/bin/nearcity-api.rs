//! Query API server for Near City clients
//!
//! Serves the feed and profile reads over HTTP so browser clients do not talk
//! to the social indexer directly. See [`nearcity::api`] for the endpoints.
//!
//! ## Usage
//! ```bash
//! cargo run --bin nearcity-api --features api
//! ```

use anyhow::Context;
use std::sync::Arc;

use nearcity::{
    api::{router, AppState},
    config::load,
    social::SocialGateway,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cfg = load().context("Failed to load configuration")?;

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3030);

    log::info!("Near City query API");
    cfg.print_summary();
    log::info!("  Port: {}", port);

    let state = AppState {
        gateway: Arc::new(SocialGateway::from_config(&cfg)),
    };
    let app = router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
