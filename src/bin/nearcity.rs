// Native binary for Near City - read-only command line over the social core

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;

use nearcity::{
    config::{resolve, ConfigArgs},
    events::EventBus,
    explorer,
    feed::{FeedController, LoadOutcome},
    interactions::Interactions,
    rpc_utils::{BalanceSource, RpcBalanceSource},
    session::SessionStore,
    social::SocialGateway,
};

#[derive(Parser, Debug)]
#[command(name = "nearcity")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Near City social core", long_about = None)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the latest posts, following the cursor for `pages` pages
    Feed {
        #[arg(long, default_value_t = 1)]
        pages: usize,
        /// Account whose likes, reposts and follows are flagged
        #[arg(long = "as")]
        viewer: Option<String>,
    },
    /// Profile and follower stats for an account
    Profile { account_id: String },
    /// Follower, following and post counts
    Stats { account_id: String },
    /// Accounts followed by an account
    Following { account_id: String },
    /// Liquid balance in NEAR
    Balance { account_id: String },
    /// Recent transactions (needs NEAR_EXPLORER_API) and NEAR/USD price
    Txs {
        account_id: String,
        #[arg(long, default_value_t = explorer::DEFAULT_TRANSACTION_LIMIT)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (safe to ignore if not found)
    let _ = dotenvy::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let cfg = resolve(cli.config).context("Failed to load configuration")?;
    cfg.print_summary();

    let gateway = Arc::new(SocialGateway::from_config(&cfg));
    let balances: Arc<dyn BalanceSource> = Arc::new(RpcBalanceSource::from_config(&cfg));

    match cli.command {
        Command::Feed { pages, viewer } => {
            let session = Arc::new(SessionStore::new(balances, EventBus::default()));
            if let Some(ref account) = viewer {
                session.connect(account)?;
            }
            let feed = FeedController::new(gateway, session, Arc::new(Interactions::new()));
            for page in 0..pages.max(1) {
                match feed.load(cfg.feed_page_size, page > 0).await {
                    LoadOutcome::Exhausted => break,
                    LoadOutcome::Failed(e) => anyhow::bail!("feed load failed: {e}"),
                    _ => {}
                }
            }
            for v in feed.view() {
                println!(
                    "{:<24} {:>10}  ♥ {:<4} ⟲ {:<4} {}",
                    v.post.display_name,
                    v.post.time_label,
                    v.likes.count,
                    v.reposts.count,
                    v.post.content_text.replace('\n', " ")
                );
            }
            if !feed.has_more() {
                println!("-- no more posts --");
            }
        }
        Command::Profile { account_id } => {
            let (profile, stats) = futures::join!(
                gateway.fetch_profile(&account_id),
                gateway.social_stats(&account_id)
            );
            let out = serde_json::json!({
                "accountId": account_id,
                "profile": profile,
                "avatarUrl": gateway.avatar_url(profile.as_ref(), &account_id),
                "stats": stats,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Command::Stats { account_id } => {
            let stats = gateway.social_stats(&account_id).await;
            println!(
                "{account_id}: {} followers, {} following, {} posts",
                stats.followers, stats.following, stats.posts
            );
        }
        Command::Following { account_id } => {
            for account in gateway.following(&account_id).await? {
                println!("{account}");
            }
        }
        Command::Balance { account_id } => {
            let balance = balances.balance(&account_id).await?;
            println!("{balance} NEAR");
        }
        Command::Txs { account_id, limit } => {
            let (txs, price) = futures::join!(
                explorer::fetch_recent_transactions(&cfg, &account_id, limit),
                explorer::fetch_near_usd_price(&cfg)
            );
            let out = serde_json::json!({ "transactions": txs, "nearUsd": price });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    }
    Ok(())
}
