use anyhow::{anyhow, Result};
use clap::Parser;

pub const DEFAULT_SOCIAL_API_URL: &str = "https://api.near.social";
pub const DEFAULT_IPFS_GATEWAY_URL: &str = "https://ipfs.near.social/ipfs";
pub const DEFAULT_PRICE_API_URL: &str =
    "https://api.coingecko.com/api/v3/simple/price?ids=near&vs_currencies=usd";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Testnet,
}

impl Network {
    pub fn default_rpc_url(self) -> &'static str {
        match self {
            Network::Mainnet => "https://rpc.mainnet.near.org",
            Network::Testnet => "https://rpc.testnet.near.org",
        }
    }

    /// Account hosting the social key/value store on this network.
    pub fn default_social_contract(self) -> &'static str {
        match self {
            Network::Mainnet => "social.near",
            Network::Testnet => "v1.social08.testnet",
        }
    }
}

impl std::str::FromStr for Network {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "mainnet" | "main" => Ok(Network::Mainnet),
            "testnet" | "test" => Ok(Network::Testnet),
            _ => Err(anyhow!("Invalid network '{s}'. Valid options: mainnet, testnet")),
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Testnet => write!(f, "testnet"),
        }
    }
}

/// Connection settings shared by every binary.
///
/// Configuration priority: CLI args > Environment variables > Defaults
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Network: mainnet or testnet
    #[arg(long, env = "NEAR_NETWORK", value_parser = clap::value_parser!(Network))]
    pub network: Option<Network>,

    /// NEAR RPC endpoint URL (balance queries)
    #[arg(long, env = "NEAR_RPC_URL")]
    pub rpc_url: Option<String>,

    /// NEAR Social API base URL (index/get)
    #[arg(long, env = "NEAR_SOCIAL_API_URL")]
    pub social_api_url: Option<String>,

    /// Social contract account receiving `set` calls
    #[arg(long, env = "NEAR_SOCIAL_CONTRACT_ID")]
    pub social_contract: Option<String>,

    /// Optional explorer API exposing /account/{id}/transactions
    #[arg(long, env = "NEAR_EXPLORER_API")]
    pub explorer_api_url: Option<String>,

    /// IPFS gateway used for content-addressed avatars
    #[arg(long, env = "IPFS_GATEWAY_URL")]
    pub ipfs_gateway_url: Option<String>,

    /// Request timeout in milliseconds (1000-60000)
    #[arg(long, env = "REQUEST_TIMEOUT_MS")]
    pub request_timeout_ms: Option<u64>,

    /// Retry attempts for transient upstream failures (0-10)
    #[arg(long, env = "REQUEST_RETRIES")]
    pub request_retries: Option<u8>,

    /// Posts per feed page (1-100)
    #[arg(long, env = "FEED_PAGE_SIZE")]
    pub feed_page_size: Option<usize>,
}

/// Standalone parser for binaries that take no subcommands.
#[derive(Parser, Debug)]
#[command(name = "nearcity")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Near City social core", long_about = None)]
pub struct CliArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub network: Network,
    pub rpc_url: String,
    pub social_api_url: String,
    pub social_contract: String,
    pub explorer_api_url: Option<String>,
    pub ipfs_gateway_url: String,
    pub price_api_url: String,
    pub request_timeout_ms: u64,
    pub request_retries: u8,
    pub feed_page_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        let network = Network::Mainnet;
        Config {
            network,
            rpc_url: network.default_rpc_url().to_string(),
            social_api_url: DEFAULT_SOCIAL_API_URL.to_string(),
            social_contract: network.default_social_contract().to_string(),
            explorer_api_url: None,
            ipfs_gateway_url: DEFAULT_IPFS_GATEWAY_URL.to_string(),
            price_api_url: DEFAULT_PRICE_API_URL.to_string(),
            request_timeout_ms: 8000,
            request_retries: 2,
            feed_page_size: 20,
        }
    }
}

/// Validate that a value is within a given range (inclusive)
fn validate_in_range<T>(val: T, min: T, max: T, name: &str) -> Result<T>
where
    T: PartialOrd + std::fmt::Display + Copy,
{
    if val < min || val > max {
        Err(anyhow!("{name} must be in range [{min}, {max}], got {val}"))
    } else {
        Ok(val)
    }
}

/// Validate URL format (basic check)
fn validate_url(url: &str, name: &str) -> Result<()> {
    if url.is_empty() {
        return Err(anyhow!("{name} cannot be empty"));
    }
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(anyhow!("{name} must start with http:// or https://"))
    }
}

fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

/// Resolve already-parsed arguments into a validated config.
pub fn resolve(args: ConfigArgs) -> Result<Config> {
    let network = args.network.unwrap_or(Network::Mainnet);

    let rpc_url = args
        .rpc_url
        .unwrap_or_else(|| network.default_rpc_url().to_string());
    validate_url(&rpc_url, "NEAR_RPC_URL")?;

    let social_api_url = trim_base(
        args.social_api_url
            .unwrap_or_else(|| DEFAULT_SOCIAL_API_URL.to_string()),
    );
    validate_url(&social_api_url, "NEAR_SOCIAL_API_URL")?;

    let social_contract = args
        .social_contract
        .unwrap_or_else(|| network.default_social_contract().to_string());
    if social_contract.parse::<near_account_id::AccountId>().is_err() {
        return Err(anyhow!(
            "NEAR_SOCIAL_CONTRACT_ID '{social_contract}' is not a valid account id"
        ));
    }

    let explorer_api_url = args
        .explorer_api_url
        .filter(|s| !s.trim().is_empty())
        .map(trim_base);
    if let Some(ref url) = explorer_api_url {
        validate_url(url, "NEAR_EXPLORER_API")?;
    }

    let ipfs_gateway_url = trim_base(
        args.ipfs_gateway_url
            .unwrap_or_else(|| DEFAULT_IPFS_GATEWAY_URL.to_string()),
    );
    validate_url(&ipfs_gateway_url, "IPFS_GATEWAY_URL")?;

    let request_timeout_ms = validate_in_range(
        args.request_timeout_ms.unwrap_or(8000),
        1000,
        60000,
        "REQUEST_TIMEOUT_MS",
    )?;
    let request_retries =
        validate_in_range(args.request_retries.unwrap_or(2), 0, 10, "REQUEST_RETRIES")?;
    let feed_page_size =
        validate_in_range(args.feed_page_size.unwrap_or(20), 1, 100, "FEED_PAGE_SIZE")?;

    Ok(Config {
        network,
        rpc_url,
        social_api_url,
        social_contract,
        explorer_api_url,
        ipfs_gateway_url,
        price_api_url: DEFAULT_PRICE_API_URL.to_string(),
        request_timeout_ms,
        request_retries,
        feed_page_size,
    })
}

/// Load configuration from CLI args and environment variables
pub fn load() -> Result<Config> {
    resolve(CliArgs::parse().config)
}

impl Config {
    pub fn print_summary(&self) {
        log::info!("Near City configuration:");
        log::info!("  Network: {}", self.network);
        log::info!("  RPC URL: {}", self.rpc_url);
        log::info!("  Social API: {}", self.social_api_url);
        log::info!("  Social contract: {}", self.social_contract);
        if let Some(ref url) = self.explorer_api_url {
            log::info!("  Explorer API: {url}");
        }
        log::info!("  Timeout: {}ms, retries: {}", self.request_timeout_ms, self.request_retries);
        log::info!("  Feed page size: {}", self.feed_page_size);
    }
}
