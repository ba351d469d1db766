use rust_decimal::Decimal;
use std::env;

/// How fill prices are determined and verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillPricingPolicy {
    /// Fixed prices must sit within `band_pct` percent of the market reference.
    FixedBand { band_pct: Decimal },
    /// Every fill executes at the market reference price.
    MarketOrder,
}

impl Default for FillPricingPolicy {
    fn default() -> Self {
        FillPricingPolicy::FixedBand {
            band_pct: Decimal::from(5),
        }
    }
}

/// Leaderboard configuration.
#[derive(Debug, Clone)]
pub struct LeaderboardConfig {
    /// Lifetime of cached rankings (seconds).
    pub cache_ttl_secs: u64,
    /// Page size when none is requested.
    pub default_page_size: usize,
    /// Largest page size a caller may request.
    pub max_page_size: usize,
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 5,
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// SQLite database path.
    pub database_path: String,
    /// Base URL of the option quote service.
    pub quote_api_url: Option<String>,
    /// API key for the option quote service.
    pub quote_api_key: Option<String>,
    /// Fill pricing policy.
    pub pricing_policy: FillPricingPolicy,
    /// Maximum contracts per trade.
    pub max_contracts: u32,
    /// Webhook receiving trade notifications.
    pub notify_webhook_url: Option<String>,
    /// Leaderboard settings.
    pub leaderboard: LeaderboardConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let band_pct: Decimal = env::var("PRICE_BAND_PCT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(|| Decimal::from(5));

        let pricing_policy = match env::var("FILL_PRICING_POLICY").ok().as_deref() {
            Some("market") | Some("market_order") => FillPricingPolicy::MarketOrder,
            _ => FillPricingPolicy::FixedBand { band_pct },
        };

        Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3001),
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "strikeboard.db".to_string()),
            quote_api_url: env::var("QUOTE_API_URL").ok(),
            quote_api_key: env::var("QUOTE_API_KEY").ok(),
            pricing_policy,
            max_contracts: env::var("MAX_CONTRACTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v| *v > 0)
                .unwrap_or(5),
            notify_webhook_url: env::var("NOTIFY_WEBHOOK_URL").ok(),
            leaderboard: LeaderboardConfig {
                cache_ttl_secs: env::var("LEADERBOARD_CACHE_TTL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(5),
                default_page_size: env::var("LEADERBOARD_PAGE_SIZE")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .filter(|v| *v > 0)
                    .unwrap_or(20),
                max_page_size: env::var("LEADERBOARD_MAX_PAGE_SIZE")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .filter(|v| *v > 0)
                    .unwrap_or(100),
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            database_path: "strikeboard.db".to_string(),
            quote_api_url: None,
            quote_api_key: None,
            pricing_policy: FillPricingPolicy::default(),
            max_contracts: 5,
            notify_webhook_url: None,
            leaderboard: LeaderboardConfig::default(),
        }
    }
}
