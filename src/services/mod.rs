pub mod access;
pub mod cache;
pub mod leaderboard;
pub mod lifecycle;
pub mod notifier;
pub mod pnl;
pub mod pricing;
pub mod sqlite_store;
pub mod stats;
pub mod streak;
pub mod trading;

pub use cache::{Cache, RankingCache, RankingKey};
pub use notifier::{BroadcastNotifier, CompositeNotifier, Notifier, TradeEvent, WebhookNotifier};
pub use pricing::{ContractKey, FillPricer, HttpQuoteProvider, Quote, QuoteProvider, StaticQuoteProvider};
pub use sqlite_store::SqliteStore;
pub use trading::TradingService;
