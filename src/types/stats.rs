//! Stats and leaderboard types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Aggregated performance for one scope (a user or a company rollup).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsEntry {
    /// wins / (wins + losses) * 100, 2 dp
    pub win_rate: Decimal,
    /// net_pnl / total_buy_notional * 100, 2 dp
    pub roi: Decimal,
    pub net_pnl: Decimal,
    pub total_buy_notional: Decimal,
    pub total_sell_notional: Decimal,
    /// Closed trades only
    pub total_trades: u32,
    pub win_count: u32,
    pub loss_count: u32,
    pub breakeven_count: u32,
    /// Positive = wins, negative = losses
    pub current_streak: i32,
    /// Sign tells whether the longest run was wins or losses
    pub longest_streak: i32,
}

/// Kind of ranking subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    #[default]
    Users,
    Companies,
}

impl std::fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScopeKind::Users => write!(f, "users"),
            ScopeKind::Companies => write!(f, "companies"),
        }
    }
}

/// Display identity of a ranking subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeIdentity {
    /// User ID or company ID
    pub scope_id: String,
    pub kind: ScopeKind,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_id: Option<String>,
}

impl ScopeIdentity {
    /// Case-insensitive substring match over the display-name fields.
    pub fn matches_search(&self, needle: &str) -> bool {
        let needle = needle.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        self.display_name.to_lowercase().contains(&needle)
            || self
                .username
                .as_ref()
                .map(|u| u.to_lowercase().contains(&needle))
                .unwrap_or(false)
    }
}

/// Stats for a scope before ranking. ROI and win rate are kept exact here so
/// ordering never depends on presentation rounding.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeStats {
    pub identity: ScopeIdentity,
    pub stats: StatsEntry,
    pub exact_roi: Decimal,
    pub exact_win_rate: Decimal,
}

/// One leaderboard row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedEntry {
    /// 1-based position among all eligible scopes
    pub rank: u32,
    #[serde(flatten)]
    pub identity: ScopeIdentity,
    #[serde(flatten)]
    pub stats: StatsEntry,
}

/// A page of the leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardPage {
    pub entries: Vec<RankedEntry>,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
    /// Rows matching the search
    pub total: usize,
}

/// Trade window for rankings, applied to trade closure time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DateRange {
    #[default]
    #[serde(rename = "all")]
    AllTime,
    #[serde(rename = "30d")]
    Last30Days,
    #[serde(rename = "7d")]
    Last7Days,
}

impl DateRange {
    /// Earliest closure time (ms) included, relative to `now_ms`.
    pub fn cutoff(&self, now_ms: i64) -> Option<i64> {
        const DAY_MS: i64 = 24 * 60 * 60 * 1000;
        match self {
            DateRange::AllTime => None,
            DateRange::Last30Days => Some(now_ms - 30 * DAY_MS),
            DateRange::Last7Days => Some(now_ms - 7 * DAY_MS),
        }
    }

    /// Whether a closure time falls inside the window.
    pub fn contains(&self, closed_at: i64, now_ms: i64) -> bool {
        match self.cutoff(now_ms) {
            Some(cutoff) => closed_at >= cutoff,
            None => true,
        }
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateRange::AllTime => write!(f, "all"),
            DateRange::Last30Days => write!(f, "30d"),
            DateRange::Last7Days => write!(f, "7d"),
        }
    }
}

/// Primary ranking key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LeaderboardSort {
    #[default]
    Roi,
    WinRate,
    NetPnl,
    TotalTrades,
}

impl std::fmt::Display for LeaderboardSort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LeaderboardSort::Roi => write!(f, "roi"),
            LeaderboardSort::WinRate => write!(f, "winRate"),
            LeaderboardSort::NetPnl => write!(f, "netPnl"),
            LeaderboardSort::TotalTrades => write!(f, "totalTrades"),
        }
    }
}

/// Leaderboard request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeaderboardRequest {
    pub scope: ScopeKind,
    pub range: DateRange,
    pub page: usize,
    pub page_size: usize,
    pub search: Option<String>,
    pub sort: LeaderboardSort,
}

/// Personal stats plus the caller's company rollup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub user_id: String,
    pub personal_stats: StatsEntry,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_stats: Option<StatsEntry>,
}
