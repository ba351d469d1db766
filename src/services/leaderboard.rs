//! Leaderboard ranking.
//!
//! Ranks are assigned over the full eligible set before search and
//! pagination, so a row keeps its global position no matter how the result is
//! narrowed.

use crate::types::{LeaderboardPage, LeaderboardSort, RankedEntry, ScopeStats};
use std::cmp::Ordering;

/// Total order used for ranking. Better entries sort first.
fn compare(a: &ScopeStats, b: &ScopeStats, sort: LeaderboardSort) -> Ordering {
    let primary = match sort {
        LeaderboardSort::Roi => Ordering::Equal,
        LeaderboardSort::WinRate => b.exact_win_rate.cmp(&a.exact_win_rate),
        LeaderboardSort::NetPnl => b.stats.net_pnl.cmp(&a.stats.net_pnl),
        LeaderboardSort::TotalTrades => b.stats.total_trades.cmp(&a.stats.total_trades),
    };

    primary
        .then_with(|| b.exact_roi.cmp(&a.exact_roi))
        .then_with(|| b.exact_win_rate.cmp(&a.exact_win_rate))
        .then_with(|| a.identity.scope_id.cmp(&b.identity.scope_id))
}

/// Sort every scope and assign 1-based ranks.
pub fn rank(mut scopes: Vec<ScopeStats>, sort: LeaderboardSort) -> Vec<RankedEntry> {
    scopes.sort_by(|a, b| compare(a, b, sort));

    scopes
        .into_iter()
        .enumerate()
        .map(|(i, s)| RankedEntry {
            rank: (i + 1) as u32,
            identity: s.identity,
            stats: s.stats,
        })
        .collect()
}

/// Narrow ranked rows by search, then cut out one page. `page` is 1-based.
pub fn paginate(
    ranked: &[RankedEntry],
    search: Option<&str>,
    page: usize,
    page_size: usize,
) -> LeaderboardPage {
    let page = page.max(1);
    let page_size = page_size.max(1);

    let matching: Vec<&RankedEntry> = match search.map(str::trim).filter(|s| !s.is_empty()) {
        Some(needle) => ranked
            .iter()
            .filter(|e| e.identity.matches_search(needle))
            .collect(),
        None => ranked.iter().collect(),
    };

    let total = matching.len();
    let total_pages = total.div_ceil(page_size);
    let entries = matching
        .into_iter()
        .skip((page - 1).saturating_mul(page_size))
        .take(page_size)
        .cloned()
        .collect();

    LeaderboardPage {
        entries,
        page,
        page_size,
        total_pages,
        total,
    }
}
