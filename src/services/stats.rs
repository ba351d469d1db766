//! Stats aggregation over closed trades.

use crate::services::pnl::{percentage, round_money};
use crate::services::streak::compute_streaks;
use crate::types::{DateRange, ScopeIdentity, ScopeStats, StatsEntry, Trade, TradeOutcome};
use rust_decimal::Decimal;

/// Roll up the closed, verified trades in `trades` into a stats entry along
/// with the unrounded ROI and win rate.
pub fn aggregate_exact<'a, I>(trades: I) -> (StatsEntry, Decimal, Decimal)
where
    I: IntoIterator<Item = &'a Trade>,
{
    let mut closed: Vec<&Trade> = trades.into_iter().filter(|t| t.counts_for_stats()).collect();
    // Streaks run oldest close first; id keeps equal timestamps stable
    closed.sort_by(|a, b| {
        a.closed_at
            .unwrap_or(a.updated_at)
            .cmp(&b.closed_at.unwrap_or(b.updated_at))
            .then_with(|| a.id.cmp(&b.id))
    });

    let mut entry = StatsEntry::default();

    for trade in &closed {
        entry.total_trades += 1;
        entry.total_buy_notional += trade.total_buy_notional;
        entry.total_sell_notional += trade.total_sell_notional;
        entry.net_pnl += trade.net_pnl.unwrap_or(Decimal::ZERO);

        match trade.outcome {
            Some(TradeOutcome::Win) => entry.win_count += 1,
            Some(TradeOutcome::Loss) => entry.loss_count += 1,
            Some(TradeOutcome::Breakeven) => entry.breakeven_count += 1,
            None => {}
        }
    }

    let streaks = compute_streaks(closed.iter().filter_map(|t| t.outcome));
    entry.current_streak = streaks.current;
    entry.longest_streak = streaks.longest;

    let decided = Decimal::from(entry.win_count + entry.loss_count);
    let exact_win_rate = percentage(Decimal::from(entry.win_count), decided);
    let exact_roi = percentage(entry.net_pnl, entry.total_buy_notional);

    entry.win_rate = round_money(exact_win_rate);
    entry.roi = round_money(exact_roi);
    entry.net_pnl = round_money(entry.net_pnl);
    entry.total_buy_notional = round_money(entry.total_buy_notional);
    entry.total_sell_notional = round_money(entry.total_sell_notional);

    (entry, exact_roi, exact_win_rate)
}

/// Roll up closed, verified trades into a stats entry.
pub fn aggregate<'a, I>(trades: I) -> StatsEntry
where
    I: IntoIterator<Item = &'a Trade>,
{
    aggregate_exact(trades).0
}

/// Roll up the trades that closed inside `range`.
pub fn aggregate_in_range<'a, I>(trades: I, range: DateRange, now_ms: i64) -> StatsEntry
where
    I: IntoIterator<Item = &'a Trade>,
{
    aggregate(
        trades
            .into_iter()
            .filter(|t| t.closed_at.map(|c| range.contains(c, now_ms)).unwrap_or(false)),
    )
}

/// Stats for a ranking subject, restricted to trades closed inside `range`.
pub fn scope_stats<'a, I>(identity: ScopeIdentity, trades: I, range: DateRange, now_ms: i64) -> ScopeStats
where
    I: IntoIterator<Item = &'a Trade>,
{
    let (stats, exact_roi, exact_win_rate) = aggregate_exact(
        trades
            .into_iter()
            .filter(|t| t.closed_at.map(|c| range.contains(c, now_ms)).unwrap_or(false)),
    );

    ScopeStats {
        identity,
        stats,
        exact_roi,
        exact_win_rate,
    }
}
