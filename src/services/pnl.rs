//! Notional and P&L arithmetic.
//!
//! Prices are normalised to cents when a fill is created; every notional and
//! P&L after that is an exact decimal product or sum. Ratios are rounded once,
//! when a stats entry is produced.

use crate::types::Trade;
use rust_decimal::{Decimal, RoundingStrategy};

/// Standard equity option contract multiplier.
pub const CONTRACT_MULTIPLIER: u32 = 100;

/// Round a monetary value or percentage to 2 decimal places.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// contracts * price * 100
pub fn notional(contracts: u32, price: Decimal) -> Decimal {
    Decimal::from(contracts) * price * Decimal::from(CONTRACT_MULTIPLIER)
}

/// Sell notional minus buy notional.
pub fn net_pnl(trade: &Trade) -> Decimal {
    trade.total_sell_notional - trade.total_buy_notional
}

/// numerator / denominator * 100, or zero when the denominator is zero.
pub fn percentage(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator.is_zero() {
        return Decimal::ZERO;
    }
    numerator / denominator * Decimal::ONE_HUNDRED
}
