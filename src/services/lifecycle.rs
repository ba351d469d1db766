//! Trade lifecycle
//!
//! Pure state transitions for a trade and its fill ledger:
//! - Order validation and trade opening (OPEN or REJECTED)
//! - Applying SELL fills, closing the trade once fully settled
//! - Deletion guard
//!
//! Persistence and atomicity live in the store; nothing here does I/O.

use crate::error::{AppError, Result};
use crate::services::pnl::{net_pnl, notional, round_money};
use crate::types::{
    CreateTradeRequest, Fill, FillPrice, FillSide, Trade, TradeOutcome, TradeStatus,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Outcome of entry-price verification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntryPricing {
    /// Price the BUY fill is recorded at
    pub fill_price: Decimal,
    pub verified: bool,
    pub reference_price: Option<Decimal>,
    pub reference_timestamp: Option<i64>,
}

/// Validate and normalise an order before any pricing or persistence.
pub fn validate_order(
    order: &CreateTradeRequest,
    max_contracts: u32,
    today: NaiveDate,
) -> Result<CreateTradeRequest> {
    let ticker = order.ticker.trim().to_ascii_uppercase();
    if ticker.is_empty() || ticker.len() > 6 || !ticker.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(AppError::Validation(format!(
            "ticker must be 1-6 letters, got '{}'",
            order.ticker
        )));
    }

    if order.strike <= Decimal::ZERO {
        return Err(AppError::Validation("strike must be positive".to_string()));
    }

    if order.contracts == 0 || order.contracts > max_contracts {
        return Err(AppError::Validation(format!(
            "contracts must be between 1 and {}",
            max_contracts
        )));
    }

    if let FillPrice::Fixed(price) = order.fill_price {
        if price <= Decimal::ZERO {
            return Err(AppError::Validation("fill price must be positive".to_string()));
        }
    }

    if order.expiry < today {
        return Err(AppError::Validation(format!(
            "expiry {} is in the past",
            order.expiry
        )));
    }

    Ok(CreateTradeRequest {
        ticker,
        ..order.clone()
    })
}

/// Build a new fill. The price is normalised to cents.
pub fn new_fill(
    trade_id: &str,
    side: FillSide,
    contracts: u32,
    price: Decimal,
    reference_price: Option<Decimal>,
    reference_timestamp: Option<i64>,
    filled_at: i64,
) -> Fill {
    let fill_price = round_money(price);
    Fill {
        id: uuid::Uuid::new_v4().to_string(),
        trade_id: trade_id.to_string(),
        side,
        contracts,
        fill_price,
        notional: notional(contracts, fill_price),
        filled_at,
        reference_price,
        reference_timestamp,
    }
}

/// Open a trade from a validated order.
///
/// A verified entry produces an OPEN trade with its BUY fill in the ledger.
/// An unverified entry produces a terminal REJECTED trade with no fills.
pub fn open_trade(
    user_id: &str,
    company_id: Option<String>,
    order: &CreateTradeRequest,
    entry: EntryPricing,
    now: i64,
) -> Trade {
    let id = uuid::Uuid::new_v4().to_string();
    let fill_price = round_money(entry.fill_price);
    // A reference that rounds to zero cents cannot open a position
    let verified = entry.verified && fill_price > Decimal::ZERO;

    let (status, fills) = if verified {
        let buy = new_fill(
            &id,
            FillSide::Buy,
            order.contracts,
            fill_price,
            entry.reference_price,
            entry.reference_timestamp,
            now,
        );
        (TradeStatus::Open, vec![buy])
    } else {
        (TradeStatus::Rejected, Vec::new())
    };

    Trade {
        id,
        user_id: user_id.to_string(),
        company_id,
        ticker: order.ticker.clone(),
        strike: order.strike,
        option_type: order.option_type,
        expiry: order.expiry,
        contracts: order.contracts,
        fill_price,
        price_verified: verified,
        status,
        remaining_open_contracts: order.contracts,
        total_buy_notional: notional(order.contracts, fill_price),
        total_sell_notional: Decimal::ZERO,
        outcome: None,
        net_pnl: None,
        reference_price: entry.reference_price,
        reference_timestamp: entry.reference_timestamp,
        fills,
        created_at: now,
        updated_at: now,
        closed_at: None,
    }
}

/// Check that a SELL fill can be applied, without touching the trade.
pub fn check_fill(trade: &Trade, fill: &Fill) -> Result<()> {
    if trade.status != TradeStatus::Open {
        return Err(AppError::InvalidState(format!(
            "trade {} is {}",
            trade.id, trade.status
        )));
    }

    if fill.side != FillSide::Sell {
        return Err(AppError::Validation(
            "only SELL fills settle a trade".to_string(),
        ));
    }

    if fill.trade_id != trade.id {
        return Err(AppError::Validation(format!(
            "fill belongs to trade {}, not {}",
            fill.trade_id, trade.id
        )));
    }

    if fill.contracts == 0 {
        return Err(AppError::Validation("contracts must be positive".to_string()));
    }

    if fill.contracts > trade.remaining_open_contracts {
        return Err(AppError::Validation(format!(
            "{} contracts exceeds remaining {}",
            fill.contracts, trade.remaining_open_contracts
        )));
    }

    Ok(())
}

/// Apply a SELL fill to an open trade.
///
/// Sell notional is recomputed from the whole ledger. The trade closes when no
/// contracts remain. On error the trade is left untouched.
pub fn apply_fill(trade: &mut Trade, fill: Fill) -> Result<()> {
    check_fill(trade, &fill)?;

    let filled_at = fill.filled_at;
    trade.fills.push(fill);

    let sold = trade.sold_contracts();
    trade.remaining_open_contracts = trade.contracts - sold;
    trade.total_sell_notional = trade.sell_fills().map(|f| f.notional).sum();
    trade.updated_at = filled_at;

    if trade.remaining_open_contracts == 0 {
        let pnl = net_pnl(trade);
        trade.status = TradeStatus::Closed;
        trade.net_pnl = Some(pnl);
        trade.outcome = Some(TradeOutcome::from_pnl(pnl));
        trade.closed_at = Some(filled_at);
    }

    Ok(())
}

/// Only open trades may be deleted.
pub fn ensure_deletable(trade: &Trade) -> Result<()> {
    if trade.status.is_terminal() {
        return Err(AppError::InvalidState(format!(
            "cannot delete {} trade {}",
            trade.status, trade.id
        )));
    }
    Ok(())
}
