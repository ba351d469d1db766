//! Trade Types
//!
//! Option trades, the fills recorded against them, and the request types used
//! to open and settle them.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// =============================================================================
// Enums
// =============================================================================

/// Option contract type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionType {
    Call,
    Put,
}

impl std::fmt::Display for OptionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptionType::Call => write!(f, "call"),
            OptionType::Put => write!(f, "put"),
        }
    }
}

impl std::str::FromStr for OptionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "call" => Ok(OptionType::Call),
            "put" => Ok(OptionType::Put),
            other => Err(format!("unknown option type: {}", other)),
        }
    }
}

/// Fill side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillSide {
    Buy,
    Sell,
}

impl std::fmt::Display for FillSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FillSide::Buy => write!(f, "buy"),
            FillSide::Sell => write!(f, "sell"),
        }
    }
}

impl std::str::FromStr for FillSide {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buy" => Ok(FillSide::Buy),
            "sell" => Ok(FillSide::Sell),
            other => Err(format!("unknown fill side: {}", other)),
        }
    }
}

/// Trade lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeStatus {
    /// Contracts still held
    Open,
    /// Fully settled
    Closed,
    /// Entry price failed verification; terminal
    Rejected,
}

impl TradeStatus {
    /// Whether no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TradeStatus::Closed | TradeStatus::Rejected)
    }
}

impl std::fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeStatus::Open => write!(f, "open"),
            TradeStatus::Closed => write!(f, "closed"),
            TradeStatus::Rejected => write!(f, "rejected"),
        }
    }
}

impl std::str::FromStr for TradeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(TradeStatus::Open),
            "closed" => Ok(TradeStatus::Closed),
            "rejected" => Ok(TradeStatus::Rejected),
            other => Err(format!("unknown trade status: {}", other)),
        }
    }
}

/// Result of a closed trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeOutcome {
    Win,
    Loss,
    Breakeven,
}

impl TradeOutcome {
    /// Classify a net P&L.
    pub fn from_pnl(net_pnl: Decimal) -> Self {
        if net_pnl > Decimal::ZERO {
            TradeOutcome::Win
        } else if net_pnl < Decimal::ZERO {
            TradeOutcome::Loss
        } else {
            TradeOutcome::Breakeven
        }
    }
}

impl std::fmt::Display for TradeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeOutcome::Win => write!(f, "win"),
            TradeOutcome::Loss => write!(f, "loss"),
            TradeOutcome::Breakeven => write!(f, "breakeven"),
        }
    }
}

impl std::str::FromStr for TradeOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "win" => Ok(TradeOutcome::Win),
            "loss" => Ok(TradeOutcome::Loss),
            "breakeven" => Ok(TradeOutcome::Breakeven),
            other => Err(format!("unknown trade outcome: {}", other)),
        }
    }
}

// =============================================================================
// Fill
// =============================================================================

/// A single executed buy or sell against a trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fill {
    /// Unique fill ID
    pub id: String,
    /// Trade this fill belongs to
    pub trade_id: String,
    pub side: FillSide,
    /// Contracts filled
    pub contracts: u32,
    /// Price per contract
    pub fill_price: Decimal,
    /// contracts * fill_price * 100
    pub notional: Decimal,
    /// Timestamp of fill (ms)
    pub filled_at: i64,
    /// Market reference price used for verification
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_price: Option<Decimal>,
    /// Timestamp of the reference quote (ms)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_timestamp: Option<i64>,
}

// =============================================================================
// Trade
// =============================================================================

/// One BUY order and everything that happened to it afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    /// Unique trade ID
    pub id: String,
    /// Owning user
    pub user_id: String,
    /// Owning company (tenant)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_id: Option<String>,
    /// Underlying ticker, uppercase
    pub ticker: String,
    pub strike: Decimal,
    pub option_type: OptionType,
    pub expiry: NaiveDate,
    /// Contracts bought
    pub contracts: u32,
    /// Entry price per contract
    pub fill_price: Decimal,
    /// Whether the entry price passed market verification
    pub price_verified: bool,
    pub status: TradeStatus,
    pub remaining_open_contracts: u32,
    pub total_buy_notional: Decimal,
    pub total_sell_notional: Decimal,
    /// Set once the trade is closed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<TradeOutcome>,
    /// Set once the trade is closed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net_pnl: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_timestamp: Option<i64>,
    /// Fill ledger, oldest first
    #[serde(default)]
    pub fills: Vec<Fill>,
    /// Open time (ms)
    pub created_at: i64,
    /// Last fill or closure time (ms)
    pub updated_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<i64>,
}

impl Trade {
    /// Contracts sold so far.
    pub fn sold_contracts(&self) -> u32 {
        self.fills
            .iter()
            .filter(|f| f.side == FillSide::Sell)
            .map(|f| f.contracts)
            .sum()
    }

    /// SELL fills only.
    pub fn sell_fills(&self) -> impl Iterator<Item = &Fill> {
        self.fills.iter().filter(|f| f.side == FillSide::Sell)
    }

    pub fn is_open(&self) -> bool {
        self.status == TradeStatus::Open
    }

    /// Closed and verified trades are the unit of aggregation.
    pub fn counts_for_stats(&self) -> bool {
        self.status == TradeStatus::Closed && self.price_verified && self.outcome.is_some()
    }
}

// =============================================================================
// Requests
// =============================================================================

/// Price requested for a fill.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "price")]
pub enum FillPrice {
    /// Fill at this price (subject to band verification)
    Fixed(Decimal),
    /// Fill at the current market reference price
    Market,
}

/// Request to open a new trade.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTradeRequest {
    pub ticker: String,
    pub strike: Decimal,
    pub option_type: OptionType,
    pub expiry: NaiveDate,
    pub contracts: u32,
    pub fill_price: FillPrice,
}

/// Request to settle (sell) part or all of an open trade.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleTradeRequest {
    pub contracts: u32,
    pub fill_price: FillPrice,
}

/// Result of a settlement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settlement {
    pub trade: Trade,
    pub fill: Fill,
}

/// Trade list filter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TradeStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_outcome_from_pnl() {
        assert_eq!(TradeOutcome::from_pnl(dec!(100)), TradeOutcome::Win);
        assert_eq!(TradeOutcome::from_pnl(dec!(-0.01)), TradeOutcome::Loss);
        assert_eq!(TradeOutcome::from_pnl(dec!(0.00)), TradeOutcome::Breakeven);
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [TradeStatus::Open, TradeStatus::Closed, TradeStatus::Rejected] {
            let parsed: TradeStatus = status.to_string().parse().unwrap();
            assert_eq!(parsed, status);
        }
        assert!("pending".parse::<TradeStatus>().is_err());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!TradeStatus::Open.is_terminal());
        assert!(TradeStatus::Closed.is_terminal());
        assert!(TradeStatus::Rejected.is_terminal());
    }

    #[test]
    fn test_fill_price_serialization() {
        let fixed = serde_json::to_value(FillPrice::Fixed(dec!(2.50))).unwrap();
        assert_eq!(fixed["type"], "fixed");

        let market: FillPrice = serde_json::from_str(r#"{"type":"market"}"#).unwrap();
        assert_eq!(market, FillPrice::Market);

        let parsed: FillPrice = serde_json::from_str(r#"{"type":"fixed","price":"3.10"}"#).unwrap();
        assert_eq!(parsed, FillPrice::Fixed(dec!(3.10)));
    }

    #[test]
    fn test_option_type_parse_is_case_insensitive() {
        assert_eq!("CALL".parse::<OptionType>().unwrap(), OptionType::Call);
        assert_eq!("put".parse::<OptionType>().unwrap(), OptionType::Put);
    }
}
